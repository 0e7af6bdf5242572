//! Column classifier: assigns every column of a table one semantic category
//! from its name and a sample of its values.
//!
//! Decision order per column:
//! 1. no non-null values, or a single distinct value → categorical
//! 2. latitude/longitude name hint + numbers inside the coordinate range
//! 3. time name hint + dates, or + numbers (year-extractable when all are
//!    four-digit whole numbers)
//! 4. dates without a hint → datetime
//! 5. identifier name hint + all values distinct → identifier
//! 6. numbers → numeric
//! 7. anything else → categorical
//!
//! Name hints win over ambiguous value shapes, and mixed shapes without a
//! hint resolve to categorical.  Classification never fails.

use std::collections::HashSet;

use serde::Deserialize;

use super::model::{CellValue, RawTable};
use super::parse::{cell_datetime, cell_number};

/// Sampling knobs.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ClassifierConfig {
    /// Number of non-null cells inspected per column.
    pub sample_size: usize,
    /// Share of the sample that must parse for a shape to hold.
    pub min_parse_ratio: f64,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            sample_size: 200,
            min_parse_ratio: 0.8,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ColumnCategory {
    Latitude,
    Longitude,
    /// Dates or timestamps; `year_extractable` when every value carries a
    /// calendar year.
    Datetime { year_extractable: bool },
    Numeric,
    Categorical,
    Identifier,
}

impl ColumnCategory {
    pub fn label(&self) -> &'static str {
        match self {
            ColumnCategory::Latitude => "latitude",
            ColumnCategory::Longitude => "longitude",
            ColumnCategory::Datetime { year_extractable: true } => "datetime (year)",
            ColumnCategory::Datetime { year_extractable: false } => "datetime",
            ColumnCategory::Numeric => "numeric",
            ColumnCategory::Categorical => "categorical",
            ColumnCategory::Identifier => "identifier",
        }
    }

    pub fn is_coordinate(&self) -> bool {
        matches!(self, ColumnCategory::Latitude | ColumnCategory::Longitude)
    }

    pub fn is_datetime(&self) -> bool {
        matches!(self, ColumnCategory::Datetime { .. })
    }

    pub fn is_year_extractable(&self) -> bool {
        matches!(self, ColumnCategory::Datetime { year_extractable: true })
    }

    /// Values are plain numbers that can sit on a continuous axis.
    pub fn is_numeric_valued(&self) -> bool {
        matches!(
            self,
            ColumnCategory::Numeric | ColumnCategory::Latitude | ColumnCategory::Longitude
        )
    }

    /// Values are labels suited for grouping.
    pub fn is_categorical(&self) -> bool {
        matches!(self, ColumnCategory::Categorical)
    }
}

/// Name-derived bias applied before value inspection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NameHint {
    Latitude,
    Longitude,
    Time,
    Identifier,
}

/// What the decision was based on.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Evidence {
    pub name_hint: Option<NameHint>,
    /// Non-null cells inspected.
    pub sampled: usize,
    /// Sampled cells that parsed as numbers.
    pub numeric: usize,
    /// Sampled cells that parsed as dates or timestamps.
    pub datetime: usize,
    /// Distinct non-null values in the whole column.
    pub distinct: usize,
    /// Mixed value shapes were seen and resolved to the default.
    pub ambiguous: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ClassifiedColumn {
    pub name: String,
    pub category: ColumnCategory,
    pub evidence: Evidence,
}

const LAT_TOKENS: &[&str] = &["lat", "latitude"];
const LON_TOKENS: &[&str] = &["lon", "lng", "long", "longitude"];
const TIME_SUBSTRINGS: &[&str] = &[
    "date", "time", "year", "vuosi", "aika", "päivä", "timestamp", "created", "modified",
];
const TIME_TOKENS: &[&str] = &["pvm", "yyyy", "vko"];
const ID_TOKENS: &[&str] = &["id", "uuid", "key"];

fn tokens(lower: &str) -> impl Iterator<Item = &str> {
    lower.split(|c: char| !c.is_alphanumeric()).filter(|t| !t.is_empty())
}

/// Derive the name hint for a column.
pub fn name_hint(name: &str) -> Option<NameHint> {
    let lower = name.trim().to_lowercase();
    if tokens(&lower).any(|t| LAT_TOKENS.contains(&t)) {
        return Some(NameHint::Latitude);
    }
    if tokens(&lower).any(|t| LON_TOKENS.contains(&t)) {
        return Some(NameHint::Longitude);
    }
    if TIME_SUBSTRINGS.iter().any(|s| lower.contains(s))
        || tokens(&lower).any(|t| TIME_TOKENS.contains(&t))
    {
        return Some(NameHint::Time);
    }
    if tokens(&lower).any(|t| ID_TOKENS.contains(&t)) {
        return Some(NameHint::Identifier);
    }
    None
}

/// Classify every column of `table`, in column order.
pub fn classify_table(table: &RawTable, config: &ClassifierConfig) -> Vec<ClassifiedColumn> {
    (0..table.width())
        .map(|col| classify_column(table, col, config))
        .collect()
}

fn classify_column(table: &RawTable, col: usize, config: &ClassifierConfig) -> ClassifiedColumn {
    let name = table.columns[col].clone();
    let hint = name_hint(&name);

    let sample: Vec<&CellValue> = table
        .column(col)
        .filter(|c| !c.is_null())
        .take(config.sample_size.max(1))
        .collect();
    let numbers: Vec<f64> = sample.iter().filter_map(|c| cell_number(c)).collect();
    let n_datetime = sample.iter().filter(|c| cell_datetime(c).is_some()).count();
    let distinct = table.distinct_non_null(col).count();

    let mut evidence = Evidence {
        name_hint: hint,
        sampled: sample.len(),
        numeric: numbers.len(),
        datetime: n_datetime,
        distinct,
        ambiguous: false,
    };

    let holds = |count: usize| {
        !sample.is_empty() && count as f64 / sample.len() as f64 >= config.min_parse_ratio
    };
    let numeric_holds = holds(numbers.len());
    let datetime_holds = holds(n_datetime);

    let category = if sample.is_empty() || distinct <= 1 {
        ColumnCategory::Categorical
    } else if hint == Some(NameHint::Latitude)
        && numeric_holds
        && numbers.iter().all(|v| (-90.0..=90.0).contains(v))
    {
        ColumnCategory::Latitude
    } else if hint == Some(NameHint::Longitude)
        && numeric_holds
        && numbers.iter().all(|v| (-180.0..=180.0).contains(v))
    {
        ColumnCategory::Longitude
    } else if hint == Some(NameHint::Time) && (datetime_holds || numeric_holds) {
        let year_extractable = datetime_holds
            || numbers
                .iter()
                .all(|v| v.fract() == 0.0 && (1000.0..=9999.0).contains(v));
        ColumnCategory::Datetime { year_extractable }
    } else if datetime_holds {
        ColumnCategory::Datetime {
            year_extractable: true,
        }
    } else if hint == Some(NameHint::Identifier) && all_distinct(&sample) {
        ColumnCategory::Identifier
    } else if numeric_holds {
        ColumnCategory::Numeric
    } else {
        evidence.ambiguous = !numbers.is_empty() || n_datetime > 0;
        ColumnCategory::Categorical
    };

    if evidence.ambiguous {
        log::debug!(
            "Column '{name}': {}/{} numeric, {}/{} dates; defaulting to categorical",
            evidence.numeric,
            evidence.sampled,
            evidence.datetime,
            evidence.sampled
        );
    }

    ClassifiedColumn {
        name,
        category,
        evidence,
    }
}

fn all_distinct(sample: &[&CellValue]) -> bool {
    let mut seen: HashSet<&CellValue> = HashSet::with_capacity(sample.len());
    sample.iter().all(|v| seen.insert(*v))
}
