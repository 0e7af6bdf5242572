use std::collections::BTreeSet;

use chrono::{Datelike, NaiveDateTime};

use super::classify::{ClassifiedColumn, ColumnCategory};
use super::error::FilterError;
use super::model::{CellValue, RawTable};

// ---------------------------------------------------------------------------
// Filter specs
// ---------------------------------------------------------------------------

/// How a single column restricts rows.
#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    /// Cell equals the operand (numbers numerically, everything else by text).
    Equals(CellValue),
    /// Inclusive numeric range; at least one bound must be set.
    Range { min: Option<f64>, max: Option<f64> },
    /// Cell equals one of the members.  An empty set matches nothing.
    OneOf(BTreeSet<CellValue>),
}

/// One user-defined row-selection predicate.
#[derive(Debug, Clone, PartialEq)]
pub struct FilterSpec {
    pub column: String,
    pub predicate: Predicate,
}

impl FilterSpec {
    pub fn equals(column: impl Into<String>, value: CellValue) -> Self {
        Self {
            column: column.into(),
            predicate: Predicate::Equals(value),
        }
    }

    pub fn range(column: impl Into<String>, min: Option<f64>, max: Option<f64>) -> Self {
        Self {
            column: column.into(),
            predicate: Predicate::Range { min, max },
        }
    }

    pub fn one_of(column: impl Into<String>, values: impl IntoIterator<Item = CellValue>) -> Self {
        Self {
            column: column.into(),
            predicate: Predicate::OneOf(values.into_iter().collect()),
        }
    }
}

// ---------------------------------------------------------------------------
// Filtered view
// ---------------------------------------------------------------------------

/// Rows of a table that pass the active filters, as ascending row indices.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FilteredView {
    pub indices: Vec<usize>,
}

impl FilteredView {
    /// Every row of a table with `len` rows.
    pub fn all(len: usize) -> Self {
        Self {
            indices: (0..len).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.indices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    /// The visible rows of `table`.
    pub fn rows<'a>(&'a self, table: &'a RawTable) -> impl Iterator<Item = &'a [CellValue]> + 'a {
        self.indices.iter().map(move |&i| table.rows[i].as_slice())
    }

    /// The visible cells of one column.
    pub fn column<'a>(&'a self, table: &'a RawTable, col: usize) -> impl Iterator<Item = &'a CellValue> + 'a {
        self.indices.iter().map(move |&i| &table.rows[i][col])
    }
}

// ---------------------------------------------------------------------------
// Evaluation
// ---------------------------------------------------------------------------

struct Compiled<'a> {
    col: usize,
    category: ColumnCategory,
    predicate: &'a Predicate,
}

/// Return the rows passing every spec (logical AND).  With no specs the
/// view holds every row.  The table is never modified.
pub fn apply(
    table: &RawTable,
    columns: &[ClassifiedColumn],
    specs: &[FilterSpec],
) -> Result<FilteredView, FilterError> {
    let compiled = specs
        .iter()
        .map(|spec| compile(table, columns, spec))
        .collect::<Result<Vec<_>, _>>()?;

    if compiled.is_empty() {
        return Ok(FilteredView::all(table.len()));
    }

    let indices = table
        .rows
        .iter()
        .enumerate()
        .filter(|(_, row)| compiled.iter().all(|c| passes(&row[c.col], c.category, c.predicate)))
        .map(|(i, _)| i)
        .collect();

    Ok(FilteredView { indices })
}

fn compile<'a>(
    table: &RawTable,
    columns: &[ClassifiedColumn],
    spec: &'a FilterSpec,
) -> Result<Compiled<'a>, FilterError> {
    let col = table
        .column_index(&spec.column)
        .ok_or_else(|| FilterError::UnknownColumn(spec.column.clone()))?;
    let category = columns
        .iter()
        .find(|c| c.name == spec.column)
        .map(|c| c.category)
        .ok_or_else(|| FilterError::UnknownColumn(spec.column.clone()))?;

    let malformed = |reason: &str| FilterError::MalformedPredicate {
        column: spec.column.clone(),
        reason: reason.to_string(),
    };

    if let Predicate::Range { min, max } = &spec.predicate {
        if min.is_none() && max.is_none() {
            return Err(malformed("range needs a lower or an upper bound"));
        }
        if min.iter().chain(max.iter()).any(|b| !b.is_finite()) {
            return Err(malformed("range bounds must be finite numbers"));
        }
        if let (Some(lo), Some(hi)) = (min, max) {
            if lo > hi {
                return Err(malformed("range minimum exceeds maximum"));
            }
        }
        if !(category.is_numeric_valued() || category.is_datetime()) {
            return Err(malformed("range filters need a numeric or datetime column"));
        }
    }

    Ok(Compiled {
        col,
        category,
        predicate: &spec.predicate,
    })
}

fn passes(cell: &CellValue, category: ColumnCategory, predicate: &Predicate) -> bool {
    match predicate {
        Predicate::Equals(operand) => equals(cell, operand, category),
        Predicate::OneOf(members) => members.iter().any(|m| equals(cell, m, category)),
        Predicate::Range { min, max } => match range_value(cell, category) {
            Some(v) => min.map_or(true, |lo| v >= lo) && max.map_or(true, |hi| v <= hi),
            None => false,
        },
    }
}

fn equals(cell: &CellValue, operand: &CellValue, category: ColumnCategory) -> bool {
    if cell.is_null() || operand.is_null() {
        return cell.is_null() && operand.is_null();
    }
    if category.is_year_extractable() {
        if let (Some(year), CellValue::Integer(wanted)) = (cell.year(), operand) {
            return i64::from(year) == *wanted;
        }
    }
    match (cell.as_f64(), operand.as_f64()) {
        (Some(a), Some(b)) => a == b,
        _ => cell.to_string() == operand.to_string(),
    }
}

/// Number compared against range bounds: the year for year-extractable
/// datetimes, a fractional year for other timestamps, the value otherwise.
fn range_value(cell: &CellValue, category: ColumnCategory) -> Option<f64> {
    if category.is_year_extractable() {
        return cell.year().map(f64::from);
    }
    match cell {
        CellValue::DateTime(d) => Some(fractional_year(d)),
        other => other.as_f64(),
    }
}

fn fractional_year(d: &NaiveDateTime) -> f64 {
    let y = d.year();
    let leap = (y % 4 == 0 && y % 100 != 0) || y % 400 == 0;
    let days_in_year = if leap { 366.0 } else { 365.0 };
    f64::from(d.year()) + f64::from(d.ordinal0()) / days_in_year
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::classify::{classify_table, ClassifierConfig};
    use crate::data::coerce::coerce_table;

    fn table() -> (RawTable, Vec<ClassifiedColumn>) {
        let raw = RawTable::new(
            vec!["species".into(), "height".into(), "year".into()],
            vec![
                vec!["pine", "12.5", "2019"],
                vec!["spruce", "20", "2020"],
                vec!["birch", "7", "2021"],
                vec!["pine", "oops", "2021"],
                vec!["birch", "15", "2020"],
            ]
            .into_iter()
            .map(|row: Vec<&str>| row.into_iter().map(|s| CellValue::Text(s.to_string())).collect())
            .collect(),
        );
        let columns = classify_table(&raw, &ClassifierConfig::default());
        (coerce_table(&raw, &columns), columns)
    }

    #[test]
    fn no_specs_is_identity() {
        let (t, cols) = table();
        let view = apply(&t, &cols, &[]).unwrap();
        assert_eq!(view, FilteredView::all(t.len()));
        assert_eq!(view.rows(&t).count(), 5);
    }

    #[test]
    fn unknown_column_is_rejected() {
        let (t, cols) = table();
        let err = apply(&t, &cols, &[FilterSpec::equals("colour", CellValue::Text("red".into()))]).unwrap_err();
        assert_eq!(err, FilterError::UnknownColumn("colour".into()));
    }

    #[test]
    fn specs_combine_with_and() {
        let (t, cols) = table();
        let specs = [
            FilterSpec::equals("species", CellValue::Text("pine".into())),
            FilterSpec::range("height", Some(10.0), None),
        ];
        assert_eq!(apply(&t, &cols, &specs).unwrap().indices, vec![0]);
    }

    #[test]
    fn year_ranges_and_membership() {
        let (t, cols) = table();
        let range = [FilterSpec::range("year", Some(2020.0), Some(2021.0))];
        assert_eq!(apply(&t, &cols, &range).unwrap().indices, vec![1, 2, 3, 4]);

        let years = [FilterSpec::one_of("year", [CellValue::Integer(2019), CellValue::Integer(2021)])];
        assert_eq!(apply(&t, &cols, &years).unwrap().indices, vec![0, 2, 3]);
    }

    #[test]
    fn equality_compares_numbers_numerically() {
        let (t, cols) = table();
        let spec = [FilterSpec::equals("height", CellValue::Float(20.0))];
        assert_eq!(apply(&t, &cols, &spec).unwrap().indices, vec![1]);
        let as_text = [FilterSpec::equals("height", CellValue::Text("20".into()))];
        assert_eq!(apply(&t, &cols, &as_text).unwrap().indices, vec![1]);
    }

    #[test]
    fn empty_membership_hides_everything() {
        let (t, cols) = table();
        let spec = [FilterSpec::one_of("species", Vec::<CellValue>::new())];
        assert!(apply(&t, &cols, &spec).unwrap().is_empty());
    }

    #[test]
    fn malformed_ranges_are_rejected() {
        let (t, cols) = table();
        for spec in [
            FilterSpec::range("height", None, None),
            FilterSpec::range("height", Some(5.0), Some(1.0)),
            FilterSpec::range("height", Some(f64::NAN), None),
            FilterSpec::range("species", Some(1.0), None),
        ] {
            let err = apply(&t, &cols, &[spec]).unwrap_err();
            assert!(matches!(err, FilterError::MalformedPredicate { .. }), "{err}");
        }
    }

    #[test]
    fn filtering_never_touches_the_table() {
        let (t, cols) = table();
        let before = t.clone();
        let _ = apply(&t, &cols, &[FilterSpec::range("height", Some(0.0), Some(10.0))]).unwrap();
        assert_eq!(t, before);
    }
}
