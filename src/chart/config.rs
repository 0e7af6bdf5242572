use std::fmt;

use thiserror::Error;

use crate::data::classify::{ClassifiedColumn, ColumnCategory};

// ---------------------------------------------------------------------------
// Chart kinds and specs
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ChartKind {
    Map,
    Bar,
    Pie,
    Histogram,
    Box,
    Line,
    Scatter,
}

impl ChartKind {
    pub const ALL: [ChartKind; 7] = [
        ChartKind::Map,
        ChartKind::Bar,
        ChartKind::Pie,
        ChartKind::Histogram,
        ChartKind::Box,
        ChartKind::Line,
        ChartKind::Scatter,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            ChartKind::Map => "Map",
            ChartKind::Bar => "Bar",
            ChartKind::Pie => "Pie",
            ChartKind::Histogram => "Histogram",
            ChartKind::Box => "Box",
            ChartKind::Line => "Time series",
            ChartKind::Scatter => "Scatter",
        }
    }
}

impl fmt::Display for ChartKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Axis and column bindings handed to the renderer.  For maps `x` is the
/// longitude column and `y` the latitude column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChartSpec {
    pub kind: ChartKind,
    pub x: Option<String>,
    pub y: Option<String>,
    pub color: Option<String>,
    pub size: Option<String>,
}

/// Explicit user selections; any `Some` beats the computed default.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChartOverrides {
    pub x: Option<String>,
    pub y: Option<String>,
    pub color: Option<String>,
    pub size: Option<String>,
}

/// Column category a chart kind cannot do without.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Requirement {
    CoordinatePair,
    DatetimeColumn,
    NumericColumn,
    TwoNumericColumns,
    AnyColumn,
}

impl fmt::Display for Requirement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Requirement::CoordinatePair => "a latitude and a longitude column",
            Requirement::DatetimeColumn => "a date or time column",
            Requirement::NumericColumn => "a numeric column",
            Requirement::TwoNumericColumns => "two numeric columns",
            Requirement::AnyColumn => "at least one column",
        })
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum ChartError {
    #[error("{kind} chart unavailable: needs {missing}")]
    Unavailable { kind: ChartKind, missing: Requirement },

    #[error("{kind} chart: unknown column '{column}'")]
    UnknownColumn { kind: ChartKind, column: String },
}

// ---------------------------------------------------------------------------
// Default bindings
// ---------------------------------------------------------------------------

fn first<'a>(columns: &'a [ClassifiedColumn], pred: impl Fn(&ColumnCategory) -> bool) -> Option<&'a str> {
    columns
        .iter()
        .find(|c| pred(&c.category))
        .map(|c| c.name.as_str())
}

fn first_numeric(columns: &[ClassifiedColumn]) -> Option<&str> {
    first(columns, |c| *c == ColumnCategory::Numeric).or_else(|| first(columns, ColumnCategory::is_numeric_valued))
}

fn first_categorical(columns: &[ClassifiedColumn]) -> Option<&str> {
    first(columns, ColumnCategory::is_categorical)
}

/// Resolve the bindings for `kind`.  Overrides always win over defaults; a
/// kind whose required column has neither a default nor an override is
/// reported as unavailable instead of being downgraded.
pub fn configure(
    columns: &[ClassifiedColumn],
    kind: ChartKind,
    overrides: &ChartOverrides,
) -> Result<ChartSpec, ChartError> {
    for name in [&overrides.x, &overrides.y, &overrides.color, &overrides.size]
        .into_iter()
        .flatten()
    {
        if !columns.iter().any(|c| &c.name == name) {
            return Err(ChartError::UnknownColumn {
                kind,
                column: name.clone(),
            });
        }
    }

    let pick = |explicit: &Option<String>, default: Option<&str>| -> Option<String> {
        explicit.clone().or_else(|| default.map(str::to_string))
    };
    let unavailable = |missing| ChartError::Unavailable { kind, missing };

    let (x, y) = match kind {
        ChartKind::Map => {
            let lon = pick(&overrides.x, first(columns, |c| *c == ColumnCategory::Longitude));
            let lat = pick(&overrides.y, first(columns, |c| *c == ColumnCategory::Latitude));
            match (lon, lat) {
                (Some(lon), Some(lat)) => (Some(lon), Some(lat)),
                _ => return Err(unavailable(Requirement::CoordinatePair)),
            }
        }
        ChartKind::Line => {
            let t = pick(&overrides.x, first(columns, ColumnCategory::is_datetime))
                .ok_or_else(|| unavailable(Requirement::DatetimeColumn))?;
            let v = pick(&overrides.y, first_numeric(columns))
                .ok_or_else(|| unavailable(Requirement::NumericColumn))?;
            (Some(t), Some(v))
        }
        ChartKind::Bar => {
            let x = pick(
                &overrides.x,
                first_categorical(columns).or_else(|| columns.first().map(|c| c.name.as_str())),
            )
            .ok_or_else(|| unavailable(Requirement::AnyColumn))?;
            (Some(x), pick(&overrides.y, first_numeric(columns)))
        }
        ChartKind::Pie => {
            let x = pick(
                &overrides.x,
                first_categorical(columns).or_else(|| columns.first().map(|c| c.name.as_str())),
            )
            .ok_or_else(|| unavailable(Requirement::AnyColumn))?;
            (Some(x), None)
        }
        ChartKind::Histogram => {
            let x = pick(&overrides.x, first_numeric(columns))
                .ok_or_else(|| unavailable(Requirement::NumericColumn))?;
            (Some(x), None)
        }
        ChartKind::Box => {
            let y = pick(&overrides.y, first_numeric(columns))
                .ok_or_else(|| unavailable(Requirement::NumericColumn))?;
            let default_x = first_categorical(columns)
                .or_else(|| columns.iter().map(|c| c.name.as_str()).find(|n| *n != y));
            let x = pick(&overrides.x, default_x).ok_or_else(|| unavailable(Requirement::AnyColumn))?;
            (Some(x), Some(y))
        }
        ChartKind::Scatter => {
            let mut numeric = columns
                .iter()
                .filter(|c| c.category.is_numeric_valued())
                .map(|c| c.name.as_str());
            let default_x = numeric.next();
            let default_y = numeric.next();
            match (pick(&overrides.x, default_x), pick(&overrides.y, default_y)) {
                (Some(x), Some(y)) => (Some(x), Some(y)),
                _ => return Err(unavailable(Requirement::TwoNumericColumns)),
            }
        }
    };

    Ok(ChartSpec {
        kind,
        x,
        y,
        color: overrides.color.clone(),
        size: overrides.size.clone(),
    })
}

/// Chart kinds whose default bindings resolve for these columns.
pub fn available_kinds(columns: &[ClassifiedColumn]) -> Vec<ChartKind> {
    ChartKind::ALL
        .into_iter()
        .filter(|kind| configure(columns, *kind, &ChartOverrides::default()).is_ok())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::classify::Evidence;

    fn col(name: &str, category: ColumnCategory) -> ClassifiedColumn {
        ClassifiedColumn {
            name: name.to_string(),
            category,
            evidence: Evidence::default(),
        }
    }

    fn plain_table() -> Vec<ClassifiedColumn> {
        vec![
            col("species", ColumnCategory::Categorical),
            col("height", ColumnCategory::Numeric),
            col("year", ColumnCategory::Datetime { year_extractable: true }),
            col("diameter", ColumnCategory::Numeric),
        ]
    }

    #[test]
    fn map_without_coordinates_is_unavailable() {
        let err = configure(&plain_table(), ChartKind::Map, &ChartOverrides::default()).unwrap_err();
        assert_eq!(
            err,
            ChartError::Unavailable {
                kind: ChartKind::Map,
                missing: Requirement::CoordinatePair
            }
        );
        assert!(!available_kinds(&plain_table()).contains(&ChartKind::Map));
    }

    #[test]
    fn map_binds_longitude_to_x() {
        let mut columns = plain_table();
        columns.push(col("lat", ColumnCategory::Latitude));
        columns.push(col("lon", ColumnCategory::Longitude));
        let spec = configure(&columns, ChartKind::Map, &ChartOverrides::default()).unwrap();
        assert_eq!(spec.x.as_deref(), Some("lon"));
        assert_eq!(spec.y.as_deref(), Some("lat"));
    }

    #[test]
    fn time_series_uses_first_datetime() {
        let spec = configure(&plain_table(), ChartKind::Line, &ChartOverrides::default()).unwrap();
        assert_eq!(spec.x.as_deref(), Some("year"));
        assert_eq!(spec.y.as_deref(), Some("height"));
    }

    #[test]
    fn overrides_beat_defaults() {
        let overrides = ChartOverrides {
            x: Some("diameter".into()),
            y: Some("height".into()),
            color: Some("species".into()),
            size: None,
        };
        let spec = configure(&plain_table(), ChartKind::Bar, &overrides).unwrap();
        assert_eq!(spec.x.as_deref(), Some("diameter"));
        assert_eq!(spec.color.as_deref(), Some("species"));
    }

    #[test]
    fn overriding_both_axes_makes_a_map_possible() {
        let overrides = ChartOverrides {
            x: Some("diameter".into()),
            y: Some("height".into()),
            ..Default::default()
        };
        assert!(configure(&plain_table(), ChartKind::Map, &overrides).is_ok());
    }

    #[test]
    fn unknown_override_column_is_rejected() {
        let overrides = ChartOverrides {
            x: Some("colour".into()),
            ..Default::default()
        };
        let err = configure(&plain_table(), ChartKind::Pie, &overrides).unwrap_err();
        assert!(matches!(err, ChartError::UnknownColumn { .. }));
    }

    #[test]
    fn defaults_prefer_categorical_x_and_numeric_y() {
        let bar = configure(&plain_table(), ChartKind::Bar, &ChartOverrides::default()).unwrap();
        assert_eq!(bar.x.as_deref(), Some("species"));
        assert_eq!(bar.y.as_deref(), Some("height"));

        let scatter = configure(&plain_table(), ChartKind::Scatter, &ChartOverrides::default()).unwrap();
        assert_eq!(scatter.x.as_deref(), Some("height"));
        assert_eq!(scatter.y.as_deref(), Some("diameter"));
    }

    #[test]
    fn text_only_table_has_no_numeric_charts() {
        let columns = vec![col("species", ColumnCategory::Categorical)];
        assert_eq!(available_kinds(&columns), vec![ChartKind::Bar, ChartKind::Pie]);
    }
}
