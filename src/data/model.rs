use std::collections::BTreeSet;
use std::fmt;

use chrono::{Datelike, NaiveDateTime, Timelike};

// ---------------------------------------------------------------------------
// CellValue – a single cell of a loaded table
// ---------------------------------------------------------------------------

/// A dynamically-typed cell value.
/// Tables index their unique values in `BTreeSet`s, so `CellValue` must be `Ord`.
#[derive(Debug, Clone, PartialEq)]
pub enum CellValue {
    Null,
    Bool(bool),
    Integer(i64),
    Float(f64),
    Text(String),
    DateTime(NaiveDateTime),
}

// -- Manual Eq/Ord so we can put CellValue in BTreeSet --

impl Eq for CellValue {}

impl PartialOrd for CellValue {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for CellValue {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        use CellValue::*;
        fn discriminant(v: &CellValue) -> u8 {
            match v {
                Null => 0,
                Bool(_) => 1,
                Integer(_) => 2,
                Float(_) => 3,
                Text(_) => 4,
                DateTime(_) => 5,
            }
        }
        let da = discriminant(self);
        let db = discriminant(other);
        if da != db {
            return da.cmp(&db);
        }
        match (self, other) {
            (Null, Null) => std::cmp::Ordering::Equal,
            (Bool(a), Bool(b)) => a.cmp(b),
            (Integer(a), Integer(b)) => a.cmp(b),
            (Float(a), Float(b)) => a.total_cmp(b),
            (Text(a), Text(b)) => a.cmp(b),
            (DateTime(a), DateTime(b)) => a.cmp(b),
            _ => std::cmp::Ordering::Equal,
        }
    }
}

impl std::hash::Hash for CellValue {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            CellValue::Text(s) => s.hash(state),
            CellValue::Integer(i) => i.hash(state),
            CellValue::Float(f) => f.to_bits().hash(state),
            CellValue::Bool(b) => b.hash(state),
            CellValue::DateTime(d) => d.hash(state),
            CellValue::Null => {}
        }
    }
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CellValue::Text(s) => write!(f, "{s}"),
            CellValue::Integer(i) => write!(f, "{i}"),
            CellValue::Float(v) => write!(f, "{v}"),
            CellValue::Bool(b) => write!(f, "{b}"),
            CellValue::DateTime(d) => {
                if d.hour() == 0 && d.minute() == 0 && d.second() == 0 {
                    write!(f, "{}", d.format("%Y-%m-%d"))
                } else {
                    write!(f, "{}", d.format("%Y-%m-%d %H:%M:%S"))
                }
            }
            CellValue::Null => write!(f, "<null>"),
        }
    }
}

impl CellValue {
    pub fn is_null(&self) -> bool {
        matches!(self, CellValue::Null)
    }

    /// Numeric view of the value; only numbers qualify, text is never parsed here.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            CellValue::Float(v) => Some(*v),
            CellValue::Integer(i) => Some(*i as f64),
            _ => None,
        }
    }

    /// Calendar year carried by the value: the year of a timestamp, or a
    /// whole number with four digits.
    pub fn year(&self) -> Option<i32> {
        match self {
            CellValue::DateTime(d) => Some(d.year()),
            CellValue::Integer(i) if (1000..=9999).contains(i) => Some(*i as i32),
            CellValue::Float(v) if v.fract() == 0.0 && (1000.0..=9999.0).contains(v) => {
                Some(*v as i32)
            }
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// RawTable – rows × named columns as read from a file
// ---------------------------------------------------------------------------

/// A loaded table with a pre-computed unique-value index per column.
///
/// Every row holds exactly `columns.len()` cells; [`RawTable::new`] pads
/// short rows with [`CellValue::Null`] and truncates long ones.
#[derive(Debug, Clone, PartialEq)]
pub struct RawTable {
    /// Ordered column names.
    pub columns: Vec<String>,
    /// Row-major cells.
    pub rows: Vec<Vec<CellValue>>,
    /// For each column (same order as `columns`) the sorted set of unique values.
    pub unique_values: Vec<BTreeSet<CellValue>>,
}

impl RawTable {
    /// Build the table and its column indices.
    pub fn new(columns: Vec<String>, mut rows: Vec<Vec<CellValue>>) -> Self {
        let width = columns.len();
        let mut unique_values: Vec<BTreeSet<CellValue>> = vec![BTreeSet::new(); width];

        for row in &mut rows {
            row.resize(width, CellValue::Null);
            for (col, value) in row.iter().enumerate() {
                unique_values[col].insert(value.clone());
            }
        }

        RawTable {
            columns,
            rows,
            unique_values,
        }
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Whether the table has no rows.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Number of columns.
    pub fn width(&self) -> usize {
        self.columns.len()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// All cells of one column, top to bottom.
    pub fn column(&self, index: usize) -> impl Iterator<Item = &CellValue> + '_ {
        self.rows.iter().map(move |row| &row[index])
    }

    /// Unique non-null values of a column.
    pub fn distinct_non_null(&self, index: usize) -> impl Iterator<Item = &CellValue> + '_ {
        self.unique_values[index].iter().filter(|v| !v.is_null())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn short_rows_are_padded_with_null() {
        let table = RawTable::new(
            vec!["a".into(), "b".into()],
            vec![vec![CellValue::Integer(1)], vec![CellValue::Integer(2), CellValue::Text("x".into())]],
        );
        assert_eq!(table.rows[0], vec![CellValue::Integer(1), CellValue::Null]);
        assert_eq!(table.width(), 2);
        assert!(table.unique_values[1].contains(&CellValue::Null));
        assert_eq!(table.distinct_non_null(1).count(), 1);
    }

    #[test]
    fn ordering_groups_by_kind_first() {
        let mut values = vec![
            CellValue::Text("b".into()),
            CellValue::Float(2.5),
            CellValue::Null,
            CellValue::Integer(7),
        ];
        values.sort();
        assert_eq!(values[0], CellValue::Null);
        assert_eq!(values[1], CellValue::Integer(7));
        assert_eq!(values[3], CellValue::Text("b".into()));
    }

    #[test]
    fn midnight_timestamps_display_as_dates() {
        let d = NaiveDate::from_ymd_opt(2021, 3, 4)
            .and_then(|d| d.and_hms_opt(0, 0, 0))
            .unwrap();
        assert_eq!(CellValue::DateTime(d).to_string(), "2021-03-04");
        assert_eq!(CellValue::DateTime(d).year(), Some(2021));
        assert_eq!(CellValue::Float(3.0).to_string(), "3");
    }

    #[test]
    fn year_requires_four_digit_whole_numbers() {
        assert_eq!(CellValue::Integer(2019).year(), Some(2019));
        assert_eq!(CellValue::Float(2019.0).year(), Some(2019));
        assert_eq!(CellValue::Float(2019.5).year(), None);
        assert_eq!(CellValue::Integer(12).year(), None);
        assert_eq!(CellValue::Text("2019".into()).year(), None);
    }
}
