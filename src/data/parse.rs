//! Value-shape parsing shared by the classifier and the cell coercion step.

use chrono::{DateTime, NaiveDate, NaiveDateTime};

use super::model::CellValue;

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%d.%m.%Y %H:%M",
];

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%d.%m.%Y", "%d/%m/%Y", "%Y/%m/%d"];

/// Parse a number, accepting a decimal comma (`"1,5"`).
pub fn parse_number(s: &str) -> Option<f64> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }
    let value = match s.parse::<f64>() {
        Ok(v) => v,
        Err(_) if s.matches(',').count() == 1 && !s.contains('.') => {
            s.replace(',', ".").parse::<f64>().ok()?
        }
        Err(_) => return None,
    };
    value.is_finite().then_some(value)
}

/// Parse a whole number, accepting `"12"` and `"12.0"` but not `"12.5"`.
pub fn parse_integer(s: &str) -> Option<i64> {
    let s = s.trim();
    if let Ok(i) = s.parse::<i64>() {
        return Some(i);
    }
    let v = parse_number(s)?;
    (v.fract() == 0.0 && v.abs() < i64::MAX as f64).then_some(v as i64)
}

/// Parse a date or timestamp in one of the supported layouts.
pub fn parse_datetime(s: &str) -> Option<NaiveDateTime> {
    let s = s.trim();
    // Every supported layout has a separator; bare numbers are never dates.
    if s.len() < 6 || !s.contains(['-', '.', '/']) {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.naive_utc());
    }
    for fmt in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(dt);
        }
    }
    for fmt in DATE_FORMATS {
        if let Ok(d) = NaiveDate::parse_from_str(s, fmt) {
            return d.and_hms_opt(0, 0, 0);
        }
    }
    None
}

/// Numeric reading of a cell: numbers as-is, text parsed.
pub fn cell_number(cell: &CellValue) -> Option<f64> {
    match cell {
        CellValue::Integer(i) => Some(*i as f64),
        CellValue::Float(v) if v.is_finite() => Some(*v),
        CellValue::Text(s) => parse_number(s),
        _ => None,
    }
}

/// Timestamp reading of a cell: timestamps as-is, text parsed.
pub fn cell_datetime(cell: &CellValue) -> Option<NaiveDateTime> {
    match cell {
        CellValue::DateTime(d) => Some(*d),
        CellValue::Text(s) => parse_datetime(s),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Datelike;

    #[test]
    fn numbers_accept_decimal_comma() {
        assert_eq!(parse_number("1,5"), Some(1.5));
        assert_eq!(parse_number(" 42 "), Some(42.0));
        assert_eq!(parse_number("1,000.5"), None);
        assert_eq!(parse_number("abc"), None);
        assert_eq!(parse_number("NaN"), None);
        assert_eq!(parse_integer("12.0"), Some(12));
        assert_eq!(parse_integer("12.5"), None);
    }

    #[test]
    fn dates_in_common_layouts() {
        for s in ["2021-06-01", "01.06.2021", "01/06/2021", "2021/06/01", "2021-06-01T10:00:00Z"] {
            let d = parse_datetime(s).unwrap_or_else(|| panic!("{s} should parse"));
            assert_eq!(d.year(), 2021);
            assert_eq!(d.month(), 6);
        }
    }

    #[test]
    fn bare_numbers_are_not_dates() {
        assert_eq!(parse_datetime("2019"), None);
        assert_eq!(parse_datetime("1.5"), None);
        assert_eq!(parse_datetime("20190101"), None);
    }
}
