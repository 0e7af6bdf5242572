//! Header and cell clean-up applied to every freshly loaded table.

use std::collections::HashSet;

use super::model::{CellValue, RawTable};

/// Text values that mean "no value".
pub const EMPTY_TOKENS: &[&str] = &["", "-", "NA", "N/A", "nan", "NaN"];

pub fn is_empty_token(s: &str) -> bool {
    EMPTY_TOKENS.contains(&s.trim())
}

/// Reduce a header to letters, digits and underscores; runs of anything
/// else collapse into one underscore, outer underscores are trimmed.
fn clean_header(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut prev_underscore = false;
    for ch in name.trim().chars() {
        if ch.is_alphanumeric() || ch == '_' {
            out.push(ch);
            prev_underscore = ch == '_';
        } else if !prev_underscore {
            out.push('_');
            prev_underscore = true;
        }
    }
    let trimmed = out.trim_matches('_');
    if trimmed.is_empty() {
        "col".to_string()
    } else {
        trimmed.to_string()
    }
}

/// Clean headers and make them unique with `__1`, `__2`, … suffixes.
pub fn normalize_headers(names: &[String]) -> Vec<String> {
    let mut seen: HashSet<String> = HashSet::new();
    let mut out = Vec::with_capacity(names.len());
    for name in names {
        let base = clean_header(name);
        let mut candidate = base.clone();
        let mut suffix = 1;
        while seen.contains(&candidate) {
            candidate = format!("{base}__{suffix}");
            suffix += 1;
        }
        seen.insert(candidate.clone());
        out.push(candidate);
    }
    out
}

/// Normalize headers, turn empty tokens into nulls and drop rows and
/// columns that hold nothing but nulls.
pub fn normalize_table(table: RawTable) -> RawTable {
    let columns = normalize_headers(&table.columns);

    let rows: Vec<Vec<CellValue>> = table
        .rows
        .into_iter()
        .map(|row| {
            row.into_iter()
                .map(|cell| match cell {
                    CellValue::Text(s) if is_empty_token(&s) => CellValue::Null,
                    CellValue::Text(s) => CellValue::Text(s.trim().to_string()),
                    CellValue::Float(v) if !v.is_finite() => CellValue::Null,
                    other => other,
                })
                .collect()
        })
        .filter(|row: &Vec<CellValue>| row.iter().any(|c| !c.is_null()))
        .collect();

    let keep: Vec<usize> = (0..columns.len())
        .filter(|&col| rows.iter().any(|row| !row[col].is_null()))
        .collect();

    if keep.len() == columns.len() {
        return RawTable::new(columns, rows);
    }

    let dropped: Vec<&str> = (0..columns.len())
        .filter(|c| !keep.contains(c))
        .map(|c| columns[c].as_str())
        .collect();
    log::debug!("Dropping all-empty columns {dropped:?}");

    let kept_columns = keep.iter().map(|&c| columns[c].clone()).collect();
    let kept_rows = rows
        .into_iter()
        .map(|row| keep.iter().map(|&c| row[c].clone()).collect())
        .collect();
    RawTable::new(kept_columns, kept_rows)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(v: &[&str]) -> Vec<String> {
        v.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn headers_are_cleaned_and_deduplicated() {
        let got = normalize_headers(&names(&["KKJx-coordinate", "a b", "a  b", " ", "a_b", "päivä (pvm)"]));
        assert_eq!(got, names(&["KKJx_coordinate", "a_b", "a_b__1", "col", "a_b__2", "päivä_pvm"]));
    }

    #[test]
    fn empty_tokens_become_null_and_empty_lines_disappear() {
        let table = RawTable::new(
            names(&["name", "value", "blank"]),
            vec![
                vec![CellValue::Text("a".into()), CellValue::Text("NA".into()), CellValue::Text("".into())],
                vec![CellValue::Text("-".into()), CellValue::Text(" ".into()), CellValue::Null],
                vec![CellValue::Text(" b ".into()), CellValue::Text("2".into()), CellValue::Text("N/A".into())],
            ],
        );
        let out = normalize_table(table);
        assert_eq!(out.columns, names(&["name", "value"]));
        assert_eq!(out.len(), 2);
        assert_eq!(out.rows[0], vec![CellValue::Text("a".into()), CellValue::Null]);
        assert_eq!(out.rows[1], vec![CellValue::Text("b".into()), CellValue::Text("2".into())]);
    }
}
