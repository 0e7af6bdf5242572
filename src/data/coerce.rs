use super::classify::{ClassifiedColumn, ColumnCategory};
use super::model::{CellValue, RawTable};
use super::parse::{cell_datetime, parse_integer, parse_number};

/// Fractional digits kept on every float cell.
pub const DECIMALS: i32 = 3;

pub fn round_decimals(v: f64) -> f64 {
    let scale = 10f64.powi(DECIMALS);
    (v * scale).round() / scale
}

/// Rewrite every cell into the type its column was classified as.
/// Cells that do not fit become [`CellValue::Null`]; the column set and row
/// order are unchanged.
pub fn coerce_table(table: &RawTable, columns: &[ClassifiedColumn]) -> RawTable {
    let mut nulled = 0usize;
    let rows = table
        .rows
        .iter()
        .map(|row| {
            row.iter()
                .zip(columns)
                .map(|(cell, column)| {
                    let typed = coerce_cell(cell, column.category);
                    if typed.is_null() && !cell.is_null() {
                        nulled += 1;
                    }
                    typed
                })
                .collect()
        })
        .collect();

    if nulled > 0 {
        log::info!("Coerced {nulled} malformed cells to null");
    }

    RawTable::new(table.columns.clone(), rows)
}

pub fn coerce_cell(cell: &CellValue, category: ColumnCategory) -> CellValue {
    if cell.is_null() {
        return CellValue::Null;
    }
    let typed = match category {
        ColumnCategory::Latitude => within(to_number(cell), 90.0),
        ColumnCategory::Longitude => within(to_number(cell), 180.0),
        ColumnCategory::Numeric => to_number(cell),
        ColumnCategory::Datetime { .. } => match cell_datetime(cell) {
            Some(d) => CellValue::DateTime(d),
            None => to_number(cell),
        },
        ColumnCategory::Categorical | ColumnCategory::Identifier => cell.clone(),
    };
    match typed {
        CellValue::Float(v) => CellValue::Float(round_decimals(v)),
        other => other,
    }
}

fn to_number(cell: &CellValue) -> CellValue {
    match cell {
        CellValue::Integer(_) => cell.clone(),
        CellValue::Float(v) if v.is_finite() => cell.clone(),
        CellValue::Text(s) => match parse_integer(s) {
            Some(i) if !s.contains(['.', ',']) => CellValue::Integer(i),
            _ => parse_number(s).map_or(CellValue::Null, CellValue::Float),
        },
        _ => CellValue::Null,
    }
}

fn within(cell: CellValue, bound: f64) -> CellValue {
    match cell.as_f64() {
        Some(v) if (-bound..=bound).contains(&v) => cell,
        _ => CellValue::Null,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::classify::{classify_table, ClassifierConfig};

    #[test]
    fn malformed_cells_become_null() {
        let table = RawTable::new(
            vec!["height".into()],
            ["1", "2,5", "3", "4", "oops"]
                .iter()
                .map(|v| vec![CellValue::Text(v.to_string())])
                .collect(),
        );
        let columns = classify_table(&table, &ClassifierConfig::default());
        let typed = coerce_table(&table, &columns);
        let cells: Vec<CellValue> = typed.column(0).cloned().collect();
        assert_eq!(
            cells,
            vec![
                CellValue::Integer(1),
                CellValue::Float(2.5),
                CellValue::Integer(3),
                CellValue::Integer(4),
                CellValue::Null
            ]
        );
        assert_eq!(typed.columns, table.columns);
    }

    #[test]
    fn dates_and_years_keep_their_shape() {
        let date = coerce_cell(
            &CellValue::Text("2021-05-06".into()),
            ColumnCategory::Datetime { year_extractable: true },
        );
        assert_eq!(date.year(), Some(2021));
        let year = coerce_cell(
            &CellValue::Text("2019".into()),
            ColumnCategory::Datetime { year_extractable: true },
        );
        assert_eq!(year, CellValue::Integer(2019));
    }

    #[test]
    fn floats_keep_three_decimals() {
        assert_eq!(coerce_cell(&CellValue::Text("12,34567".into()), ColumnCategory::Numeric), CellValue::Float(12.346));
        assert_eq!(coerce_cell(&CellValue::Float(60.1234449), ColumnCategory::Latitude), CellValue::Float(60.123));
        assert_eq!(coerce_cell(&CellValue::Integer(7), ColumnCategory::Numeric), CellValue::Integer(7));
    }

    #[test]
    fn coordinates_outside_range_are_dropped() {
        assert_eq!(coerce_cell(&CellValue::Float(95.0), ColumnCategory::Latitude), CellValue::Null);
        assert_eq!(
            coerce_cell(&CellValue::Text("-170.5".into()), ColumnCategory::Longitude),
            CellValue::Float(-170.5)
        );
    }
}
