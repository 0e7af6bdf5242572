use std::io::{Cursor, Read, Seek};
use std::path::Path;

use arrow::array::{Array, AsArray};
use arrow::datatypes::{DataType, Float32Type, Float64Type, Int32Type, Int64Type};
use arrow::util::display::{ArrayFormatter, FormatOptions};
use calamine::{Data, Reader, Xls, Xlsx};
use chrono::{Duration, NaiveDate};
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use serde_json::Value as JsonValue;

use super::error::LoadError;
use super::geojson::{self, GeometryPolicy};
use super::model::{CellValue, RawTable};

// ---------------------------------------------------------------------------
// Public entry-points
// ---------------------------------------------------------------------------

/// Load a table from a file on disk.  Dispatch by extension.
pub fn load_file(path: &Path, policy: GeometryPolicy) -> Result<RawTable, LoadError> {
    let bytes = std::fs::read(path)?;
    let name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or_default();
    load_bytes(name, &bytes, policy)
}

/// Load a table from the raw bytes of an uploaded file named `name`.
///
/// Supported formats:
/// * `.csv` / `.tsv` / `.txt` – delimited text with a header row
/// * `.xlsx` / `.xls`         – first worksheet, first row is the header
/// * `.json`                  – `[{...}, ...]`, `{"data"|"items"|"rows": [...]}` or GeoJSON
/// * `.geojson`               – `FeatureCollection` / `Feature`
/// * `.parquet` / `.pq`       – flat columns
pub fn load_bytes(name: &str, bytes: &[u8], policy: GeometryPolicy) -> Result<RawTable, LoadError> {
    if bytes.is_empty() {
        return Err(LoadError::EmptyFile);
    }
    let ext = Path::new(name)
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_ascii_lowercase();

    match ext.as_str() {
        "csv" | "txt" => load_delimited(bytes, None),
        "tsv" => load_delimited(bytes, Some(b'\t')),
        "json" | "geojson" => load_json(bytes, policy),
        "xlsx" | "xlsm" => {
            let workbook: Xlsx<_> = Xlsx::new(Cursor::new(bytes)).map_err(spreadsheet_err)?;
            load_workbook::<Cursor<&[u8]>, _>(workbook)
        }
        "xls" => {
            let workbook: Xls<_> = Xls::new(Cursor::new(bytes)).map_err(spreadsheet_err)?;
            load_workbook::<Cursor<&[u8]>, _>(workbook)
        }
        "parquet" | "pq" => load_parquet(bytes),
        other => Err(LoadError::UnsupportedExtension(other.to_string())),
    }
}

fn spreadsheet_err(e: impl std::fmt::Display) -> LoadError {
    LoadError::Spreadsheet(e.to_string())
}

// ---------------------------------------------------------------------------
// Delimited text
// ---------------------------------------------------------------------------

/// Pick the most frequent candidate delimiter on the header line.
fn sniff_delimiter(bytes: &[u8]) -> u8 {
    let header = bytes.split(|b| *b == b'\n').next().unwrap_or(bytes);
    [b',', b';', b'\t', b'|']
        .into_iter()
        .max_by_key(|d| (header.iter().filter(|b| *b == d).count(), *d == b','))
        .unwrap_or(b',')
}

/// Every cell is kept as text; typing happens during classification.
fn load_delimited(bytes: &[u8], delimiter: Option<u8>) -> Result<RawTable, LoadError> {
    let delimiter = delimiter.unwrap_or_else(|| sniff_delimiter(bytes));
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .flexible(true)
        .from_reader(bytes);

    let headers: Vec<String> = reader.headers()?.iter().map(|h| h.to_string()).collect();

    let mut rows = Vec::new();
    for result in reader.records() {
        let record = result?;
        rows.push(
            record
                .iter()
                .map(|v| {
                    if v.is_empty() {
                        CellValue::Null
                    } else {
                        CellValue::Text(v.to_string())
                    }
                })
                .collect(),
        );
    }

    log::debug!(
        "Delimited text ({:?}): {} columns, {} rows",
        delimiter as char,
        headers.len(),
        rows.len()
    );
    Ok(RawTable::new(headers, rows))
}

// ---------------------------------------------------------------------------
// JSON / GeoJSON
// ---------------------------------------------------------------------------

fn load_json(bytes: &[u8], policy: GeometryPolicy) -> Result<RawTable, LoadError> {
    let bytes = bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes);
    let root: JsonValue = serde_json::from_slice(bytes)?;

    if matches!(
        root.get("type").and_then(JsonValue::as_str),
        Some("FeatureCollection" | "Feature")
    ) {
        let rows = geojson::flatten_value(&root, policy)?;
        log::info!("Flattened {} GeoJSON features", rows.len());
        return Ok(geojson::into_table(rows));
    }

    let records = match &root {
        JsonValue::Array(items) => items,
        JsonValue::Object(obj) => ["data", "items", "rows"]
            .iter()
            .find_map(|key| obj.get(*key).and_then(JsonValue::as_array))
            .ok_or(LoadError::UnsupportedJson(
                "object without a 'data', 'items' or 'rows' array",
            ))?,
        _ => return Err(LoadError::UnsupportedJson("expected an array of records")),
    };
    records_to_table(records)
}

/// Records → table; columns are the union of keys in first-seen order.
fn records_to_table(records: &[JsonValue]) -> Result<RawTable, LoadError> {
    let mut columns: Vec<String> = Vec::new();
    let mut objects = Vec::with_capacity(records.len());
    for rec in records {
        let obj = rec
            .as_object()
            .ok_or(LoadError::UnsupportedJson("array entries must be JSON objects"))?;
        for key in obj.keys() {
            if !columns.contains(key) {
                columns.push(key.clone());
            }
        }
        objects.push(obj);
    }

    let rows = objects
        .iter()
        .map(|obj| {
            columns
                .iter()
                .map(|c| obj.get(c).map_or(CellValue::Null, geojson::json_to_cell))
                .collect()
        })
        .collect();
    Ok(RawTable::new(columns, rows))
}

// ---------------------------------------------------------------------------
// Spreadsheets
// ---------------------------------------------------------------------------

fn load_workbook<RS, R>(mut workbook: R) -> Result<RawTable, LoadError>
where
    RS: Read + Seek,
    R: Reader<RS>,
    R::Error: std::fmt::Display,
{
    let range = workbook
        .worksheet_range_at(0)
        .ok_or_else(|| LoadError::Spreadsheet("workbook has no worksheets".into()))?
        .map_err(spreadsheet_err)?;

    let mut rows = range.rows();
    let headers: Vec<String> = rows
        .next()
        .ok_or_else(|| LoadError::Spreadsheet("first worksheet is empty".into()))?
        .iter()
        .enumerate()
        .map(|(i, cell)| match cell {
            Data::Empty => format!("column_{}", i + 1),
            other => other.to_string(),
        })
        .collect();

    let rows: Vec<Vec<CellValue>> = rows.map(|row| row.iter().map(spreadsheet_cell).collect()).collect();
    log::debug!("Worksheet: {} columns, {} rows", headers.len(), rows.len());
    Ok(RawTable::new(headers, rows))
}

fn spreadsheet_cell(cell: &Data) -> CellValue {
    match cell {
        Data::Int(i) => CellValue::Integer(*i),
        Data::Float(f) => CellValue::Float(*f),
        Data::String(s) => CellValue::Text(s.clone()),
        Data::Bool(b) => CellValue::Bool(*b),
        Data::DateTime(dt) => excel_serial_to_datetime(dt.as_f64()),
        Data::DateTimeIso(s) | Data::DurationIso(s) => CellValue::Text(s.clone()),
        Data::Error(_) | Data::Empty => CellValue::Null,
    }
}

/// Excel serial day number (1900 date system) → timestamp.
fn excel_serial_to_datetime(serial: f64) -> CellValue {
    let Some(epoch) = NaiveDate::from_ymd_opt(1899, 12, 30).and_then(|d| d.and_hms_opt(0, 0, 0)) else {
        return CellValue::Null;
    };
    let millis = (serial * 86_400_000.0).round() as i64;
    epoch
        .checked_add_signed(Duration::milliseconds(millis))
        .map_or(CellValue::Null, CellValue::DateTime)
}

// ---------------------------------------------------------------------------
// Parquet loader
// ---------------------------------------------------------------------------

/// Load a Parquet file with flat columns.  Numbers, strings and booleans map
/// directly; every other Arrow type is rendered as text and left to the
/// classifier.
fn load_parquet(data: &[u8]) -> Result<RawTable, LoadError> {
    let builder = ParquetRecordBatchReaderBuilder::try_new(bytes::Bytes::copy_from_slice(data))?;
    let columns: Vec<String> = builder
        .schema()
        .fields()
        .iter()
        .map(|f| f.name().clone())
        .collect();
    let reader = builder.build()?;

    let mut rows: Vec<Vec<CellValue>> = Vec::new();
    for batch_result in reader {
        let batch = batch_result?;
        let start = rows.len();
        rows.resize(start + batch.num_rows(), Vec::with_capacity(columns.len()));

        for col in batch.columns() {
            let options = FormatOptions::default();
            let formatter = ArrayFormatter::try_new(col.as_ref(), &options)?;
            for row in 0..batch.num_rows() {
                rows[start + row].push(arrow_cell(col.as_ref(), &formatter, row));
            }
        }
    }

    Ok(RawTable::new(columns, rows))
}

/// Extract a single value from an Arrow column at a given row.
fn arrow_cell(col: &dyn Array, formatter: &ArrayFormatter<'_>, row: usize) -> CellValue {
    if col.is_null(row) {
        return CellValue::Null;
    }
    match col.data_type() {
        DataType::Utf8 => CellValue::Text(col.as_string::<i32>().value(row).to_string()),
        DataType::LargeUtf8 => CellValue::Text(col.as_string::<i64>().value(row).to_string()),
        DataType::Int32 => CellValue::Integer(i64::from(col.as_primitive::<Int32Type>().value(row))),
        DataType::Int64 => CellValue::Integer(col.as_primitive::<Int64Type>().value(row)),
        DataType::Float32 => CellValue::Float(f64::from(col.as_primitive::<Float32Type>().value(row))),
        DataType::Float64 => CellValue::Float(col.as_primitive::<Float64Type>().value(row)),
        DataType::Boolean => CellValue::Bool(col.as_boolean().value(row)),
        _ => CellValue::Text(formatter.value(row).to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn csv_keeps_text_and_sniffs_semicolons() {
        let data = b"name;height\npine;12,5\nbirch;\n";
        let table = load_bytes("trees.csv", data, GeometryPolicy::default()).unwrap();
        assert_eq!(table.columns, vec!["name", "height"]);
        assert_eq!(table.rows[0], vec![CellValue::Text("pine".into()), CellValue::Text("12,5".into())]);
        assert_eq!(table.rows[1][1], CellValue::Null);
    }

    #[test]
    fn json_records_union_keys() {
        let data = br#"{"rows": [{"a": 1, "b": "x"}, {"a": 2.5, "c": true}]}"#;
        let table = load_bytes("data.json", data, GeometryPolicy::default()).unwrap();
        assert_eq!(table.columns, vec!["a", "b", "c"]);
        assert_eq!(table.rows[1], vec![CellValue::Float(2.5), CellValue::Null, CellValue::Bool(true)]);
    }

    #[test]
    fn json_columns_keep_file_order() {
        let data = br#"[{"zone": "A", "height": 12.5, "age": 40}, {"plot": 7, "zone": "B"}]"#;
        let table = load_bytes("data.json", data, GeometryPolicy::default()).unwrap();
        assert_eq!(table.columns, vec!["zone", "height", "age", "plot"]);
        assert_eq!(
            table.rows[1],
            vec![CellValue::Text("B".into()), CellValue::Null, CellValue::Null, CellValue::Integer(7)]
        );
    }

    #[test]
    fn geojson_is_flattened_from_json_extension() {
        let data = br#"{"type":"FeatureCollection","features":[
            {"type":"Feature","geometry":{"type":"Point","coordinates":[25.0,61.0]},"properties":{"id":1}}
        ]}"#;
        let table = load_bytes("points.json", data, GeometryPolicy::default()).unwrap();
        assert_eq!(table.columns, vec!["id", "latitude", "longitude"]);
        assert_eq!(table.rows[0][1], CellValue::Float(61.0));
    }

    #[test]
    fn load_errors_name_the_cause() {
        let unsupported = load_bytes("notes.docx", b"x", GeometryPolicy::default()).unwrap_err();
        assert!(unsupported.to_string().contains(".docx"));

        let bad_json = load_bytes("a.json", b"{not json", GeometryPolicy::default()).unwrap_err();
        assert!(matches!(bad_json, LoadError::Json(_)));

        let scalar = load_bytes("a.json", b"42", GeometryPolicy::default()).unwrap_err();
        assert!(matches!(scalar, LoadError::UnsupportedJson(_)));

        let empty = load_bytes("a.csv", b"", GeometryPolicy::default()).unwrap_err();
        assert!(matches!(empty, LoadError::EmptyFile));

        let sheet = load_bytes("a.xlsx", b"not a zip", GeometryPolicy::default()).unwrap_err();
        assert!(matches!(sheet, LoadError::Spreadsheet(_)));
    }

    #[test]
    fn load_file_dispatches_on_path_extension() {
        let mut file = tempfile::Builder::new().suffix(".tsv").tempfile().unwrap();
        file.write_all(b"a\tb\n1\t2\n").unwrap();
        let table = load_file(file.path(), GeometryPolicy::default()).unwrap();
        assert_eq!(table.columns, vec!["a", "b"]);
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn excel_serials_convert_to_dates() {
        let cell = excel_serial_to_datetime(44197.5);
        assert_eq!(cell.to_string(), "2021-01-01 12:00:00");
    }
}
