use std::path::Path;

use super::classify::{classify_table, ClassifiedColumn, ClassifierConfig};
use super::coerce::coerce_table;
use super::error::LoadError;
use super::geojson::GeometryPolicy;
use super::loader;
use super::model::RawTable;
use super::normalize::normalize_table;
use super::reproject::add_wgs84_from_kkj;

/// One successfully ingested upload: the typed table and its classification.
#[derive(Debug, Clone)]
pub struct Dataset {
    /// File name the data came from.
    pub source: String,
    /// Normalized table with cells coerced to their column's category.
    pub table: RawTable,
    /// One entry per table column, same order.
    pub columns: Vec<ClassifiedColumn>,
}

impl Dataset {
    /// Run normalization, KKJ reprojection, classification and coercion
    /// over a loaded table.
    pub fn from_raw(source: impl Into<String>, raw: RawTable, config: &ClassifierConfig) -> Self {
        let raw = add_wgs84_from_kkj(normalize_table(raw));
        let columns = classify_table(&raw, config);
        let table = coerce_table(&raw, &columns);
        Dataset {
            source: source.into(),
            table,
            columns,
        }
    }

    pub fn column(&self, name: &str) -> Option<&ClassifiedColumn> {
        self.columns.iter().find(|c| c.name == name)
    }
}

fn finish(name: &str, raw: RawTable, config: &ClassifierConfig) -> Dataset {
    let dataset = Dataset::from_raw(name, raw, config);
    log::info!(
        "Loaded '{name}': {} rows, columns {:?}",
        dataset.table.len(),
        dataset
            .columns
            .iter()
            .map(|c| format!("{}={}", c.name, c.category.label()))
            .collect::<Vec<_>>()
    );
    dataset
}

/// Bytes of an uploaded file → dataset.
pub fn ingest_bytes(
    name: &str,
    bytes: &[u8],
    config: &ClassifierConfig,
    policy: GeometryPolicy,
) -> Result<Dataset, LoadError> {
    let raw = loader::load_bytes(name, bytes, policy)?;
    Ok(finish(name, raw, config))
}

/// File on disk → dataset.
pub fn ingest_path(path: &Path, config: &ClassifierConfig, policy: GeometryPolicy) -> Result<Dataset, LoadError> {
    let raw = loader::load_file(path, policy)?;
    let name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or_default();
    Ok(finish(name, raw, config))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::classify::ColumnCategory;
    use crate::data::model::CellValue;

    #[test]
    fn csv_upload_end_to_end() {
        let data = b"Site ID,lat,lon,year,Height (m),species\n\
            1,60.2,24.9,2019,12.5,pine\n\
            2,61.5,23.8,2020,NA,spruce\n\
            3,62.0,25.7,2021,18,pine\n";
        let ds = ingest_bytes("sites.csv", data, &ClassifierConfig::default(), GeometryPolicy::default()).unwrap();

        let categories: Vec<(&str, ColumnCategory)> =
            ds.columns.iter().map(|c| (c.name.as_str(), c.category)).collect();
        assert_eq!(
            categories,
            vec![
                ("Site_ID", ColumnCategory::Identifier),
                ("lat", ColumnCategory::Latitude),
                ("lon", ColumnCategory::Longitude),
                ("year", ColumnCategory::Datetime { year_extractable: true }),
                ("Height_m", ColumnCategory::Numeric),
                ("species", ColumnCategory::Categorical),
            ]
        );
        assert_eq!(ds.table.rows[1][4], CellValue::Null);
        assert_eq!(ds.table.rows[0][3], CellValue::Integer(2019));
    }

    #[test]
    fn kkj_grid_upload_gets_map_coordinates() {
        let data = b"Plot,KKJx-coordinate,KKJy-coordinate,species\n\
            1,3385000,6672000,pine\n\
            2,3400000,6700000,birch\n";
        let ds = ingest_bytes("grid.csv", data, &ClassifierConfig::default(), GeometryPolicy::default()).unwrap();

        let lat = ds.column("latitude").unwrap();
        let lon = ds.column("longitude").unwrap();
        assert_eq!(lat.category, ColumnCategory::Latitude);
        assert_eq!(lon.category, ColumnCategory::Longitude);
        assert!(matches!(ds.table.rows[0][4], CellValue::Float(v) if (60.0..60.3).contains(&v)));
    }
}
