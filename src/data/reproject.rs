//! Finnish national grid (KKJ, EPSG:2393) → WGS84.
//!
//! Uploads without latitude/longitude columns but with `KKJx` / `KKJy`
//! style grid columns get `latitude` and `longitude` appended, so the map
//! works for them like for any other coordinate data.

use proj4rs::errors::Error as ProjError;
use proj4rs::proj::Proj;

use super::classify::{name_hint, NameHint};
use super::geojson::{LATITUDE, LONGITUDE};
use super::model::{CellValue, RawTable};
use super::parse::cell_number;

/// EPSG:2393, KKJ / Finland Uniform Coordinate System.
const KKJ: &str = "+proj=tmerc +lat_0=0 +lon_0=27 +k=1 +x_0=3500000 +y_0=0 +ellps=intl \
     +towgs84=-96.062,-82.428,-121.753,4.801,0.345,-1.376,1.496 +units=m +no_defs";
const WGS84: &str = "+proj=longlat +ellps=WGS84 +datum=WGS84 +no_defs";

const EASTING_TOKENS: &[&str] = &["kkjx", "kkj_x"];
const NORTHING_TOKENS: &[&str] = &["kkjy", "kkj_y"];

pub struct KkjTransform {
    from: Proj,
    to: Proj,
}

impl KkjTransform {
    pub fn new() -> Result<Self, ProjError> {
        Ok(KkjTransform {
            from: Proj::from_proj_string(KKJ)?,
            to: Proj::from_proj_string(WGS84)?,
        })
    }

    /// `(latitude, longitude)` in degrees, or `None` when the point does
    /// not transform or lands outside the WGS84 range.
    pub fn to_wgs84(&self, easting: f64, northing: f64) -> Option<(f64, f64)> {
        if !easting.is_finite() || !northing.is_finite() {
            return None;
        }
        let mut point = (easting, northing, 0.0);
        proj4rs::transform::transform(&self.from, &self.to, &mut point).ok()?;
        let (lon, lat) = (point.0.to_degrees(), point.1.to_degrees());
        ((-90.0..=90.0).contains(&lat) && (-180.0..=180.0).contains(&lon)).then_some((lat, lon))
    }
}

/// Indices of the easting and northing grid columns, matched by substring
/// on the normalized header.
pub fn kkj_columns(columns: &[String]) -> Option<(usize, usize)> {
    let find = |tokens: &[&str]| {
        columns.iter().position(|c| {
            let lower = c.to_lowercase();
            tokens.iter().any(|t| lower.contains(t))
        })
    };
    Some((find(EASTING_TOKENS)?, find(NORTHING_TOKENS)?))
}

fn has_named_coordinates(columns: &[String]) -> bool {
    let hints: Vec<Option<NameHint>> = columns.iter().map(|c| name_hint(c)).collect();
    hints.contains(&Some(NameHint::Latitude)) && hints.contains(&Some(NameHint::Longitude))
}

/// Append WGS84 `latitude` / `longitude` computed from KKJ grid columns.
/// Tables that already name their coordinates, or carry no grid columns,
/// come back unchanged.
pub fn add_wgs84_from_kkj(table: RawTable) -> RawTable {
    if table.is_empty() || has_named_coordinates(&table.columns) {
        return table;
    }
    if table.columns.iter().any(|c| c == LATITUDE || c == LONGITUDE) {
        return table;
    }
    let Some((x_idx, y_idx)) = kkj_columns(&table.columns) else {
        return table;
    };

    let transform = match KkjTransform::new() {
        Ok(t) => t,
        Err(e) => {
            log::warn!("KKJ projection unavailable: {e}");
            return table;
        }
    };

    let points: Vec<Option<(f64, f64)>> = table
        .rows
        .iter()
        .map(|row| {
            let easting = cell_number(&row[x_idx])?;
            let northing = cell_number(&row[y_idx])?;
            transform.to_wgs84(easting, northing)
        })
        .collect();

    let converted = points.iter().filter(|p| p.is_some()).count();
    if converted == 0 {
        log::warn!(
            "Columns '{}' / '{}' look like KKJ but no row transformed",
            table.columns[x_idx],
            table.columns[y_idx]
        );
        return table;
    }
    log::info!(
        "Reprojected {converted} of {} rows from KKJ '{}' / '{}' to WGS84",
        table.len(),
        table.columns[x_idx],
        table.columns[y_idx]
    );

    let mut columns = table.columns;
    columns.push(LATITUDE.to_string());
    columns.push(LONGITUDE.to_string());
    let rows = table
        .rows
        .into_iter()
        .zip(points)
        .map(|(mut row, point)| {
            row.push(point.map_or(CellValue::Null, |(lat, _)| CellValue::Float(lat)));
            row.push(point.map_or(CellValue::Null, |(_, lon)| CellValue::Float(lon)));
            row
        })
        .collect();
    RawTable::new(columns, rows)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grid_table(headers: &[&str], rows: &[&[&str]]) -> RawTable {
        RawTable::new(
            headers.iter().map(|h| h.to_string()).collect(),
            rows.iter()
                .map(|r| r.iter().map(|v| CellValue::Text(v.to_string())).collect())
                .collect(),
        )
    }

    #[test]
    fn helsinki_grid_point_lands_in_helsinki() {
        let transform = KkjTransform::new().unwrap();
        let (lat, lon) = transform.to_wgs84(3_385_000.0, 6_672_000.0).unwrap();
        assert!((60.05..60.25).contains(&lat), "lat {lat}");
        assert!((24.8..25.05).contains(&lon), "lon {lon}");
    }

    #[test]
    fn grid_columns_gain_latitude_and_longitude() {
        let table = grid_table(
            &["site", "KKJx_coordinate", "KKJy_coordinate"],
            &[&["a", "3385000", "6672000"], &["b", "oops", "6672000"]],
        );
        let out = add_wgs84_from_kkj(table);
        assert_eq!(out.columns, vec!["site", "KKJx_coordinate", "KKJy_coordinate", "latitude", "longitude"]);
        assert!(matches!(out.rows[0][3], CellValue::Float(lat) if (60.0..60.3).contains(&lat)));
        assert_eq!(out.rows[1][3], CellValue::Null);
        assert_eq!(out.rows[1][4], CellValue::Null);
    }

    #[test]
    fn named_coordinates_take_precedence() {
        let table = grid_table(&["lat", "lon", "kkj_x", "kkj_y"], &[&["60.1", "24.9", "3385000", "6672000"]]);
        let out = add_wgs84_from_kkj(table.clone());
        assert_eq!(out, table);
    }

    #[test]
    fn grid_detection_needs_both_axes() {
        let cols = |v: &[&str]| v.iter().map(|s| s.to_string()).collect::<Vec<_>>();
        assert_eq!(kkj_columns(&cols(&["KKJx", "KKJy"])), Some((0, 1)));
        assert_eq!(kkj_columns(&cols(&["kkj_y", "x", "kkj_x"])), Some((2, 0)));
        assert_eq!(kkj_columns(&cols(&["kkjx", "height"])), None);
    }
}
