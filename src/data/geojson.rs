//! GeoJSON → flat table: one row per feature, `properties` hoisted to
//! columns, geometry reduced to a representative latitude/longitude.
//!
//! Representative point rule:
//! * `Point` – its own coordinates; `MultiPoint` – mean of its points.
//! * `LineString` – mean of its vertices; `MultiLineString` – first line.
//! * `Polygon` – mean of the exterior ring's vertices, without the closing
//!   vertex that repeats the first; `MultiPolygon` – first polygon.
//! * `GeometryCollection` – first member that yields a point.
//!
//! A point outside the WGS84 range counts as missing.

use std::collections::{HashMap, HashSet};

use geojson::{Geometry, JsonObject, Value as GeoValue};
use serde::Deserialize;
use serde_json::Value as JsonValue;

use super::error::LoadError;
use super::model::{CellValue, RawTable};

pub const LATITUDE: &str = "latitude";
pub const LONGITUDE: &str = "longitude";

/// What to do with features whose geometry is missing or yields no point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GeometryPolicy {
    /// Keep the feature with null latitude/longitude.
    #[default]
    KeepWithNull,
    /// Drop the feature.
    Skip,
}

/// One feature flattened into a row.
#[derive(Debug, Clone, PartialEq)]
pub struct FlatGeoRow {
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    /// Properties in the order the feature lists them.
    pub properties: Vec<(String, CellValue)>,
}

/// Flatten a raw JSON document holding a `FeatureCollection` or a single
/// `Feature`.  Geometries are parsed per feature, so one malformed geometry
/// only nulls that feature's coordinates.
pub fn flatten_value(root: &JsonValue, policy: GeometryPolicy) -> Result<Vec<FlatGeoRow>, LoadError> {
    let features: Vec<&JsonValue> = match root.get("type").and_then(JsonValue::as_str) {
        Some("FeatureCollection") => root
            .get("features")
            .and_then(JsonValue::as_array)
            .ok_or_else(|| LoadError::GeoJson("FeatureCollection without a 'features' array".into()))?
            .iter()
            .collect(),
        Some("Feature") => vec![root],
        Some(other) => return Err(LoadError::GeoJson(format!("unsupported top-level type '{other}'"))),
        None => return Err(LoadError::GeoJson("missing top-level 'type'".into())),
    };

    let mut rows = Vec::with_capacity(features.len());
    for (i, feature) in features.into_iter().enumerate() {
        let Some(obj) = feature.as_object() else {
            log::warn!("Skipping feature {i}: not a JSON object");
            continue;
        };
        let geometry = match obj.get("geometry") {
            None | Some(JsonValue::Null) => None,
            Some(raw) => match Geometry::from_json_value(raw.clone()) {
                Ok(g) => Some(g),
                Err(e) => {
                    log::warn!("Feature {i}: unreadable geometry ({e})");
                    None
                }
            },
        };
        let properties = obj.get("properties").and_then(JsonValue::as_object);
        if let Some(row) = flatten_feature(geometry.as_ref(), properties, policy) {
            rows.push(row);
        }
    }
    Ok(rows)
}

fn flatten_feature(
    geometry: Option<&Geometry>,
    properties: Option<&JsonObject>,
    policy: GeometryPolicy,
) -> Option<FlatGeoRow> {
    let point = geometry.and_then(|g| representative_point(&g.value));
    if point.is_none() && policy == GeometryPolicy::Skip {
        return None;
    }

    let properties = properties
        .map(|props| {
            props
                .iter()
                .map(|(k, v)| (k.clone(), json_to_cell(v)))
                .collect()
        })
        .unwrap_or_default();

    Some(FlatGeoRow {
        longitude: point.map(|(lon, _)| lon),
        latitude: point.map(|(_, lat)| lat),
        properties,
    })
}

/// `(longitude, latitude)` standing in for the whole geometry.
pub fn representative_point(value: &GeoValue) -> Option<(f64, f64)> {
    let point = match value {
        GeoValue::Point(p) => position(p),
        GeoValue::MultiPoint(points) => mean_position(points),
        GeoValue::LineString(line) => mean_position(line),
        GeoValue::MultiLineString(lines) => lines.first().and_then(|l| mean_position(l)),
        GeoValue::Polygon(rings) => rings.first().and_then(|r| ring_point(r)),
        GeoValue::MultiPolygon(polygons) => polygons
            .first()
            .and_then(|rings| rings.first())
            .and_then(|r| ring_point(r)),
        GeoValue::GeometryCollection(members) => {
            return members.iter().find_map(|g| representative_point(&g.value));
        }
    }?;
    in_wgs84_range(point).then_some(point)
}

fn position(p: &[f64]) -> Option<(f64, f64)> {
    match p {
        [lon, lat, ..] if lon.is_finite() && lat.is_finite() => Some((*lon, *lat)),
        _ => None,
    }
}

fn mean_position(points: &[Vec<f64>]) -> Option<(f64, f64)> {
    let valid: Vec<(f64, f64)> = points.iter().filter_map(|p| position(p)).collect();
    if valid.is_empty() {
        return None;
    }
    let n = valid.len() as f64;
    let lon = valid.iter().map(|p| p.0).sum::<f64>() / n;
    let lat = valid.iter().map(|p| p.1).sum::<f64>() / n;
    Some((lon, lat))
}

fn ring_point(ring: &[Vec<f64>]) -> Option<(f64, f64)> {
    match ring {
        [first, .., last] if ring.len() > 2 && first == last => mean_position(&ring[..ring.len() - 1]),
        _ => mean_position(ring),
    }
}

fn in_wgs84_range((lon, lat): (f64, f64)) -> bool {
    (-180.0..=180.0).contains(&lon) && (-90.0..=90.0).contains(&lat)
}

/// Map a JSON scalar onto a cell; arrays and objects keep their JSON text.
pub fn json_to_cell(val: &JsonValue) -> CellValue {
    match val {
        JsonValue::String(s) => CellValue::Text(s.clone()),
        JsonValue::Number(n) => {
            if let Some(i) = n.as_i64() {
                CellValue::Integer(i)
            } else if let Some(f) = n.as_f64() {
                CellValue::Float(f)
            } else {
                CellValue::Text(n.to_string())
            }
        }
        JsonValue::Bool(b) => CellValue::Bool(*b),
        JsonValue::Null => CellValue::Null,
        other => CellValue::Text(other.to_string()),
    }
}

/// Turn flattened rows into a table.  Columns are the union of all property
/// keys in first-seen order, followed by `latitude` and `longitude`; a key
/// missing on a feature is null in that row.
pub fn into_table(rows: Vec<FlatGeoRow>) -> RawTable {
    let mut seen: HashSet<&str> = HashSet::new();
    let mut columns: Vec<String> = Vec::new();
    for row in &rows {
        for (key, _) in &row.properties {
            if key != LATITUDE && key != LONGITUDE && seen.insert(key.as_str()) {
                columns.push(key.clone());
            }
        }
    }
    let n_props = columns.len();
    columns.push(LATITUDE.to_string());
    columns.push(LONGITUDE.to_string());

    let cells = rows
        .iter()
        .map(|row| {
            let props: HashMap<&str, &CellValue> =
                row.properties.iter().map(|(k, v)| (k.as_str(), v)).collect();
            let mut cells: Vec<CellValue> = columns[..n_props]
                .iter()
                .map(|key| props.get(key.as_str()).map_or(CellValue::Null, |v| (*v).clone()))
                .collect();
            cells.push(row.latitude.map_or(CellValue::Null, CellValue::Float));
            cells.push(row.longitude.map_or(CellValue::Null, CellValue::Float));
            cells
        })
        .collect();

    RawTable::new(columns, cells)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample() -> JsonValue {
        json!({
            "type": "FeatureCollection",
            "features": [
                {
                    "type": "Feature",
                    "geometry": { "type": "Point", "coordinates": [24.94, 60.17] },
                    "properties": { "name": "Helsinki", "population": 658864 }
                },
                {
                    "type": "Feature",
                    "geometry": {
                        "type": "Polygon",
                        "coordinates": [[[0.0, 0.0], [4.0, 0.0], [4.0, 2.0], [0.0, 2.0], [0.0, 0.0]]]
                    },
                    "properties": { "name": "Block", "area_ha": 8.0 }
                },
                {
                    "type": "Feature",
                    "geometry": null,
                    "properties": { "name": "Nowhere" }
                }
            ]
        })
    }

    #[test]
    fn one_row_per_feature_with_union_of_keys() {
        let rows = flatten_value(&sample(), GeometryPolicy::KeepWithNull).unwrap();
        assert_eq!(rows.len(), 3);

        let table = into_table(rows);
        assert_eq!(table.columns, vec!["name", "population", "area_ha", "latitude", "longitude"]);
        assert_eq!(table.len(), 3);
        // absent key → null, not a missing column
        assert_eq!(table.rows[0][2], CellValue::Null);
        assert_eq!(table.rows[1][1], CellValue::Null);
        assert_eq!(table.rows[2][3], CellValue::Null);
        assert_eq!(table.rows[2][4], CellValue::Null);
    }

    #[test]
    fn polygon_point_ignores_closing_vertex() {
        let rows = flatten_value(&sample(), GeometryPolicy::KeepWithNull).unwrap();
        assert_eq!(rows[1].longitude, Some(2.0));
        assert_eq!(rows[1].latitude, Some(1.0));
        assert_eq!(rows[0].longitude, Some(24.94));
        assert_eq!(rows[0].latitude, Some(60.17));
    }

    #[test]
    fn skip_policy_drops_featureless_geometry() {
        let rows = flatten_value(&sample(), GeometryPolicy::Skip).unwrap();
        assert_eq!(rows.len(), 2);
        assert!(rows.iter().all(|r| r.latitude.is_some()));
    }

    #[test]
    fn unsupported_or_out_of_range_geometry_keeps_row() {
        let doc = json!({
            "type": "FeatureCollection",
            "features": [
                { "type": "Feature", "geometry": { "type": "Circle", "radius": 3 }, "properties": {"a": 1} },
                { "type": "Feature", "geometry": { "type": "Point", "coordinates": [500.0, 10.0] }, "properties": {"a": 2} }
            ]
        });
        let rows = flatten_value(&doc, GeometryPolicy::KeepWithNull).unwrap();
        assert_eq!(rows.len(), 2);
        assert!(rows.iter().all(|r| r.latitude.is_none() && r.longitude.is_none()));
    }

    #[test]
    fn property_columns_follow_file_order() {
        let doc: JsonValue = serde_json::from_str(
            r#"{"type": "FeatureCollection", "features": [
                {"type": "Feature", "geometry": null, "properties": {"zone": "A", "height": 3}},
                {"type": "Feature", "geometry": null, "properties": {"height": 4, "age": 12, "zone": "B"}}
            ]}"#,
        )
        .unwrap();
        let rows = flatten_value(&doc, GeometryPolicy::KeepWithNull).unwrap();
        assert_eq!(rows[1].properties[0].0, "height");

        let table = into_table(rows);
        assert_eq!(table.columns, vec!["zone", "height", "age", "latitude", "longitude"]);
        assert_eq!(table.rows[1][0], CellValue::Text("B".into()));
        assert_eq!(table.rows[0][2], CellValue::Null);
    }

    #[test]
    fn line_and_collection_points() {
        let line = GeoValue::LineString(vec![vec![0.0, 0.0], vec![2.0, 4.0]]);
        assert_eq!(representative_point(&line), Some((1.0, 2.0)));

        let collection = GeoValue::GeometryCollection(vec![
            Geometry::new(GeoValue::LineString(vec![])),
            Geometry::new(GeoValue::Point(vec![10.0, 20.0])),
        ]);
        assert_eq!(representative_point(&collection), Some((10.0, 20.0)));
    }

    #[test]
    fn non_geojson_type_is_a_load_error() {
        let err = flatten_value(&json!({"type": "Topology"}), GeometryPolicy::KeepWithNull).unwrap_err();
        assert!(matches!(err, LoadError::GeoJson(_)));
    }
}
