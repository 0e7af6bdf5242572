use std::collections::{BTreeMap, BTreeSet};

use eframe::egui::Color32;
use palette::{Hsl, IntoColor, LinSrgb, Mix, Srgb};

use crate::data::classify::ColumnCategory;
use crate::data::model::CellValue;

// ---------------------------------------------------------------------------
// Color palette generator
// ---------------------------------------------------------------------------

/// Generates `n` visually distinct colours using evenly spaced hues.
pub fn generate_palette(n: usize) -> Vec<Color32> {
    if n == 0 {
        return Vec::new();
    }
    (0..n)
        .map(|i| {
            let hue = (i as f32 / n as f32) * 360.0;
            let hsl = Hsl::new(hue, 0.75, 0.55);
            let rgb: Srgb = hsl.into_color();
            to_color32(rgb)
        })
        .collect()
}

fn to_color32(rgb: Srgb) -> Color32 {
    Color32::from_rgb(
        (rgb.red.clamp(0.0, 1.0) * 255.0).round() as u8,
        (rgb.green.clamp(0.0, 1.0) * 255.0).round() as u8,
        (rgb.blue.clamp(0.0, 1.0) * 255.0).round() as u8,
    )
}

// ---------------------------------------------------------------------------
// Continuous scale
// ---------------------------------------------------------------------------

/// Viridis anchor colours, low to high.
const VIRIDIS: [(u8, u8, u8); 5] = [
    (68, 1, 84),
    (59, 82, 139),
    (33, 145, 140),
    (94, 201, 98),
    (253, 231, 37),
];

/// Colour at `t` in `0..=1` on the viridis ramp, mixed in linear RGB.
pub fn viridis(t: f64) -> Color32 {
    let t = if t.is_finite() { t.clamp(0.0, 1.0) as f32 } else { 0.0 };
    let segments = (VIRIDIS.len() - 1) as f32;
    let pos = t * segments;
    let lower = (pos.floor() as usize).min(VIRIDIS.len() - 2);
    let factor = pos - lower as f32;

    let anchor = |(r, g, b): (u8, u8, u8)| -> LinSrgb {
        Srgb::new(r, g, b).into_format::<f32>().into_linear()
    };
    let mixed = anchor(VIRIDIS[lower]).mix(anchor(VIRIDIS[lower + 1]), factor);
    to_color32(Srgb::from_linear(mixed))
}

// ---------------------------------------------------------------------------
// Color mapping: cell value → Color32
// ---------------------------------------------------------------------------

/// Fixed colours for 0/1 columns.
pub const BINARY_ZERO: Color32 = Color32::from_rgb(0x00, 0xCC, 0x00);
pub const BINARY_ONE: Color32 = Color32::from_rgb(0xCC, 0x00, 0x00);

#[derive(Debug, Clone, PartialEq)]
pub enum ColorScale {
    /// Only 0 and 1 occur: green for 0, red for 1.
    Binary,
    /// Numeric values spread over viridis.
    Continuous { min: f64, max: f64 },
    /// One hue per distinct value.
    Discrete(BTreeMap<CellValue, Color32>),
}

/// Maps values of the colour-by column to colours.
#[derive(Debug, Clone)]
pub struct ColorMap {
    pub column: String,
    pub scale: ColorScale,
    default_color: Color32,
}

fn binary_bit(value: &CellValue) -> Option<bool> {
    match value {
        CellValue::Bool(b) => Some(*b),
        CellValue::Integer(0) => Some(false),
        CellValue::Integer(1) => Some(true),
        CellValue::Float(v) if *v == 0.0 => Some(false),
        CellValue::Float(v) if *v == 1.0 => Some(true),
        CellValue::Text(s) if s == "0" => Some(false),
        CellValue::Text(s) if s == "1" => Some(true),
        _ => None,
    }
}

impl ColorMap {
    /// Pick the scale from the column's category and its unique values.
    pub fn new(column: &str, category: ColumnCategory, unique_values: &BTreeSet<CellValue>) -> Self {
        let present: Vec<&CellValue> = unique_values.iter().filter(|v| !v.is_null()).collect();

        let scale = if !present.is_empty() && present.iter().all(|v| binary_bit(v).is_some()) {
            ColorScale::Binary
        } else if category.is_numeric_valued() && present.len() > 2 {
            let numbers: Vec<f64> = present.iter().filter_map(|v| v.as_f64()).collect();
            let min = numbers.iter().copied().fold(f64::INFINITY, f64::min);
            let max = numbers.iter().copied().fold(f64::NEG_INFINITY, f64::max);
            ColorScale::Continuous { min, max }
        } else {
            let palette = generate_palette(present.len());
            ColorScale::Discrete(
                present
                    .into_iter()
                    .cloned()
                    .zip(palette)
                    .collect(),
            )
        };

        ColorMap {
            column: column.to_string(),
            scale,
            default_color: Color32::GRAY,
        }
    }

    /// Look up the colour for a given cell value.
    pub fn color_for(&self, value: &CellValue) -> Color32 {
        match &self.scale {
            ColorScale::Binary => match binary_bit(value) {
                Some(false) => BINARY_ZERO,
                Some(true) => BINARY_ONE,
                None => self.default_color,
            },
            ColorScale::Continuous { min, max } => match value.as_f64() {
                Some(v) if max > min => viridis((v - min) / (max - min)),
                Some(_) => viridis(0.5),
                None => self.default_color,
            },
            ColorScale::Discrete(mapping) => mapping.get(value).copied().unwrap_or(self.default_color),
        }
    }

    /// Return the legend entries (value label → colour) for the UI.
    pub fn legend_entries(&self) -> Vec<(String, Color32)> {
        match &self.scale {
            ColorScale::Binary => vec![("0".to_string(), BINARY_ZERO), ("1".to_string(), BINARY_ONE)],
            ColorScale::Continuous { min, max } => [0.0, 0.5, 1.0]
                .into_iter()
                .map(|t| (format!("{:.3}", min + (max - min) * t), viridis(t)))
                .collect(),
            ColorScale::Discrete(mapping) => mapping.iter().map(|(v, c)| (v.to_string(), *c)).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn values(cells: impl IntoIterator<Item = CellValue>) -> BTreeSet<CellValue> {
        cells.into_iter().collect()
    }

    #[test]
    fn zero_one_columns_use_fixed_colours() {
        let map = ColorMap::new(
            "dead",
            ColumnCategory::Numeric,
            &values([CellValue::Integer(0), CellValue::Integer(1), CellValue::Null]),
        );
        assert_eq!(map.scale, ColorScale::Binary);
        assert_eq!(map.color_for(&CellValue::Integer(0)), BINARY_ZERO);
        assert_eq!(map.color_for(&CellValue::Float(1.0)), BINARY_ONE);
        assert_eq!(map.color_for(&CellValue::Null), Color32::GRAY);
    }

    #[test]
    fn numeric_columns_are_continuous() {
        let map = ColorMap::new(
            "height",
            ColumnCategory::Numeric,
            &values([CellValue::Float(2.0), CellValue::Float(4.0), CellValue::Float(6.0)]),
        );
        assert_eq!(map.scale, ColorScale::Continuous { min: 2.0, max: 6.0 });
        assert_eq!(map.color_for(&CellValue::Float(2.0)), Color32::from_rgb(68, 1, 84));
        assert_eq!(map.color_for(&CellValue::Float(6.0)), Color32::from_rgb(253, 231, 37));
    }

    #[test]
    fn text_columns_get_distinct_hues() {
        let map = ColorMap::new(
            "species",
            ColumnCategory::Categorical,
            &values(["pine", "spruce", "birch"].map(|s| CellValue::Text(s.into()))),
        );
        let legend = map.legend_entries();
        assert_eq!(legend.len(), 3);
        assert_ne!(legend[0].1, legend[1].1);
        assert_eq!(map.color_for(&CellValue::Text("oak".into())), Color32::GRAY);
    }

    #[test]
    fn palette_has_requested_size() {
        assert!(generate_palette(0).is_empty());
        assert_eq!(generate_palette(7).len(), 7);
    }
}
