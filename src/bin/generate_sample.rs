//! Writes `sample_data.csv`, `sample_data.geojson` and `sample_data.parquet`:
//! a synthetic forest plot survey with the kinds of mess real uploads carry
//! (empty tokens, decimal commas, a stray text value, a feature without
//! geometry).

use std::sync::Arc;

use anyhow::{Context, Result};
use arrow::array::{Float64Array, Int64Array, StringArray};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use parquet::arrow::ArrowWriter;
use serde_json::json;

/// Minimal deterministic PRNG (xoshiro256**)
struct SimpleRng {
    state: [u64; 4],
}

impl SimpleRng {
    fn new(seed: u64) -> Self {
        let mut s = [0u64; 4];
        let mut x = seed;
        for slot in &mut s {
            x = x.wrapping_mul(6364136223846793005).wrapping_add(1);
            *slot = x;
        }
        SimpleRng { state: s }
    }

    fn next_u64(&mut self) -> u64 {
        let result = (self.state[1].wrapping_mul(5)).rotate_left(7).wrapping_mul(9);
        let t = self.state[1] << 17;
        self.state[2] ^= self.state[0];
        self.state[3] ^= self.state[1];
        self.state[1] ^= self.state[2];
        self.state[0] ^= self.state[3];
        self.state[2] ^= t;
        self.state[3] = self.state[3].rotate_left(45);
        result
    }

    fn next_f64(&mut self) -> f64 {
        (self.next_u64() >> 11) as f64 / (1u64 << 53) as f64
    }

    fn range(&mut self, lo: f64, hi: f64) -> f64 {
        lo + (hi - lo) * self.next_f64()
    }

    fn pick<'a, T>(&mut self, items: &'a [T]) -> &'a T {
        &items[(self.next_u64() % items.len() as u64) as usize]
    }

    /// Box-Muller transform for normal distribution
    fn gauss(&mut self, mean: f64, std_dev: f64) -> f64 {
        let u1 = self.next_f64().max(1e-15);
        let u2 = self.next_f64();
        let z = (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos();
        mean + std_dev * z
    }
}

/// One surveyed plot.
struct Plot {
    id: i64,
    lat: f64,
    lon: f64,
    year: i64,
    month: u32,
    species: &'static str,
    height: f64,
    dead: i64,
    region: &'static str,
}

const SPECIES: [(&str, f64); 3] = [("pine", 18.0), ("spruce", 22.0), ("birch", 14.0)];
const REGIONS: [&str; 4] = ["Uusimaa", "Pirkanmaa", "Lappi", "Savo"];

fn generate_plots(rng: &mut SimpleRng, n: i64) -> Vec<Plot> {
    (1..=n)
        .map(|id| {
            let &(species, mean_height) = rng.pick(&SPECIES);
            let year = 2015 + (rng.next_u64() % 8) as i64;
            Plot {
                id,
                lat: rng.range(60.0, 68.5),
                lon: rng.range(21.5, 30.0),
                year,
                month: 1 + (rng.next_u64() % 12) as u32,
                species,
                height: rng.gauss(mean_height, 3.5).max(0.5),
                dead: i64::from(rng.next_f64() < 0.15),
                region: *rng.pick(&REGIONS),
            }
        })
        .collect()
}

fn write_csv(plots: &[Plot], rng: &mut SimpleRng, path: &str) -> Result<()> {
    let mut writer = csv::Writer::from_path(path).with_context(|| format!("creating {path}"))?;
    writer.write_record([
        "Plot ID",
        "Latitude",
        "Longitude",
        "Vuosi",
        "Measured",
        "Species",
        "Height (m)",
        "Dead",
        "Region",
    ])?;

    for p in plots {
        // Roughly one cell in twenty is missing or malformed.
        let height = match rng.next_u64() % 20 {
            0 => "NA".to_string(),
            1 => "-".to_string(),
            2 => "oops".to_string(),
            3 => format!("{:.1}", p.height).replace('.', ","),
            _ => format!("{:.2}", p.height),
        };
        let measured = format!("{}-{:02}-{:02}", p.year, p.month, 1 + p.id % 28);
        writer.write_record([
            p.id.to_string(),
            format!("{:.5}", p.lat),
            format!("{:.5}", p.lon),
            p.year.to_string(),
            measured,
            p.species.to_string(),
            height,
            p.dead.to_string(),
            p.region.to_string(),
        ])?;
    }
    writer.flush()?;
    Ok(())
}

fn write_geojson(plots: &[Plot], path: &str) -> Result<()> {
    let mut features: Vec<serde_json::Value> = plots
        .iter()
        .map(|p| {
            json!({
                "type": "Feature",
                "geometry": { "type": "Point", "coordinates": [p.lon, p.lat] },
                "properties": {
                    "plot_id": p.id,
                    "species": p.species,
                    "height_m": (p.height * 100.0).round() / 100.0,
                    "year": p.year,
                    "dead": p.dead,
                },
            })
        })
        .collect();

    // A protected area polygon and a record whose location was never surveyed.
    features.push(json!({
        "type": "Feature",
        "geometry": {
            "type": "Polygon",
            "coordinates": [[[24.0, 61.0], [25.0, 61.0], [25.0, 62.0], [24.0, 62.0], [24.0, 61.0]]],
        },
        "properties": { "plot_id": null, "species": "mixed", "height_m": null, "year": 2020, "dead": 0 },
    }));
    features.push(json!({
        "type": "Feature",
        "geometry": null,
        "properties": { "plot_id": 0, "species": "pine", "height_m": "NA", "year": 2018, "dead": 1 },
    }));

    let collection = json!({ "type": "FeatureCollection", "features": features });
    let file = std::fs::File::create(path).with_context(|| format!("creating {path}"))?;
    serde_json::to_writer_pretty(file, &collection)?;
    Ok(())
}

fn write_parquet(plots: &[Plot], path: &str) -> Result<()> {
    let schema = Arc::new(Schema::new(vec![
        Field::new("plot_id", DataType::Int64, false),
        Field::new("latitude", DataType::Float64, false),
        Field::new("longitude", DataType::Float64, false),
        Field::new("year", DataType::Int64, false),
        Field::new("species", DataType::Utf8, false),
        Field::new("height_m", DataType::Float64, false),
        Field::new("region", DataType::Utf8, false),
    ]));

    let batch = RecordBatch::try_new(
        schema.clone(),
        vec![
            Arc::new(Int64Array::from_iter_values(plots.iter().map(|p| p.id))),
            Arc::new(Float64Array::from_iter_values(plots.iter().map(|p| p.lat))),
            Arc::new(Float64Array::from_iter_values(plots.iter().map(|p| p.lon))),
            Arc::new(Int64Array::from_iter_values(plots.iter().map(|p| p.year))),
            Arc::new(StringArray::from_iter_values(plots.iter().map(|p| p.species))),
            Arc::new(Float64Array::from_iter_values(plots.iter().map(|p| p.height))),
            Arc::new(StringArray::from_iter_values(plots.iter().map(|p| p.region))),
        ],
    )
    .context("building record batch")?;

    let file = std::fs::File::create(path).with_context(|| format!("creating {path}"))?;
    let mut writer = ArrowWriter::try_new(file, schema, None)?;
    writer.write(&batch)?;
    writer.close()?;
    Ok(())
}

fn main() -> Result<()> {
    let mut rng = SimpleRng::new(42);
    let plots = generate_plots(&mut rng, 240);

    write_csv(&plots, &mut rng, "sample_data.csv")?;
    write_geojson(&plots[..60], "sample_data.geojson")?;
    write_parquet(&plots, "sample_data.parquet")?;

    println!(
        "Wrote {} plots to sample_data.csv / sample_data.parquet and {} features to sample_data.geojson",
        plots.len(),
        60 + 2
    );
    Ok(())
}
