use std::f64::consts::PI;
use std::path::PathBuf;

use chrono::NaiveDate;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde_json::{Value, json};

/// Normal sample via the Box-Muller transform.
fn gauss(rng: &mut StdRng, std_dev: f64) -> f64 {
    let u1: f64 = rng.gen_range(f64::EPSILON..1.0);
    let u2: f64 = rng.gen();
    std_dev * (-2.0 * u1.ln()).sqrt() * (2.0 * PI * u2).cos()
}

/// Annual-cycle climatology of a variable plus noise, one value per month.
fn monthly_series(var: &str, months: usize, rng: &mut StdRng) -> Vec<f64> {
    let (mean, amplitude, noise) = match var {
        "tas" => (283.0, 8.0, 1.0),
        "pr" => (2.5e-5, 1.0e-5, 3.0e-6),
        "psl" => (101_300.0, 400.0, 150.0),
        _ => (0.0, 1.0, 0.1),
    };
    (0..months)
        .map(|m| {
            let phase = 2.0 * PI * (m % 12) as f64 / 12.0;
            mean - amplitude * phase.cos() + gauss(rng, noise)
        })
        .collect()
}

/// Days since 1970-01-01 of the 15th of each month from January `start` on,
/// counted in `calendar` ("standard" or "noleap").
fn monthly_time(start: i32, months: usize, calendar: &str) -> Vec<f64> {
    let epoch = NaiveDate::default();
    (0..months)
        .filter_map(|m| {
            let year = start + (m / 12) as i32;
            let month = (m % 12) as u32 + 1;
            let date = NaiveDate::from_ymd_opt(year, month, 15)?;
            let days = match calendar {
                "noleap" => {
                    let same_year = NaiveDate::from_ymd_opt(1970, month, 15)?;
                    (year - 1970) as i64 * 365 + same_year.signed_duration_since(epoch).num_days()
                }
                _ => date.signed_duration_since(epoch).num_days(),
            };
            Some(days as f64)
        })
        .collect()
}

fn dataset(attrs: Value, var: &str, period: (i32, i32), calendar: &str, rng: &mut StdRng) -> Value {
    let (start, end) = period;
    let months = ((end - start + 1) * 12) as usize;
    let name = format!("{var}_mean");
    json!({
        ".": {
            ".": attrs,
            "time": {
                ".dims": ["time"],
                "units": "days since 1970-01-01 00:00:00",
                "calendar": calendar
            },
            name.clone(): {".dims": ["time"], "cell_methods": "time: mean"}
        },
        "time": monthly_time(start, months, calendar),
        name: monthly_series(var, months, rng),
    })
}

fn main() {
    let out = PathBuf::from(std::env::args().nth(1).unwrap_or_else(|| "sample_data".into()));
    std::fs::create_dir_all(&out).expect("Failed to create output directory");

    let mut rng = StdRng::seed_from_u64(42);

    let models = [("EC-Earth3", "standard"), ("MPI-ESM1-2-HR", "noleap")];
    let experiments = [("historical", 1981, 2010), ("ssp585", 2071, 2100)];
    let variables = ["tas", "pr", "psl"];

    let mut written = 0;
    for &(model, calendar) in &models {
        for &(experiment, start, end) in &experiments {
            for var in &variables {
                let attrs = json!({
                    "source_id": model,
                    "experiment_id": experiment,
                    "variant_label": "r1i1p1f1",
                    "frequency": "mon",
                    "period": format!("{start}-{end}"),
                });
                let doc = dataset(attrs, var, (start, end), calendar, &mut rng);
                let path = out.join(format!("{var}_{model}_{experiment}_{start}-{end}.ds"));
                std::fs::write(&path, doc.to_string()).expect("Failed to write dataset");
                written += 1;
            }
        }
    }

    // One regional simulation driven by the first global model.
    let attrs = json!({
        "domain_id": "EUR-12",
        "driving_source_id": models[0].0,
        "driving_experiment_id": "historical",
        "driving_variant_label": "r1i1p1f1",
        "institution_id": "SMHI",
        "source_id": "HCLIM43-ALADIN",
        "frequency": "mon",
        "period": "1981-2010",
    });
    let doc = dataset(attrs, "tas", (1981, 2010), "standard", &mut rng);
    let path = out.join("tas_EUR-12_HCLIM43-ALADIN_historical_1981-2010.ds");
    std::fs::write(&path, doc.to_string()).expect("Failed to write dataset");
    written += 1;

    println!("Wrote {written} datasets to {}", out.display());
}
