//! Seeded synthetic telemetry for a smart water-treatment plant.
//!
//! Generation is a pure function of `(preset, seed)`: the same pair always
//! yields the same series.

use std::f64::consts::PI;
use std::str::FromStr;

use chrono::{Duration, NaiveDate, NaiveDateTime};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use tracing::debug;

use glassbox_core::TelemetryRecord;

pub const DEFAULT_SEED: u64 = 42;

/// Extra column carrying the injected anomaly type in the `dataset` preset.
pub const GROUND_TRUTH_KEY: &str = "ground_truth_state";

const CLEAR: &str = "Clear";
const STORM: &str = "Heavy Storm";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Preset {
    /// 50 samples every 10 minutes with one storm-driven anomaly at rows 40..45.
    Dashboard,
    /// 1000 samples every 15 minutes with three storms and two mechanical failures.
    Dataset,
}

impl FromStr for Preset {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "dashboard" => Ok(Preset::Dashboard),
            "dataset" => Ok(Preset::Dataset),
            other => Err(format!("unknown telemetry preset: '{other}'")),
        }
    }
}

/// Generate the series for a preset.
pub fn generate(preset: Preset, seed: u64) -> Vec<TelemetryRecord> {
    let mut rng = StdRng::seed_from_u64(seed);
    let records = match preset {
        Preset::Dashboard => dashboard(&mut rng),
        Preset::Dataset => dataset(&mut rng),
    };
    debug!(?preset, seed, records = records.len(), "generated telemetry");
    records
}

/// Sample from N(mean, std_dev) with the Box–Muller transform.
fn normal(rng: &mut StdRng, mean: f64, std_dev: f64) -> f64 {
    // 1 - u keeps the log argument in (0, 1].
    let u1: f64 = 1.0 - rng.gen::<f64>();
    let u2: f64 = rng.gen::<f64>();
    mean + std_dev * (-2.0 * u1.ln()).sqrt() * (2.0 * PI * u2).cos()
}

fn normals(rng: &mut StdRng, n: usize, mean: f64, std_dev: f64) -> Vec<f64> {
    (0..n).map(|_| normal(rng, mean, std_dev)).collect()
}

fn start_at(year: i32, month: u32, day: u32, hour: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(year, month, day)
        .and_then(|d| d.and_hms_opt(hour, 0, 0))
        .unwrap_or_default()
}

fn dashboard(rng: &mut StdRng) -> Vec<TelemetryRecord> {
    const N: usize = 50;
    let start = start_at(2026, 2, 19, 8);

    let mut pressure = normals(rng, N, 50.0, 2.0);
    let mut vibration = normals(rng, N, 2.0, 0.5);
    let mut context = vec![CLEAR; N];

    // Storm hits: pressure drops while the pump overworks to compensate.
    for p in &mut pressure[40..45] {
        *p = normal(rng, 30.0, 5.0);
    }
    for v in &mut vibration[40..45] {
        *v = normal(rng, 6.0, 1.0);
    }
    for c in &mut context[40..] {
        *c = "Heavy Storm & Network Latency";
    }

    (0..N)
        .map(|i| {
            TelemetryRecord::new(
                start + Duration::minutes(10 * i as i64),
                pressure[i],
                vibration[i],
                context[i],
                None,
            )
        })
        .collect()
}

fn dataset(rng: &mut StdRng) -> Vec<TelemetryRecord> {
    const N: usize = 1000;
    const STORMS: [usize; 3] = [150, 500, 850];
    const STORM_LEN: usize = 10;
    const FAILURES: [usize; 2] = [350, 720];
    const FAILURE_LEN: usize = 5;

    let start = start_at(2026, 3, 1, 0);

    let mut pressure = normals(rng, N, 50.0, 1.5);
    let mut vibration = normals(rng, N, 2.0, 0.3);
    let mut weather = vec![CLEAR; N];
    let mut latency = normals(rng, N, 20.0, 5.0);
    let mut state = vec!["None"; N];

    // Contextual anomalies: storm lag makes the controller overcompensate.
    for idx in STORMS {
        for i in idx..idx + STORM_LEN {
            weather[i] = STORM;
            latency[i] = normal(rng, 200.0, 30.0);
            pressure[i] = normal(rng, 28.0, 2.0);
            vibration[i] = normal(rng, 6.5, 0.5);
            state[i] = "Contextual (Storm)";
        }
    }

    // Genuine pump failures under clear skies.
    for idx in FAILURES {
        for i in idx..idx + FAILURE_LEN {
            pressure[i] = normal(rng, 25.0, 2.0);
            vibration[i] = normal(rng, 8.0, 0.8);
            state[i] = "Mechanical Failure";
        }
    }

    (0..N)
        .map(|i| {
            TelemetryRecord::new(
                start + Duration::minutes(15 * i as i64),
                pressure[i],
                vibration[i],
                weather[i],
                Some(latency[i]),
            )
            .with_extra(GROUND_TRUTH_KEY, state[i])
        })
        .collect()
}
