//! Two-sample Kolmogorov–Smirnov drift detection.
//!
//! For every column of the base dataset the empirical distributions of base
//! and current are compared; a column drifts when the KS p-value falls
//! strictly below the threshold. A single drifted column fails the whole
//! dataset. The report is written as human-diffable YAML.

use std::collections::BTreeMap;
use std::path::Path;

use ds_core::{Error, Result};
use serde::{Deserialize, Serialize};

use crate::dataset::Dataset;

/// Default significance threshold for the per-column KS test.
pub const DEFAULT_DRIFT_THRESHOLD: f64 = 0.05;

/// Per-column drift verdict.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ColumnDrift {
    pub p_value: f64,
    pub drift_status: bool,
}

/// Drift verdicts for every column, plus the overall outcome.
///
/// `BTreeMap` keeps the serialized report stable across runs so that two
/// reports diff cleanly.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DriftReport {
    /// True when no column drifted.
    pub passed: bool,
    pub threshold: f64,
    pub columns: BTreeMap<String, ColumnDrift>,
}

impl DriftReport {
    /// Write the report as YAML, creating parent directories.
    pub fn write_yaml_file(&self, path: &Path) -> Result<()> {
        if let Some(dir) = path.parent() {
            std::fs::create_dir_all(dir)?;
        }
        let text = serde_yaml_ng::to_string(self)?;
        std::fs::write(path, text)?;
        Ok(())
    }

    pub fn from_yaml_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Ok(serde_yaml_ng::from_str(&text)?)
    }

    /// Names of the columns that drifted.
    pub fn drifted_columns(&self) -> Vec<&str> {
        self.columns
            .iter()
            .filter(|(_, v)| v.drift_status)
            .map(|(k, _)| k.as_str())
            .collect()
    }
}

/// Two-sample KS statistic: the supremum distance between the empirical
/// CDFs of `a` and `b`.
pub fn ks_statistic(a: &[f64], b: &[f64]) -> f64 {
    let mut xs: Vec<f64> = a.to_vec();
    let mut ys: Vec<f64> = b.to_vec();
    xs.sort_by(|p, q| p.partial_cmp(q).unwrap());
    ys.sort_by(|p, q| p.partial_cmp(q).unwrap());

    let (n1, n2) = (xs.len(), ys.len());
    let (mut i, mut j) = (0usize, 0usize);
    let mut d = 0.0f64;

    while i < n1 && j < n2 {
        let x = xs[i];
        let y = ys[j];
        let t = x.min(y);
        while i < n1 && xs[i] <= t {
            i += 1;
        }
        while j < n2 && ys[j] <= t {
            j += 1;
        }
        let f1 = i as f64 / n1 as f64;
        let f2 = j as f64 / n2 as f64;
        d = d.max((f1 - f2).abs());
    }
    d
}

/// Survival function of the Kolmogorov distribution,
/// `Q(lambda) = 2 * sum_{k>=1} (-1)^{k-1} exp(-2 k^2 lambda^2)`.
///
/// The alternating series converges fast for lambda away from zero; for tiny
/// lambda the terms do not decay within the iteration budget and the
/// probability is 1 to working precision.
fn kolmogorov_sf(lambda: f64) -> f64 {
    if lambda <= 0.0 {
        return 1.0;
    }
    let a2 = -2.0 * lambda * lambda;
    let mut sum = 0.0f64;
    let mut sign = 1.0f64;
    let mut prev_term = 0.0f64;
    for k in 1..=100 {
        let term = (a2 * (k * k) as f64).exp();
        sum += sign * term;
        if term <= 1e-12 * sum.abs() || term <= 1e-12 * prev_term {
            return (2.0 * sum).clamp(0.0, 1.0);
        }
        sign = -sign;
        prev_term = term;
    }
    // No convergence: lambda is so small the distributions are
    // indistinguishable at these sample sizes.
    1.0
}

/// Two-sample KS test. Returns `(statistic, p_value)` using the asymptotic
/// Kolmogorov distribution with the standard small-sample correction.
pub fn ks_two_sample(a: &[f64], b: &[f64]) -> Result<(f64, f64)> {
    if a.is_empty() || b.is_empty() {
        return Err(Error::Data("KS test requires non-empty samples".to_string()));
    }
    let d = ks_statistic(a, b);
    if d == 0.0 {
        // Identical empirical distributions.
        return Ok((0.0, 1.0));
    }
    let n1 = a.len() as f64;
    let n2 = b.len() as f64;
    let n_eff = (n1 * n2 / (n1 + n2)).sqrt();
    let lambda = (n_eff + 0.12 + 0.11 / n_eff) * d;
    Ok((d, kolmogorov_sf(lambda)))
}

/// Turn a column into comparable numeric points for the KS test.
///
/// Numeric columns (in both datasets) are parsed as `f64`; anything else is
/// rank-coded over the sorted union of values observed in either dataset, so
/// both sides share one deterministic code table.
fn column_points(base: &Dataset, current: &Dataset, name: &str) -> Result<(Vec<f64>, Vec<f64>)> {
    let both_numeric = base
        .column(name)?
        .iter()
        .chain(current.column(name)?.iter())
        .all(|cell| cell.parse::<f64>().is_ok());

    if both_numeric {
        return Ok((base.numeric_column(name)?, current.numeric_column(name)?));
    }

    let mut values: Vec<&str> = base
        .column(name)?
        .iter()
        .chain(current.column(name)?.iter())
        .map(|s| s.as_str())
        .collect();
    values.sort_unstable();
    values.dedup();

    let code = |cell: &str| -> f64 {
        // Union is built from both datasets, so the lookup cannot miss.
        values.binary_search(&cell).unwrap() as f64
    };
    let xs = base.column(name)?.iter().map(|c| code(c)).collect();
    let ys = current.column(name)?.iter().map(|c| code(c)).collect();
    Ok((xs, ys))
}

/// Detect distribution drift between two datasets with identical columns.
///
/// Precondition (established by the structural validator, not re-checked
/// here): `current` has every column of `base`.
pub fn detect_drift(base: &Dataset, current: &Dataset, threshold: f64) -> Result<DriftReport> {
    if !(0.0..1.0).contains(&threshold) || threshold <= 0.0 {
        return Err(Error::Config(format!("drift threshold must be in (0, 1), got {threshold}")));
    }

    let mut columns = BTreeMap::new();
    let mut passed = true;
    for name in base.columns() {
        let (xs, ys) = column_points(base, current, name)?;
        let (stat, p_value) = ks_two_sample(&xs, &ys)?;
        let drift_status = p_value < threshold;
        if drift_status {
            passed = false;
            tracing::warn!(column = %name, p_value, statistic = stat, "distribution drift detected");
        }
        columns.insert(name.clone(), ColumnDrift { p_value, drift_status });
    }

    Ok(DriftReport { passed, threshold, columns })
}
