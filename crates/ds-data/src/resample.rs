//! Class rebalancing: SMOTE oversampling followed by Tomek-link cleanup.
//!
//! SMOTE synthesizes minority-class points on segments between a minority
//! sample and one of its k nearest minority neighbours until the class
//! counts match. The Tomek pass then removes majority-class members of
//! mutual-nearest-neighbour pairs with opposite labels, thinning the
//! decision boundary. Everything is driven by a seeded RNG so a pipeline
//! run is reproducible.

use ds_core::{Error, Result};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::matrix::FeatureMatrix;

/// Knobs for the combined resampler.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SmoteTomekConfig {
    /// Neighbourhood size for SMOTE interpolation (capped at
    /// `minority_count - 1`).
    pub k_neighbors: usize,
    pub seed: u64,
}

impl Default for SmoteTomekConfig {
    fn default() -> Self {
        Self { k_neighbors: 5, seed: 42 }
    }
}

fn squared_distance(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| (x - y) * (x - y)).sum()
}

/// Indices of the `k` nearest points to `target` among `pool`, excluding
/// `skip` (the point itself). Ties resolve to the lower index.
fn k_nearest(pool: &[Vec<f64>], target: &[f64], skip: usize, k: usize) -> Vec<usize> {
    let mut dists: Vec<(usize, f64)> = pool
        .iter()
        .enumerate()
        .filter(|(i, _)| *i != skip)
        .map(|(i, row)| (i, squared_distance(row, target)))
        .collect();
    dists.sort_by(|a, b| a.1.partial_cmp(&b.1).unwrap().then(a.0.cmp(&b.0)));
    dists.into_iter().take(k).map(|(i, _)| i).collect()
}

/// Nearest neighbour of `rows[i]` over all rows (excluding itself).
fn nearest_neighbor(rows: &[Vec<f64>], i: usize) -> usize {
    let mut best = usize::MAX;
    let mut best_d = f64::INFINITY;
    for (j, row) in rows.iter().enumerate() {
        if j == i {
            continue;
        }
        let d = squared_distance(row, &rows[i]);
        if d < best_d {
            best_d = d;
            best = j;
        }
    }
    best
}

/// Oversample the minority class to parity, then drop majority-class Tomek
/// links. Returns the rebalanced matrix and labels, rows kept in
/// original-then-synthetic order minus removals.
pub fn smote_tomek(
    features: &FeatureMatrix,
    labels: &[u8],
    config: &SmoteTomekConfig,
) -> Result<(FeatureMatrix, Vec<u8>)> {
    if features.n_rows() != labels.len() {
        return Err(Error::Data(format!(
            "feature matrix has {} rows but {} labels",
            features.n_rows(),
            labels.len()
        )));
    }

    let n_pos = labels.iter().filter(|&&y| y == 1).count();
    let n_neg = labels.len() - n_pos;
    if n_pos == 0 || n_neg == 0 {
        return Err(Error::Data(
            "cannot rebalance a single-class dataset (one class has no samples)".to_string(),
        ));
    }

    let minority: u8 = if n_pos < n_neg { 1 } else { 0 };
    let majority = 1 - minority;
    let (n_min, n_maj) = if minority == 1 { (n_pos, n_neg) } else { (n_neg, n_pos) };

    let mut rows: Vec<Vec<f64>> = features.rows.clone();
    let mut out_labels: Vec<u8> = labels.to_vec();

    if n_min != n_maj {
        if n_min < 2 {
            return Err(Error::Data(format!(
                "SMOTE needs at least 2 minority samples, found {n_min}"
            )));
        }
        let minority_rows: Vec<Vec<f64>> = rows
            .iter()
            .zip(labels)
            .filter(|(_, &y)| y == minority)
            .map(|(r, _)| r.clone())
            .collect();
        let k = config.k_neighbors.min(n_min - 1);

        let mut rng = StdRng::seed_from_u64(config.seed);
        for _ in 0..(n_maj - n_min) {
            let i = rng.gen_range(0..minority_rows.len());
            let neighbors = k_nearest(&minority_rows, &minority_rows[i], i, k);
            let nb = neighbors[rng.gen_range(0..neighbors.len())];
            let gap: f64 = rng.gen();
            let synthetic: Vec<f64> = minority_rows[i]
                .iter()
                .zip(&minority_rows[nb])
                .map(|(a, b)| a + gap * (b - a))
                .collect();
            rows.push(synthetic);
            out_labels.push(minority);
        }
    }

    // Tomek links: mutual nearest neighbours with opposite labels. Only the
    // majority-class member of each link is dropped.
    let mut remove = vec![false; rows.len()];
    for i in 0..rows.len() {
        let j = nearest_neighbor(&rows, i);
        if j == usize::MAX || out_labels[i] == out_labels[j] {
            continue;
        }
        if nearest_neighbor(&rows, j) == i {
            if out_labels[i] == majority {
                remove[i] = true;
            } else {
                remove[j] = true;
            }
        }
    }

    let kept_rows: Vec<Vec<f64>> = rows
        .into_iter()
        .zip(&remove)
        .filter(|(_, &r)| !r)
        .map(|(row, _)| row)
        .collect();
    let kept_labels: Vec<u8> = out_labels
        .into_iter()
        .zip(&remove)
        .filter(|(_, &r)| !r)
        .map(|(y, _)| y)
        .collect();

    tracing::info!(
        before = labels.len(),
        after = kept_labels.len(),
        removed_links = remove.iter().filter(|&&r| r).count(),
        "rebalanced class distribution"
    );

    Ok((FeatureMatrix::new(features.feature_names.clone(), kept_rows)?, kept_labels))
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Two well-separated clusters, 16 negative vs 4 positive.
    fn imbalanced() -> (FeatureMatrix, Vec<u8>) {
        let mut rows = Vec::new();
        let mut labels = Vec::new();
        for i in 0..16 {
            rows.push(vec![i as f64 * 0.1, 0.0]);
            labels.push(0u8);
        }
        for i in 0..4 {
            rows.push(vec![10.0 + i as f64 * 0.1, 5.0]);
            labels.push(1u8);
        }
        (FeatureMatrix::new(vec!["a".into(), "b".into()], rows).unwrap(), labels)
    }

    #[test]
    fn balances_class_counts() {
        let (m, y) = imbalanced();
        let (out, labels) = smote_tomek(&m, &y, &SmoteTomekConfig::default()).unwrap();
        let n_pos = labels.iter().filter(|&&v| v == 1).count();
        let n_neg = labels.len() - n_pos;
        // Separated clusters form no Tomek links, so counts land exactly equal.
        assert_eq!(n_pos, n_neg);
        assert_eq!(out.n_rows(), labels.len());
    }

    #[test]
    fn synthetic_points_stay_inside_minority_cluster() {
        let (m, y) = imbalanced();
        let (out, labels) = smote_tomek(&m, &y, &SmoteTomekConfig::default()).unwrap();
        for (row, &label) in out.rows.iter().zip(&labels) {
            if label == 1 {
                assert!(row[0] >= 10.0 - 1e-9 && row[0] <= 10.3 + 1e-9, "x={}", row[0]);
                assert!((row[1] - 5.0).abs() < 1e-9);
            }
        }
    }

    #[test]
    fn same_seed_same_output() {
        let (m, y) = imbalanced();
        let cfg = SmoteTomekConfig { k_neighbors: 3, seed: 7 };
        let (a, la) = smote_tomek(&m, &y, &cfg).unwrap();
        let (b, lb) = smote_tomek(&m, &y, &cfg).unwrap();
        assert_eq!(a, b);
        assert_eq!(la, lb);
    }

    #[test]
    fn tomek_removal_only_drops_majority_samples() {
        // Interleaved points force boundary links.
        let mut rows = Vec::new();
        let mut labels = Vec::new();
        for i in 0..12 {
            rows.push(vec![i as f64]);
            labels.push(0u8);
        }
        for i in 0..6 {
            rows.push(vec![i as f64 + 0.4]);
            labels.push(1u8);
        }
        let m = FeatureMatrix::new(vec!["x".into()], rows).unwrap();
        let (out, out_labels) = smote_tomek(&m, &labels, &SmoteTomekConfig::default()).unwrap();
        let n_pos_before = labels.iter().filter(|&&v| v == 1).count();
        // Oversampling brings positives to 12; Tomek never removes minority rows.
        let n_pos_after = out_labels.iter().filter(|&&v| v == 1).count();
        assert!(n_pos_after >= n_pos_before);
        assert_eq!(out.n_rows(), out_labels.len());
    }

    #[test]
    fn single_class_is_rejected() {
        let m = FeatureMatrix::new(vec!["x".into()], vec![vec![0.0], vec![1.0]]).unwrap();
        assert!(smote_tomek(&m, &[1, 1], &SmoteTomekConfig::default()).is_err());
    }

    #[test]
    fn already_balanced_input_skips_oversampling() {
        let m = FeatureMatrix::new(
            vec!["x".into()],
            vec![vec![0.0], vec![0.1], vec![10.0], vec![10.1]],
        )
        .unwrap();
        let (out, labels) = smote_tomek(&m, &[0, 0, 1, 1], &SmoteTomekConfig::default()).unwrap();
        assert_eq!(out.n_rows(), 4);
        assert_eq!(labels, vec![0, 0, 1, 1]);
    }
}
