//! # ds-data
//!
//! Tabular data handling for the DiaStat pipeline: CSV datasets, the
//! declarative column schema, structural validation, per-column drift
//! detection, feature encoding/scaling, class rebalancing and Parquet
//! persistence of the transformed matrices.

#![warn(clippy::all)]

/// Row-oriented CSV datasets.
pub mod dataset;

/// Declarative dataset schema (YAML).
pub mod schema;

/// Two-sample Kolmogorov–Smirnov drift detection.
pub mod drift;

/// Structural dataset validation against the schema.
pub mod validation;

/// Feature encoding, scaling and target mapping.
pub mod transform;

/// SMOTE + Tomek-link class rebalancing.
pub mod resample;

/// Dense numeric matrices and their Parquet persistence.
pub mod matrix;

pub use dataset::Dataset;
pub use drift::{detect_drift, ColumnDrift, DriftReport};
pub use matrix::FeatureMatrix;
pub use resample::{smote_tomek, SmoteTomekConfig};
pub use schema::DatasetSchema;
pub use transform::{
    CategoryEncoder, FeaturePipeline, FittedTransform, StandardScaler, TransformOptions,
    TransformedBundle,
};
pub use validation::{DatasetValidator, ValidationConfig, ValidationOutcome};
