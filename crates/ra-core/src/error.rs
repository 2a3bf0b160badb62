//! Error taxonomy for the iteration synthesizer
//!
//! Every generator step reports failures through [`RaError`]. The domain
//! variants carry the offending key (date, unit, project, year) so a halted
//! run tells the operator exactly which record to fix. None of them are
//! retried: the pipeline is deterministic, so re-running with identical
//! inputs reproduces the same failure.
//!
//! # Example
//!
//! ```ignore
//! use ra_core::{RaError, RaResult};
//!
//! fn check_weight(entity: &str, total: f64) -> RaResult<()> {
//!     if total <= 0.0 {
//!         return Err(RaError::WeightConfiguration {
//!             entity: entity.to_string(),
//!             reason: format!("unit weights sum to {total}"),
//!         });
//!     }
//!     Ok(())
//! }
//! ```

use thiserror::Error;

/// Unified error type for binning, draws and series generation.
#[derive(Error, Debug)]
pub enum RaError {
    /// A historical record has no valid bin under the classification scheme.
    #[error("classification gap: {key}")]
    ClassificationGap { key: String },

    /// Sync mode was given a historical year with missing days.
    #[error("incomplete year {year}: series '{series}' is missing {missing}")]
    IncompleteYear {
        year: i32,
        series: String,
        missing: String,
    },

    /// Zero, negative, non-finite or empty aggregation weights.
    #[error("weight configuration error for '{entity}': {reason}")]
    WeightConfiguration { entity: String, reason: String },

    /// Hydro min/average/max ordering is broken in the source data.
    #[error(
        "bounds violation for hydro project '{project}' {year}-{month:02}: \
         min {min} <= average {average} <= max {max} does not hold"
    )]
    BoundsViolation {
        project: String,
        year: i32,
        month: u32,
        min: f64,
        average: f64,
        max: f64,
    },

    /// Re-running identical settings produced different output.
    #[error("reproducibility violation in {group}: {detail}")]
    ReproducibilityViolation { group: String, detail: String },

    /// A mapped series has no raw value at a required date/hour.
    #[error("missing data in series '{series}': {key}")]
    MissingData { series: String, key: String },

    /// Reused output of an earlier step does not match the current iterations.
    #[error("stale upstream output for {group}: {reason}")]
    StaleUpstream { group: String, reason: String },

    /// Input rows violating a primary key or stated invariant
    #[error("Validation error: {0}")]
    Validation(String),

    /// Settings errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O errors (file access, staging directories)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Parsing/deserialization errors
    #[error("Parse error: {0}")]
    Parse(String),
}

/// Convenience type alias for Results using RaError.
pub type RaResult<T> = Result<T, RaError>;

impl RaError {
    /// Short stable label used in run manifests.
    pub fn kind(&self) -> &'static str {
        match self {
            RaError::ClassificationGap { .. } => "classification_gap",
            RaError::IncompleteYear { .. } => "incomplete_year",
            RaError::WeightConfiguration { .. } => "weight_configuration",
            RaError::BoundsViolation { .. } => "bounds_violation",
            RaError::ReproducibilityViolation { .. } => "reproducibility_violation",
            RaError::MissingData { .. } => "missing_data",
            RaError::StaleUpstream { .. } => "stale_upstream",
            RaError::Validation(_) => "validation",
            RaError::Config(_) => "config",
            RaError::Io(_) => "io",
            RaError::Parse(_) => "parse",
        }
    }
}

impl From<chrono::ParseError> for RaError {
    fn from(err: chrono::ParseError) -> Self {
        RaError::Parse(err.to_string())
    }
}
