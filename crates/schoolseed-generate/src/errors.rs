use schoolseed_core::Phase;
use thiserror::Error;

use crate::bootstrap::BootstrapError;
use crate::model::GenerationReport;
use crate::store::StoreError;

/// Errors emitted by the generation engine.
#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("invalid options: {0}")]
    InvalidOptions(String),
    #[error(transparent)]
    Core(#[from] schoolseed_core::Error),
    #[error("store error: {0}")]
    Store(#[from] StoreError),
    #[error("bootstrap failed: {0}")]
    Bootstrap(#[from] BootstrapError),
    #[error("no unique email derived from '{seed}' after {attempts} attempts")]
    EmailExhausted { seed: String, attempts: u32 },
    #[error("invalid fixture: {0}")]
    InvalidFixture(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),
    #[error("phase '{phase}' failed: {source}")]
    PhaseFailed {
        phase: Phase,
        #[source]
        source: Box<GenerationError>,
        report: Box<GenerationReport>,
    },
}

impl GenerationError {
    /// Report captured up to the failing phase, when the run got that far.
    pub fn report(&self) -> Option<&GenerationReport> {
        match self {
            GenerationError::PhaseFailed { report, .. } => Some(report),
            _ => None,
        }
    }

    /// True when the root cause is a duplicate key or broken reference.
    pub fn is_constraint_violation(&self) -> bool {
        match self {
            GenerationError::Store(StoreError::ConstraintViolation { .. }) => true,
            GenerationError::Bootstrap(BootstrapError::Store(StoreError::ConstraintViolation {
                ..
            })) => true,
            GenerationError::PhaseFailed { source, .. } => source.is_constraint_violation(),
            _ => false,
        }
    }
}
