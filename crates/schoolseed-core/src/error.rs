use thiserror::Error;

/// Core error type shared across schoolseed crates.
#[derive(Debug, Error)]
pub enum Error {
    /// A phase list requires an entity set no earlier phase produces.
    #[error("invalid phase order: {0}")]
    InvalidPhaseOrder(String),
    /// Course layout parameters are out of range.
    #[error("invalid layout: {0}")]
    InvalidLayout(String),
    /// A textual value does not name a known variant.
    #[error("unknown {kind} '{value}'")]
    UnknownVariant { kind: &'static str, value: String },
}

/// Convenience alias for results returned by schoolseed crates.
pub type Result<T> = std::result::Result<T, Error>;
