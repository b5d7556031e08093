use thiserror::Error;

/// Engine-wide error taxonomy. The variant decides what the caller does:
/// `Transient` means skip this cycle and retry later, `NotFound` means skip
/// the instrument, `InvalidOperation` means the input is wrong and nothing
/// was mutated, `DataUnavailable` means "no signal", not a failure.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Transient external failure: {0}")]
    Transient(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid operation: {0}")]
    InvalidOperation(String),

    #[error("Insufficient data: {0}")]
    DataUnavailable(String),
}

impl EngineError {
    /// Whether the failure is worth retrying on a later cycle.
    pub fn is_transient(&self) -> bool {
        matches!(self, EngineError::Transient(_))
    }
}

pub type EngineResult<T> = Result<T, EngineError>;
