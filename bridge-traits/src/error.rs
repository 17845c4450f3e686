use thiserror::Error;

/// Failures reported by host-side engine and effect adapters.
#[derive(Error, Debug)]
pub enum BridgeError {
    #[error("Bridge capability not available: {0}")]
    NotAvailable(String),

    #[error("Bridge operation failed: {0}")]
    OperationFailed(String),

    /// The engine rejected a seek because the target item does not exist in
    /// the current timeline.
    #[error("Illegal seek position: index {index}")]
    IllegalSeekPosition { index: usize },

    #[error("Unsupported operation: {0}")]
    Unsupported(String),
}

pub type Result<T> = std::result::Result<T, BridgeError>;
