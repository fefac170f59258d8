//! Validation error type.

use gaitspec_core::{ResourceError, StructuralError};
use gaitspec_storage::SpecError;

/// Result alias for validation operations.
pub type Result<T> = std::result::Result<T, ValidationError>;

/// Errors that abort a validation run.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ValidationError {
    /// Dataset is structurally unusable
    #[error(transparent)]
    Structural(#[from] StructuralError),

    /// Budget exceeded
    #[error(transparent)]
    Resource(#[from] ResourceError),

    /// Store lookup failed while preparing a preview
    #[error(transparent)]
    Spec(#[from] SpecError),

    /// Cancelled through the cancellation token
    #[error("{operation} cancelled after {processed}/{total} items")]
    Cancelled {
        /// Operation name
        operation: String,
        /// Items finished before cancellation
        processed: usize,
        /// Items requested
        total: usize,
    },
}
