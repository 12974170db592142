//! Error types for host API discovery

use crate::apis::ApiVersion;

/// Error type for engine-level operations
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// Host API is present but its version is not supported
    #[error("{api} version mismatch: expected {required}, got {found}")]
    VersionMismatch {
        api: &'static str,
        required: ApiVersion,
        found: ApiVersion,
    },

    /// Engine already initialized
    #[error("Engine already initialized")]
    AlreadyInitialized,
}
