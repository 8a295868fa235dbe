//! Error types surfaced to callers of the orchestrator.

/// Failure talking to an external signer.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SignerError {
    /// No signer is reachable. Blocks publishing only.
    #[error("signer unavailable: {0}")]
    Unavailable(String),
    /// The signer refused or failed to sign.
    #[error("signer rejected the request: {0}")]
    Rejected(String),
}

/// Why a draft could not be published. The caller's draft is left untouched.
#[derive(Debug, thiserror::Error)]
pub enum PublishError {
    #[error("cannot publish an empty note")]
    EmptyContent,
    #[error(transparent)]
    Signer(#[from] SignerError),
}
