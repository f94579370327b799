use thiserror::Error;

/// Typed error hierarchy for the bridge.
///
/// Used at module boundaries (transport, companion client, configuration
/// store); leaf-level helpers are free to propagate `anyhow::Result` and
/// convert via `?` through the `Internal` variant.
#[derive(Debug, Error)]
pub enum BridgeError {
    #[error("transport unavailable: {0}")]
    TransportUnavailable(String),

    #[error("transport closed")]
    TransportClosed,

    #[error("RPC call timed out after {0:?}")]
    RpcTimeout(std::time::Duration),

    #[error("RPC error: {0}")]
    RpcError(String),

    #[error("upstream unavailable: {message}")]
    UpstreamUnavailable { message: String, retryable: bool },

    #[error("companion not found: {0}")]
    CompanionNotFound(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl BridgeError {
    /// Whether the condition that produced this error is transient and the
    /// caller may usefully retry.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::TransportUnavailable(_) | Self::RpcTimeout(_) => true,
            Self::UpstreamUnavailable { retryable, .. } => *retryable,
            Self::TransportClosed
            | Self::RpcError(_)
            | Self::CompanionNotFound(_)
            | Self::Config(_) => false,
            Self::Internal(_) => true,
        }
    }
}
