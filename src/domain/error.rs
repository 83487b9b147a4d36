use crate::domain::models::ConnectionState;

/// Errors surfaced by the telemetry client.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("Malformed frame: expected {expected} bytes, got {actual}")]
    MalformedFrame { expected: usize, actual: usize },

    #[error("No peripheral matching \"{filter}\" was found")]
    PeripheralNotFound { filter: String },

    #[error("Subscription to {channel} was rejected")]
    SubscriptionFailed {
        channel: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("Peripheral link lost")]
    TransportDisconnected,

    /// An operation was called in a state that does not allow it.
    #[error("{operation}() is not allowed while {state}")]
    InvalidState {
        operation: &'static str,
        state: ConnectionState,
    },

    #[error("Transport error")]
    Transport(#[source] anyhow::Error),

    #[error("Failed to render sample: {0}")]
    Render(#[from] std::io::Error),
}
