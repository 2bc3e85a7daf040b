use thiserror::Error;


#[derive(Debug, Error)]
pub enum CaptureError {
    /// The interface could not be opened (missing, no permission, engine failure).
    #[error("failed to open interface {interface:?}")]
    Open {
        interface: String,
        #[source]
        source: pcap::Error,
    },

    /// The capture engine refused the filter expression.
    #[error("failed to set filter {expression:?}: {reason}")]
    Filter {
        expression: String,
        reason: String,
    },

    #[error("capture handle is already closed")]
    Closed,

    #[error("capture read loop did not finish")]
    Task(#[from] tokio::task::JoinError),
}
