use bridge_traits::BridgeError;
use thiserror::Error;

/// Why a single file transfer did not produce a file reference.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Upload rejected by server: {0}")]
    Server(String),

    /// Deliberate cancellation; never shown to the user as a failure
    #[error("Upload aborted")]
    Aborted,
}

impl TransportError {
    pub fn is_aborted(&self) -> bool {
        matches!(self, TransportError::Aborted)
    }

    pub fn is_network(&self) -> bool {
        matches!(self, TransportError::Network(_))
    }
}

impl From<BridgeError> for TransportError {
    fn from(err: BridgeError) -> Self {
        match err {
            BridgeError::Network(message) => TransportError::Network(message),
            BridgeError::Io(e) => TransportError::Network(e.to_string()),
            BridgeError::Cancelled => TransportError::Aborted,
            other => TransportError::Server(other.to_string()),
        }
    }
}

/// Batch submission failure. Applies to every file in the batch.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SubmissionError {
    #[error("Batch rejected: {0}")]
    Rejected(String),

    #[error("Invalid job configuration: {0}")]
    InvalidConfig(String),

    #[error("Job id mapping mismatch: {0}")]
    Mismatch(String),
}

#[derive(Error, Debug)]
pub enum UploadError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Submission(#[from] SubmissionError),

    #[error("Status poll for job {job_id} failed: {message}")]
    PollTransient { job_id: String, message: String },

    #[error("Job {job_id} failed: {message}")]
    JobFailed { job_id: String, message: String },

    #[error("Queue item {0} not found")]
    ItemNotFound(String),

    #[error("Invalid state transition from {from} to {to}: {reason}")]
    InvalidStateTransition {
        from: String,
        to: String,
        reason: String,
    },

    #[error("A preview lease is already held for item {0}")]
    LeaseAlreadyHeld(String),

    #[error("Item {item_id} already has job {job_id}")]
    JobAlreadyAssigned { item_id: String, job_id: String },

    #[error("Upload queue has been shut down")]
    ShutDown,

    #[error("Bridge error: {0}")]
    Bridge(#[from] BridgeError),
}

pub type Result<T> = std::result::Result<T, UploadError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bridge_errors_map_to_transport_reasons() {
        assert!(TransportError::from(BridgeError::Network("reset".into())).is_network());
        assert!(TransportError::from(BridgeError::Io(std::io::Error::other("disk"))).is_network());
        assert!(TransportError::from(BridgeError::Cancelled).is_aborted());
        assert_eq!(
            TransportError::from(BridgeError::HttpStatus {
                status: 413,
                message: "too large".into()
            }),
            TransportError::Server("HTTP 413: too large".into())
        );
    }

    #[test]
    fn test_error_messages() {
        let err = UploadError::from(SubmissionError::Rejected("unauthorized".into()));
        assert_eq!(err.to_string(), "Batch rejected: unauthorized");

        let err = UploadError::JobFailed {
            job_id: "j1".into(),
            message: "render crashed".into(),
        };
        assert_eq!(err.to_string(), "Job j1 failed: render crashed");
    }
}
