use thiserror::Error;

/// The server answered with a tag outside the recognized `OK`/`ERROR` set.
/// Surfaced to the caller; an unrecognized response is never a silent no-op.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("malformed response envelope: unrecognized tag {kind:?}")]
pub struct MalformedEnvelope {
    pub kind: String,
}

impl MalformedEnvelope {
    pub fn new(kind: impl Into<String>) -> Self {
        Self { kind: kind.into() }
    }
}

/// Failure reported by the transport collaborator. Never retried here; the
/// caller renders it as a generic error toast.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    #[error("network failure: {0}")]
    Network(String),
    #[error("server returned status {status}")]
    Status { status: u16 },
    #[error("undecodable response body: {0}")]
    Decode(String),
}
