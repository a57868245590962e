//! Failure classes of the publish cycle.
//!
//! None of these are recovered inside the producer. Each one aborts the
//! current cycle and is returned to the caller; the binary exits non-zero and
//! relies on a process supervisor to restart it.

use std::fmt;

#[derive(Debug)]
pub enum ProducerError {
    /// The frame source failed to deliver an encoded frame.
    Capture(anyhow::Error),
    /// The frame could not be split into segments (e.g. empty payload).
    Chunking(String),
    /// The content store rejected an insert.
    Store(String),
    /// Fetching the route registration command failed.
    RegistrationHttp(anyhow::Error),
    /// Forwarding the registration command to the face failed.
    TransportSend(anyhow::Error),
    /// The face failed while draining pending events.
    Transport(anyhow::Error),
}

impl ProducerError {
    /// Short stable label, used in log lines.
    pub fn kind(&self) -> &'static str {
        match self {
            ProducerError::Capture(_) => "capture",
            ProducerError::Chunking(_) => "chunking",
            ProducerError::Store(_) => "store",
            ProducerError::RegistrationHttp(_) => "registration_http",
            ProducerError::TransportSend(_) => "transport_send",
            ProducerError::Transport(_) => "transport",
        }
    }
}

impl fmt::Display for ProducerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProducerError::Capture(e) => write!(f, "capture failed: {:#}", e),
            ProducerError::Chunking(msg) => write!(f, "chunking failed: {}", msg),
            ProducerError::Store(msg) => write!(f, "content store failed: {}", msg),
            ProducerError::RegistrationHttp(e) => write!(f, "registration request failed: {:#}", e),
            ProducerError::TransportSend(e) => write!(f, "transport send failed: {:#}", e),
            ProducerError::Transport(e) => write!(f, "transport failed: {:#}", e),
        }
    }
}

impl std::error::Error for ProducerError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ProducerError::Capture(e)
            | ProducerError::RegistrationHttp(e)
            | ProducerError::TransportSend(e)
            | ProducerError::Transport(e) => Some(&**e),
            ProducerError::Chunking(_) | ProducerError::Store(_) => None,
        }
    }
}
