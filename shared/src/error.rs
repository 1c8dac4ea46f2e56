//! Error taxonomy for the wire protocol and connection handling.
//!
//! Every variant is local to one connection: the server ends that session
//! and keeps running. Only failing to bind the listener is fatal.

use crate::codec::MAX_FRAME_LEN;

#[derive(Debug, thiserror::Error)]
pub enum NetError {
    /// The stream closed part-way through a header or body.
    #[error("framing error: expected {expected} bytes, stream closed after {received}")]
    Framing { expected: usize, received: usize },

    #[error("framing error: frame of {len} bytes exceeds the {} byte limit", MAX_FRAME_LEN)]
    Oversized { len: usize },

    /// The payload did not match the expected schema.
    #[error("serialization error: {0}")]
    Serialization(#[from] bincode::Error),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("server full: {0} players already connected")]
    Capacity(usize),

    /// Peer closed the stream cleanly between frames.
    #[error("connection closed by peer")]
    Closed,
}

impl NetError {
    pub fn is_framing(&self) -> bool {
        matches!(self, NetError::Framing { .. } | NetError::Oversized { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let framing = NetError::Framing {
            expected: 100,
            received: 40,
        };
        assert_eq!(
            framing.to_string(),
            "framing error: expected 100 bytes, stream closed after 40"
        );

        assert_eq!(
            NetError::Capacity(2).to_string(),
            "server full: 2 players already connected"
        );
        assert_eq!(NetError::Closed.to_string(), "connection closed by peer");
    }

    #[test]
    fn test_is_framing() {
        assert!(NetError::Framing {
            expected: 4,
            received: 1
        }
        .is_framing());
        assert!(NetError::Oversized { len: usize::MAX }.is_framing());
        assert!(!NetError::Closed.is_framing());
        assert!(!NetError::Capacity(2).is_framing());
    }

    #[test]
    fn test_io_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::TimedOut, "write timed out");
        let err: NetError = io.into();
        assert!(matches!(err, NetError::Io(_)));
    }
}
