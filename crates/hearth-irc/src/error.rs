//! Error types for the IRC engine.

use thiserror::Error;

/// Convenience alias used throughout the crate.
pub type Result<T, E = IrcError> = std::result::Result<T, E>;

/// Errors raised by the client and its line codec.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum IrcError {
    /// An I/O error on the underlying stream.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// An inbound line exceeded the codec's length limit.
    #[error("line too long: {actual} bytes (limit {limit})")]
    LineTooLong {
        /// Length seen so far.
        actual: usize,
        /// Configured limit.
        limit: usize,
    },

    /// Establishing the TCP connection failed.
    #[error("failed to connect to {addr}: {source}")]
    Connect {
        /// `host:port` that was dialled.
        addr: String,
        /// Underlying cause.
        #[source]
        source: std::io::Error,
    },

    /// A write was attempted while no connection is open.
    #[error("not connected")]
    NotConnected,

    /// The server closed the stream.
    #[error("connection closed by server")]
    Closed,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn io_error_converts_and_chains() {
        let io = std::io::Error::new(std::io::ErrorKind::BrokenPipe, "broken pipe");
        let err: IrcError = io.into();
        assert_eq!(err.to_string(), "io error: broken pipe");
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn connect_error_names_address() {
        let err = IrcError::Connect {
            addr: "irc.example.net:6667".to_string(),
            source: std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "refused"),
        };
        assert!(err.to_string().contains("irc.example.net:6667"));
        assert_eq!(std::error::Error::source(&err).unwrap().to_string(), "refused");
    }

    #[test]
    fn line_too_long_display() {
        let err = IrcError::LineTooLong {
            actual: 9000,
            limit: 8192,
        };
        assert_eq!(err.to_string(), "line too long: 9000 bytes (limit 8192)");
    }
}
