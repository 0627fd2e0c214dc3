//! Error types for HBase client operations.
//!
//! This module defines [`Error`], the primary error type for request encoding,
//! remote calls and scan cursors, along with a convenient [`Result`] type alias.
//! [`RemoteError`] is the error type of the injected [`RpcClient`](crate::RpcClient).

/// Error reported by an [`RpcClient`](crate::RpcClient) implementation.
///
/// The client never retries or rewrites these; they are carried unmodified
/// inside [`Error::Remote`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoteError {
    /// The request could not be delivered or the response was lost.
    Transport(String),

    /// The cluster received the request and rejected it.
    Server(String),
}

impl std::error::Error for RemoteError {}

impl std::fmt::Display for RemoteError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RemoteError::Transport(msg) => write!(f, "transport failure: {}", msg),
            RemoteError::Server(msg) => write!(f, "server failure: {}", msg),
        }
    }
}

/// Result type returned by [`RpcClient`](crate::RpcClient) operations.
pub type RemoteResult<T> = std::result::Result<T, RemoteError>;

/// Error type for HBase client operations.
///
/// # Error Categories
///
/// - [`Encoding`](Error::Encoding): A request could not be serialized, or a
///   response could not be decoded.
/// - [`InvalidInput`](Error::InvalidInput): The caller supplied an empty row,
///   a zero cache size, or a mutation of the wrong kind. Detected before any
///   remote call is attempted.
/// - [`Remote`](Error::Remote): The request capability failed. The original
///   [`RemoteError`] is kept, with the operation and target added.
/// - [`CursorMisuse`](Error::CursorMisuse): A scan cursor was used outside its
///   lifecycle, such as adding a filter after scanning began.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// Encoding or decoding errors for wire messages.
    Encoding(String),

    /// Invalid input or parameter errors.
    InvalidInput(String),

    /// A remote call failed.
    Remote {
        /// The client operation that issued the call (`put`, `scan`, ...).
        operation: &'static str,
        /// The table and row or range the call targeted.
        target: String,
        /// The error returned by the request capability.
        source: RemoteError,
    },

    /// A scan cursor operation was invoked in a state that does not allow it.
    CursorMisuse(String),
}

impl Error {
    pub(crate) fn remote(operation: &'static str, target: String, source: RemoteError) -> Self {
        Error::Remote {
            operation,
            target,
            source,
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Remote { source, .. } => Some(source),
            _ => None,
        }
    }
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::Encoding(msg) => write!(f, "Encoding error: {}", msg),
            Error::InvalidInput(msg) => write!(f, "Invalid input: {}", msg),
            Error::Remote {
                operation,
                target,
                source,
            } => write!(f, "Remote {} on {} failed: {}", operation, target, source),
            Error::CursorMisuse(msg) => write!(f, "Cursor misuse: {}", msg),
        }
    }
}

impl From<prost::EncodeError> for Error {
    fn from(err: prost::EncodeError) -> Self {
        Error::Encoding(err.to_string())
    }
}

impl From<prost::DecodeError> for Error {
    fn from(err: prost::DecodeError) -> Self {
        Error::Encoding(err.to_string())
    }
}

/// Result type alias for HBase client operations.
///
/// This is a convenience alias for `std::result::Result<T, Error>`.
pub type Result<T> = std::result::Result<T, Error>;

/// Renders a table and row as an error target, e.g. `users/row-1`.
pub(crate) fn row_target(table: &str, row: &[u8]) -> String {
    format!("{}/{}", table, row.escape_ascii())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn should_keep_remote_error_as_source() {
        // given
        let err = Error::remote(
            "put",
            row_target("users", b"row-1"),
            RemoteError::Transport("connection reset".to_string()),
        );

        // when
        let source = err.source().map(|s| s.to_string());

        // then
        assert_eq!(source.as_deref(), Some("transport failure: connection reset"));
        assert_eq!(
            err.to_string(),
            "Remote put on users/row-1 failed: transport failure: connection reset"
        );
    }

    #[test]
    fn should_escape_binary_rows_in_target() {
        assert_eq!(row_target("t", &[0x00, b'a', 0xff]), "t/\\x00a\\xff");
    }
}
