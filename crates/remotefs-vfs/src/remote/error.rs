//! Errors surfaced by the remote client.

use thiserror::Error;

use super::consts::{ENOENT, strerror};

/// A failed remote call.
///
/// The client reports a negative return code and renders it into the
/// message text (`ret=-17`), which is all some callers get to see.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RemoteError {
    /// A call returned a negative status code.
    #[error("remote: ret={ret}, {message}")]
    Status { ret: i32, message: String },

    /// A failure the client only describes in text.
    #[error("remote: {0}")]
    Other(String),
}

impl RemoteError {
    /// Build an error from a positive errno value.
    pub fn errno(errno: i32) -> Self {
        Self::Status {
            ret: -errno,
            message: strerror(errno).to_string(),
        }
    }

    /// Build an error from a positive errno value with a custom message.
    pub fn errno_with(errno: i32, message: impl Into<String>) -> Self {
        Self::Status {
            ret: -errno,
            message: message.into(),
        }
    }

    /// Create an Other error.
    pub fn other(msg: impl Into<String>) -> Self {
        Self::Other(msg.into())
    }

    /// The negative return code, if the client supplied one.
    pub fn ret(&self) -> Option<i32> {
        match self {
            Self::Status { ret, .. } => Some(*ret),
            Self::Other(_) => None,
        }
    }

    /// True if the remote reported the path as missing.
    pub fn is_not_exist(&self) -> bool {
        self.ret() == Some(-ENOENT)
    }
}

/// Result type for remote client calls.
pub type RemoteResult<T> = Result<T, RemoteError>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remote::consts::EEXIST;

    #[test]
    fn test_status_renders_ret() {
        let err = RemoteError::errno(EEXIST);
        assert_eq!(err.to_string(), "remote: ret=-17, File exists");
        assert_eq!(err.ret(), Some(-17));
        assert!(!err.is_not_exist());
    }

    #[test]
    fn test_not_exist() {
        assert!(RemoteError::errno(ENOENT).is_not_exist());
        assert!(!RemoteError::other("no such thing").is_not_exist());
    }
}
