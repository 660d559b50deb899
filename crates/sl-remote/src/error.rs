//! Remote collaborator errors

/// Failure talking to the GIS service
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RemoteError {
    /// Connection, DNS or TLS failure
    #[error("transport error: {0}")]
    Transport(String),

    /// Request did not complete in time
    #[error("request timed out")]
    Timeout,

    /// Server answered with a non-success status
    #[error("server returned {status}: {body}")]
    Status {
        /// HTTP status code
        status: u16,
        /// Response body (possibly truncated)
        body: String,
    },

    /// Response body could not be decoded
    #[error("malformed response: {0}")]
    Decode(String),

    /// Server refused the operation for a domain reason
    #[error("rejected by server: {0}")]
    Rejected(String),

    /// Referenced record does not exist remotely
    #[error("{0} not found on server")]
    NotFound(String),
}

impl RemoteError {
    /// Check if a retry could succeed
    #[inline]
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Transport(_) | Self::Timeout => true,
            Self::Status { status, .. } => *status >= 500,
            Self::Decode(_) | Self::Rejected(_) | Self::NotFound(_) => false,
        }
    }
}

impl From<reqwest::Error> for RemoteError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout
        } else if err.is_decode() {
            Self::Decode(err.to_string())
        } else if let Some(status) = err.status() {
            Self::Status {
                status: status.as_u16(),
                body: err.to_string(),
            }
        } else {
            Self::Transport(err.to_string())
        }
    }
}
