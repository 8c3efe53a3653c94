/// Everything a fetch can end in other than a payload.
///
/// `InvalidInput` is the caller's fault and is never retried. `Transport`
/// covers the network layer and malformed bodies. `Upstream` is the
/// interpreter answering with a non-200 status.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FetchError {
    #[error("upstream returned {status_code}: {message}")]
    Upstream { status_code: u16, message: String },
    #[error("transport error: {reason}")]
    Transport { reason: String },
    #[error("invalid input: {reason}")]
    InvalidInput { reason: String },
}

impl FetchError {
    pub fn upstream(status_code: u16, message: impl Into<String>) -> Self {
        FetchError::Upstream {
            status_code,
            message: message.into(),
        }
    }

    pub fn transport(reason: impl Into<String>) -> Self {
        FetchError::Transport {
            reason: reason.into(),
        }
    }

    pub fn invalid_input(reason: impl Into<String>) -> Self {
        FetchError::InvalidInput {
            reason: reason.into(),
        }
    }

    /// The message shown to browser clients.
    pub fn client_message(&self) -> String {
        match self {
            FetchError::Upstream {
                status_code,
                message,
            } => format!("Overpass returned HTTP {status_code}: {message}"),
            FetchError::Transport { reason } => format!("Could not reach Overpass: {reason}"),
            FetchError::InvalidInput { reason } => reason.clone(),
        }
    }
}

/// `Success{payload}` is `Ok`, every failure is a [`FetchError`].
pub type FetchResult = Result<serde_json::Value, FetchError>;
