//! Error types for caller identity resolution.

/// Result type alias for identity resolution.
pub type Result<T> = std::result::Result<T, IdentityError>;

/// Errors raised while turning a bus caller token into process details.
///
/// These never reach bus callers: the resolver logs them and degrades the
/// owner record instead.
#[derive(Debug, thiserror::Error)]
pub enum IdentityError {
    /// The caller token was empty.
    #[error("Empty caller token")]
    EmptyToken,

    /// The bus has no connection with this unique name.
    #[error("Unknown bus connection: {token}")]
    UnknownConnection { token: String },

    /// The transport query itself failed.
    #[error("Bus query failed: {message}")]
    Transport { message: String },

    /// Reading the process table failed.
    #[error("Process table error: {0}")]
    Io(#[from] std::io::Error),
}

impl IdentityError {
    /// Create a new unknown connection error.
    pub fn unknown_connection(token: impl Into<String>) -> Self {
        Self::UnknownConnection {
            token: token.into(),
        }
    }

    /// Create a new transport error.
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
        }
    }
}
