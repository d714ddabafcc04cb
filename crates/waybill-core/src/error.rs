//! Categorized errors
//!
//! Every crate in the workspace defines its own `thiserror` enum and maps
//! each variant onto an [`ErrorCategory`], which is what frontends use to
//! decide how loudly to report a failure.

use std::fmt;
use std::path::PathBuf;

/// High-level error categories shared by every frontend.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// User input validation errors (correctable by user)
    Input,
    /// Configuration errors (correctable by modifying settings)
    Config,
    /// Session or credential problems (sign in again)
    Auth,
    /// Network connectivity errors (often transient)
    Network,
    /// Malformed data from the backend
    Protocol,
    /// Local storage failures
    Storage,
}

impl ErrorCategory {
    /// Whether the user can fix this without outside help.
    #[must_use]
    pub fn is_user_correctable(&self) -> bool {
        matches!(self, Self::Input | Self::Config | Self::Auth)
    }

    /// Whether retrying may succeed.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Network)
    }

    /// Short label for this category.
    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            Self::Input => "Input",
            Self::Config => "Config",
            Self::Auth => "Session",
            Self::Network => "Network",
            Self::Protocol => "Protocol",
            Self::Storage => "Storage",
        }
    }

    /// Hint for the user on how to resolve this category of error.
    #[must_use]
    pub fn resolution_hint(&self) -> &'static str {
        match self {
            Self::Input => "Check your input and try again",
            Self::Config => "Review your configuration settings",
            Self::Auth => "Sign in again to refresh your session",
            Self::Network => "Check your network connection and retry",
            Self::Protocol => "The server sent data this client does not understand",
            Self::Storage => "Check that the data directory is writable",
        }
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Implemented by every error type in the workspace.
pub trait Categorized {
    /// Category used for reporting.
    fn category(&self) -> ErrorCategory;
}

/// Configuration loading and validation failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The config file exists but could not be read
    #[error("failed to read config file {path}: {source}")]
    Read {
        /// File that failed
        path: PathBuf,
        /// Underlying IO error
        #[source]
        source: std::io::Error,
    },
    /// The config file is not valid TOML for this schema
    #[error("failed to parse config file {path}: {message}")]
    Parse {
        /// File that failed
        path: PathBuf,
        /// Parser message
        message: String,
    },
    /// A `section.field` key that does not exist
    #[error("unknown configuration key '{0}'")]
    UnknownKey(String),
    /// A value that could not be parsed or fails validation
    #[error("invalid value for '{key}': {reason}")]
    InvalidValue {
        /// Offending key
        key: String,
        /// Why it was rejected
        reason: String,
    },
}

impl ConfigError {
    pub(crate) fn invalid(key: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidValue {
            key: key.into(),
            reason: reason.into(),
        }
    }
}

impl Categorized for ConfigError {
    fn category(&self) -> ErrorCategory {
        match self {
            Self::Read { .. } => ErrorCategory::Storage,
            Self::Parse { .. } | Self::UnknownKey(_) | Self::InvalidValue { .. } => {
                ErrorCategory::Config
            }
        }
    }
}
