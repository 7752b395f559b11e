//! Error handling for WHOIS lookups.
//!
//! Every failure a single lookup can hit is captured as a `LookupError` and stored
//! in that domain's `LookupRecord`. Errors never abort sibling lookups.

use std::fmt;
use std::time::Duration;

/// Main error type for lookup operations.
#[derive(Debug, Clone, PartialEq)]
pub enum LookupError {
    /// The domain name cannot be queried at all
    InvalidDomain { domain: String, reason: String },

    /// No WHOIS server is known for the TLD and no default server is configured
    ServerNotFound { tld: String },

    /// Network-level failure talking to the WHOIS server (DNS, connect, read, write)
    Connection { server: String, message: String },

    /// The round-trip exceeded its deadline
    Timeout {
        operation: String,
        duration: Duration,
    },

    /// The caller cancelled the lookup before it completed
    Cancelled { domain: String },

    /// The server kept sending past the response size limit
    ResponseTooLarge { server: String, limit: usize },

    /// Configuration errors (invalid settings, unparsable files)
    ConfigError { message: String },

    /// File I/O errors when reading configuration
    FileError { path: String, message: String },

    /// Errors that don't fit other categories
    Internal { message: String },
}

impl LookupError {
    /// Create a new invalid domain error.
    pub fn invalid_domain<D: Into<String>, R: Into<String>>(domain: D, reason: R) -> Self {
        Self::InvalidDomain {
            domain: domain.into(),
            reason: reason.into(),
        }
    }

    /// Create a new server resolution error.
    pub fn server_not_found<T: Into<String>>(tld: T) -> Self {
        Self::ServerNotFound { tld: tld.into() }
    }

    /// Create a new connection error.
    pub fn connection<S: Into<String>, M: Into<String>>(server: S, message: M) -> Self {
        Self::Connection {
            server: server.into(),
            message: message.into(),
        }
    }

    /// Create a new timeout error.
    pub fn timeout<O: Into<String>>(operation: O, duration: Duration) -> Self {
        Self::Timeout {
            operation: operation.into(),
            duration,
        }
    }

    /// Create a new cancellation error.
    pub fn cancelled<D: Into<String>>(domain: D) -> Self {
        Self::Cancelled {
            domain: domain.into(),
        }
    }

    /// Create a new configuration error.
    pub fn config<M: Into<String>>(message: M) -> Self {
        Self::ConfigError {
            message: message.into(),
        }
    }

    /// Create a new file error.
    pub fn file_error<P: Into<String>, M: Into<String>>(path: P, message: M) -> Self {
        Self::FileError {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Create a new internal error.
    pub fn internal<M: Into<String>>(message: M) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Whether this error belongs to the "lookup failed" family raised by the
    /// protocol client (resolution, connection, timeout, oversized response).
    pub fn is_lookup_failure(&self) -> bool {
        matches!(
            self,
            Self::ServerNotFound { .. }
                | Self::Connection { .. }
                | Self::Timeout { .. }
                | Self::ResponseTooLarge { .. }
        )
    }

    /// Whether this error was caused by caller cancellation.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled { .. })
    }
}

impl fmt::Display for LookupError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidDomain { domain, reason } => {
                write!(f, "Invalid domain '{}': {}", domain, reason)
            }
            Self::ServerNotFound { tld } => {
                write!(f, "No WHOIS server known for TLD '{}'", tld)
            }
            Self::Connection { server, message } => {
                write!(f, "WHOIS lookup via {} failed: {}", server, message)
            }
            Self::Timeout {
                operation,
                duration,
            } => {
                write!(f, "Timeout after {:?} during: {}", duration, operation)
            }
            Self::Cancelled { domain } => {
                write!(f, "Lookup for '{}' was cancelled", domain)
            }
            Self::ResponseTooLarge { server, limit } => {
                write!(f, "Response from {} exceeded {} bytes", server, limit)
            }
            Self::ConfigError { message } => {
                write!(f, "Configuration error: {}", message)
            }
            Self::FileError { path, message } => {
                write!(f, "File error at '{}': {}", path, message)
            }
            Self::Internal { message } => {
                write!(f, "Internal error: {}", message)
            }
        }
    }
}

impl std::error::Error for LookupError {}

impl From<std::io::Error> for LookupError {
    fn from(err: std::io::Error) -> Self {
        Self::Internal {
            message: format!("I/O error: {}", err),
        }
    }
}
