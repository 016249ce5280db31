//! Crate-wide error types.
//!
//! Three distinct families with different lifecycles:
//! - [`ConfigError`]: fatal at startup, surfaced to the operator, never
//!   retried
//! - [`AcceptError`]: per connection, terminates that handshake only and
//!   never escalates
//! - [`CallError`]: per call, with cancellation and deadline kept distinct
//!   from transport failures so retry logic can tell "caller gave up" from
//!   "the system failed"

use thiserror::Error;

/// Fatal configuration errors, raised before any connection is accepted.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A connection ceiling was absent or zero. There is no sensible
    /// default for a connection ceiling, so this is never guessed.
    #[error("{field} must be set to a non-zero value")]
    MissingConnectionLimit { field: &'static str },

    /// Neither a unix socket path nor a network address+port was supplied.
    #[error("no listen target: set a unix socket path or an address and port")]
    MissingListenTarget,

    /// Certificate or key material was unreadable or malformed. A listener
    /// cannot be partially secured, so this fails the bind outright.
    #[error("certificate material: {0}")]
    Certificate(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("parse error: {0}")]
    Parse(#[from] toml::de::Error),

    /// Semantic validation failures, all of them.
    #[error("validation failed: {}", format_validation(.0))]
    Validation(Vec<ValidationError>),
}

fn format_validation(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// One semantic problem found while validating a configuration snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("{field} must be set to a non-zero value")]
    MissingConnectionLimit { field: &'static str },

    #[error("no listen target configured")]
    NoListenTarget,

    #[error("listener port set without a bind address")]
    PortWithoutAddress,

    #[error("bind address is not a valid IP address: {0}")]
    InvalidBindAddress(String),

    #[error("TLS certificate path set without a key path")]
    CertWithoutKey,

    #[error("TLS key path set without a certificate path")]
    KeyWithoutCert,
}

/// Per-connection accept/handshake failures. These terminate one
/// connection and have no effect on any other.
#[derive(Debug, Error)]
pub enum AcceptError {
    #[error("accept failed: {0}")]
    Accept(#[source] std::io::Error),

    /// TLS handshake failed, including trust rejection by the installed
    /// certificate evaluator.
    #[error("handshake failed: {0}")]
    Handshake(#[source] std::io::Error),

    /// The peer did not complete the handshake within the request-headers
    /// timeout.
    #[error("handshake timed out")]
    HandshakeTimeout,

    /// Shutdown was requested while waiting for a connection.
    #[error("listener cancelled")]
    Cancelled,
}

/// Per-call failures surfaced to the caller of an RPC invocation.
#[derive(Debug, Error)]
pub enum CallError {
    /// The caller's cancellation signal fired.
    #[error("call cancelled by caller")]
    Cancelled,

    /// The absolute deadline passed before the call completed.
    #[error("call deadline exceeded")]
    DeadlineExceeded,

    /// Connectivity loss, peer failure, or any other transport problem.
    #[error("transport error: {0}")]
    Transport(String),
}
