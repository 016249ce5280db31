//! Transport layer subsystem.
//!
//! # Data Flow
//! ```text
//! RpcServerConfig (validated snapshot)
//!     → limits.rs (defaults, floors, core scaling → TransportLimits)
//!     → tls.rs (PEM material → TLS 1.2 server config + trust callback)
//!     → listener.rs (bind target selection, accept loop, HTTP/2 serve)
//!     → external RPC dispatch layer
//! ```
//!
//! # Design Decisions
//! - Limits and binding are resolved once at startup, single-threaded,
//!   before any connection is accepted; the results are immutable
//! - HTTP/2 over TLS 1.2 is the only transport protocol; earlier TLS
//!   versions are rejected at the handshake layer
//! - Connection ceilings are enforced with semaphore permits held for the
//!   connection's lifetime (released on drop even if a handler panics)

pub mod limits;
pub mod listener;
pub mod tls;

pub use limits::{available_core_count, LimitsConfig, TransportLimits};
pub use listener::{BoundListener, ListenTarget, ListenerOptions, ListenerSecurity};
pub use tls::TlsMaterial;
