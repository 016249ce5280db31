//! Client-side subsystem.
//!
//! # Data Flow
//! ```text
//! trust policy / explicit evaluator
//!     → channel.rs (TLS 1.2 client config + connection cap → ChannelOptions)
//!     → external RPC client runtime (owns the actual connections)
//!
//! per call:
//!     call.rs (headers, absolute deadline, cancellation, credentials
//!              → CallOptions, one bundle per attempt)
//! ```
//!
//! # Design Decisions
//! - Both builders are stateless and safe to call concurrently
//! - Deadlines are absolute (`now + timeout` at build time); a retried
//!   call must build a fresh bundle
//! - Only explicitly supplied inputs are attached; omission stays
//!   distinguishable from empty

pub mod call;
pub mod channel;

pub use call::{CallCredentials, CallOptions, MetadataValue};
pub use channel::{ChannelConfig, ChannelCredentials, ChannelOptions};
