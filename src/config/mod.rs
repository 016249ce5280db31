//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → RpcServerConfig (validated, immutable)
//!     → transport::limits (default resolution)
//!     → transport::listener (binding)
//! ```
//!
//! # Design Decisions
//! - Every tunable is an explicit `Option`; omission is distinguishable
//!   from any configured value
//! - Defaults are resolved in `transport::limits`, never here, so the
//!   default policy lives in exactly one testable place
//! - Config is immutable once loaded; validation separates syntactic
//!   (serde) from semantic checks and reports all errors, not just the
//!   first

pub mod loader;
pub mod schema;
pub mod validation;

pub use schema::{ClientCertificateMode, ListenerSection, RpcServerConfig, TlsSection};
