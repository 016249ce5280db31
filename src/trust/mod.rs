//! Certificate trust subsystem.
//!
//! # Data Flow
//! ```text
//! TLS handshake (rustls)
//!     → verifier.rs (baseline chain build via webpki)
//!     → evidence.rs (normalized outcome: policy flags + chain statuses)
//!     → evaluator.rs (pure accept/reject decision)
//!     → handshake continues or is terminated
//! ```
//!
//! # Design Decisions
//! - The decision function is pure and allocation-light; it runs on the
//!   handshake path, potentially on many connections in parallel
//! - Evidence is built per handshake and consumed exactly once, never cached
//! - Named policies are a closed enum; an arbitrary predicate can still be
//!   installed for advanced callers

pub mod evaluator;
pub mod evidence;
pub mod verifier;

pub use evaluator::{evaluate, CertificateEvaluator, TrustPolicy};
pub use evidence::{ChainEntry, ChainEvidence, ChainStatus, PolicyErrors};
