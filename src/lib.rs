//! rpclink: TLS trust and transport configuration for RPC connections.
//!
//! Establishes trust for TLS-protected RPC (HTTP/2) connections and derives
//! concrete transport configuration from a small set of declarative policy
//! flags.
//!
//! # Architecture Overview
//!
//! ```text
//!                 ┌────────────────────────────────────────────────┐
//!                 │                   SERVER SIDE                   │
//!  config file    │  ┌────────┐   ┌───────────┐   ┌─────────────┐  │
//!  ───────────────┼─▶│ config │──▶│ transport │──▶│  listener   │  │
//!                 │  │        │   │  limits   │   │  (binding)  │  │
//!                 │  └────────┘   └───────────┘   └──────┬──────┘  │
//!                 │                                      │         │
//!                 │                               ┌──────▼──────┐  │
//!  TLS handshake  │                               │    trust    │  │
//!  ───────────────┼──────────────────────────────▶│  evaluator  │  │
//!                 │                               └─────────────┘  │
//!                 ├────────────────────────────────────────────────┤
//!                 │                   CLIENT SIDE                   │
//!                 │  ┌─────────────────┐      ┌─────────────────┐  │
//!                 │  │ channel options │      │  call options   │  │
//!                 │  │ (TLS 1.2 + cap) │      │ (per-call, new  │  │
//!                 │  │                 │      │  each attempt)  │  │
//!                 │  └─────────────────┘      └─────────────────┘  │
//!                 └────────────────────────────────────────────────┘
//! ```
//!
//! The trust evaluator is the core: it walks a certificate's verification
//! outcome and decides whether an otherwise-failing handshake is accepted
//! under a relaxed policy (self-signed certificates, optionally with a
//! mismatched host name). Everything RPC (dispatch, serialization,
//! payloads) belongs to an external runtime; this crate hands it a bound
//! listener and option bundles.

// Core subsystems
pub mod config;
pub mod transport;
pub mod trust;

// Client side
pub mod client;

// Cross-cutting
pub mod error;

pub use client::{CallOptions, ChannelConfig, ChannelOptions};
pub use config::RpcServerConfig;
pub use error::{AcceptError, CallError, ConfigError};
pub use transport::{BoundListener, ListenTarget, TransportLimits};
pub use trust::{evaluate, CertificateEvaluator, ChainEvidence, TrustPolicy};
