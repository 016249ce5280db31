//! Outbound channel construction.
//!
//! Mirrors the server's trust policies for the client side: the channel's
//! TLS config is pinned to TLS 1.2 with the selected (or explicit)
//! certificate evaluator installed as the validation callback, plus a
//! connection cap, an optional proxy and optional channel credentials.
//! The resulting [`ChannelOptions`] is a value object consumed by the
//! external RPC client runtime; no connection is opened here.

use std::sync::Arc;

use rustls::RootCertStore;

use crate::error::ConfigError;
use crate::trust::evaluator::{CertificateEvaluator, TrustPolicy};
use crate::trust::verifier::{ring_provider, EvaluatingServerVerifier};

/// Channel-level credentials, attached to every call on the channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelCredentials {
    token: String,
}

impl ChannelCredentials {
    /// Bearer-token credentials.
    pub fn bearer(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
        }
    }

    /// The `authorization` header value these credentials produce.
    pub fn authorization_value(&self) -> String {
        format!("Bearer {}", self.token)
    }
}

/// Inputs for building channel options.
pub struct ChannelConfig {
    /// Maximum concurrent connections to the server. Must be at least 1.
    pub max_concurrent_connections: u32,
    /// The certificate callback; an explicit custom evaluator always
    /// overrides a named policy.
    pub evaluator: CertificateEvaluator,
    /// Roots used for baseline server-certificate validation. May be
    /// empty, in which case only the relaxed policies can accept a peer.
    pub server_roots: RootCertStore,
    /// Proxy to route the channel through, if one is required.
    pub proxy: Option<http::Uri>,
    /// Credentials associated with the channel, if provided.
    pub credentials: Option<ChannelCredentials>,
}

impl ChannelConfig {
    /// The named-policy form: selects the evaluator from the two
    /// relaxation toggles, mirroring the server configuration.
    pub fn for_policy(
        max_concurrent_connections: u32,
        allow_self_signed: bool,
        allow_host_mismatch: bool,
    ) -> Self {
        Self {
            max_concurrent_connections,
            evaluator: TrustPolicy::from_flags(allow_self_signed, allow_host_mismatch).into(),
            server_roots: RootCertStore::empty(),
            proxy: None,
            credentials: None,
        }
    }
}

/// Assembled client transport options: TLS 1.2 + HTTP/2, connection cap,
/// validation callback. Immutable once built.
#[derive(Debug, Clone)]
pub struct ChannelOptions {
    tls: Arc<rustls::ClientConfig>,
    max_concurrent_connections: usize,
    proxy: Option<http::Uri>,
    credentials: Option<ChannelCredentials>,
}

impl ChannelOptions {
    /// Build channel options from `config`.
    pub fn build(config: ChannelConfig) -> Result<Self, ConfigError> {
        if config.max_concurrent_connections == 0 {
            return Err(ConfigError::MissingConnectionLimit {
                field: "max_concurrent_connections",
            });
        }

        let verifier = Arc::new(EvaluatingServerVerifier::new(
            config.server_roots,
            config.evaluator,
        )?);

        let mut tls = rustls::ClientConfig::builder_with_provider(ring_provider())
            .with_protocol_versions(&[&rustls::version::TLS12])
            .map_err(|e| ConfigError::Certificate(format!("TLS version pin: {e}")))?
            .dangerous()
            .with_custom_certificate_verifier(verifier)
            .with_no_client_auth();
        tls.alpn_protocols = vec![b"h2".to_vec()];

        Ok(Self {
            tls: Arc::new(tls),
            max_concurrent_connections: config.max_concurrent_connections as usize,
            proxy: config.proxy,
            credentials: config.credentials,
        })
    }

    /// The TLS client config, pinned to TLS 1.2 with the evaluator
    /// installed.
    pub fn tls_config(&self) -> Arc<rustls::ClientConfig> {
        Arc::clone(&self.tls)
    }

    pub fn max_concurrent_connections(&self) -> usize {
        self.max_concurrent_connections
    }

    pub fn proxy(&self) -> Option<&http::Uri> {
        self.proxy.as_ref()
    }

    pub fn credentials(&self) -> Option<&ChannelCredentials> {
        self.credentials.as_ref()
    }
}
