//! Configuration schema definitions.
//!
//! The declarative server-side configuration snapshot. All types derive
//! Serde traits for deserialization from config files; tunables are
//! `Option`s so that "not set" survives into default resolution.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::transport::limits::LimitsConfig;
use crate::trust::TrustPolicy;

/// Root configuration for an RPC server endpoint.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct RpcServerConfig {
    /// Connection, stream and timeout limits.
    pub limits: LimitsSection,

    /// Where to listen.
    pub listener: ListenerSection,

    /// TLS material. Absent means a deliberate plaintext opt-out, e.g.
    /// local testing; a failed certificate load never falls back to this.
    pub tls: Option<TlsSection>,

    /// Client certificate requirements for the TLS handshake.
    pub client_certificate_mode: ClientCertificateMode,

    /// Accept self-signed peer certificates.
    pub allow_self_signed: Option<bool>,

    /// With `allow_self_signed`, additionally tolerate a host name
    /// mismatch. Not recommended for production.
    pub allow_host_mismatch: Option<bool>,

    /// Verbose per-connection diagnostics. Pass-through; has no effect on
    /// the trust decision.
    pub enable_connection_logging: Option<bool>,

    /// Answer non-RPC requests with an informational message. Defaults to
    /// enabled.
    pub enable_non_rpc_warning: Option<bool>,

    /// Override for the informational message sent to non-RPC clients.
    pub non_rpc_warning_message: Option<String>,
}

impl RpcServerConfig {
    /// The trust policy selected by the two relaxation toggles.
    pub fn trust_policy(&self) -> TrustPolicy {
        TrustPolicy::from_flags(
            self.allow_self_signed.unwrap_or(false),
            self.allow_host_mismatch.unwrap_or(false),
        )
    }

    /// The optional limit inputs, ready for resolution.
    pub fn limits(&self) -> LimitsConfig {
        LimitsConfig {
            scale_by_core_count: self.limits.scale_by_core_count,
            max_concurrent_connections: self.limits.max_concurrent_connections,
            max_concurrent_upgraded_connections: self.limits.max_concurrent_upgraded_connections,
            keep_alive_timeout: self.limits.keep_alive_timeout_ms.map(Duration::from_millis),
            request_headers_timeout: self
                .limits
                .request_headers_timeout_ms
                .map(Duration::from_millis),
            max_streams_per_connection: self.limits.max_streams_per_connection,
        }
    }
}

/// Limit tunables. All optional; see `transport::limits` for defaults.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct LimitsSection {
    /// Multiply the connection ceilings by the available core count.
    pub scale_by_core_count: Option<bool>,

    /// Maximum concurrent connections. Required, non-zero.
    pub max_concurrent_connections: Option<u32>,

    /// Maximum concurrent connections upgraded to HTTP/2 service.
    /// Required, non-zero.
    pub max_concurrent_upgraded_connections: Option<u32>,

    /// Keep-alive timeout in milliseconds.
    pub keep_alive_timeout_ms: Option<u64>,

    /// Request-headers timeout in milliseconds.
    pub request_headers_timeout_ms: Option<u64>,

    /// Maximum HTTP/2 streams per connection; excess streams are refused.
    pub max_streams_per_connection: Option<u32>,
}

/// Listen target fields. A non-empty unix socket path always wins over
/// the network fields; that precedence is a design choice, not an error.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ListenerSection {
    /// IP address to bind (e.g. "0.0.0.0").
    pub bind_address: Option<String>,

    /// Port to bind.
    pub port: Option<u16>,

    /// Unix socket path; improves local proxy performance on Linux.
    pub unix_socket_path: Option<String>,
}

/// TLS material for the listener, as PEM files.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TlsSection {
    /// Path to the certificate chain file (PEM).
    pub cert_path: String,

    /// Path to the private key file (PEM).
    pub key_path: String,

    /// Optional root bundle used to validate client certificates (PEM).
    pub ca_path: Option<String>,
}

/// Client certificate requirements for the HTTPS connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ClientCertificateMode {
    /// No client certificate is requested.
    #[default]
    None,
    /// A client certificate is requested but the handshake proceeds
    /// without one.
    Optional,
    /// A client certificate is required.
    Required,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_strict_and_unset() {
        let config = RpcServerConfig::default();
        assert_eq!(config.trust_policy(), TrustPolicy::Strict);
        assert_eq!(config.client_certificate_mode, ClientCertificateMode::None);
        assert!(config.limits().max_concurrent_connections.is_none());
        assert!(config.tls.is_none());
    }

    #[test]
    fn relaxation_toggles_select_policy() {
        let config = RpcServerConfig {
            allow_self_signed: Some(true),
            allow_host_mismatch: Some(true),
            ..RpcServerConfig::default()
        };
        assert_eq!(
            config.trust_policy(),
            TrustPolicy::AllowSelfSignedAndHostMismatch
        );
    }

    #[test]
    fn millisecond_fields_become_durations() {
        let config = RpcServerConfig {
            limits: LimitsSection {
                keep_alive_timeout_ms: Some(500),
                ..LimitsSection::default()
            },
            ..RpcServerConfig::default()
        };
        assert_eq!(
            config.limits().keep_alive_timeout,
            Some(Duration::from_millis(500))
        );
    }

    #[test]
    fn minimal_toml_round_trips() {
        let config: RpcServerConfig = toml::from_str(
            r#"
            client_certificate_mode = "required"
            allow_self_signed = true

            [limits]
            max_concurrent_connections = 16
            max_concurrent_upgraded_connections = 16

            [listener]
            unix_socket_path = "/run/rpc.sock"
            "#,
        )
        .unwrap();
        assert_eq!(
            config.client_certificate_mode,
            ClientCertificateMode::Required
        );
        assert_eq!(config.trust_policy(), TrustPolicy::AllowSelfSigned);
        assert_eq!(config.limits.max_concurrent_connections, Some(16));
        assert_eq!(
            config.listener.unix_socket_path.as_deref(),
            Some("/run/rpc.sock")
        );
    }
}
