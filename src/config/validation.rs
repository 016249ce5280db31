//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Enforce required, non-zero connection ceilings
//! - Require a listen target (unix socket path or address+port)
//! - Check TLS material pairing
//!
//! # Design Decisions
//! - Returns all validation errors, not just the first
//! - Validation is a pure function: `RpcServerConfig → Result<(), Vec<ValidationError>>`
//! - Runs before config is accepted into the system

use crate::config::schema::RpcServerConfig;
use crate::error::ValidationError;

/// Validate a configuration snapshot, reporting every problem found.
pub fn validate_config(config: &RpcServerConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if matches!(config.limits.max_concurrent_connections, None | Some(0)) {
        errors.push(ValidationError::MissingConnectionLimit {
            field: "max_concurrent_connections",
        });
    }
    if matches!(
        config.limits.max_concurrent_upgraded_connections,
        None | Some(0)
    ) {
        errors.push(ValidationError::MissingConnectionLimit {
            field: "max_concurrent_upgraded_connections",
        });
    }

    let has_socket_path = config
        .listener
        .unix_socket_path
        .as_deref()
        .is_some_and(|path| !path.trim().is_empty());
    let has_address = config.listener.bind_address.is_some();
    let has_port = config.listener.port.is_some();

    if !has_socket_path {
        if !has_address && !has_port {
            errors.push(ValidationError::NoListenTarget);
        } else if has_port && !has_address {
            errors.push(ValidationError::PortWithoutAddress);
        }
    }

    if let Some(address) = config.listener.bind_address.as_deref() {
        if address.parse::<std::net::IpAddr>().is_err() {
            errors.push(ValidationError::InvalidBindAddress(address.to_string()));
        }
    }

    if let Some(tls) = &config.tls {
        if tls.cert_path.trim().is_empty() && !tls.key_path.trim().is_empty() {
            errors.push(ValidationError::KeyWithoutCert);
        }
        if tls.key_path.trim().is_empty() && !tls.cert_path.trim().is_empty() {
            errors.push(ValidationError::CertWithoutKey);
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
