//! TLS material loading and server-side TLS configuration.
//!
//! # Responsibilities
//! - Load certificate chain, private key and optional client CA bundle
//!   from PEM files
//! - Build the rustls server config: TLS 1.2 only, ALPN `h2`, the trust
//!   evaluator installed as the client-certificate callback
//!
//! # Design Decisions
//! - Malformed or missing material is fatal to the listener's startup; a
//!   transport cannot be partially secured, so there is no fallback
//! - The TLS 1.2 pin is not configurable

use std::io::BufReader;
use std::path::Path;
use std::sync::Arc;

use rustls::pki_types::{CertificateDer, PrivateKeyDer};
use rustls::RootCertStore;

use crate::config::schema::{ClientCertificateMode, TlsSection};
use crate::error::ConfigError;
use crate::trust::evaluator::CertificateEvaluator;
use crate::trust::verifier::{ring_provider, EvaluatingClientVerifier};

/// Certificate chain, private key and client CA roots for one listener.
#[derive(Debug)]
pub struct TlsMaterial {
    pub cert_chain: Vec<CertificateDer<'static>>,
    pub key: PrivateKeyDer<'static>,
    /// Roots used to validate client certificates. May be empty, in which
    /// case every client chain is unverifiable and only the relaxed trust
    /// policies can accept one.
    pub client_roots: RootCertStore,
}

impl TlsMaterial {
    /// Load material from the configured PEM files.
    pub fn from_section(section: &TlsSection) -> Result<Self, ConfigError> {
        let cert_chain = read_cert_file(Path::new(&section.cert_path))?;
        if cert_chain.is_empty() {
            return Err(ConfigError::Certificate(format!(
                "no certificates found in {}",
                section.cert_path
            )));
        }

        let key = read_key_file(Path::new(&section.key_path))?;

        let mut client_roots = RootCertStore::empty();
        if let Some(ca_path) = &section.ca_path {
            for cert in read_cert_file(Path::new(ca_path))? {
                client_roots
                    .add(cert)
                    .map_err(|e| ConfigError::Certificate(format!("{ca_path}: {e}")))?;
            }
        }

        Ok(Self {
            cert_chain,
            key,
            client_roots,
        })
    }

    /// Load a certificate/key pair directly, without a client CA bundle.
    pub fn from_pem_files(cert_path: &Path, key_path: &Path) -> Result<Self, ConfigError> {
        Self::from_section(&TlsSection {
            cert_path: cert_path.display().to_string(),
            key_path: key_path.display().to_string(),
            ca_path: None,
        })
    }
}

fn read_cert_file(path: &Path) -> Result<Vec<CertificateDer<'static>>, ConfigError> {
    let file = std::fs::File::open(path)
        .map_err(|e| ConfigError::Certificate(format!("{}: {e}", path.display())))?;
    rustls_pemfile::certs(&mut BufReader::new(file))
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| ConfigError::Certificate(format!("{}: {e}", path.display())))
}

fn read_key_file(path: &Path) -> Result<PrivateKeyDer<'static>, ConfigError> {
    let file = std::fs::File::open(path)
        .map_err(|e| ConfigError::Certificate(format!("{}: {e}", path.display())))?;
    rustls_pemfile::private_key(&mut BufReader::new(file))
        .map_err(|e| ConfigError::Certificate(format!("{}: {e}", path.display())))?
        .ok_or_else(|| {
            ConfigError::Certificate(format!("no private key found in {}", path.display()))
        })
}

/// Build the listener's rustls config: TLS 1.2 only, ALPN `h2`, client
/// certificates handled per `mode` with `evaluator` as the callback.
pub fn build_server_config(
    material: TlsMaterial,
    mode: ClientCertificateMode,
    evaluator: CertificateEvaluator,
) -> Result<Arc<rustls::ServerConfig>, ConfigError> {
    let builder = rustls::ServerConfig::builder_with_provider(ring_provider())
        .with_protocol_versions(&[&rustls::version::TLS12])
        .map_err(|e| ConfigError::Certificate(format!("TLS version pin: {e}")))?;

    let builder = match mode {
        ClientCertificateMode::None => builder.with_no_client_auth(),
        ClientCertificateMode::Optional => builder.with_client_cert_verifier(Arc::new(
            EvaluatingClientVerifier::new(material.client_roots, evaluator, false)?,
        )),
        ClientCertificateMode::Required => builder.with_client_cert_verifier(Arc::new(
            EvaluatingClientVerifier::new(material.client_roots, evaluator, true)?,
        )),
    };

    let mut config = builder
        .with_single_cert(material.cert_chain, material.key)
        .map_err(|e| ConfigError::Certificate(format!("server certificate: {e}")))?;
    config.alpn_protocols = vec![b"h2".to_vec()];

    Ok(Arc::new(config))
}
