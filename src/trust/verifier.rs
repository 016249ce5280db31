//! rustls verifier adapters.
//!
//! `EvaluatingClientVerifier` (server-side) and `EvaluatingServerVerifier`
//! (client-side) delegate baseline chain building to the webpki verifiers,
//! translate the outcome into a [`ChainEvidence`], and let the installed
//! [`CertificateEvaluator`] make the accept/reject decision.
//!
//! Signature verification stays with the rustls ring crypto provider; only
//! the certificate acceptance decision is customized.
//!
//! # Design Decisions
//! - The translation from a verification outcome to evidence is a pure
//!   function, unit-tested without any handshake
//! - With no trust anchors configured there is nothing to build a chain
//!   against; evidence then carries `chain: None`, the self-signed case the
//!   relaxed policies expect
//! - The evaluator's boolean alone decides; rejection surfaces as a plain
//!   certificate error and never panics or logs above `trace!`

use std::sync::Arc;

use rustls::client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier};
use rustls::client::WebPkiServerVerifier;
use rustls::pki_types::{CertificateDer, ServerName, UnixTime};
use rustls::server::danger::{ClientCertVerified, ClientCertVerifier};
use rustls::server::WebPkiClientVerifier;
use rustls::{
    CertificateError, DigitallySignedStruct, DistinguishedName, Error as TlsError, RootCertStore,
    SignatureScheme,
};
use x509_parser::prelude::{FromDer, GeneralName, X509Certificate};

use crate::error::ConfigError;
use crate::trust::evaluator::CertificateEvaluator;
use crate::trust::evidence::{ChainEntry, ChainEvidence, ChainStatus, PolicyErrors};

/// The ring provider's signature verification algorithms.
fn ring_signature_algorithms() -> &'static rustls::crypto::WebPkiSupportedAlgorithms {
    use std::sync::LazyLock;
    static ALGORITHMS: LazyLock<rustls::crypto::WebPkiSupportedAlgorithms> = LazyLock::new(|| {
        rustls::crypto::ring::default_provider().signature_verification_algorithms
    });
    &ALGORITHMS
}

pub(crate) fn ring_provider() -> Arc<rustls::crypto::CryptoProvider> {
    Arc::new(rustls::crypto::ring::default_provider())
}

/// Baseline verification outcome, before policy is applied.
#[derive(Debug)]
enum Baseline {
    /// webpki accepted the chain.
    Clean,
    /// No trust anchors were configured, so no chain could be built.
    NoChain,
    /// webpki rejected the chain (or the name, client-side).
    Failed(TlsError),
}

/// Subject and issuer of the leaf, for the self-issued check.
///
/// An unparseable certificate must never look self-issued, hence the
/// distinct sentinels.
fn leaf_names(end_entity: &CertificateDer<'_>) -> (String, String) {
    match X509Certificate::from_der(end_entity.as_ref()) {
        Ok((_, cert)) => (cert.subject().to_string(), cert.issuer().to_string()),
        Err(_) => ("<unparseable subject>".to_string(), String::new()),
    }
}

fn chain_status_for(error: &TlsError) -> ChainStatus {
    match error {
        TlsError::InvalidCertificate(cert_error) => match cert_error {
            CertificateError::UnknownIssuer => ChainStatus::UntrustedRoot,
            CertificateError::Revoked => ChainStatus::Revoked,
            CertificateError::Expired => ChainStatus::Expired,
            CertificateError::NotValidYet => ChainStatus::NotYetValid,
            CertificateError::InvalidPurpose => ChainStatus::InvalidUsage,
            _ => ChainStatus::Other(0),
        },
        _ => ChainStatus::Other(0),
    }
}

/// Translate a baseline outcome plus the independent name check into the
/// normalized evidence the evaluator consumes.
fn evidence_from_outcome(
    baseline: Baseline,
    name_mismatch: bool,
    subject: String,
    issuer: String,
) -> ChainEvidence {
    let (errors, chain) = match baseline {
        Baseline::Clean => (
            PolicyErrors {
                chain_errors: false,
                name_mismatch,
                not_available: false,
            },
            Some(vec![ChainEntry::new(ChainStatus::NoError)]),
        ),
        Baseline::NoChain => (
            PolicyErrors {
                chain_errors: true,
                name_mismatch,
                not_available: false,
            },
            None,
        ),
        Baseline::Failed(TlsError::InvalidCertificate(CertificateError::NotValidForName)) => (
            // The chain itself was fine; only the name check failed.
            PolicyErrors {
                chain_errors: false,
                name_mismatch: true,
                not_available: false,
            },
            Some(vec![ChainEntry::new(ChainStatus::NoError)]),
        ),
        Baseline::Failed(error) => (
            PolicyErrors {
                chain_errors: true,
                name_mismatch,
                not_available: false,
            },
            Some(vec![ChainEntry::new(chain_status_for(&error))]),
        ),
    };

    ChainEvidence {
        errors,
        subject,
        issuer,
        chain,
    }
}

fn rejection() -> TlsError {
    TlsError::InvalidCertificate(CertificateError::ApplicationVerificationFailure)
}

// ---------------------------------------------------------------------------
// Server side: verifies the client's certificate
// ---------------------------------------------------------------------------

/// Client-certificate verifier installed on the listener.
#[derive(Debug)]
pub struct EvaluatingClientVerifier {
    inner: Option<Arc<dyn ClientCertVerifier>>,
    evaluator: CertificateEvaluator,
    mandatory: bool,
    no_hints: [DistinguishedName; 0],
}

impl EvaluatingClientVerifier {
    /// Build the verifier. `roots` may be empty, in which case no chain is
    /// ever built and the self-signed policies apply directly.
    pub fn new(
        roots: RootCertStore,
        evaluator: CertificateEvaluator,
        mandatory: bool,
    ) -> Result<Self, ConfigError> {
        let inner = if roots.is_empty() {
            None
        } else {
            let verifier = WebPkiClientVerifier::builder_with_provider(
                Arc::new(roots),
                ring_provider(),
            )
            .build()
            .map_err(|e| ConfigError::Certificate(format!("client verifier: {e}")))?;
            Some(verifier)
        };

        Ok(Self {
            inner,
            evaluator,
            mandatory,
            no_hints: [],
        })
    }
}

impl ClientCertVerifier for EvaluatingClientVerifier {
    fn verify_client_cert(
        &self,
        end_entity: &CertificateDer<'_>,
        intermediates: &[CertificateDer<'_>],
        now: UnixTime,
    ) -> Result<ClientCertVerified, TlsError> {
        let baseline = match &self.inner {
            Some(inner) => match inner.verify_client_cert(end_entity, intermediates, now) {
                Ok(_) => Baseline::Clean,
                Err(error) => Baseline::Failed(error),
            },
            None => Baseline::NoChain,
        };

        let (subject, issuer) = leaf_names(end_entity);
        let evidence = evidence_from_outcome(baseline, false, subject, issuer);
        let accepted = self.evaluator.evaluate(&evidence);
        tracing::trace!(accepted, subject = %evidence.subject, "Client certificate evaluated");

        if accepted {
            Ok(ClientCertVerified::assertion())
        } else {
            Err(rejection())
        }
    }

    fn verify_tls12_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, TlsError> {
        rustls::crypto::verify_tls12_signature(message, cert, dss, ring_signature_algorithms())
    }

    fn verify_tls13_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, TlsError> {
        rustls::crypto::verify_tls13_signature(message, cert, dss, ring_signature_algorithms())
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        ring_signature_algorithms().supported_schemes()
    }

    fn root_hint_subjects(&self) -> &[DistinguishedName] {
        match &self.inner {
            Some(inner) => inner.root_hint_subjects(),
            None => &self.no_hints,
        }
    }

    fn client_auth_mandatory(&self) -> bool {
        self.mandatory
    }
}

// ---------------------------------------------------------------------------
// Client side: verifies the server's certificate
// ---------------------------------------------------------------------------

/// Server-certificate verifier installed on an outbound channel.
#[derive(Debug)]
pub struct EvaluatingServerVerifier {
    inner: Option<Arc<WebPkiServerVerifier>>,
    evaluator: CertificateEvaluator,
}

impl EvaluatingServerVerifier {
    /// Build the verifier. `roots` may be empty; the evaluator then sees
    /// `chain: None` evidence for every handshake.
    pub fn new(
        roots: RootCertStore,
        evaluator: CertificateEvaluator,
    ) -> Result<Self, ConfigError> {
        let inner = if roots.is_empty() {
            None
        } else {
            let verifier =
                WebPkiServerVerifier::builder_with_provider(Arc::new(roots), ring_provider())
                    .build()
                    .map_err(|e| ConfigError::Certificate(format!("server verifier: {e}")))?;
            Some(verifier)
        };

        Ok(Self { inner, evaluator })
    }
}

impl ServerCertVerifier for EvaluatingServerVerifier {
    fn verify_server_cert(
        &self,
        end_entity: &CertificateDer<'_>,
        intermediates: &[CertificateDer<'_>],
        server_name: &ServerName<'_>,
        ocsp_response: &[u8],
        now: UnixTime,
    ) -> Result<ServerCertVerified, TlsError> {
        // webpki checks the name itself on a successful chain; the manual
        // check below only covers outcomes where webpki stopped earlier.
        let (baseline, name_mismatch) = match &self.inner {
            Some(inner) => match inner.verify_server_cert(
                end_entity,
                intermediates,
                server_name,
                ocsp_response,
                now,
            ) {
                Ok(_) => (Baseline::Clean, false),
                Err(TlsError::InvalidCertificate(CertificateError::NotValidForName)) => (
                    Baseline::Failed(TlsError::InvalidCertificate(
                        CertificateError::NotValidForName,
                    )),
                    true,
                ),
                Err(error) => (
                    Baseline::Failed(error),
                    !certificate_matches_name(end_entity, server_name),
                ),
            },
            None => (
                Baseline::NoChain,
                !certificate_matches_name(end_entity, server_name),
            ),
        };

        let (subject, issuer) = leaf_names(end_entity);
        let evidence = evidence_from_outcome(baseline, name_mismatch, subject, issuer);
        let accepted = self.evaluator.evaluate(&evidence);
        tracing::trace!(accepted, subject = %evidence.subject, "Server certificate evaluated");

        if accepted {
            Ok(ServerCertVerified::assertion())
        } else {
            Err(rejection())
        }
    }

    fn verify_tls12_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, TlsError> {
        rustls::crypto::verify_tls12_signature(message, cert, dss, ring_signature_algorithms())
    }

    fn verify_tls13_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, TlsError> {
        rustls::crypto::verify_tls13_signature(message, cert, dss, ring_signature_algorithms())
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        ring_signature_algorithms().supported_schemes()
    }
}

/// Check the presented certificate against the requested server name.
///
/// Subject alternative names win; the common name is only consulted when
/// the certificate carries no SAN extension.
fn certificate_matches_name(end_entity: &CertificateDer<'_>, server_name: &ServerName<'_>) -> bool {
    let Ok((_, cert)) = X509Certificate::from_der(end_entity.as_ref()) else {
        return false;
    };

    match server_name {
        ServerName::DnsName(dns) => {
            let wanted = dns.as_ref();
            if let Ok(Some(san)) = cert.subject_alternative_name() {
                return san.value.general_names.iter().any(|name| match name {
                    GeneralName::DNSName(pattern) => dns_name_matches(pattern, wanted),
                    _ => false,
                });
            }
            cert.subject()
                .iter_common_name()
                .filter_map(|attr| attr.as_str().ok())
                .any(|cn| dns_name_matches(cn, wanted))
        }
        ServerName::IpAddress(ip) => {
            let wanted: std::net::IpAddr = (*ip).into();
            if let Ok(Some(san)) = cert.subject_alternative_name() {
                return san.value.general_names.iter().any(|name| match name {
                    GeneralName::IPAddress(bytes) => ip_bytes_match(bytes, wanted),
                    _ => false,
                });
            }
            false
        }
        _ => false,
    }
}

/// Exact match or a single leftmost wildcard label.
fn dns_name_matches(pattern: &str, name: &str) -> bool {
    let pattern = pattern.to_ascii_lowercase();
    let name = name.to_ascii_lowercase();
    if let Some(suffix) = pattern.strip_prefix("*.") {
        name.split_once('.')
            .is_some_and(|(label, rest)| !label.is_empty() && rest == suffix)
    } else {
        pattern == name
    }
}

fn ip_bytes_match(bytes: &[u8], wanted: std::net::IpAddr) -> bool {
    match (bytes.len(), wanted) {
        (4, std::net::IpAddr::V4(v4)) => bytes == v4.octets().as_slice(),
        (16, std::net::IpAddr::V6(v6)) => bytes == v6.octets().as_slice(),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::trust::evaluator::TrustPolicy;
    use crate::trust::evaluate;

    fn subject() -> String {
        "CN=lab".to_string()
    }

    #[test]
    fn clean_outcome_has_no_errors() {
        let evidence =
            evidence_from_outcome(Baseline::Clean, false, subject(), subject());
        assert!(evidence.errors.is_clear());
        assert_eq!(
            evidence.chain,
            Some(vec![ChainEntry::new(ChainStatus::NoError)])
        );
    }

    #[test]
    fn no_chain_outcome_is_the_self_signed_shape() {
        let evidence =
            evidence_from_outcome(Baseline::NoChain, false, subject(), subject());
        assert!(evidence.errors.chain_errors);
        assert!(!evidence.errors.name_mismatch);
        assert!(evidence.chain.is_none());
        assert!(evaluate(TrustPolicy::AllowSelfSigned, &evidence));
        assert!(!evaluate(TrustPolicy::Strict, &evidence));
    }

    #[test]
    fn unknown_issuer_maps_to_untrusted_root() {
        let evidence = evidence_from_outcome(
            Baseline::Failed(TlsError::InvalidCertificate(CertificateError::UnknownIssuer)),
            false,
            subject(),
            subject(),
        );
        assert!(evidence.errors.chain_errors);
        assert_eq!(
            evidence.chain,
            Some(vec![ChainEntry::new(ChainStatus::UntrustedRoot)])
        );
        assert!(evaluate(TrustPolicy::AllowSelfSigned, &evidence));
    }

    #[test]
    fn revoked_maps_to_revoked_and_fails_closed() {
        let evidence = evidence_from_outcome(
            Baseline::Failed(TlsError::InvalidCertificate(CertificateError::Revoked)),
            false,
            subject(),
            subject(),
        );
        assert_eq!(
            evidence.chain,
            Some(vec![ChainEntry::new(ChainStatus::Revoked)])
        );
        assert!(!evaluate(TrustPolicy::AllowSelfSigned, &evidence));
    }

    #[test]
    fn name_failure_alone_is_not_a_chain_error() {
        let evidence = evidence_from_outcome(
            Baseline::Failed(TlsError::InvalidCertificate(
                CertificateError::NotValidForName,
            )),
            false,
            subject(),
            subject(),
        );
        assert!(!evidence.errors.chain_errors);
        assert!(evidence.errors.name_mismatch);
        assert!(!evaluate(TrustPolicy::AllowSelfSignedAndHostMismatch, &evidence));
    }

    #[test]
    fn name_mismatch_rides_along_with_chain_errors() {
        let evidence = evidence_from_outcome(Baseline::NoChain, true, subject(), subject());
        assert!(evidence.errors.chain_errors);
        assert!(evidence.errors.name_mismatch);
        assert!(!evaluate(TrustPolicy::AllowSelfSigned, &evidence));
        assert!(evaluate(TrustPolicy::AllowSelfSignedAndHostMismatch, &evidence));
    }

    #[test]
    fn dns_matching_rules() {
        assert!(dns_name_matches("lab.example.com", "LAB.example.com"));
        assert!(dns_name_matches("*.example.com", "a.example.com"));
        assert!(!dns_name_matches("*.example.com", "example.com"));
        assert!(!dns_name_matches("*.example.com", "a.b.example.com"));
        assert!(!dns_name_matches("other.example.com", "lab.example.com"));
    }

    #[test]
    fn ip_byte_comparison() {
        assert!(ip_bytes_match(
            &[127, 0, 0, 1],
            "127.0.0.1".parse().unwrap()
        ));
        assert!(!ip_bytes_match(&[10, 0, 0, 1], "127.0.0.1".parse().unwrap()));
    }
}
