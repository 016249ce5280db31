//! The trust decision engine.
//!
//! # Responsibilities
//! - Decide whether an otherwise-failing handshake is accepted under a
//!   relaxed trust policy
//! - Stay pure, deterministic, and re-entrant: invoked synchronously on the
//!   handshake path, potentially for many connections at once
//!
//! # Design Decisions
//! - Three named policies as a closed enum dispatched through one function,
//!   no trait objects on the hot path
//! - The relaxed policies scope the exception to exactly the
//!   self-issued-root case; any additional chain defect still fails closed
//! - An arbitrary predicate can be installed through
//!   [`CertificateEvaluator::Custom`] and always overrides the named policy

use std::fmt;
use std::sync::Arc;

use crate::trust::evidence::ChainEvidence;

/// Named rule set for accepting or rejecting a TLS peer certificate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TrustPolicy {
    /// Accept only certificates that verified with no policy errors.
    #[default]
    Strict,
    /// Additionally accept a chain whose only defect is a self-issued
    /// untrusted root. Intended for development and lab deployments.
    AllowSelfSigned,
    /// As [`TrustPolicy::AllowSelfSigned`], additionally tolerating a host
    /// name mismatch. Not recommended for production.
    AllowSelfSignedAndHostMismatch,
}

impl TrustPolicy {
    /// Map the two configuration toggles onto a policy.
    ///
    /// `allow_host_mismatch` is ignored unless `allow_self_signed` is set,
    /// matching the configuration contract.
    pub fn from_flags(allow_self_signed: bool, allow_host_mismatch: bool) -> Self {
        match (allow_self_signed, allow_host_mismatch) {
            (false, _) => TrustPolicy::Strict,
            (true, false) => TrustPolicy::AllowSelfSigned,
            (true, true) => TrustPolicy::AllowSelfSignedAndHostMismatch,
        }
    }
}

/// Decide whether the peer certificate is accepted under `policy`.
///
/// Pure and allocation-free. The boolean result alone determines
/// acceptance; this function never logs or mutates shared state.
pub fn evaluate(policy: TrustPolicy, evidence: &ChainEvidence) -> bool {
    if evidence.errors.is_clear() {
        return true;
    }

    let chain_review_allowed = match policy {
        TrustPolicy::Strict => false,
        TrustPolicy::AllowSelfSigned => {
            evidence.errors.chain_errors
                && !evidence.errors.name_mismatch
                && !evidence.errors.not_available
        }
        TrustPolicy::AllowSelfSignedAndHostMismatch => {
            evidence.errors.chain_errors && !evidence.errors.not_available
        }
    };

    if !chain_review_allowed {
        return false;
    }

    match &evidence.chain {
        // No chain could be built: the expected self-signed-root case.
        None => true,
        Some(entries) => {
            let self_issued = evidence.is_self_issued();
            !entries.iter().any(|entry| {
                let tolerated = self_issued
                    && entry.status == crate::trust::evidence::ChainStatus::UntrustedRoot;
                !tolerated && !entry.status.is_no_error()
            })
        }
    }
}

/// The certificate callback installed on a listener or channel.
///
/// Either a named policy or an explicit predicate; an explicit predicate
/// always overrides the named policies.
#[derive(Clone)]
pub enum CertificateEvaluator {
    Policy(TrustPolicy),
    Custom(Arc<dyn Fn(&ChainEvidence) -> bool + Send + Sync>),
}

impl CertificateEvaluator {
    /// Evaluate one handshake's evidence.
    pub fn evaluate(&self, evidence: &ChainEvidence) -> bool {
        match self {
            CertificateEvaluator::Policy(policy) => evaluate(*policy, evidence),
            CertificateEvaluator::Custom(predicate) => predicate(evidence),
        }
    }

    /// The strict policy, the default for both listeners and channels.
    pub fn strict() -> Self {
        CertificateEvaluator::Policy(TrustPolicy::Strict)
    }
}

impl Default for CertificateEvaluator {
    fn default() -> Self {
        Self::strict()
    }
}

impl From<TrustPolicy> for CertificateEvaluator {
    fn from(policy: TrustPolicy) -> Self {
        CertificateEvaluator::Policy(policy)
    }
}

impl fmt::Debug for CertificateEvaluator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CertificateEvaluator::Policy(policy) => {
                f.debug_tuple("Policy").field(policy).finish()
            }
            CertificateEvaluator::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}
