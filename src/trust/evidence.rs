//! Normalized view of a certificate-verification outcome.
//!
//! The TLS stack produces a messy, library-specific verdict. This module
//! flattens it into the three aggregate policy flags and the per-element
//! chain statuses the evaluator needs, so the decision logic never touches
//! rustls types directly.

/// Aggregate policy-error flags for one handshake.
///
/// Mirrors the classic TLS policy-error triple: chain construction failed,
/// the peer name did not match, or no certificate was supplied at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PolicyErrors {
    /// One or more errors occurred while building the verification chain.
    pub chain_errors: bool,
    /// The certificate does not match the host name it was presented for.
    pub name_mismatch: bool,
    /// The remote did not supply a certificate.
    pub not_available: bool,
}

impl PolicyErrors {
    /// No policy errors at all.
    pub const NONE: PolicyErrors = PolicyErrors {
        chain_errors: false,
        name_mismatch: false,
        not_available: false,
    };

    /// True if no error flag is set.
    pub fn is_clear(&self) -> bool {
        *self == Self::NONE
    }
}

/// Status of a single element in the verification chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChainStatus {
    /// The element verified cleanly.
    NoError,
    /// The element chains to a root that is not in the trust store.
    UntrustedRoot,
    /// The element is revoked.
    Revoked,
    /// The element is expired.
    Expired,
    /// The element is not yet valid.
    NotYetValid,
    /// The element's key usage / extended key usage forbids this role.
    InvalidUsage,
    /// The chain could not be completed up to a root.
    PartialChain,
    /// Any other status, carried as an opaque code.
    Other(u32),
}

impl ChainStatus {
    /// True only for [`ChainStatus::NoError`].
    pub fn is_no_error(&self) -> bool {
        matches!(self, ChainStatus::NoError)
    }
}

/// One element of the verification chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChainEntry {
    pub status: ChainStatus,
}

impl ChainEntry {
    pub fn new(status: ChainStatus) -> Self {
        Self { status }
    }
}

/// Everything the trust evaluator is allowed to see about one handshake.
///
/// Built per handshake and consumed exactly once; callers must not retain
/// it across evaluations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainEvidence {
    /// Aggregate policy-error flags.
    pub errors: PolicyErrors,
    /// Distinguished name of the leaf certificate's subject.
    pub subject: String,
    /// Distinguished name of the leaf certificate's issuer.
    pub issuer: String,
    /// Per-element chain statuses, leaf first. `None` when the TLS stack
    /// could not build a chain at all.
    pub chain: Option<Vec<ChainEntry>>,
}

impl ChainEvidence {
    /// True when the leaf's subject equals its issuer.
    ///
    /// This is the self-signed marker the relaxed policies key on. The
    /// original contract compares distinguished names only, without also
    /// checking the public key or serial number; that behavior is kept
    /// as-is rather than strengthened.
    pub fn is_self_issued(&self) -> bool {
        self.subject == self.issuer
    }
}
