//! Per-call option bundles.
//!
//! # Responsibilities
//! - Collect headers, deadline, cancellation and credentials for one call
//! - Convert header values: bytes and text verbatim, anything else via its
//!   default textual form
//! - Resolve a relative timeout into an absolute deadline at build time
//!
//! # Design Decisions
//! - One bundle per call attempt; a retry must rebuild so the deadline is
//!   recomputed
//! - Only non-default inputs are attached: an empty builder's output is
//!   indistinguishable from "no options set" on every field
//! - Cancellation is cooperative and best-effort; it does not guarantee
//!   the remote peer stops processing

use std::fmt;
use std::time::{Duration, Instant};

use tokio_util::sync::CancellationToken;

use crate::error::CallError;

/// A header value: text or raw bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MetadataValue {
    Text(String),
    Binary(Vec<u8>),
}

impl MetadataValue {
    /// Convert any displayable value through its default textual form.
    /// Text and bytes should use the `From` impls instead, which carry
    /// them verbatim.
    pub fn from_display<T: fmt::Display>(value: T) -> Self {
        MetadataValue::Text(value.to_string())
    }
}

impl From<&str> for MetadataValue {
    fn from(value: &str) -> Self {
        MetadataValue::Text(value.to_string())
    }
}

impl From<String> for MetadataValue {
    fn from(value: String) -> Self {
        MetadataValue::Text(value)
    }
}

impl From<Vec<u8>> for MetadataValue {
    fn from(value: Vec<u8>) -> Self {
        MetadataValue::Binary(value)
    }
}

impl From<&[u8]> for MetadataValue {
    fn from(value: &[u8]) -> Self {
        MetadataValue::Binary(value.to_vec())
    }
}

macro_rules! metadata_from_display {
    ($($ty:ty),* $(,)?) => {
        $(
            impl From<$ty> for MetadataValue {
                fn from(value: $ty) -> Self {
                    MetadataValue::from_display(value)
                }
            }
        )*
    };
}

metadata_from_display!(bool, i32, i64, u32, u64, f64);

/// Per-call credentials.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallCredentials {
    token: String,
}

impl CallCredentials {
    pub fn bearer(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
        }
    }

    pub fn authorization_value(&self) -> String {
        format!("Bearer {}", self.token)
    }
}

/// Immutable option bundle for exactly one RPC call.
#[derive(Debug, Clone, Default)]
pub struct CallOptions {
    headers: Option<Vec<(String, MetadataValue)>>,
    deadline: Option<Instant>,
    cancellation: Option<CancellationToken>,
    credentials: Option<CallCredentials>,
}

impl CallOptions {
    pub fn builder() -> CallOptionsBuilder {
        CallOptionsBuilder::default()
    }

    /// Headers in insertion order, or `None` if none were supplied.
    pub fn headers(&self) -> Option<&[(String, MetadataValue)]> {
        self.headers.as_deref()
    }

    /// The absolute deadline, computed as `now + timeout` at build time.
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    pub fn cancellation(&self) -> Option<&CancellationToken> {
        self.cancellation.as_ref()
    }

    pub fn credentials(&self) -> Option<&CallCredentials> {
        self.credentials.as_ref()
    }

    /// Check the bundle against the clock and the cancellation signal.
    ///
    /// Cancellation wins over an expired deadline so retry logic sees
    /// "caller gave up" rather than "the system failed".
    pub fn check_ready(&self, now: Instant) -> Result<(), CallError> {
        if self
            .cancellation
            .as_ref()
            .is_some_and(CancellationToken::is_cancelled)
        {
            return Err(CallError::Cancelled);
        }
        if self.deadline.is_some_and(|deadline| now >= deadline) {
            return Err(CallError::DeadlineExceeded);
        }
        Ok(())
    }
}

/// Builder for [`CallOptions`]. Stateless with respect to the channel;
/// safe to use concurrently from many callers.
#[derive(Debug, Default)]
pub struct CallOptionsBuilder {
    headers: Vec<(String, MetadataValue)>,
    timeout: Option<Duration>,
    cancellation: Option<CancellationToken>,
    credentials: Option<CallCredentials>,
}

impl CallOptionsBuilder {
    /// Add a header. Keys are unique; a repeated key replaces the earlier
    /// value.
    pub fn header(mut self, key: impl Into<String>, value: impl Into<MetadataValue>) -> Self {
        let key = key.into();
        let value = value.into();
        if let Some(existing) = self.headers.iter_mut().find(|(k, _)| *k == key) {
            existing.1 = value;
        } else {
            self.headers.push((key, value));
        }
        self
    }

    /// Relative timeout; becomes an absolute deadline when the bundle is
    /// built.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = Some(token);
        self
    }

    pub fn credentials(mut self, credentials: CallCredentials) -> Self {
        self.credentials = Some(credentials);
        self
    }

    pub fn build(self) -> CallOptions {
        CallOptions {
            headers: (!self.headers.is_empty()).then_some(self.headers),
            deadline: self.timeout.map(|timeout| Instant::now() + timeout),
            cancellation: self.cancellation,
            credentials: self.credentials,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_builder_equals_no_options_set() {
        let built = CallOptions::builder().build();
        let unset = CallOptions::default();
        assert_eq!(built.headers(), unset.headers());
        assert_eq!(built.deadline(), unset.deadline());
        assert!(built.cancellation().is_none() && unset.cancellation().is_none());
        assert_eq!(built.credentials(), unset.credentials());
    }

    #[test]
    fn text_and_bytes_are_carried_verbatim() {
        let options = CallOptions::builder()
            .header("trace-id", "abc123")
            .header("payload-bin", vec![0x01u8, 0x02])
            .build();
        let headers = options.headers().unwrap();
        assert_eq!(headers[0].1, MetadataValue::Text("abc123".into()));
        assert_eq!(headers[1].1, MetadataValue::Binary(vec![0x01, 0x02]));
    }

    #[test]
    fn other_types_use_their_textual_form() {
        let options = CallOptions::builder().header("attempt", 42i32).build();
        assert_eq!(
            options.headers().unwrap()[0].1,
            MetadataValue::Text("42".into())
        );
    }

    #[test]
    fn repeated_keys_replace() {
        let options = CallOptions::builder()
            .header("k", "first")
            .header("k", "second")
            .build();
        let headers = options.headers().unwrap();
        assert_eq!(headers.len(), 1);
        assert_eq!(headers[0].1, MetadataValue::Text("second".into()));
    }

    #[test]
    fn timeout_becomes_an_absolute_deadline() {
        let before = Instant::now();
        let options = CallOptions::builder()
            .timeout(Duration::from_secs(30))
            .build();
        let deadline = options.deadline().unwrap();
        assert!(deadline >= before + Duration::from_secs(30));
        assert!(deadline <= Instant::now() + Duration::from_secs(30));
    }

    #[test]
    fn deadline_exceeded_is_reported() {
        let options = CallOptions::builder()
            .timeout(Duration::from_millis(1))
            .build();
        let later = Instant::now() + Duration::from_secs(1);
        assert!(matches!(
            options.check_ready(later),
            Err(CallError::DeadlineExceeded)
        ));
    }

    #[test]
    fn cancellation_wins_over_deadline() {
        let token = CancellationToken::new();
        token.cancel();
        let options = CallOptions::builder()
            .timeout(Duration::from_millis(1))
            .cancellation(token)
            .build();
        let later = Instant::now() + Duration::from_secs(1);
        assert!(matches!(options.check_ready(later), Err(CallError::Cancelled)));
    }

    #[test]
    fn unset_bundle_is_always_ready() {
        let options = CallOptions::default();
        assert!(options.check_ready(Instant::now()).is_ok());
    }
}
