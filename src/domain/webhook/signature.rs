//! Webhook signature verification.
//!
//! HMAC-SHA256 over `"{timestamp}.{payload}"` with constant-time
//! comparison and a freshness window against replayed deliveries. Pure:
//! the caller supplies the current time, so verification is a function of
//! its inputs with no I/O.

use hmac::{Hmac, Mac};
use secrecy::{ExposeSecret, SecretString};
use sha2::Sha256;
use subtle::ConstantTimeEq;

use crate::domain::foundation::Timestamp;

use super::errors::WebhookError;

/// Maximum allowed age for webhook events (5 minutes).
pub const MAX_EVENT_AGE_SECS: i64 = 300;

/// Maximum allowed clock skew for future events (1 minute).
pub const MAX_CLOCK_SKEW_SECS: i64 = 60;

/// Outcome of verifying a delivery.
///
/// `Stale` takes precedence over signature correctness: a correctly
/// signed but old payload is still `Stale`, so a captured legitimate
/// delivery cannot be replayed after the window closes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verification {
    Valid,
    Invalid,
    Stale,
}

/// Parsed components of the signature header.
///
/// Format: `t=<timestamp>,v1=<hex>[,v1=<hex>...]`. Multiple `v1` entries
/// appear while the provider rolls its signing secret; any one matching
/// is sufficient. Unknown keys are ignored for forward compatibility.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignatureHeader {
    /// Unix timestamp the provider generated the signature at.
    pub timestamp: i64,
    /// Candidate signatures (decoded from hex).
    pub signatures: Vec<Vec<u8>>,
}

impl SignatureHeader {
    /// Parses a signature header string.
    ///
    /// # Errors
    ///
    /// Returns `WebhookError::MalformedHeader` if the header format is
    /// invalid or carries no usable timestamp/signature.
    pub fn parse(header: &str) -> Result<Self, WebhookError> {
        let mut timestamp: Option<i64> = None;
        let mut signatures: Vec<Vec<u8>> = Vec::new();

        for part in header.split(',') {
            let (key, value) = part.split_once('=').ok_or_else(|| {
                WebhookError::MalformedHeader("invalid header format".to_string())
            })?;

            match key {
                "t" => {
                    timestamp = Some(value.parse().map_err(|_| {
                        WebhookError::MalformedHeader("invalid timestamp".to_string())
                    })?);
                }
                "v1" => {
                    let decoded = hex::decode(value).map_err(|_| {
                        WebhookError::MalformedHeader("invalid signature hex".to_string())
                    })?;
                    signatures.push(decoded);
                }
                _ => {
                    // Ignore unknown fields for forward compatibility
                }
            }
        }

        let timestamp = timestamp
            .ok_or_else(|| WebhookError::MalformedHeader("missing timestamp".to_string()))?;
        if signatures.is_empty() {
            return Err(WebhookError::MalformedHeader(
                "missing v1 signature".to_string(),
            ));
        }

        Ok(SignatureHeader {
            timestamp,
            signatures,
        })
    }
}

/// Verifier holding the currently-valid signing secrets.
///
/// More than one secret may be valid at a time while rotating; a
/// delivery signed with any of them verifies.
pub struct WebhookVerifier {
    secrets: Vec<SecretString>,
    max_age_secs: i64,
    max_skew_secs: i64,
}

impl WebhookVerifier {
    /// Creates a verifier with the given secrets and default tolerance.
    pub fn new(secrets: Vec<SecretString>) -> Self {
        Self {
            secrets,
            max_age_secs: MAX_EVENT_AGE_SECS,
            max_skew_secs: MAX_CLOCK_SKEW_SECS,
        }
    }

    /// Overrides the freshness window (seconds into the past).
    pub fn with_max_age_secs(mut self, secs: i64) -> Self {
        self.max_age_secs = secs;
        self
    }

    /// Verifies a delivery against the freshness window and all secrets.
    pub fn verify(
        &self,
        payload: &[u8],
        header: &SignatureHeader,
        now: Timestamp,
    ) -> Verification {
        // Freshness first: staleness wins over a correct signature.
        let age = now.as_unix_secs() - header.timestamp;
        if age > self.max_age_secs || age < -self.max_skew_secs {
            return Verification::Stale;
        }

        for secret in &self.secrets {
            let expected = compute_signature(secret.expose_secret(), header.timestamp, payload);
            for candidate in &header.signatures {
                if constant_time_compare(&expected, candidate) {
                    return Verification::Valid;
                }
            }
        }

        Verification::Invalid
    }
}

/// Computes the HMAC-SHA256 signature for a timestamp and payload.
fn compute_signature(secret: &str, timestamp: i64, payload: &[u8]) -> Vec<u8> {
    let mut mac =
        Hmac::<Sha256>::new_from_slice(secret.as_bytes()).expect("HMAC accepts any key");
    mac.update(timestamp.to_string().as_bytes());
    mac.update(b".");
    mac.update(payload);
    mac.finalize().into_bytes().to_vec()
}

/// Constant-time comparison of two byte slices.
fn constant_time_compare(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.ct_eq(b).into()
}

/// Computes a hex-encoded signature for test fixtures.
#[cfg(test)]
pub fn compute_test_signature(secret: &str, timestamp: i64, payload: &[u8]) -> String {
    hex::encode(compute_signature(secret, timestamp, payload))
}
