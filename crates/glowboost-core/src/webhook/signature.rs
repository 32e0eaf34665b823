//! HMAC-SHA256 signature verification for Cal.com webhooks.
//!
//! Cal.com signs every delivery with the webhook secret and sends the
//! hex-encoded digest in the `x-cal-signature-256` header.

use crate::ValidationError;
use hmac::{Hmac, Mac};
use serde::Deserialize;
use sha2::Sha256;
use subtle::ConstantTimeEq;
use tracing::warn;
use zeroize::{Zeroize, ZeroizeOnDrop};

type HmacSha256 = Hmac<Sha256>;

/// Header carrying the hex HMAC-SHA256 of the raw body
pub const SIGNATURE_HEADER: &str = "x-cal-signature-256";

// ============================================================================
// WebhookSecret
// ============================================================================

/// Shared secret configured on both sides of the webhook.
///
/// The value is wiped from memory on drop and never printed by `Debug`.
///
/// Deserialization goes through [`WebhookSecret::new`], so a blank value in a
/// config file or environment variable is rejected instead of producing a
/// key anyone can compute.
#[derive(Clone, Deserialize, Zeroize, ZeroizeOnDrop)]
#[serde(try_from = "String")]
pub struct WebhookSecret(String);

impl WebhookSecret {
    /// Create a secret, rejecting empty and whitespace-only values
    pub fn new(value: impl Into<String>) -> Result<Self, ValidationError> {
        let value = value.into();
        if value.trim().is_empty() {
            return Err(ValidationError::Required {
                field: "webhook_secret".to_string(),
            });
        }
        Ok(Self(value))
    }

    /// Get secret as string (only for immediate use)
    pub fn expose_secret(&self) -> &str {
        &self.0
    }

    /// Check if secret is empty
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl TryFrom<String> for WebhookSecret {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl std::fmt::Debug for WebhookSecret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WebhookSecret")
            .field("length", &self.0.len())
            .field("value", &"[REDACTED]")
            .finish()
    }
}

// ============================================================================
// Pure verification
// ============================================================================

/// Compute the lowercase hex HMAC-SHA256 of `payload` keyed by `secret`.
pub fn compute_signature(payload: &[u8], secret: &WebhookSecret) -> String {
    // HMAC accepts keys of any length, so this cannot fail.
    let mut mac = match HmacSha256::new_from_slice(secret.expose_secret().as_bytes()) {
        Ok(mac) => mac,
        Err(_) => return String::new(),
    };
    mac.update(payload);
    hex::encode(mac.finalize().into_bytes())
}

/// Check `signature` against the HMAC of `payload`.
///
/// An optional `sha256=` prefix and surrounding whitespace are tolerated and
/// hex digits are compared case-insensitively. The comparison itself runs in
/// constant time; signatures of a different length never match.
pub fn verify_signature(payload: &[u8], signature: &str, secret: &WebhookSecret) -> bool {
    let expected = compute_signature(payload, secret);
    if expected.is_empty() {
        return false;
    }

    let provided = signature.trim();
    let provided = provided.strip_prefix("sha256=").unwrap_or(provided);
    let provided = provided.to_ascii_lowercase();

    expected.as_bytes().ct_eq(provided.as_bytes()).into()
}

// ============================================================================
// SignatureVerifier
// ============================================================================

/// Result of checking one delivery
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignatureCheck {
    /// Signature present and matching
    Verified,
    /// Verification disabled by explicit operator opt-in
    Skipped,
    /// Secret configured but the delivery carried no signature
    Missing,
    /// Signature present but does not match
    Mismatch,
}

impl SignatureCheck {
    /// Whether the delivery may proceed
    pub fn is_accepted(&self) -> bool {
        matches!(self, Self::Verified | Self::Skipped)
    }

    /// Short machine-readable reason for logs and metrics
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Verified => "verified",
            Self::Skipped => "skipped",
            Self::Missing => "missing_signature",
            Self::Mismatch => "signature_mismatch",
        }
    }
}

#[derive(Clone)]
enum Policy {
    Enforced(WebhookSecret),
    Disabled,
}

/// Applies the configured signature policy to deliveries.
///
/// Construct with [`SignatureVerifier::enforced`] in every real deployment.
/// [`SignatureVerifier::disabled`] exists for local development against a
/// provider that has no secret configured and must be opted into
/// explicitly through configuration.
#[derive(Clone)]
pub struct SignatureVerifier {
    policy: Policy,
}

impl SignatureVerifier {
    /// Require a valid signature on every delivery
    pub fn enforced(secret: WebhookSecret) -> Self {
        Self {
            policy: Policy::Enforced(secret),
        }
    }

    /// Accept deliveries without checking signatures.
    ///
    /// Emits a `WARN` so the bypass is visible in startup logs.
    pub fn disabled() -> Self {
        warn!(
            "Webhook signature verification is DISABLED; \
             unsigned deliveries will be accepted. Never use this outside development."
        );
        Self {
            policy: Policy::Disabled,
        }
    }

    /// Whether signatures are checked
    pub fn is_enforced(&self) -> bool {
        matches!(self.policy, Policy::Enforced(_))
    }

    /// Check one delivery's raw body against its signature header
    pub fn check(&self, payload: &[u8], signature: Option<&str>) -> SignatureCheck {
        match (&self.policy, signature) {
            (Policy::Disabled, _) => SignatureCheck::Skipped,
            (Policy::Enforced(_), None) => SignatureCheck::Missing,
            (Policy::Enforced(secret), Some(signature)) => {
                if verify_signature(payload, signature, secret) {
                    SignatureCheck::Verified
                } else {
                    SignatureCheck::Mismatch
                }
            }
        }
    }
}

impl std::fmt::Debug for SignatureVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SignatureVerifier")
            .field("enforced", &self.is_enforced())
            .finish()
    }
}

#[cfg(test)]
#[path = "signature_tests.rs"]
mod tests;
