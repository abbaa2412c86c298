//! Verification gate: one-time contact codes and payment authenticity.
//!
//! # Contact codes
//!
//! A six-digit code is issued per phone number (keyed by its digits) and
//! expires after the configured TTL. A successful check consumes the code and
//! records a completed verification, which deferred-payment checkouts require
//! to be fresh. Both tables live in `moka` caches. Outstanding codes are only
//! bounded by capacity, never by time; expiry is checked explicitly so an
//! expired code reports `Expired` rather than `NotFound` however late it is
//! presented.
//!
//! # Payment authenticity
//!
//! Prepaid checkouts carry the payment gateway's order id, payment id and an
//! HMAC-SHA256 signature over `"{order_id}|{payment_id}"`, hex encoded. The
//! signature is recomputed with the server-held secret and compared in
//! constant time.

use std::time::Duration;

use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use marigold_core::Phone;
use moka::future::Cache;
use secrecy::{ExposeSecret, SecretString};
use sha2::Sha256;
use thiserror::Error;
use tracing::{debug, instrument, warn};

use super::notifications::{NotificationDispatcher, NotificationTemplate, Recipient};

type HmacSha256 = Hmac<Sha256>;

/// Upper bound on outstanding codes and completed verifications.
const MAX_ENTRIES: u64 = 100_000;

/// Why a code check failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum VerificationError {
    #[error("no verification code was requested for this number")]
    NotFound,

    #[error("the verification code has expired")]
    Expired,

    #[error("the verification code does not match")]
    Mismatch,
}

impl VerificationError {
    /// Short machine-readable reason.
    #[must_use]
    pub const fn reason(self) -> &'static str {
        match self {
            Self::NotFound => "not_found",
            Self::Expired => "expired",
            Self::Mismatch => "mismatch",
        }
    }
}

/// Signed payment confirmation from the payment gateway.
#[derive(Debug, Clone, PartialEq, Eq, serde::Deserialize, serde::Serialize)]
pub struct PaymentProof {
    pub gateway_order_id: String,
    pub gateway_payment_id: String,
    pub signature: String,
}

#[derive(Debug, Clone)]
struct CodeRecord {
    code: String,
    expires_at: DateTime<Utc>,
}

/// Gate timing.
#[derive(Debug, Clone, Copy)]
pub struct VerificationSettings {
    /// How long an issued code stays valid.
    pub code_ttl: Duration,
    /// How long a completed verification satisfies a deferred-payment checkout.
    pub freshness: Duration,
}

impl Default for VerificationSettings {
    fn default() -> Self {
        Self {
            code_ttl: Duration::from_secs(5 * 60),
            freshness: Duration::from_secs(60 * 60),
        }
    }
}

/// Generate a 6-digit verification code.
#[must_use]
pub fn generate_verification_code() -> String {
    use rand::Rng;
    let code: u32 = rand::rng().random_range(0..1_000_000);
    format!("{code:06}")
}

/// Constant-time string comparison to prevent timing attacks.
pub(crate) fn constant_time_eq(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }

    let mut result: u8 = 0;
    for (x, y) in a.bytes().zip(b.bytes()) {
        result |= x ^ y;
    }

    result == 0
}

fn chrono_duration(d: Duration) -> chrono::Duration {
    chrono::Duration::from_std(d).unwrap_or(chrono::Duration::MAX)
}

/// Issues and checks contact codes; verifies payment signatures.
pub struct VerificationGate {
    codes: Cache<String, CodeRecord>,
    completed: Cache<String, DateTime<Utc>>,
    payment_secret: SecretString,
    notifications: NotificationDispatcher,
    settings: VerificationSettings,
}

impl VerificationGate {
    #[must_use]
    pub fn new(
        payment_secret: SecretString,
        notifications: NotificationDispatcher,
        settings: VerificationSettings,
    ) -> Self {
        // No time-based eviction: a code stays until it is checked, replaced
        // or withdrawn, so a late check still reports `Expired`.
        let codes = Cache::builder().max_capacity(MAX_ENTRIES).build();
        let completed = Cache::builder()
            .max_capacity(MAX_ENTRIES)
            .time_to_live(settings.freshness)
            .build();

        Self {
            codes,
            completed,
            payment_secret,
            notifications,
            settings,
        }
    }

    /// Issue a code for `phone` and send it. Returns whether it was delivered.
    ///
    /// A new request replaces any outstanding code for the same number. If
    /// delivery fails the code is withdrawn.
    #[instrument(skip(self), fields(phone = %phone.key()))]
    pub async fn request_code(&self, phone: &Phone) -> bool {
        let code = generate_verification_code();
        self.issue_code_at(phone, code.clone(), Utc::now()).await;

        let sent = self
            .notifications
            .send_now(
                NotificationTemplate::VerificationCode,
                &Recipient::Phone(phone.clone()),
                serde_json::json!({
                    "code": code,
                    "expires_in_minutes": self.settings.code_ttl.as_secs() / 60,
                }),
            )
            .await;

        match sent {
            Ok(()) => true,
            Err(e) => {
                warn!(error = %e, "Verification code delivery failed");
                self.codes.invalidate(phone.key()).await;
                false
            }
        }
    }

    /// Record `code` as the outstanding code for `phone`, issued at `now`.
    pub async fn issue_code_at(&self, phone: &Phone, code: String, now: DateTime<Utc>) {
        let record = CodeRecord {
            code,
            expires_at: now + chrono_duration(self.settings.code_ttl),
        };
        self.codes.insert(phone.key().to_string(), record).await;
    }

    /// Check a code for `phone`.
    ///
    /// # Errors
    ///
    /// `NotFound` if no code is outstanding (including after a successful
    /// check), `Expired` if it is past expiry (the code is purged),
    /// `Mismatch` if the code differs (the code stays outstanding).
    pub async fn check_code(&self, phone: &Phone, code: &str) -> Result<(), VerificationError> {
        self.check_code_at(phone, code, Utc::now()).await
    }

    #[instrument(skip(self, code), fields(phone = %phone.key()))]
    pub async fn check_code_at(
        &self,
        phone: &Phone,
        code: &str,
        now: DateTime<Utc>,
    ) -> Result<(), VerificationError> {
        let key = phone.key();
        let record = self
            .codes
            .get(key)
            .await
            .ok_or(VerificationError::NotFound)?;

        if now >= record.expires_at {
            self.codes.invalidate(key).await;
            return Err(VerificationError::Expired);
        }

        if !constant_time_eq(&record.code, code.trim()) {
            return Err(VerificationError::Mismatch);
        }

        // Lookup-then-delete: whoever removes the record wins.
        if self.codes.remove(key).await.is_none() {
            return Err(VerificationError::NotFound);
        }

        self.completed.insert(key.to_string(), now).await;
        debug!("Contact verified");
        Ok(())
    }

    /// Whether `phone` completed a verification within the freshness window.
    pub async fn is_recently_verified(&self, phone: &Phone) -> bool {
        self.is_recently_verified_at(phone, Utc::now()).await
    }

    pub async fn is_recently_verified_at(&self, phone: &Phone, now: DateTime<Utc>) -> bool {
        let window = chrono_duration(self.settings.freshness);
        self.completed
            .get(phone.key())
            .await
            .is_some_and(|verified_at| verified_at <= now && now - verified_at <= window)
    }

    /// Expected signature for a gateway order/payment pair.
    fn expected_signature(&self, gateway_order_id: &str, gateway_payment_id: &str) -> Option<String> {
        let mut mac =
            HmacSha256::new_from_slice(self.payment_secret.expose_secret().as_bytes()).ok()?;
        mac.update(gateway_order_id.as_bytes());
        mac.update(b"|");
        mac.update(gateway_payment_id.as_bytes());
        Some(hex::encode(mac.finalize().into_bytes()))
    }

    /// Whether `signature` authenticates the gateway order/payment pair.
    #[must_use]
    pub fn check_payment_authenticity(
        &self,
        gateway_order_id: &str,
        gateway_payment_id: &str,
        signature: &str,
    ) -> bool {
        if gateway_order_id.is_empty() || gateway_payment_id.is_empty() {
            return false;
        }
        self.expected_signature(gateway_order_id, gateway_payment_id)
            .is_some_and(|expected| constant_time_eq(&expected, signature))
    }

    /// [`check_payment_authenticity`](Self::check_payment_authenticity) for a proof.
    #[must_use]
    pub fn verify_payment(&self, proof: &PaymentProof) -> bool {
        self.check_payment_authenticity(
            &proof.gateway_order_id,
            &proof.gateway_payment_id,
            &proof.signature,
        )
    }
}
