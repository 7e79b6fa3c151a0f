//! Email verification tokens.
//!
//! Tokens are time-bounded: a token proves control of an email address only
//! until its expiry instant. Consumption marks the owning credential
//! verified but does not delete the row; deletion is the cleanup worker's
//! job, and expiry is enforced at access time regardless of whether the
//! sweep has run yet.

use std::sync::Arc;
use std::time::Duration;

use uuid::Uuid;

use crate::clock::Clock;
use crate::error::AuthResult;
use crate::store::{AuthStore, NewVerificationToken};

#[derive(Clone)]
pub struct EmailVerificationService {
    store: Arc<dyn AuthStore>,
    clock: Arc<dyn Clock>,
    ttl: Duration,
}

impl EmailVerificationService {
    pub fn new(store: Arc<dyn AuthStore>, clock: Arc<dyn Clock>, ttl: Duration) -> Self {
        Self { store, clock, ttl }
    }

    /// Create a verification token for an email address and return its id.
    pub async fn issue(&self, email: &str) -> AuthResult<Uuid> {
        let id = Uuid::new_v4();
        self.store
            .insert_verification_token(NewVerificationToken {
                id,
                email: email.to_string(),
                expires_at: self.clock.now() + self.ttl,
            })
            .await?;

        tracing::debug!(token_id = %id, "verification token issued");
        Ok(id)
    }

    /// Redeem a verification token.
    ///
    /// Fails soft: a malformed id, an unknown id, or an expired token all
    /// yield `Ok(false)` rather than an error. Only a token that exists with
    /// `now <= expires_at` marks its credential verified and yields
    /// `Ok(true)`. There is no consumed flag: redeeming a still-unexpired
    /// token again re-marks the credential (a no-op) and reports true.
    pub async fn consume(&self, token_id: &str) -> AuthResult<bool> {
        let Ok(id) = Uuid::parse_str(token_id.trim()) else {
            return Ok(false);
        };

        let Some(token) = self.store.verification_token_by_id(id).await? else {
            return Ok(false);
        };

        if self.clock.now() > token.expires_at {
            return Ok(false);
        }

        self.store.mark_email_verified(&token.email).await?;
        Ok(true)
    }
}
