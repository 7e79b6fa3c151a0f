//! The auth facade: registration, login, session validation, logout, email
//! verification, and account maintenance, orchestrated over the store,
//! hasher, mailer, and clock.

use std::sync::Arc;

use uuid::Uuid;

use crate::cleanup::CleanupWorker;
use crate::clock::Clock;
use crate::config::AuthConfig;
use crate::email::Mailer;
use crate::error::{AuthError, AuthResult};
use crate::password;
use crate::sessions::SessionManager;
use crate::store::{AccountUpdate, AuthStore, NewCredential, NewProfile, SessionRecord};
use crate::validator::{normalize_email, RegisterRequest, UpdateAccountRequest};
use crate::verification::EmailVerificationService;

pub struct AuthService {
    store: Arc<dyn AuthStore>,
    mailer: Arc<dyn Mailer>,
    clock: Arc<dyn Clock>,
    config: AuthConfig,
    sessions: SessionManager,
    verification: EmailVerificationService,
}

impl AuthService {
    pub fn new(
        store: Arc<dyn AuthStore>,
        mailer: Arc<dyn Mailer>,
        clock: Arc<dyn Clock>,
        config: AuthConfig,
    ) -> Self {
        let sessions = SessionManager::new(store.clone(), clock.clone());
        let verification = EmailVerificationService::new(
            store.clone(),
            clock.clone(),
            config.verification_token_ttl,
        );
        Self {
            store,
            mailer,
            clock,
            sessions,
            verification,
            config,
        }
    }

    /// The cleanup worker for this service's store and clock, ready to be
    /// spawned at process startup.
    pub fn cleanup_worker(&self) -> CleanupWorker {
        CleanupWorker::new(
            self.store.clone(),
            self.clock.clone(),
            self.config.cleanup_interval,
        )
    }

    /// Create a credential and profile, then send a verification email.
    ///
    /// Uniqueness checks and both inserts run in one transaction. Once that
    /// commits the account exists; issuing the token and sending the mail are
    /// best-effort and only logged on failure.
    pub async fn register(&self, request: RegisterRequest) -> AuthResult<Uuid> {
        let valid = request.validate().map_err(AuthError::Validation)?;

        let password_hash = hash_on_blocking_pool(valid.password.clone()).await?;

        let credential_id = Uuid::new_v4();
        self.store
            .register_account(
                NewCredential {
                    id: credential_id,
                    email: valid.email.clone(),
                    password_hash,
                },
                NewProfile {
                    id: Uuid::new_v4(),
                    name: valid.name,
                    username: valid.username,
                    credential_id,
                },
            )
            .await?;

        tracing::info!(credential_id = %credential_id, "account registered");
        self.send_verification_email(&valid.email).await;

        Ok(credential_id)
    }

    /// Redeem an email verification token. `Ok(false)` covers malformed,
    /// unknown, and expired tokens alike.
    pub async fn verify_email(&self, token: &str) -> AuthResult<bool> {
        self.verification.consume(token).await
    }

    /// Authenticate with email and password and open a session.
    ///
    /// The failure order is deliberate: a wrong email and a wrong password
    /// are the same `Unauthorized`, and only a fully verified credential can
    /// hold a session.
    pub async fn login(&self, email: &str, password: &str) -> AuthResult<SessionRecord> {
        let email = normalize_email(email);

        let Some(credential) = self.store.credential_by_email(&email).await? else {
            // burn a verification anyway so response time does not reveal
            // whether the account exists
            let password = password.to_string();
            let _ = tokio::task::spawn_blocking(move || {
                password::verify_password(&password, password::IMPOSSIBLE_HASH)
            })
            .await;
            return Err(AuthError::Unauthorized);
        };

        let password = password.to_string();
        let digest = credential.password_hash.clone();
        let password_ok = tokio::task::spawn_blocking(move || {
            password::verify_password(&password, &digest)
        })
        .await
        .map_err(|err| AuthError::Internal(format!("password verification task failed: {err}")))?;

        if !password_ok {
            return Err(AuthError::Unauthorized);
        }

        if !credential.email_verified {
            return Err(AuthError::EmailNotVerified);
        }

        self.sessions.issue(credential.id).await
    }

    /// Authenticate a request by session id plus both secrets; returns the
    /// owning credential id.
    pub async fn validate_session(
        &self,
        session_id: Uuid,
        token: &str,
        csrf_token: &str,
    ) -> AuthResult<Uuid> {
        self.sessions.validate(session_id, token, csrf_token).await
    }

    /// End a session owned by the calling credential.
    pub async fn logout(&self, credential_id: Uuid, session_id: Uuid) -> AuthResult<()> {
        self.sessions.revoke(credential_id, session_id).await
    }

    /// Replace an account's profile and credential fields, re-checking
    /// uniqueness for whichever of email/username changed.
    pub async fn update_account(
        &self,
        credential_id: Uuid,
        request: UpdateAccountRequest,
    ) -> AuthResult<()> {
        let valid = request.validate().map_err(AuthError::Validation)?;

        let password_hash = hash_on_blocking_pool(valid.password.clone()).await?;

        self.store
            .update_account(
                credential_id,
                AccountUpdate {
                    name: valid.name,
                    username: valid.username,
                    email: valid.email,
                    password_hash,
                },
            )
            .await
    }

    /// Delete the credential; profile and sessions cascade with it.
    pub async fn delete_account(&self, credential_id: Uuid) -> AuthResult<()> {
        self.store.delete_account(credential_id).await?;
        tracing::info!(credential_id = %credential_id, "account deleted");
        Ok(())
    }

    async fn send_verification_email(&self, email: &str) {
        let token_id = match self.verification.issue(email).await {
            Ok(id) => id,
            Err(err) => {
                tracing::error!(error = %err, "failed to issue verification token");
                return;
            }
        };

        let link = format!(
            "{}/verify-email?token={}",
            self.config.app_base_url.trim_end_matches('/'),
            token_id
        );
        let body =
            format!(r#"Please <a href="{link}">click here</a> to verify your email address."#);

        if let Err(err) = self
            .mailer
            .send(email, "Verify your email address", &body)
            .await
        {
            tracing::error!(error = %err, "failed to send verification email");
        }
    }
}

/// Run the deliberately slow hash off the async workers.
async fn hash_on_blocking_pool(password: String) -> AuthResult<String> {
    tokio::task::spawn_blocking(move || password::hash_password(&password))
        .await
        .map_err(|err| AuthError::Internal(format!("password hashing task failed: {err}")))?
}
