//! Persistence boundary for credentials, profiles, sessions, and
//! email verification tokens.
//!
//! `AuthStore` is the query surface the core depends on. `PgAuthStore` is the
//! production adapter; `MemoryAuthStore` backs tests and local development.
//! Conflict detection is part of the contract: `register_account` and
//! `update_account` must report `EmailTaken`/`UsernameTaken` for duplicate
//! keys, whether caught by a pre-check or by the storage-level unique
//! constraint.

mod memory;
mod postgres;

pub use memory::MemoryAuthStore;
pub use postgres::PgAuthStore;

use time::OffsetDateTime;
use uuid::Uuid;

use crate::error::AuthResult;

/// Authentication identity: email, password digest, verification state.
#[derive(Debug, Clone, sqlx::FromRow, serde::Serialize)]
pub struct CredentialRecord {
    pub id: Uuid,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub email_verified: bool,
}

/// User-facing identity, owned by exactly one credential.
#[derive(Debug, Clone, sqlx::FromRow, serde::Serialize)]
pub struct ProfileRecord {
    pub id: Uuid,
    pub name: String,
    pub username: String,
    pub credential_id: Uuid,
}

#[derive(Debug, Clone, sqlx::FromRow, serde::Serialize)]
pub struct SessionRecord {
    pub id: Uuid,
    pub credential_id: Uuid,
    pub token: String,
    pub csrf_token: String,
    pub created_at: OffsetDateTime,
    pub last_active_at: OffsetDateTime,
}

#[derive(Debug, Clone, sqlx::FromRow, serde::Serialize)]
pub struct VerificationTokenRecord {
    pub id: Uuid,
    pub email: String,
    pub expires_at: OffsetDateTime,
}

#[derive(Debug, Clone)]
pub struct NewCredential {
    pub id: Uuid,
    pub email: String,
    pub password_hash: String,
}

#[derive(Debug, Clone)]
pub struct NewProfile {
    pub id: Uuid,
    pub name: String,
    pub username: String,
    pub credential_id: Uuid,
}

#[derive(Debug, Clone)]
pub struct NewSession {
    pub id: Uuid,
    pub credential_id: Uuid,
    pub token: String,
    pub csrf_token: String,
    pub issued_at: OffsetDateTime,
}

#[derive(Debug, Clone)]
pub struct NewVerificationToken {
    pub id: Uuid,
    pub email: String,
    pub expires_at: OffsetDateTime,
}

/// Replacement values for an account update. The password is always
/// re-hashed, so the hash is mandatory.
#[derive(Debug, Clone)]
pub struct AccountUpdate {
    pub name: String,
    pub username: String,
    pub email: String,
    pub password_hash: String,
}

#[async_trait::async_trait]
pub trait AuthStore: Send + Sync {
    /// Advisory existence check; the unique constraint remains the
    /// authoritative serialization point.
    async fn email_exists(&self, email: &str) -> AuthResult<bool>;
    async fn username_exists(&self, username: &str) -> AuthResult<bool>;

    /// Insert a credential and its profile atomically.
    ///
    /// Runs check-email, check-username, and both inserts inside one
    /// transaction; any non-commit exit rolls back. Duplicate keys surface as
    /// `EmailTaken`/`UsernameTaken`.
    async fn register_account(
        &self,
        credential: NewCredential,
        profile: NewProfile,
    ) -> AuthResult<()>;

    async fn credential_by_email(&self, email: &str) -> AuthResult<Option<CredentialRecord>>;
    async fn credential_by_id(&self, id: Uuid) -> AuthResult<Option<CredentialRecord>>;
    async fn mark_email_verified(&self, email: &str) -> AuthResult<()>;

    /// Update credential and profile atomically, re-checking uniqueness for
    /// whichever of email/username actually changed. `NotFound` if the
    /// account no longer exists.
    async fn update_account(&self, credential_id: Uuid, update: AccountUpdate) -> AuthResult<()>;

    /// Delete the credential; profile and sessions cascade. `NotFound` if
    /// nothing was deleted.
    async fn delete_account(&self, credential_id: Uuid) -> AuthResult<()>;

    async fn insert_session(&self, session: NewSession) -> AuthResult<SessionRecord>;
    async fn session_by_id(&self, id: Uuid) -> AuthResult<Option<SessionRecord>>;
    async fn touch_session(&self, id: Uuid, at: OffsetDateTime) -> AuthResult<()>;
    /// Delete a session only if it belongs to the given credential. Returns
    /// the number of rows removed.
    async fn delete_session_for_credential(
        &self,
        credential_id: Uuid,
        session_id: Uuid,
    ) -> AuthResult<u64>;

    async fn insert_verification_token(&self, token: NewVerificationToken) -> AuthResult<()>;
    async fn verification_token_by_id(
        &self,
        id: Uuid,
    ) -> AuthResult<Option<VerificationTokenRecord>>;
    /// Purge tokens whose expiry is strictly before `now`. Returns the number
    /// of rows removed.
    async fn delete_expired_verification_tokens(&self, now: OffsetDateTime) -> AuthResult<u64>;
}
