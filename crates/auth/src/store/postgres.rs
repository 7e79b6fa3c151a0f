//! PostgreSQL adapter for the auth store.
//!
//! Registration and account updates run their uniqueness checks and writes
//! inside one transaction; sqlx transactions roll back on drop, so every
//! early-return path is covered. The pre-checks give fast, friendly conflict
//! errors, but the unique indexes are what actually serialize concurrent
//! writers, so constraint violations are mapped to the same errors.

use sqlx::PgPool;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::error::{AuthError, AuthResult};

use super::{
    AccountUpdate, AuthStore, CredentialRecord, NewCredential, NewProfile, NewSession,
    NewVerificationToken, SessionRecord, VerificationTokenRecord,
};

const EMAIL_CONSTRAINT: &str = "credentials_email_key";
const USERNAME_CONSTRAINT: &str = "profiles_username_key";

#[derive(Clone)]
pub struct PgAuthStore {
    pool: PgPool,
}

impl PgAuthStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// Map a unique-constraint violation to the conflict error the pre-check
/// would have produced; pass everything else through as a database error.
fn map_constraint(err: sqlx::Error) -> AuthError {
    if let sqlx::Error::Database(db_err) = &err {
        if db_err.is_unique_violation() {
            match db_err.constraint() {
                Some(EMAIL_CONSTRAINT) => return AuthError::EmailTaken,
                Some(USERNAME_CONSTRAINT) => return AuthError::UsernameTaken,
                _ => {}
            }
        }
    }
    AuthError::Database(err)
}

#[async_trait::async_trait]
impl AuthStore for PgAuthStore {
    async fn email_exists(&self, email: &str) -> AuthResult<bool> {
        let row: Option<(bool,)> = sqlx::query_as("SELECT TRUE FROM credentials WHERE email = $1")
            .bind(email)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.is_some())
    }

    async fn username_exists(&self, username: &str) -> AuthResult<bool> {
        let row: Option<(bool,)> = sqlx::query_as("SELECT TRUE FROM profiles WHERE username = $1")
            .bind(username)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.is_some())
    }

    async fn register_account(
        &self,
        credential: NewCredential,
        profile: NewProfile,
    ) -> AuthResult<()> {
        let mut tx = self.pool.begin().await?;

        let email_taken: Option<(bool,)> =
            sqlx::query_as("SELECT TRUE FROM credentials WHERE email = $1")
                .bind(&credential.email)
                .fetch_optional(&mut *tx)
                .await?;
        if email_taken.is_some() {
            return Err(AuthError::EmailTaken);
        }

        let username_taken: Option<(bool,)> =
            sqlx::query_as("SELECT TRUE FROM profiles WHERE username = $1")
                .bind(&profile.username)
                .fetch_optional(&mut *tx)
                .await?;
        if username_taken.is_some() {
            return Err(AuthError::UsernameTaken);
        }

        sqlx::query(
            r#"
            INSERT INTO credentials (id, email, password_hash, email_verified)
            VALUES ($1, $2, $3, FALSE)
            "#,
        )
        .bind(credential.id)
        .bind(&credential.email)
        .bind(&credential.password_hash)
        .execute(&mut *tx)
        .await
        .map_err(map_constraint)?;

        sqlx::query(
            r#"
            INSERT INTO profiles (id, name, username, credential_id)
            VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(profile.id)
        .bind(&profile.name)
        .bind(&profile.username)
        .bind(profile.credential_id)
        .execute(&mut *tx)
        .await
        .map_err(map_constraint)?;

        tx.commit().await?;
        Ok(())
    }

    async fn credential_by_email(&self, email: &str) -> AuthResult<Option<CredentialRecord>> {
        let credential = sqlx::query_as::<_, CredentialRecord>(
            r#"
            SELECT id, email, password_hash, email_verified
            FROM credentials
            WHERE email = $1
            "#,
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;
        Ok(credential)
    }

    async fn credential_by_id(&self, id: Uuid) -> AuthResult<Option<CredentialRecord>> {
        let credential = sqlx::query_as::<_, CredentialRecord>(
            r#"
            SELECT id, email, password_hash, email_verified
            FROM credentials
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(credential)
    }

    async fn mark_email_verified(&self, email: &str) -> AuthResult<()> {
        sqlx::query("UPDATE credentials SET email_verified = TRUE WHERE email = $1")
            .bind(email)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn update_account(&self, credential_id: Uuid, update: AccountUpdate) -> AuthResult<()> {
        let mut tx = self.pool.begin().await?;

        let current = sqlx::query_as::<_, CredentialRecord>(
            r#"
            SELECT id, email, password_hash, email_verified
            FROM credentials
            WHERE id = $1
            "#,
        )
        .bind(credential_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(AuthError::NotFound)?;

        let current_username: Option<(String,)> =
            sqlx::query_as("SELECT username FROM profiles WHERE credential_id = $1")
                .bind(credential_id)
                .fetch_optional(&mut *tx)
                .await?;
        let (current_username,) = current_username.ok_or(AuthError::NotFound)?;

        if update.email != current.email {
            let taken: Option<(bool,)> =
                sqlx::query_as("SELECT TRUE FROM credentials WHERE email = $1")
                    .bind(&update.email)
                    .fetch_optional(&mut *tx)
                    .await?;
            if taken.is_some() {
                return Err(AuthError::EmailTaken);
            }
        }

        if update.username != current_username {
            let taken: Option<(bool,)> =
                sqlx::query_as("SELECT TRUE FROM profiles WHERE username = $1")
                    .bind(&update.username)
                    .fetch_optional(&mut *tx)
                    .await?;
            if taken.is_some() {
                return Err(AuthError::UsernameTaken);
            }
        }

        sqlx::query(
            r#"
            UPDATE credentials
            SET email = $2,
                password_hash = $3
            WHERE id = $1
            "#,
        )
        .bind(credential_id)
        .bind(&update.email)
        .bind(&update.password_hash)
        .execute(&mut *tx)
        .await
        .map_err(map_constraint)?;

        sqlx::query(
            r#"
            UPDATE profiles
            SET name = $2,
                username = $3
            WHERE credential_id = $1
            "#,
        )
        .bind(credential_id)
        .bind(&update.name)
        .bind(&update.username)
        .execute(&mut *tx)
        .await
        .map_err(map_constraint)?;

        tx.commit().await?;
        Ok(())
    }

    async fn delete_account(&self, credential_id: Uuid) -> AuthResult<()> {
        let rows_affected = sqlx::query("DELETE FROM credentials WHERE id = $1")
            .bind(credential_id)
            .execute(&self.pool)
            .await?
            .rows_affected();

        if rows_affected == 0 {
            return Err(AuthError::NotFound);
        }
        Ok(())
    }

    async fn insert_session(&self, session: NewSession) -> AuthResult<SessionRecord> {
        let record = sqlx::query_as::<_, SessionRecord>(
            r#"
            INSERT INTO sessions (id, credential_id, token, csrf_token, created_at, last_active_at)
            VALUES ($1, $2, $3, $4, $5, $5)
            RETURNING id, credential_id, token, csrf_token, created_at, last_active_at
            "#,
        )
        .bind(session.id)
        .bind(session.credential_id)
        .bind(&session.token)
        .bind(&session.csrf_token)
        .bind(session.issued_at)
        .fetch_one(&self.pool)
        .await?;
        Ok(record)
    }

    async fn session_by_id(&self, id: Uuid) -> AuthResult<Option<SessionRecord>> {
        let session = sqlx::query_as::<_, SessionRecord>(
            r#"
            SELECT id, credential_id, token, csrf_token, created_at, last_active_at
            FROM sessions
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(session)
    }

    async fn touch_session(&self, id: Uuid, at: OffsetDateTime) -> AuthResult<()> {
        sqlx::query("UPDATE sessions SET last_active_at = $2 WHERE id = $1")
            .bind(id)
            .bind(at)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn delete_session_for_credential(
        &self,
        credential_id: Uuid,
        session_id: Uuid,
    ) -> AuthResult<u64> {
        let rows_affected =
            sqlx::query("DELETE FROM sessions WHERE id = $1 AND credential_id = $2")
                .bind(session_id)
                .bind(credential_id)
                .execute(&self.pool)
                .await?
                .rows_affected();
        Ok(rows_affected)
    }

    async fn insert_verification_token(&self, token: NewVerificationToken) -> AuthResult<()> {
        sqlx::query(
            r#"
            INSERT INTO email_verification_tokens (id, email, expires_at)
            VALUES ($1, $2, $3)
            "#,
        )
        .bind(token.id)
        .bind(&token.email)
        .bind(token.expires_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn verification_token_by_id(
        &self,
        id: Uuid,
    ) -> AuthResult<Option<VerificationTokenRecord>> {
        let token = sqlx::query_as::<_, VerificationTokenRecord>(
            r#"
            SELECT id, email, expires_at
            FROM email_verification_tokens
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(token)
    }

    async fn delete_expired_verification_tokens(&self, now: OffsetDateTime) -> AuthResult<u64> {
        let rows_affected =
            sqlx::query("DELETE FROM email_verification_tokens WHERE expires_at < $1")
                .bind(now)
                .execute(&self.pool)
                .await?
                .rows_affected();
        Ok(rows_affected)
    }
}
