//! Session issuance, validation, and revocation.
//!
//! A session is reachable only by presenting its id together with both of
//! its secrets: the bearer token and the CSRF token, which travel on separate
//! channels. Sessions have no TTL; they end at logout or account deletion.

use std::sync::Arc;

use subtle::ConstantTimeEq;
use uuid::Uuid;

use crate::clock::Clock;
use crate::error::{AuthError, AuthResult};
use crate::store::{AuthStore, NewSession, SessionRecord};
use crate::tokens;

#[derive(Clone)]
pub struct SessionManager {
    store: Arc<dyn AuthStore>,
    clock: Arc<dyn Clock>,
}

impl SessionManager {
    pub fn new(store: Arc<dyn AuthStore>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    /// Create a session for a credential that has already been authenticated.
    pub async fn issue(&self, credential_id: Uuid) -> AuthResult<SessionRecord> {
        let id = Uuid::new_v4();
        let session = self
            .store
            .insert_session(NewSession {
                id,
                credential_id,
                token: tokens::session_secret(id),
                csrf_token: tokens::session_secret(id),
                issued_at: self.clock.now(),
            })
            .await?;

        tracing::debug!(session_id = %id, "session issued");
        Ok(session)
    }

    /// Authenticate a request: both secrets must match the stored session
    /// exactly. Returns the owning credential id.
    ///
    /// On success the session's last-active timestamp is refreshed as a
    /// best-effort write; a failure there is logged but never turns an
    /// authenticated request into an unauthorized one.
    pub async fn validate(
        &self,
        session_id: Uuid,
        token: &str,
        csrf_token: &str,
    ) -> AuthResult<Uuid> {
        let Some(session) = self.store.session_by_id(session_id).await? else {
            return Err(AuthError::Unauthorized);
        };

        if !secrets_match(&session, token, csrf_token) {
            return Err(AuthError::Unauthorized);
        }

        if let Err(err) = self.store.touch_session(session_id, self.clock.now()).await {
            tracing::warn!(session_id = %session_id, error = %err, "failed to refresh session last-active");
        }

        Ok(session.credential_id)
    }

    /// Delete a session owned by the given credential. Revoking a session
    /// that does not exist (or is not yours) is `Unauthorized`; revoking
    /// twice therefore degrades to the same answer instead of crashing.
    pub async fn revoke(&self, credential_id: Uuid, session_id: Uuid) -> AuthResult<()> {
        let rows_affected = self
            .store
            .delete_session_for_credential(credential_id, session_id)
            .await?;

        if rows_affected == 0 {
            return Err(AuthError::Unauthorized);
        }

        tracing::debug!(session_id = %session_id, "session revoked");
        Ok(())
    }
}

/// Compare both secrets in constant time, combining the results before
/// branching so a match on one field reveals nothing about the other.
fn secrets_match(session: &SessionRecord, token: &str, csrf_token: &str) -> bool {
    let token_ok = session.token.as_bytes().ct_eq(token.as_bytes());
    let csrf_ok = session.csrf_token.as_bytes().ct_eq(csrf_token.as_bytes());
    bool::from(token_ok & csrf_ok)
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use time::macros::datetime;

    use crate::clock::test_clock::FrozenClock;
    use crate::store::MemoryAuthStore;

    use super::*;

    fn manager() -> (SessionManager, Arc<MemoryAuthStore>, Arc<FrozenClock>) {
        let store = Arc::new(MemoryAuthStore::new());
        let clock = Arc::new(FrozenClock::new(datetime!(2026-03-01 09:00 UTC)));
        let manager = SessionManager::new(store.clone(), clock.clone());
        (manager, store, clock)
    }

    #[tokio::test]
    async fn issue_then_validate_returns_owner() {
        let (manager, _, _) = manager();
        let credential_id = Uuid::new_v4();

        let session = manager.issue(credential_id).await.unwrap();
        assert_ne!(session.token, session.csrf_token);
        assert!(session.token.starts_with(&session.id.to_string()));

        let owner = manager
            .validate(session.id, &session.token, &session.csrf_token)
            .await
            .unwrap();
        assert_eq!(owner, credential_id);
    }

    #[tokio::test]
    async fn unknown_session_is_unauthorized() {
        let (manager, _, _) = manager();
        let err = manager
            .validate(Uuid::new_v4(), "token", "csrf")
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::Unauthorized));
    }

    #[tokio::test]
    async fn single_secret_is_never_enough() {
        let (manager, _, _) = manager();
        let session = manager.issue(Uuid::new_v4()).await.unwrap();

        // wrong bearer token
        let err = manager
            .validate(session.id, "wrong", &session.csrf_token)
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::Unauthorized));

        // wrong CSRF token
        let err = manager
            .validate(session.id, &session.token, "wrong")
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::Unauthorized));

        // both empty
        let err = manager.validate(session.id, "", "").await.unwrap_err();
        assert!(matches!(err, AuthError::Unauthorized));

        // swapped pair
        let err = manager
            .validate(session.id, &session.csrf_token, &session.token)
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::Unauthorized));
    }

    #[tokio::test]
    async fn validate_refreshes_last_active() {
        let (manager, store, clock) = manager();
        let session = manager.issue(Uuid::new_v4()).await.unwrap();
        let issued_at = session.last_active_at;

        clock.advance(Duration::from_secs(600));
        manager
            .validate(session.id, &session.token, &session.csrf_token)
            .await
            .unwrap();

        let stored = store.raw_session(session.id).await.unwrap();
        assert_eq!(stored.last_active_at, issued_at + Duration::from_secs(600));
        assert_eq!(stored.created_at, issued_at);
    }

    #[tokio::test]
    async fn revoke_is_scoped_and_idempotent_to_unauthorized() {
        let (manager, _, _) = manager();
        let credential_id = Uuid::new_v4();
        let session = manager.issue(credential_id).await.unwrap();

        // someone else's credential cannot revoke it
        let err = manager.revoke(Uuid::new_v4(), session.id).await.unwrap_err();
        assert!(matches!(err, AuthError::Unauthorized));

        manager.revoke(credential_id, session.id).await.unwrap();

        // second revoke and later validation both fail closed
        let err = manager.revoke(credential_id, session.id).await.unwrap_err();
        assert!(matches!(err, AuthError::Unauthorized));
        let err = manager
            .validate(session.id, &session.token, &session.csrf_token)
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::Unauthorized));
    }
}
