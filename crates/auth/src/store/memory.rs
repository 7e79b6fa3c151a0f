//! In-memory adapter for the auth store.
//!
//! Backs unit tests and local development. All state lives behind one mutex,
//! so check-then-insert sequences are atomic exactly the way the PostgreSQL
//! adapter's transactions and unique indexes make them: concurrent duplicate
//! writers resolve to one winner and conflict errors for the rest.

use std::collections::HashMap;

use time::OffsetDateTime;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::error::{AuthError, AuthResult};

use super::{
    AccountUpdate, AuthStore, CredentialRecord, NewCredential, NewProfile, NewSession,
    NewVerificationToken, ProfileRecord, SessionRecord, VerificationTokenRecord,
};

#[derive(Default)]
struct State {
    credentials: HashMap<Uuid, CredentialRecord>,
    profiles: HashMap<Uuid, ProfileRecord>,
    sessions: HashMap<Uuid, SessionRecord>,
    verification_tokens: HashMap<Uuid, VerificationTokenRecord>,
}

impl State {
    fn email_taken(&self, email: &str) -> bool {
        self.credentials.values().any(|c| c.email == email)
    }

    fn username_taken(&self, username: &str) -> bool {
        self.profiles.values().any(|p| p.username == username)
    }
}

#[derive(Default)]
pub struct MemoryAuthStore {
    state: Mutex<State>,
}

impl MemoryAuthStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Test hook: the profile belonging to a credential.
    pub async fn profile_for_credential(&self, credential_id: Uuid) -> Option<ProfileRecord> {
        let state = self.state.lock().await;
        state
            .profiles
            .values()
            .find(|p| p.credential_id == credential_id)
            .cloned()
    }

    /// Test hook: number of verification tokens currently stored, swept or
    /// not.
    pub async fn verification_token_count(&self) -> usize {
        self.state.lock().await.verification_tokens.len()
    }

    /// Test hook: a stored session by id, secrets and timestamps included.
    pub async fn raw_session(&self, id: Uuid) -> Option<SessionRecord> {
        self.state.lock().await.sessions.get(&id).cloned()
    }
}

#[async_trait::async_trait]
impl AuthStore for MemoryAuthStore {
    async fn email_exists(&self, email: &str) -> AuthResult<bool> {
        Ok(self.state.lock().await.email_taken(email))
    }

    async fn username_exists(&self, username: &str) -> AuthResult<bool> {
        Ok(self.state.lock().await.username_taken(username))
    }

    async fn register_account(
        &self,
        credential: NewCredential,
        profile: NewProfile,
    ) -> AuthResult<()> {
        let mut state = self.state.lock().await;

        if state.email_taken(&credential.email) {
            return Err(AuthError::EmailTaken);
        }
        if state.username_taken(&profile.username) {
            return Err(AuthError::UsernameTaken);
        }

        state.credentials.insert(
            credential.id,
            CredentialRecord {
                id: credential.id,
                email: credential.email,
                password_hash: credential.password_hash,
                email_verified: false,
            },
        );
        state.profiles.insert(
            profile.id,
            ProfileRecord {
                id: profile.id,
                name: profile.name,
                username: profile.username,
                credential_id: profile.credential_id,
            },
        );
        Ok(())
    }

    async fn credential_by_email(&self, email: &str) -> AuthResult<Option<CredentialRecord>> {
        let state = self.state.lock().await;
        Ok(state.credentials.values().find(|c| c.email == email).cloned())
    }

    async fn credential_by_id(&self, id: Uuid) -> AuthResult<Option<CredentialRecord>> {
        Ok(self.state.lock().await.credentials.get(&id).cloned())
    }

    async fn mark_email_verified(&self, email: &str) -> AuthResult<()> {
        let mut state = self.state.lock().await;
        if let Some(credential) = state.credentials.values_mut().find(|c| c.email == email) {
            credential.email_verified = true;
        }
        Ok(())
    }

    async fn update_account(&self, credential_id: Uuid, update: AccountUpdate) -> AuthResult<()> {
        let mut state = self.state.lock().await;

        let current_email = state
            .credentials
            .get(&credential_id)
            .map(|c| c.email.clone())
            .ok_or(AuthError::NotFound)?;
        let current_username = state
            .profiles
            .values()
            .find(|p| p.credential_id == credential_id)
            .map(|p| p.username.clone())
            .ok_or(AuthError::NotFound)?;

        if update.email != current_email && state.email_taken(&update.email) {
            return Err(AuthError::EmailTaken);
        }
        if update.username != current_username && state.username_taken(&update.username) {
            return Err(AuthError::UsernameTaken);
        }

        if let Some(credential) = state.credentials.get_mut(&credential_id) {
            credential.email = update.email;
            credential.password_hash = update.password_hash;
        }
        if let Some(profile) = state
            .profiles
            .values_mut()
            .find(|p| p.credential_id == credential_id)
        {
            profile.name = update.name;
            profile.username = update.username;
        }
        Ok(())
    }

    async fn delete_account(&self, credential_id: Uuid) -> AuthResult<()> {
        let mut state = self.state.lock().await;

        if state.credentials.remove(&credential_id).is_none() {
            return Err(AuthError::NotFound);
        }
        // mirror the schema's ON DELETE CASCADE
        state.profiles.retain(|_, p| p.credential_id != credential_id);
        state.sessions.retain(|_, s| s.credential_id != credential_id);
        Ok(())
    }

    async fn insert_session(&self, session: NewSession) -> AuthResult<SessionRecord> {
        let record = SessionRecord {
            id: session.id,
            credential_id: session.credential_id,
            token: session.token,
            csrf_token: session.csrf_token,
            created_at: session.issued_at,
            last_active_at: session.issued_at,
        };
        self.state
            .lock()
            .await
            .sessions
            .insert(record.id, record.clone());
        Ok(record)
    }

    async fn session_by_id(&self, id: Uuid) -> AuthResult<Option<SessionRecord>> {
        Ok(self.state.lock().await.sessions.get(&id).cloned())
    }

    async fn touch_session(&self, id: Uuid, at: OffsetDateTime) -> AuthResult<()> {
        let mut state = self.state.lock().await;
        if let Some(session) = state.sessions.get_mut(&id) {
            session.last_active_at = at;
        }
        Ok(())
    }

    async fn delete_session_for_credential(
        &self,
        credential_id: Uuid,
        session_id: Uuid,
    ) -> AuthResult<u64> {
        let mut state = self.state.lock().await;
        match state.sessions.get(&session_id) {
            Some(session) if session.credential_id == credential_id => {
                state.sessions.remove(&session_id);
                Ok(1)
            }
            _ => Ok(0),
        }
    }

    async fn insert_verification_token(&self, token: NewVerificationToken) -> AuthResult<()> {
        let record = VerificationTokenRecord {
            id: token.id,
            email: token.email,
            expires_at: token.expires_at,
        };
        self.state
            .lock()
            .await
            .verification_tokens
            .insert(record.id, record);
        Ok(())
    }

    async fn verification_token_by_id(
        &self,
        id: Uuid,
    ) -> AuthResult<Option<VerificationTokenRecord>> {
        Ok(self.state.lock().await.verification_tokens.get(&id).cloned())
    }

    async fn delete_expired_verification_tokens(&self, now: OffsetDateTime) -> AuthResult<u64> {
        let mut state = self.state.lock().await;
        let before = state.verification_tokens.len();
        state.verification_tokens.retain(|_, t| t.expires_at >= now);
        Ok((before - state.verification_tokens.len()) as u64)
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use time::macros::datetime;

    use super::*;

    fn new_credential(email: &str) -> NewCredential {
        NewCredential {
            id: Uuid::new_v4(),
            email: email.to_string(),
            password_hash: "digest".to_string(),
        }
    }

    fn new_profile(username: &str, credential_id: Uuid) -> NewProfile {
        NewProfile {
            id: Uuid::new_v4(),
            name: "Somebody".to_string(),
            username: username.to_string(),
            credential_id,
        }
    }

    #[tokio::test]
    async fn register_then_lookup_round_trips() {
        let store = MemoryAuthStore::new();
        let credential = new_credential("a@example.com");
        let credential_id = credential.id;
        store
            .register_account(credential, new_profile("alice", credential_id))
            .await
            .unwrap();

        let found = store.credential_by_email("a@example.com").await.unwrap().unwrap();
        assert_eq!(found.id, credential_id);
        assert!(!found.email_verified);
        assert!(store.email_exists("a@example.com").await.unwrap());
        assert!(store.username_exists("alice").await.unwrap());
    }

    #[tokio::test]
    async fn duplicate_email_is_rejected_whole() {
        let store = MemoryAuthStore::new();
        let first = new_credential("a@example.com");
        let first_id = first.id;
        store
            .register_account(first, new_profile("alice", first_id))
            .await
            .unwrap();

        let second = new_credential("a@example.com");
        let second_id = second.id;
        let err = store
            .register_account(second, new_profile("bob", second_id))
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::EmailTaken));

        // the losing registration must leave no partial rows behind
        assert!(!store.username_exists("bob").await.unwrap());
        assert!(store.credential_by_id(second_id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn duplicate_username_is_rejected() {
        let store = MemoryAuthStore::new();
        let first = new_credential("a@example.com");
        let first_id = first.id;
        store
            .register_account(first, new_profile("alice", first_id))
            .await
            .unwrap();

        let second = new_credential("b@example.com");
        let second_id = second.id;
        let err = store
            .register_account(second, new_profile("alice", second_id))
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::UsernameTaken));
        assert!(!store.email_exists("b@example.com").await.unwrap());
    }

    #[tokio::test]
    async fn update_account_rechecks_only_changed_fields() {
        let store = MemoryAuthStore::new();
        let alice = new_credential("a@example.com");
        let alice_id = alice.id;
        store
            .register_account(alice, new_profile("alice", alice_id))
            .await
            .unwrap();
        let bob = new_credential("b@example.com");
        let bob_id = bob.id;
        store
            .register_account(bob, new_profile("bob", bob_id))
            .await
            .unwrap();

        // keeping your own email/username is not a conflict with yourself
        store
            .update_account(
                alice_id,
                AccountUpdate {
                    name: "Alice Q".to_string(),
                    username: "alice".to_string(),
                    email: "a@example.com".to_string(),
                    password_hash: "digest2".to_string(),
                },
            )
            .await
            .unwrap();

        let err = store
            .update_account(
                alice_id,
                AccountUpdate {
                    name: "Alice Q".to_string(),
                    username: "bob".to_string(),
                    email: "a@example.com".to_string(),
                    password_hash: "digest2".to_string(),
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::UsernameTaken));

        let err = store
            .update_account(
                alice_id,
                AccountUpdate {
                    name: "Alice Q".to_string(),
                    username: "alice".to_string(),
                    email: "b@example.com".to_string(),
                    password_hash: "digest2".to_string(),
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::EmailTaken));
    }

    #[tokio::test]
    async fn delete_account_cascades_profile_and_sessions() {
        let store = MemoryAuthStore::new();
        let credential = new_credential("a@example.com");
        let credential_id = credential.id;
        store
            .register_account(credential, new_profile("alice", credential_id))
            .await
            .unwrap();
        let session = store
            .insert_session(NewSession {
                id: Uuid::new_v4(),
                credential_id,
                token: "t".to_string(),
                csrf_token: "c".to_string(),
                issued_at: datetime!(2026-01-01 00:00 UTC),
            })
            .await
            .unwrap();

        store.delete_account(credential_id).await.unwrap();

        assert!(store.credential_by_id(credential_id).await.unwrap().is_none());
        assert!(store.profile_for_credential(credential_id).await.is_none());
        assert!(store.session_by_id(session.id).await.unwrap().is_none());

        let err = store.delete_account(credential_id).await.unwrap_err();
        assert!(matches!(err, AuthError::NotFound));
    }

    #[tokio::test]
    async fn session_delete_is_scoped_to_owner() {
        let store = MemoryAuthStore::new();
        let owner = Uuid::new_v4();
        let intruder = Uuid::new_v4();
        let session = store
            .insert_session(NewSession {
                id: Uuid::new_v4(),
                credential_id: owner,
                token: "t".to_string(),
                csrf_token: "c".to_string(),
                issued_at: datetime!(2026-01-01 00:00 UTC),
            })
            .await
            .unwrap();

        assert_eq!(
            store
                .delete_session_for_credential(intruder, session.id)
                .await
                .unwrap(),
            0
        );
        assert_eq!(
            store
                .delete_session_for_credential(owner, session.id)
                .await
                .unwrap(),
            1
        );
        assert_eq!(
            store
                .delete_session_for_credential(owner, session.id)
                .await
                .unwrap(),
            0
        );
    }

    #[tokio::test]
    async fn expired_sweep_keeps_live_tokens() {
        let store = MemoryAuthStore::new();
        let now = datetime!(2026-01-01 12:00 UTC);

        let expired = Uuid::new_v4();
        let live = Uuid::new_v4();
        store
            .insert_verification_token(NewVerificationToken {
                id: expired,
                email: "a@example.com".to_string(),
                expires_at: now - Duration::from_secs(1),
            })
            .await
            .unwrap();
        store
            .insert_verification_token(NewVerificationToken {
                id: live,
                email: "b@example.com".to_string(),
                expires_at: now + Duration::from_secs(1),
            })
            .await
            .unwrap();

        let deleted = store.delete_expired_verification_tokens(now).await.unwrap();
        assert_eq!(deleted, 1);
        assert!(store.verification_token_by_id(expired).await.unwrap().is_none());
        assert!(store.verification_token_by_id(live).await.unwrap().is_some());
    }
}
