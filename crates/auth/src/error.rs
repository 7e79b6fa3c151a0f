//! Error taxonomy for the auth core.
//!
//! Validation and conflict errors are typed values produced locally and
//! surfaced to callers verbatim; storage and infrastructure failures are
//! wrapped and only ever surfaced opaquely.

use std::collections::BTreeMap;
use std::fmt;

pub type AuthResult<T> = Result<T, AuthError>;

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// One or more request fields failed validation. The map is safe to
    /// return to the caller as-is.
    #[error("validation failed: {0}")]
    Validation(FieldErrors),
    #[error("email already exists")]
    EmailTaken,
    #[error("username already exists")]
    UsernameTaken,
    /// Wrong credentials, missing/mismatched session secrets, or logout of a
    /// session the caller does not own. Deliberately opaque: it never reveals
    /// which check failed.
    #[error("unauthorized")]
    Unauthorized,
    /// The credentials were correct but the email address has not been
    /// verified yet. Distinct from `Unauthorized` so callers can prompt for
    /// re-verification.
    #[error("email not verified")]
    EmailNotVerified,
    #[error("not found")]
    NotFound,
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("internal error: {0}")]
    Internal(String),
}

impl AuthError {
    /// The field a conflict error should be reported against, if this is one.
    pub fn conflict_field(&self) -> Option<&'static str> {
        match self {
            AuthError::EmailTaken => Some("email"),
            AuthError::UsernameTaken => Some("username"),
            _ => None,
        }
    }
}

/// Field-keyed validation failures, ordered by field name.
///
/// Keys are the request's wire-level field names (camelCase), so the map can
/// be serialized straight into an error response.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize)]
#[serde(transparent)]
pub struct FieldErrors(BTreeMap<&'static str, String>);

impl FieldErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, field: &'static str, message: impl Into<String>) {
        self.0.insert(field, message.into());
    }

    pub fn get(&self, field: &str) -> Option<&str> {
        self.0.get(field).map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&'static str, &str)> {
        self.0.iter().map(|(field, message)| (*field, message.as_str()))
    }
}

impl fmt::Display for FieldErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for (field, message) in self.0.iter() {
            if !first {
                write!(f, "; ")?;
            }
            write!(f, "{field}: {message}")?;
            first = false;
        }
        Ok(())
    }
}

impl From<FieldErrors> for AuthError {
    fn from(errors: FieldErrors) -> Self {
        AuthError::Validation(errors)
    }
}
