//! Random token generation.

use rand::RngCore;
use uuid::Uuid;

/// Length in bytes of the random suffix carried by session secrets.
pub const SESSION_SECRET_BYTES: usize = 32;

/// Cryptographically secure random bytes, lowercase hex encoded.
pub fn random_hex(n_bytes: usize) -> String {
    let mut buf = vec![0u8; n_bytes];
    rand::rng().fill_bytes(&mut buf);
    hex::encode(buf)
}

/// A bearer or CSRF secret for a session: `<sessionId>_<random hex>`.
///
/// The id prefix makes secrets attributable in logs and debugging without
/// weakening them; the random suffix alone carries the entropy.
pub fn session_secret(session_id: Uuid) -> String {
    format!("{session_id}_{}", random_hex(SESSION_SECRET_BYTES))
}
