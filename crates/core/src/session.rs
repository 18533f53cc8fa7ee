//! Session identifiers.
//!
//! A session id binds one client to its event stream on the engine. It is
//! a correlation token, not a secret: 256 random bits hashed to hex.

use rand::Rng;
use sha2::{Digest, Sha256};

/// Number of random bytes behind each session id.
const SESSION_ID_ENTROPY_BYTES: usize = 32;

/// Mint a new session id (64 lowercase hex characters).
pub fn new_session_id() -> String {
    let mut bytes = [0u8; SESSION_ID_ENTROPY_BYTES];
    rand::rng().fill(&mut bytes);
    id_from_entropy(&bytes)
}

/// Random `<hex>.png` file name for uploads that were not given a name.
pub fn random_png_name() -> String {
    format!("{}.png", new_session_id())
}

/// Lowercase hex SHA-256 of the raw entropy.
fn id_from_entropy(entropy: &[u8]) -> String {
    format!("{:x}", Sha256::digest(entropy))
}
