// src/common/id_generator.rs
//! Identifier and token generation
//!
//! Entity ids use prefixed Crockford Base32 (e.g. `I_K7NP3X` for interviews).
//! Interview session codes are the human-shareable form handed to
//! candidates. Bearer-style secrets (registration and session tokens) come
//! from the operating system RNG and carry 256 bits of entropy.

use rand::rngs::OsRng;
use rand::{Rng, RngCore};

/// Crockford Base32 alphabet (excludes I, L, O, U to avoid confusion)
const CROCKFORD_ALPHABET: &[u8; 32] = b"0123456789ABCDEFGHJKMNPQRSTVWXYZ";

/// Bytes of entropy in an opaque secret token
pub const SECRET_TOKEN_BYTES: usize = 32;

/// Entity type prefixes for ID generation
#[derive(Debug, Clone, Copy)]
pub enum EntityPrefix {
    /// User account (U_)
    User,
    /// Interview session (I_)
    Interview,
    /// Access request (Q_) - Q for Queue
    AccessRequest,
    /// Interview access audit record (L_) - L for Log
    AccessLog,
    /// Session lifecycle record (S_)
    Session,
}

impl EntityPrefix {
    /// Get the string prefix for this entity type
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityPrefix::User => "U",
            EntityPrefix::Interview => "I",
            EntityPrefix::AccessRequest => "Q",
            EntityPrefix::AccessLog => "L",
            EntityPrefix::Session => "S",
        }
    }
}

/// Generate a random Crockford Base32 string of specified length
fn generate_crockford_string(length: usize) -> String {
    let mut rng = rand::thread_rng();
    (0..length)
        .map(|_| {
            let idx = rng.gen_range(0..32);
            CROCKFORD_ALPHABET[idx] as char
        })
        .collect()
}

/// Generate a prefixed ID using Crockford Base32 encoding
///
/// Returns a string in format "PREFIX_XXXXXXXX" (e.g., "I_K7NP3X2Q")
pub fn generate_id(prefix: EntityPrefix) -> String {
    format!("{}_{}", prefix.as_str(), generate_crockford_string(8))
}

/// Generate a User ID (U_XXXXXXXX)
pub fn generate_user_id() -> String {
    generate_id(EntityPrefix::User)
}

/// Generate an Interview ID (I_XXXXXXXX)
pub fn generate_interview_id() -> String {
    generate_id(EntityPrefix::Interview)
}

/// Generate an Access Request ID (Q_XXXXXXXX)
pub fn generate_access_request_id() -> String {
    generate_id(EntityPrefix::AccessRequest)
}

/// Generate an Access Log ID (L_XXXXXXXX)
pub fn generate_access_log_id() -> String {
    generate_id(EntityPrefix::AccessLog)
}

/// Generate a Session ID (S_XXXXXXXX)
pub fn generate_session_id() -> String {
    generate_id(EntityPrefix::Session)
}

/// Human-shareable interview session code, e.g. "K7NP-3X2Q"
pub fn generate_session_code() -> String {
    let raw = generate_crockford_string(8);
    format!("{}-{}", &raw[..4], &raw[4..])
}

/// Opaque secret token: 32 bytes from the OS RNG, hex encoded
pub fn generate_secret_token() -> String {
    let mut bytes = [0u8; SECRET_TOKEN_BYTES];
    OsRng.fill_bytes(&mut bytes);
    hex::encode(bytes)
}
