//! Password hashing and bearer token issuance.
//!
//! Stored password format: `{salt_hex}${sha256(salt || password)_hex}`.
//! Bearer tokens are 32 random bytes, hex encoded; only their SHA-256 digest
//! is persisted.

use sha2::{Digest, Sha256};

const SALT_BYTES: usize = 16;

pub fn hash_password(password: &str) -> String {
    let salt: [u8; SALT_BYTES] = rand::random();
    format!("{}${}", hex::encode(salt), salted_digest(&salt, password))
}

pub fn verify_password(password: &str, stored: &str) -> bool {
    let Some((salt_hex, digest_hex)) = stored.split_once('$') else { return false };
    let Ok(salt) = hex::decode(salt_hex) else { return false };
    constant_time_eq(salted_digest(&salt, password).as_bytes(), digest_hex.as_bytes())
}

pub fn issue_token() -> String {
    let secret: [u8; 32] = rand::random();
    hex::encode(secret)
}

/// Digest under which a bearer token is stored and looked up.
pub fn token_digest(token: &str) -> String {
    hex::encode(Sha256::digest(token.as_bytes()))
}

fn salted_digest(salt: &[u8], password: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(salt);
    hasher.update(password.as_bytes());
    hex::encode(hasher.finalize())
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    a.len() == b.len() && a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}
