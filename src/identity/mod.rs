//! Stable product identifiers.
//!
//! The id doubles as the object-storage key segment and the table key, so the
//! same URL must always hash to the same value.

use sha2::{Digest, Sha256};

pub const ID_LEN: usize = 24;

/// Lowercase hex SHA-256 of the URL bytes, truncated to [`ID_LEN`] chars.
pub fn derive_id(url: &str) -> String {
    let digest = Sha256::digest(url.as_bytes());
    let mut hex = format!("{:x}", digest);
    hex.truncate(ID_LEN);
    hex
}
