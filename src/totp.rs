// totp.rs
// TOTP utilities for login: build a TOTP instance from a stored Base32
// secret and generate new secrets for seeded users.

use anyhow::Result;
use data_encoding::BASE32_NOPAD;
use rand::RngCore;
use totp_rs::{Algorithm, Secret, TOTP};

pub const MIN_SECRET_BYTES: usize = 16; // 128 bits

/// Build a TOTP instance for a user. Validates minimum secret length after
/// Base32 decoding; 6 digits, 30 s period, ±1 step skew.
pub fn build_totp(email: &str, base32_secret: &str) -> Result<TOTP> {
    let secret = Secret::Encoded(base32_secret.to_string()).to_bytes()?;
    if secret.len() < MIN_SECRET_BYTES {
        anyhow::bail!(
            "shared secret too short: {} bytes, need >= {}",
            secret.len(),
            MIN_SECRET_BYTES
        );
    }
    let totp = TOTP::new(
        Algorithm::SHA1,
        6,
        1,
        30,
        secret,
        Some("Predios".to_string()),
        email.to_string(),
    )?;
    Ok(totp)
}

/// Random Base32 (NOPAD) secret of at least MIN_SECRET_BYTES.
pub fn generate_base32_secret(bytes: usize) -> String {
    let n = bytes.max(MIN_SECRET_BYTES);
    let mut buf = vec![0u8; n];
    rand::rng().fill_bytes(&mut buf);
    BASE32_NOPAD.encode(&buf)
}
