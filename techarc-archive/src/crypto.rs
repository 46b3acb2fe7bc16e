//! AES-256-GCM encryption envelope.
//!
//! Envelope layout: `TCE1 | salt (16) | nonce (12) | ciphertext + tag (16)`.
//! The key is derived from the password with PBKDF2-HMAC-SHA256.

use aes_gcm::aead::Aead;
use aes_gcm::{Aes256Gcm, Key, KeyInit, Nonce};
use pbkdf2::pbkdf2_hmac;
use rand::RngCore;
use rand::rngs::OsRng;
use sha2::Sha256;
use techarc_core::format::TAG_LEN;
use techarc_core::{FormatTag, Result, TechArcError};

/// AES-256 key length.
pub const KEY_SIZE: usize = 32;
/// GCM nonce length.
pub const NONCE_SIZE: usize = 12;
/// PBKDF2 salt length.
pub const SALT_SIZE: usize = 16;
/// GCM authentication tag length.
pub const TAG_SIZE: usize = 16;
/// PBKDF2 iteration count.
pub const PBKDF2_ROUNDS: u32 = 100_000;

/// Smallest possible envelope (empty plaintext).
pub const MIN_ENVELOPE_LEN: usize = TAG_LEN + SALT_SIZE + NONCE_SIZE + TAG_SIZE;

fn derive_key(password: &str, salt: &[u8]) -> [u8; KEY_SIZE] {
    let mut key = [0u8; KEY_SIZE];
    pbkdf2_hmac::<Sha256>(password.as_bytes(), salt, PBKDF2_ROUNDS, &mut key);
    key
}

/// Encrypt `data` into a `TCE1` envelope.
pub fn encrypt(data: &[u8], password: &str) -> Result<Vec<u8>> {
    if password.is_empty() {
        return Err(TechArcError::invalid_argument("password cannot be empty"));
    }

    let mut salt = [0u8; SALT_SIZE];
    OsRng.fill_bytes(&mut salt);
    let mut nonce_bytes = [0u8; NONCE_SIZE];
    OsRng.fill_bytes(&mut nonce_bytes);

    let key_bytes = derive_key(password, &salt);
    let key = Key::<Aes256Gcm>::from_slice(&key_bytes);
    let cipher = Aes256Gcm::new(key);
    let ciphertext = cipher
        .encrypt(Nonce::from_slice(&nonce_bytes), data)
        .map_err(|_| TechArcError::invalid_argument("plaintext too large to encrypt"))?;

    let mut out = Vec::with_capacity(MIN_ENVELOPE_LEN + data.len());
    out.extend_from_slice(FormatTag::Encrypted.magic());
    out.extend_from_slice(&salt);
    out.extend_from_slice(&nonce_bytes);
    out.extend_from_slice(&ciphertext);
    log::debug!("encrypted {} bytes into {} byte envelope", data.len(), out.len());
    Ok(out)
}

/// Open a `TCE1` envelope.
///
/// Fails with `WrongPassword` when authentication fails, which covers both
/// a wrong password and tampered ciphertext.
pub fn decrypt(envelope: &[u8], password: &str) -> Result<Vec<u8>> {
    if password.is_empty() {
        return Err(TechArcError::PasswordRequired);
    }
    let (tag, body) = FormatTag::split(envelope)?;
    if tag != FormatTag::Encrypted {
        return Err(TechArcError::unknown_format(tag.magic().as_slice()));
    }
    if envelope.len() < MIN_ENVELOPE_LEN {
        return Err(TechArcError::corrupted(
            envelope.len() as u64,
            "encrypted envelope too short",
        ));
    }

    let (salt, rest) = body.split_at(SALT_SIZE);
    let (nonce, ciphertext) = rest.split_at(NONCE_SIZE);

    let key_bytes = derive_key(password, salt);
    let key = Key::<Aes256Gcm>::from_slice(&key_bytes);
    let cipher = Aes256Gcm::new(key);
    cipher
        .decrypt(Nonce::from_slice(nonce), ciphertext)
        .map_err(|_| TechArcError::WrongPassword)
}

/// True when `data` starts with the encryption tag.
pub fn is_encrypted(data: &[u8]) -> bool {
    data.starts_with(FormatTag::Encrypted.magic())
}
