//! Authenticated encryption with AES-256-GCM
//!
//! A sealed message is laid out as:
//! - nonce: 12 bytes
//! - ciphertext: same length as the plaintext
//! - tag: 16 bytes
//!
//! No associated data is authenticated and nothing else is framed; the
//! length of the ciphertext is implied by the length of the message.

use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Nonce};
use rand::RngCore;
use rand::rngs::OsRng;

use crate::error::{ErrorCategory, ErrorKind, Result, XvError};

/// Length of the AES-256 key in bytes
pub const KEY_SIZE: usize = 32;

/// Length of the GCM nonce in bytes
pub const NONCE_SIZE: usize = 12;

/// Length of the GCM authentication tag in bytes
pub const TAG_SIZE: usize = 16;

/// Draw a fresh nonce from `rng`.
///
/// A failing random source is fatal and is not retried.
pub fn generate_nonce<R: RngCore + ?Sized>(rng: &mut R) -> Result<[u8; NONCE_SIZE]> {
    let mut nonce = [0u8; NONCE_SIZE];
    rng.try_fill_bytes(&mut nonce).map_err(|e| {
        XvError::with_kind_and_source(
            ErrorCategory::Internal,
            ErrorKind::RandomSourceFailure,
            "failed to create nonce",
            e,
        )
    })?;
    Ok(nonce)
}

fn cipher(key: &[u8]) -> Result<Aes256Gcm> {
    if key.len() != KEY_SIZE {
        return Err(XvError::with_kind(
            ErrorCategory::Internal,
            ErrorKind::InvalidKeySize,
            format!(
                "cipher key must be exactly {} bytes, got {}",
                KEY_SIZE,
                key.len()
            ),
        ));
    }
    Aes256Gcm::new_from_slice(key).map_err(|_| {
        XvError::with_kind(
            ErrorCategory::Internal,
            ErrorKind::InvalidKeySize,
            "failed to create cipher",
        )
    })
}

/// Seal plaintext under `key` with a nonce from the operating system.
///
/// Returns nonce(12) + ciphertext + tag(16).
pub fn seal(plaintext: &[u8], key: &[u8]) -> Result<Vec<u8>> {
    seal_with_rng(plaintext, key, &mut OsRng)
}

/// Seal plaintext under `key` with a nonce drawn from `rng`.
pub fn seal_with_rng<R: RngCore + ?Sized>(
    plaintext: &[u8],
    key: &[u8],
    rng: &mut R,
) -> Result<Vec<u8>> {
    let nonce = generate_nonce(rng)?;
    seal_with_nonce(plaintext, key, &nonce)
}

/// Seal plaintext under `key` with the given nonce.
///
/// This function is ONLY for testing purposes to generate deterministic output.
/// Reusing a nonce under the same key destroys both confidentiality and
/// authenticity; production code goes through `seal()`.
pub fn seal_with_nonce(plaintext: &[u8], key: &[u8], nonce: &[u8; NONCE_SIZE]) -> Result<Vec<u8>> {
    let cipher = cipher(key)?;
    let ciphertext = cipher
        .encrypt(Nonce::from_slice(nonce), plaintext)
        .map_err(|_| {
            XvError::with_kind(
                ErrorCategory::Internal,
                ErrorKind::CipherFailure,
                "encryption failed",
            )
        })?;

    let mut output = Vec::with_capacity(NONCE_SIZE + ciphertext.len());
    output.extend_from_slice(nonce);
    output.extend_from_slice(&ciphertext);
    Ok(output)
}

/// Verify and decrypt a sealed message.
pub fn open(sealed: &[u8], key: &[u8]) -> Result<Vec<u8>> {
    let cipher = cipher(key)?;

    if sealed.len() < NONCE_SIZE + TAG_SIZE {
        return Err(XvError::with_kind(
            ErrorCategory::User,
            ErrorKind::Malformed,
            format!(
                "invalid encrypted data: {} bytes is shorter than a nonce and tag",
                sealed.len()
            ),
        ));
    }

    let (nonce, ciphertext) = sealed.split_at(NONCE_SIZE);
    cipher
        .decrypt(Nonce::from_slice(nonce), ciphertext)
        .map_err(|_| {
            XvError::with_kind(
                ErrorCategory::User,
                ErrorKind::AuthenticationFailed,
                "corrupt input, tampered-with data, or wrong key",
            )
        })
}
