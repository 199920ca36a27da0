//! Round-trip check for freshly produced ciphertext

use crate::error::Result;
use crate::key::Key;
use crate::pipeline::Cipher;

/// Outcome of a round-trip check that ran to completion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verification {
    /// Decrypting the output reproduced the original input.
    Matched,
    /// Decryption succeeded but produced something other than the input.
    Mismatched,
}

impl Verification {
    pub fn is_match(self) -> bool {
        self == Verification::Matched
    }
}

/// Decrypt `encoded` with the same cipher and key and compare the result with
/// `original`.
///
/// A mismatch is reported as `Verification::Mismatched`, not as an error, since
/// the ciphertext may still be usable. Errors from decryption itself are
/// returned as errors.
pub fn verify_round_trip(
    cipher: &Cipher,
    original: &[u8],
    encoded: &[u8],
    key: &Key,
) -> Result<Verification> {
    let decrypted = cipher
        .decrypt(encoded, key)
        .map_err(|e| e.with_context("failed to verify data"))?;

    match decrypted {
        Some(decrypted) if decrypted.plaintext == original => Ok(Verification::Matched),
        _ => {
            tracing::warn!(
                original_len = original.len(),
                encoding = %cipher.config().encoding,
                "round-trip verification failed"
            );
            Ok(Verification::Mismatched)
        }
    }
}
