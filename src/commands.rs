//! The `enc`, `dec` and `init` operations
//!
//! Each operation reads its whole input, runs it through the cipher and
//! writes the result. Status for the operator (checksums, verification
//! outcome) is returned as a report and left to the caller to display.

use std::io::{self, Read, Write};
use std::path::Path;

use crate::aead::KEY_SIZE;
use crate::error::{ErrorCategory, ErrorKind, Result, XvError};
use crate::key::{FileKeyStore, Key, key_too_small};
use crate::pipeline::{Checksum, Cipher, CipherConfig};
use crate::verify::verify_round_trip;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EncryptReport {
    /// The input was empty or whitespace; nothing was written.
    Skipped,
    /// Ciphertext was written and not verified.
    Encrypted { checksum: Checksum },
    /// Ciphertext was written and decrypts back to the input.
    Verified { checksum: Checksum },
    /// Ciphertext was written but does not decrypt back to the input.
    VerificationFailed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecryptReport {
    /// The input was empty or whitespace; nothing was written.
    Skipped,
    /// Plaintext was written. The checksum is that of the decoded input.
    Decrypted { checksum: Checksum },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InitReport {
    Created,
    Overwritten,
    /// The key file already existed and the user chose to keep it.
    Kept,
}

/// Encrypt everything readable from `input` and write the encoded result to
/// `output`.
///
/// With `verify` set, the written ciphertext is decrypted again and compared
/// with the input. The ciphertext is written before verification runs.
pub fn encrypt(
    input: &mut dyn Read,
    output: &mut dyn Write,
    key: &Key,
    config: CipherConfig,
    verify: bool,
) -> Result<EncryptReport> {
    let plaintext = read_input(input)?;
    let cipher = Cipher::new(config);
    let Some(encrypted) = cipher
        .encrypt(&plaintext, key)
        .map_err(|e| e.with_context("failed to encrypt data"))?
    else {
        return Ok(EncryptReport::Skipped);
    };
    write_output(output, &encrypted.encoded)?;

    if !verify {
        return Ok(EncryptReport::Encrypted {
            checksum: encrypted.checksum(),
        });
    }
    let verification = verify_round_trip(&cipher, &plaintext, &encrypted.encoded, key)?;
    if !verification.is_match() {
        return Ok(EncryptReport::VerificationFailed);
    }
    Ok(EncryptReport::Verified {
        checksum: encrypted.checksum(),
    })
}

/// Decrypt everything readable from `input` and write the plaintext to
/// `output`.
pub fn decrypt(
    input: &mut dyn Read,
    output: &mut dyn Write,
    key: &Key,
    config: CipherConfig,
) -> Result<DecryptReport> {
    let encoded = read_input(input)?;
    let Some(decrypted) = Cipher::new(config)
        .decrypt(&encoded, key)
        .map_err(|e| e.with_context("failed to decrypt data"))?
    else {
        return Ok(DecryptReport::Skipped);
    };
    write_output(output, &decrypted.plaintext)?;
    Ok(DecryptReport::Decrypted {
        checksum: decrypted.checksum(),
    })
}

/// Store `key` in `store`.
///
/// If the key file already exists, `confirm_overwrite` is asked first and the
/// file is left alone unless it returns true.
pub fn init_key(
    store: &FileKeyStore,
    key: &str,
    confirm_overwrite: &mut dyn FnMut(&Path) -> bool,
) -> Result<InitReport> {
    if key.trim().len() < KEY_SIZE {
        return Err(key_too_small());
    }

    let existed = store.exists();
    if existed && !confirm_overwrite(store.path()) {
        tracing::info!(path = %store.path().display(), "keeping existing key file");
        return Ok(InitReport::Kept);
    }

    store.write(key)?;
    tracing::info!(path = %store.path().display(), "key file written");
    Ok(if existed {
        InitReport::Overwritten
    } else {
        InitReport::Created
    })
}

fn read_input(input: &mut dyn Read) -> Result<Vec<u8>> {
    let mut data = Vec::new();
    input
        .read_to_end(&mut data)
        .map_err(|e| io_error("failed to read the input", e))?;
    Ok(data)
}

fn write_output(output: &mut dyn Write, data: &[u8]) -> Result<()> {
    output
        .write_all(data)
        .map_err(|e| io_error("failed to write the output", e))?;
    output
        .flush()
        .map_err(|e| io_error("failed to flush the output", e))
}

fn io_error(msg: &str, err: io::Error) -> XvError {
    XvError::with_kind_and_source(ErrorCategory::Internal, ErrorKind::Io, msg, err)
}
