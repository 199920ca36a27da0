//! Encrypt and decrypt whole inputs
//!
//! Encryption seals the input with AES-256-GCM and then applies the
//! configured encoding. Decryption reverses the two steps. Input that is
//! empty or only whitespace is not an error: there is nothing to do and no
//! output is produced.

use std::fmt;

use md5::{Digest, Md5};
use rand::RngCore;
use rand::rngs::OsRng;

use crate::aead;
use crate::encoding::Encoding;
use crate::error::Result;
use crate::key::Key;

/// Settings fixed for the lifetime of a `Cipher`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CipherConfig {
    /// How sealed messages are represented on the wire.
    pub encoding: Encoding,
}

impl CipherConfig {
    pub fn new(encoding: Encoding) -> Self {
        Self { encoding }
    }
}

/// MD5 digest of a sealed message, shown to the operator to identify
/// content. It plays no part in the security of the ciphertext.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Checksum([u8; 16]);

impl Checksum {
    pub fn of(sealed: &[u8]) -> Self {
        let mut digest = [0u8; 16];
        digest.copy_from_slice(&Md5::digest(sealed));
        Self(digest)
    }
}

impl fmt::Display for Checksum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "MD5/{}", hex::encode_upper(self.0))
    }
}

/// Output of a successful encryption.
#[derive(Debug, Clone)]
pub struct Encrypted {
    /// nonce + ciphertext + tag, before encoding
    pub sealed: Vec<u8>,
    /// `sealed` in the configured encoding; this is what gets written out
    pub encoded: Vec<u8>,
}

impl Encrypted {
    pub fn checksum(&self) -> Checksum {
        Checksum::of(&self.sealed)
    }
}

/// Output of a successful decryption.
#[derive(Debug, Clone)]
pub struct Decrypted {
    /// The decoded input, still sealed
    pub sealed: Vec<u8>,
    pub plaintext: Vec<u8>,
}

impl Decrypted {
    pub fn checksum(&self) -> Checksum {
        Checksum::of(&self.sealed)
    }
}

#[derive(Debug, Clone, Default)]
pub struct Cipher {
    config: CipherConfig,
}

impl Cipher {
    pub fn new(config: CipherConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &CipherConfig {
        &self.config
    }

    /// Seal and encode `input`.
    ///
    /// Returns `None` if `input` is empty or whitespace. Otherwise the input
    /// is encrypted exactly as given, surrounding whitespace included.
    pub fn encrypt(&self, input: &[u8], key: &Key) -> Result<Option<Encrypted>> {
        self.encrypt_with_rng(input, key, &mut OsRng)
    }

    /// Like `encrypt`, drawing the nonce from `rng`.
    pub fn encrypt_with_rng<R: RngCore + ?Sized>(
        &self,
        input: &[u8],
        key: &Key,
        rng: &mut R,
    ) -> Result<Option<Encrypted>> {
        if is_blank(input) {
            tracing::debug!("nothing to encrypt");
            return Ok(None);
        }

        let sealed = aead::seal_with_rng(input, key.cipher_key(), rng)
            .map_err(|e| e.with_context("failed to seal input"))?;
        let encoded = self.config.encoding.encode(&sealed);
        tracing::debug!(
            plaintext_len = input.len(),
            sealed_len = sealed.len(),
            encoding = %self.config.encoding,
            "encrypted input"
        );
        Ok(Some(Encrypted { sealed, encoded }))
    }

    /// Decode and open `input`.
    ///
    /// Returns `None` if `input` is empty or whitespace.
    pub fn decrypt(&self, input: &[u8], key: &Key) -> Result<Option<Decrypted>> {
        if is_blank(input) {
            tracing::debug!("nothing to decrypt");
            return Ok(None);
        }

        let encoding = self.config.encoding;
        let sealed = encoding
            .decode(input)
            .map_err(|e| e.with_context(format!("failed to decode data from {}", encoding)))?;
        let plaintext = aead::open(&sealed, key.cipher_key())
            .map_err(|e| e.with_context("failed to decrypt input"))?;
        tracing::debug!(
            sealed_len = sealed.len(),
            plaintext_len = plaintext.len(),
            encoding = %encoding,
            "decrypted input"
        );
        Ok(Some(Decrypted { sealed, plaintext }))
    }
}

fn is_blank(input: &[u8]) -> bool {
    input.trim_ascii().is_empty()
}
