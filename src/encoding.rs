//! Transport encodings for sealed messages
//!
//! A sealed message is binary. Before it is written out it is mapped to one of
//! three representations:
//! - `base64`: standard alphabet with padding
//! - `hex`: lowercase, two characters per byte, no separators
//! - `raw`: the bytes as they are
//!
//! Nothing in the output identifies which encoding was used, so the same
//! encoding must be selected for decryption.

use std::fmt;

use base64::{Engine, engine::general_purpose::STANDARD};
use clap::ValueEnum;

use crate::error::{ErrorCategory, ErrorKind, Result, XvError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum Encoding {
    /// Standard padded base64
    #[default]
    #[value(alias = "b64")]
    Base64,
    /// Lowercase hexadecimal
    Hex,
    /// Unencoded binary, suitable for non-textual files
    Raw,
}

impl Encoding {
    /// Canonical name, as accepted on the command line.
    pub fn name(self) -> &'static str {
        match self {
            Encoding::Base64 => "base64",
            Encoding::Hex => "hex",
            Encoding::Raw => "raw",
        }
    }

    pub fn encode(self, body: &[u8]) -> Vec<u8> {
        match self {
            Encoding::Base64 => STANDARD.encode(body).into_bytes(),
            Encoding::Hex => hex::encode(body).into_bytes(),
            Encoding::Raw => body.to_vec(),
        }
    }

    /// Decode `encoded` back into the bytes it represents.
    ///
    /// The text encodings ignore surrounding ASCII whitespace so that input
    /// ending in a newline still decodes. Raw input is returned untouched.
    pub fn decode(self, encoded: &[u8]) -> Result<Vec<u8>> {
        match self {
            Encoding::Base64 => STANDARD
                .decode(encoded.trim_ascii())
                .map_err(|e| decode_error(self, e)),
            Encoding::Hex => hex::decode(encoded.trim_ascii()).map_err(|e| decode_error(self, e)),
            Encoding::Raw => Ok(encoded.to_vec()),
        }
    }
}

impl fmt::Display for Encoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

fn decode_error(
    encoding: Encoding,
    err: impl std::error::Error + Send + Sync + 'static,
) -> XvError {
    XvError::with_kind_and_source(
        ErrorCategory::User,
        ErrorKind::Encoding,
        format!("{} decoding failed", encoding),
        err,
    )
}
