//! xv - encrypt and decrypt piped data with AES-256-GCM

#![forbid(unsafe_code)]

pub mod aead;
pub mod commands;
pub mod encoding;
pub mod error;
pub mod key;
pub mod pipeline;
pub mod verify;
