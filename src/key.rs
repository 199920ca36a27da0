//! Key resolution and the key file
//!
//! A key is supplied either inline (command-line flag or environment) or
//! from the key file written by `xv init`. Keys shorter than 32 bytes are
//! rejected. Longer keys are accepted and only their first 32 bytes are
//! used by the cipher; bytes past that point are silently ignored.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use directories::BaseDirs;
use zeroize::Zeroizing;

use crate::aead::KEY_SIZE;
use crate::error::{ErrorCategory, ErrorKind, Result, XvError};

/// Name of the key file inside the home directory.
pub const KEY_FILE_NAME: &str = ".xv";

/// A validated key of at least `KEY_SIZE` bytes.
///
/// The bytes are wiped from memory when the key is dropped.
pub struct Key {
    bytes: Zeroizing<Vec<u8>>,
}

impl Key {
    /// Accepts `bytes` as a key if it is at least `KEY_SIZE` bytes long.
    pub fn new(bytes: impl Into<Vec<u8>>) -> Result<Self> {
        let bytes = Zeroizing::new(bytes.into());
        if bytes.len() < KEY_SIZE {
            return Err(key_too_small());
        }
        Ok(Self { bytes })
    }

    /// The bytes handed to the cipher: the first `KEY_SIZE` bytes of the key.
    pub fn cipher_key(&self) -> &[u8] {
        &self.bytes[..KEY_SIZE]
    }
}

impl std::fmt::Debug for Key {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Key").field("len", &self.bytes.len()).finish()
    }
}

pub(crate) fn key_too_small() -> XvError {
    XvError::with_kind(
        ErrorCategory::User,
        ErrorKind::KeyTooSmall,
        format!("the encryption key must be at least {} bytes", KEY_SIZE),
    )
}

/// Source of a stored key.
pub trait KeyStore {
    /// Read the stored key as arbitrary bytes.
    ///
    /// Implementations report a missing key as `ErrorKind::KeyNotFound` and
    /// any other failure as `ErrorKind::KeyStoreUnreadable`.
    fn read(&self) -> Result<Zeroizing<Vec<u8>>>;
}

/// Key store backed by a single file, `~/.xv` by default.
#[derive(Debug, Clone)]
pub struct FileKeyStore {
    path: PathBuf,
}

impl FileKeyStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// The key file in the current user's home directory.
    pub fn default_location() -> Result<Self> {
        let dirs = BaseDirs::new().ok_or_else(|| {
            XvError::with_kind(
                ErrorCategory::Internal,
                ErrorKind::KeyStoreUnreadable,
                "failed to get home directory",
            )
        })?;
        Ok(Self::new(dirs.home_dir().join(KEY_FILE_NAME)))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    /// Store `key` in the key file, replacing any existing one.
    ///
    /// Surrounding whitespace is stripped before the length check. The file
    /// is written to a temporary file next to the target, synced and then
    /// renamed into place, so a concurrent reader sees either the old key or
    /// the new one. On Unix the file is readable by its owner only.
    pub fn write(&self, key: &str) -> Result<()> {
        let key = key.trim();
        if key.len() < KEY_SIZE {
            return Err(key_too_small());
        }

        let dir = match self.path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir,
            _ => Path::new("."),
        };
        let mut temp_file = tempfile::NamedTempFile::new_in(dir)
            .map_err(|e| io_error("failed to create tempfile", e))?;
        temp_file
            .write_all(key.as_bytes())
            .map_err(|e| io_error("failed to write to tempfile", e))?;
        // Flush and fsync() such that the rename later, if it succeeds, will
        // always point to a complete key.
        temp_file
            .flush()
            .map_err(|e| io_error("failed to flush tempfile", e))?;
        temp_file
            .as_file()
            .sync_all()
            .map_err(|e| io_error("failed to sync file prior to rename", e))?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            temp_file
                .as_file()
                .set_permissions(fs::Permissions::from_mode(0o600))
                .map_err(|e| io_error("failed to set tempfile permissions", e))?;
        }

        temp_file.persist(&self.path).map_err(|e| {
            io_error(
                format!("failed to create the key file {}", self.path.display()),
                e.error,
            )
        })?;
        Ok(())
    }
}

impl KeyStore for FileKeyStore {
    fn read(&self) -> Result<Zeroizing<Vec<u8>>> {
        match fs::read(&self.path) {
            Ok(bytes) => Ok(Zeroizing::new(bytes)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Err(XvError::with_kind_and_source(
                ErrorCategory::User,
                ErrorKind::KeyNotFound,
                format!(
                    "key file {} does not exist; run `xv init <key of at least {} bytes>` to create one",
                    self.path.display(),
                    KEY_SIZE
                ),
                e,
            )),
            Err(e) => Err(XvError::with_kind_and_source(
                ErrorCategory::Internal,
                ErrorKind::KeyStoreUnreadable,
                format!("failed to read key file {}", self.path.display()),
                e,
            )),
        }
    }
}

/// Returns a fixed key (for testing)
pub struct ConstantKeyStore {
    key: Zeroizing<Vec<u8>>,
}

impl ConstantKeyStore {
    pub fn new(key: Vec<u8>) -> Self {
        Self {
            key: Zeroizing::new(key),
        }
    }
}

impl KeyStore for ConstantKeyStore {
    fn read(&self) -> Result<Zeroizing<Vec<u8>>> {
        Ok(Zeroizing::new((*self.key).clone()))
    }
}

/// Pick the key for this invocation.
///
/// A non-blank `explicit` key wins and is used exactly as given. Otherwise the
/// key comes from `store`. Either way it must be at least `KEY_SIZE` bytes.
pub fn resolve(explicit: Option<&str>, store: &dyn KeyStore) -> Result<Key> {
    if let Some(explicit) = explicit.filter(|k| !k.trim().is_empty()) {
        tracing::debug!(len = explicit.len(), "using explicit key");
        return Key::new(explicit.as_bytes());
    }

    let stored = store.read()?;
    tracing::debug!(len = stored.len(), "using stored key");
    Key::new(stored.as_slice()).map_err(|e| e.with_context("stored key is invalid"))
}

fn io_error(msg: impl Into<String>, err: io::Error) -> XvError {
    XvError::with_kind_and_source(ErrorCategory::Internal, ErrorKind::Io, msg, err)
}
