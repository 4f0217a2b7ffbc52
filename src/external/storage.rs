//! Object-storage collaborator seam.
//!
//! The core depends on put / signed-url / delete only. Ownership checks on
//! uploaded assets belong to the service layer, not here.

use async_trait::async_trait;
use chrono::Utc;
use once_cell::sync::Lazy;
use sha2::{Digest, Sha256};
use thiserror::Error;

use crate::config;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Invalid object key: {0}")]
    InvalidKey(String),

    #[error("Storage I/O failed: {0}")]
    Io(#[from] std::io::Error),
}

#[async_trait]
pub trait ObjectStorage: Send + Sync {
    /// Store bytes under `key`, returning the public URL.
    async fn put(&self, bytes: &[u8], key: &str) -> Result<String, StorageError>;

    /// Time-limited URL for a stored object.
    async fn signed_url(&self, key: &str, ttl_secs: i64) -> Result<String, StorageError>;

    async fn delete(&self, key: &str) -> Result<(), StorageError>;
}

/// Development backend: flat files under a configured directory, served from
/// the configured public base URL. The real S3 client lives outside this
/// repository.
pub struct LocalStorage {
    dir: String,
    base_url: String,
}

impl LocalStorage {
    pub fn from_config() -> Self {
        let storage = &config::config().storage;
        Self {
            dir: storage.local_dir.clone(),
            base_url: storage.public_base_url.clone(),
        }
    }

    fn path_for(&self, key: &str) -> Result<std::path::PathBuf, StorageError> {
        validate_key(key)?;
        Ok(std::path::Path::new(&self.dir).join(key))
    }

    fn url_for(&self, key: &str) -> String {
        format!("{}/{}", self.base_url.trim_end_matches('/'), key)
    }
}

/// Keys are generated server-side (content hash + extension); anything with
/// separators or dot-dot is rejected outright.
fn validate_key(key: &str) -> Result<(), StorageError> {
    let ok = !key.is_empty()
        && key.len() <= 128
        && key
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '.' || c == '_' || c == '-')
        && !key.contains("..");
    if !ok {
        return Err(StorageError::InvalidKey(key.to_string()));
    }
    Ok(())
}

/// Content-addressed object key: sha256 of the bytes plus the original
/// file's extension.
pub fn object_key(bytes: &[u8], original_name: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    let digest = format!("{:x}", hasher.finalize());

    match original_name.rsplit_once('.') {
        Some((_, ext))
            if !ext.is_empty() && ext.len() <= 8 && ext.chars().all(|c| c.is_ascii_alphanumeric()) =>
        {
            format!("{}.{}", digest, ext.to_ascii_lowercase())
        }
        _ => digest,
    }
}

#[async_trait]
impl ObjectStorage for LocalStorage {
    async fn put(&self, bytes: &[u8], key: &str) -> Result<String, StorageError> {
        let path = self.path_for(key)?;
        tokio::fs::create_dir_all(&self.dir).await?;
        tokio::fs::write(&path, bytes).await?;
        Ok(self.url_for(key))
    }

    async fn signed_url(&self, key: &str, ttl_secs: i64) -> Result<String, StorageError> {
        validate_key(key)?;
        let expires = Utc::now().timestamp() + ttl_secs;

        let mut hasher = Sha256::new();
        hasher.update(config::config().security.jwt_secret.as_bytes());
        hasher.update(key.as_bytes());
        hasher.update(expires.to_string().as_bytes());
        let sig = format!("{:x}", hasher.finalize());

        Ok(format!("{}?expires={}&sig={}", self.url_for(key), expires, sig))
    }

    async fn delete(&self, key: &str) -> Result<(), StorageError> {
        let path = self.path_for(key)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            // Deleting an already-gone object is not an error
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

static STORAGE: Lazy<LocalStorage> = Lazy::new(LocalStorage::from_config);

pub fn storage() -> &'static dyn ObjectStorage {
    &*STORAGE
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_are_content_addressed_with_extension() {
        let key = object_key(b"snack", "cola.PNG");
        assert!(key.ends_with(".png"));
        assert_eq!(key, object_key(b"snack", "other-name.png"));
        assert_ne!(key, object_key(b"other bytes", "cola.png"));
    }

    #[test]
    fn traversal_keys_rejected() {
        assert!(validate_key("../etc/passwd").is_err());
        assert!(validate_key("a/b").is_err());
        assert!(validate_key("").is_err());
        assert!(validate_key("abc123.png").is_ok());
    }
}
