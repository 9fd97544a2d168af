use std::fmt::Display;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

/// Contract shared by every certificate cache backend.
///
/// A missing key is `Ok(None)`, never an error: callers must be able to tell
/// "not stored" apart from "store unreachable". `put` is an unconditional
/// upsert and `delete` of an absent key succeeds.
///
/// Values are opaque bytes. Keys are typically a server name or an
/// issuance-protocol token; backends may namespace them internally but must
/// keep distinct keys distinct.
#[async_trait]
pub trait Cache: Send + Sync + Display {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, CacheError>;
    async fn put(&self, key: &str, value: &[u8]) -> Result<(), CacheError>;
    async fn delete(&self, key: &str) -> Result<(), CacheError>;
}

#[async_trait]
impl<C: Cache + ?Sized> Cache for Arc<C> {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, CacheError> {
        (**self).get(key).await
    }
    async fn put(&self, key: &str, value: &[u8]) -> Result<(), CacheError> {
        (**self).put(key, value).await
    }
    async fn delete(&self, key: &str) -> Result<(), CacheError> {
        (**self).delete(key).await
    }
}

#[derive(Error, Debug)]
pub enum CacheError {
    #[error("cache store error: {0}")]
    Store(#[source] Box<dyn std::error::Error + Send + Sync + 'static>),
    #[error("cache operation timed out after {0:?}")]
    Timeout(Duration),
    #[error("no encryption key configured")]
    NoEncryptKey,
    #[error("no decryption key configured")]
    NoDecryptKey,
    #[error("encrypting cache value: {0}")]
    Encrypt(#[source] Box<dyn std::error::Error + Send + Sync + 'static>),
    #[error("decrypting cache value: {0}")]
    Decrypt(#[source] Box<dyn std::error::Error + Send + Sync + 'static>),
}
