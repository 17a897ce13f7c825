// caseforge-clients/src/storage.rs
// ============================================================================
// Module: Mock Storage Client
// Description: In-memory stand-in for a binary object store.
// Purpose: Implement StorageClient without a network dependency.
// Dependencies: async-trait, caseforge-core, tokio
// ============================================================================

//! ## Overview
//! Backs every key with an in-memory byte buffer guarded by a single
//! mutex. Presigned URLs are synthetic (`mock://...`) and carry no real
//! authority; they exist so callers exercising the upload/download-URL
//! flow have something to format and pass around.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use caseforge_core::interfaces::clients::StorageClient;
use caseforge_core::ClientError;

struct StoredObject {
    bytes: Vec<u8>,
    content_type: String,
}

/// Deterministic, in-memory [`StorageClient`] mock.
pub struct MockStorageClient {
    objects: Mutex<HashMap<String, StoredObject>>,
}

impl MockStorageClient {
    /// Builds an empty mock store.
    #[must_use]
    pub fn new() -> Self {
        Self { objects: Mutex::new(HashMap::new()) }
    }
}

impl Default for MockStorageClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl StorageClient for MockStorageClient {
    async fn generate_upload_url(&self, key: &str, expiry: Duration) -> Result<String, ClientError> {
        if key.is_empty() {
            return Err(ClientError::InvalidInput("key must be non-empty".to_string()));
        }
        Ok(format!("mock://upload/{key}?expires_in={}", expiry.as_secs()))
    }

    async fn generate_download_url(&self, key: &str, expiry: Duration) -> Result<String, ClientError> {
        let objects = self.objects.lock().expect("storage mutex poisoned");
        if !objects.contains_key(key) {
            return Err(ClientError::InvalidInput(format!("no object stored under key {key}")));
        }
        Ok(format!("mock://download/{key}?expires_in={}", expiry.as_secs()))
    }

    async fn upload(&self, key: &str, bytes: Vec<u8>, content_type: &str) -> Result<(), ClientError> {
        if key.is_empty() {
            return Err(ClientError::InvalidInput("key must be non-empty".to_string()));
        }
        let mut objects = self.objects.lock().expect("storage mutex poisoned");
        objects.insert(key.to_string(), StoredObject { bytes, content_type: content_type.to_string() });
        Ok(())
    }

    async fn download(&self, key: &str) -> Result<(Vec<u8>, String), ClientError> {
        let objects = self.objects.lock().expect("storage mutex poisoned");
        objects
            .get(key)
            .map(|object| (object.bytes.clone(), object.content_type.clone()))
            .ok_or_else(|| ClientError::InvalidInput(format!("no object stored under key {key}")))
    }

    async fn delete(&self, key: &str) -> Result<(), ClientError> {
        let mut objects = self.objects.lock().expect("storage mutex poisoned");
        objects.remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn upload_then_download_round_trips_bytes_and_content_type() {
        let client = MockStorageClient::new();
        client.upload("evidence/1.png", vec![1, 2, 3], "image/png").await.expect("upload succeeds");
        let (bytes, content_type) = client.download("evidence/1.png").await.expect("download succeeds");
        assert_eq!(bytes, vec![1, 2, 3]);
        assert_eq!(content_type, "image/png");
    }

    #[tokio::test]
    async fn download_of_an_unknown_key_is_rejected() {
        let client = MockStorageClient::new();
        let result = client.download("missing").await;
        assert!(matches!(result, Err(ClientError::InvalidInput(_))));
    }

    #[tokio::test]
    async fn delete_removes_the_object_so_a_later_download_fails() {
        let client = MockStorageClient::new();
        client.upload("evidence/1.png", vec![1], "image/png").await.expect("upload succeeds");
        client.delete("evidence/1.png").await.expect("delete succeeds");
        let result = client.download("evidence/1.png").await;
        assert!(matches!(result, Err(ClientError::InvalidInput(_))));
    }

    #[tokio::test]
    async fn generate_download_url_requires_an_existing_object() {
        let client = MockStorageClient::new();
        let result = client.generate_download_url("missing", Duration::from_secs(60)).await;
        assert!(matches!(result, Err(ClientError::InvalidInput(_))));
    }
}
