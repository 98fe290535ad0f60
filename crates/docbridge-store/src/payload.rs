//! Large payload storage backends.
//!
//! Payload bytes live outside the message snapshot; the domain model only
//! carries [`LargeFileReference`] handles. Two backends: filesystem
//! (primary) and in-memory (tests).

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::RwLock;

use async_trait::async_trait;
use bytes::Bytes;
use tracing::debug;
use uuid::Uuid;

use docbridge_core::{ConnectorMessageId, LargeFileReference};

use crate::error::{Result, StoreError};
use crate::traits::LargeFileStorage;

const FS_PROVIDER: &str = "fs";
const MEMORY_PROVIDER: &str = "memory";

/// Filesystem payload storage: one file per payload under a root
/// directory, addressed by a generated uuid.
pub struct FsLargeFileStorage {
    root: PathBuf,
}

impl FsLargeFileStorage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn path_for(&self, reference: &LargeFileReference) -> Result<PathBuf> {
        if reference.provider_name != FS_PROVIDER {
            return Err(StoreError::NotFound(format!(
                "payload provider {} is not {}",
                reference.provider_name, FS_PROVIDER
            )));
        }
        // Storage ids are generated uuids; reject anything path-like.
        if reference.storage_id.contains(['/', '\\', '.']) {
            return Err(StoreError::NotFound(format!(
                "invalid storage id {}",
                reference.storage_id
            )));
        }
        Ok(self.root.join(&reference.storage_id))
    }
}

#[async_trait]
impl LargeFileStorage for FsLargeFileStorage {
    async fn create_payload(
        &self,
        message_id: &ConnectorMessageId,
        name: Option<String>,
        mime_type: Option<String>,
        bytes: Bytes,
    ) -> Result<LargeFileReference> {
        let storage_id = Uuid::new_v4().to_string();
        let path = self.root.join(&storage_id);
        let size = bytes.len() as i64;

        tokio::fs::create_dir_all(&self.root).await?;
        tokio::fs::write(&path, &bytes).await?;
        debug!(message = %message_id, storage_id, size, "stored payload");

        let mut reference = LargeFileReference::new(FS_PROVIDER, storage_id);
        reference.name = name;
        reference.mime_type = mime_type;
        reference.size = size;
        Ok(reference)
    }

    async fn read_payload(&self, reference: &LargeFileReference) -> Result<Bytes> {
        let path = self.path_for(reference)?;
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(Bytes::from(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(StoreError::NotFound(
                format!("payload {}", reference.storage_id),
            )),
            Err(e) => Err(e.into()),
        }
    }

    async fn delete_payload(&self, reference: &LargeFileReference) -> Result<()> {
        let path = self.path_for(reference)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(StoreError::NotFound(
                format!("payload {}", reference.storage_id),
            )),
            Err(e) => Err(e.into()),
        }
    }
}

/// In-memory payload storage for tests.
#[derive(Default)]
pub struct MemoryLargeFileStorage {
    payloads: RwLock<HashMap<String, Bytes>>,
}

impl MemoryLargeFileStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl LargeFileStorage for MemoryLargeFileStorage {
    async fn create_payload(
        &self,
        _message_id: &ConnectorMessageId,
        name: Option<String>,
        mime_type: Option<String>,
        bytes: Bytes,
    ) -> Result<LargeFileReference> {
        let storage_id = Uuid::new_v4().to_string();
        let size = bytes.len() as i64;
        self.payloads
            .write()
            .unwrap()
            .insert(storage_id.clone(), bytes);

        let mut reference = LargeFileReference::new(MEMORY_PROVIDER, storage_id);
        reference.name = name;
        reference.mime_type = mime_type;
        reference.size = size;
        Ok(reference)
    }

    async fn read_payload(&self, reference: &LargeFileReference) -> Result<Bytes> {
        self.payloads
            .read()
            .unwrap()
            .get(&reference.storage_id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(format!("payload {}", reference.storage_id)))
    }

    async fn delete_payload(&self, reference: &LargeFileReference) -> Result<()> {
        self.payloads
            .write()
            .unwrap()
            .remove(&reference.storage_id)
            .map(|_| ())
            .ok_or_else(|| StoreError::NotFound(format!("payload {}", reference.storage_id)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_fs_payload_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FsLargeFileStorage::new(dir.path());
        let msg = ConnectorMessageId::from("id1");

        let reference = storage
            .create_payload(
                &msg,
                Some("form.pdf".into()),
                Some("application/pdf".into()),
                Bytes::from_static(b"pdf bytes"),
            )
            .await
            .unwrap();
        assert_eq!(reference.provider_name, "fs");
        assert_eq!(reference.size, 9);

        let bytes = storage.read_payload(&reference).await.unwrap();
        assert_eq!(bytes.as_ref(), b"pdf bytes");

        storage.delete_payload(&reference).await.unwrap();
        assert!(matches!(
            storage.read_payload(&reference).await,
            Err(StoreError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_fs_rejects_path_like_storage_id() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FsLargeFileStorage::new(dir.path());
        let mut reference = LargeFileReference::new("fs", "../../etc/passwd");
        reference.size = 1;
        assert!(matches!(
            storage.read_payload(&reference).await,
            Err(StoreError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_memory_payload_roundtrip() {
        let storage = MemoryLargeFileStorage::new();
        let msg = ConnectorMessageId::from("id1");
        let reference = storage
            .create_payload(&msg, None, None, Bytes::from_static(b"x"))
            .await
            .unwrap();
        assert_eq!(storage.read_payload(&reference).await.unwrap().as_ref(), b"x");
    }
}
