//! Trust store (keystore) management.

use std::sync::Arc;

use bytes::Bytes;
use tracing::info;
use uuid::Uuid;

use docbridge_core::{Keystore, KeystoreType};
use docbridge_store::{KeystoreStore, StoreError};

use crate::error::{ConfigError, Result};

/// Service managing uploaded trust stores.
pub struct KeystoreService<S: KeystoreStore> {
    store: Arc<S>,
}

impl<S: KeystoreStore> KeystoreService<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Store uploaded keystore bytes under a fresh uuid.
    pub async fn upload(
        &self,
        bytes: Bytes,
        password: impl Into<String>,
        keystore_type: KeystoreType,
        description: Option<String>,
    ) -> Result<Keystore> {
        let uuid = Uuid::new_v4().to_string();
        let mut keystore = Keystore::new(uuid, bytes, password, keystore_type);
        keystore.description = description;
        self.store.persist_keystore(&keystore).await?;
        info!(uuid = %keystore.uuid, "uploaded keystore");
        Ok(keystore)
    }

    pub async fn get(&self, uuid: &str) -> Result<Keystore> {
        self.store
            .find_keystore(uuid)
            .await?
            .ok_or_else(|| ConfigError::NotFound(format!("keystore {}", uuid)))
    }

    pub async fn update_password(&self, uuid: &str, password: &str) -> Result<()> {
        match self.store.update_keystore_password(uuid, password).await {
            Ok(()) => Ok(()),
            Err(StoreError::NotFound(_)) => {
                Err(ConfigError::NotFound(format!("keystore {}", uuid)))
            }
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use docbridge_store::MemoryStore;

    #[tokio::test]
    async fn test_upload_and_get() {
        let service = KeystoreService::new(Arc::new(MemoryStore::new()));
        let uploaded = service
            .upload(
                Bytes::from_static(b"store bytes"),
                "pw",
                KeystoreType::Pkcs12,
                Some("gateway truststore".into()),
            )
            .await
            .unwrap();

        let loaded = service.get(&uploaded.uuid).await.unwrap();
        assert_eq!(loaded.keystore_type, KeystoreType::Pkcs12);
        assert_eq!(loaded.password, "pw");
    }

    #[tokio::test]
    async fn test_get_missing_is_not_found() {
        let service = KeystoreService::new(Arc::new(MemoryStore::new()));
        assert!(matches!(
            service.get("ghost").await,
            Err(ConfigError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_password_update() {
        let service = KeystoreService::new(Arc::new(MemoryStore::new()));
        let uploaded = service
            .upload(Bytes::from_static(b"x"), "old", KeystoreType::Jks, None)
            .await
            .unwrap();

        service.update_password(&uploaded.uuid, "new").await.unwrap();
        assert_eq!(service.get(&uploaded.uuid).await.unwrap().password, "new");
    }
}
