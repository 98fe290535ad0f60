//! Opaque references to externally stored large payloads.
//!
//! The core never holds payload bytes itself, only references. Resolving
//! a reference to actual bytes is a collaborator concern (the payload
//! storage trait lives in the store crate).

use serde::{Deserialize, Serialize};

/// An opaque handle to externally stored bytes.
///
/// The `provider_name`/`storage_id` pair addresses the bytes within a
/// storage provider; the core treats both as opaque and never inspects
/// provider-specific addressing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LargeFileReference {
    /// Name of the storage provider holding the bytes.
    pub provider_name: String,
    /// Provider-specific identifier of the stored bytes.
    pub storage_id: String,
    /// Original file name, if known.
    pub name: Option<String>,
    /// Content type, if known.
    pub mime_type: Option<String>,
    /// Size in bytes, -1 if unknown.
    pub size: i64,
}

impl LargeFileReference {
    pub fn new(provider_name: impl Into<String>, storage_id: impl Into<String>) -> Self {
        Self {
            provider_name: provider_name.into(),
            storage_id: storage_id.into(),
            name: None,
            mime_type: None,
            size: -1,
        }
    }
}
