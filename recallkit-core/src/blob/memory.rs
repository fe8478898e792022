use crate::blob::BlobStore;
use crate::{CoreError, CoreResult};
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::BTreeMap;

/// Process-local blob store, used for ephemeral stores and tests.
#[derive(Default)]
pub struct MemoryBlobStore {
    blobs: RwLock<BTreeMap<String, Vec<u8>>>,
}

impl MemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.blobs.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.blobs.read().is_empty()
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn write_blob(&self, name: &str, bytes: Vec<u8>) -> CoreResult<()> {
        self.blobs.write().insert(name.to_string(), bytes);
        Ok(())
    }

    async fn read_blob(&self, name: &str) -> CoreResult<Vec<u8>> {
        self.blobs
            .read()
            .get(name)
            .cloned()
            .ok_or_else(|| CoreError::not_found("blob", name))
    }

    async fn list_blobs(&self, suffix: &str) -> CoreResult<Vec<String>> {
        Ok(self
            .blobs
            .read()
            .keys()
            .filter(|k| k.ends_with(suffix))
            .cloned()
            .collect())
    }
}
