//! In-memory audio blob storage.

use std::collections::HashMap;
use std::sync::RwLock;

use tracing::debug;

use tilawa_recitation::ports::{AudioStorage, StorageError};

const BASE_URL: &str = "https://tilawa-storage.example/recitations";

/// Blob store keyed by the url it hands out.
#[derive(Debug, Default)]
pub struct InMemoryAudioStorage {
    blobs: RwLock<HashMap<String, Vec<u8>>>,
}

impl InMemoryAudioStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, url: &str) -> bool {
        self.blobs.read().unwrap().contains_key(url)
    }

    pub fn blob_count(&self) -> usize {
        self.blobs.read().unwrap().len()
    }
}

impl AudioStorage for InMemoryAudioStorage {
    fn upload_audio(&self, bytes: &[u8], filename: &str) -> Result<String, StorageError> {
        let url = format!("{BASE_URL}/{filename}");
        self.blobs
            .write()
            .unwrap()
            .insert(url.clone(), bytes.to_vec());
        debug!(%url, size = bytes.len(), "audio blob stored");
        Ok(url)
    }

    fn delete_audio(&self, url: &str) -> Result<(), StorageError> {
        self.blobs.write().unwrap().remove(url);
        debug!(%url, "audio blob deleted");
        Ok(())
    }
}
