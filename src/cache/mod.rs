//! Session-scoped entity cache.
//!
//! Holds the most complete version of every charity seen this session plus the
//! resolved image blobs. Memory only; cleared on sign-out.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;

use crate::merge;
use crate::models::{Charity, ImageBytes, ImageKind};

/// Composite key for a resolved image blob.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BlobKey {
    pub kind: ImageKind,
    pub entity_id: String,
}

impl BlobKey {
    pub fn new(kind: ImageKind, entity_id: impl Into<String>) -> Self {
        Self {
            kind,
            entity_id: entity_id.into(),
        }
    }
}

impl std::fmt::Display for BlobKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}_{}", self.kind.as_str(), self.entity_id)
    }
}

/// Shared key→entity store and blob store.
#[derive(Default)]
pub struct EntityCache {
    charities: RwLock<HashMap<String, Arc<Charity>>>,
    blobs: RwLock<HashMap<BlobKey, ImageBytes>>,
}

impl EntityCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get(&self, id: &str) -> Option<Arc<Charity>> {
        self.charities.read().await.get(id).cloned()
    }

    /// Overwrite unconditionally. Callers apply the merge policy first.
    pub async fn put(&self, id: impl Into<String>, entity: Arc<Charity>) {
        self.charities.write().await.insert(id.into(), entity);
    }

    /// Store `candidate` if absent, otherwise keep whichever version the merge
    /// policy selects. Read, decide and store happen under one write lock.
    pub async fn get_or_merge(&self, id: &str, candidate: Charity) -> Arc<Charity> {
        let mut charities = self.charities.write().await;
        if let Some(existing) = charities.get(id) {
            if !merge::supersedes(&candidate, existing) {
                tracing::trace!("Cache kept existing version of {}", id);
                return Arc::clone(existing);
            }
            tracing::debug!("Cache superseded {} with newer data", id);
        }
        let entity = Arc::new(candidate);
        charities.insert(id.to_string(), Arc::clone(&entity));
        entity
    }

    pub async fn get_blob(&self, key: &BlobKey) -> Option<ImageBytes> {
        self.blobs.read().await.get(key).cloned()
    }

    pub async fn put_blob(&self, key: BlobKey, bytes: ImageBytes) {
        self.blobs.write().await.insert(key, bytes);
    }

    pub async fn len(&self) -> usize {
        self.charities.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.charities.read().await.is_empty()
    }

    /// Approximate footprint of cached text and image bytes.
    pub async fn approximate_size(&self) -> usize {
        let charities = self.charities.read().await;
        let text: usize = charities
            .iter()
            .map(|(key, c)| {
                key.len()
                    + c.name.len()
                    + c.description.len()
                    + c.hero_image_name.len()
                    + c.logo_image_name.len()
                    + c.hero_image.as_ref().map_or(0, |b| b.len())
                    + c.logo_image.as_ref().map_or(0, |b| b.len())
            })
            .sum();
        let blobs: usize = self.blobs.read().await.values().map(|b| b.len()).sum();
        text + blobs
    }

    /// Drop everything. Called on sign-out.
    pub async fn reset(&self) {
        let mut charities = self.charities.write().await;
        let mut blobs = self.blobs.write().await;
        tracing::info!(
            "Resetting entity cache ({} charities, {} blobs)",
            charities.len(),
            blobs.len()
        );
        charities.clear();
        blobs.clear();
    }
}
