//! In-memory catalog and blob store.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use tokio::sync::RwLock;

use serde_json::Value;

use super::{ArrayUpdate, BlobStore, CatalogClient, Filter};
use crate::errors::{AppError, AppResult};
use crate::models::Document;

/// Document collections held in memory, in insertion order.
#[derive(Default)]
pub struct MemoryCatalog {
    collections: RwLock<HashMap<String, Vec<Document>>>,
    failing: RwLock<HashSet<String>>,
    filter_queries: AtomicUsize,
    id_queries: AtomicUsize,
}

impl MemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a document.
    pub async fn insert(&self, collection: &str, document: Document) {
        let mut collections = self.collections.write().await;
        let docs = collections.entry(collection.to_string()).or_default();
        match docs.iter_mut().find(|d| d.id == document.id) {
            Some(existing) => *existing = document,
            None => docs.push(document),
        }
    }

    pub async fn remove(&self, collection: &str, id: &str) {
        if let Some(docs) = self.collections.write().await.get_mut(collection) {
            docs.retain(|d| d.id != id);
        }
    }

    /// Make every query against `collection` fail until cleared.
    pub async fn set_failing(&self, collection: &str, failing: bool) {
        let mut set = self.failing.write().await;
        if failing {
            set.insert(collection.to_string());
        } else {
            set.remove(collection);
        }
    }

    pub fn filter_query_count(&self) -> usize {
        self.filter_queries.load(Ordering::SeqCst)
    }

    pub fn id_query_count(&self) -> usize {
        self.id_queries.load(Ordering::SeqCst)
    }

    async fn check_available(&self, collection: &str) -> AppResult<()> {
        if self.failing.read().await.contains(collection) {
            return Err(AppError::Network(format!(
                "Collection {} is unavailable",
                collection
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl CatalogClient for MemoryCatalog {
    async fn query_by_filter(
        &self,
        collection: &str,
        filter: &Filter,
    ) -> AppResult<Vec<Document>> {
        self.filter_queries.fetch_add(1, Ordering::SeqCst);
        self.check_available(collection).await?;
        let collections = self.collections.read().await;
        Ok(collections
            .get(collection)
            .map(|docs| docs.iter().filter(|d| filter.matches(d)).cloned().collect())
            .unwrap_or_default())
    }

    async fn query_by_ids(
        &self,
        collection: &str,
        ids: &BTreeSet<String>,
    ) -> AppResult<Vec<Document>> {
        self.id_queries.fetch_add(1, Ordering::SeqCst);
        self.check_available(collection).await?;
        let collections = self.collections.read().await;
        Ok(collections
            .get(collection)
            .map(|docs| docs.iter().filter(|d| ids.contains(&d.id)).cloned().collect())
            .unwrap_or_default())
    }

    async fn update_array(
        &self,
        collection: &str,
        id: &str,
        field: &str,
        update: ArrayUpdate,
    ) -> AppResult<()> {
        self.check_available(collection).await?;
        let mut collections = self.collections.write().await;
        let document = collections
            .get_mut(collection)
            .and_then(|docs| docs.iter_mut().find(|d| d.id == id))
            .ok_or_else(|| {
                AppError::NotFound(format!("Document {}/{} not found", collection, id))
            })?;

        let entry = document
            .fields
            .entry(field.to_string())
            .or_insert_with(|| Value::Array(Vec::new()));
        let Value::Array(values) = entry else {
            return Err(AppError::Decode(format!(
                "Field {} of {}/{} is not an array",
                field, collection, id
            )));
        };

        match update {
            ArrayUpdate::Union(value) => {
                if !values.iter().any(|v| v.as_str() == Some(value.as_str())) {
                    values.push(Value::String(value));
                }
            }
            ArrayUpdate::Remove(value) => {
                values.retain(|v| v.as_str() != Some(value.as_str()));
            }
        }
        Ok(())
    }
}

/// Blobs held in memory, keyed by path.
#[derive(Default)]
pub struct MemoryBlobStore {
    blobs: RwLock<HashMap<String, Vec<u8>>>,
    fetches: AtomicUsize,
    failing: AtomicBool,
}

impl MemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert(&self, path: impl Into<String>, bytes: Vec<u8>) {
        self.blobs.write().await.insert(path.into(), bytes);
    }

    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }

    /// Make every fetch fail with a storage error until cleared.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn fetch(&self, path: &str, max_bytes: usize) -> AppResult<Vec<u8>> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        if self.failing.load(Ordering::SeqCst) {
            return Err(AppError::Storage(format!("Blob storage unavailable for {}", path)));
        }
        let blobs = self.blobs.read().await;
        let bytes = blobs
            .get(path)
            .ok_or_else(|| AppError::NotFound(format!("Blob {} not found", path)))?;
        if bytes.len() > max_bytes {
            return Err(AppError::ImageTooLarge {
                size: bytes.len(),
                limit: max_bytes,
            });
        }
        Ok(bytes.clone())
    }
}
