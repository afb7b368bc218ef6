//! Remote catalog seams: document queries and blob storage.
//!
//! The deck only depends on these traits. [`MemoryCatalog`] and
//! [`MemoryBlobStore`] serve previews, offline use and tests.

mod memory;

pub use memory::*;

use std::collections::BTreeSet;

use async_trait::async_trait;
use serde_json::Value;

use crate::errors::AppResult;
use crate::models::Document;

/// Remote collection names.
pub mod collections {
    pub const CHARITIES: &str = "charities";
    pub const DONATIONS: &str = "donations";
    pub const SUPPORTERS: &str = "users";
    pub const CAMPAIGNS: &str = "campaigns";
}

/// Root folder for charity images in blob storage.
pub const IMAGE_ROOT: &str = "charity_images";

/// Blob path for a stored image filename of a charity.
pub fn image_path(entity_id: &str, filename: &str) -> String {
    format!("{}/{}/{}", IMAGE_ROOT, entity_id, filename)
}

/// Query filter understood by the catalog.
#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    /// Every document in the collection
    All,
    /// Documents whose `field` equals `value`
    FieldEquals { field: String, value: Value },
}

impl Filter {
    pub fn field_equals(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Filter::FieldEquals {
            field: field.into(),
            value: value.into(),
        }
    }

    pub fn matches(&self, document: &Document) -> bool {
        match self {
            Filter::All => true,
            Filter::FieldEquals { field, value } => document.fields.get(field) == Some(value),
        }
    }
}

/// Set-like edit of an array field.
#[derive(Debug, Clone, PartialEq)]
pub enum ArrayUpdate {
    /// Append the value unless it is already present
    Union(String),
    /// Remove every occurrence of the value
    Remove(String),
}

/// Document query API of the remote database.
#[async_trait]
pub trait CatalogClient: Send + Sync {
    async fn query_by_filter(&self, collection: &str, filter: &Filter)
        -> AppResult<Vec<Document>>;

    /// Batched fetch of the documents whose IDs are in `ids`. Missing IDs are
    /// simply absent from the result.
    async fn query_by_ids(&self, collection: &str, ids: &BTreeSet<String>)
        -> AppResult<Vec<Document>>;

    /// Edit the array `field` of an existing document. A missing field is
    /// treated as an empty array; a missing document is `NotFound`.
    async fn update_array(
        &self,
        collection: &str,
        id: &str,
        field: &str,
        update: ArrayUpdate,
    ) -> AppResult<()>;
}

/// Byte fetch API of the remote object storage.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Fetch the blob at `path`, failing if it is larger than `max_bytes`.
    async fn fetch(&self, path: &str, max_bytes: usize) -> AppResult<Vec<u8>>;
}
