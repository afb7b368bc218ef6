//! Remote documents and the typed decode boundary.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::errors::AppError;

/// A raw document returned by the remote catalog: an identity plus its fields.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Document {
    pub id: String,
    #[serde(default)]
    pub fields: Map<String, Value>,
}

impl Document {
    pub fn new(id: impl Into<String>, fields: Value) -> Self {
        let fields = match fields {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        Self {
            id: id.into(),
            fields,
        }
    }

    /// Decode the field map into a typed model and attach the document ID.
    pub fn decode<T: DocumentModel>(&self) -> Result<T, AppError> {
        let mut model: T = serde_json::from_value(Value::Object(self.fields.clone()))
            .map_err(|e| AppError::Decode(format!("Document {}: {}", self.id, e)))?;
        model.assign_id(self.id.clone());
        model.validate()?;
        Ok(model)
    }

    pub fn get_str(&self, field: &str) -> Option<&str> {
        self.fields.get(field).and_then(Value::as_str)
    }
}

/// A model that can be decoded from a [`Document`].
pub trait DocumentModel: DeserializeOwned {
    fn assign_id(&mut self, id: String);

    /// Reject values that decode but violate model invariants.
    fn validate(&self) -> Result<(), AppError> {
        Ok(())
    }
}

/// Decode every document, yielding one tagged result per document.
pub fn decode_documents<T: DocumentModel>(
    documents: &[Document],
) -> Vec<(String, Result<T, AppError>)> {
    documents
        .iter()
        .map(|doc| (doc.id.clone(), doc.decode::<T>()))
        .collect()
}

/// Decode documents, logging and dropping the ones that fail.
pub fn decode_lossy<T: DocumentModel>(documents: &[Document], kind: &str) -> Vec<T> {
    decode_documents::<T>(documents)
        .into_iter()
        .filter_map(|(id, result)| match result {
            Ok(model) => Some(model),
            Err(e) => {
                tracing::warn!("Dropping {} document {}: {}", kind, id, e);
                None
            }
        })
        .collect()
}
