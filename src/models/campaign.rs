//! Campaign model matching the remote campaign document.

use serde::{Deserialize, Serialize};

use super::DocumentModel;

/// A fundraising campaign run by a charity.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Campaign {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(rename = "charityID")]
    pub charity_id: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub goal: f64,
    #[serde(default)]
    pub donated: f64,
    #[serde(default)]
    pub image_name: String,
}

impl DocumentModel for Campaign {
    fn assign_id(&mut self, id: String) {
        self.id = Some(id);
    }
}
