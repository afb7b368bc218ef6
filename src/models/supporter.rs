//! Supporter model matching the remote user document.

use serde::{Deserialize, Serialize};

use super::DocumentModel;

/// A user who supports a charity.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Supporter {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profile_image_url: Option<String>,
    #[serde(default)]
    pub primary_tags: Vec<String>,
    /// Charities the user saved with a down swipe
    #[serde(rename = "savedCharities", default)]
    pub saved_charity_ids: Vec<String>,
}

impl DocumentModel for Supporter {
    fn assign_id(&mut self, id: String) {
        self.id = Some(id);
    }
}
