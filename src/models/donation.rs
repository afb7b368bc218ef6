//! Donation model matching the remote donation document.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::DocumentModel;
use crate::errors::AppError;

/// A donation made to a charity. Immutable once created.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Donation {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(rename = "charityID")]
    pub charity_id: String,
    #[serde(rename = "userID")]
    pub contributor_id: String,
    pub amount: f64,
    /// Server-assigned creation time
    #[serde(rename = "createdAt", default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

impl DocumentModel for Donation {
    fn assign_id(&mut self, id: String) {
        self.id = Some(id);
    }

    fn validate(&self) -> Result<(), AppError> {
        if !self.amount.is_finite() || self.amount < 0.0 {
            return Err(AppError::Decode(format!(
                "Donation amount must be non-negative, got {}",
                self.amount
            )));
        }
        Ok(())
    }
}

/// Donation joined with its charity for display in donation history.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DonationDisplay {
    pub id: String,
    pub charity_name: String,
    pub charity_description: String,
    pub amount: f64,
}
