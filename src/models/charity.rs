//! Charity model matching the remote charity document.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::{Campaign, DocumentModel, Donation, Supporter};

/// Resolved image bytes, shared between cache entries and snapshots.
pub type ImageBytes = Arc<[u8]>;

/// Which of a charity's two images a blob belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ImageKind {
    Hero,
    Logo,
}

impl ImageKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ImageKind::Hero => "hero",
            ImageKind::Logo => "logo",
        }
    }
}

/// A charity record plus the data hydrated onto it this session.
///
/// The reference-ID lists are the source of truth. The hydrated lists and image
/// bytes are best-effort resolutions and may be stale or absent.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Charity {
    /// Remote identity; unset until first persisted
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub location: String,
    /// Stored filename of the hero image
    #[serde(rename = "heroImage", default)]
    pub hero_image_name: String,
    /// Stored filename of the logo image
    #[serde(rename = "logoImage", default)]
    pub logo_image_name: String,
    #[serde(default)]
    pub primary_tags: Vec<String>,
    #[serde(default)]
    pub secondary_tags: Vec<String>,
    #[serde(rename = "donationIDs", default)]
    pub donation_ids: Vec<String>,
    #[serde(rename = "donorIDs", default)]
    pub supporter_ids: Vec<String>,
    #[serde(rename = "campaignIDs", default)]
    pub campaign_ids: Vec<String>,

    #[serde(skip)]
    pub donations: Option<Vec<Donation>>,
    #[serde(skip)]
    pub supporters: Option<Vec<Supporter>>,
    #[serde(skip)]
    pub campaigns: Option<Vec<Campaign>>,
    #[serde(skip)]
    pub hero_image: Option<ImageBytes>,
    #[serde(skip)]
    pub logo_image: Option<ImageBytes>,
}

impl Charity {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: Some(id.into()),
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn identity(&self) -> Option<&str> {
        self.id.as_deref()
    }

    /// Stored filename for the given image kind.
    pub fn image_name(&self, kind: ImageKind) -> &str {
        match kind {
            ImageKind::Hero => &self.hero_image_name,
            ImageKind::Logo => &self.logo_image_name,
        }
    }

    pub fn image(&self, kind: ImageKind) -> Option<&ImageBytes> {
        match kind {
            ImageKind::Hero => self.hero_image.as_ref(),
            ImageKind::Logo => self.logo_image.as_ref(),
        }
    }

    /// Return a copy carrying the given image bytes.
    pub fn with_image(mut self, kind: ImageKind, bytes: Option<ImageBytes>) -> Self {
        match kind {
            ImageKind::Hero => self.hero_image = bytes,
            ImageKind::Logo => self.logo_image = bytes,
        }
        self
    }

    pub fn is_hydrated(&self) -> bool {
        self.donations.is_some() && self.supporters.is_some() && self.campaigns.is_some()
    }
}

impl PartialEq for Charity {
    /// Equality over stored fields only; hydrated data is ignored.
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
            && self.name == other.name
            && self.description == other.description
            && self.location == other.location
            && self.hero_image_name == other.hero_image_name
            && self.logo_image_name == other.logo_image_name
            && self.primary_tags == other.primary_tags
            && self.secondary_tags == other.secondary_tags
            && self.donation_ids == other.donation_ids
            && self.supporter_ids == other.supporter_ids
            && self.campaign_ids == other.campaign_ids
    }
}

impl DocumentModel for Charity {
    fn assign_id(&mut self, id: String) {
        self.id = Some(id);
    }
}
