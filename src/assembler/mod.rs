//! Record assembly: turns charity documents into hydrated entities.
//!
//! Every operation here degrades instead of failing. A sub-resolution that
//! errors yields an empty list, an image that cannot be fetched yields `None`,
//! and documents that do not decode are dropped from their batch.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use crate::cache::{BlobKey, EntityCache};
use crate::catalog::{collections, image_path, ArrayUpdate, BlobStore, CatalogClient, Filter};
use crate::errors::AppResult;
use crate::models::{
    decode_lossy, Campaign, Charity, DocumentModel, Donation, DonationDisplay, ImageBytes,
    ImageKind, Supporter,
};

/// Field on a user document listing saved charity IDs.
const SAVED_FIELD: &str = "savedCharities";

/// Resolves charities and their referenced sub-entities from the remote catalog.
pub struct RecordAssembler {
    catalog: Arc<dyn CatalogClient>,
    blobs: Arc<dyn BlobStore>,
    cache: Arc<EntityCache>,
    max_image_bytes: usize,
}

impl RecordAssembler {
    pub fn new(
        catalog: Arc<dyn CatalogClient>,
        blobs: Arc<dyn BlobStore>,
        cache: Arc<EntityCache>,
        max_image_bytes: usize,
    ) -> Self {
        Self {
            catalog,
            blobs,
            cache,
            max_image_bytes,
        }
    }

    pub fn cache(&self) -> &Arc<EntityCache> {
        &self.cache
    }

    /// Resolve donations, supporters and campaigns concurrently and attach them.
    pub async fn hydrate(&self, base: Charity) -> Charity {
        let (donations, supporters, campaigns) = tokio::join!(
            self.resolve::<Donation>(collections::DONATIONS, &base.donation_ids),
            self.resolve::<Supporter>(collections::SUPPORTERS, &base.supporter_ids),
            self.resolve::<Campaign>(collections::CAMPAIGNS, &base.campaign_ids),
        );

        tracing::debug!(
            "Hydrated {}: {} donations, {} supporters, {} campaigns",
            base.name,
            donations.len(),
            supporters.len(),
            campaigns.len()
        );

        Charity {
            donations: Some(donations),
            supporters: Some(supporters),
            campaigns: Some(campaigns),
            ..base
        }
    }

    async fn resolve<T: DocumentModel + Send>(&self, collection: &str, ids: &[String]) -> Vec<T> {
        if ids.is_empty() {
            return Vec::new();
        }
        let id_set: BTreeSet<String> = ids.iter().cloned().collect();
        match self.catalog.query_by_ids(collection, &id_set).await {
            Ok(documents) => decode_lossy(&documents, collection),
            Err(e) => {
                tracing::warn!("Failed to resolve {} ({} ids): {}", collection, ids.len(), e);
                Vec::new()
            }
        }
    }

    /// Fetch one image for a charity, consulting the blob cache first.
    pub async fn resolve_image(&self, entity: &Charity, kind: ImageKind) -> Option<ImageBytes> {
        let id = entity.identity()?;
        let filename = entity.image_name(kind);
        if filename.is_empty() {
            tracing::debug!("{} has no {} image", entity.name, kind.as_str());
            return None;
        }

        let key = BlobKey::new(kind, id);
        if let Some(bytes) = self.cache.get_blob(&key).await {
            return Some(bytes);
        }

        let path = image_path(id, filename);
        match self.blobs.fetch(&path, self.max_image_bytes).await {
            Ok(bytes) => {
                let bytes: ImageBytes = Arc::from(bytes);
                self.cache.put_blob(key, Arc::clone(&bytes)).await;
                Some(bytes)
            }
            Err(e) => {
                tracing::warn!(
                    "Error fetching {} image for {}: {}",
                    kind.as_str(),
                    entity.name,
                    e
                );
                None
            }
        }
    }

    /// Resolve both images concurrently. Bytes already on the entity are kept
    /// when a fetch fails.
    pub async fn fetch_images(&self, entity: Charity) -> Charity {
        let (hero, logo) = tokio::join!(
            self.resolve_image(&entity, ImageKind::Hero),
            self.resolve_image(&entity, ImageKind::Logo),
        );
        let hero = hero.or_else(|| entity.hero_image.clone());
        let logo = logo.or_else(|| entity.logo_image.clone());
        entity
            .with_image(ImageKind::Hero, hero)
            .with_image(ImageKind::Logo, logo)
    }

    /// Hydrate sub-entities and images together.
    pub async fn assemble(&self, base: Charity) -> Charity {
        let hydrated = self.hydrate(base).await;
        self.fetch_images(hydrated).await
    }

    /// Decode the charity records for `ids` without touching the cache.
    pub async fn fetch_records(&self, ids: &[String]) -> AppResult<Vec<Charity>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let id_set: BTreeSet<String> = ids.iter().cloned().collect();
        let documents = self
            .catalog
            .query_by_ids(collections::CHARITIES, &id_set)
            .await?;
        Ok(decode_lossy(&documents, collections::CHARITIES))
    }

    /// Decode the full charity listing without touching the cache.
    pub async fn fetch_all_records(&self) -> AppResult<Vec<Charity>> {
        let documents = self
            .catalog
            .query_by_filter(collections::CHARITIES, &Filter::All)
            .await?;
        Ok(decode_lossy(&documents, collections::CHARITIES))
    }

    /// Fetch charities by ID and reconcile each with the cache.
    pub async fn fetch_by_ids(&self, ids: &[String]) -> Vec<Arc<Charity>> {
        match self.fetch_records(ids).await {
            Ok(records) => self.reconcile(records).await,
            Err(e) => {
                tracing::warn!("Failed to fetch charity details: {}", e);
                Vec::new()
            }
        }
    }

    /// Fetch the whole catalog and reconcile each record with the cache.
    pub async fn fetch_all(&self) -> Vec<Arc<Charity>> {
        match self.fetch_all_records().await {
            Ok(records) => {
                let charities = self.reconcile(records).await;
                tracing::info!("Fetched {} charities", charities.len());
                charities
            }
            Err(e) => {
                tracing::warn!("Error fetching charities: {}", e);
                Vec::new()
            }
        }
    }

    async fn reconcile(&self, records: Vec<Charity>) -> Vec<Arc<Charity>> {
        let mut reconciled = Vec::with_capacity(records.len());
        for record in records {
            let Some(id) = record.id.clone() else {
                tracing::warn!("Charity {} has no ID, skipping", record.name);
                continue;
            };
            reconciled.push(self.cache.get_or_merge(&id, record).await);
        }
        reconciled
    }

    /// Add a charity to the user's saved list.
    pub async fn save_charity(&self, user_id: &str, charity_id: &str) -> AppResult<()> {
        self.update_saved(user_id, ArrayUpdate::Union(charity_id.to_string()))
            .await?;
        tracing::info!("Saved charity {} for {}", charity_id, user_id);
        Ok(())
    }

    /// Remove a charity from the user's saved list.
    pub async fn unsave_charity(&self, user_id: &str, charity_id: &str) -> AppResult<()> {
        self.update_saved(user_id, ArrayUpdate::Remove(charity_id.to_string()))
            .await?;
        tracing::info!("Removed saved charity {} for {}", charity_id, user_id);
        Ok(())
    }

    async fn update_saved(&self, user_id: &str, update: ArrayUpdate) -> AppResult<()> {
        self.catalog
            .update_array(collections::SUPPORTERS, user_id, SAVED_FIELD, update)
            .await
    }

    /// IDs on the user's saved list, in saved order. A user with no document
    /// has nothing saved.
    pub async fn saved_charity_ids(&self, user_id: &str) -> AppResult<Vec<String>> {
        let ids = BTreeSet::from([user_id.to_string()]);
        let documents = self
            .catalog
            .query_by_ids(collections::SUPPORTERS, &ids)
            .await?;
        match documents.first() {
            Some(document) => {
                let user: Supporter = document.decode()?;
                Ok(user.saved_charity_ids)
            }
            None => Ok(Vec::new()),
        }
    }

    /// Resolve the user's saved charities, cache first.
    ///
    /// Cached entries missing an image get their images fetched; IDs not in the
    /// cache are fetched in one batch. Everything resolved is reconciled
    /// through the cache. IDs that resolve to nothing are left out.
    pub async fn saved_charities(&self, user_id: &str) -> Vec<Arc<Charity>> {
        let ids = match self.saved_charity_ids(user_id).await {
            Ok(ids) => ids,
            Err(e) => {
                tracing::warn!("Failed to fetch saved charities for {}: {}", user_id, e);
                return Vec::new();
            }
        };

        let mut resolved: HashMap<String, Arc<Charity>> = HashMap::new();
        let mut missing = Vec::new();
        for id in &ids {
            match self.cache.get(id).await {
                Some(cached) if cached.hero_image.is_some() && cached.logo_image.is_some() => {
                    resolved.insert(id.clone(), cached);
                }
                Some(cached) => {
                    let updated = self.fetch_images(Charity::clone(&cached)).await;
                    resolved.insert(id.clone(), self.cache.get_or_merge(id, updated).await);
                }
                None => missing.push(id.clone()),
            }
        }

        if !missing.is_empty() {
            tracing::debug!("Fetching {} saved charities not in cache", missing.len());
            for fetched in self.fetch_by_ids(&missing).await {
                let Some(id) = fetched.id.clone() else {
                    continue;
                };
                let updated = self.fetch_images(Charity::clone(&fetched)).await;
                resolved.insert(id.clone(), self.cache.get_or_merge(&id, updated).await);
            }
        }

        ids.iter().filter_map(|id| resolved.remove(id)).collect()
    }

    /// Donations made to a charity.
    pub async fn donations_for_charity(&self, charity_id: &str) -> Vec<Donation> {
        self.donations_where("charityID", charity_id).await
    }

    /// Donations made by a user.
    pub async fn donations_for_user(&self, user_id: &str) -> Vec<Donation> {
        self.donations_where("userID", user_id).await
    }

    async fn donations_where(&self, field: &str, value: &str) -> Vec<Donation> {
        let filter = Filter::field_equals(field, value);
        match self
            .catalog
            .query_by_filter(collections::DONATIONS, &filter)
            .await
        {
            Ok(documents) => decode_lossy(&documents, collections::DONATIONS),
            Err(e) => {
                tracing::warn!("Error fetching donations where {} = {}: {}", field, value, e);
                Vec::new()
            }
        }
    }

    /// Join donations with cached charity details for display.
    pub async fn donation_displays(&self, donations: &[Donation]) -> Vec<DonationDisplay> {
        let mut displays = Vec::with_capacity(donations.len());
        for donation in donations {
            let charity = self.cache.get(&donation.charity_id).await;
            displays.push(DonationDisplay {
                id: donation
                    .id
                    .clone()
                    .unwrap_or_else(|| uuid::Uuid::new_v4().to_string()),
                charity_name: charity
                    .as_ref()
                    .map(|c| c.name.clone())
                    .unwrap_or_else(|| "Unknown Charity".to_string()),
                charity_description: charity
                    .as_ref()
                    .map(|c| c.description.clone())
                    .unwrap_or_default(),
                amount: donation.amount,
            });
        }
        displays
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{MemoryBlobStore, MemoryCatalog};
    use crate::models::Document;
    use serde_json::json;

    struct Fixture {
        catalog: Arc<MemoryCatalog>,
        blobs: Arc<MemoryBlobStore>,
        cache: Arc<EntityCache>,
        assembler: RecordAssembler,
    }

    fn fixture() -> Fixture {
        let catalog = Arc::new(MemoryCatalog::new());
        let blobs = Arc::new(MemoryBlobStore::new());
        let cache = Arc::new(EntityCache::new());
        let assembler = RecordAssembler::new(catalog.clone(), blobs.clone(), cache.clone(), 64);
        Fixture {
            catalog,
            blobs,
            cache,
            assembler,
        }
    }

    fn base() -> Charity {
        let mut c = Charity::new("c1", "Food Bank");
        c.hero_image_name = "hero.jpg".to_string();
        c.logo_image_name = "logo.jpg".to_string();
        c.donation_ids = vec!["d1".to_string(), "d2".to_string(), "d3".to_string()];
        c.supporter_ids = vec!["u1".to_string()];
        c
    }

    async fn seed_sub_entities(catalog: &MemoryCatalog) {
        catalog
            .insert(
                "donations",
                Document::new("d1", json!({ "charityID": "c1", "userID": "u1", "amount": 10 })),
            )
            .await;
        catalog
            .insert(
                "donations",
                Document::new("d2", json!({ "charityID": "c1", "amount": "lots" })),
            )
            .await;
        catalog
            .insert(
                "donations",
                Document::new("d3", json!({ "charityID": "c1", "userID": "u2", "amount": 2.5 })),
            )
            .await;
        catalog
            .insert(
                "users",
                Document::new("u1", json!({ "name": "Alice", "email": "alice@example.com" })),
            )
            .await;
    }

    #[tokio::test]
    async fn test_hydrate_resolves_all_lists() {
        let f = fixture();
        seed_sub_entities(&f.catalog).await;

        let charity = f.assembler.hydrate(base()).await;

        let donations = charity.donations.as_ref().unwrap();
        let ids: Vec<_> = donations.iter().filter_map(|d| d.id.as_deref()).collect();
        assert_eq!(ids, vec!["d1", "d3"]);
        assert_eq!(charity.supporters.as_ref().unwrap()[0].name, "Alice");
        assert!(charity.campaigns.as_ref().unwrap().is_empty());
        assert!(charity.is_hydrated());
        // Empty campaign list: no query issued for it.
        assert_eq!(f.catalog.id_query_count(), 2);
    }

    #[tokio::test]
    async fn test_failed_sub_resolution_degrades_to_empty() {
        let f = fixture();
        seed_sub_entities(&f.catalog).await;
        f.catalog.set_failing("donations", true).await;

        let charity = f.assembler.hydrate(base()).await;

        assert!(charity.donations.as_ref().unwrap().is_empty());
        assert_eq!(charity.supporters.as_ref().unwrap().len(), 1);
        assert_eq!(charity.donation_ids.len(), 3);
    }

    #[tokio::test]
    async fn test_resolve_image_uses_blob_cache() {
        let f = fixture();
        f.blobs
            .insert("charity_images/c1/hero.jpg", vec![1, 2, 3])
            .await;

        let first = f.assembler.resolve_image(&base(), ImageKind::Hero).await;
        let second = f.assembler.resolve_image(&base(), ImageKind::Hero).await;

        assert_eq!(first.as_deref(), Some(&[1u8, 2, 3][..]));
        assert_eq!(second.as_deref(), Some(&[1u8, 2, 3][..]));
        assert_eq!(f.blobs.fetch_count(), 1);
        assert!(f
            .cache
            .get_blob(&BlobKey::new(ImageKind::Hero, "c1"))
            .await
            .is_some());
    }

    #[tokio::test]
    async fn test_resolve_image_failures_return_none() {
        let f = fixture();
        f.blobs
            .insert("charity_images/c1/logo.jpg", vec![0u8; 65])
            .await;

        assert!(f.assembler.resolve_image(&base(), ImageKind::Logo).await.is_none());
        assert!(f.assembler.resolve_image(&base(), ImageKind::Hero).await.is_none());

        let mut unnamed = base();
        unnamed.id = None;
        assert!(f.assembler.resolve_image(&unnamed, ImageKind::Hero).await.is_none());
        assert_eq!(f.blobs.fetch_count(), 2);
    }

    #[tokio::test]
    async fn test_fetch_images_keeps_existing_bytes_on_failure() {
        let f = fixture();
        f.blobs
            .insert("charity_images/c1/hero.jpg", vec![7u8])
            .await;
        let existing_logo: ImageBytes = Arc::from(vec![9u8]);
        let entity = base().with_image(ImageKind::Logo, Some(existing_logo.clone()));

        let updated = f.assembler.fetch_images(entity).await;

        assert_eq!(updated.hero_image.as_deref(), Some(&[7u8][..]));
        assert_eq!(updated.logo_image, Some(existing_logo));
    }

    #[tokio::test]
    async fn test_fetch_all_reconciles_with_cache() {
        let f = fixture();
        f.catalog
            .insert("charities", Document::new("c1", json!({ "name": "One" })))
            .await;
        f.catalog
            .insert("charities", Document::new("c2", json!({ "description": "no name" })))
            .await;
        let cached = Arc::new(
            Charity::new("c1", "One").with_image(ImageKind::Hero, Some(Arc::from(vec![1u8]))),
        );
        f.cache.put("c1", cached.clone()).await;

        let all = f.assembler.fetch_all().await;

        assert_eq!(all.len(), 1);
        assert!(Arc::ptr_eq(&all[0], &cached));
    }

    #[tokio::test]
    async fn test_fetch_by_ids_error_is_empty() {
        let f = fixture();
        f.catalog.set_failing("charities", true).await;
        assert!(f.assembler.fetch_by_ids(&["c1".to_string()]).await.is_empty());
        assert!(f.assembler.fetch_records(&[]).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_donation_displays_join_cached_charities() {
        let f = fixture();
        seed_sub_entities(&f.catalog).await;
        let mut known = Charity::new("c1", "Food Bank");
        known.description = "Feeds people".to_string();
        f.cache.put("c1", Arc::new(known)).await;

        let mut donations = f.assembler.donations_for_charity("c1").await;
        assert_eq!(donations.len(), 2);
        donations.push(Donation {
            id: None,
            charity_id: "gone".to_string(),
            contributor_id: "u9".to_string(),
            amount: 1.0,
            created_at: None,
        });

        let displays = f.assembler.donation_displays(&donations).await;
        assert_eq!(displays[0].charity_name, "Food Bank");
        assert_eq!(displays[0].charity_description, "Feeds people");
        assert_eq!(displays[2].charity_name, "Unknown Charity");
        assert!(!displays[2].id.is_empty());

        let by_user = f.assembler.donations_for_user("u2").await;
        assert_eq!(by_user.len(), 1);
        assert_eq!(by_user[0].amount, 2.5);
    }

    async fn seed_saved(f: &Fixture, saved: &[&str]) {
        f.catalog
            .insert(
                "users",
                Document::new("u1", json!({ "name": "Alice", "savedCharities": saved })),
            )
            .await;
    }

    #[tokio::test]
    async fn test_saved_charities_served_from_cache() {
        let f = fixture();
        seed_saved(&f, &["c1"]).await;
        let complete = Arc::new(
            base()
                .with_image(ImageKind::Hero, Some(Arc::from(vec![1u8])))
                .with_image(ImageKind::Logo, Some(Arc::from(vec![2u8]))),
        );
        f.cache.put("c1", complete.clone()).await;

        let saved = f.assembler.saved_charities("u1").await;

        assert_eq!(saved.len(), 1);
        assert!(Arc::ptr_eq(&saved[0], &complete));
        assert_eq!(f.blobs.fetch_count(), 0);
        // Only the user document was read.
        assert_eq!(f.catalog.id_query_count(), 1);
    }

    #[tokio::test]
    async fn test_saved_cached_entry_gets_missing_images() {
        let f = fixture();
        seed_saved(&f, &["c1"]).await;
        f.blobs
            .insert("charity_images/c1/hero.jpg", vec![7u8])
            .await;
        f.blobs
            .insert("charity_images/c1/logo.jpg", vec![8u8])
            .await;
        f.cache.put("c1", Arc::new(base())).await;

        let saved = f.assembler.saved_charities("u1").await;

        assert_eq!(saved[0].hero_image.as_deref(), Some(&[7u8][..]));
        assert_eq!(saved[0].logo_image.as_deref(), Some(&[8u8][..]));
        assert!(f.cache.get("c1").await.unwrap().hero_image.is_some());
        assert_eq!(f.catalog.id_query_count(), 1);
    }

    #[tokio::test]
    async fn test_saved_cache_misses_are_fetched_in_order() {
        let f = fixture();
        seed_saved(&f, &["c2", "gone", "c1"]).await;
        f.catalog
            .insert(
                "charities",
                Document::new("c2", json!({ "name": "Two", "heroImage": "hero.jpg" })),
            )
            .await;
        f.blobs
            .insert("charity_images/c2/hero.jpg", vec![5u8])
            .await;
        let cached = Arc::new(
            base()
                .with_image(ImageKind::Hero, Some(Arc::from(vec![1u8])))
                .with_image(ImageKind::Logo, Some(Arc::from(vec![2u8]))),
        );
        f.cache.put("c1", cached).await;

        let saved = f.assembler.saved_charities("u1").await;

        let ids: Vec<_> = saved.iter().filter_map(|c| c.identity()).collect();
        assert_eq!(ids, vec!["c2", "c1"]);
        assert_eq!(saved[0].hero_image.as_deref(), Some(&[5u8][..]));
        assert!(f.cache.get("c2").await.is_some());
        // User document plus one batch for the misses.
        assert_eq!(f.catalog.id_query_count(), 2);
    }

    #[tokio::test]
    async fn test_save_and_unsave_update_the_user_document() {
        let f = fixture();
        seed_saved(&f, &[]).await;

        f.assembler.save_charity("u1", "c1").await.unwrap();
        f.assembler.save_charity("u1", "c2").await.unwrap();
        f.assembler.save_charity("u1", "c1").await.unwrap();
        assert_eq!(f.assembler.saved_charity_ids("u1").await.unwrap(), vec!["c1", "c2"]);

        f.assembler.unsave_charity("u1", "c1").await.unwrap();
        assert_eq!(f.assembler.saved_charity_ids("u1").await.unwrap(), vec!["c2"]);

        assert!(f.assembler.save_charity("nobody", "c1").await.is_err());
        assert!(f.assembler.saved_charity_ids("nobody").await.unwrap().is_empty());
        assert!(f.assembler.saved_charities("nobody").await.is_empty());
    }
}
