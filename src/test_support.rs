//! Shared fixtures for unit and flow tests.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::json;
use tokio::sync::Notify;

use crate::assembler::RecordAssembler;
use crate::cache::EntityCache;
use crate::catalog::{image_path, MemoryBlobStore, MemoryCatalog};
use crate::errors::{AppError, AppResult};
use crate::gateway::{ReactionEvent, RecommendationGateway};
use crate::models::Document;

/// Gateway that replays scripted `next_n` replies and records every call.
///
/// Once the script runs out every call answers with an empty list.
#[derive(Default)]
pub struct ScriptedGateway {
    replies: Mutex<VecDeque<AppResult<Vec<String>>>>,
    requests: Mutex<Vec<(String, usize)>>,
    reactions: Mutex<Vec<ReactionEvent>>,
    logins: Mutex<Vec<String>>,
    logouts: Mutex<Vec<String>>,
    hold: AtomicBool,
    pub entered: Notify,
    release: Notify,
}

impl ScriptedGateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_replies<I, S>(replies: I) -> Self
    where
        I: IntoIterator<Item = Vec<S>>,
        S: Into<String>,
    {
        let gateway = Self::new();
        for reply in replies {
            gateway.push_reply(reply);
        }
        gateway
    }

    pub fn push_reply<S: Into<String>>(&self, ids: Vec<S>) {
        let ids = ids.into_iter().map(Into::into).collect();
        self.replies.lock().unwrap().push_back(Ok(ids));
    }

    pub fn push_error(&self, err: AppError) {
        self.replies.lock().unwrap().push_back(Err(err));
    }

    /// Park the next `next_n` call until [`release`](Self::release).
    /// `entered` is notified once the call is parked.
    pub fn hold_next_call(&self) {
        self.hold.store(true, Ordering::SeqCst);
    }

    pub fn release(&self) {
        self.release.notify_one();
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    /// The `n` of every `next_n` call, in order.
    pub fn requested_counts(&self) -> Vec<usize> {
        self.requests.lock().unwrap().iter().map(|(_, n)| *n).collect()
    }

    pub fn reactions(&self) -> Vec<ReactionEvent> {
        self.reactions.lock().unwrap().clone()
    }

    pub fn logins(&self) -> Vec<String> {
        self.logins.lock().unwrap().clone()
    }

    pub fn logouts(&self) -> Vec<String> {
        self.logouts.lock().unwrap().clone()
    }
}

#[async_trait]
impl RecommendationGateway for ScriptedGateway {
    async fn next_n(&self, user_id: &str, n: usize) -> AppResult<Vec<String>> {
        self.requests.lock().unwrap().push((user_id.to_string(), n));
        if self.hold.swap(false, Ordering::SeqCst) {
            self.entered.notify_one();
            self.release.notified().await;
        }
        let reply = self.replies.lock().unwrap().pop_front();
        reply.unwrap_or_else(|| Ok(Vec::new()))
    }

    async fn submit_reaction(&self, event: &ReactionEvent) -> AppResult<()> {
        self.reactions.lock().unwrap().push(event.clone());
        Ok(())
    }

    async fn log_on(&self, user_id: &str) -> AppResult<()> {
        self.logins.lock().unwrap().push(user_id.to_string());
        Ok(())
    }

    async fn log_off(&self, user_id: &str) -> AppResult<()> {
        self.logouts.lock().unwrap().push(user_id.to_string());
        Ok(())
    }
}

/// Catalog, blob store and cache wired to one assembler.
pub struct Backend {
    pub catalog: Arc<MemoryCatalog>,
    pub blobs: Arc<MemoryBlobStore>,
    pub cache: Arc<EntityCache>,
    pub assembler: Arc<RecordAssembler>,
}

impl Backend {
    pub fn new() -> Self {
        let catalog = Arc::new(MemoryCatalog::new());
        let blobs = Arc::new(MemoryBlobStore::new());
        let cache = Arc::new(EntityCache::new());
        let assembler = Arc::new(RecordAssembler::new(
            catalog.clone(),
            blobs.clone(),
            cache.clone(),
            1024,
        ));
        Self {
            catalog,
            blobs,
            cache,
            assembler,
        }
    }

    /// Seed one charity with images, a donation and a campaign per ID.
    pub async fn seed_charities(&self, ids: &[&str]) {
        for id in ids {
            let donation_id = format!("{}-d1", id);
            let campaign_id = format!("{}-camp", id);
            self.catalog
                .insert(
                    "charities",
                    Document::new(
                        *id,
                        json!({
                            "name": format!("Charity {}", id),
                            "description": format!("About {}", id),
                            "location": "New York, NY",
                            "heroImage": "hero.jpg",
                            "logoImage": "logo.jpg",
                            "primaryTags": ["Community"],
                            "donationIDs": [donation_id],
                            "donorIDs": [],
                            "campaignIDs": [campaign_id],
                        }),
                    ),
                )
                .await;
            self.catalog
                .insert(
                    "donations",
                    Document::new(
                        donation_id,
                        json!({ "charityID": id, "userID": "u1", "amount": 20 }),
                    ),
                )
                .await;
            self.catalog
                .insert(
                    "campaigns",
                    Document::new(
                        campaign_id,
                        json!({
                            "charityID": id,
                            "title": "Winter drive",
                            "goal": 1000,
                            "donated": 250
                        }),
                    ),
                )
                .await;
            self.blobs
                .insert(image_path(id, "hero.jpg"), vec![0xff, 0xd8, 1])
                .await;
            self.blobs
                .insert(image_path(id, "logo.jpg"), vec![0xff, 0xd8, 2])
                .await;
        }
    }
}
