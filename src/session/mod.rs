//! Session-scoped context.
//!
//! Owns the entity cache for one signed-in lifetime and hands it explicitly to
//! the assembler and to every deck built from the session.

use std::sync::Arc;

use tokio::sync::RwLock;

use crate::assembler::RecordAssembler;
use crate::cache::EntityCache;
use crate::catalog::{BlobStore, CatalogClient};
use crate::config::Config;
use crate::deck::{DeckCoordinator, DeckOptions};
use crate::errors::{AppError, AppResult};
use crate::gateway::{HttpGateway, RecommendationGateway};
use crate::models::Charity;

/// Shared state for one user session.
pub struct Session {
    config: Config,
    cache: Arc<EntityCache>,
    assembler: Arc<RecordAssembler>,
    gateway: Option<Arc<dyn RecommendationGateway>>,
    user_id: RwLock<Option<String>>,
}

impl Session {
    pub fn new(
        config: Config,
        catalog: Arc<dyn CatalogClient>,
        blobs: Arc<dyn BlobStore>,
        gateway: Option<Arc<dyn RecommendationGateway>>,
    ) -> Self {
        let cache = Arc::new(EntityCache::new());
        let assembler = Arc::new(RecordAssembler::new(
            catalog,
            blobs,
            cache.clone(),
            config.max_image_bytes,
        ));
        Self {
            config,
            cache,
            assembler,
            gateway,
            user_id: RwLock::new(None),
        }
    }

    /// Build a session whose gateway is the HTTP API named in `config`.
    pub fn from_config(
        config: Config,
        catalog: Arc<dyn CatalogClient>,
        blobs: Arc<dyn BlobStore>,
    ) -> AppResult<Self> {
        let gateway = HttpGateway::from_config(&config)?
            .map(|g| Arc::new(g) as Arc<dyn RecommendationGateway>);
        if gateway.is_none() {
            tracing::warn!("No recommendation API configured; decks use random draws");
        }
        Ok(Self::new(config, catalog, blobs, gateway))
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn cache(&self) -> &Arc<EntityCache> {
        &self.cache
    }

    pub fn assembler(&self) -> &Arc<RecordAssembler> {
        &self.assembler
    }

    pub async fn current_user(&self) -> Option<String> {
        self.user_id.read().await.clone()
    }

    /// Record the signed-in user and announce them to the recommender.
    pub async fn sign_in(&self, user_id: &str) {
        *self.user_id.write().await = Some(user_id.to_string());
        tracing::info!("Signed in {}", user_id);
        if let Some(gateway) = &self.gateway {
            if let Err(e) = gateway.log_on(user_id).await {
                tracing::warn!("Failed to log on {} with recommender: {}", user_id, e);
            }
        }
    }

    /// A new deck for one display surface, bound to the current user.
    pub async fn deck(&self) -> DeckCoordinator {
        DeckCoordinator::new(
            self.assembler.clone(),
            self.gateway.clone(),
            self.current_user().await,
            DeckOptions::from(&self.config),
        )
    }

    /// The signed-in user's saved charities; empty when signed out.
    pub async fn saved_charities(&self) -> Vec<Arc<Charity>> {
        match self.current_user().await {
            Some(user_id) => self.assembler.saved_charities(&user_id).await,
            None => Vec::new(),
        }
    }

    /// Take a charity off the signed-in user's saved list.
    pub async fn unsave_charity(&self, charity_id: &str) -> AppResult<()> {
        let user_id = self
            .current_user()
            .await
            .ok_or_else(|| AppError::NotFound("No signed-in user".to_string()))?;
        self.assembler.unsave_charity(&user_id, charity_id).await
    }

    /// Forget the user and drop everything cached this session.
    pub async fn sign_out(&self) {
        let user = self.user_id.write().await.take();
        if let (Some(gateway), Some(user_id)) = (&self.gateway, &user) {
            if let Err(e) = gateway.log_off(user_id).await {
                tracing::warn!("Failed to log off {} with recommender: {}", user_id, e);
            }
        }
        self.cache.reset().await;
        tracing::info!("Signed out");
    }
}
