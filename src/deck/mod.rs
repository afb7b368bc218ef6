//! Swipe deck coordinator.
//!
//! Keeps a bounded window of hydrated charities live for one display surface.
//! The window is insertion ordered: new arrivals go to the front (bottom of the
//! visual stack) and the top card is the last element.
//!
//! Two advisory flags serialize mutations. `refilling` is held for a whole
//! refill cycle and a second `refill()` returns at once while it is set.
//! `swiping` covers the synchronous part of `remove()` only and is cleared
//! before the follow-up refill or reset runs. Neither flag ever blocks a caller.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use rand::Rng;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::assembler::RecordAssembler;
use crate::config::{Config, DEFAULT_DECK_CAPACITY};
use crate::errors::AppError;
use crate::gateway::{ReactionEvent, RecommendationGateway, SwipeDirection};
use crate::models::Charity;

/// Tunables for one deck.
#[derive(Debug, Clone, PartialEq)]
pub struct DeckOptions {
    /// Maximum number of live cards
    pub capacity: usize,
    /// Draw a random catalog entry when the gateway has no candidates
    pub random_fallback: bool,
}

impl Default for DeckOptions {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_DECK_CAPACITY,
            random_fallback: false,
        }
    }
}

impl From<&Config> for DeckOptions {
    fn from(config: &Config) -> Self {
        Self {
            capacity: config.deck_capacity.max(1),
            random_fallback: config.random_fallback,
        }
    }
}

/// Immutable view of the deck published after every change.
#[derive(Debug, Clone, Default)]
pub struct DeckSnapshot {
    pub cards: Vec<Arc<Charity>>,
    pub loading: bool,
    pub last_error: Option<String>,
}

impl DeckSnapshot {
    pub fn top(&self) -> Option<&Arc<Charity>> {
        self.cards.last()
    }

    pub fn ids(&self) -> Vec<&str> {
        self.cards.iter().filter_map(|c| c.identity()).collect()
    }
}

#[derive(Default)]
struct DeckState {
    window: Vec<Arc<Charity>>,
    refilling: bool,
    swiping: bool,
    loading: bool,
    last_error: Option<String>,
}

impl DeckState {
    fn contains(&self, id: &str) -> bool {
        self.window.iter().any(|c| c.identity() == Some(id))
    }

    fn ids(&self) -> HashSet<String> {
        self.window
            .iter()
            .filter_map(|c| c.id.clone())
            .collect()
    }

    fn snapshot(&self) -> DeckSnapshot {
        DeckSnapshot {
            cards: self.window.clone(),
            loading: self.loading,
            last_error: self.last_error.clone(),
        }
    }
}

fn lock(state: &Mutex<DeckState>) -> MutexGuard<'_, DeckState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Clears `refilling` when dropped, so every exit path releases the guard,
/// including a cancelled refill future.
struct RefillGuard<'a> {
    state: &'a Mutex<DeckState>,
}

impl Drop for RefillGuard<'_> {
    fn drop(&mut self) {
        lock(self.state).refilling = false;
    }
}

/// Owns the display window of one surface and keeps it topped up.
pub struct DeckCoordinator {
    assembler: Arc<RecordAssembler>,
    gateway: Option<Arc<dyn RecommendationGateway>>,
    user_id: Option<String>,
    options: DeckOptions,
    state: Mutex<DeckState>,
    snapshots: watch::Sender<DeckSnapshot>,
}

impl DeckCoordinator {
    pub fn new(
        assembler: Arc<RecordAssembler>,
        gateway: Option<Arc<dyn RecommendationGateway>>,
        user_id: Option<String>,
        mut options: DeckOptions,
    ) -> Self {
        options.capacity = options.capacity.max(1);
        let (snapshots, _) = watch::channel(DeckSnapshot::default());
        Self {
            assembler,
            gateway,
            user_id,
            options,
            state: Mutex::new(DeckState::default()),
            snapshots,
        }
    }

    pub fn options(&self) -> &DeckOptions {
        &self.options
    }

    pub fn capacity(&self) -> usize {
        self.options.capacity
    }

    /// Receive a new snapshot every time the deck changes.
    pub fn subscribe(&self) -> watch::Receiver<DeckSnapshot> {
        self.snapshots.subscribe()
    }

    pub fn snapshot(&self) -> DeckSnapshot {
        lock(&self.state).snapshot()
    }

    pub fn cards(&self) -> Vec<Arc<Charity>> {
        lock(&self.state).window.clone()
    }

    /// The card that will be swiped next.
    pub fn top(&self) -> Option<Arc<Charity>> {
        lock(&self.state).window.last().cloned()
    }

    pub fn len(&self) -> usize {
        lock(&self.state).window.len()
    }

    pub fn is_empty(&self) -> bool {
        lock(&self.state).window.is_empty()
    }

    pub fn is_loading(&self) -> bool {
        lock(&self.state).loading
    }

    pub fn is_refilling(&self) -> bool {
        lock(&self.state).refilling
    }

    pub fn is_swiping(&self) -> bool {
        lock(&self.state).swiping
    }

    fn publish(&self, state: &DeckState) {
        self.snapshots.send_replace(state.snapshot());
    }

    fn record_error(&self, err: &AppError) {
        let mut state = lock(&self.state);
        state.last_error = Some(err.message());
        self.publish(&state);
    }

    /// Clear the deck and rebuild it from scratch.
    pub async fn initialize(&self) {
        {
            let mut state = lock(&self.state);
            state.window.clear();
            state.loading = true;
            state.last_error = None;
            self.publish(&state);
        }
        tracing::info!("Refreshing entire deck");
        self.refill().await;
    }

    /// Top the deck up to capacity.
    ///
    /// Returns immediately when the deck is full or a refill is already in
    /// flight. Rounds repeat while the deck is short and the previous round
    /// inserted something; an empty or failed round ends the cycle and the next
    /// user action must trigger a new one.
    pub async fn refill(&self) {
        loop {
            let (guard, needed) = {
                let mut state = lock(&self.state);
                if state.refilling {
                    tracing::trace!("Refill already in progress");
                    return;
                }
                if state.window.len() >= self.options.capacity {
                    return;
                }
                state.refilling = true;
                let needed = self.options.capacity.saturating_sub(state.window.len());
                (RefillGuard { state: &self.state }, needed)
            };

            let inserted = self.refill_round(needed).await;
            drop(guard);

            let again = {
                let mut state = lock(&self.state);
                let again = inserted > 0 && state.window.len() < self.options.capacity;
                if !again {
                    state.loading = false;
                }
                self.publish(&state);
                again
            };
            if !again {
                tracing::debug!("Refill cycle finished after inserting {}", inserted);
                return;
            }
        }
    }

    /// One request/hydrate/insert round. Returns how many cards were inserted.
    async fn refill_round(&self, needed: usize) -> usize {
        let candidates = self.next_candidates(needed).await;
        let mut inserted = 0;

        for candidate in candidates {
            let Some(id) = candidate.id.clone() else {
                continue;
            };
            {
                let state = lock(&self.state);
                if state.window.len() >= self.options.capacity {
                    break;
                }
                if state.contains(&id) {
                    continue;
                }
            }

            let assembled = self.assembler.assemble(candidate).await;
            let entity = self.assembler.cache().get_or_merge(&id, assembled).await;

            let mut state = lock(&self.state);
            if state.window.len() >= self.options.capacity {
                break;
            }
            if state.contains(&id) {
                continue;
            }
            state.window.insert(0, entity);
            inserted += 1;
            if state.window.len() >= self.options.capacity {
                state.loading = false;
            }
            tracing::info!(
                "Added charity {}. Deck count is now {}",
                id,
                state.window.len()
            );
            self.publish(&state);
        }

        inserted
    }

    /// Candidate records in recommendation order, already filtered against the
    /// window.
    async fn next_candidates(&self, needed: usize) -> Vec<Charity> {
        if let (Some(gateway), Some(user_id)) = (&self.gateway, &self.user_id) {
            match gateway.next_n(user_id, needed).await {
                Ok(ids) if !ids.is_empty() => return self.records_in_order(ids).await,
                Ok(_) => tracing::debug!("Gateway returned no candidates"),
                Err(e) => {
                    tracing::warn!("Error fetching next candidates: {}", e);
                    self.record_error(&e);
                }
            }
            if !self.options.random_fallback {
                return Vec::new();
            }
        }
        self.random_candidate().await.into_iter().collect()
    }

    async fn records_in_order(&self, ids: Vec<String>) -> Vec<Charity> {
        let present = lock(&self.state).ids();
        let mut seen = HashSet::new();
        let wanted: Vec<String> = ids
            .into_iter()
            .filter(|id| !present.contains(id) && seen.insert(id.clone()))
            .collect();
        if wanted.is_empty() {
            return Vec::new();
        }

        let mut records = match self.assembler.fetch_records(&wanted).await {
            Ok(records) => records,
            Err(e) => {
                tracing::warn!("Failed to fetch candidate charities: {}", e);
                self.record_error(&e);
                return Vec::new();
            }
        };

        let mut ordered = Vec::with_capacity(wanted.len());
        for id in &wanted {
            match records.iter().position(|r| r.identity() == Some(id.as_str())) {
                Some(index) => ordered.push(records.swap_remove(index)),
                None => tracing::debug!("Candidate {} not found in catalog", id),
            }
        }
        ordered
    }

    /// Uniform random pick from the catalog, excluding cards already shown.
    async fn random_candidate(&self) -> Option<Charity> {
        let records = match self.assembler.fetch_all_records().await {
            Ok(records) => records,
            Err(e) => {
                tracing::warn!("Error fetching charity for next card: {}", e);
                self.record_error(&e);
                return None;
            }
        };

        let present = lock(&self.state).ids();
        let mut pool: Vec<Charity> = records
            .into_iter()
            .filter(|r| r.id.as_ref().is_some_and(|id| !present.contains(id)))
            .collect();
        if pool.is_empty() {
            tracing::info!("All charities are already in the deck");
            return None;
        }

        let index = random_index(pool.len());
        Some(pool.swap_remove(index))
    }

    /// Take a card out of the window under the swipe guard.
    ///
    /// Returns `None` when another removal is being applied or the card has no
    /// identity.
    fn take_card(&self, charity: &Charity) -> Option<Removal> {
        let Some(id) = charity.identity() else {
            tracing::warn!("Cannot remove charity {} without an ID", charity.name);
            return None;
        };

        let mut state = lock(&self.state);
        if state.swiping {
            tracing::trace!("Removal already in progress, ignoring {}", id);
            return None;
        }
        state.swiping = true;

        let top_matches = state.window.last().and_then(|c| c.identity()) == Some(id);
        let index = if top_matches {
            Some(state.window.len() - 1)
        } else {
            state.window.iter().position(|c| c.identity() == Some(id))
        };
        let removed = match index {
            Some(index) => {
                state.window.remove(index);
                tracing::info!(
                    "Removed charity {}{}. Deck count: {}",
                    id,
                    if top_matches { "" } else { " (non-top)" },
                    state.window.len()
                );
                true
            }
            None => {
                tracing::debug!("Charity {} not found in displayed deck", id);
                false
            }
        };

        let emptied = state.window.is_empty();
        if emptied {
            state.loading = true;
        }
        // Cleared before the follow-up work runs.
        state.swiping = false;
        self.publish(&state);
        Some(Removal { removed, emptied })
    }

    async fn after_removal(&self, emptied: bool) {
        if emptied {
            tracing::info!("Deck is empty, refreshing entire deck");
            self.initialize().await;
        } else {
            self.refill().await;
        }
    }

    /// Remove a card, then top up or rebuild the deck.
    ///
    /// A call made while another removal is being applied is ignored. When the
    /// deck ends up empty the whole deck is rebuilt with [`initialize`]
    /// instead of a partial refill. Returns whether this call removed the card.
    ///
    /// [`initialize`]: DeckCoordinator::initialize
    pub async fn remove(&self, charity: &Charity) -> bool {
        let Some(removal) = self.take_card(charity) else {
            return false;
        };
        self.after_removal(removal.emptied).await;
        removal.removed
    }

    /// Remove the card and report the swipe.
    ///
    /// Only the call that actually takes the card out of the window reports it,
    /// so a repeated swipe on the same card is dropped. The report runs on a
    /// spawned task whose failures are only logged; a down swipe also saves the
    /// charity to the user's list. The handle is returned for callers that want
    /// to wait on it.
    pub async fn swipe(
        &self,
        charity: &Charity,
        direction: SwipeDirection,
    ) -> Option<JoinHandle<()>> {
        let removal = self.take_card(charity)?;
        let handle = if removal.removed {
            self.report_swipe(charity, direction)
        } else {
            tracing::debug!("Swipe on a card no longer in the deck; not reported");
            None
        };
        self.after_removal(removal.emptied).await;
        handle
    }

    fn report_swipe(
        &self,
        charity: &Charity,
        direction: SwipeDirection,
    ) -> Option<JoinHandle<()>> {
        let (Some(user_id), Some(charity_id)) = (&self.user_id, charity.identity()) else {
            tracing::debug!("Missing user or charity ID; swipe not reported");
            return None;
        };
        let save = direction.saves();
        if self.gateway.is_none() && !save {
            return None;
        }

        let event = ReactionEvent {
            user_id: user_id.clone(),
            charity_id: charity_id.to_string(),
            reaction: direction.reaction(),
        };
        let gateway = self.gateway.clone();
        let assembler = Arc::clone(&self.assembler);
        Some(tokio::spawn(async move {
            if let Some(gateway) = gateway {
                if let Err(e) = gateway.submit_reaction(&event).await {
                    tracing::warn!("Error calling reaction API for {}: {}", event.charity_id, e);
                }
            }
            if save {
                if let Err(e) = assembler.save_charity(&event.user_id, &event.charity_id).await {
                    tracing::warn!("Failed to save charity {}: {}", event.charity_id, e);
                }
            }
        }))
    }
}

/// Outcome of taking a card out of the window.
struct Removal {
    removed: bool,
    emptied: bool,
}

fn random_index(len: usize) -> usize {
    rand::thread_rng().gen_range(0..len)
}
