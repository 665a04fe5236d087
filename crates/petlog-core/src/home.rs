//! Home model
//!
//! Wires the loader, the card deck and a backend together the way the home
//! screen uses them: load the bundle, derive cards, submit logs and edits,
//! and force a refresh after every successful write.

use petlog_api::{
    ActivityKind, ActivityLogRecord, ApiError, CredentialRefresher, HomeData, NewActivityLog,
    NewGroup, PetLogBackend, ProfileUpdate,
};
use petlog_util::{Clock, PetLogError};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::{
    ActivityCard, CachedValue, CardDeck, CoreEvent, CoreResult, Direction, LoadPolicy, Loader,
    bucket_changed,
};

/// Default drag distance a swipe must exceed
pub const DEFAULT_SWIPE_THRESHOLD: f64 = 50.0;

/// Cache keys used by the home model
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CacheKey {
    Home,
}

/// Display snapshot of one card
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CardView {
    pub kind: ActivityKind,
    pub headline: String,
    pub actor_label: &'static str,
    pub actor_name: String,
    pub note: String,
    pub just_completed: bool,
}

/// Display snapshot of the home screen
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HomeView {
    pub pet_name: Option<String>,
    pub invite_code: Option<String>,
    pub cards: Vec<CardView>,
    pub index: usize,
    pub is_loading: bool,
    /// Message for the last failed load; the cards keep showing the last good data
    pub error: Option<String>,
    /// The server has no group for this user yet
    pub is_empty: bool,
}

impl HomeView {
    pub fn current(&self) -> Option<&CardView> {
        self.cards.get(self.index)
    }
}

pub struct HomeModel<B> {
    backend: Arc<B>,
    clock: Arc<dyn Clock>,
    loader: Loader<CacheKey, HomeData>,
    deck: Mutex<CardDeck>,
    events: Mutex<Vec<CoreEvent>>,
    swipe_threshold: f64,
}

impl<B> HomeModel<B>
where
    B: PetLogBackend + 'static,
{
    pub fn new(backend: Arc<B>, clock: Arc<dyn Clock>) -> Self {
        let refresher: Arc<dyn CredentialRefresher> = backend.clone();
        Self {
            loader: Loader::new(clock.clone()).with_refresher(refresher),
            backend,
            clock,
            deck: Mutex::new(CardDeck::new()),
            events: Mutex::new(Vec::new()),
            swipe_threshold: DEFAULT_SWIPE_THRESHOLD,
        }
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.loader = self.loader.with_ttl(ttl);
        self
    }

    pub fn with_swipe_threshold(mut self, threshold: f64) -> Self {
        self.swipe_threshold = threshold;
        self
    }

    pub fn backend(&self) -> &Arc<B> {
        &self.backend
    }

    fn deck(&self) -> MutexGuard<'_, CardDeck> {
        self.deck.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn push_events(&self, new: Vec<CoreEvent>) {
        if new.is_empty() {
            return;
        }
        self.events
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .extend(new);
    }

    /// Load the home bundle and rebuild the cards
    pub async fn refresh(&self, policy: LoadPolicy) -> CachedValue<HomeData> {
        let cached = self
            .loader
            .load(CacheKey::Home, policy, || self.backend.fetch_home())
            .await;

        if let Some(err) = &cached.last_error {
            warn!(error = %err, "Home refresh failed");
        }
        self.rebuild(&cached);
        cached
    }

    fn rebuild(&self, cached: &CachedValue<HomeData>) {
        let now = self.clock.now();
        let events = {
            let mut deck = self.deck();
            let before = deck.cards().to_vec();
            // A failed load keeps showing the last good bundle
            if cached.last_error.is_none() || cached.value.is_some() {
                deck.rebuild(cached.value.as_ref(), now);
            }
            diff_cards(&before, deck.cards())
        };
        self.push_events(events);
    }

    /// Re-derive the cards against the clock and return pending events
    pub fn tick(&self) -> Vec<CoreEvent> {
        let now = self.clock.now();
        let events = {
            let mut deck = self.deck();
            let before = deck.cards().to_vec();
            deck.rederive(now);
            diff_cards(&before, deck.cards())
        };
        self.push_events(events);

        std::mem::take(&mut *self.events.lock().unwrap_or_else(|poisoned| poisoned.into_inner()))
    }

    /// Current cached state without fetching
    pub fn cached(&self) -> CachedValue<HomeData> {
        self.loader.snapshot(&CacheKey::Home)
    }

    /// Post a log; on success the card shows as completed and the bundle is force-refreshed
    pub async fn submit_log(
        &self,
        kind: ActivityKind,
        actor_name: &str,
        note: Option<String>,
    ) -> CoreResult<ActivityLogRecord> {
        if actor_name.trim().is_empty() {
            return Err(PetLogError::validation("actor name must not be empty").into());
        }

        let log = NewActivityLog::new(actor_name.trim(), note);
        let record = self.backend.submit_log(kind, &log).await?;
        info!(kind = %kind, actor = %log.actor_name, id = %record.id, "Activity logged");

        let now = self.clock.now();
        let events = {
            let mut deck = self.deck();
            let before = deck.cards().to_vec();
            deck.mark_completed(kind, &log, now);
            diff_cards(&before, deck.cards())
        };
        self.push_events(events);

        self.refresh(LoadPolicy::ForceRefresh).await;
        Ok(record)
    }

    /// Apply a partial profile edit: optimistic local update, then force-refresh
    pub async fn update_profile(&self, update: ProfileUpdate) -> CoreResult<()> {
        if update.is_empty() {
            debug!("Empty profile update, nothing to send");
            return Ok(());
        }
        update.validate()?;

        self.backend.update_profile(&update).await?;
        info!("Profile updated");

        if self
            .loader
            .update_cached(&CacheKey::Home, |home| update.apply_to(home))
        {
            self.rebuild(&self.cached());
        }

        self.refresh(LoadPolicy::ForceRefresh).await;
        Ok(())
    }

    /// Join a group by invite code (case-insensitive)
    pub async fn join_group(&self, invite_code: &str) -> CoreResult<()> {
        let code = invite_code.trim().to_uppercase();
        if code.is_empty() {
            return Err(PetLogError::validation("invite code must not be empty").into());
        }

        self.backend.join_group(&code).await?;
        info!(code = %code, "Joined group");

        self.refresh(LoadPolicy::ForceRefresh).await;
        Ok(())
    }

    pub async fn create_group(&self, group: &NewGroup) -> CoreResult<()> {
        if group.feeding_cycle_hours == 0 || group.watering_cycle_hours == 0 {
            return Err(PetLogError::validation("cycle hours must be positive").into());
        }
        if group.profile.name.trim().is_empty() {
            return Err(PetLogError::validation("name must not be empty").into());
        }

        self.backend.create_group(group).await?;
        info!(name = %group.profile.name, "Group created");

        self.refresh(LoadPolicy::ForceRefresh).await;
        Ok(())
    }

    /// Invite code of the current group, from the cache when possible
    pub async fn invite_code(&self) -> CoreResult<String> {
        if let Some(home) = self.cached().value
            && !home.invite_code.is_empty()
        {
            return Ok(home.invite_code);
        }
        Ok(self.backend.invite_code().await?)
    }

    /// The group's care note; `None` when there is none (or no group)
    pub async fn note(&self) -> CoreResult<Option<String>> {
        match self.backend.fetch_note().await {
            Ok(note) => Ok(note.filter(|n| !n.is_empty())),
            Err(ApiError::NotFound(_)) => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    /// Save the care note; blank text deletes it
    pub async fn save_note(&self, text: &str) -> CoreResult<()> {
        let text = text.trim();
        let note = (!text.is_empty()).then_some(text);
        self.backend.update_note(note).await?;
        info!(deleted = note.is_none(), "Care note saved");
        Ok(())
    }

    pub fn advance(&self, direction: Direction) {
        self.deck().advance(direction);
    }

    /// Translate a drag gesture using the configured threshold
    pub fn swipe(&self, delta: f64) {
        let threshold = self.swipe_threshold;
        self.deck().jump_to(delta, threshold);
    }

    pub fn tap(&self) {
        self.deck().tap();
    }

    pub fn current_card(&self) -> Option<ActivityCard> {
        self.deck().current().cloned()
    }

    /// Display snapshot of the home screen
    pub fn view(&self) -> HomeView {
        let cached = self.cached();
        let deck = self.deck();

        let pet_name = deck.source().map(|home| home.profile.name.clone());
        let cards = deck
            .cards()
            .iter()
            .map(|card| CardView {
                kind: card.kind,
                headline: card.headline(pet_name.as_deref().unwrap_or_default()),
                actor_label: card.actor_label(),
                actor_name: card.last_actor_name.clone(),
                note: card.last_note.clone(),
                just_completed: card.just_completed,
            })
            .collect();

        HomeView {
            invite_code: deck.source().map(|home| home.invite_code.clone()),
            pet_name,
            cards,
            index: deck.index(),
            is_loading: cached.is_loading,
            error: cached.last_error.as_ref().map(ToString::to_string),
            is_empty: cached.is_empty_state(),
        }
    }
}

/// One-line rendering of a card for terminal output
pub fn format_status_line(card: &CardView) -> String {
    let mut line = format!("{:<10}{}", card.kind.to_string(), card.headline);
    if !card.actor_name.is_empty() {
        line.push_str(&format!("  ({} {}", card.actor_label, card.actor_name));
        if !card.note.is_empty() {
            line.push_str(&format!(", 참고 사항: {}", card.note));
        }
        line.push(')');
    }
    if card.just_completed {
        line.push_str(" *");
    }
    line
}

fn diff_cards(before: &[ActivityCard], after: &[ActivityCard]) -> Vec<CoreEvent> {
    if !before.is_empty() && after.is_empty() {
        return vec![CoreEvent::HomeCleared];
    }

    let mut events = Vec::new();
    for new in after {
        let Some(old) = before.iter().find(|c| c.kind == new.kind) else {
            continue;
        };
        if old.just_completed && !new.just_completed {
            events.push(CoreEvent::CompletionConfirmed { kind: new.kind });
        }
        if let (Some(previous), Some(current)) = (old.status(), new.status())
            && bucket_changed(&previous, &current)
        {
            events.push(CoreEvent::StatusChanged {
                kind: new.kind,
                previous,
                current,
            });
        }
    }
    events
}
