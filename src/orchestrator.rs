//! View/query orchestration over relays, the metadata cache and app state.

use crate::cache::MetadataCache;
use crate::config::{Config, DEFAULT_RELAYS};
use crate::error::PublishError;
use crate::relay::{query_relays, RelayQuery};
use crate::signer::Signer;
use crate::state::{Action, AppState, View};
use futures_util::future::join_all;
use nostr_core::{
    extract_references, merge_batches, note_template, resolve_event, short_hex, thread_root_for,
    Event, QueryFilter, RenderOptions,
};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Query sizes used when building view filters.
#[derive(Debug, Clone, Copy)]
pub struct QueryLimits {
    pub feed: usize,
    pub profile: usize,
}

impl Default for QueryLimits {
    fn default() -> Self {
        Self {
            feed: 50,
            profile: 50,
        }
    }
}

impl From<&Config> for QueryLimits {
    fn from(config: &Config) -> Self {
        Self {
            feed: config.feed.limit,
            profile: config.feed.profile_limit,
        }
    }
}

/// A note being composed. Publishing never consumes or edits it.
#[derive(Debug, Clone, Default)]
pub struct Draft {
    pub content: String,
    pub subject: Option<String>,
    pub reply_to: Option<String>,
    pub root: Option<String>,
}

impl Draft {
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            ..Default::default()
        }
    }

    /// Reply to `parent` inside the thread rooted at `root`.
    pub fn reply(content: impl Into<String>, parent: &str, root: &str) -> Self {
        Self {
            content: content.into(),
            reply_to: Some(parent.to_string()),
            root: Some(root.to_string()),
            ..Default::default()
        }
    }
}

/// Cancels the periodic refresh when dropped.
#[derive(Debug)]
pub struct RefreshHandle {
    token: CancellationToken,
}

impl RefreshHandle {
    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }
}

impl Drop for RefreshHandle {
    fn drop(&mut self) {
        self.token.cancel();
    }
}

/// Drives view queries, metadata fetches and publishing.
///
/// Cheap to clone; clones share state, cache and relay backend.
#[derive(Clone)]
pub struct Orchestrator {
    backend: Arc<dyn RelayQuery>,
    cache: Arc<MetadataCache>,
    state: Arc<RwLock<AppState>>,
    limits: QueryLimits,
    refresh: Arc<parking_lot::Mutex<Option<CancellationToken>>>,
    broadcasts: Arc<parking_lot::Mutex<Vec<JoinHandle<()>>>>,
}

impl Orchestrator {
    pub fn new(backend: Arc<dyn RelayQuery>, limits: QueryLimits) -> Self {
        Self {
            backend,
            cache: Arc::new(MetadataCache::new()),
            state: Arc::new(RwLock::new(AppState::default())),
            limits,
            refresh: Arc::new(parking_lot::Mutex::new(None)),
            broadcasts: Arc::new(parking_lot::Mutex::new(Vec::new())),
        }
    }

    pub fn cache(&self) -> &MetadataCache {
        &self.cache
    }

    /// Snapshot of the current state.
    pub async fn state(&self) -> AppState {
        self.state.read().await.clone()
    }

    pub async fn view(&self) -> View {
        self.state.read().await.view.clone()
    }

    pub async fn relays(&self) -> Vec<String> {
        self.state.read().await.relays.clone()
    }

    async fn dispatch(&self, action: Action) {
        let mut guard = self.state.write().await;
        let current = std::mem::take(&mut *guard);
        *guard = current.reduce(action);
    }

    /// Use `relays` (the default set when empty) and describe the new ones.
    pub async fn connect(&self, relays: Vec<String>) -> usize {
        let relays = if relays.is_empty() {
            DEFAULT_RELAYS.iter().map(|r| r.to_string()).collect()
        } else {
            relays
        };
        info!("Using {} relay(s)", relays.len());
        self.dispatch(Action::RelaysConnected(relays.clone())).await;
        self.describe_relays(&relays, false).await
    }

    /// Fetch NIP-11 documents for relays not yet described (all when forced).
    pub async fn describe_relays(&self, relays: &[String], force_refresh: bool) -> usize {
        let missing = self.cache.relays_missing(relays, force_refresh);
        if missing.is_empty() {
            return 0;
        }

        let backend = self.backend.as_ref();
        let results = join_all(missing.iter().map(|relay| async move {
            (relay, backend.describe(relay).await)
        }))
        .await;

        let mut described = 0;
        for (relay, result) in results {
            match result {
                Ok(metadata) => {
                    self.cache.store_relay(relay, metadata);
                    described += 1;
                }
                Err(e) => warn!("Could not describe {}: {:#}", relay, e),
            }
        }
        debug!("Described {}/{} relay(s)", described, missing.len());
        described
    }

    /// Make sure profile metadata is cached for `identities`.
    ///
    /// Only uncached identities are queried unless `force_refresh` is set;
    /// nothing is sent when nothing is pending. Returns the number of
    /// records stored.
    pub async fn fetch_user_metadata(&self, identities: &[String], force_refresh: bool) -> usize {
        let pending = self.cache.pending(identities, force_refresh);
        if pending.is_empty() {
            return 0;
        }

        let relays = self.relays().await;
        let filter = QueryFilter::profiles(&pending);
        let events = query_relays(self.backend.as_ref(), &relays, &filter).await;
        let profiles = MetadataCache::profiles_from_events(&events);
        let stored = self.cache.apply_profiles(profiles);
        debug!("Stored {} of {} requested profile(s)", stored, pending.len());
        stored
    }

    /// Switch views and run the new view's queries.
    ///
    /// Any periodic refresh is stopped; results still in flight for the old
    /// view are discarded when they arrive.
    pub async fn set_view(&self, view: View) -> usize {
        self.stop_auto_refresh();
        self.dispatch(Action::SetView(view)).await;
        self.refresh().await
    }

    /// Open the thread containing `event_id`.
    ///
    /// The note is looked up in the session store, then on the relays; a
    /// reply opens its declared root, anything else opens itself.
    pub async fn open_thread(&self, event_id: &str) -> usize {
        let known = self.state.read().await.session.get(event_id).cloned();
        let event = match known {
            Some(event) => Some(event),
            None => {
                let relays = self.relays().await;
                let filter = QueryFilter::thread_root(event_id);
                query_relays(self.backend.as_ref(), &relays, &filter)
                    .await
                    .into_iter()
                    .find(|e| e.id == event_id)
            }
        };

        let root = event
            .as_ref()
            .map(|e| thread_root_for(e).to_string())
            .unwrap_or_else(|| event_id.to_string());
        if root != event_id {
            debug!("{} is a reply, opening root {}", short_hex(event_id), short_hex(&root));
        }
        self.set_view(View::thread(root)).await
    }

    /// Re-run the current view's queries. Returns the number of new view events.
    pub async fn refresh(&self) -> usize {
        let (view, epoch, relays, before) = {
            let state = self.state.read().await;
            (
                state.view.clone(),
                state.epoch,
                state.relays.clone(),
                state.view_events.len(),
            )
        };

        if relays.is_empty() {
            self.dispatch(Action::FetchFailed {
                epoch,
                message: "no relays connected".to_string(),
            })
            .await;
            return 0;
        }

        let events = match &view {
            View::Feed => {
                let filter = QueryFilter::recent_notes(self.limits.feed);
                query_relays(self.backend.as_ref(), &relays, &filter).await
            }
            View::Thread(info) => {
                let root = QueryFilter::thread_root(&info.root_id);
                let replies = QueryFilter::thread_replies(&info.root_id);
                let (root, replies) = tokio::join!(
                    query_relays(self.backend.as_ref(), &relays, &root),
                    query_relays(self.backend.as_ref(), &relays, &replies),
                );
                merge_batches([root, replies])
            }
            View::Profile { pubkey } => {
                let identity = [pubkey.clone()];
                let filter = QueryFilter::authored_by(pubkey, self.limits.profile);
                let (_, events) = tokio::join!(
                    self.fetch_user_metadata(&identity, true),
                    query_relays(self.backend.as_ref(), &relays, &filter),
                );
                events
            }
            // Relay documents are fetched by `connect`; this view only reads the cache.
            View::RelayDirectory => Vec::new(),
        };

        let identities = referenced_identities(&events);
        self.dispatch(Action::EventsFetched { epoch, events }).await;

        if !identities.is_empty() {
            self.fetch_user_metadata(&identities, false).await;
        }

        let after = self.state.read().await.view_events.len();
        after.saturating_sub(before)
    }

    /// Sign and publish a draft.
    ///
    /// The signed note is inserted locally straight away; relays receive it
    /// in the background and their acknowledgements are not awaited.
    pub async fn publish(&self, signer: &dyn Signer, draft: &Draft) -> Result<Event, PublishError> {
        if draft.content.trim().is_empty() {
            return Err(PublishError::EmptyContent);
        }

        let pubkey = signer.get_public_key().await?;
        let mut template = note_template(
            &draft.content,
            draft.subject.as_deref(),
            draft.reply_to.as_deref(),
            draft.root.as_deref(),
            chrono::Utc::now().timestamp().max(0) as u64,
        );
        template.pubkey = pubkey.clone();

        let event = signer.sign_event(template).await?;
        info!("Publishing note {}", short_hex(&event.id));
        self.dispatch(Action::Published(event.clone())).await;

        let relays = self.relays().await;
        let backend = Arc::clone(&self.backend);
        let outgoing = event.clone();
        let task = tokio::spawn(async move {
            if let Err(e) = backend.broadcast(&relays, &outgoing).await {
                warn!("Broadcast of {} failed: {:#}", short_hex(&outgoing.id), e);
            }
        });
        self.broadcasts.lock().push(task);

        let this = self.clone();
        tokio::spawn(async move {
            this.fetch_user_metadata(&[pubkey], false).await;
        });

        Ok(event)
    }

    /// Wait for every broadcast started so far to finish.
    pub async fn wait_for_broadcasts(&self) {
        let tasks = std::mem::take(&mut *self.broadcasts.lock());
        for task in tasks {
            if let Err(e) = task.await {
                warn!("Broadcast task failed: {}", e);
            }
        }
    }

    /// Refresh the current view every `interval` until cancelled.
    ///
    /// The loop stops when the handle is dropped or cancelled, or when the
    /// view changes.
    pub fn start_auto_refresh(&self, interval: Duration) -> RefreshHandle {
        let token = CancellationToken::new();
        if let Some(previous) = self.refresh.lock().replace(token.clone()) {
            previous.cancel();
        }

        let this = self.clone();
        let loop_token = token.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.tick().await;
            loop {
                tokio::select! {
                    biased;
                    _ = loop_token.cancelled() => {
                        debug!("Auto refresh stopped");
                        break;
                    }
                    _ = ticker.tick() => {
                        let added = this.refresh().await;
                        debug!("Auto refresh added {} event(s)", added);
                    }
                }
            }
        });

        RefreshHandle { token }
    }

    pub fn stop_auto_refresh(&self) {
        if let Some(token) = self.refresh.lock().take() {
            token.cancel();
        }
    }

    /// Display text for an event with references resolved against the cache.
    pub fn render(&self, event: &Event, options: RenderOptions) -> String {
        resolve_event(event, self.cache.as_ref(), options)
    }
}

/// Authors of `events` plus the profiles they mention, deduplicated.
fn referenced_identities(events: &[Event]) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut identities = Vec::new();
    for event in events {
        if seen.insert(event.pubkey.clone()) {
            identities.push(event.pubkey.clone());
        }
        if let Ok(refs) = extract_references(&event.content, &event.tags) {
            for pubkey in refs.profiles {
                if seen.insert(pubkey.clone()) {
                    identities.push(pubkey);
                }
            }
        }
    }
    identities
}
