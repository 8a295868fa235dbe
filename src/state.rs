//! Application state and its reducer.
//!
//! Every change goes through [`AppState::reduce`]; async work produces
//! [`Action`]s and never edits state directly.

use nostr_core::{
    references_root, short_hex, split_thread, Event, EventSet, ThreadInfo, ThreadSplit,
};
use tracing::debug;

/// What the user is looking at.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum View {
    #[default]
    Feed,
    Thread(ThreadInfo),
    Profile { pubkey: String },
    RelayDirectory,
}

impl View {
    pub fn thread(root_id: impl Into<String>) -> Self {
        View::Thread(ThreadInfo::new(root_id))
    }

    pub fn profile(pubkey: impl Into<String>) -> Self {
        View::Profile {
            pubkey: pubkey.into(),
        }
    }

    /// Whether an event published locally belongs in this view.
    fn admits(&self, event: &Event) -> bool {
        match self {
            View::Feed => event.is_text_note(),
            View::Thread(info) => event.id == info.root_id || references_root(event, &info.root_id),
            View::Profile { pubkey } => event.is_text_note() && &event.pubkey == pubkey,
            View::RelayDirectory => false,
        }
    }
}

#[derive(Debug, Clone)]
pub enum Action {
    /// Switch views. Discards the view-scoped events and starts a new epoch.
    SetView(View),
    /// Results of a view query started during `epoch`.
    EventsFetched { epoch: u64, events: Vec<Event> },
    /// A query for `epoch` finished without usable results.
    FetchFailed { epoch: u64, message: String },
    /// The relay set in use.
    RelaysConnected(Vec<String>),
    /// A note signed locally, inserted before any relay confirms it.
    Published(Event),
}

#[derive(Debug, Clone, Default)]
pub struct AppState {
    pub view: View,
    /// Incremented on every view change.
    pub epoch: u64,
    /// Events of the current view only.
    pub view_events: EventSet,
    /// Every event seen this session, add-only.
    pub session: EventSet,
    pub relays: Vec<String>,
    pub loading: bool,
    pub last_error: Option<String>,
}

impl AppState {
    pub fn reduce(mut self, action: Action) -> AppState {
        match action {
            Action::SetView(view) => {
                self.epoch += 1;
                self.view = view;
                self.view_events = EventSet::new();
                self.loading = self.view != View::RelayDirectory;
                self.last_error = None;
            }
            Action::EventsFetched { epoch, events } => {
                self.session.extend(events.iter().cloned());
                if epoch != self.epoch {
                    debug!(
                        "Ignoring {} event(s) from stale epoch {} (current {})",
                        events.len(),
                        epoch,
                        self.epoch
                    );
                    return self;
                }
                self.view_events.extend(events);
                self.loading = false;
                self.recount_replies();
            }
            Action::FetchFailed { epoch, message } => {
                if epoch == self.epoch {
                    self.loading = false;
                    self.last_error = Some(message);
                }
            }
            Action::RelaysConnected(relays) => {
                self.relays = relays;
            }
            Action::Published(event) => {
                debug!("Inserting local note {}", short_hex(&event.id));
                if self.view.admits(&event) {
                    self.view_events.insert(event.clone());
                    self.recount_replies();
                }
                self.session.insert(event);
            }
        }
        self
    }

    fn recount_replies(&mut self) {
        if let View::Thread(info) = &mut self.view {
            let root = &info.root_id;
            info.reply_count = self.view_events.iter().filter(|e| &e.id != root).count();
        }
    }

    /// Root and replies of the open thread, if a thread is open.
    pub fn thread(&self) -> Option<ThreadSplit> {
        match &self.view {
            View::Thread(info) => Some(split_thread(&info.root_id, self.view_events.to_vec())),
            _ => None,
        }
    }

    /// View events, oldest first.
    pub fn events(&self) -> Vec<Event> {
        self.view_events.to_vec()
    }
}
