//! In-memory relays for orchestrator tests.

#![allow(dead_code)]

use anyhow::Result;
use async_trait::async_trait;
use parking_lot::Mutex;
use relaynote::nostr_core::{Event, QueryFilter, RelayMetadata, KIND_METADATA, KIND_TEXT_NOTE};
use relaynote::RelayQuery;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::Semaphore;

/// Relays backed by per-URL event lists, recording every call.
#[derive(Default)]
pub struct MockRelays {
    stored: Mutex<HashMap<String, Vec<Event>>>,
    failing: Mutex<HashSet<String>>,
    feed_gate: Mutex<Option<Arc<Semaphore>>>,
    pub queries: Mutex<Vec<(String, QueryFilter)>>,
    pub broadcasts: Mutex<Vec<(Vec<String>, Event)>>,
    pub described: Mutex<Vec<String>>,
}

impl MockRelays {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn store(&self, relay: &str, events: Vec<Event>) {
        self.stored
            .lock()
            .entry(relay.to_string())
            .or_default()
            .extend(events);
    }

    pub fn fail(&self, relay: &str) {
        self.failing.lock().insert(relay.to_string());
    }

    /// Hold feed queries until permits are added to the returned semaphore.
    pub fn gate_feed(&self) -> Arc<Semaphore> {
        let gate = Arc::new(Semaphore::new(0));
        *self.feed_gate.lock() = Some(gate.clone());
        gate
    }

    pub fn metadata_queries(&self) -> Vec<QueryFilter> {
        self.queries
            .lock()
            .iter()
            .filter(|(_, f)| f.kinds == vec![KIND_METADATA])
            .map(|(_, f)| f.clone())
            .collect()
    }

    pub fn query_count(&self) -> usize {
        self.queries.lock().len()
    }
}

fn is_feed(filter: &QueryFilter) -> bool {
    filter.kinds == vec![KIND_TEXT_NOTE]
        && filter.authors.is_none()
        && filter.ids.is_none()
        && filter.tag_filters.is_none()
}

fn matches(filter: &QueryFilter, event: &Event) -> bool {
    let kind_ok = filter.kinds.is_empty() || filter.kinds.contains(&event.kind);
    let author_ok = filter
        .authors
        .as_ref()
        .map_or(true, |authors| authors.contains(&event.pubkey));
    let id_ok = filter.ids.as_ref().map_or(true, |ids| ids.contains(&event.id));
    let tags_ok = filter.tag_filters.as_ref().map_or(true, |tags| {
        tags.iter().all(|(name, values)| {
            event.tags.iter().any(|t| {
                t.first().map(|n| n.as_str()) == Some(name.to_string().as_str())
                    && t.get(1).map_or(false, |v| values.contains(v))
            })
        })
    });
    kind_ok && author_ok && id_ok && tags_ok
}

#[async_trait]
impl RelayQuery for MockRelays {
    async fn query(&self, relay: &str, filter: &QueryFilter) -> Result<Vec<Event>> {
        self.queries.lock().push((relay.to_string(), filter.clone()));

        let gate = self.feed_gate.lock().clone();
        if let Some(gate) = gate {
            if is_feed(filter) {
                gate.acquire().await?.forget();
            }
        }

        if self.failing.lock().contains(relay) {
            anyhow::bail!("connection refused by {}", relay);
        }

        let mut events: Vec<Event> = self
            .stored
            .lock()
            .get(relay)
            .map(|events| events.iter().filter(|e| matches(filter, e)).cloned().collect())
            .unwrap_or_default();
        events.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        if let Some(limit) = filter.limit {
            events.truncate(limit);
        }
        Ok(events)
    }

    async fn describe(&self, relay: &str) -> Result<RelayMetadata> {
        self.described.lock().push(relay.to_string());
        if self.failing.lock().contains(relay) {
            anyhow::bail!("no information document at {}", relay);
        }
        Ok(RelayMetadata {
            name: Some(format!("mock {}", relay.trim_start_matches("wss://"))),
            ..Default::default()
        })
    }

    async fn broadcast(&self, relays: &[String], event: &Event) -> Result<()> {
        self.broadcasts.lock().push((relays.to_vec(), event.clone()));
        Ok(())
    }
}

pub fn note(id: &str, pubkey: &str, created_at: u64, content: &str, tags: &[&[&str]]) -> Event {
    Event {
        id: id.to_string(),
        pubkey: pubkey.to_string(),
        created_at,
        kind: KIND_TEXT_NOTE,
        tags: tags
            .iter()
            .map(|t| t.iter().map(|s| s.to_string()).collect())
            .collect(),
        content: content.to_string(),
        sig: String::new(),
    }
}

pub fn profile(id: &str, pubkey: &str, created_at: u64, content: &str) -> Event {
    Event {
        kind: KIND_METADATA,
        ..note(id, pubkey, created_at, content, &[])
    }
}

pub fn relays(urls: &[&str]) -> Vec<String> {
    urls.iter().map(|u| u.to_string()).collect()
}
