//! Merging event batches from several relays into one ordered set.
//!
//! Relays answer the same query with overlapping, unordered results. Merging
//! keys on the event id, keeps the first copy seen and orders by
//! `(created_at, id)` so the output does not depend on arrival order.

use crate::event::Event;
use std::collections::{BTreeMap, HashMap};

/// Total order used for every rendered sequence: oldest first, id as tie-break.
pub fn sort_key(event: &Event) -> (u64, &str) {
    (event.created_at, event.id.as_str())
}

/// Merge any number of relay batches into one deduplicated, ordered sequence.
pub fn merge_batches<I>(batches: I) -> Vec<Event>
where
    I: IntoIterator<Item = Vec<Event>>,
{
    let mut set = EventSet::new();
    for batch in batches {
        set.extend(batch);
    }
    set.into_vec()
}

/// Add-only set of events keyed by id, iterated in [`sort_key`] order.
#[derive(Debug, Clone, Default)]
pub struct EventSet {
    /// id -> created_at, so a duplicate is rejected even if its timestamp differs.
    index: HashMap<String, u64>,
    ordered: BTreeMap<(u64, String), Event>,
}

impl EventSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert an event. Returns false (and keeps the existing copy) if the id is known.
    pub fn insert(&mut self, event: Event) -> bool {
        if self.index.contains_key(&event.id) {
            return false;
        }
        let (created_at, id) = sort_key(&event);
        let key = (created_at, id.to_string());
        self.index.insert(key.1.clone(), created_at);
        self.ordered.insert(key, event);
        true
    }

    /// Insert every event of a batch, returning how many were new.
    pub fn extend<I>(&mut self, events: I) -> usize
    where
        I: IntoIterator<Item = Event>,
    {
        let mut added = 0;
        for event in events {
            if self.insert(event) {
                added += 1;
            }
        }
        added
    }

    pub fn contains(&self, id: &str) -> bool {
        self.index.contains_key(id)
    }

    pub fn get(&self, id: &str) -> Option<&Event> {
        let created_at = *self.index.get(id)?;
        self.ordered.get(&(created_at, id.to_string()))
    }

    /// Events oldest first.
    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &Event> {
        self.ordered.values()
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    pub fn to_vec(&self) -> Vec<Event> {
        self.ordered.values().cloned().collect()
    }

    pub fn into_vec(self) -> Vec<Event> {
        self.ordered.into_values().collect()
    }
}

impl FromIterator<Event> for EventSet {
    fn from_iter<I: IntoIterator<Item = Event>>(iter: I) -> Self {
        let mut set = EventSet::new();
        set.extend(iter);
        set
    }
}
