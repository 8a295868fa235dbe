//! Session cache of profile and relay metadata.

use nostr_core::{short_hex, Event, ProfileNames, RelayMetadata, UserMetadata, KIND_METADATA};
use parking_lot::RwLock;
use std::collections::{HashMap, HashSet};
use tracing::warn;

/// Profile and relay metadata known for this session.
///
/// Entries are replaced wholesale when newer data arrives and never expire.
/// Concurrent writers race with last-writer-wins semantics.
#[derive(Debug, Default)]
pub struct MetadataCache {
    profiles: RwLock<HashMap<String, UserMetadata>>,
    relays: RwLock<HashMap<String, RelayMetadata>>,
}

fn distinct(ids: &[String]) -> Vec<String> {
    let mut seen = HashSet::new();
    ids.iter()
        .filter(|id| seen.insert(id.as_str()))
        .cloned()
        .collect()
}

impl MetadataCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn profile(&self, pubkey: &str) -> Option<UserMetadata> {
        self.profiles.read().get(pubkey).cloned()
    }

    pub fn has_profile(&self, pubkey: &str) -> bool {
        self.profiles.read().contains_key(pubkey)
    }

    /// Identities that need fetching: the uncached ones, or all when forced.
    pub fn pending(&self, identities: &[String], force_refresh: bool) -> Vec<String> {
        let wanted = distinct(identities);
        if force_refresh {
            return wanted;
        }
        let profiles = self.profiles.read();
        wanted
            .into_iter()
            .filter(|id| !profiles.contains_key(id))
            .collect()
    }

    /// Store fetched records, each replacing any previous entry in full.
    pub fn apply_profiles(&self, fetched: HashMap<String, UserMetadata>) -> usize {
        let count = fetched.len();
        self.profiles.write().extend(fetched);
        count
    }

    /// Parse kind 0 events into records, newest per identity.
    ///
    /// Non-metadata events are ignored and malformed payloads are dropped
    /// with a warning, so one bad profile never hides the others.
    pub fn profiles_from_events(events: &[Event]) -> HashMap<String, UserMetadata> {
        let mut newest: HashMap<&str, (&Event, UserMetadata)> = HashMap::new();

        for event in events.iter().filter(|e| e.kind == KIND_METADATA) {
            let metadata = match UserMetadata::from_content(&event.content) {
                Ok(metadata) => metadata,
                Err(e) => {
                    warn!("Dropping malformed profile for {}: {}", short_hex(&event.pubkey), e);
                    continue;
                }
            };

            let replace = match newest.get(event.pubkey.as_str()) {
                Some((current, _)) => {
                    (event.created_at, event.id.as_str()) > (current.created_at, current.id.as_str())
                }
                None => true,
            };
            if replace {
                newest.insert(event.pubkey.as_str(), (event, metadata));
            }
        }

        newest
            .into_iter()
            .map(|(pubkey, (_, metadata))| (pubkey.to_string(), metadata))
            .collect()
    }

    pub fn relay(&self, url: &str) -> Option<RelayMetadata> {
        self.relays.read().get(url).cloned()
    }

    pub fn store_relay(&self, url: &str, metadata: RelayMetadata) {
        self.relays.write().insert(url.to_string(), metadata);
    }

    /// Relays without a cached description, or all of them when forced.
    pub fn relays_missing(&self, urls: &[String], force_refresh: bool) -> Vec<String> {
        let wanted = distinct(urls);
        if force_refresh {
            return wanted;
        }
        let relays = self.relays.read();
        wanted
            .into_iter()
            .filter(|url| !relays.contains_key(url))
            .collect()
    }
}

impl ProfileNames for MetadataCache {
    fn handle_for(&self, pubkey: &str) -> Option<String> {
        self.profiles.read().handle_for(pubkey)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn metadata_event(id: &str, pubkey: &str, created_at: u64, content: &str) -> Event {
        Event {
            id: id.to_string(),
            pubkey: pubkey.to_string(),
            created_at,
            kind: KIND_METADATA,
            tags: vec![],
            content: content.to_string(),
            sig: String::new(),
        }
    }

    fn named(name: &str) -> UserMetadata {
        UserMetadata {
            name: Some(name.to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn pending_skips_cached_unless_forced() {
        let cache = MetadataCache::new();
        cache.apply_profiles(HashMap::from([("a".to_string(), named("alice"))]));

        let ids = vec!["a".to_string(), "b".to_string(), "b".to_string()];
        assert_eq!(cache.pending(&ids, false), vec!["b"]);
        assert_eq!(cache.pending(&ids, true), vec!["a", "b"]);
        assert!(cache.pending(&["a".to_string()], false).is_empty());
    }

    #[test]
    fn apply_replaces_whole_record() {
        let cache = MetadataCache::new();
        let mut first = named("alice");
        first.about = Some("hi".into());
        cache.apply_profiles(HashMap::from([("a".to_string(), first)]));
        cache.apply_profiles(HashMap::from([("a".to_string(), named("alice2"))]));

        let stored = cache.profile("a").unwrap();
        assert_eq!(stored.name.as_deref(), Some("alice2"));
        assert!(stored.about.is_none());
        assert_eq!(cache.handle_for("a").as_deref(), Some("alice2"));
    }

    #[test]
    fn malformed_profiles_do_not_affect_others() {
        let events = vec![
            metadata_event("1", "a", 1, r#"{"name":"alice"}"#),
            metadata_event("2", "b", 1, "{not json"),
            metadata_event("3", "c", 1, r#"{"display_name":"Carol"}"#),
        ];
        let parsed = MetadataCache::profiles_from_events(&events);
        assert_eq!(parsed.len(), 2);
        assert_eq!(parsed["a"].name.as_deref(), Some("alice"));
        assert!(!parsed.contains_key("b"));
        assert_eq!(parsed["c"].handle(), Some("Carol"));
    }

    #[test]
    fn newest_record_wins_regardless_of_order() {
        let old = metadata_event("1", "a", 10, r#"{"name":"old"}"#);
        let new = metadata_event("2", "a", 20, r#"{"name":"new"}"#);
        for events in [vec![old.clone(), new.clone()], vec![new, old]] {
            let parsed = MetadataCache::profiles_from_events(&events);
            assert_eq!(parsed["a"].name.as_deref(), Some("new"));
        }
    }

    #[test]
    fn newer_malformed_record_keeps_older_valid_one() {
        let events = vec![
            metadata_event("1", "a", 10, r#"{"name":"alice"}"#),
            metadata_event("2", "a", 20, "garbage"),
        ];
        let parsed = MetadataCache::profiles_from_events(&events);
        assert_eq!(parsed["a"].name.as_deref(), Some("alice"));
    }

    #[test]
    fn relays_are_described_once_unless_forced() {
        let cache = MetadataCache::new();
        let urls = vec!["wss://a".to_string(), "wss://b".to_string()];
        cache.store_relay("wss://a", RelayMetadata::default());
        assert_eq!(cache.relays_missing(&urls, false), vec!["wss://b"]);
        assert_eq!(cache.relays_missing(&urls, true), urls);
    }
}
