//! Relay access: the query seam, concurrent fan-out, and the nostr-sdk pool.

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use futures_util::future::join_all;
use nostr_core::{merge_batches, short_hex, Event, QueryFilter, RelayMetadata};
use nostr_sdk::{Alphabet, Client, EventId, Filter, Kind, PublicKey, SingleLetterTag};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Per-relay operations the orchestrator depends on.
#[async_trait]
pub trait RelayQuery: Send + Sync {
    /// Fetch the stored events matching `filter` from one relay.
    async fn query(&self, relay: &str, filter: &QueryFilter) -> Result<Vec<Event>>;

    /// Fetch the relay's NIP-11 information document.
    async fn describe(&self, relay: &str) -> Result<RelayMetadata>;

    /// Send a signed event to every relay.
    async fn broadcast(&self, relays: &[String], event: &Event) -> Result<()>;
}

/// Query every relay concurrently and merge the results.
///
/// A failing relay is logged and contributes an empty batch.
pub async fn query_relays(
    backend: &dyn RelayQuery,
    relays: &[String],
    filter: &QueryFilter,
) -> Vec<Event> {
    let fetches = relays.iter().map(|relay| async move {
        match backend.query(relay, filter).await {
            Ok(events) => {
                debug!("{} returned {} event(s)", relay, events.len());
                events
            }
            Err(e) => {
                warn!("Query to {} failed: {:#}", relay, e);
                Vec::new()
            }
        }
    });
    merge_batches(join_all(fetches).await)
}

/// HTTP URL serving a relay's NIP-11 document.
pub fn information_url(relay: &str) -> String {
    if let Some(rest) = relay.strip_prefix("wss://") {
        format!("https://{}", rest)
    } else if let Some(rest) = relay.strip_prefix("ws://") {
        format!("http://{}", rest)
    } else {
        relay.to_string()
    }
}

/// Translate a query filter into a nostr-sdk filter.
///
/// Authors and ids that do not parse are skipped with a warning so one bad
/// value cannot sink the rest of the request. A list left empty that way is
/// an error, since an empty list would match everything.
pub fn to_sdk_filter(filter: &QueryFilter) -> Result<Filter> {
    let mut sdk = Filter::new().kinds(filter.kinds.iter().map(|k| Kind::from(*k)));

    if let Some(authors) = &filter.authors {
        let parsed = parse_valid(authors, "author", |a| PublicKey::from_hex(a).ok());
        if parsed.is_empty() && !authors.is_empty() {
            bail!("No valid authors in filter");
        }
        sdk = sdk.authors(parsed);
    }

    if let Some(ids) = &filter.ids {
        let parsed = parse_valid(ids, "event id", |id| EventId::from_hex(id).ok());
        if parsed.is_empty() && !ids.is_empty() {
            bail!("No valid event ids in filter");
        }
        sdk = sdk.ids(parsed);
    }

    if let Some(tags) = &filter.tag_filters {
        for (name, values) in tags {
            let tag = match *name {
                'e' => SingleLetterTag::lowercase(Alphabet::E),
                'p' => SingleLetterTag::lowercase(Alphabet::P),
                other => SingleLetterTag::from_char(other)
                    .with_context(|| format!("Invalid tag filter: #{}", other))?,
            };
            sdk = sdk.custom_tags(tag, values.iter().cloned());
        }
    }

    if let Some(limit) = filter.limit {
        sdk = sdk.limit(limit);
    }

    Ok(sdk)
}

fn parse_valid<T>(values: &[String], what: &str, parse: impl Fn(&str) -> Option<T>) -> Vec<T> {
    values
        .iter()
        .filter_map(|value| {
            let parsed = parse(value);
            if parsed.is_none() {
                warn!("Skipping invalid {} in filter: {:?}", what, value);
            }
            parsed
        })
        .collect()
}

/// Relay access over nostr-sdk websockets and reqwest for NIP-11.
#[derive(Clone)]
pub struct RelayPool {
    client: Client,
    http: reqwest::Client,
    timeout: Duration,
}

impl RelayPool {
    pub fn new(timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self {
            client: Client::default(),
            http,
            timeout,
        })
    }

    async fn ensure_relay(&self, relay: &str) -> Result<()> {
        let added = self
            .client
            .add_relay(relay)
            .await
            .with_context(|| format!("Failed to add relay: {}", relay))?;
        if added {
            self.client.connect().await;
            info!("Connected to {}", relay);
        }
        Ok(())
    }

    pub async fn disconnect(&self) {
        self.client.disconnect().await;
    }
}

#[async_trait]
impl RelayQuery for RelayPool {
    async fn query(&self, relay: &str, filter: &QueryFilter) -> Result<Vec<Event>> {
        self.ensure_relay(relay).await?;
        let sdk_filter = to_sdk_filter(filter)?;

        let events = tokio::time::timeout(
            self.timeout,
            self.client.fetch_events_from([relay], sdk_filter, self.timeout),
        )
        .await
        .context("Timeout fetching events")?
        .context("Failed to fetch events")?;

        Ok(events.into_iter().map(|e| Event::from_sdk(&e)).collect())
    }

    async fn describe(&self, relay: &str) -> Result<RelayMetadata> {
        let url = information_url(relay);
        let metadata = self
            .http
            .get(&url)
            .header(reqwest::header::ACCEPT, "application/nostr+json")
            .send()
            .await
            .with_context(|| format!("Failed to reach {}", url))?
            .error_for_status()
            .with_context(|| format!("Relay information request to {} failed", url))?
            .json::<RelayMetadata>()
            .await
            .with_context(|| format!("Invalid relay information document from {}", url))?;
        Ok(metadata)
    }

    async fn broadcast(&self, relays: &[String], event: &Event) -> Result<()> {
        let mut reachable = Vec::with_capacity(relays.len());
        for relay in relays {
            match self.ensure_relay(relay).await {
                Ok(()) => reachable.push(relay.as_str()),
                Err(e) => warn!("Skipping {} for broadcast: {:#}", relay, e),
            }
        }
        if reachable.is_empty() {
            bail!("No reachable relay to broadcast to");
        }
        let sdk_event = event.to_sdk().context("Signed event is not valid")?;
        let output = self
            .client
            .send_event_to(reachable, &sdk_event)
            .await
            .context("Failed to send event")?;
        debug!(
            "Event {} accepted by {} relay(s), rejected by {}",
            short_hex(&event.id),
            output.success.len(),
            output.failed.len()
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nostr_core::event::KIND_TEXT_NOTE;
    use std::collections::HashMap;
    use parking_lot::Mutex;

    #[test]
    fn information_url_swaps_scheme() {
        assert_eq!(information_url("wss://nos.lol"), "https://nos.lol");
        assert_eq!(information_url("ws://127.0.0.1:7777"), "http://127.0.0.1:7777");
    }

    #[test]
    fn sdk_filter_translates_tags_and_rejects_bad_hex() {
        let root = "46d731680add2990efe1cc619dc9b8014feeb23261ab9dee50e9d11814de5a2b";
        let filter = QueryFilter::thread_replies(root);
        let sdk = to_sdk_filter(&filter).unwrap();
        let json = nostr_sdk::JsonUtil::as_json(&sdk);
        assert!(json.contains(r##""#e":["46d73168"##));
        assert!(json.contains(r#""kinds":[1]"#));

        assert!(to_sdk_filter(&QueryFilter::authored_by("not-hex", 5)).is_err());
    }

    #[test]
    fn sdk_filter_skips_bad_authors_but_keeps_the_rest() {
        let valid = "3bf0c63fcb93463407af97a5e5ee64fa883d107ef9e558472c4eb9aaaefa459d";
        let authors = vec![valid.to_string(), "npub1notahexkey".to_string(), String::new()];
        let sdk = to_sdk_filter(&QueryFilter::profiles(&authors)).unwrap();
        let json = nostr_sdk::JsonUtil::as_json(&sdk);
        assert!(json.contains(&format!(r#""authors":["{}"]"#, valid)));
    }

    #[tokio::test]
    async fn broadcast_skips_relays_that_cannot_be_added() {
        let pool = RelayPool::new(Duration::from_secs(1)).unwrap();
        let relays = vec!["not a relay".to_string(), String::new()];
        let err = pool.broadcast(&relays, &note("n1", 1)).await.unwrap_err();
        assert!(err.to_string().contains("No reachable relay"));
    }

    struct Scripted {
        batches: HashMap<String, Result<Vec<Event>, String>>,
        seen: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl RelayQuery for Scripted {
        async fn query(&self, relay: &str, _filter: &QueryFilter) -> Result<Vec<Event>> {
            self.seen.lock().push(relay.to_string());
            match self.batches.get(relay) {
                Some(Ok(events)) => Ok(events.clone()),
                Some(Err(e)) => Err(anyhow::anyhow!(e.clone())),
                None => Ok(Vec::new()),
            }
        }

        async fn describe(&self, _relay: &str) -> Result<RelayMetadata> {
            Ok(RelayMetadata::default())
        }

        async fn broadcast(&self, _relays: &[String], _event: &Event) -> Result<()> {
            Ok(())
        }
    }

    fn note(id: &str, created_at: u64) -> Event {
        Event {
            id: id.to_string(),
            pubkey: "a".repeat(64),
            created_at,
            kind: KIND_TEXT_NOTE,
            tags: vec![],
            content: String::new(),
            sig: String::new(),
        }
    }

    #[tokio::test]
    async fn fan_out_merges_and_tolerates_failures() {
        let backend = Scripted {
            batches: HashMap::from([
                ("wss://a".to_string(), Ok(vec![note("n1", 2), note("n2", 1)])),
                ("wss://b".to_string(), Err("connection refused".to_string())),
                ("wss://c".to_string(), Ok(vec![note("n2", 1), note("n3", 3)])),
            ]),
            seen: Mutex::new(Vec::new()),
        };
        let relays = vec!["wss://a".to_string(), "wss://b".to_string(), "wss://c".to_string()];

        let events = query_relays(&backend, &relays, &QueryFilter::recent_notes(10)).await;
        let ids: Vec<_> = events.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, vec!["n2", "n1", "n3"]);
        assert_eq!(backend.seen.lock().len(), 3);
    }
}
