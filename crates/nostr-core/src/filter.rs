//! Relay query filters (NIP-01).

use crate::event::{KIND_METADATA, KIND_TEXT_NOTE};
use serde::{Serialize, Serializer};
use std::collections::BTreeMap;

/// Filter handed to the relay layer.
///
/// `tag_filters` is keyed by single-letter tag name; it serializes as
/// `"#e": [...]`, `"#p": [...]`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryFilter {
    pub kinds: Vec<u16>,
    pub authors: Option<Vec<String>>,
    pub ids: Option<Vec<String>>,
    pub tag_filters: Option<BTreeMap<char, Vec<String>>>,
    pub limit: Option<usize>,
}

impl QueryFilter {
    /// Recent text notes from anyone.
    pub fn recent_notes(limit: usize) -> Self {
        Self {
            kinds: vec![KIND_TEXT_NOTE],
            limit: Some(limit),
            ..Default::default()
        }
    }

    /// The thread root itself.
    pub fn thread_root(root_id: &str) -> Self {
        Self {
            kinds: vec![KIND_TEXT_NOTE],
            ids: Some(vec![root_id.to_string()]),
            ..Default::default()
        }
    }

    /// Every text note tagging the root with an `e` tag.
    pub fn thread_replies(root_id: &str) -> Self {
        Self {
            kinds: vec![KIND_TEXT_NOTE],
            tag_filters: Some(BTreeMap::from([('e', vec![root_id.to_string()])])),
            ..Default::default()
        }
    }

    /// Text notes written by one identity.
    pub fn authored_by(pubkey: &str, limit: usize) -> Self {
        Self {
            kinds: vec![KIND_TEXT_NOTE],
            authors: Some(vec![pubkey.to_string()]),
            limit: Some(limit),
            ..Default::default()
        }
    }

    /// Kind 0 metadata for a set of identities.
    pub fn profiles(pubkeys: &[String]) -> Self {
        Self {
            kinds: vec![KIND_METADATA],
            authors: Some(pubkeys.to_vec()),
            ..Default::default()
        }
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }
}

impl Serialize for QueryFilter {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        use serde::ser::SerializeMap;

        let mut map = serializer.serialize_map(None)?;
        if let Some(ids) = &self.ids {
            map.serialize_entry("ids", ids)?;
        }
        if let Some(authors) = &self.authors {
            map.serialize_entry("authors", authors)?;
        }
        if !self.kinds.is_empty() {
            map.serialize_entry("kinds", &self.kinds)?;
        }
        if let Some(tags) = &self.tag_filters {
            for (name, values) in tags {
                map.serialize_entry(&format!("#{name}"), values)?;
            }
        }
        if let Some(limit) = self.limit {
            map.serialize_entry("limit", &limit)?;
        }
        map.end()
    }
}
