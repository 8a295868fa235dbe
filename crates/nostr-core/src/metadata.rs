//! Profile (kind 0) and relay (NIP-11) descriptor records.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Profile metadata published as kind 0 content. Every field may be unknown.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    /// Older clients publish `displayName`; many profiles carry both spellings.
    #[serde(default, rename = "displayName", skip_serializing)]
    pub display_name_camel: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub picture: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub banner: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub about: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub website: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nip05: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lud16: Option<String>,
}

fn non_empty(field: &Option<String>) -> Option<&str> {
    field.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

impl UserMetadata {
    /// Parse kind 0 content. Anything that is not a well-typed JSON object fails.
    pub fn from_content(content: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(content)
    }

    /// Handle shown for this profile: `name`, then the display name.
    pub fn handle(&self) -> Option<&str> {
        non_empty(&self.name).or_else(|| self.display())
    }

    /// Display name under either spelling.
    pub fn display(&self) -> Option<&str> {
        non_empty(&self.display_name).or_else(|| non_empty(&self.display_name_camel))
    }
}

/// Relay information document (NIP-11).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelayMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pubkey: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contact: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub supported_nips: Option<Vec<u32>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub software: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}

/// Label for a relay: its advertised name, else the URL without scheme.
pub fn relay_label(url: &str, metadata: Option<&RelayMetadata>) -> String {
    if let Some(name) = metadata.and_then(|m| non_empty(&m.name)) {
        return name.to_string();
    }
    url.trim_start_matches("wss://")
        .trim_start_matches("ws://")
        .to_string()
}

/// Lookup seam used by the renderer to turn pubkeys into handles.
pub trait ProfileNames {
    /// Known handle for `pubkey`, `None` when nothing usable is cached.
    fn handle_for(&self, pubkey: &str) -> Option<String>;
}

impl ProfileNames for HashMap<String, UserMetadata> {
    fn handle_for(&self, pubkey: &str) -> Option<String> {
        self.get(pubkey).and_then(|m| m.handle()).map(str::to_string)
    }
}
