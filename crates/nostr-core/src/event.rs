//! Event model with the exact NIP-01 wire shape.

use nostr_sdk::JsonUtil;
use serde::{Deserialize, Serialize};

/// Kind 0: user metadata.
pub const KIND_METADATA: u16 = 0;
/// Kind 1: short text note.
pub const KIND_TEXT_NOTE: u16 = 1;
/// Kind 6: repost (NIP-18).
pub const KIND_REPOST: u16 = 6;

/// A signed Nostr event as it travels over the wire.
///
/// Events are immutable once created; `id` is derived from the content and is
/// the deduplication key everywhere in the client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    pub id: String,
    pub pubkey: String,
    pub created_at: u64,
    pub kind: u16,
    pub tags: Vec<Vec<String>>,
    pub content: String,
    pub sig: String,
}

impl Event {
    /// Iterate the tags whose name (position 0) equals `name`.
    pub fn tags_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a [String]> + 'a {
        tags_named(&self.tags, name)
    }

    /// First value (position 1) of the first tag named `name`.
    pub fn first_tag_value<'a>(&'a self, name: &'a str) -> Option<&'a str> {
        self.tags_named(name)
            .find_map(|t| t.get(1))
            .map(|v| v.as_str())
    }

    pub fn is_text_note(&self) -> bool {
        self.kind == KIND_TEXT_NOTE
    }

    /// Abbreviated id for log lines.
    pub fn short_id(&self) -> &str {
        short_hex(&self.id)
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }

    /// Copy a nostr-sdk event into the wire model.
    pub fn from_sdk(event: &nostr_sdk::Event) -> Self {
        Self {
            id: event.id.to_hex(),
            pubkey: event.pubkey.to_hex(),
            created_at: event.created_at.as_u64(),
            kind: event.kind.as_u16(),
            tags: event.tags.iter().map(|t| t.as_slice().to_vec()).collect(),
            content: event.content.clone(),
            sig: event.sig.to_string(),
        }
    }

    /// Parse back into a nostr-sdk event for transmission.
    pub fn to_sdk(&self) -> Result<nostr_sdk::Event, <nostr_sdk::Event as JsonUtil>::Err> {
        nostr_sdk::Event::from_json(self.to_json())
    }
}

/// An event template handed to a signer.
///
/// `pubkey` is left empty by the client; the signer fills it in together with
/// `id` and `sig`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnsignedEvent {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub pubkey: String,
    pub created_at: u64,
    pub kind: u16,
    pub tags: Vec<Vec<String>>,
    pub content: String,
}

pub(crate) fn tags_named<'a>(
    tags: &'a [Vec<String>],
    name: &'a str,
) -> impl Iterator<Item = &'a [String]> + 'a {
    tags.iter()
        .map(|t| t.as_slice())
        .filter(move |t| t.first().map(|v| v.as_str()) == Some(name))
}

/// First 8 characters of a hex identifier.
pub fn short_hex(hex: &str) -> &str {
    hex.get(..8).unwrap_or(hex)
}


#[cfg(test)]
mod tests {
    use super::*;

    const WIRE: &str = r#"{"id":"4376c65d2f232afbe9b882a35baa4f6fe8667c4e684749af565f981833ed6a65","pubkey":"6e468422dfb74a5738702a8823b9b28168abab8655faacb6853cd0ee15deee93","created_at":1673347337,"kind":1,"tags":[["e","3da979448d9ba263864c4d6f14984c423a3838364ec255f03c7904b1ae77f206"],["p","bf2376e17ba4ec269d10fcc996a4746b451152be9031fa48e74553dde5526bce"]],"content":"Walled gardens became prisons","sig":"908a15e46fb4d8675bab026fc230a0e3542bfade63da02d542fb78b2a8513fcd0092619a2c8c1221e581946e0191f2af505dfdf8657a414dbca329186f009262"}"#;

    #[test]
    fn wire_shape_round_trips_exactly() {
        let event: Event = serde_json::from_str(WIRE).unwrap();
        assert_eq!(event.kind, 1);
        assert_eq!(event.created_at, 1673347337);
        assert_eq!(event.tags.len(), 2);
        assert_eq!(event.to_json(), WIRE);
    }

    #[test]
    fn first_tag_value_picks_first_match() {
        let event = fixtures::note(
            "x",
            1,
            vec![vec!["subject", "hi"], vec!["subject", "second"]],
        );
        assert_eq!(event.first_tag_value("subject"), Some("hi"));
        assert_eq!(event.first_tag_value("e"), None);
    }

    #[test]
    fn template_omits_empty_pubkey() {
        let template = UnsignedEvent {
            pubkey: String::new(),
            created_at: 10,
            kind: KIND_TEXT_NOTE,
            tags: vec![],
            content: "hi".into(),
        };
        let json = serde_json::to_string(&template).unwrap();
        assert!(!json.contains("pubkey"));
    }

    #[test]
    fn sdk_conversion_preserves_the_signed_event() {
        use nostr_sdk::{EventBuilder, Keys, Kind, Tag};

        let keys = Keys::generate();
        let signed = EventBuilder::new(Kind::TextNote, "gm")
            .tag(Tag::parse(["subject", "hello"]).unwrap())
            .sign_with_keys(&keys)
            .unwrap();

        let event = Event::from_sdk(&signed);
        assert_eq!(event.pubkey, keys.public_key().to_hex());
        assert_eq!(event.tags, vec![vec!["subject".to_string(), "hello".to_string()]]);
        assert_eq!(event.sig.len(), 128);

        let back = event.to_sdk().unwrap();
        assert_eq!(back.id, signed.id);
        assert_eq!(back.sig, signed.sig);
    }

    #[test]
    fn short_hex_handles_short_input() {
        assert_eq!(short_hex("abc"), "abc");
        assert_eq!(short_hex(&"0123456789".repeat(2)), "01234567");
    }
}
