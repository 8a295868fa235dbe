//! Reference tokenizing for note content (NIP-08, NIP-21, NIP-27).
//!
//! Content is split once into typed spans; rendering happens separately in
//! [`crate::render`], so substituted text is never parsed again.

use crate::event::tags_named;
use nostr_sdk::nips::nip19::{FromBech32, Nip19, ToBech32};
use nostr_sdk::{EventId, PublicKey};
use regex::Regex;
use std::sync::LazyLock;

/// NIP-21 URI scheme prefix.
pub const NOSTR_SCHEME: &str = "nostr:";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ReferenceError {
    #[error("invalid nostr reference '{raw}': {reason}")]
    InvalidReference { raw: String, reason: String },
    #[error("'{0}' is not a profile identifier")]
    NotAProfile(String),
    #[error("'{0}' is not an event identifier")]
    NotAnEvent(String),
}

/// A typed piece of note content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Span<'a> {
    Text(&'a str),
    Profile { raw: &'a str, pubkey: String },
    Event { raw: &'a str, id: String },
    Url(&'a str),
}

/// Distinct references found in a note, in order of first appearance.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct References {
    pub profiles: Vec<String>,
    pub events: Vec<String>,
}

/// `nostr:` URIs, `#[n]` index mentions and plain URLs.
static REFERENCE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"nostr:(?P<bech>(?:npub|nprofile|note|nevent)1[a-z0-9]+)|nostr:(?P<hex>[0-9a-fA-F]{64})\b|#\[(?P<index>\d+)\]|(?P<url>https?://\S+)",
    )
    .expect("reference pattern is valid")
});

/// Split content into spans.
///
/// `tags` resolves `#[n]` index mentions and disambiguates bare hex
/// references: a hex id carried by an `e` tag is an event, anything else is a
/// profile. A malformed bech32 payload fails the whole parse.
pub fn tokenize<'a>(content: &'a str, tags: &[Vec<String>]) -> Result<Vec<Span<'a>>, ReferenceError> {
    let mut spans = Vec::new();
    let mut last = 0;

    for caps in REFERENCE_RE.captures_iter(content) {
        let Some(whole) = caps.get(0) else {
            continue;
        };
        let raw = whole.as_str();

        let span = if let Some(bech) = caps.name("bech") {
            bech32_span(raw, bech.as_str())?
        } else if let Some(hex) = caps.name("hex") {
            let hex = hex.as_str().to_lowercase();
            if tags_named(tags, "e").any(|t| t.get(1).map(|v| v.eq_ignore_ascii_case(&hex)) == Some(true)) {
                Span::Event { raw, id: hex }
            } else {
                Span::Profile { raw, pubkey: hex }
            }
        } else if let Some(index) = caps.name("index") {
            index_span(raw, index.as_str(), tags)
        } else {
            Span::Url(raw)
        };

        if whole.start() > last {
            spans.push(Span::Text(&content[last..whole.start()]));
        }
        spans.push(span);
        last = whole.end();
    }

    if last < content.len() {
        spans.push(Span::Text(&content[last..]));
    }
    Ok(spans)
}

fn bech32_span<'a>(raw: &'a str, bech: &str) -> Result<Span<'a>, ReferenceError> {
    let decoded = Nip19::from_bech32(bech).map_err(|e| ReferenceError::InvalidReference {
        raw: raw.to_string(),
        reason: e.to_string(),
    })?;
    Ok(match decoded {
        Nip19::Pubkey(pk) => Span::Profile { raw, pubkey: pk.to_hex() },
        Nip19::Profile(profile) => Span::Profile {
            raw,
            pubkey: profile.public_key.to_hex(),
        },
        Nip19::EventId(id) => Span::Event { raw, id: id.to_hex() },
        Nip19::Event(event) => Span::Event {
            raw,
            id: event.event_id.to_hex(),
        },
        _ => Span::Text(raw),
    })
}

/// Tag values are decoded like any other identifier; one that does not
/// decode leaves the marker as text.
fn index_span<'a>(raw: &'a str, index: &str, tags: &[Vec<String>]) -> Span<'a> {
    let tag = index.parse::<usize>().ok().and_then(|i| tags.get(i));
    let span = match tag.map(|t| t.as_slice()) {
        Some([name, value, ..]) if name == "p" => decode_pubkey(value)
            .ok()
            .map(|pubkey| Span::Profile { raw, pubkey }),
        Some([name, value, ..]) if name == "e" => decode_event_id(value)
            .ok()
            .map(|id| Span::Event { raw, id }),
        _ => None,
    };
    span.unwrap_or(Span::Text(raw))
}

/// Collect the distinct profile and event references of a note.
pub fn extract_references(content: &str, tags: &[Vec<String>]) -> Result<References, ReferenceError> {
    let mut refs = References::default();
    for span in tokenize(content, tags)? {
        match span {
            Span::Profile { pubkey, .. } if !refs.profiles.contains(&pubkey) => {
                refs.profiles.push(pubkey)
            }
            Span::Event { id, .. } if !refs.events.contains(&id) => refs.events.push(id),
            _ => {}
        }
    }
    Ok(refs)
}

fn strip_scheme(input: &str) -> &str {
    let input = input.trim();
    input.strip_prefix(NOSTR_SCHEME).unwrap_or(input)
}

fn is_hex_id(input: &str) -> bool {
    input.len() == 64 && input.chars().all(|c| c.is_ascii_hexdigit())
}

/// Decode a pubkey given as hex, `npub1…` or `nprofile1…` (optionally `nostr:`-prefixed).
pub fn decode_pubkey(input: &str) -> Result<String, ReferenceError> {
    let input = strip_scheme(input);
    if is_hex_id(input) {
        return Ok(input.to_lowercase());
    }
    match Nip19::from_bech32(input) {
        Ok(Nip19::Pubkey(pk)) => Ok(pk.to_hex()),
        Ok(Nip19::Profile(profile)) => Ok(profile.public_key.to_hex()),
        Ok(_) => Err(ReferenceError::NotAProfile(input.to_string())),
        Err(e) => Err(ReferenceError::InvalidReference {
            raw: input.to_string(),
            reason: e.to_string(),
        }),
    }
}

/// Decode an event id given as hex, `note1…` or `nevent1…` (optionally `nostr:`-prefixed).
pub fn decode_event_id(input: &str) -> Result<String, ReferenceError> {
    let input = strip_scheme(input);
    if is_hex_id(input) {
        return Ok(input.to_lowercase());
    }
    match Nip19::from_bech32(input) {
        Ok(Nip19::EventId(id)) => Ok(id.to_hex()),
        Ok(Nip19::Event(event)) => Ok(event.event_id.to_hex()),
        Ok(_) => Err(ReferenceError::NotAnEvent(input.to_string())),
        Err(e) => Err(ReferenceError::InvalidReference {
            raw: input.to_string(),
            reason: e.to_string(),
        }),
    }
}

/// `npub1…` encoding of a hex pubkey.
pub fn npub(pubkey_hex: &str) -> Option<String> {
    PublicKey::from_hex(pubkey_hex).ok()?.to_bech32().ok()
}

/// `note1…` encoding of a hex event id.
pub fn note_id(event_hex: &str) -> Option<String> {
    EventId::from_hex(event_hex).ok()?.to_bech32().ok()
}

/// Compact npub for headers: `npub1abc...wxyz`; falls back to the hex prefix.
pub fn short_npub(pubkey_hex: &str) -> String {
    match npub(pubkey_hex) {
        Some(npub) if npub.len() > 12 => format!("{}...{}", &npub[..8], &npub[npub.len() - 4..]),
        Some(npub) => npub,
        None => crate::event::short_hex(pubkey_hex).to_string(),
    }
}
