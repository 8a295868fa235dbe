//! Plain-text formatting of notes and relays for the command line.

use chrono::{TimeZone, Utc};
use nostr_core::render::{event_placeholder, profile_handle};
use nostr_core::{
    hashtags, relay_label, reposted_id, resolve_event, short_hex, subject, Event, LinkMarkup,
    ProfileNames, RelayMetadata, RenderOptions,
};

fn timestamp(created_at: u64) -> String {
    i64::try_from(created_at)
        .ok()
        .and_then(|secs| Utc.timestamp_opt(secs, 0).single())
        .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| created_at.to_string())
}

/// A note as a short block: header, optional subject, resolved content.
pub fn format_note(event: &Event, names: &dyn ProfileNames, links: LinkMarkup) -> String {
    let mut out = format!(
        "@{} · {} · {}",
        profile_handle(&event.pubkey, names),
        timestamp(event.created_at),
        short_hex(&event.id)
    );
    if let Some(original) = reposted_id(event) {
        out.push_str(&format!("\n  reposted {}", event_placeholder(original)));
        return out;
    }
    if let Some(subject) = subject(event) {
        out.push_str(&format!("\n  [{}]", subject));
    }
    let body = resolve_event(event, names, RenderOptions { links });
    for line in body.lines() {
        out.push_str("\n  ");
        out.push_str(line);
    }
    let tags = hashtags(&event.content);
    if !tags.is_empty() {
        out.push_str(&format!("\n  #{}", tags.join(" #")));
    }
    out
}

/// One line per relay: label, URL and advertised software.
pub fn format_relay(url: &str, metadata: Option<&RelayMetadata>) -> String {
    let label = relay_label(url, metadata);
    let mut line = format!("{:<24} {}", label, url);
    if let Some(meta) = metadata {
        if let Some(software) = &meta.software {
            line.push_str(&format!(" ({}", software));
            if let Some(version) = &meta.version {
                line.push_str(&format!(" {}", version));
            }
            line.push(')');
        }
        if let Some(nips) = &meta.supported_nips {
            line.push_str(&format!(" nips: {}", nips.len()));
        }
    } else {
        line.push_str(" (no information document)");
    }
    line
}
