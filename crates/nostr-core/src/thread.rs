//! Root/reply linkage (NIP-10) and thread partitioning.
//!
//! Marked `e` tags (`["e", <id>, <relay>, "root" | "reply"]`) are authoritative.
//! Without markers the positional convention applies: the first `e` tag is the
//! root and, when there are several, the last one is the immediate parent.
//! A lone unmarked `e` tag is only a root. Peers rely on this exact reading, so
//! it is kept as is even where it is ambiguous.

use crate::dedup::EventSet;
use crate::event::{tags_named, Event, UnsignedEvent, KIND_TEXT_NOTE};

pub const MARKER_ROOT: &str = "root";
pub const MARKER_REPLY: &str = "reply";

/// Position of the marker inside an `e` tag.
const MARKER_INDEX: usize = 3;

/// Thread a view is focused on. `reply_count` is derived, never authoritative.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThreadInfo {
    pub root_id: String,
    pub reply_count: usize,
}

impl ThreadInfo {
    pub fn new(root_id: impl Into<String>) -> Self {
        Self {
            root_id: root_id.into(),
            reply_count: 0,
        }
    }
}

fn marked<'a>(tags: &'a [Vec<String>], marker: &str) -> Option<&'a str> {
    tags_named(tags, "e")
        .find(|t| t.get(MARKER_INDEX).map(|m| m.as_str()) == Some(marker))
        .and_then(|t| t.get(1))
        .map(|v| v.as_str())
}

fn e_values(tags: &[Vec<String>]) -> Vec<&str> {
    tags_named(tags, "e")
        .filter_map(|t| t.get(1))
        .map(|v| v.as_str())
        .collect()
}

/// Thread root referenced by an event, if any.
pub fn root_id(event: &Event) -> Option<&str> {
    marked(&event.tags, MARKER_ROOT).or_else(|| e_values(&event.tags).first().copied())
}

/// Immediate parent of an event, if one can be determined.
pub fn reply_id(event: &Event) -> Option<&str> {
    if let Some(id) = marked(&event.tags, MARKER_REPLY) {
        return Some(id);
    }
    let values = e_values(&event.tags);
    if values.len() > 1 {
        values.last().copied()
    } else {
        None
    }
}

/// Root to open when a note is selected: its declared root or the note itself.
pub fn thread_root_for(event: &Event) -> &str {
    root_id(event).unwrap_or(&event.id)
}

/// Whether any `e` tag of the event points at `root`.
pub fn references_root(event: &Event, root: &str) -> bool {
    e_values(&event.tags).contains(&root)
}

/// A thread partitioned into its root and a flat, ordered reply list.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ThreadSplit {
    pub root: Option<Event>,
    pub replies: Vec<Event>,
}

/// Partition fetched thread events. No reply tree is built.
pub fn split_thread<I>(root: &str, events: I) -> ThreadSplit
where
    I: IntoIterator<Item = Event>,
{
    let set: EventSet = events.into_iter().collect();
    let mut split = ThreadSplit::default();
    for event in set.into_vec() {
        if event.id == root {
            split.root = Some(event);
        } else {
            split.replies.push(event);
        }
    }
    split
}

/// Tags for a new note: optional NIP-14 subject plus NIP-10 reply linkage.
pub fn reply_tags(subject: Option<&str>, reply_to: Option<&str>, root: Option<&str>) -> Vec<Vec<String>> {
    let mut tags = Vec::new();
    if let Some(subject) = subject.map(str::trim).filter(|s| !s.is_empty()) {
        tags.push(vec!["subject".to_string(), subject.to_string()]);
    }
    if let Some(reply_to) = reply_to {
        tags.push(e_tag(reply_to, MARKER_REPLY));
    }
    if let Some(root) = root {
        if Some(root) != reply_to {
            tags.push(e_tag(root, MARKER_ROOT));
        }
    }
    tags
}

fn e_tag(id: &str, marker: &str) -> Vec<String> {
    vec!["e".to_string(), id.to_string(), String::new(), marker.to_string()]
}

/// Build an unsigned kind 1 note template.
pub fn note_template(
    content: &str,
    subject: Option<&str>,
    reply_to: Option<&str>,
    root: Option<&str>,
    created_at: u64,
) -> UnsignedEvent {
    UnsignedEvent {
        pubkey: String::new(),
        created_at,
        kind: KIND_TEXT_NOTE,
        tags: reply_tags(subject, reply_to, root),
        content: content.trim().to_string(),
    }
}
