//! Shared Nostr protocol logic for relaynote
//!
//! Everything in this crate is pure: event model and filters, deduplication
//! and ordering, thread linkage, reference tokenizing and rendering, and
//! profile/relay metadata records. Relay I/O and signing live in the
//! application crate.

pub mod content;
pub mod dedup;
pub mod event;
pub mod filter;
pub mod mention;
pub mod metadata;
pub mod render;
pub mod thread;

// Re-export commonly used types
pub use content::{hashtags, is_repost, reposted_id, subject};
pub use dedup::{merge_batches, EventSet};
pub use event::{short_hex, Event, UnsignedEvent, KIND_METADATA, KIND_REPOST, KIND_TEXT_NOTE};
pub use filter::QueryFilter;
pub use mention::{
    decode_event_id, decode_pubkey, extract_references, note_id, npub, short_npub, tokenize,
    ReferenceError, References, Span,
};
pub use metadata::{relay_label, ProfileNames, RelayMetadata, UserMetadata};
pub use render::{render, resolve_content, resolve_event, LinkMarkup, RenderOptions};
pub use thread::{
    note_template, references_root, reply_id, reply_tags, root_id, split_thread, thread_root_for,
    ThreadInfo, ThreadSplit,
};

// Re-export nostr-sdk for convenience
pub use nostr_sdk;
