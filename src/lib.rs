//! relaynote: a multi-relay Nostr client core.
//!
//! Queries fan out to several relays, results are merged into ordered,
//! deduplicated views, threads are reconstructed from NIP-10 tags and
//! references in note content resolve against a session metadata cache.

pub mod cache;
pub mod config;
pub mod display;
pub mod error;
pub mod orchestrator;
pub mod relay;
pub mod signer;
pub mod state;

pub use cache::MetadataCache;
pub use config::{Config, DEFAULT_RELAYS};
pub use error::{PublishError, SignerError};
pub use orchestrator::{Draft, Orchestrator, QueryLimits, RefreshHandle};
pub use relay::{query_relays, RelayPool, RelayQuery};
pub use signer::{probe_signer, KeyFileSigner, Signer};
pub use state::{Action, AppState, View};

pub use nostr_core;
