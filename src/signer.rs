//! Signer seam and a key-file implementation.

use crate::error::SignerError;
use async_trait::async_trait;
use nostr_core::{Event, UnsignedEvent};
use nostr_sdk::{EventBuilder, Keys, Kind, SecretKey, Tag, Timestamp};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

/// External holder of the user's key.
#[async_trait]
pub trait Signer: Send + Sync {
    /// Hex public key of the signing identity.
    async fn get_public_key(&self) -> Result<String, SignerError>;

    /// Sign a template, returning the complete event.
    async fn sign_event(&self, template: UnsignedEvent) -> Result<Event, SignerError>;
}

/// Retry `get_public_key` while the signer is unavailable.
///
/// Signers injected by other processes can take a moment to appear. A
/// rejection ends the probe immediately.
pub async fn probe_signer(
    signer: &dyn Signer,
    attempts: u32,
    delay: Duration,
) -> Result<String, SignerError> {
    let attempts = attempts.max(1);
    let mut last_error = SignerError::Unavailable("not probed".to_string());

    for attempt in 1..=attempts {
        match signer.get_public_key().await {
            Ok(pubkey) => {
                info!("Signer available after {} attempt(s)", attempt);
                return Ok(pubkey);
            }
            Err(e @ SignerError::Rejected(_)) => return Err(e),
            Err(e) => {
                debug!("Signer probe {}/{} failed: {}", attempt, attempts, e);
                last_error = e;
                if attempt < attempts {
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }

    Err(last_error)
}

#[derive(Deserialize)]
struct IdentityFile {
    nsec: String,
}

/// Signs with an `nsec` read from an identity JSON file (`{"nsec": "..."}`).
///
/// The file is read on every call, so an identity that appears later is
/// picked up without restarting.
#[derive(Debug, Clone)]
pub struct KeyFileSigner {
    path: PathBuf,
}

impl KeyFileSigner {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn keys(&self) -> Result<Keys, SignerError> {
        let content = std::fs::read_to_string(&self.path).map_err(|e| {
            SignerError::Unavailable(format!("cannot read {}: {}", self.path.display(), e))
        })?;
        let identity: IdentityFile = serde_json::from_str(&content).map_err(|e| {
            SignerError::Unavailable(format!("invalid identity file {}: {}", self.path.display(), e))
        })?;
        let secret_key = SecretKey::parse(identity.nsec.trim())
            .map_err(|e| SignerError::Unavailable(format!("failed to parse nsec: {}", e)))?;
        Ok(Keys::new(secret_key))
    }
}

#[async_trait]
impl Signer for KeyFileSigner {
    async fn get_public_key(&self) -> Result<String, SignerError> {
        Ok(self.keys()?.public_key().to_hex())
    }

    async fn sign_event(&self, template: UnsignedEvent) -> Result<Event, SignerError> {
        let keys = self.keys()?;

        let tags = template
            .tags
            .into_iter()
            .map(Tag::parse)
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| SignerError::Rejected(format!("invalid tag: {}", e)))?;

        let signed = EventBuilder::new(Kind::from(template.kind), template.content)
            .tags(tags)
            .custom_created_at(Timestamp::from(template.created_at))
            .sign_with_keys(&keys)
            .map_err(|e| SignerError::Rejected(e.to_string()))?;

        debug!("Signed event {}", signed.id.to_hex());
        Ok(Event::from_sdk(&signed))
    }
}
