//! The word lookup service.
//!
//! Failures never leave this module as anything but "no match": the tracker
//! logs them and carries on without an annotation for the affected words.

pub mod http;

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use futures::future::join_all;
use thiserror::Error;

use crate::models::Note;
use crate::log_warn;

const ENABLE_LOGS: bool = true;

pub use http::HttpGateway;

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("lookup timed out after {0:?}")]
    Timeout(Duration),
    #[error("lookup request failed: {0}")]
    Http(#[source] reqwest::Error),
    #[error("lookup service answered with status {0}")]
    Status(u16),
    #[error("malformed lookup response: {0}")]
    Decode(String),
}

#[async_trait]
pub trait LookupGateway: Send + Sync {
    /// One-shot startup call. Returns the service's greeting message.
    async fn initialize(&self) -> Result<String, GatewayError>;

    /// Batched relevance check: every relevant word maps to its notes.
    async fn check_words(&self, words: &[String]) -> Result<HashMap<String, Vec<Note>>, GatewayError>;

    /// Full note for a word, `None` when the service has nothing.
    async fn get_note(&self, word: &str) -> Result<Option<Note>, GatewayError>;
}

/// Resolves `words` in chunks of `batch_size`, all chunks in flight at once,
/// each bounded by `timeout`. A chunk that fails or times out contributes no
/// matches. Words with an empty note list are treated as not relevant.
pub async fn lookup_relevant<G>(
    gateway: &G,
    words: &[String],
    batch_size: usize,
    timeout: Duration,
) -> HashMap<String, Vec<Note>>
where
    G: LookupGateway + ?Sized,
{
    if words.is_empty() {
        return HashMap::new();
    }

    let chunks = words.chunks(batch_size.max(1)).map(|chunk| async move {
        match tokio::time::timeout(timeout, gateway.check_words(chunk)).await {
            Ok(Ok(matches)) => Some((chunk, matches)),
            Ok(Err(err)) => {
                log_warn!("lookup of {} words failed: {}", chunk.len(), err);
                None
            }
            Err(_) => {
                log_warn!(
                    "lookup of {} words failed: {}",
                    chunk.len(),
                    GatewayError::Timeout(timeout)
                );
                None
            }
        }
    });

    let mut relevant = HashMap::new();
    for (chunk, matches) in join_all(chunks).await.into_iter().flatten() {
        for (word, notes) in matches {
            if notes.is_empty() || !chunk.contains(&word) {
                continue;
            }
            relevant.insert(word, notes);
        }
    }

    relevant
}
