//! Credential rotation and retry policy around the raw rewrite call.
//!
//! Bounded retries; exponential backoff with jitter on transient failures;
//! round-robin rotation across the key pool on quota/credential failures.
//! Rotation state is persisted so a restart resumes on the same key.

use super::{RewriteError, Rewriter};
use crate::store::Store;
use anyhow::{Context, Result};
use rand::Rng;
use std::time::Duration;

/// Value written to `requests_made` when a credential is retired for quota.
const QUOTA_SENTINEL: u64 = 999_999;

pub struct RotatingRewriter<R: Rewriter> {
    rewriter: R,
    keys: Vec<String>,
    active_index: usize,
    max_retries: u32,
}

impl<R: Rewriter> RotatingRewriter<R> {
    /// Restore rotation state from the store and install the active key.
    /// The pool must hold at least one credential.
    pub fn resume(mut rewriter: R, keys: Vec<String>, max_retries: u32, store: &Store) -> Result<Self> {
        anyhow::ensure!(!keys.is_empty(), "credential pool is empty");

        let state = store.rotation_state().context("failed to load rotation state")?;
        // A shrunken pool can leave a stale index behind.
        let active_index = state.api_key_index % keys.len();
        rewriter.set_api_key(&keys[active_index]);
        tracing::info!(
            key = active_index + 1,
            pool = keys.len(),
            "rewrite client initialized"
        );

        Ok(Self {
            rewriter,
            keys,
            active_index,
            max_retries,
        })
    }

    pub fn active_index(&self) -> usize {
        self.active_index
    }

    pub fn pool_size(&self) -> usize {
        self.keys.len()
    }

    /// Advance to the next credential, reset its persisted counters, and
    /// reinstall it in the adapter.
    fn rotate(&mut self, store: &Store) -> Result<()> {
        self.active_index = (self.active_index + 1) % self.keys.len();
        store.update_rotation_state(self.active_index, 0, false)?;
        self.rewriter.set_api_key(&self.keys[self.active_index]);
        tracing::info!(key = self.active_index + 1, "rotated to next credential");
        Ok(())
    }

    /// One rewrite call under the full policy. Returns the raw response text;
    /// the caller parses it.
    pub async fn rewrite(&mut self, store: &Store, prompt: &str) -> Result<String> {
        for attempt in 0..self.max_retries {
            tracing::info!(attempt = attempt + 1, key = self.active_index + 1, "rewrite attempt");

            match self.rewriter.rewrite(prompt).await {
                Ok(text) => {
                    let made = store.rotation_state()?.requests_made + 1;
                    store.update_rotation_state(self.active_index, made, false)?;
                    return Ok(text);
                }
                Err(RewriteError::ApiKey(msg)) => {
                    tracing::warn!(attempt = attempt + 1, error = %msg, "credential rejected");
                    // Retire the current key before deciding what comes next.
                    store.update_rotation_state(self.active_index, QUOTA_SENTINEL, true)?;

                    if self.keys.len() == 1 {
                        anyhow::bail!("credential rejected and no alternate key available: {msg}");
                    }
                    // Rotation consumes the attempt but skips the backoff.
                    // Rotating resets the new slot's persisted counters, so
                    // skip it when no attempt remains to use the new key:
                    // the exceeded marker must survive exhaustion.
                    if attempt + 1 < self.max_retries {
                        self.rotate(store)?;
                    }
                }
                Err(RewriteError::Transient(msg)) => {
                    tracing::warn!(attempt = attempt + 1, error = %msg, "transient rewrite failure");
                    if attempt + 1 < self.max_retries {
                        let wait = backoff_delay(attempt);
                        tracing::info!(wait_s = format!("{:.2}", wait.as_secs_f64()), "backing off");
                        tokio::time::sleep(wait).await;
                    }
                }
            }
        }

        anyhow::bail!("rewrite failed after {} attempts", self.max_retries)
    }
}

/// `2^attempt` seconds plus up to one second of jitter.
fn backoff_delay(attempt: u32) -> Duration {
    let base = 2u64.saturating_pow(attempt) as f64;
    let jitter: f64 = rand::thread_rng().gen_range(0.0..1.0);
    Duration::from_secs_f64(base + jitter)
}
