//! Search provider seam.
//!
//! The engine only sees [`SearchProvider`]; transport, authentication and
//! pagination live in implementations. Implementations live in
//! [`crate::catalog`] (offline) or test stubs.

use std::thread;
use std::time::Duration;

use thiserror::Error;

use crate::models::CandidateTrack;
use crate::strategy::SearchQuery;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ProviderError {
    /// Timeouts, rate limiting, flaky network. Retried, then treated as no results.
    #[error("transient provider failure: {0}")]
    Transient(String),
    /// Bad credentials or authorization. Aborts the whole run.
    #[error("fatal provider failure: {0}")]
    Fatal(String),
}

pub trait SearchProvider: Send + Sync {
    fn search(&self, query: &SearchQuery) -> Result<Vec<CandidateTrack>, ProviderError>;
}

impl<P: SearchProvider + ?Sized> SearchProvider for &P {
    fn search(&self, query: &SearchQuery) -> Result<Vec<CandidateTrack>, ProviderError> {
        (**self).search(query)
    }
}

impl<P: SearchProvider + ?Sized> SearchProvider for Box<P> {
    fn search(&self, query: &SearchQuery) -> Result<Vec<CandidateTrack>, ProviderError> {
        (**self).search(query)
    }
}

/// Retries transient failures with a fixed delay. Fatal errors pass straight through.
pub struct RetryingProvider<P> {
    inner: P,
    max_retries: u32,
    delay: Duration,
}

impl<P: SearchProvider> RetryingProvider<P> {
    pub fn new(inner: P, max_retries: u32, delay: Duration) -> Self {
        Self {
            inner,
            max_retries,
            delay,
        }
    }

    pub fn inner(&self) -> &P {
        &self.inner
    }
}

impl<P: SearchProvider> SearchProvider for RetryingProvider<P> {
    fn search(&self, query: &SearchQuery) -> Result<Vec<CandidateTrack>, ProviderError> {
        let mut attempt = 0;
        loop {
            match self.inner.search(query) {
                Err(ProviderError::Transient(reason)) if attempt < self.max_retries => {
                    attempt += 1;
                    log::debug!(
                        "[RETRY] {}/{} for '{}': {}",
                        attempt,
                        self.max_retries,
                        query.text,
                        reason
                    );
                    if !self.delay.is_zero() {
                        thread::sleep(self.delay);
                    }
                }
                other => return other,
            }
        }
    }
}
