//! Upstream API-key rotation.
//!
//! A call is first attempted with the current key. Retryable failures (throttling,
//! 5xx, transport errors) move on to the next key, at most once per distinct key.
//! Terminal failures are returned straight away: a malformed query or a missing
//! deployment will not get better with another credential.

use std::fmt::{Debug, Formatter};
use std::future::Future;
use std::str::FromStr;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Instant;

use tracing::{debug, warn};

use crate::data_source::SourceError;
use crate::ValidationError;

/// How the starting key is chosen for each call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RotationStrategy {
    /// Every call starts one key further along, spreading load across keys.
    RoundRobin,
    /// Calls stay on the last key that worked and only move after a retryable failure.
    #[default]
    Failover,
}

impl RotationStrategy {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::RoundRobin => "round-robin",
            Self::Failover => "failover",
        }
    }
}

impl FromStr for RotationStrategy {
    type Err = ValidationError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "round-robin" | "round_robin" | "roundrobin" => Ok(Self::RoundRobin),
            "failover" => Ok(Self::Failover),
            other => Err(ValidationError::InvalidRotationStrategy {
                value: other.to_owned(),
            }),
        }
    }
}

#[derive(Debug)]
struct RotationInner {
    current: usize,
    last_used: Vec<Option<Instant>>,
}

/// Rotates among upstream API keys on retryable failures.
pub struct KeyRotationManager {
    keys: Vec<String>,
    strategy: RotationStrategy,
    inner: Mutex<RotationInner>,
}

impl Debug for KeyRotationManager {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyRotationManager")
            .field("keys", &self.keys.len())
            .field("strategy", &self.strategy)
            .finish()
    }
}

impl KeyRotationManager {
    /// Builds a manager over `keys` in priority order. Blank and repeated keys are dropped.
    pub fn new(
        keys: impl IntoIterator<Item = String>,
        strategy: RotationStrategy,
    ) -> Result<Self, ValidationError> {
        let mut unique: Vec<String> = Vec::new();
        for key in keys {
            let key = key.trim().to_owned();
            if !key.is_empty() && !unique.contains(&key) {
                unique.push(key);
            }
        }
        if unique.is_empty() {
            return Err(ValidationError::NoApiKeys);
        }

        let last_used = vec![None; unique.len()];
        Ok(Self {
            keys: unique,
            strategy,
            inner: Mutex::new(RotationInner {
                current: 0,
                last_used,
            }),
        })
    }

    fn lock(&self) -> MutexGuard<'_, RotationInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub const fn strategy(&self) -> RotationStrategy {
        self.strategy
    }

    pub fn current_index(&self) -> usize {
        self.lock().current
    }

    pub fn last_used(&self, index: usize) -> Option<Instant> {
        self.lock().last_used.get(index).copied().flatten()
    }

    fn starting_index(&self) -> usize {
        let mut inner = self.lock();
        let start = inner.current;
        if self.strategy == RotationStrategy::RoundRobin {
            inner.current = (start + 1) % self.keys.len();
        }
        start
    }

    fn mark_used(&self, index: usize) {
        let mut inner = self.lock();
        if let Some(slot) = inner.last_used.get_mut(index) {
            *slot = Some(Instant::now());
        }
    }

    fn mark_good(&self, index: usize) {
        if self.strategy == RotationStrategy::Failover {
            self.lock().current = index;
        }
    }

    /// Calls `call` with the current key, moving to the next key after each
    /// retryable failure. Gives up after every distinct key has been tried once.
    pub async fn execute_with_retry<T, F, Fut>(&self, mut call: F) -> Result<T, SourceError>
    where
        F: FnMut(String) -> Fut,
        Fut: Future<Output = Result<T, SourceError>>,
    {
        let total = self.keys.len();
        let start = self.starting_index();
        let mut last_error = None;

        for attempt in 0..total {
            let index = (start + attempt) % total;
            self.mark_used(index);

            match call(self.keys[index].clone()).await {
                Ok(value) => {
                    self.mark_good(index);
                    return Ok(value);
                }
                Err(error) if error.retryable() => {
                    debug!(
                        key_index = index,
                        attempt = attempt + 1,
                        error = %error,
                        "retryable upstream failure; rotating api key"
                    );
                    last_error = Some(error);
                }
                Err(error) => return Err(error),
            }
        }

        let error = last_error
            .unwrap_or_else(|| SourceError::internal("key rotation ran without attempts"));
        warn!(keys = total, error = %error, "all api keys failed");
        if self.strategy == RotationStrategy::Failover {
            self.lock().current = (start + 1) % total;
        }
        Err(error)
    }
}
