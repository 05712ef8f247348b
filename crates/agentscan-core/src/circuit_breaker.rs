use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use dashmap::DashMap;
use tracing::{info, warn};

use crate::data_source::SourceError;

/// Runtime circuit state for one upstream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

/// Circuit breaker thresholds and timers.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CircuitBreakerConfig {
    pub failure_threshold: u32,
    pub cooldown: Duration,
    /// Applied to the cooldown each time a half-open trial fails.
    pub backoff_multiplier: f64,
    pub max_cooldown: Duration,
    /// Spread reopen deadlines by +/- 20%.
    pub jitter: bool,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 3,
            cooldown: Duration::from_secs(30),
            backoff_multiplier: 2.0,
            max_cooldown: Duration::from_secs(300),
            jitter: false,
        }
    }
}

/// Point-in-time view of a breaker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CircuitSnapshot {
    pub state: CircuitState,
    pub consecutive_failures: u32,
    pub opened_at: Option<Instant>,
    pub cooldown: Duration,
}

#[derive(Debug)]
struct CircuitInner {
    state: CircuitState,
    consecutive_failures: u32,
    opened_at: Option<Instant>,
    cooldown: Duration,
    trial_in_flight: bool,
}

impl CircuitInner {
    fn new(cooldown: Duration) -> Self {
        Self {
            state: CircuitState::Closed,
            consecutive_failures: 0,
            opened_at: None,
            cooldown,
            trial_in_flight: false,
        }
    }
}

/// Thread-safe circuit breaker for one named upstream.
#[derive(Debug)]
pub struct CircuitBreaker {
    name: String,
    config: CircuitBreakerConfig,
    inner: Mutex<CircuitInner>,
}

impl Default for CircuitBreaker {
    fn default() -> Self {
        Self::new("default", CircuitBreakerConfig::default())
    }
}

impl CircuitBreaker {
    pub fn new(name: impl Into<String>, config: CircuitBreakerConfig) -> Self {
        Self {
            name: name.into(),
            config,
            inner: Mutex::new(CircuitInner::new(config.cooldown)),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    fn lock(&self) -> MutexGuard<'_, CircuitInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Admits a call. An open breaker admits exactly one trial once its cooldown
    /// has elapsed; every other caller is refused until that trial resolves.
    ///
    /// Only [`execute`](Self::execute) admits, so every trial it hands out is
    /// resolved or released.
    fn admit(&self) -> Admission {
        let mut inner = self.lock();
        match inner.state {
            CircuitState::Closed => Admission::Normal,
            CircuitState::HalfOpen => {
                if inner.trial_in_flight {
                    Admission::Rejected
                } else {
                    inner.trial_in_flight = true;
                    Admission::Trial
                }
            }
            CircuitState::Open => {
                let can_probe = inner
                    .opened_at
                    .map(|opened_at| opened_at.elapsed() >= inner.cooldown)
                    .unwrap_or(true);

                if can_probe {
                    inner.state = CircuitState::HalfOpen;
                    inner.opened_at = None;
                    inner.trial_in_flight = true;
                    info!(upstream = %self.name, "circuit half-open; admitting trial call");
                    Admission::Trial
                } else {
                    Admission::Rejected
                }
            }
        }
    }

    pub fn record_success(&self) {
        let mut inner = self.lock();
        if inner.state != CircuitState::Closed {
            info!(upstream = %self.name, "circuit closed after successful trial");
        }
        inner.state = CircuitState::Closed;
        inner.consecutive_failures = 0;
        inner.opened_at = None;
        inner.cooldown = self.config.cooldown;
        inner.trial_in_flight = false;
    }

    pub fn record_failure(&self) {
        let mut inner = self.lock();
        inner.consecutive_failures = inner.consecutive_failures.saturating_add(1);

        if inner.state == CircuitState::HalfOpen {
            inner.cooldown = self.next_cooldown(inner.cooldown);
            inner.state = CircuitState::Open;
            inner.opened_at = Some(Instant::now());
            inner.trial_in_flight = false;
            warn!(
                upstream = %self.name,
                cooldown_ms = inner.cooldown.as_millis() as u64,
                "circuit trial failed; reopening"
            );
        } else if inner.state == CircuitState::Closed
            && inner.consecutive_failures >= self.config.failure_threshold
        {
            inner.cooldown = self.jittered(self.config.cooldown);
            inner.state = CircuitState::Open;
            inner.opened_at = Some(Instant::now());
            warn!(
                upstream = %self.name,
                failures = inner.consecutive_failures,
                cooldown_ms = inner.cooldown.as_millis() as u64,
                "circuit opened"
            );
        }
    }

    /// Releases a trial slot whose call was dropped before it resolved.
    fn abandon_trial(&self) {
        let mut inner = self.lock();
        if inner.state == CircuitState::HalfOpen {
            inner.trial_in_flight = false;
        }
    }

    /// Runs `call` behind the breaker.
    ///
    /// An open breaker returns a `CircuitOpen` error without invoking `call`.
    /// Any error returned by `call` counts as a failure.
    pub async fn execute<T, F, Fut>(&self, call: F) -> Result<T, SourceError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, SourceError>>,
    {
        let admission = self.admit();
        if admission == Admission::Rejected {
            return Err(SourceError::circuit_open(&self.name));
        }

        let mut pending = PendingTrial {
            breaker: self,
            armed: admission == Admission::Trial,
        };
        let result = call().await;
        pending.armed = false;

        match &result {
            Ok(_) => self.record_success(),
            Err(_) => self.record_failure(),
        }
        result
    }

    pub fn state(&self) -> CircuitState {
        self.lock().state
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.lock().consecutive_failures
    }

    pub fn snapshot(&self) -> CircuitSnapshot {
        let inner = self.lock();
        CircuitSnapshot {
            state: inner.state,
            consecutive_failures: inner.consecutive_failures,
            opened_at: inner.opened_at,
            cooldown: inner.cooldown,
        }
    }

    fn next_cooldown(&self, current: Duration) -> Duration {
        let scaled = current.as_secs_f64() * self.config.backoff_multiplier.max(1.0);
        let capped = scaled.min(self.config.max_cooldown.as_secs_f64());
        self.jittered(Duration::from_secs_f64(capped))
    }

    fn jittered(&self, delay: Duration) -> Duration {
        if !self.config.jitter {
            return delay;
        }
        let spread_ms = (delay.as_millis() as f64 * 0.2) as u64;
        let offset = fastrand::u64(0..=(spread_ms * 2));
        let total_ms = delay.as_millis() as i64 + (offset as i64 - spread_ms as i64);
        Duration::from_millis(total_ms.max(0) as u64)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Admission {
    Normal,
    Trial,
    Rejected,
}

struct PendingTrial<'a> {
    breaker: &'a CircuitBreaker,
    armed: bool,
}

impl Drop for PendingTrial<'_> {
    fn drop(&mut self) {
        if self.armed {
            self.breaker.abandon_trial();
        }
    }
}

/// One breaker per named upstream, shared by every caller in the process.
#[derive(Debug, Default)]
pub struct CircuitBreakerRegistry {
    config: CircuitBreakerConfig,
    breakers: DashMap<String, Arc<CircuitBreaker>>,
}

impl CircuitBreakerRegistry {
    pub fn new(config: CircuitBreakerConfig) -> Self {
        Self {
            config,
            breakers: DashMap::new(),
        }
    }

    pub fn get_or_create(&self, upstream: &str) -> Arc<CircuitBreaker> {
        if let Some(existing) = self.breakers.get(upstream) {
            return Arc::clone(existing.value());
        }
        self.breakers
            .entry(upstream.to_owned())
            .or_insert_with(|| Arc::new(CircuitBreaker::new(upstream, self.config)))
            .value()
            .clone()
    }

    pub fn get(&self, upstream: &str) -> Option<Arc<CircuitBreaker>> {
        self.breakers.get(upstream).map(|entry| Arc::clone(entry.value()))
    }
}
