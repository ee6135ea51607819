//! Retry logic and circuit breaker for unreliable transports.
//!
//! [`ResilientClient`] wraps an arbitrary fallible async operation with
//! exponential-backoff retries, gated by a [`CircuitBreaker`] so a
//! known-failing destination is rejected immediately instead of burning
//! retries against it. Callers can distinguish "the circuit is open, do
//! not bother" ([`RetryError::CircuitOpen`]) from "every attempt failed"
//! ([`RetryError::Exhausted`]).
//!
//! The breaker state is shared mutable data for every caller of one
//! executor instance; all transitions happen behind a mutex.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use rand::Rng;
use serde::Serialize;
use thiserror::Error;
use tracing::{error, info, warn};

use navtrack_core::config::{CircuitSettings, RetrySettings};

/// Circuit breaker states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    /// Normal operation.
    Closed,
    /// Failing; requests rejected until the recovery timeout elapses.
    Open,
    /// Probing whether the destination recovered.
    HalfOpen,
}

/// Retry behavior configuration.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    pub max_retries: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub exponential_base: f64,
    pub jitter_enabled: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_delay: Duration::from_millis(100),
            max_delay: Duration::from_millis(5000),
            exponential_base: 2.0,
            jitter_enabled: true,
        }
    }
}

impl From<&RetrySettings> for RetryConfig {
    fn from(settings: &RetrySettings) -> Self {
        Self {
            max_retries: settings.max_retries,
            initial_delay: Duration::from_millis(settings.initial_delay_ms),
            max_delay: Duration::from_millis(settings.max_delay_ms),
            exponential_base: settings.exponential_base,
            jitter_enabled: settings.jitter_enabled,
        }
    }
}

/// Circuit breaker configuration.
#[derive(Debug, Clone)]
pub struct CircuitBreakerConfig {
    /// Consecutive failures that open the circuit.
    pub failure_threshold: u32,
    /// How long the circuit stays open before probing.
    pub recovery_timeout: Duration,
    /// Concurrent probe attempts allowed while half-open.
    pub half_open_max_requests: u32,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            recovery_timeout: Duration::from_millis(30_000),
            half_open_max_requests: 1,
        }
    }
}

impl From<&CircuitSettings> for CircuitBreakerConfig {
    fn from(settings: &CircuitSettings) -> Self {
        Self {
            failure_threshold: settings.failure_threshold,
            recovery_timeout: Duration::from_millis(settings.recovery_timeout_ms),
            half_open_max_requests: settings.half_open_max_requests,
        }
    }
}

/// Statistics over retried operations.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RetryStats {
    pub total_attempts: u64,
    pub successful: u64,
    pub failed: u64,
    pub retries_triggered: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error_time: Option<DateTime<Utc>>,
}

/// Errors surfaced by [`ResilientClient::execute_with_retry`].
#[derive(Debug, Error)]
pub enum RetryError<E>
where
    E: std::error::Error + 'static,
{
    /// The circuit is open; nothing was executed.
    #[error("circuit breaker is open, request rejected")]
    CircuitOpen,

    /// The client was cancelled between attempts.
    #[error("operation cancelled")]
    Cancelled,

    /// All attempts failed; carries the last underlying error.
    #[error("operation failed after {attempts} attempts")]
    Exhausted {
        attempts: u32,
        #[source]
        source: E,
    },
}

struct BreakerState {
    state: CircuitState,
    failure_count: u32,
    half_open_probes: u32,
    last_state_change: Instant,
}

/// Failure-isolating state machine: Closed -> Open -> HalfOpen -> Closed.
pub struct CircuitBreaker {
    config: CircuitBreakerConfig,
    inner: Mutex<BreakerState>,
}

impl CircuitBreaker {
    pub fn new(config: CircuitBreakerConfig) -> Self {
        Self {
            config,
            inner: Mutex::new(BreakerState {
                state: CircuitState::Closed,
                failure_count: 0,
                half_open_probes: 0,
                last_state_change: Instant::now(),
            }),
        }
    }

    /// Current state, without side effects.
    pub fn state(&self) -> CircuitState {
        self.inner.lock().unwrap().state
    }

    /// Whether an operation may be attempted right now.
    ///
    /// Performs the timed Open -> HalfOpen transition and reserves a probe
    /// slot while half-open.
    pub fn can_attempt(&self) -> bool {
        let mut inner = self.inner.lock().unwrap();
        match inner.state {
            CircuitState::Closed => true,
            CircuitState::Open => {
                if inner.last_state_change.elapsed() >= self.config.recovery_timeout {
                    info!("circuit breaker: open -> half-open");
                    inner.state = CircuitState::HalfOpen;
                    inner.failure_count = 0;
                    inner.half_open_probes = 1;
                    inner.last_state_change = Instant::now();
                    true
                } else {
                    false
                }
            }
            CircuitState::HalfOpen => {
                if inner.half_open_probes < self.config.half_open_max_requests {
                    inner.half_open_probes += 1;
                    true
                } else {
                    false
                }
            }
        }
    }

    /// Record a successful operation.
    pub fn record_success(&self) {
        let mut inner = self.inner.lock().unwrap();
        inner.failure_count = 0;
        if inner.state == CircuitState::HalfOpen {
            info!("circuit breaker: half-open -> closed");
            inner.state = CircuitState::Closed;
            inner.half_open_probes = 0;
            inner.last_state_change = Instant::now();
        }
    }

    /// Record a failed operation.
    pub fn record_failure(&self) {
        let mut inner = self.inner.lock().unwrap();
        inner.failure_count += 1;
        if inner.state == CircuitState::HalfOpen {
            inner.half_open_probes = inner.half_open_probes.saturating_sub(1);
        }
        if inner.state != CircuitState::Open
            && inner.failure_count >= self.config.failure_threshold
        {
            warn!(
                failures = inner.failure_count,
                "circuit breaker: -> open"
            );
            inner.state = CircuitState::Open;
            inner.half_open_probes = 0;
            inner.last_state_change = Instant::now();
        }
    }
}

/// Handle for cancelling a [`ResilientClient`] from another task.
#[derive(Clone)]
pub struct CancelHandle(Arc<AtomicBool>);

impl CancelHandle {
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Executes operations with retry, backoff and circuit breaking.
pub struct ResilientClient {
    retry: RetryConfig,
    breaker: CircuitBreaker,
    stats: Mutex<RetryStats>,
    cancelled: Arc<AtomicBool>,
}

impl ResilientClient {
    pub fn new(retry: RetryConfig, circuit: CircuitBreakerConfig) -> Self {
        Self {
            retry,
            breaker: CircuitBreaker::new(circuit),
            stats: Mutex::new(RetryStats::default()),
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Current circuit breaker state.
    pub fn circuit_state(&self) -> CircuitState {
        self.breaker.state()
    }

    /// Snapshot of the retry statistics.
    pub fn stats(&self) -> RetryStats {
        self.stats.lock().unwrap().clone()
    }

    pub fn reset_stats(&self) {
        *self.stats.lock().unwrap() = RetryStats::default();
    }

    /// Handle that cancels in-flight retry loops between attempts.
    pub fn cancel_handle(&self) -> CancelHandle {
        CancelHandle(self.cancelled.clone())
    }

    /// Execute `operation` with retry and circuit breaking.
    ///
    /// The breaker is consulted once on entry: while the circuit is open
    /// the call fails immediately with [`RetryError::CircuitOpen`] and the
    /// operation is never invoked. Otherwise the operation is attempted up
    /// to `max_retries` times with exponential backoff between failures;
    /// the backoff sleep suspends only the calling task.
    pub async fn execute_with_retry<T, E, F, Fut>(
        &self,
        mut operation: F,
    ) -> Result<T, RetryError<E>>
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = Result<T, E>>,
        E: std::error::Error + 'static,
    {
        if !self.breaker.can_attempt() {
            error!("circuit breaker open: rejecting request");
            return Err(RetryError::CircuitOpen);
        }

        let attempts = self.retry.max_retries.max(1);
        let mut last_error: Option<E> = None;

        for attempt in 0..attempts {
            if self.cancelled.load(Ordering::SeqCst) {
                return Err(RetryError::Cancelled);
            }

            self.stats.lock().unwrap().total_attempts += 1;

            match operation().await {
                Ok(value) => {
                    self.stats.lock().unwrap().successful += 1;
                    self.breaker.record_success();
                    if attempt > 0 {
                        info!(attempt = attempt + 1, "operation succeeded after retry");
                    }
                    return Ok(value);
                }
                Err(err) => {
                    self.stats.lock().unwrap().failed += 1;
                    self.breaker.record_failure();

                    if attempt + 1 < attempts {
                        let delay = self.backoff_delay(attempt);
                        warn!(
                            attempt = attempt + 1,
                            error = %err,
                            delay_ms = delay.as_millis() as u64,
                            "attempt failed, backing off"
                        );
                        self.stats.lock().unwrap().retries_triggered += 1;
                        tokio::time::sleep(delay).await;
                    } else {
                        error!(attempts, error = %err, "retries exhausted");
                    }
                    last_error = Some(err);
                }
            }
        }

        // attempts >= 1, so at least one error was recorded
        let source = match last_error {
            Some(err) => err,
            None => return Err(RetryError::Cancelled),
        };

        {
            let mut stats = self.stats.lock().unwrap();
            stats.last_error = Some(source.to_string());
            stats.last_error_time = Some(Utc::now());
        }

        Err(RetryError::Exhausted { attempts, source })
    }

    /// `min(initial_delay * base^attempt, max_delay)`, optionally widened
    /// by up to +10% uniform jitter.
    fn backoff_delay(&self, attempt: u32) -> Duration {
        let raw = self.retry.initial_delay.as_secs_f64()
            * self.retry.exponential_base.powi(attempt as i32);
        let mut delay = raw.min(self.retry.max_delay.as_secs_f64());

        if self.retry.jitter_enabled {
            delay += rand::thread_rng().gen_range(0.0..=delay * 0.1);
        }

        Duration::from_secs_f64(delay)
    }
}
