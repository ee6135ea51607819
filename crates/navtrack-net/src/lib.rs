//! # navtrack-net
//!
//! Networking layer for the navtrack GPS tracking system:
//! - A non-blocking UDP receive loop that hands raw sentence text to
//!   registered callbacks, plus datagram send primitives
//! - A resilience executor combining exponential-backoff retry with a
//!   circuit breaker, used to wrap outbound sends over unreliable links
//! - A small scheduler for cancellable delayed and periodic tasks
//!
//! Everything here runs on tokio; the data model lives in `navtrack-core`
//! and stays runtime-agnostic.

pub mod resilience;
pub mod scheduler;
pub mod udp;

pub use resilience::{
    CancelHandle, CircuitBreaker, CircuitBreakerConfig, CircuitState, ResilientClient,
    RetryConfig, RetryError, RetryStats,
};
pub use scheduler::{spawn_after, spawn_periodic, TaskHandle};
pub use udp::{send_datagram, NetError, NetworkStats, NmeaReceiver, NmeaSender, ReceiverHandle};
