//! Per-provider admission control: bounded in-flight requests plus
//! minimum inter-request spacing.
//!
//! Every provider owns one [`ConcurrencyLimiter`], obtained from the shared
//! [`LimiterRegistry`]. The limiter enforces two independent gates:
//!
//! 1. a rate gate: consecutive admissions are spaced at least
//!    `1000ms / requests_per_second` apart, measured from the previous
//!    admission (not completion);
//! 2. a concurrency gate: at most `max_concurrent` operations in flight.
//!
//! Excess callers queue FIFO. The limiter never times out an operation and
//! never alters its error.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::sync::Mutex as StdMutex;
use std::time::{Duration, Instant};

use tokio::sync::{Mutex, Semaphore, SemaphorePermit};
use tokio::time::sleep;
use tracing::debug;

use crate::providers::ConcurrencyConfig;

/// Admission gate for one provider.
#[derive(Debug)]
pub struct ConcurrencyLimiter {
    name: String,
    config: ConcurrencyConfig,
    min_interval: Duration,
    // Serializes admissions: the lock is held across the pacing wait and
    // the slot acquisition so both invariants hold together and waiters
    // drain in FIFO order.
    admission: Mutex<Option<Instant>>,
    slots: Semaphore,
}

impl ConcurrencyLimiter {
    /// Create a limiter for the given provider budget
    pub fn new(name: impl Into<String>, config: ConcurrencyConfig) -> Self {
        let name = name.into();
        let config = ConcurrencyConfig::new(config.max_concurrent, config.requests_per_second);
        let min_interval = Duration::from_secs_f64(1.0 / config.requests_per_second);

        debug!(
            provider = %name,
            max_concurrent = config.max_concurrent,
            requests_per_second = config.requests_per_second,
            "created concurrency limiter"
        );

        Self {
            name,
            config,
            min_interval,
            admission: Mutex::new(None),
            slots: Semaphore::new(config.max_concurrent),
        }
    }

    /// Provider name this limiter guards
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The budget this limiter enforces
    pub fn config(&self) -> ConcurrencyConfig {
        self.config
    }

    /// Operations currently in flight
    pub fn in_flight(&self) -> usize {
        self.config.max_concurrent - self.slots.available_permits()
    }

    /// Run `op` once both gates admit it.
    ///
    /// Fails with whatever `op` fails with; the limiter itself never errors
    /// and never times out. The slot is released when `op` completes,
    /// success or failure, waking exactly one queued caller.
    pub async fn execute<T, E, F, Fut>(&self, op: F) -> Result<T, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let _permit = self.admit().await;
        op().await
    }

    async fn admit(&self) -> SemaphorePermit<'_> {
        let mut last_admission = self.admission.lock().await;

        if let Some(previous) = *last_admission {
            let elapsed = previous.elapsed();
            if elapsed < self.min_interval {
                let wait = self.min_interval - elapsed;
                debug!(provider = %self.name, wait_ms = wait.as_millis() as u64, "rate gate");
                sleep(wait).await;
            }
        }

        let permit = self
            .slots
            .acquire()
            .await
            .expect("limiter semaphore is never closed");
        *last_admission = Some(Instant::now());
        permit
    }
}

/// Process-lifetime cache of one limiter per provider name.
///
/// Created once at startup and passed by reference wherever provider calls
/// are made; limiters are created lazily on first use with the provider's
/// declared budget.
#[derive(Debug, Default)]
pub struct LimiterRegistry {
    limiters: StdMutex<HashMap<String, Arc<ConcurrencyLimiter>>>,
}

impl LimiterRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the limiter for a provider, creating it on first use.
    ///
    /// The configuration of the first caller wins; later calls for the same
    /// name return the cached limiter unchanged.
    pub fn limiter_for(&self, name: &str, config: ConcurrencyConfig) -> Arc<ConcurrencyLimiter> {
        let mut limiters = self.limiters.lock().expect("limiter registry poisoned");
        limiters
            .entry(name.to_string())
            .or_insert_with(|| Arc::new(ConcurrencyLimiter::new(name, config)))
            .clone()
    }

    /// Number of limiters created so far
    pub fn len(&self) -> usize {
        self.limiters.lock().expect("limiter registry poisoned").len()
    }

    /// Check if no limiter has been created yet
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
