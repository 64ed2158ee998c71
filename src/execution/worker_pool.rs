//! Worker Pool for fire-and-forget deliveries

use crate::config::WorkerPoolConfig;
use futures::future::BoxFuture;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::{Notify, Semaphore};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Bounded pool running outbound deliveries the caller does not wait for.
///
/// Submission never blocks: the task is spawned immediately and waits for a
/// permit inside the runtime. No ordering is guaranteed between deliveries.
///
/// # Examples
///
/// ```rust
/// use phase_engine::execution::DeliveryPool;
///
/// #[tokio::main]
/// async fn main() {
///     let pool = DeliveryPool::new(4);
///     pool.submit("example", Box::pin(async {}));
///     pool.wait_idle().await;
///     assert_eq!(pool.in_flight(), 0);
/// }
/// ```
#[derive(Debug, Clone)]
pub struct DeliveryPool {
    permits: Arc<Semaphore>,
    in_flight: Arc<AtomicUsize>,
    idle: Arc<Notify>,
    max_concurrent: usize,
}

struct InFlightGuard {
    in_flight: Arc<AtomicUsize>,
    idle: Arc<Notify>,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        if self.in_flight.fetch_sub(1, Ordering::AcqRel) == 1 {
            self.idle.notify_waiters();
        }
    }
}

impl DeliveryPool {
    pub fn new(max_concurrent: usize) -> Self {
        let max_concurrent = max_concurrent.max(1);
        Self {
            permits: Arc::new(Semaphore::new(max_concurrent)),
            in_flight: Arc::new(AtomicUsize::new(0)),
            idle: Arc::new(Notify::new()),
            max_concurrent,
        }
    }

    pub fn from_config(config: &WorkerPoolConfig) -> Self {
        Self::new(config.max_concurrent_deliveries)
    }

    /// Hand a delivery to the pool and return immediately
    pub fn submit(&self, label: &str, task: BoxFuture<'static, ()>) -> JoinHandle<()> {
        self.in_flight.fetch_add(1, Ordering::AcqRel);
        let guard = InFlightGuard {
            in_flight: Arc::clone(&self.in_flight),
            idle: Arc::clone(&self.idle),
        };
        let permits = Arc::clone(&self.permits);
        let label = label.to_string();

        debug!(task = %label, in_flight = self.in_flight(), "Delivery submitted to pool");

        tokio::spawn(async move {
            let _guard = guard;
            match permits.acquire_owned().await {
                Ok(_permit) => task.await,
                Err(_) => warn!(task = %label, "Delivery pool closed, task dropped"),
            }
        })
    }

    /// Deliveries submitted and not yet finished
    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::Acquire)
    }

    pub fn max_concurrent(&self) -> usize {
        self.max_concurrent
    }

    /// Wait until every submitted delivery has finished
    pub async fn wait_idle(&self) {
        loop {
            let notified = self.idle.notified();
            if self.in_flight() == 0 {
                return;
            }
            notified.await;
        }
    }
}

impl Default for DeliveryPool {
    fn default() -> Self {
        Self::from_config(&WorkerPoolConfig::default())
    }
}
