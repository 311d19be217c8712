use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

/// Gauge of messages currently inside consumer handlers. Each consumer
/// takes a clone and tracks one guard per message; `main` polls the gauge
/// during shutdown so the drain window ends as soon as handlers finish.
#[derive(Debug, Clone, Default)]
pub struct InFlight {
    count: Arc<AtomicUsize>,
}

impl InFlight {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark one message as in flight until the guard drops.
    pub fn track(&self) -> InFlightGuard {
        self.count.fetch_add(1, Ordering::SeqCst);
        InFlightGuard {
            count: Arc::clone(&self.count),
        }
    }

    pub fn count(&self) -> usize {
        self.count.load(Ordering::SeqCst)
    }

    pub fn is_idle(&self) -> bool {
        self.count() == 0
    }
}

pub struct InFlightGuard {
    count: Arc<AtomicUsize>,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.count.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Wait for in-flight handlers to finish, up to `window`. Returns `true`
/// once the gauge reaches zero, `false` when the window elapses first.
pub async fn drain_within(in_flight: &InFlight, window: Duration) -> bool {
    let deadline = tokio::time::Instant::now() + window;

    while !in_flight.is_idle() {
        if tokio::time::Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn drain_returns_immediately_when_idle() {
        let in_flight = InFlight::new();
        let start = tokio::time::Instant::now();

        assert!(drain_within(&in_flight, Duration::from_secs(10)).await);
        assert!(start.elapsed() < Duration::from_millis(50));
    }

    #[tokio::test]
    async fn drain_waits_for_guards_to_drop() {
        let in_flight = InFlight::new();
        let guard = in_flight.track();
        assert_eq!(in_flight.count(), 1);

        let gauge = in_flight.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(150)).await;
            drop(guard);
        });

        assert!(drain_within(&gauge, Duration::from_secs(5)).await);
        assert!(gauge.is_idle());
    }

    #[tokio::test]
    async fn drain_times_out_while_a_handler_is_stuck() {
        let in_flight = InFlight::new();
        let _guard = in_flight.track();

        assert!(!drain_within(&in_flight, Duration::from_millis(150)).await);
        assert_eq!(in_flight.count(), 1);
    }
}
