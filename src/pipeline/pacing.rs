//! Pacing between Document AI calls.
//!
//! The Layout Parser quota is per project and per minute. The orchestrator
//! calls [`Pacer::wait`] after every request, successful or not, and only
//! proceeds to the next window once it returns.

use async_trait::async_trait;
use governor::{
    clock::DefaultClock,
    state::{InMemoryState, NotKeyed},
    Quota, RateLimiter,
};
use std::num::NonZeroU32;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::debug;

/// Gate between two consecutive remote calls.
#[async_trait]
pub trait Pacer: Send + Sync {
    /// Return once the next call may be issued.
    async fn wait(&self);
}

/// Sleeps for a fixed interval. No bursts, no backoff.
#[derive(Debug, Clone, Copy)]
pub struct FixedDelayPacer {
    interval: Duration,
}

impl FixedDelayPacer {
    pub fn new(interval: Duration) -> Self {
        Self { interval }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }
}

#[async_trait]
impl Pacer for FixedDelayPacer {
    async fn wait(&self) {
        if !self.interval.is_zero() {
            debug!("Pacing: sleeping {:?}", self.interval);
            tokio::time::sleep(self.interval).await;
        }
    }
}

type DirectLimiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

/// Token-bucket pacing: at most `per_minute` calls per minute, spread evenly.
///
/// `wait` runs after a call, so the pacer tracks when the next call may
/// start: the first `wait` holds for a full interval (the call before it
/// started no later than that), every later one holds until the interval
/// since the previous `wait` returned has elapsed. The governor bucket
/// (burst of one, first slot taken lazily) enforces the per-minute quota on
/// top of that spacing.
pub struct QuotaPacer {
    limiter: DirectLimiter,
    per_minute: NonZeroU32,
    interval: Duration,
    last_release: Mutex<Option<Instant>>,
}

impl QuotaPacer {
    pub fn per_minute(per_minute: NonZeroU32) -> Self {
        let quota = Quota::per_minute(per_minute).allow_burst(NonZeroU32::MIN);
        Self {
            limiter: RateLimiter::direct(quota),
            per_minute,
            interval: Duration::from_secs(60) / per_minute.get(),
            last_release: Mutex::new(None),
        }
    }

    pub fn calls_per_minute(&self) -> u32 {
        self.per_minute.get()
    }

    /// Minimum spacing between two call starts.
    pub fn interval(&self) -> Duration {
        self.interval
    }
}

impl std::fmt::Debug for QuotaPacer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QuotaPacer")
            .field("per_minute", &self.per_minute)
            .field("interval", &self.interval)
            .finish()
    }
}

#[async_trait]
impl Pacer for QuotaPacer {
    async fn wait(&self) {
        let mut last = self.last_release.lock().await;
        let earliest = match *last {
            Some(released) => released + self.interval,
            None => Instant::now() + self.interval,
        };
        debug!(
            "Pacing: holding {:?} for the call quota",
            earliest.saturating_duration_since(Instant::now())
        );
        tokio::time::sleep_until(earliest).await;
        self.limiter.until_ready().await;
        *last = Some(Instant::now());
    }
}

/// Never waits. Useful for tests and for local mock endpoints.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoPacing;

#[async_trait]
impl Pacer for NoPacing {
    async fn wait(&self) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::Instant;

    #[tokio::test(start_paused = true)]
    async fn fixed_delay_waits_full_interval() {
        let pacer = FixedDelayPacer::new(Duration::from_millis(500));
        let start = Instant::now();
        pacer.wait().await;
        pacer.wait().await;
        assert!(start.elapsed() >= Duration::from_millis(1000));
    }

    #[tokio::test(start_paused = true)]
    async fn zero_interval_returns_immediately() {
        let pacer = FixedDelayPacer::new(Duration::ZERO);
        let start = Instant::now();
        pacer.wait().await;
        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    #[tokio::test]
    async fn quota_pacer_spaces_call_starts() {
        // 600/min → at least 100 ms between two call starts.
        let pacer = QuotaPacer::per_minute(NonZeroU32::new(600).unwrap());
        assert_eq!(pacer.interval(), Duration::from_millis(100));
        assert_eq!(pacer.calls_per_minute(), 600);

        // Idle time before the first call earns no credit.
        tokio::time::sleep(Duration::from_millis(250)).await;

        let mut starts = vec![Instant::now()];
        for _ in 0..3 {
            // The "call" itself takes a little time before the pacer runs.
            tokio::time::sleep(Duration::from_millis(15)).await;
            pacer.wait().await;
            starts.push(Instant::now());
        }

        for pair in starts.windows(2) {
            let gap = pair[1].duration_since(pair[0]);
            assert!(gap >= pacer.interval(), "gap {gap:?} < {:?}", pacer.interval());
        }
    }
}
