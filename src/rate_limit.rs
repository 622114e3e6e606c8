//! Per-host politeness delay with exponential backoff on failure.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

const MAX_DELAY_SECS: u64 = 60;
const JITTER_DIVISOR: u32 = 4;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RateState {
    pub delay: Duration,
    pub consecutive_failures: u32,
}

/// Shared across domain tasks; the host map sits behind a mutex that is
/// never held across an await point.
#[derive(Debug)]
pub struct RateLimiter {
    default_delay: Duration,
    hosts: Mutex<HashMap<String, RateState>>,
}

impl RateLimiter {
    pub fn new(default_delay: Duration) -> Self {
        Self {
            default_delay,
            hosts: Mutex::new(HashMap::new()),
        }
    }

    /// Current delay for a host. Unknown hosts get the default.
    pub fn delay(&self, host: &str) -> Duration {
        self.state(host).delay
    }

    pub fn state(&self, host: &str) -> RateState {
        let hosts = self.hosts.lock().unwrap_or_else(|e| e.into_inner());
        hosts.get(host).copied().unwrap_or(RateState {
            delay: self.default_delay,
            consecutive_failures: 0,
        })
    }

    /// Doubles the delay per consecutive failure, capped at 60 seconds.
    pub fn record_failure(&self, host: &str) {
        let mut hosts = self.hosts.lock().unwrap_or_else(|e| e.into_inner());
        let entry = hosts.entry(host.to_string()).or_insert(RateState {
            delay: self.default_delay,
            consecutive_failures: 0,
        });
        entry.consecutive_failures = entry.consecutive_failures.saturating_add(1);
        let secs = 2u64
            .checked_pow(entry.consecutive_failures)
            .unwrap_or(MAX_DELAY_SECS)
            .min(MAX_DELAY_SECS);
        entry.delay = Duration::from_secs(secs);
        tracing::warn!(
            "Backing off {host}: {} consecutive failures, delay {secs}s",
            entry.consecutive_failures
        );
    }

    pub fn record_success(&self, host: &str) {
        let mut hosts = self.hosts.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(state) = hosts.get(host)
            && state.consecutive_failures > 0
        {
            tracing::debug!("Reset backoff for {host}");
            hosts.remove(host);
        }
    }

    /// Sleeps for the host's current delay plus jitter. Returns false if the
    /// stop signal fired while waiting.
    pub async fn wait(&self, host: &str, cancel: &CancellationToken) -> bool {
        let delay = jittered(self.delay(host));
        if delay.is_zero() {
            return !cancel.is_cancelled();
        }
        tokio::select! {
            biased;
            _ = cancel.cancelled() => false,
            _ = tokio::time::sleep(delay) => true,
        }
    }
}

/// Adds a random extra of up to a quarter of `delay`.
fn jittered(delay: Duration) -> Duration {
    if delay.is_zero() {
        return delay;
    }
    delay + (delay / JITTER_DIVISOR).mul_f64(rand::random::<f64>())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limiter() -> RateLimiter {
        RateLimiter::new(Duration::from_secs(1))
    }

    #[test]
    fn test_unknown_host_gets_default() {
        let rl = limiter();
        assert_eq!(rl.delay("example.com"), Duration::from_secs(1));
    }

    #[test]
    fn test_three_failures_back_off_to_eight_seconds() {
        let rl = limiter();
        for _ in 0..3 {
            rl.record_failure("example.com");
        }
        assert_eq!(rl.delay("example.com"), Duration::from_secs(8));
        assert_eq!(rl.state("example.com").consecutive_failures, 3);
    }

    #[test]
    fn test_success_resets_to_default() {
        let rl = limiter();
        for _ in 0..3 {
            rl.record_failure("example.com");
        }
        rl.record_success("example.com");
        assert_eq!(rl.delay("example.com"), Duration::from_secs(1));
        assert_eq!(rl.state("example.com").consecutive_failures, 0);
    }

    #[test]
    fn test_backoff_is_capped() {
        let rl = limiter();
        for _ in 0..40 {
            rl.record_failure("slow.example");
        }
        assert_eq!(rl.delay("slow.example"), Duration::from_secs(60));
    }

    #[test]
    fn test_hosts_are_independent() {
        let rl = limiter();
        rl.record_failure("a.example");
        rl.record_failure("a.example");
        assert_eq!(rl.delay("a.example"), Duration::from_secs(4));
        assert_eq!(rl.delay("b.example"), Duration::from_secs(1));
    }

    #[test]
    fn test_jitter_stays_within_a_quarter() {
        let base = Duration::from_secs(1);
        for _ in 0..200 {
            let d = jittered(base);
            assert!(d >= base && d <= base + base / 4, "{d:?}");
        }
        assert_eq!(jittered(Duration::ZERO), Duration::ZERO);
    }

    #[tokio::test]
    async fn test_wait_aborts_on_cancel() {
        let rl = RateLimiter::new(Duration::from_secs(30));
        let cancel = CancellationToken::new();
        cancel.cancel();
        assert!(!rl.wait("example.com", &cancel).await);
    }

    #[tokio::test]
    async fn test_wait_with_zero_delay() {
        let rl = RateLimiter::new(Duration::ZERO);
        let cancel = CancellationToken::new();
        assert!(rl.wait("example.com", &cancel).await);
    }
}
