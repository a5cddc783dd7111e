//! Per-sender flow-rate limiting for card lookups.
//!
//! A leaky bucket per sender host: every lookup adds one, anything over the
//! maximum is refused, and a once-a-second sweep drains one unit from each
//! sender that has been quiet for a full decay window. Refused lookups still
//! count, so a sender who keeps hammering stays blocked.

use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use hearth_irc::Source;
use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::config::FlowRateConfig;

/// How often idle senders are drained.
pub const SWEEP_INTERVAL: Duration = Duration::from_secs(1);

#[derive(Debug)]
struct FlowEntry {
    count: u32,
    last_activity: Instant,
}

/// Thread-safe flow-rate limiter keyed by sender host.
#[derive(Debug)]
pub struct FlowRateLimiter {
    entries: DashMap<String, Arc<Mutex<FlowEntry>>>,
    max_messages: u32,
    window: Duration,
    enabled: bool,
}

/// Limiter key for a message source: the host, so nick changes don't reset
/// the bucket, or the whole prefix when there is no host.
pub fn key_for(source: &Source) -> String {
    source
        .host()
        .filter(|h| !h.is_empty())
        .map_or_else(|| source.to_string(), str::to_string)
}

impl FlowRateLimiter {
    pub fn new(max_messages: u32, window: Duration) -> Self {
        Self {
            entries: DashMap::new(),
            max_messages,
            window,
            enabled: true,
        }
    }

    pub fn from_config(config: &FlowRateConfig) -> Self {
        Self {
            enabled: config.enabled,
            ..Self::new(config.max_messages, Duration::from_secs(config.decay_seconds))
        }
    }

    /// Count one request from `key` and say whether it may proceed.
    pub fn allow(&self, key: &str) -> bool {
        self.allow_at(key, Instant::now())
    }

    pub fn allow_at(&self, key: &str, now: Instant) -> bool {
        if !self.enabled {
            return true;
        }

        // Hold the map shard only long enough to find the entry.
        let entry = self
            .entries
            .entry(key.to_string())
            .or_insert_with(|| {
                Arc::new(Mutex::new(FlowEntry {
                    count: 0,
                    last_activity: now,
                }))
            })
            .clone();

        let mut entry = entry.lock();
        entry.count = entry.count.saturating_add(1);
        if entry.count > self.max_messages {
            warn!(
                key = %key,
                count = entry.count,
                max = self.max_messages,
                "Flow rate exceeded, ignoring request"
            );
            return false;
        }
        entry.last_activity = now;
        true
    }

    /// Drain one unit from every entry idle for at least a full window, and
    /// forget entries that reach zero. Returns how many were forgotten.
    pub fn sweep(&self, now: Instant) -> usize {
        let mut drained = Vec::new();
        for item in self.entries.iter() {
            let mut entry = item.value().lock();
            if now.saturating_duration_since(entry.last_activity) >= self.window {
                entry.count = entry.count.saturating_sub(1);
                if entry.count == 0 {
                    drained.push(item.key().clone());
                }
            }
        }

        let mut evicted = 0;
        for key in drained {
            if self
                .entries
                .remove_if(&key, |_, entry| entry.lock().count == 0)
                .is_some()
            {
                evicted += 1;
            }
        }
        evicted
    }

    /// Run [`sweep`](Self::sweep) every second until cancelled.
    pub fn spawn_sweeper(self: Arc<Self>, cancel: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(SWEEP_INTERVAL);
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = interval.tick() => {
                        let evicted = self.sweep(Instant::now());
                        if evicted > 0 {
                            debug!(evicted, tracked = self.len(), "Flow rate entries expired");
                        }
                    }
                }
            }
        })
    }

    /// Number of senders currently tracked.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const WINDOW: Duration = Duration::from_secs(10);

    #[test]
    fn fourth_message_within_window_is_refused() {
        let limiter = FlowRateLimiter::new(3, WINDOW);
        let t0 = Instant::now();
        assert!(limiter.allow_at("host.example", t0));
        assert!(limiter.allow_at("host.example", t0));
        assert!(limiter.allow_at("host.example", t0));
        assert!(!limiter.allow_at("host.example", t0));
        // Other senders are unaffected.
        assert!(limiter.allow_at("elsewhere.example", t0));
    }

    #[test]
    fn sweep_after_window_restores_capacity() {
        let limiter = FlowRateLimiter::new(3, WINDOW);
        let t0 = Instant::now();
        for _ in 0..3 {
            assert!(limiter.allow_at("h", t0));
        }
        assert!(!limiter.allow_at("h", t0));

        // Once-a-second sweeps do nothing until the sender has been idle a
        // full window, then drain one unit each.
        for secs in 0..10 {
            limiter.sweep(t0 + Duration::from_secs(secs));
        }
        assert_eq!(limiter.len(), 1);

        for secs in 10..=13 {
            limiter.sweep(t0 + Duration::from_secs(secs));
        }
        assert!(limiter.allow_at("h", t0 + Duration::from_secs(13)));
    }

    #[test]
    fn activity_postpones_draining() {
        let limiter = FlowRateLimiter::new(3, WINDOW);
        let t0 = Instant::now();
        limiter.allow_at("h", t0);
        limiter.allow_at("h", t0 + Duration::from_secs(8));
        assert_eq!(limiter.sweep(t0 + WINDOW), 0);
        assert_eq!(limiter.len(), 1);
        // Count was 2; idle since t0+8s, so two sweeps after t0+18s clear it.
        limiter.sweep(t0 + Duration::from_secs(18));
        assert_eq!(limiter.sweep(t0 + Duration::from_secs(19)), 1);
        assert!(limiter.is_empty());
    }

    #[test]
    fn idle_entries_are_evicted() {
        let limiter = FlowRateLimiter::new(3, WINDOW);
        let t0 = Instant::now();
        limiter.allow_at("a", t0);
        limiter.allow_at("b", t0);
        limiter.allow_at("b", t0);
        assert_eq!(limiter.len(), 2);

        assert_eq!(limiter.sweep(t0 + WINDOW), 1);
        assert_eq!(limiter.len(), 1);
        assert_eq!(limiter.sweep(t0 + WINDOW * 2), 1);
        assert!(limiter.is_empty());
    }

    #[test]
    fn disabled_limiter_allows_everything() {
        let limiter = FlowRateLimiter::from_config(&FlowRateConfig {
            enabled: false,
            ..FlowRateConfig::default()
        });
        for _ in 0..10 {
            assert!(limiter.allow("h"));
        }
        assert!(limiter.is_empty());
    }

    #[test]
    fn key_is_host_when_available() {
        assert_eq!(key_for(&Source::parse("nick!user@host.example")), "host.example");
        assert_eq!(key_for(&Source::parse("irc.example.net")), "irc.example.net");
    }

    #[tokio::test]
    async fn sweeper_runs_until_cancelled() {
        let limiter = Arc::new(FlowRateLimiter::new(1, Duration::from_millis(1)));
        limiter.allow("h");
        let cancel = CancellationToken::new();
        let handle = Arc::clone(&limiter).spawn_sweeper(cancel.clone());

        tokio::time::sleep(Duration::from_millis(1500)).await;
        assert!(limiter.is_empty());

        cancel.cancel();
        handle.await.unwrap();
    }
}
