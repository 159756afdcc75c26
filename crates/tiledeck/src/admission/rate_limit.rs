//! Per-client fixed-start window limiter with weighted requests.

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};

use crate::config::RateLimitConfig;

/// Sweep stale windows every this many checks.
pub const SWEEP_EVERY: u64 = 256;
/// Sweep whenever more than this many clients are tracked.
pub const SWEEP_ABOVE: usize = 4_096;
/// Windows older than this many widths are dropped by a sweep.
pub const STALE_WINDOWS: u32 = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Allowed { remaining: u32 },
    Limited { retry_after_secs: u64 },
}

#[derive(Debug, Clone, Copy)]
struct Window {
    start: Instant,
    used: u32,
}

#[derive(Debug, Default)]
struct LimiterState {
    windows: HashMap<String, Window>,
    checks: u64,
}

#[derive(Debug, Default)]
pub struct RateLimiter {
    state: Mutex<LimiterState>,
}

impl RateLimiter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn check(&self, key: &str, cost: u32, limits: RateLimitConfig) -> Decision {
        self.check_at(key, cost, limits, Instant::now())
    }

    /// Charge `cost` units to `key` at time `now`.
    pub fn check_at(&self, key: &str, cost: u32, limits: RateLimitConfig, now: Instant) -> Decision {
        let window = Duration::from_millis(limits.window_ms.max(1));
        let max = limits.max.max(1);
        let cost = cost.clamp(1, max);

        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        state.checks = state.checks.wrapping_add(1);
        if state.checks % SWEEP_EVERY == 0 || state.windows.len() > SWEEP_ABOVE {
            sweep(&mut state.windows, window * STALE_WINDOWS, now);
        }

        let entry = state.windows.entry(key.to_string()).or_insert(Window {
            start: now,
            used: 0,
        });
        let elapsed = now.saturating_duration_since(entry.start);
        if elapsed >= window {
            *entry = Window {
                start: now,
                used: 0,
            };
        }

        if entry.used + cost > max {
            let remaining = window.saturating_sub(now.saturating_duration_since(entry.start));
            return Decision::Limited {
                retry_after_secs: retry_after_secs(remaining),
            };
        }
        entry.used += cost;
        Decision::Allowed {
            remaining: max - entry.used,
        }
    }

    /// Number of tracked client keys.
    pub fn tracked(&self) -> usize {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .windows
            .len()
    }
}

fn sweep(windows: &mut HashMap<String, Window>, max_age: Duration, now: Instant) {
    windows.retain(|_, w| now.saturating_duration_since(w.start) < max_age);
}

/// Whole seconds until the window resets, at least one.
fn retry_after_secs(remaining: Duration) -> u64 {
    remaining.as_millis().div_ceil(1000).max(1) as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    const LIMITS: RateLimitConfig = RateLimitConfig {
        window_ms: 1000,
        max: 5,
    };

    #[test]
    fn boundary_and_reset() {
        let limiter = RateLimiter::new();
        let start = Instant::now();

        for i in 0..5 {
            let at = start + Duration::from_millis(i * 10);
            assert!(matches!(
                limiter.check_at("ip|-", 1, LIMITS, at),
                Decision::Allowed { .. }
            ));
        }
        match limiter.check_at("ip|-", 1, LIMITS, start + Duration::from_millis(100)) {
            Decision::Limited { retry_after_secs } => {
                assert!(retry_after_secs >= 1);
                assert!(retry_after_secs <= 1);
            }
            other => panic!("expected limit, got {other:?}"),
        }

        let later = start + Duration::from_millis(1001);
        assert_eq!(
            limiter.check_at("ip|-", 1, LIMITS, later),
            Decision::Allowed { remaining: 4 }
        );
    }

    #[test]
    fn keys_have_independent_budgets() {
        let limiter = RateLimiter::new();
        let now = Instant::now();
        for _ in 0..5 {
            limiter.check_at("a", 1, LIMITS, now);
        }
        assert!(matches!(limiter.check_at("a", 1, LIMITS, now), Decision::Limited { .. }));
        assert!(matches!(limiter.check_at("b", 1, LIMITS, now), Decision::Allowed { .. }));
    }

    #[test]
    fn weighted_costs_consume_more_budget() {
        let limiter = RateLimiter::new();
        let now = Instant::now();
        assert_eq!(
            limiter.check_at("k", 3, LIMITS, now),
            Decision::Allowed { remaining: 2 }
        );
        assert!(matches!(limiter.check_at("k", 3, LIMITS, now), Decision::Limited { .. }));
        assert_eq!(
            limiter.check_at("k", 2, LIMITS, now),
            Decision::Allowed { remaining: 0 }
        );
    }

    #[test]
    fn retry_after_rounds_up() {
        let limits = RateLimitConfig {
            window_ms: 10_000,
            max: 3,
        };
        let limiter = RateLimiter::new();
        let now = Instant::now();
        for _ in 0..3 {
            limiter.check_at("k", 1, limits, now);
        }
        assert_eq!(
            limiter.check_at("k", 1, limits, now + Duration::from_millis(2_500)),
            Decision::Limited {
                retry_after_secs: 8
            }
        );
    }

    #[test]
    fn sweep_drops_stale_clients() {
        let limiter = RateLimiter::new();
        let start = Instant::now();
        for i in 0..(SWEEP_EVERY - 1) {
            limiter.check_at(&format!("client-{i}"), 1, LIMITS, start);
        }
        assert_eq!(limiter.tracked(), (SWEEP_EVERY - 1) as usize);

        limiter.check_at("fresh", 1, LIMITS, start + Duration::from_secs(10));
        assert_eq!(limiter.tracked(), 1);
    }
}
