//! Request pacing for the catalog provider.
//!
//! A full-index load fans out one request per entry, so every request first
//! waits on a `governor` limiter. Each 429 stretches the pacing period
//! (doubling, at most [`MAX_SLOWDOWN`] times the configured period) by
//! publishing a fresh limiter through `ArcSwap`. A quiet minute restores the
//! configured rate.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use arc_swap::ArcSwap;
use governor::clock::DefaultClock;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter};
use reqwest::StatusCode;
use reqwest::header::{HeaderMap, RETRY_AFTER};
use tokio::time::Instant;

use crate::provider::ProviderError;

type DirectLimiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

pub const MAX_SLOWDOWN: u32 = 16;

const QUIET_PERIOD: Duration = Duration::from_secs(60);

/// Wait used when `Retry-After` carries an HTTP-date rather than seconds.
const DATE_HINT_WAIT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Copy)]
struct Throttle {
    slowdown: u32,
    last_hit: Option<Instant>,
}

/// Paces provider requests and backs off when the provider throttles.
pub struct Pacer {
    limiter: ArcSwap<DirectLimiter>,
    period: Duration,
    throttle: Mutex<Throttle>,
}

impl Pacer {
    /// Pace at `n` requests per second (at least one).
    pub fn per_second(n: u32) -> Self {
        let period = Duration::from_millis(1000 / u64::from(n.max(1)));
        Self::with_period(period)
    }

    pub fn with_period(period: Duration) -> Self {
        let period = period.max(Duration::from_millis(1));
        Self {
            limiter: ArcSwap::from_pointee(limiter(period)),
            period,
            throttle: Mutex::new(Throttle {
                slowdown: 1,
                last_hit: None,
            }),
        }
    }

    /// Wait for the next request slot.
    pub async fn ready(&self) {
        self.relax();
        self.limiter.load_full().until_ready().await;
    }

    /// Record a 429 and stretch the pacing period.
    pub fn on_throttled(&self) {
        let Ok(mut throttle) = self.throttle.lock() else {
            return;
        };
        throttle.last_hit = Some(Instant::now());
        if throttle.slowdown < MAX_SLOWDOWN {
            throttle.slowdown = (throttle.slowdown * 2).min(MAX_SLOWDOWN);
            self.publish(throttle.slowdown);
            tracing::debug!(slowdown = throttle.slowdown, "provider throttled, pacing slower");
        }
    }

    /// How long to hold off before retrying a throttled request: the
    /// server's hint when it sent one, else the current pacing period.
    /// Never longer than `cap`.
    pub fn hold_off(&self, retry_after: Option<Duration>, cap: Duration) -> Duration {
        retry_after
            .unwrap_or_else(|| self.period * self.slowdown())
            .min(cap)
    }

    /// Current multiple of the configured period (1 when unthrottled).
    pub fn slowdown(&self) -> u32 {
        self.throttle.lock().map(|t| t.slowdown).unwrap_or(1)
    }

    fn relax(&self) {
        let Ok(mut throttle) = self.throttle.lock() else {
            return;
        };
        let quiet = throttle
            .last_hit
            .is_some_and(|hit| hit.elapsed() >= QUIET_PERIOD);
        if quiet && throttle.slowdown > 1 {
            *throttle = Throttle {
                slowdown: 1,
                last_hit: None,
            };
            self.publish(1);
            tracing::debug!("provider quiet, pacing restored");
        }
    }

    fn publish(&self, slowdown: u32) {
        self.limiter
            .store(Arc::new(limiter(self.period.saturating_mul(slowdown))));
    }
}

fn limiter(period: Duration) -> DirectLimiter {
    let quota = Quota::with_period(period).unwrap_or(Quota::per_second(std::num::NonZeroU32::MIN));
    RateLimiter::direct(quota)
}

/// `Err(RateLimited)` for a 429, carrying its `Retry-After` hint.
pub fn rate_limited(status: StatusCode, headers: &HeaderMap) -> Result<(), ProviderError> {
    if status != StatusCode::TOO_MANY_REQUESTS {
        return Ok(());
    }
    let retry_after = headers
        .get(RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(parse_retry_after);
    Err(ProviderError::RateLimited { retry_after })
}

/// `Retry-After` as delta-seconds, or a short fixed wait for an HTTP-date.
pub fn parse_retry_after(value: &str) -> Option<Duration> {
    let value = value.trim();
    match value.parse::<u64>() {
        Ok(secs) => Some(Duration::from_secs(secs)),
        Err(_) if value.ends_with("GMT") => Some(DATE_HINT_WAIT),
        Err(_) => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::HeaderValue;

    fn headers(retry_after: &'static str) -> HeaderMap {
        let mut map = HeaderMap::new();
        map.insert(RETRY_AFTER, HeaderValue::from_static(retry_after));
        map
    }

    #[test]
    fn only_429_counts_as_throttling() {
        assert!(rate_limited(StatusCode::OK, &headers("3")).is_ok());
        assert!(rate_limited(StatusCode::SERVICE_UNAVAILABLE, &headers("3")).is_ok());
        assert_eq!(
            rate_limited(StatusCode::TOO_MANY_REQUESTS, &headers("3")),
            Err(ProviderError::RateLimited {
                retry_after: Some(Duration::from_secs(3))
            })
        );
        assert_eq!(
            rate_limited(StatusCode::TOO_MANY_REQUESTS, &HeaderMap::new()),
            Err(ProviderError::RateLimited { retry_after: None })
        );
    }

    #[test]
    fn retry_after_forms() {
        assert_eq!(parse_retry_after(" 12 "), Some(Duration::from_secs(12)));
        assert_eq!(
            parse_retry_after("Sun, 06 Nov 1994 08:49:37 GMT"),
            Some(DATE_HINT_WAIT)
        );
        assert_eq!(parse_retry_after("soon"), None);
        assert_eq!(parse_retry_after("-1"), None);
    }

    #[tokio::test(start_paused = true)]
    async fn throttling_stretches_pacing_up_to_the_ceiling() {
        let pacer = Pacer::per_second(20);
        pacer.on_throttled();
        pacer.on_throttled();
        assert_eq!(pacer.slowdown(), 4);
        for _ in 0..8 {
            pacer.on_throttled();
        }
        assert_eq!(pacer.slowdown(), MAX_SLOWDOWN);
    }

    #[tokio::test(start_paused = true)]
    async fn hold_off_prefers_the_server_hint_within_the_cap() {
        let pacer = Pacer::per_second(10);
        let cap = Duration::from_secs(10);
        assert_eq!(
            pacer.hold_off(Some(Duration::from_secs(2)), cap),
            Duration::from_secs(2)
        );
        assert_eq!(pacer.hold_off(Some(Duration::from_secs(90)), cap), cap);

        pacer.on_throttled();
        assert_eq!(pacer.hold_off(None, cap), Duration::from_millis(200));
    }

    #[tokio::test(start_paused = true)]
    async fn quiet_minute_restores_the_configured_rate() {
        let pacer = Pacer::per_second(10);
        pacer.on_throttled();
        pacer.ready().await;
        assert_eq!(pacer.slowdown(), 2);

        tokio::time::advance(QUIET_PERIOD).await;
        pacer.ready().await;
        assert_eq!(pacer.slowdown(), 1);
    }

    #[test]
    fn zero_rate_paces_once_per_second() {
        let pacer = Pacer::per_second(0);
        assert_eq!(pacer.period, Duration::from_secs(1));
    }
}
