// SPDX-FileCopyrightText: 2025 Semiotic Labs
//
// SPDX-License-Identifier: Apache-2.0

//! Per-endpoint call throttling
//!
//! [`RateLimiter`] enforces a minimum wall-clock interval between consecutive
//! calls to the same endpoint and honors server-specified `Retry-After` backoff.
//! Endpoints are keyed by the exact URL string handed to [`RateLimiter::set_rate`]
//! and [`RateLimiter::limit_url`]; no host normalization is applied.
//!
//! The limiter is meant to be shared (`Arc`) by every pipeline of one logical
//! client. The check-then-update of a URL's last call time runs under a per-URL
//! lock held across the wait, so concurrent callers of the same URL are
//! serialized and never observe an interval shorter than the configured one.

use std::{sync::Arc, time::Duration};

use chrono::{DateTime, NaiveDateTime, TimeDelta, Utc};
use dashmap::DashMap;
use tokio::{sync::Mutex, time::Instant};
use tracing::{debug, trace, warn};

use crate::{
    ApiError,
    sleep::{Sleeper, TokioSleeper},
};

/// Minimum-interval throttle with `Retry-After` override
#[derive(Debug)]
pub struct RateLimiter {
    /// Minimum interval per endpoint
    rates: DashMap<String, Duration>,
    /// Time of the last admitted call per endpoint
    last_calls: DashMap<String, Arc<Mutex<Option<Instant>>>>,
    sleeper: Arc<dyn Sleeper>,
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new()
    }
}

impl RateLimiter {
    /// Create a limiter that waits on the tokio timer
    pub fn new() -> Self {
        Self::with_sleeper(Arc::new(TokioSleeper))
    }

    /// Create a limiter that waits through the given sleeper
    pub fn with_sleeper(sleeper: Arc<dyn Sleeper>) -> Self {
        Self {
            rates: DashMap::new(),
            last_calls: DashMap::new(),
            sleeper,
        }
    }

    /// Record the minimum interval between calls to `url`
    pub fn set_rate(&self, url: &str, interval: Duration) {
        trace!(url, interval_ms = interval.as_millis(), "setting rate limit");
        self.rates.insert(url.to_string(), interval);
    }

    /// Record the minimum interval between calls to `url` from fractional seconds
    ///
    /// # Errors
    ///
    /// Returns a configuration error for negative, infinite or NaN values
    pub fn set_rate_seconds(&self, url: &str, seconds: f64) -> Result<(), ApiError> {
        let interval = Duration::try_from_secs_f64(seconds).map_err(|e| {
            ApiError::configuration(format!("invalid rate limit {seconds} for {url}: {e}"))
        })?;
        self.set_rate(url, interval);
        Ok(())
    }

    /// Configured minimum interval for `url`
    pub fn rate(&self, url: &str) -> Option<Duration> {
        self.rates.get(url).map(|interval| *interval)
    }

    /// Wait as long as needed before calling `url`, then mark the call
    ///
    /// A `retry_after` value takes priority over the configured interval: the
    /// limiter waits until the deadline it denotes. Without one, the limiter waits
    /// out whatever remains of the interval since the previous call. The first
    /// call to a URL never waits on the interval.
    pub async fn limit_url(&self, url: &str, retry_after: Option<&str>) {
        let slot = Arc::clone(&self.last_calls.entry(url.to_string()).or_default());
        let mut last_call = slot.lock().await;

        let backoff = retry_after.and_then(|value| match time_from_retry_after(value) {
            Ok(deadline) => Some((deadline - Utc::now()).to_std().unwrap_or(Duration::ZERO)),
            Err(error) => {
                warn!(url, value, %error, "ignoring unparsable Retry-After");
                None
            }
        });

        if let Some(delay) = backoff {
            if !delay.is_zero() {
                debug!(url, delay_ms = delay.as_millis(), "honoring Retry-After");
                self.wait(delay).await;
            }
        } else if let (Some(interval), Some(previous)) = (self.rate(url), *last_call) {
            let elapsed = previous.elapsed();
            if elapsed < interval {
                let delay = interval - elapsed;
                debug!(url, delay_ms = delay.as_millis(), "throttling call");
                self.wait(delay).await;
            }
        }

        *last_call = Some(Instant::now());
    }

    /// Wait for `duration` through the injected sleeper
    pub async fn wait(&self, duration: Duration) {
        self.sleeper.sleep(duration).await;
    }
}

/// Convert an HTTP `Retry-After` value into an absolute UTC deadline
///
/// An integer is read as seconds from now; anything else must be an HTTP-date.
///
/// # Errors
///
/// Returns [`ApiError::InvalidResponse`] when the value is neither form
pub fn time_from_retry_after(value: &str) -> Result<DateTime<Utc>, ApiError> {
    let value = value.trim();
    if let Ok(seconds) = value.parse::<i64>() {
        return TimeDelta::try_seconds(seconds)
            .and_then(|delta| Utc::now().checked_add_signed(delta))
            .ok_or_else(|| {
                ApiError::invalid_response(format!("Retry-After `{value}` is out of range"))
            });
    }
    parse_http_date(value).ok_or_else(|| {
        ApiError::invalid_response(format!("Retry-After `{value}` is not a delay or a date"))
    })
}

/// Parse an HTTP-date in IMF-fixdate, RFC 850 or asctime form
pub fn parse_http_date(value: &str) -> Option<DateTime<Utc>> {
    let value = value.trim();
    if let Ok(date) = DateTime::parse_from_rfc2822(value) {
        return Some(date.with_timezone(&Utc));
    }
    ["%A, %d-%b-%y %H:%M:%S GMT", "%a %b %e %H:%M:%S %Y"]
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(value, format).ok())
        .map(|naive| naive.and_utc())
}
