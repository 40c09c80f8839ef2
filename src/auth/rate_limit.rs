use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::clock::Clock;
use crate::configuration::RateLimitSettings;
use crate::error::AppError;

#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    pub max_attempts: u32,
    pub window_size: Duration,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            window_size: Duration::minutes(15),
        }
    }
}

impl From<&RateLimitSettings> for RateLimitConfig {
    fn from(settings: &RateLimitSettings) -> Self {
        Self {
            max_attempts: settings.max_attempts,
            window_size: Duration::seconds(settings.window_seconds),
        }
    }
}

/// Failed attempts recorded for one key
#[derive(Debug, Default)]
struct AttemptWindow {
    timestamps: Vec<DateTime<Utc>>,
}

impl AttemptWindow {
    fn cleanup_old_attempts(&mut self, now: DateTime<Utc>, window_size: Duration) {
        let cutoff = now - window_size;
        self.timestamps.retain(|ts| *ts > cutoff);
    }

    /// Seconds until the oldest attempt leaves the window
    fn retry_after(&self, now: DateTime<Utc>, window_size: Duration) -> u64 {
        self.timestamps
            .iter()
            .min()
            .map(|oldest| (*oldest + window_size - now).num_seconds().max(1) as u64)
            .unwrap_or(1)
    }
}

/// Sliding-window limiter over failed authentication attempts.
///
/// Keys are normalised emails or client IPs. `check` runs before the guarded
/// operation and `record_failure` after it fails, so successful attempts never
/// consume a slot.
pub struct RateLimiter {
    windows: Arc<RwLock<HashMap<String, AttemptWindow>>>,
    config: RateLimitConfig,
    clock: Arc<dyn Clock>,
}

impl RateLimiter {
    pub fn new(config: RateLimitConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            windows: Arc::new(RwLock::new(HashMap::new())),
            config,
            clock,
        }
    }

    /// # Errors
    /// `AppError::RateLimited` once `max_attempts` failures sit inside the window
    pub async fn check(&self, key: &str) -> Result<(), AppError> {
        let now = self.clock.now();
        let mut windows = self.windows.write().await;

        let window = match windows.get_mut(key) {
            Some(window) => window,
            None => return Ok(()),
        };
        window.cleanup_old_attempts(now, self.config.window_size);

        if window.timestamps.len() >= self.config.max_attempts as usize {
            let retry_after_seconds = window.retry_after(now, self.config.window_size);
            tracing::warn!(key = %key, retry_after_seconds, "Rate limit exceeded");
            return Err(AppError::RateLimited { retry_after_seconds });
        }

        Ok(())
    }

    pub async fn record_failure(&self, key: &str) {
        let now = self.clock.now();
        let mut windows = self.windows.write().await;

        let window = windows.entry(key.to_string()).or_default();
        window.cleanup_old_attempts(now, self.config.window_size);
        window.timestamps.push(now);
    }

    /// Drops keys with no attempts left in the window. Returns how many went.
    pub async fn purge_idle(&self) -> usize {
        let now = self.clock.now();
        let mut windows = self.windows.write().await;
        let before = windows.len();

        windows.retain(|_, window| {
            window.cleanup_old_attempts(now, self.config.window_size);
            !window.timestamps.is_empty()
        });

        before - windows.len()
    }

    pub async fn tracked_keys(&self) -> usize {
        self.windows.read().await.len()
    }
}
