use std::sync::Arc;
use std::time::Duration;

use tracing::warn;

use crate::cache::CacheBackend;
use crate::cache::keys::login_attempt_key;
use crate::error::AppError;

/// 登录失败次数限制（按登录标识计数）
///
/// 计数放在缓存里，缓存不可用时放行。
#[derive(Clone)]
pub struct LoginLimiter {
    cache: Arc<dyn CacheBackend>,
    max_attempts: u32,
    window: Duration,
}

impl LoginLimiter {
    /// `max_attempts` 为 0 时不限制
    pub fn new(cache: Arc<dyn CacheBackend>, max_attempts: u32, window: Duration) -> Self {
        Self {
            cache,
            max_attempts,
            window,
        }
    }

    pub async fn check(&self, identifier: &str) -> Result<(), AppError> {
        if self.max_attempts == 0 {
            return Ok(());
        }

        let attempts = match self.cache.get(&login_attempt_key(identifier)).await {
            Ok(Some(value)) => value.parse::<u64>().unwrap_or_else(|_| {
                warn!(value = %value, "unparseable login attempt counter");
                0
            }),
            Ok(None) => 0,
            Err(e) => {
                warn!(error = %e, "login attempt counter unavailable");
                0
            }
        };

        if attempts >= u64::from(self.max_attempts) {
            return Err(AppError::TooManyAttempts {
                retry_after_secs: self.window.as_secs(),
            });
        }
        Ok(())
    }

    pub async fn record_failure(&self, identifier: &str) {
        if self.max_attempts == 0 {
            return;
        }
        if let Err(e) = self
            .cache
            .incr(&login_attempt_key(identifier), self.window)
            .await
        {
            warn!(error = %e, "failed to record login attempt");
        }
    }

    pub async fn reset(&self, identifier: &str) {
        if let Err(e) = self.cache.delete(&login_attempt_key(identifier)).await {
            warn!(error = %e, "failed to reset login attempts");
        }
    }
}
