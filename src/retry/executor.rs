//! Wraps an async operation with a retry policy and an optional circuit
//! breaker. Three named instances (Storefront, Rms, Sync) are constructed at
//! startup with distinct policies — see `RetryExecutor::storefront`,
//! `::rms`, `::sync`.

use rand::Rng;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use crate::error::SyncError;
use crate::retry::circuit_breaker::{CircuitBreaker, CircuitBreakerConfig};

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub exponential_base: f64,
    pub jitter: bool,
    pub op_timeout: Duration,
}

impl RetryPolicy {
    /// `min(maxDelay, baseDelay * base^(k-1))`, then +/-10% jitter.
    fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let exp = self.exponential_base.powi(attempt as i32 - 1);
        let raw = self.base_delay.mul_f64(exp).min(self.max_delay);
        if !self.jitter {
            return raw;
        }
        let mut rng = rand::thread_rng();
        let factor = rng.gen_range(0.9..=1.1);
        raw.mul_f64(factor)
    }
}

#[derive(Debug, Default)]
pub struct ExecutorMetrics {
    pub total_attempts: AtomicU64,
    pub total_successes: AtomicU64,
    pub total_failures: AtomicU64,
    pub total_retries: AtomicU64,
}

#[derive(Debug, Clone)]
pub struct ExecutorMetricsSnapshot {
    pub total_attempts: u64,
    pub total_successes: u64,
    pub total_failures: u64,
    pub total_retries: u64,
}

pub struct RetryExecutor {
    name: String,
    policy: RetryPolicy,
    breaker: Option<Arc<CircuitBreaker>>,
    metrics: ExecutorMetrics,
}

impl RetryExecutor {
    pub fn new(name: impl Into<String>, policy: RetryPolicy, breaker: Option<Arc<CircuitBreaker>>) -> Self {
        RetryExecutor {
            name: name.into(),
            policy,
            breaker,
            metrics: ExecutorMetrics::default(),
        }
    }

    /// The Storefront policy: max 3, base 1s, cap 30s, breaker threshold 10
    /// failures / reset 60s, 180s op timeout.
    pub fn storefront() -> Self {
        let breaker = CircuitBreaker::new(
            "storefront",
            CircuitBreakerConfig {
                failure_threshold: 10,
                success_threshold: 2,
                reset_timeout: Duration::from_secs(60),
            },
        );
        RetryExecutor::new(
            "storefront",
            RetryPolicy {
                max_attempts: 3,
                base_delay: Duration::from_secs(1),
                max_delay: Duration::from_secs(30),
                exponential_base: 2.0,
                jitter: true,
                op_timeout: Duration::from_secs(180),
            },
            Some(Arc::new(breaker)),
        )
    }

    /// The Rms policy: max 3, base 2s, cap 60s, breaker threshold 2 /
    /// reset 300s, 45s op timeout.
    pub fn rms() -> Self {
        let breaker = CircuitBreaker::new(
            "rms",
            CircuitBreakerConfig {
                failure_threshold: 2,
                success_threshold: 2,
                reset_timeout: Duration::from_secs(300),
            },
        );
        RetryExecutor::new(
            "rms",
            RetryPolicy {
                max_attempts: 3,
                base_delay: Duration::from_secs(2),
                max_delay: Duration::from_secs(60),
                exponential_base: 2.0,
                jitter: true,
                op_timeout: Duration::from_secs(45),
            },
            Some(Arc::new(breaker)),
        )
    }

    /// The Sync policy: max 2, base 5s, cap 120s, no breaker.
    pub fn sync() -> Self {
        RetryExecutor::new(
            "sync",
            RetryPolicy {
                max_attempts: 2,
                base_delay: Duration::from_secs(5),
                max_delay: Duration::from_secs(120),
                exponential_base: 2.0,
                jitter: true,
                op_timeout: Duration::from_secs(120),
            },
            None,
        )
    }

    pub fn breaker(&self) -> Option<&Arc<CircuitBreaker>> {
        self.breaker.as_ref()
    }

    pub fn metrics(&self) -> ExecutorMetricsSnapshot {
        ExecutorMetricsSnapshot {
            total_attempts: self.metrics.total_attempts.load(Ordering::Relaxed),
            total_successes: self.metrics.total_successes.load(Ordering::Relaxed),
            total_failures: self.metrics.total_failures.load(Ordering::Relaxed),
            total_retries: self.metrics.total_retries.load(Ordering::Relaxed),
        }
    }

    /// Runs `op`, retrying per policy. `op` is re-invoked via the closure on
    /// every attempt since a `Future` can only be polled to completion once.
    pub async fn execute<F, Fut, T>(&self, mut op: F) -> Result<T, SyncError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, SyncError>>,
    {
        if let Some(breaker) = &self.breaker {
            if !breaker.can_execute() {
                warn!(executor = %self.name, "circuit open, refusing call");
                return Err(SyncError::CircuitOpen(self.name.clone()));
            }
        }

        let mut attempt = 0u32;
        loop {
            attempt += 1;
            self.metrics.total_attempts.fetch_add(1, Ordering::Relaxed);

            let timeout = self.policy.op_timeout;
            let result = tokio::time::timeout(timeout, op()).await;

            let outcome = match result {
                Ok(inner) => inner,
                Err(_) => Err(SyncError::Timeout(timeout)),
            };

            match outcome {
                Ok(value) => {
                    if let Some(breaker) = &self.breaker {
                        breaker.record_success();
                    }
                    self.metrics.total_successes.fetch_add(1, Ordering::Relaxed);
                    return Ok(value);
                }
                Err(err) => {
                    if let Some(breaker) = &self.breaker {
                        breaker.record_failure();
                    }

                    let retry_after = match &err {
                        SyncError::RateLimited { retry_after_secs } => {
                            Some(Duration::from_secs(*retry_after_secs))
                        }
                        _ => None,
                    };

                    let exhausted = attempt >= self.policy.max_attempts;
                    let non_retryable = !err.is_retryable();

                    if exhausted || non_retryable {
                        self.metrics.total_failures.fetch_add(1, Ordering::Relaxed);
                        warn!(executor = %self.name, attempt, error = %err, "retry exhausted");
                        return Err(err);
                    }

                    self.metrics.total_retries.fetch_add(1, Ordering::Relaxed);
                    let delay = retry_after
                        .map(|d| d.min(self.policy.max_delay))
                        .unwrap_or_else(|| self.policy.delay_for_attempt(attempt));
                    debug!(executor = %self.name, attempt, ?delay, error = %err, "retrying");
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicU32;

    #[tokio::test]
    async fn succeeds_without_retry() {
        let exec = RetryExecutor::sync();
        let result = exec.execute(|| async { Ok::<_, SyncError>(42) }).await;
        assert_eq!(result.unwrap(), 42);
    }

    #[tokio::test]
    async fn retries_transient_then_succeeds() {
        let exec = RetryExecutor::new(
            "t",
            RetryPolicy {
                max_attempts: 3,
                base_delay: Duration::from_millis(1),
                max_delay: Duration::from_millis(5),
                exponential_base: 2.0,
                jitter: false,
                op_timeout: Duration::from_secs(5),
            },
            None,
        );
        let calls = AtomicU32::new(0);
        let result = exec
            .execute(|| async {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                if n < 2 {
                    Err(SyncError::RmsConnection("down".into()))
                } else {
                    Ok(99)
                }
            })
            .await;
        assert_eq!(result.unwrap(), 99);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn stops_on_non_retryable() {
        let exec = RetryExecutor::sync();
        let calls = AtomicU32::new(0);
        let result: Result<(), SyncError> = exec
            .execute(|| async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(SyncError::InvalidOrderData("bad sku".into()))
            })
            .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn circuit_open_short_circuits() {
        let breaker = Arc::new(CircuitBreaker::new(
            "b",
            CircuitBreakerConfig {
                failure_threshold: 1,
                success_threshold: 1,
                reset_timeout: Duration::from_secs(60),
            },
        ));
        let exec = RetryExecutor::new(
            "t",
            RetryPolicy {
                max_attempts: 1,
                base_delay: Duration::from_millis(1),
                max_delay: Duration::from_millis(1),
                exponential_base: 2.0,
                jitter: false,
                op_timeout: Duration::from_secs(5),
            },
            Some(breaker.clone()),
        );
        breaker.record_failure();
        let calls = AtomicU32::new(0);
        let result: Result<(), SyncError> = exec
            .execute(|| async {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(())
            })
            .await;
        assert!(matches!(result, Err(SyncError::CircuitOpen(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }
}
