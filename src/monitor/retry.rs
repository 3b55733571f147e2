use backoff::{future::retry, ExponentialBackoff};
use std::future::Future;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use crate::utils::AppError;

/// 재시도 정책
///
/// 시도 횟수로 상한을 두고, 시도 사이에는 지수 백오프로 대기합니다.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// 첫 시도를 포함한 최대 시도 횟수
    pub max_attempts: u32,
    pub initial_interval: Duration,
    pub max_interval: Duration,
    pub multiplier: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_interval: Duration::from_millis(1000),
            max_interval: Duration::from_secs(10),
            multiplier: 2.0,
        }
    }
}

impl RetryPolicy {
    /// 지수 백오프 설정 생성
    fn backoff(&self) -> ExponentialBackoff {
        ExponentialBackoff {
            initial_interval: self.initial_interval,
            max_interval: self.max_interval,
            multiplier: self.multiplier,
            // 상한은 시도 횟수로 제어
            max_elapsed_time: None,
            ..Default::default()
        }
    }
}

/// 재시도 로직을 적용한 비동기 작업 실행
///
/// 일시적 오류 시 `max_attempts`까지 지수 백오프로 재시도하고,
/// 영구적 오류 시 즉시 실패를 반환합니다.
pub async fn with_retry<F, Fut, T>(policy: &RetryPolicy, operation: F) -> Result<T, AppError>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<T, AppError>>,
{
    let attempts = AtomicU32::new(0);
    let attempts = &attempts;
    let operation = &operation;
    let max_attempts = policy.max_attempts.max(1);

    retry(policy.backoff(), move || async move {
        let attempt = attempts.fetch_add(1, Ordering::SeqCst) + 1;
        match operation().await {
            Ok(result) => Ok(result),
            Err(e) if e.is_retryable() && attempt < max_attempts => {
                tracing::warn!(error = %e, attempt, max_attempts, "Retryable error, will retry...");
                Err(backoff::Error::transient(e))
            }
            Err(e) => {
                if e.is_retryable() {
                    tracing::error!(error = %e, attempt, "Retries exhausted");
                } else {
                    tracing::error!(error = %e, "Permanent error, not retrying");
                }
                Err(backoff::Error::permanent(e))
            }
        }
    })
    .await
}
