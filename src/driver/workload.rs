//! Workload
//!
//! 일시적 서버 오류(597)에 대한 선형 재시도

use std::future::Future;
use std::time::Duration;

use futures::future::BoxFuture;

use super::error::{DriverError, DriverResult};

/// 재시도 래퍼
///
/// `attempts` 가 0 또는 1 이면 정확히 한 번 실행합니다. 재시도 가능한 오류가
/// 아니거나 시도 횟수를 모두 쓰면 마지막 오류를 그대로 반환합니다.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Workload {
    /// 최대 시도 횟수
    pub attempts: u32,
    /// 재시도 간격
    pub interval: Duration,
}

impl Workload {
    /// 새 워크로드
    pub fn new(attempts: u32, interval: Duration) -> Self {
        Self { attempts, interval }
    }

    /// 최소 1 로 보정한 시도 횟수
    pub fn budget(&self) -> u32 {
        self.attempts.max(1)
    }

    /// 실패한 시도 뒤 재시도 여부 결정
    ///
    /// 재시도한다면 남은 횟수를 줄이고 간격만큼 기다린 뒤 `true` 를 반환합니다.
    pub async fn retry_after(&self, error: &DriverError, remaining: &mut u32) -> bool {
        if !error.is_retryable() || *remaining <= 1 {
            return false;
        }

        *remaining -= 1;
        tracing::debug!(remaining = *remaining, %error, "retrying after transient server error");
        tokio::time::sleep(self.interval).await;
        true
    }

    /// 작업 실행 (재시도 포함)
    pub async fn linear_retry<T, F, Fut>(&self, mut work: F) -> DriverResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = DriverResult<T>>,
    {
        let mut remaining = self.budget();

        loop {
            let error = match work().await {
                Ok(value) => return Ok(value),
                Err(e) => e,
            };
            if !self.retry_after(&error, &mut remaining).await {
                return Err(error);
            }
        }
    }

    /// 가변 컨텍스트를 빌려 작업 실행 (재시도 포함)
    ///
    /// 매 시도마다 `ctx` 를 다시 빌려주므로 연결처럼 `&mut` 가 필요한 대상에
    /// 사용합니다.
    pub async fn linear_retry_with<C, T, F>(&self, ctx: &mut C, mut work: F) -> DriverResult<T>
    where
        C: ?Sized,
        F: for<'a> FnMut(&'a mut C) -> BoxFuture<'a, DriverResult<T>>,
    {
        let mut remaining = self.budget();

        loop {
            let error = match work(&mut *ctx).await {
                Ok(value) => return Ok(value),
                Err(e) => e,
            };
            if !self.retry_after(&error, &mut remaining).await {
                return Err(error);
            }
        }
    }
}

impl Default for Workload {
    fn default() -> Self {
        Self::new(1, Duration::from_micros(200))
    }
}

// ============================================================================
// Tests
// ============================================================================
