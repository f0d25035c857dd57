//! 带指数退避的重试执行器
//!
//! 延迟序列 `initial_delay * backoff_factor^n` 作为 `tokio-retry` 的策略迭代器，
//! 只有错误类型在 `retryable` 中才会重试。

use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use tokio_retry::RetryIf;
use tracing::{info, warn};

use crate::app_config::settings::ApiSettings;
use crate::error::{PipelineError, TransportError, TransportErrorKind};

/// 重试策略
#[derive(Debug, Clone, PartialEq)]
pub struct BackoffPolicy {
    max_retries: usize,
    initial_delay: Duration,
    backoff_factor: f64,
    retryable: Vec<TransportErrorKind>,
}

impl BackoffPolicy {
    /// 默认只重试超时和连接失败
    pub fn new(
        max_retries: usize,
        initial_delay: Duration,
        backoff_factor: f64,
    ) -> Result<Self, PipelineError> {
        if initial_delay.is_zero() {
            return Err(PipelineError::InvalidRequest(
                "initial_delay 必须大于 0".to_string(),
            ));
        }
        if !backoff_factor.is_finite() || backoff_factor < 1.0 {
            return Err(PipelineError::InvalidRequest(format!(
                "backoff_factor 必须 >= 1, 实际为 {}",
                backoff_factor
            )));
        }
        Ok(Self {
            max_retries,
            initial_delay,
            backoff_factor,
            retryable: vec![
                TransportErrorKind::Timeout,
                TransportErrorKind::ConnectionFailure,
            ],
        })
    }

    pub fn from_settings(settings: &ApiSettings) -> Result<Self, PipelineError> {
        Self::new(settings.retries, settings.retry_delay, settings.backoff_factor)
    }

    pub fn with_retryable(mut self, kinds: &[TransportErrorKind]) -> Self {
        self.retryable = kinds.to_vec();
        self
    }

    pub fn is_retryable(&self, kind: TransportErrorKind) -> bool {
        self.retryable.contains(&kind)
    }

    /// 每次重试前的等待时间，共 `max_retries` 项
    pub fn delays(&self) -> impl Iterator<Item = Duration> {
        let factor = self.backoff_factor;
        std::iter::successors(Some(self.initial_delay), move |d| {
            Some(Duration::try_from_secs_f64(d.as_secs_f64() * factor).unwrap_or(Duration::MAX))
        })
        .take(self.max_retries)
    }
}

/// 重试执行器，只挂起调用方所在的任务
#[derive(Debug, Clone)]
pub struct BackoffExecutor {
    policy: BackoffPolicy,
}

impl BackoffExecutor {
    pub fn new(policy: BackoffPolicy) -> Self {
        Self { policy }
    }

    pub async fn execute<T, A, Fut>(&self, mut operation: A) -> Result<T, TransportError>
    where
        A: FnMut() -> Fut,
        Fut: Future<Output = Result<T, TransportError>>,
    {
        let attempts = AtomicUsize::new(0);
        let total = self.policy.max_retries + 1;

        let action = || {
            attempts.fetch_add(1, Ordering::SeqCst);
            operation()
        };
        let condition = |err: &TransportError| {
            let attempt = attempts.load(Ordering::SeqCst);
            let retryable = self.policy.is_retryable(err.kind());
            if retryable && attempt < total {
                warn!("请求失败 (尝试 {}/{}): {}", attempt, total, err);
            } else if !retryable {
                info!("不可重试的错误, 直接返回: {}", err);
            }
            retryable
        };

        let result = RetryIf::spawn(self.policy.delays(), action, condition).await;
        if let Err(err) = &result {
            let attempt = attempts.load(Ordering::SeqCst);
            if attempt > 1 {
                warn!("重试 {} 次后仍然失败: {}", attempt - 1, err);
            }
        }
        result
    }
}
