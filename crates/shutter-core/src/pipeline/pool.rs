//! Bounded worker pool and cooperative cancellation for pipeline runs.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

use crate::config::PipelineConfig;
use crate::error::IngestError;

use super::PipelineStage;

/// Caps the number of uploads decoded at once.
///
/// Each permit roughly corresponds to one full-size pixel buffer in memory,
/// so the pool size is the memory knob for concurrent uploads.
#[derive(Clone)]
pub struct WorkerPool {
    permits: Arc<Semaphore>,
    size: usize,
}

impl WorkerPool {
    pub fn new(config: &PipelineConfig) -> Self {
        let size = config.workers.max(1);
        Self {
            permits: Arc::new(Semaphore::new(size)),
            size,
        }
    }

    /// Wait for a free worker slot. The slot is released when the permit drops.
    pub async fn acquire(&self) -> Result<OwnedSemaphorePermit, IngestError> {
        self.permits
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| IngestError::Worker("worker pool closed".to_string()))
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn available(&self) -> usize {
        self.permits.available_permits()
    }
}

/// Run CPU-bound `f` on the blocking thread pool with a time limit.
///
/// On timeout the blocking task keeps running to completion in the
/// background, so `f` must not have side effects outside its return value.
/// The task holds `permit` until it actually finishes, so an abandoned task
/// still counts against the pool.
pub async fn run_blocking<T, F>(
    stage: PipelineStage,
    timeout: Duration,
    permit: Arc<OwnedSemaphorePermit>,
    f: F,
) -> Result<T, IngestError>
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    let task = tokio::task::spawn_blocking(move || {
        let _permit = permit;
        f()
    });
    match tokio::time::timeout(timeout, task).await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(join_err)) => Err(IngestError::Worker(join_err.to_string())),
        Err(_) => Err(IngestError::Timeout {
            stage,
            timeout_ms: timeout.as_millis() as u64,
        }),
    }
}

/// Shared flag the caller sets to abandon an upload.
///
/// Checked between stages; storage writes, once started, always finish or
/// roll back.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Error with `Cancelled` if the token was triggered before `stage`.
    pub fn check(&self, stage: PipelineStage) -> Result<(), IngestError> {
        if self.is_cancelled() {
            Err(IngestError::Cancelled { stage })
        } else {
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_pool_limits_concurrency() {
        let config = PipelineConfig {
            workers: 2,
            ..PipelineConfig::default()
        };
        let pool = WorkerPool::new(&config);
        assert_eq!(pool.size(), 2);

        let a = pool.acquire().await.unwrap();
        let _b = pool.acquire().await.unwrap();
        assert_eq!(pool.available(), 0);

        drop(a);
        assert_eq!(pool.available(), 1);
    }

    async fn permit(pool: &WorkerPool) -> Arc<OwnedSemaphorePermit> {
        Arc::new(pool.acquire().await.unwrap())
    }

    fn single_worker() -> WorkerPool {
        WorkerPool::new(&PipelineConfig {
            workers: 1,
            ..PipelineConfig::default()
        })
    }

    #[tokio::test]
    async fn test_run_blocking_returns_value() {
        let pool = single_worker();
        let held = permit(&pool).await;
        let out = run_blocking(PipelineStage::Received, Duration::from_secs(5), held, || 21 * 2)
            .await
            .unwrap();
        assert_eq!(out, 42);
        assert_eq!(pool.available(), 1);
    }

    #[tokio::test]
    async fn test_run_blocking_times_out() {
        let pool = single_worker();
        let held = permit(&pool).await;
        let err = run_blocking(PipelineStage::Validated, Duration::from_millis(10), held, || {
            std::thread::sleep(Duration::from_millis(300));
        })
        .await
        .unwrap_err();
        assert_eq!(err.reason_code(), "timeout");
        assert_eq!(err.stage(), PipelineStage::Validated);
    }

    #[tokio::test]
    async fn test_timed_out_task_keeps_its_slot_until_done() {
        let pool = single_worker();
        let held = permit(&pool).await;
        let err = run_blocking(PipelineStage::Validated, Duration::from_millis(20), held, || {
            std::thread::sleep(Duration::from_millis(400));
        })
        .await
        .unwrap_err();
        assert_eq!(err.reason_code(), "timeout");

        // The caller has dropped its handle but the decode is still running.
        assert_eq!(pool.available(), 0);

        let next = tokio::time::timeout(Duration::from_secs(5), pool.acquire())
            .await
            .expect("slot released once the abandoned task ends")
            .unwrap();
        drop(next);
        assert_eq!(pool.available(), 1);
    }

    #[tokio::test]
    async fn test_run_blocking_panic_is_worker_failure() {
        let pool = single_worker();
        let held = permit(&pool).await;
        let err = run_blocking(PipelineStage::Received, Duration::from_secs(5), held, || {
            panic!("codec bug")
        })
        .await
        .map(|_: ()| ())
        .unwrap_err();
        assert_eq!(err.reason_code(), "worker_failed");
    }

    #[test]
    fn test_cancel_token() {
        let token = CancelToken::new();
        assert!(token.check(PipelineStage::Normalized).is_ok());

        let clone = token.clone();
        clone.cancel();
        let err = token.check(PipelineStage::Normalized).unwrap_err();
        assert_eq!(err.reason_code(), "cancelled");
        assert_eq!(err.stage(), PipelineStage::Normalized);
    }
}
