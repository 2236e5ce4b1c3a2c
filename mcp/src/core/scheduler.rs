//! Delayed execution of retry attempts on a bounded set of workers.

use std::{
    future::Future,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
    time::Duration,
};

use tokio::{runtime::Handle, sync::Semaphore};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::error::{McpError, McpResult};

/// Runs jobs after a delay, at most `workers` of them at a time.
///
/// Every job is cancellable on its own and all of them stop on [`shutdown`].
///
/// [`shutdown`]: RetryScheduler::shutdown
#[derive(Debug)]
pub struct RetryScheduler {
    workers: usize,
    permits: Arc<Semaphore>,
    shutdown: CancellationToken,
    pending: Arc<AtomicUsize>,
}

impl RetryScheduler {
    pub fn new(workers: usize) -> Self {
        let workers = workers.max(1);
        Self {
            workers,
            permits: Arc::new(Semaphore::new(workers)),
            shutdown: CancellationToken::new(),
            pending: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Jobs scheduled but not yet finished or cancelled.
    pub fn pending(&self) -> usize {
        self.pending.load(Ordering::SeqCst)
    }

    /// Token for one job; cancelled by the caller or by scheduler shutdown.
    pub fn job_token(&self) -> CancellationToken {
        self.shutdown.child_token()
    }

    pub fn is_shutdown(&self) -> bool {
        self.shutdown.is_cancelled()
    }

    /// Run `job` once `delay` has elapsed, unless `cancel` fires first.
    ///
    /// Requires a tokio runtime.
    pub fn schedule<F, Fut>(
        &self,
        delay: Duration,
        cancel: CancellationToken,
        job: F,
    ) -> McpResult<()>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        if self.is_shutdown() {
            return Err(McpError::Scheduler("scheduler is shut down".to_string()));
        }
        let runtime = Handle::try_current()
            .map_err(|e| McpError::Scheduler(format!("no runtime for retry: {}", e)))?;

        let permits = Arc::clone(&self.permits);
        self.pending.fetch_add(1, Ordering::SeqCst);
        let pending = scopeguard::guard(Arc::clone(&self.pending), |count| {
            count.fetch_sub(1, Ordering::SeqCst);
        });

        runtime.spawn(async move {
            let _pending = pending;

            tokio::select! {
                _ = cancel.cancelled() => {
                    debug!("Scheduled retry cancelled before firing");
                    return;
                }
                _ = tokio::time::sleep(delay) => {}
            }

            let _permit = tokio::select! {
                _ = cancel.cancelled() => return,
                permit = permits.acquire_owned() => match permit {
                    Ok(permit) => permit,
                    Err(_) => return,
                },
            };

            if cancel.is_cancelled() {
                return;
            }
            job().await;
        });

        Ok(())
    }

    /// Cancel every pending job and refuse new ones.
    pub fn shutdown(&self) {
        self.shutdown.cancel();
        self.permits.close();
    }
}
