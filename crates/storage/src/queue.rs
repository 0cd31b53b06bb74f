// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Bounded-concurrency work queue with fixed-delay retries
//!
//! Tasks start in submission order. At most `concurrency` tasks run at once;
//! with a concurrency of 1 the queue is a single ordered lane. A failing task
//! is retried up to `max_retries` times, `retry_delay` apart, before its
//! handle resolves to [`QueueError::Exhausted`]. A failed task never stops
//! the queue from running later tasks.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot, Semaphore};

/// Queue configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueConfig {
    /// Tasks allowed to run at once
    pub concurrency: usize,
    /// Retries after the first failed attempt
    pub max_retries: u32,
    /// Wait between attempts
    #[serde(with = "humantime_serde")]
    pub retry_delay: Duration,
}

impl QueueConfig {
    pub fn new(concurrency: usize) -> Self {
        Self {
            concurrency,
            ..Self::default()
        }
    }

    pub fn with_retries(mut self, max_retries: u32, retry_delay: Duration) -> Self {
        self.max_retries = max_retries;
        self.retry_delay = retry_delay;
        self
    }
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            concurrency: 1,
            max_retries: 5,
            retry_delay: Duration::from_millis(200),
        }
    }
}

/// Errors reported through a [`TaskHandle`]
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QueueError {
    #[error("task failed after {attempts} attempts: {last_error}")]
    Exhausted { attempts: u32, last_error: String },
    #[error("work queue is closed")]
    Closed,
}

type Job = Box<dyn FnOnce() -> Pin<Box<dyn Future<Output = ()> + Send>> + Send>;

/// Handle to a queued task's eventual result
#[must_use = "dropping the handle does not cancel the task"]
pub struct TaskHandle<T> {
    id: u64,
    rx: oneshot::Receiver<Result<T, QueueError>>,
}

impl<T> TaskHandle<T> {
    /// Submission sequence number
    pub fn id(&self) -> u64 {
        self.id
    }
}

impl<T> Future for TaskHandle<T> {
    type Output = Result<T, QueueError>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.rx).poll(cx).map(|received| match received {
            Ok(result) => result,
            Err(_) => Err(QueueError::Closed),
        })
    }
}

/// Ordered work queue
///
/// Must be created inside a tokio runtime. Clones share the same lane.
#[derive(Clone)]
pub struct WorkQueue {
    tx: mpsc::UnboundedSender<Job>,
    config: QueueConfig,
    next_id: Arc<AtomicU64>,
}

impl WorkQueue {
    pub fn new(config: QueueConfig) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        tokio::spawn(dispatch(rx, config.concurrency.max(1)));
        Self {
            tx,
            config,
            next_id: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn config(&self) -> &QueueConfig {
        &self.config
    }

    /// Submit a task
    ///
    /// `task` is called once per attempt. The returned handle resolves with
    /// the first successful output, or with [`QueueError::Exhausted`].
    pub fn enqueue<T, E, F, Fut>(&self, mut task: F) -> TaskHandle<T>
    where
        T: Send + 'static,
        E: fmt::Display + Send + 'static,
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
    {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let (done_tx, rx) = oneshot::channel();
        let max_retries = self.config.max_retries;
        let retry_delay = self.config.retry_delay;

        let job: Job = Box::new(move || {
            Box::pin(async move {
                let result = run_with_retry(id, &mut task, max_retries, retry_delay).await;
                // Receiver may have been dropped; the task still ran
                let _ = done_tx.send(result);
            })
        });

        if self.tx.send(job).is_err() {
            tracing::error!(task_id = id, "work queue dispatcher is gone, task dropped");
        }

        TaskHandle { id, rx }
    }
}

async fn dispatch(mut rx: mpsc::UnboundedReceiver<Job>, concurrency: usize) {
    let permits = Arc::new(Semaphore::new(concurrency));
    while let Some(job) = rx.recv().await {
        let Ok(permit) = Arc::clone(&permits).acquire_owned().await else {
            break;
        };
        tokio::spawn(async move {
            job().await;
            drop(permit);
        });
    }
}

async fn run_with_retry<T, E, F, Fut>(
    task_id: u64,
    task: &mut F,
    max_retries: u32,
    retry_delay: Duration,
) -> Result<T, QueueError>
where
    E: fmt::Display,
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let mut attempt: u32 = 0;
    loop {
        attempt += 1;
        match task().await {
            Ok(output) => {
                if attempt > 1 {
                    tracing::info!(task_id, attempt, "task succeeded after retry");
                }
                return Ok(output);
            }
            Err(e) if attempt <= max_retries => {
                tracing::warn!(
                    task_id,
                    attempt,
                    retry_in_ms = retry_delay.as_millis() as u64,
                    error = %e,
                    "task failed, retrying"
                );
                tokio::time::sleep(retry_delay).await;
            }
            Err(e) => {
                tracing::error!(task_id, attempts = attempt, error = %e, "task failed permanently");
                return Err(QueueError::Exhausted {
                    attempts: attempt,
                    last_error: e.to_string(),
                });
            }
        }
    }
}

#[cfg(test)]
#[path = "queue_tests.rs"]
mod tests;
