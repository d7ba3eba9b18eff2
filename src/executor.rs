//! Running partition tasks.
//!
//! The builder hands an executor one input per partition and a task to run
//! on each. Results come back in input order no matter which task finishes
//! first, so the merge sees partitions in id order.

use crate::{Error, Result};
use async_trait::async_trait;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::debug;

#[async_trait]
pub trait Executor: Send + Sync {
    /// Run `task` on every input and collect the outputs in input order.
    ///
    /// The first failing task fails the whole map.
    async fn map<I, O, F, Fut>(&self, inputs: Vec<I>, task: F) -> Result<Vec<O>>
    where
        I: Send + 'static,
        O: Send + 'static,
        F: Fn(I) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<O>> + Send + 'static;

    /// [`map`](Self::map), then hand the ordered outputs to `reduce`.
    async fn map_reduce<I, O, R, F, Fut, G>(
        &self,
        inputs: Vec<I>,
        task: F,
        reduce: G,
    ) -> Result<R>
    where
        I: Send + 'static,
        O: Send + 'static,
        F: Fn(I) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<O>> + Send + 'static,
        G: FnOnce(Vec<O>) -> R + Send,
    {
        let outputs = self.map(inputs, task).await?;
        Ok(reduce(outputs))
    }
}

/// Runs tasks on the tokio runtime, at most `max_concurrency` at a time.
#[derive(Debug, Clone)]
pub struct TokioExecutor {
    max_concurrency: usize,
}

impl TokioExecutor {
    pub fn new(max_concurrency: usize) -> Self {
        Self {
            max_concurrency: max_concurrency.max(1),
        }
    }

    pub fn max_concurrency(&self) -> usize {
        self.max_concurrency
    }
}

impl Default for TokioExecutor {
    fn default() -> Self {
        Self::new(8)
    }
}

#[async_trait]
impl Executor for TokioExecutor {
    async fn map<I, O, F, Fut>(&self, inputs: Vec<I>, task: F) -> Result<Vec<O>>
    where
        I: Send + 'static,
        O: Send + 'static,
        F: Fn(I) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<O>> + Send + 'static,
    {
        let semaphore = Arc::new(Semaphore::new(self.max_concurrency));
        let task = Arc::new(task);
        let mut join_set: JoinSet<Result<(usize, O)>> = JoinSet::new();

        debug!(
            tasks = inputs.len(),
            max_concurrency = self.max_concurrency,
            "spawning tasks"
        );

        for (position, input) in inputs.into_iter().enumerate() {
            let semaphore = Arc::clone(&semaphore);
            let task = Arc::clone(&task);
            join_set.spawn(async move {
                let _permit = semaphore
                    .acquire_owned()
                    .await
                    .map_err(|e| Error::Internal(format!("semaphore closed: {}", e)))?;
                let output = (*task)(input).await?;
                Ok((position, output))
            });
        }

        // Dropping the join set on error aborts the tasks still running
        let mut results = Vec::with_capacity(join_set.len());
        while let Some(joined) = join_set.join_next().await {
            let (position, output) =
                joined.map_err(|e| Error::Internal(format!("task failed: {}", e)))??;
            results.push((position, output));
        }

        results.sort_by_key(|(position, _)| *position);
        Ok(results.into_iter().map(|(_, output)| output).collect())
    }
}

/// Runs tasks one after another on the calling task.
#[derive(Debug, Clone, Copy, Default)]
pub struct SequentialExecutor;

#[async_trait]
impl Executor for SequentialExecutor {
    async fn map<I, O, F, Fut>(&self, inputs: Vec<I>, task: F) -> Result<Vec<O>>
    where
        I: Send + 'static,
        O: Send + 'static,
        F: Fn(I) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<O>> + Send + 'static,
    {
        let mut outputs = Vec::with_capacity(inputs.len());
        for input in inputs {
            outputs.push(task(input).await?);
        }
        Ok(outputs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[tokio::test]
    async fn test_tokio_executor_keeps_input_order() {
        let executor = TokioExecutor::new(4);
        // Later inputs finish first
        let outputs = executor
            .map((0..6u64).collect(), |n| async move {
                tokio::time::sleep(Duration::from_millis(30 - n * 5)).await;
                Ok(n * 10)
            })
            .await
            .unwrap();
        assert_eq!(outputs, vec![0, 10, 20, 30, 40, 50]);
    }

    #[tokio::test]
    async fn test_tokio_executor_bounds_concurrency() {
        let running = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));
        let executor = TokioExecutor::new(2);

        let (r, p) = (Arc::clone(&running), Arc::clone(&peak));
        executor
            .map((0..8).collect::<Vec<u32>>(), move |_| {
                let (running, peak) = (Arc::clone(&r), Arc::clone(&p));
                async move {
                    let now = running.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(now, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(5)).await;
                    running.fetch_sub(1, Ordering::SeqCst);
                    Ok(())
                }
            })
            .await
            .unwrap();

        assert!(peak.load(Ordering::SeqCst) <= 2);
    }

    #[tokio::test]
    async fn test_failing_task_fails_map() {
        let result = TokioExecutor::new(3)
            .map(vec![1, 2, 3], |n| async move {
                if n == 2 {
                    Err(Error::Storage("boom".into()))
                } else {
                    Ok(n)
                }
            })
            .await;
        assert!(matches!(result, Err(Error::Storage(_))));
    }

    #[tokio::test]
    async fn test_sequential_executor() {
        let outputs = SequentialExecutor
            .map(vec!["a", "bb", "ccc"], |s| async move { Ok(s.len()) })
            .await
            .unwrap();
        assert_eq!(outputs, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn test_map_reduce_sees_ordered_outputs() {
        let joined = TokioExecutor::new(3)
            .map_reduce(
                vec![3u64, 1, 2],
                |n| async move {
                    tokio::time::sleep(Duration::from_millis(n * 5)).await;
                    Ok(n.to_string())
                },
                |parts| parts.concat(),
            )
            .await
            .unwrap();
        assert_eq!(joined, "312");
    }

    #[test]
    fn test_zero_concurrency_is_clamped() {
        assert_eq!(TokioExecutor::new(0).max_concurrency(), 1);
    }
}
