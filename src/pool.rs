use std::future::Future;
use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::JoinError;

use crate::config::StreamTarget;

/// Result of one per-stream task.
#[derive(Debug)]
pub struct TaskReport<T> {
    pub target: StreamTarget,
    /// `Err` only when the task panicked.
    pub outcome: Result<T, JoinError>,
}

/// Runs one task per stream with at most `limit` in flight, then joins all.
pub struct StreamWorkerPool {
    permits: Arc<Semaphore>,
    limit: usize,
}

impl StreamWorkerPool {
    pub fn new(limit: usize) -> Self {
        let limit = limit.max(1);
        Self {
            permits: Arc::new(Semaphore::new(limit)),
            limit,
        }
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Reports come back in `targets` order once every task has finished.
    pub async fn run<T, F, Fut>(&self, targets: &[StreamTarget], task: F) -> Vec<TaskReport<T>>
    where
        F: Fn(StreamTarget) -> Fut,
        Fut: Future<Output = T> + Send + 'static,
        T: Send + 'static,
    {
        let mut handles = Vec::with_capacity(targets.len());

        for target in targets {
            let Ok(permit) = Arc::clone(&self.permits).acquire_owned().await else {
                tracing::error!("worker permits closed, not starting remaining streams");
                break;
            };

            let work = task(target.clone());
            let handle = tokio::spawn(async move {
                let _permit = permit;
                work.await
            });
            handles.push((target.clone(), handle));
        }

        let mut reports = Vec::with_capacity(handles.len());
        for (target, handle) in handles {
            let outcome = handle.await;
            if let Err(e) = &outcome {
                tracing::error!(stream = %target.name, "stream task failed: {}", e);
            }
            reports.push(TaskReport { target, outcome });
        }
        reports
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    fn targets(n: usize) -> Vec<StreamTarget> {
        (0..n)
            .map(|i| StreamTarget {
                name: format!("cam{i}"),
                url: format!("rtsp://10.0.0.{i}/stream"),
            })
            .collect()
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrency_bounded() {
        let pool = StreamWorkerPool::new(3);
        let running = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let reports = pool
            .run(&targets(10), |target| {
                let running = Arc::clone(&running);
                let peak = Arc::clone(&peak);
                async move {
                    let now = running.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(now, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_secs(5)).await;
                    running.fetch_sub(1, Ordering::SeqCst);
                    target.name
                }
            })
            .await;

        assert_eq!(peak.load(Ordering::SeqCst), 3);
        assert_eq!(running.load(Ordering::SeqCst), 0);
        let names: Vec<_> = reports
            .into_iter()
            .map(|r| r.outcome.unwrap())
            .collect();
        assert_eq!(names, targets(10).into_iter().map(|t| t.name).collect::<Vec<_>>());
    }

    #[tokio::test(start_paused = true)]
    async fn test_results_keep_target_order() {
        let pool = StreamWorkerPool::new(4);
        let reports = pool
            .run(&targets(4), |target| async move {
                // later targets finish first
                let rank: u64 = target.name.trim_start_matches("cam").parse().unwrap();
                tokio::time::sleep(Duration::from_secs(10 - rank)).await;
                rank
            })
            .await;
        let ranks: Vec<u64> = reports.into_iter().map(|r| r.outcome.unwrap()).collect();
        assert_eq!(ranks, vec![0, 1, 2, 3]);
    }

    #[tokio::test]
    async fn test_panicking_task_isolated() {
        let pool = StreamWorkerPool::new(2);
        let reports = pool
            .run(&targets(3), |target| async move {
                if target.name == "cam1" {
                    panic!("boom");
                }
                target.url
            })
            .await;

        assert_eq!(reports.len(), 3);
        assert!(reports[0].outcome.is_ok());
        assert!(reports[1].outcome.as_ref().unwrap_err().is_panic());
        assert_eq!(reports[2].outcome.as_ref().unwrap(), "rtsp://10.0.0.2/stream");
    }

    #[tokio::test]
    async fn test_zero_limit_still_runs() {
        let pool = StreamWorkerPool::new(0);
        assert_eq!(pool.limit(), 1);
        let reports = pool.run(&targets(2), |_| async { 1 }).await;
        assert_eq!(reports.len(), 2);
    }
}
