use std::future::Future;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::time::MissedTickBehavior;

/// How long `stop` waits for a running job before aborting it
const STOP_GRACE: Duration = Duration::from_millis(500);

/// A job run right away and then every `interval` on a background task
///
/// Ticks missed while a job is still running are not made up. Dropping the
/// task aborts it.
pub struct PeriodicTask {
    label: String,
    stop_tx: Option<broadcast::Sender<()>>,
    task_handle: Option<tokio::task::JoinHandle<()>>,
}

impl PeriodicTask {
    /// Spawn `job` on the current runtime
    pub fn spawn<F, Fut>(label: impl Into<String>, interval: Duration, mut job: F) -> Self
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let label = label.into();
        let (stop_tx, mut stop_rx) = broadcast::channel(1);

        let task_label = label.clone();
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = stop_rx.recv() => {
                        tracing::debug!("{} stopped", task_label);
                        break;
                    }
                    _ = ticker.tick() => {
                        job().await;
                    }
                }
            }
        });

        tracing::debug!("{} started, every {:?}", label, interval);
        Self {
            label,
            stop_tx: Some(stop_tx),
            task_handle: Some(handle),
        }
    }

    pub fn is_running(&self) -> bool {
        self.task_handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// Stop the task, aborting a job that does not finish promptly
    pub async fn stop(&mut self) {
        if let Some(tx) = self.stop_tx.take() {
            let _ = tx.send(());
        }
        if let Some(mut handle) = self.task_handle.take() {
            if tokio::time::timeout(STOP_GRACE, &mut handle).await.is_err() {
                tracing::debug!("{} did not stop in time, aborting", self.label);
                handle.abort();
            }
        }
    }
}

impl Drop for PeriodicTask {
    fn drop(&mut self) {
        if let Some(handle) = self.task_handle.take() {
            handle.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use tokio::time::sleep;

    fn counting_task(interval: Duration) -> (PeriodicTask, Arc<AtomicUsize>) {
        let count = Arc::new(AtomicUsize::new(0));
        let job_count = count.clone();
        let task = PeriodicTask::spawn("counter", interval, move || {
            let count = job_count.clone();
            async move {
                count.fetch_add(1, Ordering::SeqCst);
            }
        });
        (task, count)
    }

    #[tokio::test(start_paused = true)]
    async fn test_runs_immediately_then_on_interval() {
        let (mut task, count) = counting_task(Duration::from_secs(60));

        sleep(Duration::from_secs(1)).await;
        assert_eq!(count.load(Ordering::SeqCst), 1);

        sleep(Duration::from_secs(120)).await;
        assert_eq!(count.load(Ordering::SeqCst), 3);

        task.stop().await;
        assert!(!task.is_running());

        sleep(Duration::from_secs(600)).await;
        assert_eq!(count.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_drop_aborts() {
        let (task, count) = counting_task(Duration::from_secs(60));
        sleep(Duration::from_secs(1)).await;
        drop(task);

        sleep(Duration::from_secs(600)).await;
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }
}
