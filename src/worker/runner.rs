//! Tick loop shared by every worker

use async_trait::async_trait;
use std::any::Any;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use super::error::{Result, WorkerError};
use super::{Notifier, WorkerKind};

/// Per-iteration logic of a worker
///
/// An `Err` ends the worker and is reported as fatal.
#[async_trait]
pub trait Tick: Send + 'static {
    async fn on_tick(&mut self) -> Result<()>;
}

/// Running worker: cancel + join
pub struct WorkerHandle {
    kind: WorkerKind,
    cancel: CancellationToken,
    join: Option<JoinHandle<Result<()>>>,
}

impl WorkerHandle {
    pub fn kind(&self) -> WorkerKind {
        self.kind
    }

    /// True once the task has exited, on its own or after `stop`
    pub fn is_finished(&self) -> bool {
        self.join.as_ref().is_none_or(JoinHandle::is_finished)
    }

    /// Request cancellation and wait for the loop to exit
    ///
    /// The tick in progress runs to completion first. Calling this again after
    /// it returned is a no-op.
    pub async fn stop(&mut self) -> Result<()> {
        self.cancel.cancel();

        let Some(join) = self.join.take() else {
            return Ok(());
        };

        let result = join
            .await
            .unwrap_or_else(|e| Err(WorkerError::Panicked(e.to_string())));
        info!(worker = %self.kind, "Worker stopped");
        result
    }
}

impl Drop for WorkerHandle {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// Spawn `task` on its own tokio task, ticking every `interval` until stopped
///
/// A fatal error or panic is logged and published through `notifier` before
/// the handle's join resolves.
pub fn spawn<T: Tick>(task: T, interval: Duration, notifier: Notifier) -> WorkerHandle {
    let kind = notifier.kind();
    let cancel = CancellationToken::new();
    let loop_cancel = cancel.clone();

    let join = tokio::spawn(async move {
        let inner = tokio::spawn(run_loop(task, interval, loop_cancel));
        let result = match inner.await {
            Ok(result) => result,
            Err(e) if e.is_panic() => Err(WorkerError::Panicked(panic_message(e.into_panic()))),
            Err(e) => Err(WorkerError::Panicked(e.to_string())),
        };

        if let Err(err) = &result {
            error!(worker = %kind, error = %err, "Worker stopped with a fatal error");
            notifier.fatal(err);
        }
        result
    });

    info!(worker = %kind, interval_ms = interval.as_millis() as u64, "Worker started");

    WorkerHandle {
        kind,
        cancel,
        join: Some(join),
    }
}

async fn run_loop<T: Tick>(mut task: T, interval: Duration, cancel: CancellationToken) -> Result<()> {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                debug!("cancel received; exiting tick loop");
                break;
            }
            _ = ticker.tick() => task.on_tick().await?,
        }
    }

    Ok(())
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::worker::WorkerEvent;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use tokio::sync::broadcast;

    struct Counter {
        ticks: Arc<AtomicUsize>,
        fail_at: Option<usize>,
        panic_at: Option<usize>,
    }

    #[async_trait]
    impl Tick for Counter {
        async fn on_tick(&mut self) -> Result<()> {
            let n = self.ticks.fetch_add(1, Ordering::SeqCst) + 1;
            if self.fail_at == Some(n) {
                return Err(WorkerError::Panicked("scripted failure".to_string()));
            }
            if self.panic_at == Some(n) {
                panic!("scripted panic");
            }
            Ok(())
        }
    }

    fn counter(fail_at: Option<usize>, panic_at: Option<usize>) -> (Counter, Arc<AtomicUsize>) {
        let ticks = Arc::new(AtomicUsize::new(0));
        (
            Counter {
                ticks: ticks.clone(),
                fail_at,
                panic_at,
            },
            ticks,
        )
    }

    #[tokio::test(start_paused = true)]
    async fn test_ticks_until_stopped() {
        let (task, ticks) = counter(None, None);
        let (tx, _rx) = broadcast::channel(8);
        let mut handle = spawn(task, Duration::from_millis(100), Notifier::new(WorkerKind::Search, tx));

        tokio::time::sleep(Duration::from_millis(450)).await;
        handle.stop().await.unwrap();
        let seen = ticks.load(Ordering::SeqCst);
        assert!(seen >= 4, "expected at least 4 ticks, got {seen}");

        tokio::time::sleep(Duration::from_millis(500)).await;
        assert_eq!(ticks.load(Ordering::SeqCst), seen);
        assert!(handle.is_finished());

        // second stop is a no-op
        handle.stop().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_fatal_error_is_published() {
        let (task, _ticks) = counter(Some(2), None);
        let (tx, mut rx) = broadcast::channel(8);
        let mut handle = spawn(task, Duration::from_millis(100), Notifier::new(WorkerKind::Updater, tx));

        let event = rx.recv().await.unwrap();
        assert_eq!(
            event,
            WorkerEvent::Fatal {
                worker: WorkerKind::Updater,
                error: "worker panicked: scripted failure".to_string(),
            }
        );
        assert!(handle.stop().await.is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_panic_is_reported_as_fatal() {
        let (task, _ticks) = counter(None, Some(1));
        let (tx, mut rx) = broadcast::channel(8);
        let mut handle = spawn(task, Duration::from_millis(100), Notifier::new(WorkerKind::Cleanup, tx));

        match rx.recv().await.unwrap() {
            WorkerEvent::Fatal { worker, error } => {
                assert_eq!(worker, WorkerKind::Cleanup);
                assert!(error.contains("scripted panic"));
            }
            other => panic!("Expected fatal event, got {other:?}"),
        }
        assert!(matches!(handle.stop().await, Err(WorkerError::Panicked(_))));
    }
}
