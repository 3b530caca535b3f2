use std::any::Any;
use std::fmt;
use std::future::Future;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures::FutureExt;
use tokio::sync::watch;
use tokio::task::{AbortHandle, JoinHandle};
use tokio::time::Instant;

use crate::error::RemoteError;
use crate::notification::NotificationChannel;

/// The three independent remote operations the console can drive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperationKind {
    Preprocess,
    Train,
    Test,
}

impl OperationKind {
    pub const ALL: [OperationKind; 3] = [Self::Preprocess, Self::Train, Self::Test];

    pub fn name(&self) -> &'static str {
        match self {
            Self::Preprocess => "preprocess",
            Self::Train => "train",
            Self::Test => "test",
        }
    }

    pub fn success_message(&self) -> &'static str {
        match self {
            Self::Preprocess => "预处理完成",
            Self::Train => "训练完成",
            Self::Test => "测试完成",
        }
    }

    pub fn failure_message(&self) -> &'static str {
        match self {
            Self::Preprocess => "预处理失败",
            Self::Train => "训练失败",
            Self::Test => "测试失败",
        }
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationStatus {
    Idle,
    Running,
    Succeeded,
    Failed,
}

impl OperationStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperationState {
    pub status: OperationStatus,
    pub started_at: Option<Instant>,
    pub finished_at: Option<Instant>,
    /// Number of attempts started so far; identifies the current one
    pub attempts: u64,
}

impl Default for OperationState {
    fn default() -> Self {
        Self {
            status: OperationStatus::Idle,
            started_at: None,
            finished_at: None,
            attempts: 0,
        }
    }
}

/// Drives one kind of remote operation and guards it against overlap.
///
/// A `start` while the runner is `Running` is ignored, not queued. Each
/// attempt runs on its own tokio task and settles in a fixed order:
///
/// 1. on success, the caller's `on_success` handler publishes derived state
/// 2. the status becomes `Succeeded` or `Failed`
/// 3. the outcome is reported on the [`NotificationChannel`]
/// 4. the [`OperationHandle`] resolves
///
/// Steps 1 and 2 happen under the runner's state lock, so `on_success` must
/// not read this runner's state.
#[derive(Clone)]
pub struct OperationRunner {
    inner: Arc<RunnerInner>,
}

struct RunnerInner {
    kind: OperationKind,
    state: watch::Sender<OperationState>,
    notifier: NotificationChannel,
    timeout: Option<Duration>,
    task: Mutex<Option<AbortHandle>>,
}

impl fmt::Debug for OperationRunner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OperationRunner")
            .field("kind", &self.inner.kind)
            .field("state", &*self.inner.state.borrow())
            .field("timeout", &self.inner.timeout)
            .finish()
    }
}

impl OperationRunner {
    /// `timeout` bounds each attempt; `None` waits for the service indefinitely.
    pub fn new(kind: OperationKind, notifier: NotificationChannel, timeout: Option<Duration>) -> Self {
        let (state, _) = watch::channel(OperationState::default());
        Self {
            inner: Arc::new(RunnerInner {
                kind,
                state,
                notifier,
                timeout,
                task: Mutex::new(None),
            }),
        }
    }

    pub fn kind(&self) -> OperationKind {
        self.inner.kind
    }

    pub fn state(&self) -> OperationState {
        self.inner.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<OperationState> {
        self.inner.state.subscribe()
    }

    pub fn is_running(&self) -> bool {
        self.inner.state.borrow().status == OperationStatus::Running
    }

    /// Starts an attempt unless one is already in flight.
    ///
    /// `invoke` produces the remote call; `on_success` receives its payload.
    /// Returns `None` when the request was ignored.
    pub fn start<F, Fut, T, S>(&self, invoke: F, on_success: S) -> Option<OperationHandle>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<T, RemoteError>> + Send + 'static,
        T: Send + 'static,
        S: FnOnce(T) + Send + 'static,
    {
        let kind = self.inner.kind;
        let runtime = match tokio::runtime::Handle::try_current() {
            Ok(runtime) => runtime,
            Err(_) => {
                log::error!("Cannot start {}: no tokio runtime", kind);
                return None;
            }
        };

        let now = Instant::now();
        let mut attempt = 0;
        let started = self.inner.state.send_if_modified(|state| {
            if state.status == OperationStatus::Running {
                return false;
            }
            state.attempts += 1;
            attempt = state.attempts;
            state.status = OperationStatus::Running;
            state.started_at = Some(now);
            state.finished_at = None;
            true
        });

        if !started {
            log::debug!("{} already running; start request ignored", kind);
            return None;
        }
        log::info!("Starting {} (attempt {})", kind, attempt);

        let inner = Arc::clone(&self.inner);
        let join = runtime.spawn(async move {
            // A panicking service still has to settle the attempt.
            let guarded = AssertUnwindSafe(async move { invoke().await }).catch_unwind();
            let outcome = match inner.timeout {
                Some(limit) => tokio::time::timeout(limit, guarded)
                    .await
                    .unwrap_or(Ok(Err(RemoteError::TimedOut(limit)))),
                None => guarded.await,
            }
            .unwrap_or_else(|panic| Err(RemoteError::Panicked(panic_message(panic.as_ref()))));
            inner.settle(attempt, outcome, on_success)
        });
        *self.task_slot() = Some(join.abort_handle());

        Some(OperationHandle {
            attempt,
            join,
            runner: self.clone(),
        })
    }

    /// Aborts the in-flight attempt, if any. The attempt ends `Failed`
    /// without a notification.
    pub fn cancel(&self) -> bool {
        let attempt = self.inner.state.borrow().attempts;
        self.cancel_attempt(attempt)
    }

    fn cancel_attempt(&self, attempt: u64) -> bool {
        let cancelled = self.inner.state.send_if_modified(|state| {
            if state.attempts != attempt || state.status != OperationStatus::Running {
                return false;
            }
            state.status = OperationStatus::Failed;
            state.finished_at = Some(Instant::now());
            true
        });
        if cancelled {
            if let Some(task) = self.task_slot().take() {
                task.abort();
            }
            log::warn!("{} attempt {}: {}", self.inner.kind, attempt, RemoteError::Cancelled);
        }
        cancelled
    }

    fn task_slot(&self) -> std::sync::MutexGuard<'_, Option<AbortHandle>> {
        self.inner
            .task
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl RunnerInner {
    fn settle<T, S>(&self, attempt: u64, outcome: Result<T, RemoteError>, on_success: S) -> OperationStatus
    where
        S: FnOnce(T),
    {
        let kind = self.kind;
        let mut status = match &outcome {
            Ok(_) => OperationStatus::Succeeded,
            Err(err) if err.is_application_failure() => {
                log::warn!("{} rejected by the service: {}", kind, err);
                OperationStatus::Failed
            }
            Err(err) => {
                log::error!("{} failed: {}", kind, err);
                OperationStatus::Failed
            }
        };

        let applied = self.state.send_if_modified(|state| {
            if state.attempts != attempt || state.status != OperationStatus::Running {
                return false;
            }
            if let Ok(payload) = outcome {
                if let Err(panic) = catch_unwind(AssertUnwindSafe(|| on_success(payload))) {
                    log::error!("{} result could not be applied: {}", kind, panic_message(panic.as_ref()));
                    status = OperationStatus::Failed;
                }
            }
            state.status = status;
            state.finished_at = Some(Instant::now());
            true
        });

        if !applied {
            log::debug!("{} attempt {} settled after being superseded", kind, attempt);
            return self.state.borrow().status;
        }

        log::info!("{} attempt {} finished: {:?}", kind, attempt, status);
        let message = if status == OperationStatus::Succeeded {
            kind.success_message()
        } else {
            kind.failure_message()
        };
        self.notifier.show(message);
        status
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// One started attempt. Awaiting [`wait`](Self::wait) is the completion
/// callback: it resolves after the status change and the notification.
#[derive(Debug)]
pub struct OperationHandle {
    attempt: u64,
    join: JoinHandle<OperationStatus>,
    runner: OperationRunner,
}

impl OperationHandle {
    pub fn kind(&self) -> OperationKind {
        self.runner.kind()
    }

    pub fn attempt(&self) -> u64 {
        self.attempt
    }

    /// Cancellation hook for this attempt only.
    pub fn cancel(&self) -> bool {
        self.runner.cancel_attempt(self.attempt)
    }

    pub async fn wait(self) -> OperationStatus {
        match self.join.await {
            Ok(status) => status,
            Err(err) if err.is_cancelled() => OperationStatus::Failed,
            Err(err) => {
                log::error!("{} attempt {} panicked: {}", self.runner.kind(), self.attempt, err);
                self.runner.cancel_attempt(self.attempt);
                OperationStatus::Failed
            }
        }
    }
}
