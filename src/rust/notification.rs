use std::sync::{Arc, Mutex};

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{sleep_until, Instant};

use crate::config::NotificationTimings;

/// Position of the active message within its fixed-length lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationPhase {
    Hidden,
    Appearing,
    Visible,
    Disappearing,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationState {
    pub active_message: Option<String>,
    pub phase: NotificationPhase,
    pub shown_at: Option<Instant>,
    /// Number of messages accepted so far. Identifies the active lifecycle.
    pub sequence: u64,
}

impl NotificationState {
    fn hidden() -> Self {
        Self {
            active_message: None,
            phase: NotificationPhase::Hidden,
            shown_at: None,
            sequence: 0,
        }
    }

    fn clear(&mut self) {
        self.active_message = None;
        self.phase = NotificationPhase::Hidden;
        self.shown_at = None;
    }
}

/// A single-slot, self-expiring message channel.
///
/// At most one message occupies the channel at a time. While a message is
/// anywhere in its lifecycle, further [`show`](Self::show) calls are dropped,
/// never queued. The lifecycle runs on a spawned tokio task:
///
/// - `Hidden -> Appearing` immediately
/// - `Appearing -> Visible` after `appear_after`
/// - `Visible -> Disappearing` after `disappear_after`
/// - back to `Hidden` (message cleared) after `teardown_after`
///
/// The channel is cheap to clone; clones share the same slot.
///
/// ```rust
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// use textclf_console::{NotificationChannel, NotificationPhase};
///
/// let channel = NotificationChannel::default();
/// assert!(channel.show("训练完成"));
/// assert!(!channel.show("测试完成")); // dropped while the first is active
/// assert_eq!(channel.state().phase, NotificationPhase::Appearing);
/// # }
/// ```
#[derive(Clone)]
pub struct NotificationChannel {
    inner: Arc<Inner>,
}

struct Inner {
    state: watch::Sender<NotificationState>,
    timings: NotificationTimings,
    lifecycle: Mutex<Option<JoinHandle<()>>>,
}

impl Default for NotificationChannel {
    fn default() -> Self {
        Self::new(NotificationTimings::default())
    }
}

impl std::fmt::Debug for NotificationChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NotificationChannel")
            .field("state", &*self.inner.state.borrow())
            .field("timings", &self.inner.timings)
            .finish()
    }
}

impl NotificationChannel {
    pub fn new(timings: NotificationTimings) -> Self {
        let (state, _) = watch::channel(NotificationState::hidden());
        Self {
            inner: Arc::new(Inner {
                state,
                timings,
                lifecycle: Mutex::new(None),
            }),
        }
    }

    /// Displays `message` if the channel is free.
    ///
    /// Returns `false` when the message was dropped because another one is
    /// still active. Must be called from within a tokio runtime.
    pub fn show(&self, message: impl Into<String>) -> bool {
        let message = message.into();
        let runtime = match tokio::runtime::Handle::try_current() {
            Ok(runtime) => runtime,
            Err(_) => {
                log::error!("Notification '{}' dropped: no tokio runtime to schedule it", message);
                return false;
            }
        };

        let shown_at = Instant::now();
        let mut sequence = 0;
        let accepted = self.inner.state.send_if_modified(|state| {
            if state.phase != NotificationPhase::Hidden {
                return false;
            }
            state.active_message = Some(message.clone());
            state.phase = NotificationPhase::Appearing;
            state.shown_at = Some(shown_at);
            state.sequence += 1;
            sequence = state.sequence;
            true
        });

        if !accepted {
            log::debug!("Notification dropped while channel busy: {}", message);
            return false;
        }

        log::info!("Notification: {}", message);
        let handle = runtime.spawn(run_lifecycle(Arc::clone(&self.inner), shown_at, sequence));
        *self.lifecycle_slot() = Some(handle);
        true
    }

    pub fn state(&self) -> NotificationState {
        self.inner.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<NotificationState> {
        self.inner.state.subscribe()
    }

    pub fn is_available(&self) -> bool {
        self.inner.state.borrow().phase == NotificationPhase::Hidden
    }

    pub fn timings(&self) -> NotificationTimings {
        self.inner.timings
    }

    /// Resolves once the channel is free again.
    pub async fn wait_until_hidden(&self) {
        let mut receiver = self.subscribe();
        // The sender lives in `self.inner`, so this cannot observe a closed channel.
        let _ = receiver
            .wait_for(|state| state.phase == NotificationPhase::Hidden)
            .await;
    }

    /// Aborts any pending lifecycle and frees the channel immediately.
    pub fn shutdown(&self) {
        if let Some(handle) = self.lifecycle_slot().take() {
            handle.abort();
        }
        self.inner.state.send_modify(NotificationState::clear);
    }

    fn lifecycle_slot(&self) -> std::sync::MutexGuard<'_, Option<JoinHandle<()>>> {
        self.inner
            .lifecycle
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Drives one message through its phases. Every step only applies while
/// `sequence` is still the active message; a lifecycle that outlived its
/// message stops at the first step it no longer owns.
async fn run_lifecycle(inner: Arc<Inner>, shown_at: Instant, sequence: u64) {
    let timings = inner.timings;
    let steps = [
        (timings.appear_after, NotificationPhase::Visible),
        (timings.disappear_after, NotificationPhase::Disappearing),
        (timings.teardown_after, NotificationPhase::Hidden),
    ];

    for (offset, phase) in steps {
        sleep_until(shown_at + offset).await;
        if !advance(&inner, sequence, phase) {
            log::debug!("Notification lifecycle {} superseded", sequence);
            return;
        }
    }
}

fn advance(inner: &Inner, sequence: u64, phase: NotificationPhase) -> bool {
    inner.state.send_if_modified(|state| {
        if state.sequence != sequence || state.phase == NotificationPhase::Hidden {
            return false;
        }
        if phase == NotificationPhase::Hidden {
            state.clear();
        } else {
            state.phase = phase;
        }
        true
    })
}
