use std::{fmt, sync::Arc, time::Duration};

use tokio::{task::JoinHandle, time};

type FireFn<T> = Arc<dyn Fn(T) + Send + Sync>;

/// Quiescence timer: each `schedule` replaces the pending payload and
/// restarts the window, and `on_fire` only ever sees the latest payload.
///
/// `on_fire` runs synchronously on the timer task. Work it spawns outlives
/// later reschedules; only the wait itself is aborted.
pub struct CoalescingTimer<T> {
    window: Duration,
    on_fire: FireFn<T>,
    pending: Option<JoinHandle<()>>,
}

impl<T: Send + 'static> CoalescingTimer<T> {
    pub fn new(window: Duration, on_fire: impl Fn(T) + Send + Sync + 'static) -> Self {
        Self {
            window,
            on_fire: Arc::new(on_fire),
            pending: None,
        }
    }

    pub fn schedule(&mut self, payload: T) {
        self.cancel();

        let window = self.window;
        let on_fire = Arc::clone(&self.on_fire);
        self.pending = Some(tokio::spawn(async move {
            time::sleep(window).await;
            on_fire(payload);
        }));
    }

    /// Returns whether a wait was still pending.
    pub fn cancel(&mut self) -> bool {
        match self.pending.take() {
            Some(handle) => {
                let was_pending = !handle.is_finished();
                handle.abort();
                was_pending
            }
            None => false,
        }
    }

    pub fn is_pending(&self) -> bool {
        self.pending
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// Takes effect from the next `schedule`.
    pub fn set_window(&mut self, window: Duration) {
        self.window = window;
    }
}

impl<T> fmt::Debug for CoalescingTimer<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CoalescingTimer")
            .field("window", &self.window)
            .field("pending", &self.pending.is_some())
            .finish()
    }
}

impl<T> Drop for CoalescingTimer<T> {
    fn drop(&mut self) {
        if let Some(handle) = self.pending.take() {
            handle.abort();
        }
    }
}
