use crate::notices::NoticeBoard;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::debug;

/// A single-shot pending action with an expiry timer.
///
/// Arming replaces whatever was pending before. When the window elapses the
/// value is dropped and the toast advertising it is hidden.
#[derive(Debug)]
pub struct UndoSlot<T> {
    pending: Arc<Mutex<Option<(u64, T)>>>,
    generation: u64,
    timer: Option<JoinHandle<()>>,
}

impl<T: Send + 'static> UndoSlot<T> {
    pub fn new() -> Self {
        Self {
            pending: Arc::new(Mutex::new(None)),
            generation: 0,
            timer: None,
        }
    }

    pub async fn arm(&mut self, value: T, window: Duration, notices: NoticeBoard) {
        self.stop_timer();
        self.generation += 1;
        let generation = self.generation;
        *self.pending.lock().await = Some((generation, value));

        let pending = Arc::clone(&self.pending);
        self.timer = Some(tokio::spawn(async move {
            tokio::time::sleep(window).await;
            let mut slot = pending.lock().await;
            if matches!(*slot, Some((current, _)) if current == generation) {
                *slot = None;
                drop(slot);
                debug!("undo window expired");
                notices.hide_toast().await;
            }
        }));
    }

    /// Returns the pending value at most once.
    pub async fn take(&mut self) -> Option<T> {
        self.stop_timer();
        self.pending.lock().await.take().map(|(_, value)| value)
    }

    pub async fn cancel(&mut self) {
        self.stop_timer();
        self.pending.lock().await.take();
    }

    pub async fn is_armed(&self) -> bool {
        self.pending.lock().await.is_some()
    }

    fn stop_timer(&mut self) {
        if let Some(timer) = self.timer.take() {
            timer.abort();
        }
    }
}

impl<T: Send + 'static> Default for UndoSlot<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Drop for UndoSlot<T> {
    fn drop(&mut self) {
        if let Some(timer) = self.timer.take() {
            timer.abort();
        }
    }
}
