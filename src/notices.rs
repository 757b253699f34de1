use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::info;

pub const ERROR_DISMISS_AFTER: Duration = Duration::from_secs(3);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Toast {
    pub message: String,
    pub undo: bool,
}

#[derive(Debug, Default)]
struct Board {
    next_id: u64,
    error: Option<(u64, String)>,
    toast: Option<Toast>,
}

/// User-visible notices: one transient error line and one toast.
///
/// Clones share the same board.
#[derive(Debug, Clone, Default)]
pub struct NoticeBoard {
    inner: Arc<Mutex<Board>>,
}

impl NoticeBoard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Shows `message` as the current error; it is dismissed after
    /// [`ERROR_DISMISS_AFTER`] unless a newer error replaced it first.
    pub async fn error(&self, message: impl Into<String>) {
        let message = message.into();
        info!(notice = %message, "error notice");

        let id = {
            let mut board = self.inner.lock().await;
            board.next_id += 1;
            let id = board.next_id;
            board.error = Some((id, message));
            id
        };

        let inner = Arc::clone(&self.inner);
        tokio::spawn(async move {
            tokio::time::sleep(ERROR_DISMISS_AFTER).await;
            let mut board = inner.lock().await;
            if matches!(board.error, Some((current, _)) if current == id) {
                board.error = None;
            }
        });
    }

    pub async fn toast(&self, message: impl Into<String>, undo: bool) {
        let message = message.into();
        info!(notice = %message, undo, "toast");
        self.inner.lock().await.toast = Some(Toast { message, undo });
    }

    pub async fn hide_toast(&self) {
        self.inner.lock().await.toast = None;
    }

    pub async fn error_message(&self) -> Option<String> {
        self.inner
            .lock()
            .await
            .error
            .as_ref()
            .map(|(_, message)| message.clone())
    }

    pub async fn current_toast(&self) -> Option<Toast> {
        self.inner.lock().await.toast.clone()
    }
}
