use crate::candidates::CandidateList;
use crate::client::ApiClient;
use crate::notices::NoticeBoard;
use crate::session::{Session, SessionStore};
use crate::tracker::ExpenseTracker;
use crate::transport::HttpTransport;
use clap::Args;
use std::path::PathBuf;
use std::time::Duration;
use tracing::info;

#[derive(Debug, Clone, Args)]
pub struct ClientConfig {
    /// Origin the API is normally served from; sibling ports 8081/8080 on
    /// its host and local fallbacks are tried after it.
    #[arg(long, global = true, env = "EXPENSE_TRACKER_ORIGIN")]
    pub origin: Option<String>,

    /// File holding the session token.
    #[arg(
        long = "store",
        global = true,
        env = "EXPENSE_TRACKER_STORE",
        default_value = "data/session.json"
    )]
    pub store_path: PathBuf,

    /// Seconds a deleted expense can still be restored.
    #[arg(long, global = true, env = "EXPENSE_TRACKER_UNDO_SECS", default_value_t = 5)]
    pub undo_secs: u64,
}

impl ClientConfig {
    pub fn undo_window(&self) -> Duration {
        Duration::from_secs(self.undo_secs)
    }

    /// Reads the stored session and wires up a tracker over HTTP.
    pub async fn build_tracker(&self) -> ExpenseTracker<HttpTransport> {
        let candidates = CandidateList::discover(self.origin.as_deref());
        info!(bases = ?candidates.as_slice(), "API candidates");

        let session = Session::new(SessionStore::open(&self.store_path).await);
        let client = ApiClient::new(
            HttpTransport::default(),
            candidates,
            session,
            NoticeBoard::new(),
        );
        ExpenseTracker::new(client, self.undo_window())
    }
}
