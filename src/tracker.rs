use crate::client::ApiClient;
use crate::errors::{ApiError, TrackerError};
use crate::models::{AuthResponse, Expense, ExpenseDraft, LoginRequest, RegisterRequest};
use crate::notices::NoticeBoard;
use crate::transport::{HttpTransport, Method, Transport};
use crate::undo::UndoSlot;
use serde::Serialize;
use std::time::Duration;
use tracing::{error, info};

pub const DEFAULT_UNDO_WINDOW: Duration = Duration::from_secs(5);

const EXPENSES: &str = "/api/expenses";
const LOGIN: &str = "/api/auth/login";
const REGISTER: &str = "/api/auth/register";

/// The signed-in user's expense list, kept in sync with the API.
#[derive(Debug)]
pub struct ExpenseTracker<T = HttpTransport> {
    client: ApiClient<T>,
    expenses: Vec<Expense>,
    undo: UndoSlot<Expense>,
    undo_window: Duration,
}

impl<T: Transport> ExpenseTracker<T> {
    pub fn new(client: ApiClient<T>, undo_window: Duration) -> Self {
        Self {
            client,
            expenses: Vec::new(),
            undo: UndoSlot::new(),
            undo_window,
        }
    }

    pub fn client(&self) -> &ApiClient<T> {
        &self.client
    }

    pub fn notices(&self) -> &NoticeBoard {
        self.client.notices()
    }

    pub fn is_signed_in(&self) -> bool {
        self.client.session().is_authenticated()
    }

    pub fn expenses(&self) -> &[Expense] {
        &self.expenses
    }

    pub fn expense(&self, id: i64) -> Option<&Expense> {
        self.expenses.iter().find(|expense| expense.id == id)
    }

    pub async fn register(&mut self, request: &RegisterRequest) -> Result<(), TrackerError> {
        self.authenticate(REGISTER, request).await
    }

    pub async fn login(&mut self, request: &LoginRequest) -> Result<(), TrackerError> {
        self.authenticate(LOGIN, request).await
    }

    async fn authenticate<B: Serialize>(
        &mut self,
        endpoint: &str,
        body: &B,
    ) -> Result<(), TrackerError> {
        let response = self
            .client
            .request_with(endpoint, Method::Post, body)
            .await
            .and_then(|payload| payload.decode::<AuthResponse>()?.ok_or(ApiError::EmptyPayload));
        let auth = match response {
            Ok(auth) => auth,
            Err(err) => {
                error!("{endpoint} failed: {err}");
                self.after_failure(&err).await;
                return Err(err.into());
            }
        };

        self.client.sign_in(auth.token).await?;
        info!("signed in");
        self.refresh().await;
        Ok(())
    }

    /// Forgets the session and everything loaded for it.
    pub async fn logout(&mut self) {
        self.client.clear_session().await;
        self.expenses.clear();
        self.undo.cancel().await;
        self.notices().hide_toast().await;
    }

    /// Replaces the local list with the server's. On failure the previous
    /// list is kept, unless the session was rejected.
    pub async fn fetch_expenses(&mut self) -> Result<(), ApiError> {
        let result = self
            .client
            .request(EXPENSES, Method::Get, None)
            .await
            .and_then(|payload| payload.decode::<Vec<Expense>>());

        match result {
            Ok(expenses) => {
                self.expenses = expenses.unwrap_or_default();
                Ok(())
            }
            Err(err) => {
                error!("failed to fetch expenses: {err}");
                self.after_failure(&err).await;
                Err(err)
            }
        }
    }

    /// Updates expense `id` when given, otherwise creates a new one.
    pub async fn save_expense(
        &mut self,
        id: Option<i64>,
        draft: &ExpenseDraft,
    ) -> Result<(), ApiError> {
        let result = match id {
            Some(id) => {
                self.client
                    .request_with(&format!("{EXPENSES}/{id}"), Method::Put, draft)
                    .await
            }
            None => self.client.request_with(EXPENSES, Method::Post, draft).await,
        };

        if let Err(err) = result {
            error!("failed to save expense: {err}");
            self.after_failure(&err).await;
            return Err(err);
        }

        self.refresh().await;
        self.notices().toast("Expense saved.", false).await;
        Ok(())
    }

    /// Removes the expense locally, then remotely. A failed remote delete
    /// puts the record back where it was. Returns `false` for unknown ids.
    pub async fn delete_expense(&mut self, id: i64) -> Result<bool, ApiError> {
        self.undo.cancel().await;

        let Some(index) = self.expenses.iter().position(|expense| expense.id == id) else {
            return Ok(false);
        };
        let deleted = self.expenses.remove(index);

        let endpoint = format!("{EXPENSES}/{id}");
        if let Err(err) = self.client.request(&endpoint, Method::Delete, None).await {
            error!("failed to delete expense {id}: {err}");
            self.notices()
                .error("Failed to delete expense. Please try again.")
                .await;
            if err.is_auth_failure() {
                self.after_failure(&err).await;
            } else {
                let index = index.min(self.expenses.len());
                self.expenses.insert(index, deleted);
            }
            return Err(err);
        }

        let notices = self.notices().clone();
        notices.toast("Expense deleted.", true).await;
        self.undo.arm(deleted, self.undo_window, notices).await;

        self.refresh().await;
        Ok(true)
    }

    /// Recreates the most recently deleted expense if its undo window is
    /// still open. Returns `false` when there is nothing to undo.
    pub async fn undo_delete(&mut self) -> Result<bool, ApiError> {
        let Some(expense) = self.undo.take().await else {
            return Ok(false);
        };

        let result = self
            .client
            .request_with(EXPENSES, Method::Post, &expense.to_draft())
            .await;

        let outcome = match result {
            Ok(_) => {
                info!("restored expense {}", expense.id);
                self.refresh().await;
                Ok(true)
            }
            Err(err) => {
                error!("failed to restore expense: {err}");
                self.notices().error("Failed to restore expense.").await;
                self.after_failure(&err).await;
                Err(err)
            }
        };

        self.notices().hide_toast().await;
        outcome
    }

    pub async fn can_undo(&self) -> bool {
        self.undo.is_armed().await
    }

    async fn refresh(&mut self) {
        // failures are already logged and surfaced
        let _ = self.fetch_expenses().await;
    }

    /// Local state cleanup after a failed call. The client already surfaced
    /// the failures it produced; payload errors are surfaced here.
    async fn after_failure(&mut self, err: &ApiError) {
        if matches!(
            err,
            ApiError::Encode(_) | ApiError::Decode(_) | ApiError::EmptyPayload
        ) {
            self.notices().error(err.to_string()).await;
        }
        if err.is_auth_failure() {
            self.expenses.clear();
            self.undo.cancel().await;
        }
    }
}
