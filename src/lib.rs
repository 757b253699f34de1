pub mod candidates;
pub mod client;
pub mod config;
pub mod errors;
pub mod models;
pub mod notices;
pub mod session;
pub mod stats;
pub mod tracker;
pub mod transport;
pub mod ui;
pub mod undo;

pub use candidates::CandidateList;
pub use client::{ApiClient, Attempt, Payload};
pub use config::ClientConfig;
pub use errors::{ApiError, TrackerError};
pub use tracker::ExpenseTracker;
pub use transport::{HttpTransport, Method, Transport};
