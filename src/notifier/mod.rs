//! Outbound email delivery.
//!
//! One `Notifier::send` call produces at most one email. Failures are
//! returned to the caller, which tallies them; they never abort a batch.

mod notice;
mod sendgrid;

use async_trait::async_trait;
use thiserror::Error;

pub use notice::{ExpiryNotice, NoticeItem, PREFERENCES_URL_TAG};
pub use sendgrid::SendGridNotifier;

#[derive(Debug, Error)]
pub enum SendError {
    /// Could not reach the provider
    #[error("email transport failed: {0}")]
    Transport(String),

    /// Provider answered with a non-2xx status
    #[error("email provider returned status {status}: {body}")]
    Rejected { status: u16, body: String },
}

#[async_trait]
pub trait Notifier: Send + Sync {
    /// Send `notice` to `email`.
    async fn send(&self, email: &str, notice: &ExpiryNotice) -> Result<(), SendError>;
}
