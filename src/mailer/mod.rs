//! Mail dispatch: the recipient list type, the dispatcher trait and SMTP delivery.

pub mod recipients;
pub mod smtp;

pub use recipients::Recipients;
pub use smtp::{SmtpConfig, SmtpDispatcher};

use async_trait::async_trait;

use crate::draft::Draft;
use crate::error::DeliveryError;
use crate::session::SenderCredentials;

/// Delivers a finished draft.
///
/// Implementations make exactly one attempt and report every failure as a
/// [`DeliveryError`]; they never panic on bad input.
#[async_trait]
pub trait MailDispatcher: Send + Sync {
    async fn send(
        &self,
        recipients: &Recipients,
        draft: &Draft,
        credentials: &SenderCredentials,
    ) -> Result<(), DeliveryError>;
}
