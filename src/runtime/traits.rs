//! Trait abstractions for the dispatcher's I/O
//!
//! These traits let the dispatcher and flows be exercised with mock
//! implementations instead of live HTTP collaborators.

use crate::flows::{MenuPrompt, NewRecord, ReceiptData};
use crate::gateway::GatewayError;
use crate::ledger::LedgerError;
use crate::vision::VisionError;
use async_trait::async_trait;

/// Outbound messaging surface plus attachment retrieval.
#[async_trait]
pub trait Messenger: Send + Sync {
    /// Send a plain text message to a channel.
    async fn send_text(&self, channel_id: &str, text: &str) -> Result<(), GatewayError>;

    /// Send a closed-choice menu to a channel.
    async fn send_menu(&self, channel_id: &str, menu: MenuPrompt) -> Result<(), GatewayError>;

    /// Fetch the bytes of a message attachment.
    async fn fetch_attachment(&self, url: &str) -> Result<Vec<u8>, GatewayError>;
}

/// Client for the external ledger store.
///
/// `create_record` is not idempotent and is never retried automatically.
#[async_trait]
pub trait Ledger: Send + Sync {
    async fn create_record(&self, record: &NewRecord) -> Result<(), LedgerError>;

    /// Sum of the ledger's total-amount field over the current calendar
    /// month's records matching `category`.
    async fn monthly_total(&self, category: &str) -> Result<i64, LedgerError>;
}

/// Receipt image to structured data.
#[async_trait]
pub trait ReceiptExtractor: Send + Sync {
    async fn extract(&self, image: &[u8], mime_type: &str) -> Result<ReceiptData, VisionError>;
}
