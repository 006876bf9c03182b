//! Mock collaborators for dispatcher and flow tests

use super::{Ledger, Messenger, ReceiptExtractor};
use crate::flows::{MenuPrompt, NewRecord, ReceiptData};
use crate::gateway::GatewayError;
use crate::ledger::LedgerError;
use crate::vision::VisionError;
use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

/// Everything the bot sent outward, in order.
#[derive(Debug, Clone, PartialEq)]
pub enum Sent {
    Text { channel_id: String, text: String },
    Menu { channel_id: String, menu: MenuPrompt },
}

/// Messenger that records outbound traffic and serves canned attachments.
#[derive(Default)]
pub struct RecordingMessenger {
    pub sent: Mutex<Vec<Sent>>,
    attachments: Mutex<HashMap<String, Vec<u8>>>,
}

impl RecordingMessenger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_attachment(&self, url: impl Into<String>, bytes: Vec<u8>) {
        self.attachments.lock().unwrap().insert(url.into(), bytes);
    }

    /// Text bodies sent so far, ignoring menus.
    pub fn texts(&self) -> Vec<String> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .filter_map(|s| match s {
                Sent::Text { text, .. } => Some(text.clone()),
                Sent::Menu { .. } => None,
            })
            .collect()
    }

    pub fn menus(&self) -> Vec<MenuPrompt> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .filter_map(|s| match s {
                Sent::Menu { menu, .. } => Some(*menu),
                Sent::Text { .. } => None,
            })
            .collect()
    }

    pub fn sent_count(&self) -> usize {
        self.sent.lock().unwrap().len()
    }
}

#[async_trait]
impl Messenger for RecordingMessenger {
    async fn send_text(&self, channel_id: &str, text: &str) -> Result<(), GatewayError> {
        self.sent.lock().unwrap().push(Sent::Text {
            channel_id: channel_id.to_string(),
            text: text.to_string(),
        });
        Ok(())
    }

    async fn send_menu(&self, channel_id: &str, menu: MenuPrompt) -> Result<(), GatewayError> {
        self.sent.lock().unwrap().push(Sent::Menu {
            channel_id: channel_id.to_string(),
            menu,
        });
        Ok(())
    }

    async fn fetch_attachment(&self, url: &str) -> Result<Vec<u8>, GatewayError> {
        self.attachments
            .lock()
            .unwrap()
            .get(url)
            .cloned()
            .ok_or(GatewayError::Status { status: 404 })
    }
}

/// Ledger that records writes and serves configurable monthly totals.
#[derive(Default)]
pub struct MockLedger {
    records: Mutex<Vec<NewRecord>>,
    pub fail_create: AtomicBool,
    pub fail_monthly: AtomicBool,
    monthly_totals: Mutex<HashMap<String, i64>>,
}

impl MockLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_monthly_total(&self, category: impl Into<String>, total: i64) {
        self.monthly_totals
            .lock()
            .unwrap()
            .insert(category.into(), total);
    }

    pub fn records(&self) -> Vec<NewRecord> {
        self.records.lock().unwrap().clone()
    }
}

#[async_trait]
impl Ledger for MockLedger {
    async fn create_record(&self, record: &NewRecord) -> Result<(), LedgerError> {
        if self.fail_create.load(Ordering::SeqCst) {
            return Err(LedgerError::api("injected write failure"));
        }
        self.records.lock().unwrap().push(record.clone());
        Ok(())
    }

    async fn monthly_total(&self, category: &str) -> Result<i64, LedgerError> {
        if self.fail_monthly.load(Ordering::SeqCst) {
            return Err(LedgerError::api("injected read failure"));
        }
        Ok(*self
            .monthly_totals
            .lock()
            .unwrap()
            .get(category)
            .unwrap_or(&0))
    }
}

/// Extractor that replays queued results.
#[derive(Default)]
pub struct MockExtractor {
    results: Mutex<VecDeque<Result<ReceiptData, VisionError>>>,
    pub seen_mime_types: Mutex<Vec<String>>,
}

impl MockExtractor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_ok(&self, receipt: ReceiptData) {
        self.results.lock().unwrap().push_back(Ok(receipt));
    }

    pub fn push_err(&self, error: VisionError) {
        self.results.lock().unwrap().push_back(Err(error));
    }
}

#[async_trait]
impl ReceiptExtractor for MockExtractor {
    async fn extract(&self, _image: &[u8], mime_type: &str) -> Result<ReceiptData, VisionError> {
        self.seen_mime_types
            .lock()
            .unwrap()
            .push(mime_type.to_string());
        self.results
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(VisionError::empty("no queued extraction result")))
    }
}
