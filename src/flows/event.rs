//! Events consumed by the flow transition function

use super::state::{ManualCategory, ReceiptData, Wallet};

/// Custom id of the manual flow's category selection menu.
pub const CATEGORY_SELECT_ID: &str = "expense_category_select";
/// Custom id of the manual flow's wallet selection menu.
pub const WALLET_SELECT_ID: &str = "expense_wallet_select";
/// Custom id of the receipt flow's wallet selection menu.
pub const RECEIPT_WALLET_SELECT_ID: &str = "expense_receipt_wallet_select";

/// A menu selection, decoded once at the gateway boundary.
///
/// The control id identifies which flow the selection belongs to, so the same
/// wallet value arrives as a distinct variant per flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MenuSelection {
    Category(ManualCategory),
    ManualWallet(Wallet),
    ReceiptWallet(Wallet),
}

impl MenuSelection {
    /// Decode a raw (custom id, value) pair. `None` means the selection does
    /// not correspond to any known control or carries an unknown value; such
    /// events are dropped at the boundary.
    pub fn from_custom_id(custom_id: &str, value: &str) -> Option<Self> {
        match custom_id {
            CATEGORY_SELECT_ID => ManualCategory::from_value(value).map(MenuSelection::Category),
            WALLET_SELECT_ID => Wallet::from_value(value).map(MenuSelection::ManualWallet),
            RECEIPT_WALLET_SELECT_ID => Wallet::from_value(value).map(MenuSelection::ReceiptWallet),
            _ => None,
        }
    }
}

/// Which stage of receipt ingestion failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtractStage {
    Download,
    Extraction,
}

/// An event advancing a flow by one turn.
#[derive(Debug, Clone, PartialEq)]
pub enum FlowEvent {
    /// Plain text message body, unmodified.
    Text(String),
    /// A decoded menu selection.
    Menu(MenuSelection),
    /// Receipt extraction finished (fed back by the effect executor).
    ReceiptExtracted(ReceiptData),
    /// Receipt download or extraction failed.
    ReceiptFailed(ExtractStage),
}

/// A matched wake phrase starting a fresh flow.
#[derive(Debug, Clone, PartialEq)]
pub enum Trigger {
    Split,
    Manual,
    Receipt { image_url: String, filename: String },
}
