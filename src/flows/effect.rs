//! Side effects produced by flow transitions
//!
//! Transitions never perform I/O; they return a list of effects which the
//! dispatcher executes in order after the state change is applied.

use super::aggregate::CategoryLine;
use super::event::{CATEGORY_SELECT_ID, RECEIPT_WALLET_SELECT_ID, WALLET_SELECT_ID};
use super::state::{ManualCategory, NewRecord, Wallet};
use chrono::NaiveDate;

/// One option in a closed-choice menu.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MenuOption {
    pub label: String,
    pub value: String,
}

/// The three closed-choice menus the bot can present.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MenuPrompt {
    Category,
    ManualWallet,
    ReceiptWallet,
}

impl MenuPrompt {
    pub fn custom_id(self) -> &'static str {
        match self {
            MenuPrompt::Category => CATEGORY_SELECT_ID,
            MenuPrompt::ManualWallet => WALLET_SELECT_ID,
            MenuPrompt::ReceiptWallet => RECEIPT_WALLET_SELECT_ID,
        }
    }

    /// Message body shown above the menu.
    pub fn content(self) -> &'static str {
        match self {
            MenuPrompt::Category => "どんな出費？",
            MenuPrompt::ManualWallet | MenuPrompt::ReceiptWallet => "どの財布から払ったの？",
        }
    }

    pub fn placeholder(self) -> &'static str {
        match self {
            MenuPrompt::Category => "支出カテゴリを選んでよね",
            MenuPrompt::ManualWallet | MenuPrompt::ReceiptWallet => "支払い財布を選んでよね",
        }
    }

    pub fn options(self) -> Vec<MenuOption> {
        match self {
            MenuPrompt::Category => ManualCategory::ALL
                .iter()
                .map(|c| MenuOption {
                    label: c.label().to_string(),
                    value: c.label().to_string(),
                })
                .collect(),
            MenuPrompt::ManualWallet | MenuPrompt::ReceiptWallet => Wallet::ALL
                .iter()
                .map(|w| MenuOption {
                    label: w.label().to_string(),
                    value: w.label().to_string(),
                })
                .collect(),
        }
    }
}

/// A side effect requested by a transition.
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    /// Send a plain text message to the conversation's channel.
    SendText(String),
    /// Send a closed-choice menu.
    SendMenu(MenuPrompt),
    /// Download the attachment and run receipt extraction; the executor feeds
    /// the outcome back as `ReceiptExtracted` / `ReceiptFailed`.
    FetchReceipt { url: String, filename: String },
    /// Post one manual expense record and report the monthly total.
    PostExpense { record: NewRecord },
    /// Post one record per aggregated receipt category, in the given order.
    PostReceipt {
        merchant: String,
        lines: Vec<CategoryLine>,
        wallet: Wallet,
        date: NaiveDate,
    },
}

impl Effect {
    pub fn send_text(text: impl Into<String>) -> Self {
        Effect::SendText(text.into())
    }
}
