//! Flow state types
//!
//! Each dialog flow is a sum type carrying the fields accumulated so far, so a
//! state can never hold a field its step has not yet collected.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Identity of one conversation: a (channel, user) pair.
///
/// Two users in the same channel, or one user in two channels, hold fully
/// independent dialog state.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ConversationKey {
    pub channel_id: String,
    pub user_id: String,
}

impl ConversationKey {
    pub fn new(channel_id: impl Into<String>, user_id: impl Into<String>) -> Self {
        Self {
            channel_id: channel_id.into(),
            user_id: user_id.into(),
        }
    }
}

/// The three dialog flows, in router priority order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowKind {
    Split,
    Manual,
    Receipt,
}

/// Expense categories offered in the manual flow's selection menu.
///
/// The receipt flow uses a wider six-value vocabulary delivered as free
/// strings by the extractor; the two sets are deliberately not unified.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ManualCategory {
    Everyday,
    Luxury,
    Consumables,
    Other,
}

impl ManualCategory {
    pub const ALL: [ManualCategory; 4] = [
        ManualCategory::Everyday,
        ManualCategory::Luxury,
        ManualCategory::Consumables,
        ManualCategory::Other,
    ];

    /// User-facing label, also the value written to the ledger's select field.
    pub fn label(self) -> &'static str {
        match self {
            ManualCategory::Everyday => "いつもごはん",
            ManualCategory::Luxury => "ぜいたくごはん",
            ManualCategory::Consumables => "消耗品費",
            ManualCategory::Other => "その他",
        }
    }

    pub fn from_value(value: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.label() == value)
    }

    /// Only luxury meals are split across people; everything else records one
    /// payer without prompting.
    pub fn is_per_person(self) -> bool {
        matches!(self, ManualCategory::Luxury)
    }
}

/// Payment sources offered in the wallet selection menus.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Wallet {
    Ohi,
    Poyo,
    B43,
}

impl Wallet {
    pub const ALL: [Wallet; 3] = [Wallet::Ohi, Wallet::Poyo, Wallet::B43];

    pub fn label(self) -> &'static str {
        match self {
            Wallet::Ohi => "おひ財布",
            Wallet::Poyo => "ぽよ財布",
            Wallet::B43 => "B/43",
        }
    }

    pub fn from_value(value: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|w| w.label() == value)
    }
}

/// Bill-split flow: total amount, then participant count.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SplitState {
    AwaitingTotal,
    AwaitingPeople { total: i64 },
}

/// Manual expense flow.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ManualState {
    AwaitingTitle,
    AwaitingCategory {
        title: String,
    },
    AwaitingAmount {
        title: String,
        category: ManualCategory,
    },
    AwaitingPeople {
        title: String,
        category: ManualCategory,
        amount: i64,
    },
    AwaitingWallet {
        title: String,
        category: ManualCategory,
        amount: i64,
        people: i64,
    },
}

/// Receipt expense flow: one extraction step, then one wallet confirmation.
#[derive(Debug, Clone, PartialEq)]
pub enum ReceiptState {
    Extracting,
    AwaitingWallet { receipt: ReceiptData },
}

/// Extraction result for a photographed receipt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReceiptData {
    pub merchant: String,
    pub items: Vec<LineItem>,
    /// Receipt date as printed, `YYYY-MM-DD`. Parsed only at posting time.
    pub date: String,
}

/// One extracted receipt line.
///
/// `category` stays a free string: the extractor is prompted with a fixed
/// vocabulary but unexpected values are grouped as-is rather than rejected.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineItem {
    pub name: String,
    pub category: String,
    pub amount: i64,
    #[serde(default)]
    pub date: Option<String>,
}

/// Tagged union over the three flows' states.
#[derive(Debug, Clone, PartialEq)]
pub enum FlowState {
    Split(SplitState),
    Manual(ManualState),
    Receipt(ReceiptState),
}

impl FlowState {
    pub fn kind(&self) -> FlowKind {
        match self {
            FlowState::Split(_) => FlowKind::Split,
            FlowState::Manual(_) => FlowKind::Manual,
            FlowState::Receipt(_) => FlowKind::Receipt,
        }
    }
}

/// One ledger posting, ready for the ledger client.
#[derive(Debug, Clone, PartialEq)]
pub struct NewRecord {
    pub title: String,
    pub category: String,
    /// Per-person amount in yen.
    pub amount: i64,
    pub people: i64,
    pub wallet: Wallet,
    /// `None` records the posting day.
    pub date: Option<NaiveDate>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn category_round_trips_through_label() {
        for category in ManualCategory::ALL {
            assert_eq!(ManualCategory::from_value(category.label()), Some(category));
        }
        assert_eq!(ManualCategory::from_value("ごはん"), None);
    }

    #[test]
    fn wallet_round_trips_through_label() {
        for wallet in Wallet::ALL {
            assert_eq!(Wallet::from_value(wallet.label()), Some(wallet));
        }
        assert_eq!(Wallet::from_value("未知の財布"), None);
    }

    #[test]
    fn only_luxury_is_per_person() {
        assert!(ManualCategory::Luxury.is_per_person());
        assert!(!ManualCategory::Everyday.is_per_person());
        assert!(!ManualCategory::Consumables.is_per_person());
        assert!(!ManualCategory::Other.is_per_person());
    }

    #[test]
    fn line_item_date_is_optional_in_extractor_output() {
        let item: LineItem =
            serde_json::from_str(r#"{"name":"牛乳","category":"いつもごはん","amount":200}"#)
                .unwrap();
        assert_eq!(item.date, None);
        assert_eq!(item.amount, 200);
    }
}
