//! Pure flow transition functions
//!
//! `start` and `transition` perform no I/O: they map (state, event) to a new
//! state plus a list of effects. Validation failures keep the state unchanged
//! and re-issue the prompt; any (state, event) pairing with no defined branch
//! aborts the flow with a generic warning.

use super::aggregate::summarize_by_category;
use super::effect::{Effect, MenuPrompt};
use super::event::{ExtractStage, FlowEvent, MenuSelection, Trigger};
use super::state::{FlowState, ManualState, NewRecord, ReceiptState, SplitState};
use chrono::NaiveDate;

const MSG_UNEXPECTED_STATE: &str = "⚠️ なんか変な状態になっちゃった";

/// Result of applying one event: the state to keep (`None` deletes the entry)
/// and the effects to run.
#[derive(Debug, PartialEq)]
pub struct TransitionResult {
    pub next: Option<FlowState>,
    pub effects: Vec<Effect>,
}

impl TransitionResult {
    pub fn stay(state: FlowState) -> Self {
        Self {
            next: Some(state),
            effects: vec![],
        }
    }

    pub fn done() -> Self {
        Self {
            next: None,
            effects: vec![],
        }
    }

    pub fn with_effect(mut self, effect: Effect) -> Self {
        self.effects.push(effect);
        self
    }
}

/// Begin a fresh flow for a key with no active state.
pub fn start(trigger: Trigger) -> TransitionResult {
    match trigger {
        Trigger::Split => TransitionResult::stay(FlowState::Split(SplitState::AwaitingTotal))
            .with_effect(Effect::send_text("全部で何円払ったの？")),
        Trigger::Manual => TransitionResult::stay(FlowState::Manual(ManualState::AwaitingTitle))
            .with_effect(Effect::send_text("タイトル教えて")),
        Trigger::Receipt {
            image_url,
            filename,
        } => TransitionResult::stay(FlowState::Receipt(ReceiptState::Extracting))
            .with_effect(Effect::FetchReceipt {
                url: image_url,
                filename,
            }),
    }
}

/// Advance an active flow by one event.
pub fn transition(state: &FlowState, event: FlowEvent) -> TransitionResult {
    match state {
        FlowState::Split(split) => split_transition(split, event),
        FlowState::Manual(manual) => manual_transition(manual, event),
        FlowState::Receipt(receipt) => receipt_transition(receipt, event),
    }
}

/// Parse the raw message body as a positive integer. No trimming: the parse
/// is applied to the body exactly as delivered.
fn parse_positive(text: &str) -> Option<i64> {
    text.parse::<i64>().ok().filter(|n| *n > 0)
}

fn abort_unexpected() -> TransitionResult {
    TransitionResult::done().with_effect(Effect::send_text(MSG_UNEXPECTED_STATE))
}

fn split_transition(state: &SplitState, event: FlowEvent) -> TransitionResult {
    match (state, event) {
        (SplitState::AwaitingTotal, FlowEvent::Text(text)) => match parse_positive(&text) {
            Some(total) => {
                TransitionResult::stay(FlowState::Split(SplitState::AwaitingPeople { total }))
                    .with_effect(Effect::send_text("何人でわりかんするの？"))
            }
            None => TransitionResult::stay(FlowState::Split(state.clone()))
                .with_effect(Effect::send_text("⚠️ 合計金額は整数にしてよね")),
        },

        (SplitState::AwaitingPeople { total }, FlowEvent::Text(text)) => {
            match parse_positive(&text) {
                Some(people) => {
                    let per = (*total as u64).div_ceil(people as u64);
                    TransitionResult::done().with_effect(Effect::send_text(format!(
                        "💴 {total}円を{people}人でわりかんしたら**{per}円** じゃない？"
                    )))
                }
                None => TransitionResult::stay(FlowState::Split(state.clone()))
                    .with_effect(Effect::send_text("⚠️ 人数が変じゃない？")),
            }
        }

        _ => abort_unexpected(),
    }
}

fn manual_transition(state: &ManualState, event: FlowEvent) -> TransitionResult {
    match (state, event) {
        (ManualState::AwaitingTitle, FlowEvent::Text(text)) => {
            if text.is_empty() {
                TransitionResult::stay(FlowState::Manual(state.clone()))
                    .with_effect(Effect::send_text("⚠️ タイトル教えてよ"))
            } else {
                TransitionResult::stay(FlowState::Manual(ManualState::AwaitingCategory {
                    title: text,
                }))
                .with_effect(Effect::SendMenu(MenuPrompt::Category))
            }
        }

        (
            ManualState::AwaitingCategory { title },
            FlowEvent::Menu(MenuSelection::Category(category)),
        ) => {
            let prompt = if category.is_per_person() {
                "一人あたりの金額はいくら？"
            } else {
                "金額はいくら？"
            };
            TransitionResult::stay(FlowState::Manual(ManualState::AwaitingAmount {
                title: title.clone(),
                category,
            }))
            .with_effect(Effect::send_text(prompt))
        }

        (ManualState::AwaitingAmount { title, category }, FlowEvent::Text(text)) => {
            match parse_positive(&text) {
                Some(amount) if category.is_per_person() => {
                    TransitionResult::stay(FlowState::Manual(ManualState::AwaitingPeople {
                        title: title.clone(),
                        category: *category,
                        amount,
                    }))
                    .with_effect(Effect::send_text("何人分支払ったの？"))
                }
                Some(amount) => {
                    TransitionResult::stay(FlowState::Manual(ManualState::AwaitingWallet {
                        title: title.clone(),
                        category: *category,
                        amount,
                        people: 1,
                    }))
                    .with_effect(Effect::SendMenu(MenuPrompt::ManualWallet))
                }
                None => TransitionResult::stay(FlowState::Manual(state.clone()))
                    .with_effect(Effect::send_text("⚠️ 金額は整数にしてよね")),
            }
        }

        (
            ManualState::AwaitingPeople {
                title,
                category,
                amount,
            },
            FlowEvent::Text(text),
        ) => match parse_positive(&text) {
            Some(people) => {
                TransitionResult::stay(FlowState::Manual(ManualState::AwaitingWallet {
                    title: title.clone(),
                    category: *category,
                    amount: *amount,
                    people,
                }))
                .with_effect(Effect::SendMenu(MenuPrompt::ManualWallet))
            }
            None => TransitionResult::stay(FlowState::Manual(state.clone()))
                .with_effect(Effect::send_text("⚠️ 人数が変じゃない？")),
        },

        (
            ManualState::AwaitingWallet {
                title,
                category,
                amount,
                people,
            },
            FlowEvent::Menu(MenuSelection::ManualWallet(wallet)),
        ) => TransitionResult::done().with_effect(Effect::PostExpense {
            record: NewRecord {
                title: title.clone(),
                category: category.label().to_string(),
                amount: *amount,
                people: *people,
                wallet,
                date: None,
            },
        }),

        _ => abort_unexpected(),
    }
}

fn receipt_transition(state: &ReceiptState, event: FlowEvent) -> TransitionResult {
    match (state, event) {
        (ReceiptState::Extracting, FlowEvent::ReceiptExtracted(receipt)) => {
            TransitionResult::stay(FlowState::Receipt(ReceiptState::AwaitingWallet { receipt }))
                .with_effect(Effect::SendMenu(MenuPrompt::ReceiptWallet))
        }

        (ReceiptState::Extracting, FlowEvent::ReceiptFailed(stage)) => {
            let msg = match stage {
                ExtractStage::Download => "⚠️ 画像のダウンロードに失敗したよ",
                ExtractStage::Extraction => "⚠️ レシートの解析に失敗したよ",
            };
            TransitionResult::done().with_effect(Effect::send_text(msg))
        }

        (
            ReceiptState::AwaitingWallet { receipt },
            FlowEvent::Menu(MenuSelection::ReceiptWallet(wallet)),
        ) => match NaiveDate::parse_from_str(&receipt.date, "%Y-%m-%d") {
            Ok(date) => {
                let lines = summarize_by_category(&receipt.merchant, &receipt.items);
                TransitionResult::done().with_effect(Effect::PostReceipt {
                    merchant: receipt.merchant.clone(),
                    lines,
                    wallet,
                    date,
                })
            }
            Err(_) => TransitionResult::done()
                .with_effect(Effect::send_text("⚠️ 日付の解析に失敗したよ")),
        },

        _ => abort_unexpected(),
    }
}
