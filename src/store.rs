//! Per-flow conversation state tables
//!
//! An injected, lock-guarded store. Entry presence in a table is the sole
//! signal that a key is "in" that flow; the router consults the tables in a
//! fixed priority order.

use crate::flows::{ConversationKey, FlowKind, FlowState, ManualState, ReceiptState, SplitState};
use std::collections::HashMap;
use tokio::sync::RwLock;

/// One table per flow kind, each guarded by its own lock.
#[derive(Default)]
pub struct FlowStore {
    split: RwLock<HashMap<ConversationKey, SplitState>>,
    manual: RwLock<HashMap<ConversationKey, ManualState>>,
    receipt: RwLock<HashMap<ConversationKey, ReceiptState>>,
}

impl FlowStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Which flow currently owns this key, if any. Priority order:
    /// bill-split, manual-expense, receipt-expense.
    pub async fn active_flow(&self, key: &ConversationKey) -> Option<FlowKind> {
        if self.split.read().await.contains_key(key) {
            return Some(FlowKind::Split);
        }
        if self.manual.read().await.contains_key(key) {
            return Some(FlowKind::Manual);
        }
        if self.receipt.read().await.contains_key(key) {
            return Some(FlowKind::Receipt);
        }
        None
    }

    pub async fn is_active(&self, key: &ConversationKey, kind: FlowKind) -> bool {
        match kind {
            FlowKind::Split => self.split.read().await.contains_key(key),
            FlowKind::Manual => self.manual.read().await.contains_key(key),
            FlowKind::Receipt => self.receipt.read().await.contains_key(key),
        }
    }

    /// Fetch the owning flow's state for a key, following router priority.
    pub async fn get(&self, key: &ConversationKey) -> Option<FlowState> {
        if let Some(state) = self.split.read().await.get(key) {
            return Some(FlowState::Split(state.clone()));
        }
        if let Some(state) = self.manual.read().await.get(key) {
            return Some(FlowState::Manual(state.clone()));
        }
        if let Some(state) = self.receipt.read().await.get(key) {
            return Some(FlowState::Receipt(state.clone()));
        }
        None
    }

    pub async fn put(&self, key: ConversationKey, state: FlowState) {
        match state {
            FlowState::Split(s) => {
                self.split.write().await.insert(key, s);
            }
            FlowState::Manual(s) => {
                self.manual.write().await.insert(key, s);
            }
            FlowState::Receipt(s) => {
                self.receipt.write().await.insert(key, s);
            }
        }
    }

    pub async fn remove(&self, key: &ConversationKey, kind: FlowKind) {
        match kind {
            FlowKind::Split => {
                self.split.write().await.remove(key);
            }
            FlowKind::Manual => {
                self.manual.write().await.remove(key);
            }
            FlowKind::Receipt => {
                self.receipt.write().await.remove(key);
            }
        }
    }
}
