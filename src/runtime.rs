//! Event dispatch and effect execution
//!
//! The dispatcher is the impure half of the flow engine: it routes each
//! inbound item to the flow owning its key (or to trigger matching), applies
//! the pure transition, persists the state change, and executes the returned
//! effects. One worker task per `ConversationKey` guarantees that a key's
//! turns are applied atomically and in arrival order, while different keys
//! proceed concurrently.

pub mod traits;

#[cfg(test)]
pub mod testing;

pub use traits::{Ledger, Messenger, ReceiptExtractor};

use crate::flows::{
    self, ConversationKey, Effect, ExtractStage, FlowEvent, NewRecord, TransitionResult, Wallet,
};
use crate::gateway::{self, GatewayClient, Inbound};
use crate::ledger::NotionLedger;
use crate::store::FlowStore;
use crate::vision::{mime_for_filename, GeminiVision};
use chrono::NaiveDate;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use tokio::sync::{mpsc, RwLock};

const EVENT_CHANNEL_CAPACITY: usize = 32;

/// Type alias for the production dispatcher with concrete collaborators
pub type ProductionDispatcher = Dispatcher<GatewayClient, NotionLedger, GeminiVision>;

/// Routes inbound events to per-key workers and executes flow effects.
pub struct Dispatcher<M, L, V> {
    store: FlowStore,
    messenger: Arc<M>,
    ledger: Arc<L>,
    extractor: Arc<V>,
    workers: RwLock<HashMap<ConversationKey, mpsc::Sender<Inbound>>>,
}

impl<M, L, V> Dispatcher<M, L, V>
where
    M: Messenger + 'static,
    L: Ledger + 'static,
    V: ReceiptExtractor + 'static,
{
    pub fn new(messenger: Arc<M>, ledger: Arc<L>, extractor: Arc<V>) -> Self {
        Self {
            store: FlowStore::new(),
            messenger,
            ledger,
            extractor,
            workers: RwLock::new(HashMap::new()),
        }
    }

    /// Queue an inbound item for its conversation's worker. Items for one key
    /// are processed strictly in arrival order; a turn completes (state
    /// written, effects run) before the next item for that key is taken.
    ///
    /// A worker only exists for keys that have shown flow activity: an item
    /// for an unknown key spawns one solely when it could start a flow,
    /// so arbitrary chatter does not grow the worker map.
    pub async fn dispatch(self: &Arc<Self>, key: ConversationKey, inbound: Inbound) {
        let known = self.workers.read().await.get(&key).cloned();
        let tx = match known {
            Some(tx) if !tx.is_closed() => tx,
            Some(_) => {
                // the task died mid-flow; replace it so the key is not wedged
                tracing::warn!(
                    channel_id = %key.channel_id,
                    user_id = %key.user_id,
                    "Conversation worker is gone, respawning"
                );
                let mut workers = self.workers.write().await;
                if workers.get(&key).is_some_and(|t| t.is_closed()) {
                    workers.remove(&key);
                }
                drop(workers);
                self.worker_for(&key).await
            }
            None => {
                let starts_a_flow = match &inbound {
                    Inbound::Text {
                        content,
                        attachments,
                    } => gateway::match_trigger(content, attachments).is_some(),
                    Inbound::Menu(_) => false,
                };
                if !starts_a_flow {
                    return;
                }
                self.worker_for(&key).await
            }
        };

        if tx.send(inbound).await.is_err() {
            tracing::warn!(
                channel_id = %key.channel_id,
                user_id = %key.user_id,
                "Conversation worker is gone, dropping event"
            );
        }
    }

    /// Get or spawn the worker task for a key.
    async fn worker_for(self: &Arc<Self>, key: &ConversationKey) -> mpsc::Sender<Inbound> {
        {
            let workers = self.workers.read().await;
            if let Some(tx) = workers.get(key) {
                return tx.clone();
            }
        }

        let mut workers = self.workers.write().await;
        // re-check under the write lock
        if let Some(tx) = workers.get(key) {
            return tx.clone();
        }

        let (tx, mut rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        workers.insert(key.clone(), tx.clone());

        let dispatcher = Arc::clone(self);
        let worker_key = key.clone();
        tokio::spawn(async move {
            while let Some(inbound) = rx.recv().await {
                dispatcher.handle_turn(&worker_key, inbound).await;
            }
        });

        tx
    }

    /// Apply one inbound item as a complete turn.
    async fn handle_turn(&self, key: &ConversationKey, inbound: Inbound) {
        let current = self.store.get(key).await;

        let result = match &current {
            Some(state) => {
                let event = match inbound {
                    Inbound::Text { content, .. } => FlowEvent::Text(content),
                    Inbound::Menu(selection) => FlowEvent::Menu(selection),
                };
                flows::transition(state, event)
            }
            None => match inbound {
                Inbound::Text {
                    content,
                    attachments,
                } => {
                    let Some(trigger) = gateway::match_trigger(&content, &attachments) else {
                        return;
                    };
                    tracing::info!(
                        channel_id = %key.channel_id,
                        user_id = %key.user_id,
                        "Starting flow"
                    );
                    flows::start(trigger)
                }
                Inbound::Menu(_) => {
                    tracing::debug!(
                        channel_id = %key.channel_id,
                        user_id = %key.user_id,
                        "Menu selection with no active flow"
                    );
                    return;
                }
            },
        };

        self.apply(key, result).await;
    }

    /// Persist the state change, then run the effects. Effects that perform
    /// receipt ingestion feed an event back into the transition function
    /// within the same turn.
    async fn apply(&self, key: &ConversationKey, result: TransitionResult) {
        match result.next {
            Some(next) => self.store.put(key.clone(), next).await,
            None => {
                if let Some(state) = self.store.get(key).await {
                    self.store.remove(key, state.kind()).await;
                }
            }
        }

        let mut queue: VecDeque<Effect> = result.effects.into();
        while let Some(effect) = queue.pop_front() {
            let Some(event) = self.execute_effect(key, effect).await else {
                continue;
            };
            let Some(state) = self.store.get(key).await else {
                tracing::warn!(
                    channel_id = %key.channel_id,
                    "Feedback event arrived for a key with no state"
                );
                continue;
            };
            let followup = flows::transition(&state, event);
            match followup.next {
                Some(next) => self.store.put(key.clone(), next).await,
                None => self.store.remove(key, state.kind()).await,
            }
            queue.extend(followup.effects);
        }
    }

    /// Run one effect. Returns a feedback event for effects whose outcome the
    /// flow still has to observe.
    async fn execute_effect(&self, key: &ConversationKey, effect: Effect) -> Option<FlowEvent> {
        match effect {
            Effect::SendText(text) => {
                self.send_text(key, &text).await;
                None
            }
            Effect::SendMenu(menu) => {
                if let Err(e) = self.messenger.send_menu(&key.channel_id, menu).await {
                    tracing::warn!(error = %e, channel_id = %key.channel_id, "Failed to send menu");
                }
                None
            }
            Effect::FetchReceipt { url, filename } => {
                Some(self.fetch_and_extract(&url, &filename).await)
            }
            Effect::PostExpense { record } => {
                self.post_expense(key, &record).await;
                None
            }
            Effect::PostReceipt {
                merchant,
                lines,
                wallet,
                date,
            } => {
                self.post_receipt(key, &merchant, lines, wallet, date).await;
                None
            }
        }
    }

    async fn send_text(&self, key: &ConversationKey, text: &str) {
        if let Err(e) = self.messenger.send_text(&key.channel_id, text).await {
            tracing::warn!(error = %e, channel_id = %key.channel_id, "Failed to send message");
        }
    }

    /// Download the attachment and run extraction. The image buffer lives
    /// only for the duration of this call.
    async fn fetch_and_extract(&self, url: &str, filename: &str) -> FlowEvent {
        let image = match self.messenger.fetch_attachment(url).await {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::warn!(error = %e, %url, "Attachment download failed");
                return FlowEvent::ReceiptFailed(ExtractStage::Download);
            }
        };

        match self
            .extractor
            .extract(&image, mime_for_filename(filename))
            .await
        {
            Ok(receipt) => FlowEvent::ReceiptExtracted(receipt),
            Err(e) => {
                tracing::warn!(error = %e, "Receipt extraction failed");
                FlowEvent::ReceiptFailed(ExtractStage::Extraction)
            }
        }
    }

    async fn post_expense(&self, key: &ConversationKey, record: &NewRecord) {
        if let Err(e) = self.ledger.create_record(record).await {
            tracing::warn!(error = %e, title = %record.title, "Ledger write failed");
            self.send_text(key, "⚠️ Notion に記録できなかった").await;
            return;
        }

        let budget = self.budget_line(key, &record.category).await;
        self.send_text(key, &expense_summary(record, &budget)).await;
    }

    /// Post one record per aggregated category. A failed write stops the
    /// remaining categories; earlier writes stand.
    async fn post_receipt(
        &self,
        key: &ConversationKey,
        merchant: &str,
        lines: Vec<flows::CategoryLine>,
        wallet: Wallet,
        date: NaiveDate,
    ) {
        for line in lines {
            let record = NewRecord {
                title: format!("{merchant} - {}", line.name),
                category: line.category,
                amount: line.amount,
                people: 1,
                wallet,
                date: Some(date),
            };

            if let Err(e) = self.ledger.create_record(&record).await {
                tracing::warn!(
                    error = %e,
                    title = %record.title,
                    "Ledger write failed, skipping remaining categories"
                );
                self.send_text(key, "⚠️ Notion に記録できなかった").await;
                return;
            }

            let budget = self.budget_line(key, &record.category).await;
            self.send_text(key, &expense_summary(&record, &budget)).await;
        }
    }

    /// Monthly-total line for the summary. A read failure warns the user and
    /// yields an empty line; the summary itself is still sent.
    async fn budget_line(&self, key: &ConversationKey, category: &str) -> String {
        match self.ledger.monthly_total(category).await {
            Ok(total) => format!("📊 今月の{category}合計は **{total}円** みたい"),
            Err(e) => {
                tracing::warn!(error = %e, %category, "Monthly total read failed");
                self.send_text(
                    key,
                    &format!("⚠️ 今月の{category}代が取得できなかったんだけど"),
                )
                .await;
                String::new()
            }
        }
    }
}

fn expense_summary(record: &NewRecord, budget: &str) -> String {
    let total = record.amount.saturating_mul(record.people);
    format!(
        "🍽 家計簿つけたよ\nタイトル: {}\n一人あたり: {}円\n人数: {}人\n合計: {}円\n財布: {}\n\n{}",
        record.title,
        record.amount,
        record.people,
        total,
        record.wallet.label(),
        budget
    )
}
