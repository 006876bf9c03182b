//! Conversational flow engine
//!
//! Implements the Elm Architecture pattern: each flow is a sum-type state, and
//! `transition` is a pure function from (state, event) to (new state, effects).

mod aggregate;
pub mod effect;
pub mod event;
pub mod state;
pub(crate) mod transition;

#[cfg(test)]
mod proptests;

pub use aggregate::CategoryLine;
pub use effect::{Effect, MenuPrompt};
pub use event::{ExtractStage, FlowEvent, MenuSelection, Trigger};
pub use state::{
    ConversationKey, FlowKind, FlowState, LineItem, ManualCategory, ManualState, NewRecord,
    ReceiptData, ReceiptState, SplitState, Wallet,
};
pub use transition::{start, transition, TransitionResult};
