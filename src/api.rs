//! HTTP surface
//!
//! Two health endpoints for the platform's probes and one webhook that
//! receives gateway event envelopes. The webhook acknowledges with 202 as
//! soon as the event is queued; flow work happens on the conversation's
//! worker task.

use crate::gateway::{self, GatewayEvent};
use crate::runtime::{Dispatcher, Ledger, Messenger, ReceiptExtractor};
use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

pub struct AppState<M, L, V> {
    dispatcher: Arc<Dispatcher<M, L, V>>,
    allowed_channels: Arc<Vec<String>>,
}

// derived Clone would require M: Clone
impl<M, L, V> Clone for AppState<M, L, V> {
    fn clone(&self) -> Self {
        Self {
            dispatcher: Arc::clone(&self.dispatcher),
            allowed_channels: Arc::clone(&self.allowed_channels),
        }
    }
}

pub fn create_router<M, L, V>(
    dispatcher: Arc<Dispatcher<M, L, V>>,
    allowed_channels: Vec<String>,
) -> Router
where
    M: Messenger + 'static,
    L: Ledger + 'static,
    V: ReceiptExtractor + 'static,
{
    let state = AppState {
        dispatcher,
        allowed_channels: Arc::new(allowed_channels),
    };

    Router::new()
        .route("/", get(|| async { "OK" }))
        .route("/healthz", get(|| async { "ok" }))
        .route("/gateway/events", post(gateway_events))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Accept one gateway event. Filtered-out events are acknowledged the same
/// way as dispatched ones so the gateway never retries them.
async fn gateway_events<M, L, V>(
    State(state): State<AppState<M, L, V>>,
    Json(event): Json<GatewayEvent>,
) -> StatusCode
where
    M: Messenger + 'static,
    L: Ledger + 'static,
    V: ReceiptExtractor + 'static,
{
    if let Some((key, inbound)) = gateway::decode(event, &state.allowed_channels) {
        state.dispatcher.dispatch(key, inbound).await;
    }
    StatusCode::ACCEPTED
}
