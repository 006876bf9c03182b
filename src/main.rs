//! ぴょんちー: a chat-driven household ledger bot.
//!
//! Listens for gateway webhooks, runs three wake-word dialog flows (bill
//! split, manual expense, receipt expense), and records expenses in a Notion
//! database with Gemini-extracted receipt data.

mod api;
mod config;
mod flows;
mod gateway;
mod ledger;
mod runtime;
mod store;
mod vision;

use crate::config::Config;
use crate::gateway::GatewayClient;
use crate::ledger::NotionLedger;
use crate::runtime::{Dispatcher, ProductionDispatcher};
use crate::vision::GeminiVision;
use std::sync::Arc;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "pyonchi=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer().json())
        .init();

    let config = Config::from_env()?;

    let messenger = Arc::new(GatewayClient::new(
        config.gateway_send_url,
        config.gateway_token,
    ));
    let ledger = Arc::new(NotionLedger::new(
        config.notion_api_key,
        config.notion_expenses_db_id,
    ));
    let extractor = Arc::new(GeminiVision::new(config.gemini_api_key));
    let dispatcher: Arc<ProductionDispatcher> =
        Arc::new(Dispatcher::new(messenger, ledger, extractor));

    let router = api::create_router(dispatcher, config.allowed_channel_ids);

    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(%addr, "Listening");

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}
