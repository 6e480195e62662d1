// SPDX-FileCopyrightText: 2026 Dormbite Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Update intake: long polling or an axum webhook, both feeding the engine.
//!
//! teloxide's dispatcher serializes updates per chat and runs different
//! chats concurrently, which is the ordering the engine expects.

use std::net::SocketAddr;
use std::sync::Arc;

use dormbite_config::model::{RunMode, TelegramConfig};
use dormbite_core::error::DormbiteError;
use dormbite_engine::Engine;
use teloxide::RequestError;
use teloxide::dispatching::UpdateHandler;
use teloxide::dptree;
use teloxide::error_handlers::LoggingErrorHandler;
use teloxide::prelude::*;
use teloxide::update_listeners::webhooks;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::handler;

fn schema(engine: Arc<Engine>) -> UpdateHandler<RequestError> {
    let on_message = {
        let engine = Arc::clone(&engine);
        move |msg: Message| {
            let engine = Arc::clone(&engine);
            async move {
                match handler::message_event(&msg, false) {
                    Some(event) => engine.handle(event).await,
                    None => debug!(msg_id = msg.id.0, "ignoring unsupported message"),
                }
                respond(())
            }
        }
    };
    let on_edit = {
        let engine = Arc::clone(&engine);
        move |msg: Message| {
            let engine = Arc::clone(&engine);
            async move {
                if let Some(event) = handler::message_event(&msg, true) {
                    engine.handle(event).await;
                }
                respond(())
            }
        }
    };
    let on_callback = move |query: CallbackQuery| {
        let engine = Arc::clone(&engine);
        async move {
            if let Some(event) = handler::callback_event(&query) {
                engine.handle(event).await;
            }
            respond(())
        }
    };

    dptree::entry()
        .branch(Update::filter_message().endpoint(on_message))
        .branch(Update::filter_edited_message().endpoint(on_edit))
        .branch(Update::filter_callback_query().endpoint(on_callback))
}

/// Runs the update loop until `cancel` fires.
pub async fn run(
    bot: Bot,
    engine: Arc<Engine>,
    config: &TelegramConfig,
    mode: RunMode,
    cancel: CancellationToken,
) -> Result<(), DormbiteError> {
    let mut dispatcher = Dispatcher::builder(bot.clone(), schema(engine))
        .default_handler(|_| async {}) // Other update kinds are of no interest.
        .build();

    let shutdown = dispatcher.shutdown_token();
    tokio::spawn(async move {
        cancel.cancelled().await;
        if let Ok(stopped) = shutdown.shutdown() {
            stopped.await;
        }
    });

    match mode {
        RunMode::Polling => {
            info!("starting Telegram long polling");
            dispatcher.dispatch().await;
        }
        RunMode::Webhook => {
            let url = config.webhook_url.as_deref().ok_or_else(|| {
                DormbiteError::Config("telegram.webhook_url is required in webhook mode".into())
            })?;
            let url = reqwest::Url::parse(url).map_err(|e| {
                DormbiteError::Config(format!("invalid telegram.webhook_url: {e}"))
            })?;
            let address: SocketAddr = config.webhook_listen.parse().map_err(|e| {
                DormbiteError::Config(format!("invalid telegram.webhook_listen: {e}"))
            })?;

            let listener = webhooks::axum(bot, webhooks::Options::new(address, url))
                .await
                .map_err(|e| DormbiteError::Channel {
                    message: format!("failed to register webhook: {e}"),
                    source: Some(Box::new(e)),
                })?;

            info!(%address, "listening for Telegram webhook updates");
            dispatcher
                .dispatch_with_listener(
                    listener,
                    LoggingErrorHandler::with_custom_text("webhook update listener failed"),
                )
                .await;
        }
    }

    info!("Telegram update loop stopped");
    Ok(())
}
