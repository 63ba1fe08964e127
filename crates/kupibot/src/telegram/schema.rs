//! Dispatcher schema and handler chain builders

use teloxide::dispatching::{UpdateFilterExt, UpdateHandler};
use teloxide::prelude::*;
use teloxide::types::Message;

use serde_json::json;

use kupicore::analytics::AnalyticsEvent;
use kupicore::experiment::Variant;

use super::bot::Command;
use super::broadcast::handle_broadcast_command;
use super::commands::{handle_help_command, handle_start_command, handle_text_message};
use super::payments::{handle_pre_checkout, handle_successful_payment};
use super::types::{HandlerDeps, HandlerError};

/// Creates the main dispatcher schema for the Telegram bot.
///
/// This function returns a handler tree that can be used with teloxide's
/// Dispatcher. The same schema is used in production and in tests.
pub fn schema(deps: HandlerDeps) -> UpdateHandler<HandlerError> {
    let deps_payment = deps.clone();
    let deps_broadcast = deps.clone();
    let deps_commands = deps.clone();
    let deps_callback = deps.clone();

    dptree::entry()
        // Successful payment handler must be first
        .branch(successful_payment_handler(deps_payment))
        // Hidden admin command (not in Command enum)
        .branch(broadcast_handler(deps_broadcast))
        // Command handler
        .branch(command_handler(deps_commands))
        // Plain text handler (echo)
        .branch(message_handler())
        // Pre-checkout query handler
        .branch(pre_checkout_handler())
        // Callback query handler
        .branch(callback_handler(deps_callback))
}

/// Handler for successful Telegram payments
fn successful_payment_handler(deps: HandlerDeps) -> UpdateHandler<HandlerError> {
    Update::filter_message()
        .filter(|msg: Message| msg.successful_payment().is_some())
        .endpoint(move |bot: Bot, msg: Message| {
            let deps = deps.clone();
            async move {
                log::info!("Received successful_payment message");
                if let Err(e) = handle_successful_payment(&bot, &msg, &deps).await {
                    log::error!("Failed to handle successful payment: {:?}", e);
                }
                Ok(())
            }
        })
}

/// Handler for the hidden /broadcast admin command (not in Command enum)
fn broadcast_handler(deps: HandlerDeps) -> UpdateHandler<HandlerError> {
    Update::filter_message()
        .filter(|msg: Message| msg.text().map(|text| text.starts_with("/broadcast")).unwrap_or(false))
        .endpoint(move |bot: Bot, msg: Message| {
            let deps = deps.clone();
            async move {
                let user_id = msg.from.as_ref().and_then(|u| i64::try_from(u.id.0).ok()).unwrap_or(0);
                if let Err(e) = handle_broadcast_command(&bot, &msg, &deps).await {
                    log::error!("/broadcast handler failed for user {}: {}", user_id, e);
                    let _ = bot.send_message(msg.chat.id, format!("Error: {}", e)).await;
                }
                Ok(())
            }
        })
}

/// Handler for bot commands (/start, /help)
fn command_handler(deps: HandlerDeps) -> UpdateHandler<HandlerError> {
    Update::filter_message().branch(dptree::entry().filter_command::<Command>().endpoint(
        move |bot: Bot, msg: Message, cmd: Command| {
            let deps = deps.clone();
            async move {
                log::info!("🎯 Received command: {:?} from chat {}", cmd, msg.chat.id);

                match cmd {
                    Command::Start(payload) => {
                        handle_start_command(&bot, &msg, &payload, &deps).await?;
                    }
                    Command::Help => {
                        handle_help_command(&bot, &msg).await?;
                    }
                }
                Ok(())
            }
        },
    ))
}

/// Handler for plain text messages
fn message_handler() -> UpdateHandler<HandlerError> {
    Update::filter_message()
        .filter(|msg: Message| msg.text().is_some())
        .endpoint(move |bot: Bot, msg: Message| async move {
            if let Err(e) = handle_text_message(&bot, &msg).await {
                log::error!("Error handling message: {:?}", e);
            }
            Ok(())
        })
}

/// Handler for pre-checkout queries (Telegram payments)
fn pre_checkout_handler() -> UpdateHandler<HandlerError> {
    Update::filter_pre_checkout_query().endpoint(|bot: Bot, query: teloxide::types::PreCheckoutQuery| async move {
        if let Err(e) = handle_pre_checkout(&bot, &query).await {
            log::error!("Failed to answer pre_checkout_query: {:?}", e);
        }
        Ok(())
    })
}

/// Handler for callback queries (inline keyboard buttons)
fn callback_handler(deps: HandlerDeps) -> UpdateHandler<HandlerError> {
    Update::filter_callback_query().endpoint(move |bot: Bot, q: CallbackQuery| {
        let deps = deps.clone();
        async move {
            let data = q.data.as_deref().unwrap_or("");

            // Explicit Mini App open click carries the shown variant.
            if let Some(variant) = data.strip_prefix("tma_click:").and_then(Variant::parse) {
                let user_id = i64::try_from(q.from.id.0).ok();
                deps.backend.track(AnalyticsEvent::new(
                    "bot_webapp_open_click",
                    user_id,
                    Some(json!({"variant": variant.as_str()})),
                ));

                if let Err(e) = bot.answer_callback_query(q.id.clone()).text("Записал").await {
                    log::error!("Failed to answer tma_click callback: {:?}", e);
                    let _ = bot.answer_callback_query(q.id).await;
                }
                return Ok(());
            }

            // Acknowledge anything else so the button stops spinning.
            if let Err(e) = bot.answer_callback_query(q.id).text("Принято").await {
                log::error!("Failed to answer callback query: {:?}", e);
            }
            Ok(())
        }
    })
}
