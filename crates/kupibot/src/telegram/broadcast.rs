//! Admin broadcast: re-send a message to every recorded user.
//!
//! Available two ways: the hidden /broadcast command here and the
//! standalone `broadcast` binary. Both read the flat-file registry and
//! send sequentially with a small delay to stay under Telegram's
//! per-bot send limits.

use std::time::Duration;
use teloxide::prelude::*;
use teloxide::types::Message;

use super::types::{HandlerDeps, HandlerError};

/// Delay between consecutive sends.
pub const SEND_DELAY: Duration = Duration::from_millis(50);

/// Sends `text` to every id in `ids`. Returns (sent, failed) counts.
///
/// Per-user failures (blocked bot, deleted account, malformed id) are
/// logged and skipped; one bad recipient never aborts the run.
pub async fn send_to_all(bot: &Bot, ids: &[String], text: &str, delay: Duration) -> (usize, usize) {
    let mut sent = 0usize;
    let mut failed = 0usize;

    for id in ids {
        let chat_id = match id.parse::<i64>() {
            Ok(value) => ChatId(value),
            Err(_) => {
                log::warn!("Skipping malformed user id in registry: {:?}", id);
                failed += 1;
                continue;
            }
        };

        match bot.send_message(chat_id, text).await {
            Ok(_) => sent += 1,
            Err(e) => {
                log::warn!("Failed to send broadcast to {}: {}", chat_id.0, e);
                failed += 1;
            }
        }

        tokio::time::sleep(delay).await;
    }

    (sent, failed)
}

/// Handler for the hidden /broadcast admin command.
pub(super) async fn handle_broadcast_command(bot: &Bot, msg: &Message, deps: &HandlerDeps) -> Result<(), HandlerError> {
    let user_id = msg.from.as_ref().and_then(|u| i64::try_from(u.id.0).ok()).unwrap_or(0);
    if !deps.config.is_admin(user_id) {
        bot.send_message(msg.chat.id, "❌ Эта команда доступна только администраторам.")
            .await?;
        return Ok(());
    }

    let text = msg
        .text()
        .and_then(|t| t.strip_prefix("/broadcast"))
        .map(str::trim)
        .unwrap_or("");
    if text.is_empty() {
        bot.send_message(msg.chat.id, "Использование: /broadcast <текст сообщения>")
            .await?;
        return Ok(());
    }

    let ids = match deps.registry.load() {
        Ok(ids) => ids,
        Err(e) => {
            log::error!("Failed to read user registry: {}", e);
            bot.send_message(msg.chat.id, "❌ Не удалось прочитать список пользователей.")
                .await?;
            return Ok(());
        }
    };

    log::info!("Broadcast from admin {} to {} user(s)", user_id, ids.len());
    let (sent, failed) = send_to_all(bot, &ids, text, SEND_DELAY).await;

    bot.send_message(
        msg.chat.id,
        format!("📣 Рассылка завершена: доставлено {}, не доставлено {}.", sent, failed),
    )
    .await?;

    Ok(())
}
