//! Bot initialization and command definitions

use reqwest::ClientBuilder;
use std::time::Duration;
use teloxide::prelude::*;
use teloxide::utils::command::{BotCommands, ParseError};

use kupicore::Config;

/// Request timeout for Telegram API calls.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Passes the raw /start deep-link payload through untouched.
fn deep_link_payload(input: String) -> Result<(String,), ParseError> {
    Ok((input.trim().to_string(),))
}

/// Bot commands enum with descriptions
#[derive(BotCommands, Clone, Debug)]
#[command(rename_rule = "lowercase", description = "Я умею:")]
pub enum Command {
    #[command(description = "приветствие и кнопка мини-приложения", parse_with = deep_link_payload)]
    Start(String),
    #[command(description = "краткая справка")]
    Help,
}

/// Creates a Bot instance from the configured token.
///
/// # Returns
/// * `Ok(Bot)` - Successfully created bot instance
/// * `Err(anyhow::Error)` - Failed to build the underlying HTTP client
pub fn create_bot(config: &Config) -> anyhow::Result<Bot> {
    let client = ClientBuilder::new().timeout(REQUEST_TIMEOUT).build()?;
    Ok(Bot::with_client(config.bot_token.clone(), client))
}

/// Sets up bot commands in Telegram UI
pub async fn setup_bot_commands(bot: &Bot) -> Result<(), teloxide::RequestError> {
    use teloxide::types::BotCommand;

    bot.set_my_commands(vec![
        BotCommand::new("start", "Приветствие и кнопка мини-приложения"),
        BotCommand::new("help", "Краткая справка"),
    ])
    .await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_descriptions() {
        let commands = Command::descriptions();
        let command_list = format!("{}", commands);

        assert!(command_list.contains("Я умею"));
        assert!(command_list.contains("start"));
        assert!(command_list.contains("help"));
    }

    #[test]
    fn start_parses_with_and_without_payload() {
        let with_payload = Command::parse("/start ref42__summer", "kupidon_bot").unwrap();
        assert!(matches!(with_payload, Command::Start(p) if p == "ref42__summer"));

        let bare = Command::parse("/start", "kupidon_bot").unwrap();
        assert!(matches!(bare, Command::Start(p) if p.is_empty()));
    }
}
