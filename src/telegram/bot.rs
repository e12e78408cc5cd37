//! Bot initialization and command definitions

use reqwest::ClientBuilder;
use teloxide::prelude::*;
use teloxide::utils::command::BotCommands;

use crate::config;

/// Bot commands enum with descriptions
#[derive(BotCommands, Clone, Debug, PartialEq)]
#[command(rename_rule = "snake_case", description = "Я умею:")]
pub enum Command {
    #[command(description = "приветствие и краткая справка")]
    Start,
    #[command(description = "справка по командам")]
    Help,
    #[command(description = "показать ваш Telegram ID")]
    Myid,
    #[command(description = "проголосовать в текущем раунде")]
    Vote,
    #[command(description = "список активных раундов")]
    List,
    #[command(description = "участники текущего раунда")]
    Participants,
    #[command(description = "текущий раунд и его статус")]
    Status,
    #[command(description = "добавить участников в раунд (только для администраторов)")]
    AddParticipant,
    #[command(description = "запустить раунд (только для администраторов)")]
    StartRound,
    #[command(description = "завершить раунд и показать победителей (только для администраторов)")]
    EndRound,
    #[command(description = "назначить текущий раунд (только для администраторов)")]
    SetCurrentRound,
}

/// Creates a Bot instance with custom or default API URL
pub fn create_bot() -> anyhow::Result<Bot> {
    // Check if local Bot API server is configured
    let bot = if let Ok(bot_api_url) = std::env::var("BOT_API_URL") {
        log::info!("Using custom Bot API URL: {}", bot_api_url);
        let url =
            url::Url::parse(&bot_api_url).map_err(|e| anyhow::anyhow!("Invalid BOT_API_URL: {}", e))?;
        Bot::from_env_with_client(
            ClientBuilder::new().timeout(config::network::telegram_timeout()).build()?,
        )
        .set_api_url(url)
    } else {
        Bot::from_env_with_client(
            ClientBuilder::new().timeout(config::network::telegram_timeout()).build()?,
        )
    };

    Ok(bot)
}

/// Sets up bot commands in Telegram UI
pub async fn setup_bot_commands(bot: &Bot) -> Result<(), teloxide::RequestError> {
    use teloxide::types::BotCommand;

    bot.set_my_commands(vec![
        BotCommand::new("start", "приветствие и краткая справка"),
        BotCommand::new("help", "справка по командам"),
        BotCommand::new("myid", "показать ваш Telegram ID"),
        BotCommand::new("vote", "проголосовать в текущем раунде"),
        BotCommand::new("list", "список активных раундов"),
        BotCommand::new("participants", "участники текущего раунда"),
        BotCommand::new("status", "текущий раунд и его статус"),
    ])
    .await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_descriptions_contain_header() {
        let descriptions = Command::descriptions().to_string();
        assert!(descriptions.contains("Я умею:"));
        assert!(descriptions.contains("/vote"));
        assert!(descriptions.contains("/start_round"));
    }

    #[test]
    fn test_command_parsing() {
        let cmd = Command::parse("/start_round", "golosbot").unwrap();
        assert_eq!(cmd, Command::StartRound);

        let cmd = Command::parse("/status", "golosbot").unwrap();
        assert_eq!(cmd, Command::Status);
    }
}
