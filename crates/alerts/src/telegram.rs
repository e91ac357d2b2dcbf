//! Telegram transport: inbound command dispatch and outbound notifications.

use crate::commands::{CommandEvent, CommandHandler};
use async_trait::async_trait;
use pricebot_core::UserId;
use pricebot_engine::{NotifyError, Notifier};
use std::sync::Arc;
use teloxide::prelude::*;
use teloxide::utils::command::BotCommands;
use thiserror::Error;
use tracing::{error, info};

#[derive(Error, Debug)]
pub enum TelegramError {
    #[error("Telegram API error: {0}")]
    Api(#[from] teloxide::RequestError),
}

/// Bot commands.
#[derive(BotCommands, Clone, Debug, PartialEq)]
#[command(rename_rule = "lowercase", description = "Available commands:")]
pub enum Command {
    #[command(description = "Register and show the welcome message")]
    Start,
    #[command(description = "Show help")]
    Help,
    #[command(description = "Show a coin's price. Usage: /price BTC")]
    Price(String),
    #[command(description = "Set a holding. Usage: /set BTC 0.5")]
    Set(String),
    #[command(description = "Show your portfolio value")]
    Portfolio,
    #[command(description = "Set a price alert. Usage: /alert BTC 50000")]
    Alert(String),
    #[command(description = "List your price alerts")]
    Alerts,
    #[command(description = "Delete a price alert. Usage: /removealert 1")]
    RemoveAlert(String),
    #[command(description = "Toggle the daily market report")]
    Daily,
    #[command(description = "Show the market overview")]
    Market,
    #[command(description = "Show your settings")]
    Settings,
}

impl Command {
    /// Command name and raw argument string.
    pub fn into_parts(self) -> (&'static str, String) {
        match self {
            Command::Start => ("start", String::new()),
            Command::Help => ("help", String::new()),
            Command::Price(args) => ("price", args),
            Command::Set(args) => ("set", args),
            Command::Portfolio => ("portfolio", String::new()),
            Command::Alert(args) => ("alert", args),
            Command::Alerts => ("alerts", String::new()),
            Command::RemoveAlert(args) => ("removealert", args),
            Command::Daily => ("daily", String::new()),
            Command::Market => ("market", String::new()),
            Command::Settings => ("settings", String::new()),
        }
    }
}

/// Sends plain-text messages to a chat id.
#[derive(Clone)]
pub struct TelegramNotifier {
    bot: Bot,
}

impl TelegramNotifier {
    pub fn new(bot: Bot) -> Self {
        Self { bot }
    }
}

#[async_trait]
impl Notifier for TelegramNotifier {
    async fn send(&self, user_id: UserId, text: &str) -> Result<(), NotifyError> {
        self.bot
            .send_message(ChatId(user_id), text)
            .await
            .map(|_| ())
            .map_err(|e| NotifyError::Transport(e.to_string()))
    }
}

/// Telegram bot wrapper.
pub struct TelegramBot {
    bot: Bot,
    handler: Arc<CommandHandler>,
}

impl TelegramBot {
    /// Create a new bot with the given token.
    pub fn new(token: &str, handler: Arc<CommandHandler>) -> Self {
        let bot = Bot::new(token);
        Self { bot, handler }
    }

    /// Notifier sharing this bot's connection.
    pub fn notifier(&self) -> TelegramNotifier {
        TelegramNotifier::new(self.bot.clone())
    }

    /// Run the bot command handler until the task is cancelled.
    pub async fn run(self: Arc<Self>) {
        let bot = self.bot.clone();
        if let Err(e) = bot.set_my_commands(Command::bot_commands()).await {
            error!(error = %e, "Failed to register bot commands");
        }

        let handler = Update::filter_message().filter_command::<Command>().endpoint(
            move |bot: Bot, msg: Message, cmd: Command| {
                let this = Arc::clone(&self);
                async move { this.handle_command(bot, msg, cmd).await }
            },
        );

        Dispatcher::builder(bot, handler).build().dispatch().await;
    }

    async fn handle_command(
        &self,
        bot: Bot,
        msg: Message,
        cmd: Command,
    ) -> Result<(), TelegramError> {
        let display_name = msg
            .from
            .as_ref()
            .map(|user| user.username.clone().unwrap_or_else(|| user.first_name.clone()))
            .unwrap_or_default();
        let (command, args) = cmd.into_parts();
        let event = CommandEvent::new(msg.chat.id.0, display_name, command, args);

        info!(user_id = event.user_id, command, "Received command");
        let reply = self.handler.handle(&event).await;
        bot.send_message(msg.chat.id, reply).await?;
        Ok(())
    }
}
