//! Chat front end for the price alert bot.
//!
//! This crate provides:
//! - Command handlers that turn parsed commands into reply text
//! - Market overview and daily digest composition
//! - Telegram dispatch and notification delivery

pub mod commands;
pub mod digest;
pub mod telegram;

pub use commands::{CommandEvent, CommandHandler};
pub use digest::{DigestJob, DigestReport, MarketSummary};
pub use telegram::{Command, TelegramBot, TelegramError, TelegramNotifier};
