pub mod auth;
pub mod bot;
pub mod config;
pub mod entry;
pub mod error;
pub mod extractor;
pub mod messages;
pub mod monitor;
pub mod scraper;
pub mod session;
pub mod storage;
pub mod telegram;

pub use bot::Bot;
pub use config::Config;
pub use entry::EntryRecord;
pub use error::{AppError, Result};
pub use monitor::{CheckOutcome, Monitor};
pub use telegram::{Notifier, TelegramClient};
