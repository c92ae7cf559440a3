//! The bot's single worker: scheduled checks and chat commands take turns on
//! one task, so a check never overlaps a command and vice versa.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{self, MissedTickBehavior};
use tracing::{debug, error, info, warn};
use crate::config::Config;
use crate::error::{AppError, Result};
use crate::messages;
use crate::monitor::{CheckOutcome, Monitor};
use crate::telegram::{Notifier, TelegramClient, Update};

const POLL_TIMEOUT: Duration = Duration::from_secs(25);
const POLL_RETRY_DELAY: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Start,
}

impl Command {
    /// Recognizes `/start` and `/start@botname`, ignoring trailing arguments.
    pub fn parse(text: &str) -> Option<Self> {
        let word = text.split_whitespace().next()?;
        let name = word.strip_prefix('/')?;
        let name = name.split('@').next().unwrap_or(name);
        match name {
            "start" => Some(Command::Start),
            _ => None,
        }
    }
}

pub struct Bot {
    config: Arc<Config>,
    monitor: Monitor,
    telegram: Arc<TelegramClient>,
    notifier: Arc<dyn Notifier>,
}

impl Bot {
    pub fn new(
        config: Arc<Config>,
        monitor: Monitor,
        telegram: Arc<TelegramClient>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            config,
            monitor,
            telegram,
            notifier,
        }
    }

    pub fn from_config(config: Arc<Config>) -> Result<Self> {
        let telegram = Arc::new(TelegramClient::from_config(&config)?);
        let notifier: Arc<dyn Notifier> = telegram.clone();
        let monitor = Monitor::new(config.clone(), notifier.clone())?;
        Ok(Self::new(config, monitor, telegram, notifier))
    }

    /// Runs until `shutdown` resolves. The first check starts immediately.
    pub async fn run<F>(&self, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);

        let mut interval = time::interval(self.config.check_interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut offset = 0;

        info!(interval = ?self.config.check_interval, "Bot started");
        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    info!("Shutting down");
                    break;
                }
                _ = interval.tick() => {
                    self.run_check().await;
                }
                updates = self.telegram.get_updates(offset, POLL_TIMEOUT) => match updates {
                    Ok(updates) => {
                        for update in updates {
                            offset = offset.max(update.update_id + 1);
                            if let Err(e) = self.handle_update(&update).await {
                                self.report_error("handling an update", &e, Some(&update)).await;
                            }
                        }
                    }
                    Err(e) => {
                        warn!(error = %e, "Polling for updates failed");
                        time::sleep(POLL_RETRY_DELAY).await;
                    }
                },
            }
        }
    }

    /// One scheduled tick. Failures go to the administrators.
    pub async fn run_check(&self) -> Option<CheckOutcome> {
        match self.monitor.check_and_notify().await {
            Ok(outcome) => {
                debug!(?outcome, "Check finished");
                Some(outcome)
            }
            Err(e) => {
                self.report_error("checking for updates", &e, None).await;
                None
            }
        }
    }

    pub async fn handle_update(&self, update: &Update) -> Result<()> {
        let Some(message) = &update.message else {
            return Ok(());
        };
        let Some(command) = message.text.as_deref().and_then(Command::parse) else {
            return Ok(());
        };

        match command {
            Command::Start => {
                let chat_id = message.chat.id;
                info!(chat_id, "Start command");
                self.notifier
                    .send_message(&chat_id.to_string(), &messages::start_reply(chat_id))
                    .await
            }
        }
    }

    pub async fn report_error(&self, context: &str, err: &AppError, update: Option<&Update>) {
        error!(kind = err.kind(), error = %err, "Exception while {}", context);

        let text = messages::error_report(context, err, update);
        for chat_id in &self.config.admin_chat_ids {
            if let Err(e) = self.notifier.send_message(chat_id, &text).await {
                error!(chat_id = %chat_id, error = %e, "Failed to report error to admin");
            }
        }
    }
}
