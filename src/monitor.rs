//! One check of the news page per tick: keep a live session, extract the
//! newest entry and notify users once per distinct entry.

use std::sync::Arc;
use tracing::{debug, error, info, warn};
use crate::auth::Authenticator;
use crate::config::Config;
use crate::entry::{EntryRecord, EntryStore};
use crate::error::{AppError, Result};
use crate::extractor::extract_entry;
use crate::messages;
use crate::scraper::{build_site_client, FetchedPage, PageFetcher};
use crate::session::{CookieSet, SessionStore};
use crate::telegram::Notifier;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckOutcome {
    /// Nothing was stored yet; users were notified.
    FirstEntry,
    /// The entry differs from the stored one; users were notified.
    Changed,
    Unchanged,
}

pub fn classify(previous: Option<&EntryRecord>, current: &EntryRecord) -> CheckOutcome {
    match previous {
        None => CheckOutcome::FirstEntry,
        Some(previous) if previous == current => CheckOutcome::Unchanged,
        Some(_) => CheckOutcome::Changed,
    }
}

pub struct Monitor {
    config: Arc<Config>,
    sessions: SessionStore,
    entries: EntryStore,
    auth: Authenticator,
    fetcher: PageFetcher,
    notifier: Arc<dyn Notifier>,
}

impl Monitor {
    pub fn new(config: Arc<Config>, notifier: Arc<dyn Notifier>) -> Result<Self> {
        let client = build_site_client(config.http_timeout)?;
        Ok(Self {
            sessions: SessionStore::new(&config.cookie_file, config.cookie_lifetime),
            entries: EntryStore::new(&config.entry_file),
            auth: Authenticator::from_config(&config),
            fetcher: PageFetcher::from_config(client, &config),
            notifier,
            config,
        })
    }

    pub async fn check_and_notify(&self) -> Result<CheckOutcome> {
        let page = self.fetch_news().await?;
        let current = extract_entry(&page.html)?;
        let previous = self.entries.load()?;

        let outcome = classify(previous.as_ref(), &current);
        if outcome == CheckOutcome::Unchanged {
            debug!(entry_id = %current.entry_id, "No new entries");
            return Ok(outcome);
        }

        // Stored first, so a delivery failure cannot cause a repeat next tick
        self.entries.save(&current)?;
        self.notify_users(&current).await?;
        Ok(outcome)
    }

    /// Fetches the news page, logging in again once if the session was rejected.
    async fn fetch_news(&self) -> Result<FetchedPage> {
        let cookies = self.session(false).await?;
        let page = self.fetcher.fetch(&cookies).await?;
        if page.authenticated {
            return Ok(page);
        }

        warn!("Session stale, forcing a new login");
        let cookies = self.session(true).await?;
        let page = self.fetcher.fetch(&cookies).await?;
        if !page.authenticated {
            return Err(AppError::Auth(
                "News page is still anonymous after a fresh login".to_string(),
            ));
        }
        Ok(page)
    }

    async fn session(&self, forced: bool) -> Result<CookieSet> {
        if !forced && self.sessions.is_fresh()? {
            if let Some(cookies) = self.sessions.load()? {
                debug!("Cookie file is OK");
                return Ok(cookies);
            }
        }

        let cookies = self.auth.login(&self.config.username, &self.config.password).await?;
        self.sessions.save(&cookies)?;
        if forced {
            debug!("Session updated (forced)");
        } else {
            debug!("Session updated");
        }
        Ok(cookies)
    }

    async fn notify_users(&self, entry: &EntryRecord) -> Result<()> {
        let text = messages::entry_notification(entry, &self.config.news_url);
        info!(
            entry_id = %entry.entry_id,
            date = %entry.entry_date,
            recipients = self.config.user_chat_ids.len(),
            "Sending notifications"
        );

        let mut first_error = None;
        for chat_id in &self.config.user_chat_ids {
            if let Err(e) = self.notifier.send_message(chat_id, &text).await {
                error!(chat_id = %chat_id, error = %e, "Failed to notify user");
                first_error.get_or_insert(e);
            }
        }
        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}
