use reqwest::header::COOKIE;
use reqwest::{Client, ClientBuilder, Url};
use scraper::{Html, Selector};
use std::time::Duration;
use once_cell::sync::Lazy;
use tracing::debug;
use crate::config::Config;
use crate::error::{AppError, Result};
use crate::session::CookieSet;

// Only rendered for a signed-in session; guests are silently served a login view
static LOGOUT_SELECTOR: Lazy<Selector> = Lazy::new(|| {
    Selector::parse("div.logout-button").expect("Failed to parse logout selector")
});

/// Client for the target site. The site's certificate is not validated.
pub fn build_site_client(timeout: Duration) -> Result<Client> {
    ClientBuilder::new()
        .danger_accept_invalid_certs(true)
        .timeout(timeout)
        .connect_timeout(Duration::from_secs(10))
        .build()
        .map_err(|e| AppError::Config(format!("Failed to build HTTP client: {}", e)))
}

/// Fetches a page body. Client errors (4xx) still return their body, since the
/// site answers an expired session with a login view under such a status.
pub async fn fetch_html(client: &Client, url: Url, cookies: Option<&CookieSet>) -> Result<String> {
    let mut request = client.get(url);
    if let Some(cookies) = cookies.filter(|c| !c.is_empty()) {
        request = request.header(COOKIE, cookies.to_header());
    }
    let response = request.send().await?;
    let status = response.status();
    if !status.is_success() && !status.is_client_error() {
        return Err(AppError::Fetch(format!(
            "{} answered with {}",
            response.url(),
            status
        )));
    }
    if status.is_client_error() {
        debug!(%status, "Client error status, checking the page body");
    }
    let html = response.text().await?;
    Ok(html)
}

pub fn is_logged_in(html: &str) -> bool {
    let document = Html::parse_document(html);
    document.select(&LOGOUT_SELECTOR).next().is_some()
}

#[derive(Debug, Clone)]
pub struct FetchedPage {
    pub html: String,
    pub authenticated: bool,
}

pub struct PageFetcher {
    client: Client,
    news_url: Url,
}

impl PageFetcher {
    pub fn new(client: Client, news_url: Url) -> Self {
        Self { client, news_url }
    }

    pub fn from_config(client: Client, config: &Config) -> Self {
        Self::new(client, config.news_url.clone())
    }

    pub async fn fetch(&self, cookies: &CookieSet) -> Result<FetchedPage> {
        let html = fetch_html(&self.client, self.news_url.clone(), Some(cookies)).await?;
        let authenticated = is_logged_in(&html);
        debug!(url = %self.news_url, authenticated, bytes = html.len(), "News page fetched");
        Ok(FetchedPage { html, authenticated })
    }
}
