use std::env;
use std::path::PathBuf;
use std::time::Duration;
use reqwest::Url;
use crate::error::{AppError, Result};

const DEFAULT_BASE_URL: &str = "http://lk.educom.ru/";
const DEFAULT_LOGIN_PATH: &str = "login.html";
const DEFAULT_NEWS_PATH: &str = "news.html";
const DEFAULT_TELEGRAM_API_URL: &str = "https://api.telegram.org";

#[derive(Debug, Clone)]
pub struct Config {
    pub username: String,
    pub password: String,
    pub bot_token: String,
    pub user_chat_ids: Vec<String>,
    pub admin_chat_ids: Vec<String>,
    pub proxy_url: Option<String>,
    pub base_url: Url,
    pub login_url: Url,
    pub news_url: Url,
    pub telegram_api_url: String,
    pub cookie_file: PathBuf,
    pub entry_file: PathBuf,
    pub cookie_lifetime: Duration,
    pub check_interval: Duration,
    pub http_timeout: Duration,
}

impl Config {
    pub fn load() -> Result<Self> {
        // Load environment variables from .env file if it exists
        dotenv::dotenv().ok();

        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |key: &str| {
            lookup(key)
                .filter(|v| !v.trim().is_empty())
                .ok_or_else(|| AppError::Config(format!("{} is not set", key)))
        };
        let or_default = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());

        let username = required("LK_USERNAME")?;
        let password = required("LK_PASSWORD")?;
        let bot_token = required("BOT_TOKEN")?;
        let user_chat_ids = parse_chat_ids("BOT_USERS_CHAT_ID", &required("BOT_USERS_CHAT_ID")?)?;
        let admin_chat_ids = parse_chat_ids("BOT_ADMIN_CHAT_ID", &required("BOT_ADMIN_CHAT_ID")?)?;
        let proxy_url = lookup("PROXY_URL").filter(|v| !v.trim().is_empty());

        let base_url = Url::parse(&or_default("LK_BASE_URL", DEFAULT_BASE_URL))
            .map_err(|e| AppError::Config(format!("Invalid LK_BASE_URL: {}", e)))?;
        let login_url = base_url
            .join(&or_default("LK_LOGIN_PATH", DEFAULT_LOGIN_PATH))
            .map_err(|e| AppError::Config(format!("Invalid LK_LOGIN_PATH: {}", e)))?;
        let news_url = base_url
            .join(&or_default("LK_NEWS_PATH", DEFAULT_NEWS_PATH))
            .map_err(|e| AppError::Config(format!("Invalid LK_NEWS_PATH: {}", e)))?;

        let telegram_api_url = or_default("TELEGRAM_API_URL", DEFAULT_TELEGRAM_API_URL)
            .trim_end_matches('/')
            .to_string();

        let seconds = |key: &str, default: u64| -> Result<Duration> {
            let secs = match lookup(key) {
                Some(raw) => raw
                    .trim()
                    .parse::<u64>()
                    .map_err(|e| AppError::Config(format!("Invalid {}: {}", key, e)))?,
                None => default,
            };
            if secs == 0 {
                return Err(AppError::Config(format!("{} must be greater than zero", key)));
            }
            Ok(Duration::from_secs(secs))
        };

        Ok(Config {
            username,
            password,
            bot_token,
            user_chat_ids,
            admin_chat_ids,
            proxy_url,
            base_url,
            login_url,
            news_url,
            telegram_api_url,
            cookie_file: PathBuf::from(or_default("COOKIE_FILE", "cookies.json")),
            entry_file: PathBuf::from(or_default("ENTRY_FILE", "entry.json")),
            cookie_lifetime: seconds("COOKIE_LIFETIME_SECS", 30 * 60)?,
            check_interval: seconds("CHECK_INTERVAL_SECS", 30)?,
            http_timeout: seconds("HTTP_TIMEOUT_SECS", 30)?,
        })
    }
}

fn parse_chat_ids(key: &str, raw: &str) -> Result<Vec<String>> {
    let ids: Vec<String> = raw
        .split(',')
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .map(str::to_string)
        .collect();

    if ids.is_empty() {
        return Err(AppError::Config(format!("{} has no chat ids", key)));
    }
    Ok(ids)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn vars(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    fn minimal() -> HashMap<String, String> {
        vars(&[
            ("LK_USERNAME", "director"),
            ("LK_PASSWORD", "secret"),
            ("BOT_TOKEN", "123:abc"),
            ("BOT_USERS_CHAT_ID", "1, 2,,3"),
            ("BOT_ADMIN_CHAT_ID", "99"),
        ])
    }

    #[test]
    fn loads_defaults() {
        let env = minimal();
        let config = Config::from_lookup(|k| env.get(k).cloned()).unwrap();

        assert_eq!(config.user_chat_ids, vec!["1", "2", "3"]);
        assert_eq!(config.admin_chat_ids, vec!["99"]);
        assert_eq!(config.login_url.as_str(), "http://lk.educom.ru/login.html");
        assert_eq!(config.news_url.as_str(), "http://lk.educom.ru/news.html");
        assert_eq!(config.cookie_lifetime, Duration::from_secs(1800));
        assert_eq!(config.check_interval, Duration::from_secs(30));
        assert!(config.proxy_url.is_none());
    }

    #[test]
    fn missing_credentials_fail() {
        let mut env = minimal();
        env.remove("LK_PASSWORD");
        let err = Config::from_lookup(|k| env.get(k).cloned()).unwrap_err();
        assert!(err.to_string().contains("LK_PASSWORD"));
    }

    #[test]
    fn empty_recipient_list_fails() {
        let mut env = minimal();
        env.insert("BOT_ADMIN_CHAT_ID".into(), " , ".into());
        assert!(matches!(
            Config::from_lookup(|k| env.get(k).cloned()),
            Err(AppError::Config(_))
        ));
    }

    #[test]
    fn overrides_paths_and_intervals() {
        let mut env = minimal();
        env.insert("LK_BASE_URL".into(), "https://example.org/lk/".into());
        env.insert("CHECK_INTERVAL_SECS".into(), "5".into());
        env.insert("PROXY_URL".into(), "socks5://127.0.0.1:9050".into());
        let config = Config::from_lookup(|k| env.get(k).cloned()).unwrap();

        assert_eq!(config.news_url.as_str(), "https://example.org/lk/news.html");
        assert_eq!(config.check_interval, Duration::from_secs(5));
        assert_eq!(config.proxy_url.as_deref(), Some("socks5://127.0.0.1:9050"));
    }

    #[test]
    fn zero_durations_are_rejected() {
        for key in ["CHECK_INTERVAL_SECS", "HTTP_TIMEOUT_SECS", "COOKIE_LIFETIME_SECS"] {
            let mut env = minimal();
            env.insert(key.into(), "0".into());
            let err = Config::from_lookup(|k| env.get(k).cloned()).unwrap_err();
            assert!(matches!(err, AppError::Config(ref m) if m.contains(key)), "{}", key);
        }
    }

    #[test]
    fn bad_interval_is_rejected() {
        let mut env = minimal();
        env.insert("HTTP_TIMEOUT_SECS".into(), "soon".into());
        assert!(Config::from_lookup(|k| env.get(k).cloned()).is_err());
    }
}
