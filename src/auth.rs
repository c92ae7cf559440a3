//! Form-based login against the target site.
//!
//! The login page carries a single form; its fields are posted back with the
//! credentials filled in, and whatever cookies the site set during the
//! exchange become the new session.

use std::sync::Arc;
use std::time::Duration;
use once_cell::sync::Lazy;
use reqwest::cookie::{CookieStore, Jar};
use reqwest::{Client, ClientBuilder, Method, Response, Url};
use scraper::{ElementRef, Html, Selector};
use tracing::{debug, info};
use crate::config::Config;
use crate::error::{AppError, Result};
use crate::session::CookieSet;

static FORM_SELECTOR: Lazy<Selector> = Lazy::new(|| {
    Selector::parse("form").expect("Failed to parse form selector")
});

static INPUT_SELECTOR: Lazy<Selector> = Lazy::new(|| {
    Selector::parse("input[name]").expect("Failed to parse input selector")
});

const USERNAME_FIELD: &str = "username";
const PASSWORD_FIELD: &str = "password";

/// The login form as found on the page, ready to be submitted.
#[derive(Debug, Clone, PartialEq)]
pub struct LoginForm {
    pub action: Url,
    pub method: Method,
    pub fields: Vec<(String, String)>,
}

impl LoginForm {
    /// Sets a field, replacing an existing value or appending a new one.
    pub fn set(&mut self, name: &str, value: &str) {
        match self.fields.iter_mut().find(|(n, _)| n == name) {
            Some((_, v)) => *v = value.to_string(),
            None => self.fields.push((name.to_string(), value.to_string())),
        }
    }
}

/// Locates the first form on the page and collects its submittable inputs.
pub fn parse_login_form(html: &str, page_url: &Url) -> Result<LoginForm> {
    let document = Html::parse_document(html);
    let form = document
        .select(&FORM_SELECTOR)
        .next()
        .ok_or_else(|| AppError::Auth("No login form on the login page".to_string()))?;

    let action = match form.value().attr("action").map(str::trim) {
        Some(action) if !action.is_empty() => page_url
            .join(action)
            .map_err(|e| AppError::Auth(format!("Invalid form action {:?}: {}", action, e)))?,
        _ => page_url.clone(),
    };

    let method = match form.value().attr("method") {
        Some(m) if m.eq_ignore_ascii_case("post") => Method::POST,
        _ => Method::GET,
    };

    let fields = form
        .select(&INPUT_SELECTOR)
        .filter(|input| is_submittable(input))
        .filter_map(|input| {
            let name = input.value().attr("name")?;
            let value = input.value().attr("value").unwrap_or_default();
            Some((name.to_string(), value.to_string()))
        })
        .collect();

    Ok(LoginForm { action, method, fields })
}

fn is_submittable(input: &ElementRef) -> bool {
    let kind = input.value().attr("type").unwrap_or("text").to_ascii_lowercase();
    match kind.as_str() {
        "submit" | "button" | "image" | "reset" | "file" => false,
        "checkbox" | "radio" => input.value().attr("checked").is_some(),
        _ => true,
    }
}

pub struct Authenticator {
    login_url: Url,
    base_url: Url,
    timeout: Duration,
}

impl Authenticator {
    pub fn new(login_url: Url, base_url: Url, timeout: Duration) -> Self {
        Self {
            login_url,
            base_url,
            timeout,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.login_url.clone(), config.base_url.clone(), config.http_timeout)
    }

    pub async fn login(&self, username: &str, password: &str) -> Result<CookieSet> {
        // A fresh jar per login, so the new set never inherits stale cookies
        let jar = Arc::new(Jar::default());
        let client = self.client(jar.clone())?;

        let mut cookies = CookieSet::new();

        let login_page = client
            .get(self.login_url.clone())
            .send()
            .await?
            .error_for_status()?;
        collect_set_cookies(&mut cookies, &login_page);
        let page = login_page.text().await?;

        let mut form = parse_login_form(&page, &self.login_url)?;
        form.set(USERNAME_FIELD, username);
        form.set(PASSWORD_FIELD, password);
        debug!(action = %form.action, method = %form.method, "Submitting login form");

        let request = if form.method == Method::POST {
            client.post(form.action.clone()).form(&form.fields)
        } else {
            client.get(form.action.clone()).query(&form.fields)
        };
        let response = request.send().await?.error_for_status()?;

        // The jar only answers per URL, so ask it for every page the flow
        // touched, over https too so Secure cookies are not filtered out
        let visited = [&self.base_url, &self.login_url, &form.action, response.url()];
        for url in visited {
            for candidate in [url.clone(), with_https(url)] {
                if let Some(header) = jar.cookies(&candidate) {
                    if let Ok(header) = header.to_str() {
                        cookies.merge(CookieSet::from_header(header));
                    }
                }
            }
        }
        collect_set_cookies(&mut cookies, &response);

        if cookies.is_empty() {
            return Err(AppError::Auth("Login did not set any session cookies".to_string()));
        }

        info!(count = cookies.len(), "Logged in to the site");
        Ok(cookies)
    }

    fn client(&self, jar: Arc<Jar>) -> Result<Client> {
        ClientBuilder::new()
            .cookie_provider(jar)
            .danger_accept_invalid_certs(true)
            .timeout(self.timeout)
            .build()
            .map_err(|e| AppError::Config(format!("Failed to build HTTP client: {}", e)))
    }
}

fn collect_set_cookies(cookies: &mut CookieSet, response: &Response) {
    for cookie in response.cookies() {
        cookies.insert(cookie.name(), cookie.value());
    }
}

fn with_https(url: &Url) -> Url {
    let mut secure = url.clone();
    if secure.scheme() == "http" {
        let _ = secure.set_scheme("https");
    }
    secure
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_string_contains, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const LOGIN_PAGE: &str = r#"
        <html><body>
          <form method="post" action="/auth.php">
            <input type="hidden" name="csrf" value="tok">
            <input type="text" name="username">
            <input type="password" name="password">
            <input type="checkbox" name="remember">
            <input type="submit" name="go" value="Войти">
          </form>
        </body></html>"#;

    fn page_url() -> Url {
        Url::parse("http://lk.example/login.html").unwrap()
    }

    #[test]
    fn parses_form_fields_and_action() {
        let form = parse_login_form(LOGIN_PAGE, &page_url()).unwrap();
        assert_eq!(form.action.as_str(), "http://lk.example/auth.php");
        assert_eq!(form.method, Method::POST);
        assert_eq!(
            form.fields,
            vec![
                ("csrf".to_string(), "tok".to_string()),
                ("username".to_string(), String::new()),
                ("password".to_string(), String::new()),
            ]
        );
    }

    #[test]
    fn missing_action_posts_back_to_page() {
        let form = parse_login_form("<form><input name='username'></form>", &page_url()).unwrap();
        assert_eq!(form.action, page_url());
        assert_eq!(form.method, Method::GET);
    }

    #[test]
    fn missing_form_is_auth_error() {
        let err = parse_login_form("<html><body>maintenance</body></html>", &page_url()).unwrap_err();
        assert!(matches!(err, AppError::Auth(_)));
    }

    #[test]
    fn set_overrides_or_appends() {
        let mut form = parse_login_form(LOGIN_PAGE, &page_url()).unwrap();
        form.set("username", "director");
        form.set("extra", "1");
        assert!(form.fields.contains(&("username".to_string(), "director".to_string())));
        assert_eq!(form.fields.last().unwrap().0, "extra");
    }

    #[tokio::test]
    async fn login_captures_session_cookies() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/login.html"))
            .respond_with(ResponseTemplate::new(200).set_body_string(LOGIN_PAGE))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/auth.php"))
            .and(body_string_contains("username=director"))
            .and(body_string_contains("password=secret"))
            .and(body_string_contains("csrf=tok"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("set-cookie", "PHPSESSID=fresh; Path=/")
                    .set_body_string("ok"),
            )
            .expect(1)
            .mount(&server)
            .await;

        let base = Url::parse(&format!("{}/", server.uri())).unwrap();
        let auth = Authenticator::new(base.join("login.html").unwrap(), base, Duration::from_secs(5));
        let cookies = auth.login("director", "secret").await.unwrap();
        assert_eq!(cookies.get("PHPSESSID"), Some("fresh"));
    }

    #[tokio::test]
    async fn login_keeps_secure_and_path_scoped_cookies() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/login.html"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("set-cookie", "visit=1; Path=/")
                    .set_body_string(LOGIN_PAGE),
            )
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/auth.php"))
            .respond_with(
                ResponseTemplate::new(200)
                    .append_header("set-cookie", "PHPSESSID=fresh; Path=/")
                    .append_header("set-cookie", "sid=7; Path=/cabinet/deep")
                    .append_header("set-cookie", "token=s3; Secure; Path=/"),
            )
            .mount(&server)
            .await;

        let base = Url::parse(&format!("{}/", server.uri())).unwrap();
        let auth = Authenticator::new(base.join("login.html").unwrap(), base, Duration::from_secs(5));
        let cookies = auth.login("director", "secret").await.unwrap();

        assert_eq!(cookies.get("PHPSESSID"), Some("fresh"));
        assert_eq!(cookies.get("sid"), Some("7"));
        assert_eq!(cookies.get("token"), Some("s3"));
        assert_eq!(cookies.get("visit"), Some("1"));
    }

    #[test]
    fn https_variant_keeps_host_and_path() {
        let url = Url::parse("http://lk.example:8080/cabinet/").unwrap();
        assert_eq!(with_https(&url).as_str(), "https://lk.example:8080/cabinet/");
    }

    #[tokio::test]
    async fn login_without_cookies_fails() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/login.html"))
            .respond_with(ResponseTemplate::new(200).set_body_string(LOGIN_PAGE))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/auth.php"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        let base = Url::parse(&format!("{}/", server.uri())).unwrap();
        let auth = Authenticator::new(base.join("login.html").unwrap(), base, Duration::from_secs(5));
        let err = auth.login("director", "wrong").await.unwrap_err();
        assert!(matches!(err, AppError::Auth(_)));
    }
}
