use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::{fmt, EnvFilter};
use lk_news_notifier::{Bot, Config};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("lk_news_notifier=info"));
    fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(filter)
        .init();

    // Load configuration
    let config = Config::load().inspect_err(|e| error!("{}", e))?;
    info!(
        site = %config.base_url,
        users = config.user_chat_ids.len(),
        admins = config.admin_chat_ids.len(),
        "Configuration loaded"
    );

    let bot = Bot::from_config(Arc::new(config))?;
    bot.run(async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    })
    .await;

    Ok(())
}
