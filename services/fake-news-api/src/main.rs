use anyhow::Result;
use newsguard_core::{init_tracing, load_config};
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    let cfg = load_config("fake-news-api")?;
    init_tracing(&cfg.service_name, &cfg.log_level, cfg.json_log)?;
    info!(?cfg, "config loaded");
    fake_news_api::run(cfg).await
}
