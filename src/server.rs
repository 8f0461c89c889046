use anyhow::{anyhow, Result};
use postbox::{lifecycle, Settings};

#[tokio::main]
async fn main() -> Result<()> {
    let cfg = Settings::new()?;
    let level: log::Level = cfg.log_level.parse().map_err(|e| anyhow!("{}: {}", e, cfg.log_level))?;
    simple_logger::init_with_level(level)?;
    log::info!("Config: {:?}", cfg);
    lifecycle::run(cfg).await
}
