use anyhow::Context;
use pricebatch::{Config, Engine};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::from_env();
    pricebatch::init_tracing_with_config(&config);

    let engine = Engine::new(config).context("failed to initialize engine")?;
    engine.serve().await.context("server exited with error")?;

    Ok(())
}
