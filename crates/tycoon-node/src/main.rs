//! Tycoon node binary.

use tycoon_node::{config::NodeConfig, init_tracing, run_server};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();
    let config = NodeConfig::from_env()?;
    run_server(config).await
}
