use deployment_utils::setup_logging;
use deployment_webserver::{run_server, ServiceConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    setup_logging()?;
    let config = ServiceConfig::from_env()?;
    run_server(config).await
}
