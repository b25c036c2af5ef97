use riskcheck_server::{RiskServer, ServerConfig, ServerError};
use tracing_subscriber::EnvFilter;

fn main() -> Result<(), ServerError> {
    // stdout carries protocol frames in stdio mode
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let config = ServerConfig::from_env()?;
    tracing::info!(
        transport = ?config.transport,
        memo_capacity = config.memo_capacity,
        "starting riskcheckd"
    );
    RiskServer::new(&config).serve(&config)
}
