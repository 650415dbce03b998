use qpmatrix::config::{ConfigError, ServerConfig};
use qpmatrix::routes;

#[derive(Debug, thiserror::Error)]
enum StartupError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("server io failed: {0}")]
    Io(#[from] std::io::Error),
}

#[tokio::main]
async fn main() -> Result<(), StartupError> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt::init();

    let config = ServerConfig::from_env();
    let addr = config.socket_addr().inspect_err(|e| tracing::error!(error = %e, "invalid server config"))?;

    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, "qpmatrix listening");
    axum::serve(listener, routes::app()).await?;
    Ok(())
}
