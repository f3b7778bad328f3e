use std::net::SocketAddr;

use tracing_subscriber::EnvFilter;

use oncoboard::api::build_router;
use oncoboard::config::{Settings, APP_NAME, APP_VERSION};
use oncoboard::runtime::Runtime;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let settings = Settings::from_env();
    tracing::info!(
        version = APP_VERSION,
        host = %settings.host,
        port = settings.port,
        "{APP_NAME} starting"
    );

    let addr: SocketAddr = format!("{}:{}", settings.host, settings.port).parse()?;
    let runtime = Runtime::new(settings)?;
    let router = build_router(runtime);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, "Listening");
    axum::serve(listener, router).await?;
    Ok(())
}
