use moneymind::config::{BackendMode, Config};
use moneymind::server::{build_app, serve};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "moneymind=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    if let Err(e) = run().await {
        tracing::error!("{}", e);
        std::process::exit(1);
    }
}

async fn run() -> moneymind::error::AppResult<()> {
    let config = Config::from_env()?;
    tracing::info!("Starting MoneyMind {} on {}", moneymind::VERSION, config.address());
    if config.backend == BackendMode::Memory {
        tracing::warn!("Using the in-memory backend; all data is lost on restart");
    }

    let (host, port) = (config.host.clone(), config.port);
    let (_state, app) = build_app(config)?;
    let (port, handle) = serve(app, &host, port).await?;
    tracing::info!("Listening on http://{}:{}", host, port);

    handle
        .await
        .map_err(|e| moneymind::error::AppError::Internal(format!("Server task failed: {}", e)))
}
