use std::net::SocketAddr;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use forum::config::{Cli, Config};
use forum::state::AppState;
use forum::{db, tls};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // Parse CLI args and load config
    let cli = Cli::parse();
    let data_dir = Config::data_dir(&cli);
    std::fs::create_dir_all(&data_dir)?;
    tracing::info!("Data directory: {}", data_dir.display());

    let config = Config::load(&cli)?;
    std::fs::create_dir_all(config.uploads_path())?;

    // Initialize database
    let pool = db::create_pool(&config.db_path())?;
    db::run_migrations(&pool)?;

    if !config.google.is_configured() {
        tracing::warn!("Google login is not configured");
    }
    if !config.github.is_configured() {
        tracing::warn!("GitHub login is not configured");
    }

    let state = AppState::new(pool, config.clone())?;
    let app = forum::app(state).into_make_service_with_connect_info::<SocketAddr>();

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;

    if config.tls.enabled {
        let paths = tls::ensure_certs(&data_dir)?;
        let rustls = tls::load_rustls_config(&paths).await?;

        if config.tls.http_port != 0 {
            let http_addr: SocketAddr =
                format!("{}:{}", config.server.host, config.tls.http_port).parse()?;
            let redirector = tls::https_redirector(config.server.port);
            let listener = tokio::net::TcpListener::bind(http_addr).await?;
            tracing::info!("Redirecting http://{} to HTTPS", http_addr);
            tokio::spawn(async move {
                if let Err(e) = axum::serve(listener, redirector).await {
                    tracing::error!("HTTP redirect listener failed: {}", e);
                }
            });
        }

        tracing::info!("Listening on https://{}", addr);
        axum_server::bind_rustls(addr, rustls).serve(app).await?;
    } else {
        tracing::info!("Listening on http://{}", addr);
        let listener = tokio::net::TcpListener::bind(addr).await?;
        axum::serve(listener, app).await?;
    }

    Ok(())
}
