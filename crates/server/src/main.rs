use std::sync::Arc;

use anyhow::Context;
use hlsladder_server::config::ServerConfig;
use hlsladder_server::state::AppState;
use hlsladder_transcoder::orchestrator::JobOrchestrator;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let config = ServerConfig::from_env().context("failed to load configuration")?;

    tokio::fs::create_dir_all(&config.upload_dir)
        .await
        .context("failed to create upload dir")?;
    tokio::fs::create_dir_all(&config.transcoder.output_root)
        .await
        .context("failed to create output dir")?;

    info!(
        upload_dir = %config.upload_dir.display(),
        output_dir = %config.transcoder.output_root.display(),
        base_url = %config.transcoder.base_url,
        ladder = ?config.transcoder.ladder.iter().map(|r| r.label.as_str()).collect::<Vec<_>>(),
        "transcoder configured"
    );

    let state = AppState {
        orchestrator: Arc::new(JobOrchestrator::with_ffmpeg(config.transcoder)),
        upload_dir: config.upload_dir,
    };

    let app = hlsladder_server::routes::build_router(state);

    let listener = tokio::net::TcpListener::bind(&config.bind)
        .await
        .context("failed to bind")?;
    info!(addr = %config.bind, "server listening");

    axum::serve(listener, app).await?;
    Ok(())
}
