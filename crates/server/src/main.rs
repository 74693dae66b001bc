use anyhow::Context;
use expensa_server::{init_tracing, router, AppState, ServerConfig};
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let config = ServerConfig::load().context("loading configuration")?;

    tokio::fs::create_dir_all(&config.uploads_dir)
        .await
        .with_context(|| format!("creating uploads dir {}", config.uploads_dir.display()))?;
    let pool = expensa_storage::create_db(&config.database_path)
        .await
        .with_context(|| format!("opening database {}", config.database_path.display()))?;

    let state = AppState::new(pool, &config);
    let app = router(state, config.max_upload_bytes);

    let listener = tokio::net::TcpListener::bind(&config.bind)
        .await
        .with_context(|| format!("binding {}", config.bind))?;
    info!(addr = %config.bind, "expensa server listening");
    axum::serve(listener, app).await?;

    Ok(())
}
