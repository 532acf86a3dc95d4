use occupancy_dashboard::{load_data, router, AppState, Config};
use std::net::SocketAddr;
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("info".parse()?))
        .init();

    let config = Config::from_env();
    let (session, uploads) = load_data(&config.data_dir).await.into_parts();
    info!(
        data_dir = %config.data_dir.display(),
        groups = session.groups.groups().len(),
        bed_records = session.beds.len(),
        uploads = uploads.len(),
        "reference data loaded"
    );

    let state = AppState::new(session, uploads, config.selection_limit);
    let app = router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    info!("listening on http://{addr}");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_ok() {
        info!("shutting down");
    }
}
