//! StudySmart - A local study tracker daemon
//!
//! This is the main entry point for the study-smart application.

use std::sync::Arc;

use tokio::net::TcpListener;
use tracing::{info, warn};

use study_smart::{
    api::create_router,
    config::Config,
    services::LogPresenter,
    state::{AppState, TimerState},
    storage::Database,
    tasks::SessionRunner,
    utils::shutdown_signal,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::parse();

    // Initialize tracing with appropriate log level
    tracing_subscriber::fmt()
        .with_env_filter(format!(
            "study_smart={},tower_http=info",
            config.log_level()
        ))
        .init();

    info!("Starting study-smart v{}", env!("CARGO_PKG_VERSION"));
    info!(
        "Configuration: host={}, port={}, database={}, min_session={}s",
        config.host,
        config.port,
        config.database.display(),
        config.min_session_secs
    );

    let db = Arc::new(Database::open(&config.database)?);

    // The runner owns the live timer for the whole process lifetime
    let timer = SessionRunner::new(db.clone(), Arc::new(LogPresenter::default()))
        .with_min_session_secs(config.min_session_secs)
        .spawn();

    let state = Arc::new(AppState::new(
        db,
        timer.clone(),
        config.port,
        config.host.clone(),
    ));

    // Create HTTP router with all endpoints
    let app = create_router(state);

    // Bind to the specified address
    let addr = config.address();
    let listener = TcpListener::bind(&addr).await?;

    info!("Server running on http://{}", addr);
    info!("Endpoints:");
    info!("  GET  /timer                          - Current timer");
    info!("  POST /timer/{{start,stop,cancel,finish}} - Drive the study session");
    info!("  GET  /dashboard                      - Totals and recent activity");
    info!("  *    /subjects, /tasks, /sessions    - Manage study data");
    info!("  GET  /status                         - Timer, notices and uptime");
    info!("  GET  /health                         - Health check");

    // Setup graceful shutdown
    let server = axum::serve(listener, app);

    tokio::select! {
        result = server => {
            if let Err(e) = result {
                tracing::error!("Server error: {}", e);
            }
        }
        _ = shutdown_signal() => {
            info!("Shutdown signal received");
        }
    }

    let snapshot = timer.snapshot();
    if snapshot.state != TimerState::Idle {
        warn!(
            "Shutting down with an unfinished session ({}s); it will not be saved",
            snapshot.elapsed_seconds
        );
    }

    info!("Server shutdown complete");
    Ok(())
}
