// Persona Arena - Main Entry Point

use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{error, info, Level};

use persona_arena::app_state::{AppState, SharedState};
use persona_arena::config::{AppConfig, EconomyConfig};
use persona_arena::routes::router;

#[tokio::main]
async fn main() {
    let config = match AppConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("configuration error: {}", e);
            std::process::exit(1);
        }
    };

    let level = config.log_level.parse::<Level>().unwrap_or(Level::INFO);
    tracing_subscriber::fmt().with_max_level(level).with_target(false).init();

    if let Err(e) = run(config).await {
        error!(error = %e, kind = ?e.kind(), "persona arena stopped");
        std::process::exit(1);
    }
}

async fn run(config: AppConfig) -> persona_arena::ArenaResult<()> {
    let economy = EconomyConfig::load(config.economy_config_path.as_deref())?;
    let state: SharedState = Arc::new(AppState::from_config(&config, economy).await?);

    // Clone state for shutdown handler before moving into router
    let shutdown_state = state.clone();
    let app = router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| persona_arena::ArenaError::config(format!("bind {}: {}", addr, e)))?;
    info!(%addr, "server running");

    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "failed to install Ctrl-C handler");
            return;
        }
        info!("shutdown signal received, saving state");
        if let Err(e) = shutdown_state.save_to_disk().await {
            error!(error = %e, "failed to save state");
        }
        std::process::exit(0);
    });

    axum::serve(listener, app)
        .await
        .map_err(|e| persona_arena::ArenaError::Storage(format!("server error: {}", e)))
}
