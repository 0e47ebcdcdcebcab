//! Countdown Timer - A state-managed HTTP countdown timer
//!
//! This is the main entry point for the countdown-timer application.

use std::sync::Arc;
use anyhow::anyhow;
use tokio::net::TcpListener;
use tracing::info;

use countdown_timer::{
    api::create_router,
    config::Config,
    countdown::TokioScheduler,
    state::AppState,
    tasks::{countdown_dispatch_task, display_task},
    utils::shutdown_signal,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::parse();

    // Initialize tracing with appropriate log level
    tracing_subscriber::fmt()
        .with_env_filter(format!("countdown_timer={},tower_http=info", config.log_level()))
        .init();

    info!("Starting countdown-timer server v{}", env!("CARGO_PKG_VERSION"));
    info!("Configuration: host={}, port={}", config.host, config.port);

    let scheduler = TokioScheduler::try_new().map_err(|e| anyhow!(e))?;
    let (state, countdown_events) =
        AppState::new(config.port, config.host.clone(), Arc::new(scheduler));
    let state = Arc::new(state);

    if let Some(preset) = config.preset {
        state
            .apply_preset(preset.hour, preset.minute, preset.second)
            .map_err(|e| anyhow!(e))?;
    }

    // Scheduler events are applied to the session by a single task
    let dispatch_state = Arc::clone(&state);
    tokio::spawn(async move {
        countdown_dispatch_task(dispatch_state, countdown_events).await;
    });

    let display_state = Arc::clone(&state);
    tokio::spawn(async move {
        display_task(display_state).await;
    });

    let app = create_router(Arc::clone(&state));

    let addr = config.address();
    let listener = TcpListener::bind(&addr).await?;

    info!("Server running on http://{}", addr);
    info!("Endpoints:");
    info!("  POST /unit/:unit/increment - Add one hour/minute/second");
    info!("  POST /unit/:unit/decrement - Subtract one hour/minute/second");
    info!("  PUT  /unit/:unit           - Set hour/minute/second");
    info!("  POST /toggle               - Start or cancel the countdown");
    info!("  POST /start                - Start the countdown");
    info!("  POST /cancel               - Cancel the countdown");
    info!("  GET  /status               - Current timer and server status");
    info!("  GET  /health               - Health check");

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

    if let Err(e) = state.cancel() {
        tracing::error!("Failed to cancel countdown on shutdown: {}", e);
    }

    info!("Server shutdown complete");
    Ok(())
}
