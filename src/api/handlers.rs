//! HTTP endpoint handlers

use std::sync::Arc;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Json,
};
use tracing::{error, info, warn};

use crate::state::{AppState, TimeUnit, ToggleOutcome};
use super::responses::{ApiResponse, HealthResponse, SetUnitRequest, StatusResponse};

fn parse_unit(raw: &str) -> Result<TimeUnit, StatusCode> {
    raw.parse().map_err(|e| {
        warn!("{}", e);
        StatusCode::BAD_REQUEST
    })
}

/// Handle POST /unit/:unit/increment
pub async fn increment_handler(
    State(state): State<Arc<AppState>>,
    Path(unit): Path<String>,
) -> Result<Json<ApiResponse>, StatusCode> {
    let unit = parse_unit(&unit)?;
    match state.increment(unit) {
        Ok((applied, timer)) => {
            info!("Increment {} endpoint called - applied={}", unit, applied);
            Ok(Json(ApiResponse::from_outcome(
                applied,
                format!("Increment {}", unit),
                timer,
            )))
        }
        Err(e) => {
            error!("Failed to increment {}: {}", unit, e);
            Err(StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}

/// Handle POST /unit/:unit/decrement
pub async fn decrement_handler(
    State(state): State<Arc<AppState>>,
    Path(unit): Path<String>,
) -> Result<Json<ApiResponse>, StatusCode> {
    let unit = parse_unit(&unit)?;
    match state.decrement(unit) {
        Ok((applied, timer)) => {
            info!("Decrement {} endpoint called - applied={}", unit, applied);
            Ok(Json(ApiResponse::from_outcome(
                applied,
                format!("Decrement {}", unit),
                timer,
            )))
        }
        Err(e) => {
            error!("Failed to decrement {}: {}", unit, e);
            Err(StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}

/// Handle PUT /unit/:unit - Set a unit to an explicit value
pub async fn set_unit_handler(
    State(state): State<Arc<AppState>>,
    Path(unit): Path<String>,
    Json(request): Json<SetUnitRequest>,
) -> Result<Json<ApiResponse>, StatusCode> {
    let unit = parse_unit(&unit)?;
    match state.set_unit(unit, request.value) {
        Ok((applied, timer)) => {
            info!("Set {} endpoint called - value={}, applied={}", unit, request.value, applied);
            Ok(Json(ApiResponse::from_outcome(
                applied,
                format!("Set {} to {}", unit, request.value),
                timer,
            )))
        }
        Err(e) => {
            error!("Failed to set {}: {}", unit, e);
            Err(StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}

/// Handle POST /toggle - Start when stopped, cancel when running
pub async fn toggle_handler(
    State(state): State<Arc<AppState>>,
) -> Result<Json<ApiResponse>, StatusCode> {
    match state.toggle() {
        Ok((outcome, timer)) => {
            info!("Toggle endpoint called - {:?}", outcome);
            let response = match outcome {
                ToggleOutcome::Started => {
                    ApiResponse::applied("Countdown started".to_string(), timer)
                }
                ToggleOutcome::Cancelled => {
                    ApiResponse::applied("Countdown cancelled".to_string(), timer)
                }
                ToggleOutcome::Ignored => {
                    ApiResponse::ignored("Countdown needs at least one second".to_string(), timer)
                }
            };
            Ok(Json(response))
        }
        Err(e) => {
            error!("Failed to toggle countdown: {}", e);
            Err(StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}

/// Handle POST /start
pub async fn start_handler(
    State(state): State<Arc<AppState>>,
) -> Result<Json<ApiResponse>, StatusCode> {
    match state.start() {
        Ok((applied, timer)) => {
            info!("Start endpoint called - applied={}", applied);
            Ok(Json(ApiResponse::from_outcome(applied, "Start countdown".to_string(), timer)))
        }
        Err(e) => {
            error!("Failed to start countdown: {}", e);
            Err(StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}

/// Handle POST /cancel
pub async fn cancel_handler(
    State(state): State<Arc<AppState>>,
) -> Result<Json<ApiResponse>, StatusCode> {
    match state.cancel() {
        Ok((applied, timer)) => {
            info!("Cancel endpoint called - applied={}", applied);
            Ok(Json(ApiResponse::from_outcome(applied, "Cancel countdown".to_string(), timer)))
        }
        Err(e) => {
            error!("Failed to cancel countdown: {}", e);
            Err(StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}

/// Handle GET /status - Return the timer and server status
pub async fn status_handler(
    State(state): State<Arc<AppState>>,
) -> Result<Json<StatusResponse>, StatusCode> {
    let (timer, remaining_seconds) = match state.status_view() {
        Ok(view) => view,
        Err(e) => {
            error!("Failed to get timer state: {}", e);
            return Err(StatusCode::INTERNAL_SERVER_ERROR);
        }
    };

    let (last_action, last_action_time) = state.get_last_action();

    Ok(Json(StatusResponse {
        display: timer.display_text(),
        total_millis: timer.total_millis(),
        timer,
        remaining_seconds,
        uptime: state.get_uptime(),
        port: state.port,
        host: state.host.clone(),
        last_action,
        last_action_time,
    }))
}

/// Handle GET /health - Health check endpoint
pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse::ok())
}
