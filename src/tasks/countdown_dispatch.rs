//! Countdown dispatch background task

use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, error, info};

use crate::{countdown::CountdownEvent, state::AppState};

/// Background task that delivers scheduler events into the session, one at
/// a time, in the order they fired
pub async fn countdown_dispatch_task(
    state: Arc<AppState>,
    mut events: mpsc::UnboundedReceiver<CountdownEvent>,
) {
    info!("Starting countdown dispatch task");

    while let Some(event) = events.recv().await {
        match state.apply_countdown_event(event) {
            Ok(true) => {}
            Ok(false) => debug!("Countdown event {:?} was stale", event),
            Err(e) => error!("Failed to apply countdown event: {}", e),
        }
    }

    info!("Countdown event channel closed, dispatch task exiting");
}
