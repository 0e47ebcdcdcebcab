//! Display background task: renders timer changes to the log

use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;
use tracing::{info, warn};

use crate::state::{AppState, StateChange};

/// Background task that renders the timer whenever it changes.
///
/// A tick writes all three fields, so rendering only happens when the
/// displayed text or the label actually differs from the last render.
pub async fn display_task(state: Arc<AppState>) {
    info!("Starting display task");

    let mut updates = state.state_change_tx.subscribe();
    let mut last_rendered: Option<String> = None;

    loop {
        match updates.recv().await {
            Ok(update) => match update.change {
                StateChange::Label(label) => {
                    info!("[{}] {}", label.as_str(), update.timer.display_text());
                }
                StateChange::Running(_) => {}
                StateChange::Unit { .. } => {
                    let text = update.timer.display_text();
                    if last_rendered.as_deref() != Some(text.as_str()) {
                        info!("{}", text);
                        last_rendered = Some(text);
                    }
                }
            },
            Err(RecvError::Lagged(skipped)) => {
                warn!("Display fell behind, skipped {} updates", skipped);
            }
            Err(RecvError::Closed) => {
                info!("Timer update channel closed, display task exiting");
                break;
            }
        }
    }
}
