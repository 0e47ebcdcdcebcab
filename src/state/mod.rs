//! State management module
//!
//! This module contains the observable timer fields and the session that
//! owns them together with the countdown controller.

pub mod app_state;
pub mod timer_state;

// Re-export main types
pub use app_state::{AppState, Session, StateUpdate, ToggleOutcome};
pub use timer_state::{
    ButtonLabel, StateChange, Subscription, TimeUnit, TimerSnapshot, TimerState,
    MAX_TOTAL_SECONDS,
};
