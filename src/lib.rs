//! Countdown Timer - A state-managed HTTP countdown timer
//!
//! This library provides observable hour/minute/second fields, a single
//! countdown process that ticks them down once per second, and an HTTP API
//! that forwards increment, decrement and start/cancel intents.

pub mod config;
pub mod state;
pub mod countdown;
pub mod api;
pub mod tasks;
pub mod utils;

// Re-export commonly used types
pub use config::Config;
pub use state::AppState;
pub use api::create_router;
pub use utils::signals::shutdown_signal;
