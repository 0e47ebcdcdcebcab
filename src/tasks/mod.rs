//! Background tasks module
//!
//! This module contains background tasks that run alongside the HTTP server.

pub mod countdown_dispatch;
pub mod display;

// Re-export main functions
pub use countdown_dispatch::countdown_dispatch_task;
pub use display::display_task;
