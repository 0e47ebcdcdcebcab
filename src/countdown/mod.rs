//! Countdown module
//!
//! This module contains the countdown process and the scheduler it runs on.

pub mod controller;
pub mod scheduler;

// Re-export main types
pub use controller::{CountdownController, CountdownEvent, EventSink, Outcome, Phase};
pub use scheduler::{ManualScheduler, ScheduleHandle, Scheduler, TokioScheduler};
