//! Timer state structure: observable hour/minute/second fields

use std::{fmt, str::FromStr};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Largest number of seconds the hour/minute/second fields can hold (23:59:59)
pub const MAX_TOTAL_SECONDS: u64 = 23 * 3600 + 59 * 60 + 59;

/// One of the three independently editable time fields
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimeUnit {
    Hour,
    Minute,
    Second,
}

impl TimeUnit {
    pub const ALL: [TimeUnit; 3] = [TimeUnit::Hour, TimeUnit::Minute, TimeUnit::Second];

    /// Largest valid value for this unit
    pub fn max(self) -> u32 {
        match self {
            TimeUnit::Hour => 23,
            TimeUnit::Minute | TimeUnit::Second => 59,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            TimeUnit::Hour => "hour",
            TimeUnit::Minute => "minute",
            TimeUnit::Second => "second",
        }
    }
}

impl fmt::Display for TimeUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TimeUnit {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "h" | "hour" | "hours" => Ok(TimeUnit::Hour),
            "m" | "minute" | "minutes" => Ok(TimeUnit::Minute),
            "s" | "second" | "seconds" => Ok(TimeUnit::Second),
            other => Err(format!("Unknown time unit: {}", other)),
        }
    }
}

/// Text shown on the start/cancel control
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ButtonLabel {
    Start,
    Cancel,
}

impl ButtonLabel {
    pub fn for_running(running: bool) -> Self {
        if running {
            ButtonLabel::Cancel
        } else {
            ButtonLabel::Start
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ButtonLabel::Start => "start",
            ButtonLabel::Cancel => "cancel",
        }
    }
}

/// A single applied mutation, delivered to observers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StateChange {
    Unit { unit: TimeUnit, value: u32 },
    Running(bool),
    Label(ButtonLabel),
}

/// Copy of the observable fields at one point in time
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimerSnapshot {
    pub hour: u32,
    pub minute: u32,
    pub second: u32,
    pub running: bool,
    pub label: ButtonLabel,
}

impl TimerSnapshot {
    /// Render as `HH:MM:SS`
    pub fn display_text(&self) -> String {
        format!("{:02}:{:02}:{:02}", self.hour, self.minute, self.second)
    }

    pub fn total_millis(&self) -> u64 {
        (u64::from(self.hour) * 3600 + u64::from(self.minute) * 60 + u64::from(self.second)) * 1000
    }
}

/// Callback invoked synchronously after every applied mutation
pub type Observer = Box<dyn FnMut(&StateChange, &TimerSnapshot) + Send>;

/// Handle returned by [`TimerState::subscribe`], used to unsubscribe
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Subscription(u64);

/// Observable countdown fields.
///
/// While `running` is true the fields belong to the countdown controller and
/// user edits are rejected; while false only user edits change them.
pub struct TimerState {
    hour: u32,
    minute: u32,
    second: u32,
    running: bool,
    label: ButtonLabel,
    observers: Vec<(Subscription, Observer)>,
    next_subscription: u64,
}

impl TimerState {
    /// Create a stopped timer at 00:00:00
    pub fn new() -> Self {
        Self {
            hour: 0,
            minute: 0,
            second: 0,
            running: false,
            label: ButtonLabel::Start,
            observers: Vec::new(),
            next_subscription: 0,
        }
    }

    pub fn get(&self, unit: TimeUnit) -> u32 {
        match unit {
            TimeUnit::Hour => self.hour,
            TimeUnit::Minute => self.minute,
            TimeUnit::Second => self.second,
        }
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn label(&self) -> ButtonLabel {
        self.label
    }

    pub fn snapshot(&self) -> TimerSnapshot {
        TimerSnapshot {
            hour: self.hour,
            minute: self.minute,
            second: self.second,
            running: self.running,
            label: self.label,
        }
    }

    pub fn display_text(&self) -> String {
        self.snapshot().display_text()
    }

    /// Total configured duration in milliseconds
    pub fn total_millis(&self) -> u64 {
        self.snapshot().total_millis()
    }

    /// Set a unit directly. Ignored while running or when out of range.
    pub fn set_unit(&mut self, unit: TimeUnit, value: u32) -> bool {
        if self.running {
            debug!("Ignoring {} edit while countdown is running", unit);
            return false;
        }
        self.write_unit(unit, value)
    }

    /// Add one to a unit unless running or already at its maximum
    pub fn increment(&mut self, unit: TimeUnit) -> bool {
        if self.running {
            debug!("Ignoring {} increment while countdown is running", unit);
            return false;
        }
        let current = self.get(unit);
        if current >= unit.max() {
            return false;
        }
        self.write_unit(unit, current + 1)
    }

    /// Subtract one from a unit unless running or already at zero
    pub fn decrement(&mut self, unit: TimeUnit) -> bool {
        if self.running {
            debug!("Ignoring {} decrement while countdown is running", unit);
            return false;
        }
        match self.get(unit).checked_sub(1) {
            Some(value) => self.write_unit(unit, value),
            None => false,
        }
    }

    /// Set the running flag and the derived label, notifying both changes.
    /// Both fields are updated before either notification goes out.
    pub fn set_running(&mut self, running: bool) {
        self.running = running;
        self.label = ButtonLabel::for_running(running);
        self.notify(StateChange::Running(running));
        self.notify(StateChange::Label(self.label));
    }

    /// Range-checked write used by both user edits and the countdown controller
    pub(crate) fn write_unit(&mut self, unit: TimeUnit, value: u32) -> bool {
        if value > unit.max() {
            debug!("Ignoring out of range {} value {}", unit, value);
            return false;
        }
        match unit {
            TimeUnit::Hour => self.hour = value,
            TimeUnit::Minute => self.minute = value,
            TimeUnit::Second => self.second = value,
        }
        self.notify(StateChange::Unit { unit, value });
        true
    }

    /// Register an observer; it sees every change applied after this call
    pub fn subscribe<F>(&mut self, observer: F) -> Subscription
    where
        F: FnMut(&StateChange, &TimerSnapshot) + Send + 'static,
    {
        let subscription = Subscription(self.next_subscription);
        self.next_subscription += 1;
        self.observers.push((subscription, Box::new(observer)));
        subscription
    }

    /// Remove an observer. Returns false if it was already removed.
    pub fn unsubscribe(&mut self, subscription: Subscription) -> bool {
        let before = self.observers.len();
        self.observers.retain(|(id, _)| *id != subscription);
        self.observers.len() != before
    }

    fn notify(&mut self, change: StateChange) {
        let snapshot = self.snapshot();
        for (_, observer) in self.observers.iter_mut() {
            observer(&change, &snapshot);
        }
    }
}

impl Default for TimerState {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for TimerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TimerState")
            .field("hour", &self.hour)
            .field("minute", &self.minute)
            .field("second", &self.second)
            .field("running", &self.running)
            .field("label", &self.label)
            .field("observers", &self.observers.len())
            .finish()
    }
}
