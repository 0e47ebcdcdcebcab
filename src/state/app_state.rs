//! Main application state management

use std::{
    sync::{Arc, Mutex, MutexGuard},
    time::Instant,
};
use chrono::{DateTime, Utc};
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, info, warn};

use super::{StateChange, TimeUnit, TimerSnapshot, TimerState};
use crate::countdown::{CountdownController, CountdownEvent, Scheduler};

/// A change applied to the timer, with the fields as they stood afterwards
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StateUpdate {
    pub change: StateChange,
    pub timer: TimerSnapshot,
}

/// What a start/cancel toggle ended up doing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToggleOutcome {
    Started,
    Cancelled,
    Ignored,
}

/// Timer fields and the controller that drives them. Always mutated together
/// under one lock.
#[derive(Debug)]
pub struct Session {
    pub timer: TimerState,
    pub controller: CountdownController,
}

/// Main application state shared by the HTTP handlers and background tasks
#[derive(Debug)]
pub struct AppState {
    pub session: Arc<Mutex<Session>>,
    /// Server metadata
    pub start_time: Instant,
    pub port: u16,
    pub host: String,
    /// Last action tracking
    pub last_action: Arc<Mutex<Option<String>>>,
    pub last_action_time: Arc<Mutex<Option<DateTime<Utc>>>>,
    /// Every applied timer change is published here
    pub state_change_tx: broadcast::Sender<StateUpdate>,
}

impl AppState {
    /// Create the session. Scheduler events arrive on the returned receiver
    /// and must be fed back through [`AppState::apply_countdown_event`].
    pub fn new(
        port: u16,
        host: String,
        scheduler: Arc<dyn Scheduler>,
    ) -> (Self, mpsc::UnboundedReceiver<CountdownEvent>) {
        let (state_change_tx, _) = broadcast::channel(100);
        let (event_tx, event_rx) = mpsc::unbounded_channel();

        let mut timer = TimerState::new();
        let publisher = state_change_tx.clone();
        timer.subscribe(move |change, snapshot| {
            let update = StateUpdate { change: *change, timer: *snapshot };
            if publisher.send(update).is_err() {
                debug!("No listeners for timer update {:?}", change);
            }
        });

        let controller = CountdownController::new(
            scheduler,
            Arc::new(move |event: CountdownEvent| {
                if let Err(e) = event_tx.send(event) {
                    warn!("Countdown event dropped, dispatcher gone: {}", e);
                }
            }),
        );

        let state = Self {
            session: Arc::new(Mutex::new(Session { timer, controller })),
            start_time: Instant::now(),
            port,
            host,
            last_action: Arc::new(Mutex::new(None)),
            last_action_time: Arc::new(Mutex::new(None)),
            state_change_tx,
        };

        (state, event_rx)
    }

    fn lock_session(&self) -> Result<MutexGuard<'_, Session>, String> {
        self.session
            .lock()
            .map_err(|e| format!("Failed to lock session: {}", e))
    }

    /// Run an intent against the session, recording it as the last action
    /// when it was applied
    fn dispatch<F>(&self, action: &str, intent: F) -> Result<(bool, TimerSnapshot), String>
    where
        F: FnOnce(&mut Session) -> bool,
    {
        let mut session = self.lock_session()?;
        let applied = intent(&mut session);
        let snapshot = session.timer.snapshot();
        drop(session);

        if applied {
            self.record_action(action);
        } else {
            debug!("Intent {} ignored", action);
        }

        Ok((applied, snapshot))
    }

    fn record_action(&self, action: &str) {
        if let Ok(mut last_action) = self.last_action.lock() {
            *last_action = Some(action.to_string());
        }
        if let Ok(mut last_time) = self.last_action_time.lock() {
            *last_time = Some(Utc::now());
        }
    }

    pub fn increment(&self, unit: TimeUnit) -> Result<(bool, TimerSnapshot), String> {
        self.dispatch(&format!("increment-{}", unit), |session| session.timer.increment(unit))
    }

    pub fn decrement(&self, unit: TimeUnit) -> Result<(bool, TimerSnapshot), String> {
        self.dispatch(&format!("decrement-{}", unit), |session| session.timer.decrement(unit))
    }

    pub fn set_unit(&self, unit: TimeUnit, value: u32) -> Result<(bool, TimerSnapshot), String> {
        self.dispatch(&format!("set-{}", unit), |session| session.timer.set_unit(unit, value))
    }

    pub fn start(&self) -> Result<(bool, TimerSnapshot), String> {
        self.dispatch("start", |session| {
            let Session { timer, controller } = session;
            controller.start(timer)
        })
    }

    pub fn cancel(&self) -> Result<(bool, TimerSnapshot), String> {
        self.dispatch("cancel", |session| {
            let Session { timer, controller } = session;
            controller.cancel(timer)
        })
    }

    /// Cancel when running, otherwise start. A start below one second is
    /// silently ignored.
    pub fn toggle(&self) -> Result<(ToggleOutcome, TimerSnapshot), String> {
        let mut session = self.lock_session()?;
        let Session { timer, controller } = &mut *session;

        let outcome = if timer.is_running() {
            if controller.cancel(timer) {
                ToggleOutcome::Cancelled
            } else {
                ToggleOutcome::Ignored
            }
        } else if controller.start(timer) {
            ToggleOutcome::Started
        } else {
            ToggleOutcome::Ignored
        };
        let snapshot = timer.snapshot();
        drop(session);

        match outcome {
            ToggleOutcome::Started => self.record_action("start"),
            ToggleOutcome::Cancelled => self.record_action("cancel"),
            ToggleOutcome::Ignored => debug!("Toggle ignored"),
        }

        Ok((outcome, snapshot))
    }

    /// Deliver a scheduler event into the session
    pub fn apply_countdown_event(&self, event: CountdownEvent) -> Result<bool, String> {
        let mut session = self.lock_session()?;
        let Session { timer, controller } = &mut *session;
        Ok(controller.handle_event(event, timer))
    }

    /// Get current timer fields
    pub fn timer_snapshot(&self) -> Result<TimerSnapshot, String> {
        self.lock_session().map(|session| session.timer.snapshot())
    }

    /// Timer fields and remaining seconds read under the same lock, so a
    /// tick cannot land between them
    pub fn status_view(&self) -> Result<(TimerSnapshot, Option<u64>), String> {
        self.lock_session().map(|session| {
            (session.timer.snapshot(), session.controller.remaining_seconds())
        })
    }

    /// Apply initial field values, e.g. from the command line. Nothing is
    /// written unless every value is in range and no countdown is running.
    pub fn apply_preset(&self, hour: u32, minute: u32, second: u32) -> Result<(), String> {
        let values = [
            (TimeUnit::Hour, hour),
            (TimeUnit::Minute, minute),
            (TimeUnit::Second, second),
        ];
        if let Some((unit, value)) = values.iter().find(|(unit, value)| *value > unit.max()) {
            return Err(format!("Preset {} must be at most {}, got {}", unit, unit.max(), value));
        }

        let mut session = self.lock_session()?;
        if session.timer.is_running() {
            return Err("Cannot apply a preset while the countdown is running".to_string());
        }
        for (unit, value) in values {
            session.timer.set_unit(unit, value);
        }
        info!("Timer preset to {}", session.timer.display_text());
        Ok(())
    }

    /// Calculate server uptime as a formatted string
    pub fn get_uptime(&self) -> String {
        let duration = self.start_time.elapsed();
        let hours = duration.as_secs() / 3600;
        let minutes = (duration.as_secs() % 3600) / 60;
        let seconds = duration.as_secs() % 60;

        if hours > 0 {
            format!("{}h {}m {}s", hours, minutes, seconds)
        } else if minutes > 0 {
            format!("{}m {}s", minutes, seconds)
        } else {
            format!("{}s", seconds)
        }
    }

    /// Get last action information
    pub fn get_last_action(&self) -> (Option<String>, Option<DateTime<Utc>>) {
        let last_action = self.last_action.lock().ok().and_then(|a| a.clone());
        let last_action_time = self.last_action_time.lock().ok().and_then(|t| *t);
        (last_action, last_action_time)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::countdown::ManualScheduler;
    use std::time::Duration;

    fn setup() -> (AppState, ManualScheduler, mpsc::UnboundedReceiver<CountdownEvent>) {
        let scheduler = ManualScheduler::new();
        let (state, events) =
            AppState::new(0, "127.0.0.1".to_string(), Arc::new(scheduler.clone()));
        (state, scheduler, events)
    }

    fn deliver(state: &AppState, events: &mut mpsc::UnboundedReceiver<CountdownEvent>) {
        while let Ok(event) = events.try_recv() {
            state.apply_countdown_event(event).unwrap();
        }
    }

    #[test]
    fn toggle_ignores_zero_duration() {
        let (state, scheduler, _events) = setup();
        let (outcome, snapshot) = state.toggle().unwrap();
        assert_eq!(outcome, ToggleOutcome::Ignored);
        assert!(!snapshot.running);
        assert_eq!(scheduler.active_count(), 0);
        assert_eq!(state.get_last_action().0, None);
    }

    #[test]
    fn toggle_starts_then_cancels() {
        let (state, scheduler, mut events) = setup();
        state.set_unit(TimeUnit::Second, 3).unwrap();

        let (outcome, snapshot) = state.toggle().unwrap();
        assert_eq!(outcome, ToggleOutcome::Started);
        assert!(snapshot.running);

        scheduler.advance(Duration::from_secs(1));
        deliver(&state, &mut events);
        assert_eq!(state.status_view().unwrap().1, Some(3));

        let (outcome, snapshot) = state.toggle().unwrap();
        assert_eq!(outcome, ToggleOutcome::Cancelled);
        assert!(!snapshot.running);
        assert_eq!(snapshot.second, 3);
        assert_eq!(state.get_last_action().0.as_deref(), Some("cancel"));
    }

    #[test]
    fn increments_are_rejected_while_running() {
        let (state, _scheduler, _events) = setup();
        state.set_unit(TimeUnit::Minute, 1).unwrap();
        state.start().unwrap();

        let (applied, snapshot) = state.increment(TimeUnit::Minute).unwrap();
        assert!(!applied);
        assert_eq!(snapshot.minute, 1);
    }

    #[test]
    fn updates_are_published() {
        let (state, _scheduler, _events) = setup();
        let mut updates = state.state_change_tx.subscribe();

        state.increment(TimeUnit::Hour).unwrap();

        let update = updates.try_recv().unwrap();
        assert_eq!(update.change, StateChange::Unit { unit: TimeUnit::Hour, value: 1 });
        assert_eq!(update.timer.hour, 1);
    }

    #[test]
    fn preset_rejects_out_of_range_values() {
        let (state, _scheduler, _events) = setup();
        assert!(state.apply_preset(0, 5, 0).is_ok());
        assert!(state.apply_preset(24, 0, 0).is_err());
        assert_eq!(state.timer_snapshot().unwrap().minute, 5);
    }

    #[test]
    fn rejected_preset_writes_nothing() {
        let (state, _scheduler, _events) = setup();
        state.apply_preset(1, 5, 10).unwrap();

        let err = state.apply_preset(2, 30, 60).unwrap_err();
        assert!(err.contains("second"), "{}", err);

        let snapshot = state.timer_snapshot().unwrap();
        assert_eq!((snapshot.hour, snapshot.minute, snapshot.second), (1, 5, 10));
    }

    #[test]
    fn preset_is_refused_while_running() {
        let (state, _scheduler, _events) = setup();
        state.apply_preset(0, 0, 30).unwrap();
        state.start().unwrap();

        let err = state.apply_preset(0, 1, 0).unwrap_err();
        assert!(err.contains("running"), "{}", err);
        assert_eq!(state.timer_snapshot().unwrap().second, 30);
    }

    #[test]
    fn status_view_matches_the_last_tick() {
        let (state, scheduler, mut events) = setup();
        state.set_unit(TimeUnit::Minute, 1).unwrap();
        state.start().unwrap();

        scheduler.advance(Duration::from_secs(2));
        deliver(&state, &mut events);

        let (snapshot, remaining) = state.status_view().unwrap();
        assert_eq!(snapshot.second, 59);
        assert_eq!(remaining, Some(59));
    }
}
