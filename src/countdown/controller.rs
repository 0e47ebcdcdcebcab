//! Countdown controller: the single active countdown process

use std::{fmt, sync::Arc, time::Duration};
use tracing::{debug, info};

use super::scheduler::{ScheduleHandle, Scheduler};
use crate::state::{TimeUnit, TimerState, MAX_TOTAL_SECONDS};

/// Shortest duration a countdown may be started with
pub const MIN_START_MILLIS: u64 = 1000;
/// Period between ticks
pub const TICK_INTERVAL: Duration = Duration::from_secs(1);

/// Scheduler callback output, tagged with the process it belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CountdownEvent {
    Tick { generation: u64, elapsed: Duration },
    Finished { generation: u64 },
}

impl CountdownEvent {
    pub fn generation(&self) -> u64 {
        match self {
            CountdownEvent::Tick { generation, .. } | CountdownEvent::Finished { generation } => {
                *generation
            }
        }
    }
}

/// Where scheduler callbacks deliver their events
pub type EventSink = Arc<dyn Fn(CountdownEvent) + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Running,
}

/// How the most recent countdown process ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Finished,
    Cancelled,
}

struct ActiveCountdown {
    generation: u64,
    target_millis: u64,
    remaining_seconds: u64,
    handle: Box<dyn ScheduleHandle>,
}

/// Seconds shown for a tick. One second is added so the display holds the
/// ceiling second at each tick boundary instead of dropping to the floor.
pub fn left_seconds(target_millis: u64, elapsed_millis: u64) -> u64 {
    let remaining = target_millis as i128 - elapsed_millis as i128;
    let left = remaining.div_euclid(1000) + 1;
    left.clamp(0, i128::from(MAX_TOTAL_SECONDS)) as u64
}

/// Split seconds into (hour, minute, second)
pub fn split_seconds(total_seconds: u64) -> (u32, u32, u32) {
    let hour = total_seconds / 3600;
    let minute = (total_seconds % 3600) / 60;
    let second = (total_seconds % 3600) % 60;
    (hour as u32, minute as u32, second as u32)
}

/// Owns the at-most-one active countdown and writes its progress into a
/// [`TimerState`]. Scheduler callbacks only emit [`CountdownEvent`]s; the
/// owner feeds them back through [`CountdownController::handle_event`], which
/// drops any event whose generation is no longer active.
pub struct CountdownController {
    scheduler: Arc<dyn Scheduler>,
    events: EventSink,
    next_generation: u64,
    active: Option<ActiveCountdown>,
    last_outcome: Option<Outcome>,
}

impl CountdownController {
    pub fn new(scheduler: Arc<dyn Scheduler>, events: EventSink) -> Self {
        Self {
            scheduler,
            events,
            next_generation: 1,
            active: None,
            last_outcome: None,
        }
    }

    pub fn phase(&self) -> Phase {
        if self.active.is_some() {
            Phase::Running
        } else {
            Phase::Idle
        }
    }

    pub fn last_outcome(&self) -> Option<Outcome> {
        self.last_outcome
    }

    /// Frozen target of the active process
    pub fn target_millis(&self) -> Option<u64> {
        self.active.as_ref().map(|a| a.target_millis)
    }

    pub fn remaining_seconds(&self) -> Option<u64> {
        self.active.as_ref().map(|a| a.remaining_seconds)
    }

    pub fn active_generation(&self) -> Option<u64> {
        self.active.as_ref().map(|a| a.generation)
    }

    /// Start counting down from the state's current total.
    ///
    /// Rejected when a countdown is already running or the total is under
    /// one second.
    pub fn start(&mut self, state: &mut TimerState) -> bool {
        if state.is_running() || self.active.is_some() {
            debug!("Countdown already running, ignoring start");
            return false;
        }

        let target_millis = state.total_millis();
        if target_millis < MIN_START_MILLIS {
            debug!("Countdown of {}ms is below the minimum, ignoring start", target_millis);
            return false;
        }

        let generation = self.next_generation;
        self.next_generation += 1;

        let tick_events = Arc::clone(&self.events);
        let finish_events = Arc::clone(&self.events);
        let handle = self.scheduler.schedule(
            TICK_INTERVAL,
            Duration::from_millis(target_millis),
            Box::new(move |elapsed: Duration| {
                tick_events(CountdownEvent::Tick { generation, elapsed })
            }),
            Box::new(move || finish_events(CountdownEvent::Finished { generation })),
        );

        self.active = Some(ActiveCountdown {
            generation,
            target_millis,
            remaining_seconds: target_millis / 1000,
            handle,
        });
        self.last_outcome = None;
        state.set_running(true);

        info!("Countdown #{} started for {}", generation, state.display_text());
        true
    }

    /// Apply a scheduler event. Returns false for stale or unknown events.
    pub fn handle_event(&mut self, event: CountdownEvent, state: &mut TimerState) -> bool {
        if self.active_generation() != Some(event.generation()) {
            debug!("Discarding stale countdown event: {:?}", event);
            return false;
        }

        match event {
            CountdownEvent::Tick { elapsed, .. } => self.tick(elapsed, state),
            CountdownEvent::Finished { .. } => self.finish(state),
        }
        true
    }

    /// Recompute the displayed time for `elapsed` since start
    fn tick(&mut self, elapsed: Duration, state: &mut TimerState) {
        let Some(active) = self.active.as_mut() else {
            return;
        };

        let elapsed_millis = u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX);
        if elapsed_millis >= active.target_millis {
            active.handle.cancel();
            self.finish(state);
            return;
        }

        let left = left_seconds(active.target_millis, elapsed_millis);
        active.remaining_seconds = left;

        let (hour, minute, second) = split_seconds(left);
        state.write_unit(TimeUnit::Hour, hour);
        state.write_unit(TimeUnit::Minute, minute);
        state.write_unit(TimeUnit::Second, second);
    }

    /// Target reached. Only the second field is forced to zero; hour and
    /// minute keep whatever the last tick wrote.
    fn finish(&mut self, state: &mut TimerState) {
        let Some(active) = self.active.take() else {
            return;
        };

        state.set_running(false);
        state.write_unit(TimeUnit::Second, 0);
        self.last_outcome = Some(Outcome::Finished);

        info!("Countdown #{} finished at {}", active.generation, state.display_text());
    }

    /// Stop the active countdown, leaving the fields as they are.
    /// No-op when idle.
    pub fn cancel(&mut self, state: &mut TimerState) -> bool {
        let Some(mut active) = self.active.take() else {
            debug!("No countdown running, ignoring cancel");
            return false;
        };

        active.handle.cancel();
        state.set_running(false);
        self.last_outcome = Some(Outcome::Cancelled);

        info!("Countdown #{} cancelled at {}", active.generation, state.display_text());
        true
    }
}

impl fmt::Debug for CountdownController {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CountdownController")
            .field("phase", &self.phase())
            .field("generation", &self.active_generation())
            .field("target_millis", &self.target_millis())
            .field("remaining_seconds", &self.remaining_seconds())
            .field("last_outcome", &self.last_outcome)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{countdown::ManualScheduler, state::ButtonLabel};
    use std::sync::Mutex;

    struct Harness {
        scheduler: ManualScheduler,
        events: Arc<Mutex<Vec<CountdownEvent>>>,
        controller: CountdownController,
        state: TimerState,
    }

    impl Harness {
        fn new(hour: u32, minute: u32, second: u32) -> Self {
            let scheduler = ManualScheduler::new();
            let events = Arc::new(Mutex::new(Vec::new()));
            let sink = Arc::clone(&events);
            let controller = CountdownController::new(
                Arc::new(scheduler.clone()),
                Arc::new(move |event: CountdownEvent| sink.lock().unwrap().push(event)),
            );
            let mut state = TimerState::new();
            state.set_unit(TimeUnit::Hour, hour);
            state.set_unit(TimeUnit::Minute, minute);
            state.set_unit(TimeUnit::Second, second);
            Self { scheduler, events, controller, state }
        }

        /// Advance virtual time and deliver whatever fired
        fn advance_millis(&mut self, millis: u64) {
            self.scheduler.advance(Duration::from_millis(millis));
            let fired: Vec<_> = self.events.lock().unwrap().drain(..).collect();
            for event in fired {
                self.controller.handle_event(event, &mut self.state);
            }
        }

        fn hms(&self) -> (u32, u32, u32) {
            (
                self.state.get(TimeUnit::Hour),
                self.state.get(TimeUnit::Minute),
                self.state.get(TimeUnit::Second),
            )
        }
    }

    #[test]
    fn left_seconds_rounds_up_at_boundaries() {
        assert_eq!(left_seconds(5000, 1000), 5);
        assert_eq!(left_seconds(5000, 4000), 2);
        assert_eq!(left_seconds(5000, 4500), 1);
        assert_eq!(left_seconds(5000, 0), 6);
        assert_eq!(left_seconds(5000, 6500), 0);
        assert_eq!(left_seconds(MAX_TOTAL_SECONDS * 1000, 0), MAX_TOTAL_SECONDS);
    }

    #[test]
    fn split_seconds_decomposes() {
        assert_eq!(split_seconds(3723), (1, 2, 3));
        assert_eq!(split_seconds(59), (0, 0, 59));
        assert_eq!(split_seconds(3600), (1, 0, 0));
    }

    #[test]
    fn start_requires_a_full_second() {
        let mut harness = Harness::new(0, 0, 0);
        assert!(!harness.controller.start(&mut harness.state));
        assert_eq!(harness.controller.phase(), Phase::Idle);
        assert_eq!(harness.scheduler.active_count(), 0);

        harness.state.set_unit(TimeUnit::Second, 1);
        assert_eq!(harness.state.total_millis(), 1000);
        assert!(harness.controller.start(&mut harness.state));
        assert_eq!(harness.controller.phase(), Phase::Running);
        assert_eq!(harness.controller.target_millis(), Some(1000));
        assert!(harness.state.is_running());
        assert_eq!(harness.state.label(), ButtonLabel::Cancel);
    }

    #[test]
    fn second_start_is_rejected() {
        let mut harness = Harness::new(0, 1, 0);
        assert!(harness.controller.start(&mut harness.state));
        assert!(!harness.controller.start(&mut harness.state));
        assert_eq!(harness.scheduler.active_count(), 1);
    }

    #[test]
    fn ticks_count_down_then_finish() {
        let mut harness = Harness::new(0, 0, 5);
        assert!(harness.controller.start(&mut harness.state));

        harness.advance_millis(1000);
        assert_eq!(harness.hms(), (0, 0, 5));
        assert_eq!(harness.controller.remaining_seconds(), Some(5));

        harness.advance_millis(3000);
        assert_eq!(harness.hms(), (0, 0, 2));
        assert!(harness.state.is_running());

        harness.advance_millis(1000);
        assert_eq!(harness.hms(), (0, 0, 0));
        assert!(!harness.state.is_running());
        assert_eq!(harness.state.label(), ButtonLabel::Start);
        assert_eq!(harness.controller.phase(), Phase::Idle);
        assert_eq!(harness.controller.last_outcome(), Some(Outcome::Finished));
    }

    #[test]
    fn ticks_carry_across_units() {
        let mut harness = Harness::new(1, 0, 0);
        assert!(harness.controller.start(&mut harness.state));

        harness.advance_millis(1000);
        assert_eq!(harness.hms(), (1, 0, 0));
        harness.advance_millis(1000);
        assert_eq!(harness.hms(), (0, 59, 59));
    }

    #[test]
    fn cancel_keeps_last_tick_value() {
        let mut harness = Harness::new(0, 0, 10);
        assert!(harness.controller.start(&mut harness.state));

        let generation = harness.controller.active_generation().unwrap();
        harness.controller.handle_event(
            CountdownEvent::Tick { generation, elapsed: Duration::from_millis(1500) },
            &mut harness.state,
        );
        assert_eq!(harness.hms(), (0, 0, 9));

        assert!(harness.controller.cancel(&mut harness.state));
        assert!(!harness.state.is_running());
        assert_eq!(harness.state.label(), ButtonLabel::Start);
        assert_eq!(harness.hms(), (0, 0, 9));
        assert_eq!(harness.controller.last_outcome(), Some(Outcome::Cancelled));

        harness.advance_millis(20_000);
        assert_eq!(harness.hms(), (0, 0, 9));
        assert_eq!(harness.scheduler.active_count(), 0);
    }

    #[test]
    fn stale_tick_after_cancel_is_discarded() {
        let mut harness = Harness::new(0, 0, 10);
        assert!(harness.controller.start(&mut harness.state));
        harness.scheduler.advance(Duration::from_millis(2000));

        assert!(harness.controller.cancel(&mut harness.state));
        let queued: Vec<_> = harness.events.lock().unwrap().drain(..).collect();
        assert_eq!(queued.len(), 2);
        for event in queued {
            assert!(!harness.controller.handle_event(event, &mut harness.state));
        }
        assert_eq!(harness.hms(), (0, 0, 10));
        assert!(!harness.state.is_running());
    }

    #[test]
    fn events_from_an_earlier_process_are_discarded() {
        let mut harness = Harness::new(0, 0, 10);
        assert!(harness.controller.start(&mut harness.state));
        let first = harness.controller.active_generation().unwrap();
        harness.controller.cancel(&mut harness.state);
        assert!(harness.controller.start(&mut harness.state));

        assert!(!harness.controller.handle_event(
            CountdownEvent::Finished { generation: first },
            &mut harness.state,
        ));
        assert!(harness.state.is_running());
    }

    #[test]
    fn cancel_when_idle_changes_nothing() {
        let mut harness = Harness::new(0, 0, 3);
        let before = harness.state.snapshot();
        assert!(!harness.controller.cancel(&mut harness.state));
        assert_eq!(harness.state.snapshot(), before);
        assert_eq!(harness.controller.last_outcome(), None);
    }
}
