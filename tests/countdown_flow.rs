use std::{sync::Arc, time::Duration};

use countdown_timer::{
    countdown::TokioScheduler,
    state::{AppState, ButtonLabel, TimeUnit},
    tasks::countdown_dispatch_task,
};

fn spawn_session() -> Arc<AppState> {
    let scheduler = TokioScheduler::try_new().unwrap();
    let (state, events) = AppState::new(0, "127.0.0.1".to_string(), Arc::new(scheduler));
    let state = Arc::new(state);
    tokio::spawn(countdown_dispatch_task(Arc::clone(&state), events));
    state
}

#[tokio::test(start_paused = true)]
async fn countdown_ticks_down_on_the_tokio_clock() {
    let state = spawn_session();
    state.set_unit(TimeUnit::Second, 5).unwrap();
    assert!(state.start().unwrap().0);

    tokio::time::sleep(Duration::from_millis(4500)).await;
    let snapshot = state.timer_snapshot().unwrap();
    assert!(snapshot.running);
    assert_eq!(snapshot.second, 2);

    tokio::time::sleep(Duration::from_secs(1)).await;
    let snapshot = state.timer_snapshot().unwrap();
    assert!(!snapshot.running);
    assert_eq!(snapshot.label, ButtonLabel::Start);
    assert_eq!(snapshot.second, 0);
}

#[tokio::test(start_paused = true)]
async fn cancelled_countdown_never_ticks_again() {
    let state = spawn_session();
    state.set_unit(TimeUnit::Second, 10).unwrap();
    state.start().unwrap();

    tokio::time::sleep(Duration::from_millis(1500)).await;
    assert_eq!(state.timer_snapshot().unwrap().second, 10);

    assert!(state.cancel().unwrap().0);
    tokio::time::sleep(Duration::from_secs(30)).await;

    let snapshot = state.timer_snapshot().unwrap();
    assert!(!snapshot.running);
    assert_eq!(snapshot.second, 10);
    assert_eq!(snapshot.label, ButtonLabel::Start);
}

#[tokio::test(start_paused = true)]
async fn a_new_countdown_can_follow_a_finished_one() {
    let state = spawn_session();
    state.set_unit(TimeUnit::Second, 2).unwrap();
    state.start().unwrap();
    tokio::time::sleep(Duration::from_millis(2500)).await;
    assert!(!state.timer_snapshot().unwrap().running);

    state.set_unit(TimeUnit::Second, 3).unwrap();
    assert!(state.start().unwrap().0);
    tokio::time::sleep(Duration::from_millis(1500)).await;
    let snapshot = state.timer_snapshot().unwrap();
    assert!(snapshot.running);
    assert_eq!(snapshot.second, 3);
}

#[tokio::test]
async fn ticks_hold_the_ceiling_second_on_a_real_clock() {
    let state = spawn_session();
    state.set_unit(TimeUnit::Second, 3).unwrap();
    state.start().unwrap();

    tokio::time::sleep(Duration::from_millis(2300)).await;
    let (snapshot, remaining) = state.status_view().unwrap();
    assert!(snapshot.running);
    assert_eq!(snapshot.second, 2);
    assert_eq!(remaining, Some(2));

    state.cancel().unwrap();
}
