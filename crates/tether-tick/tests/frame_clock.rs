//! Frame clock timing tests on tokio's paused clock.

use std::time::Duration;

use tether_tick::{ClockConfig, ClockPolicy, FrameClock};
use tokio::time::{self, Instant};

#[tokio::test(start_paused = true)]
async fn test_frames_arrive_one_period_apart() {
    let mut clock = FrameClock::with_rate(10);
    let start = Instant::now();

    let first = clock.next_frame().await;
    assert_eq!(start.elapsed(), Duration::from_millis(100));
    assert_eq!(first.index, 1);
    assert_eq!(first.dt, Duration::from_millis(100));
    assert!(!first.late);

    let second = clock.next_frame().await;
    assert_eq!(start.elapsed(), Duration::from_millis(200));
    assert_eq!(second.index, 2);
}

#[tokio::test(start_paused = true)]
async fn test_skip_policy_drops_missed_frames() {
    let mut clock = FrameClock::with_rate(10);
    clock.next_frame().await;

    time::advance(Duration::from_millis(350)).await;
    let frame = clock.next_frame().await;
    assert!(frame.late);
    assert_eq!(frame.frames_dropped, 2);

    let before = Instant::now();
    clock.next_frame().await;
    assert_eq!(before.elapsed(), Duration::from_millis(100));
    assert_eq!(clock.stats().late_frames, 1);
    assert_eq!(clock.stats().dropped_frames, 2);
}

#[tokio::test(start_paused = true)]
async fn test_catch_up_policy_runs_missed_frames_immediately() {
    let mut clock = FrameClock::new(ClockConfig {
        rate_hz: 10,
        policy: ClockPolicy::CatchUp { max_catchup: 5 },
        ..ClockConfig::default()
    });
    clock.next_frame().await;

    time::advance(Duration::from_millis(350)).await;
    let frame = clock.next_frame().await;
    assert!(frame.late);
    assert_eq!(frame.frames_dropped, 0);

    let before = Instant::now();
    clock.next_frame().await;
    assert_eq!(before.elapsed(), Duration::ZERO, "caught-up frame is already due");
}

#[tokio::test(start_paused = true)]
async fn test_catch_up_is_capped() {
    let mut clock = FrameClock::new(ClockConfig {
        rate_hz: 10,
        policy: ClockPolicy::CatchUp { max_catchup: 1 },
        ..ClockConfig::default()
    });
    clock.next_frame().await;

    time::advance(Duration::from_millis(550)).await;
    let frame = clock.next_frame().await;
    assert_eq!(frame.frames_dropped, 3);

    let before = Instant::now();
    clock.next_frame().await;
    assert_eq!(before.elapsed(), Duration::from_millis(100));
}

#[tokio::test(start_paused = true)]
async fn test_end_frame_records_work_time() {
    let mut clock = FrameClock::with_rate(10);
    clock.next_frame().await;
    time::advance(Duration::from_millis(60)).await;
    clock.end_frame();

    let stats = clock.stats();
    assert_eq!(stats.last_work, Duration::from_millis(60));
    assert_eq!(stats.max_work, Duration::from_millis(60));
    assert!((stats.budget_utilization - 0.6).abs() < 1e-9);
}

#[tokio::test(start_paused = true)]
async fn test_end_frame_without_frame_is_ignored() {
    let mut clock = FrameClock::with_rate(10);
    clock.end_frame();
    assert_eq!(clock.stats().last_work, Duration::ZERO);
}

#[tokio::test(start_paused = true)]
async fn test_reset_restarts_cadence() {
    let mut clock = FrameClock::with_rate(10);
    clock.next_frame().await;
    time::advance(Duration::from_secs(2)).await;
    clock.reset();

    let frame = clock.next_frame().await;
    assert!(!frame.late);
}

#[tokio::test(start_paused = true)]
async fn test_initial_jitter_delays_first_frame_within_bound() {
    let mut clock = FrameClock::new(ClockConfig {
        rate_hz: 10,
        initial_jitter_us: 5_000,
        ..ClockConfig::default()
    });
    let start = Instant::now();
    clock.next_frame().await;
    let waited = start.elapsed();
    assert!(waited >= Duration::from_millis(100));
    assert!(waited < Duration::from_millis(105));
}
