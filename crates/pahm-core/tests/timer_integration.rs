//! Property tests for the epoch-based timer.

use std::sync::Arc;
use std::time::Duration;

use pahm_core::{
    DeadlineScheduler, Event, ManualClock, RobustTimer, SessionConfiguration, TimerPhase,
};
use proptest::prelude::*;

const T0: u64 = 1_700_000_000_000;

fn timer(clock: &ManualClock) -> RobustTimer {
    RobustTimer::new(Arc::new(clock.clone()), Box::new(DeadlineScheduler::new()))
}

proptest! {
    #[test]
    fn elapsed_excludes_paused_time(
        minutes in 30u32..=120,
        steps in proptest::collection::vec((1u64..600_000, 1u64..600_000), 0..8),
        tail in 0u64..600_000,
    ) {
        let clock = ManualClock::new(T0);
        let mut timer = timer(&clock);
        timer.start(SessionConfiguration::new(minutes, "Stage 1", "seated").unwrap());

        let total_ms = u64::from(minutes) * 60_000;
        let mut running_ms = 0u64;
        for (run, paused) in steps {
            if running_ms + run >= total_ms {
                break;
            }
            clock.advance_ms(run);
            running_ms += run;
            timer.pause();
            clock.advance_ms(paused);
            timer.resume();
            let elapsed = timer.elapsed_seconds();
            prop_assert!(elapsed.abs_diff(running_ms / 1000) <= 1);
        }

        let tail = tail.min(total_ms - running_ms - 1);
        clock.advance_ms(tail);
        running_ms += tail;
        prop_assert!(timer.elapsed_seconds().abs_diff(running_ms / 1000) <= 1);
        prop_assert_eq!(timer.remaining_ms(), total_ms - running_ms);
    }

    #[test]
    fn completion_signals_exactly_once(
        minutes in 30u32..=60,
        polls in proptest::collection::vec(1u64..400_000, 1..40),
    ) {
        let clock = ManualClock::new(T0);
        let mut timer = timer(&clock);
        timer.start(SessionConfiguration::new(minutes, "Stage 1", "seated").unwrap());

        let mut completions = 0;
        for step in polls {
            clock.advance_ms(step);
            completions += timer
                .poll()
                .iter()
                .filter(|e| matches!(e, Event::TimerCompleted { .. }))
                .count();
        }
        clock.advance(Duration::from_secs(u64::from(minutes) * 60));
        completions += timer
            .poll()
            .iter()
            .filter(|e| matches!(e, Event::TimerCompleted { .. }))
            .count();
        completions += timer
            .refresh()
            .iter()
            .filter(|e| matches!(e, Event::TimerCompleted { .. }))
            .count();

        prop_assert_eq!(completions, 1);
        prop_assert_eq!(timer.phase(), TimerPhase::Completed);
        prop_assert_eq!(timer.remaining(), (0, 0));
    }
}

#[test]
fn thirty_minutes_completes_with_zero_tick() {
    let clock = ManualClock::new(T0);
    let mut timer = timer(&clock);
    timer.start(SessionConfiguration::new(30, "Stage 1", "seated").unwrap());

    clock.advance_ms(1_800_000);
    let events = timer.poll();
    assert!(matches!(
        events[0],
        Event::Tick {
            remaining_minutes: 0,
            remaining_seconds: 0,
            phase: TimerPhase::Completed,
            ..
        }
    ));
    assert!(matches!(
        events[1],
        Event::TimerCompleted {
            elapsed_seconds: 1800,
            ..
        }
    ));
    clock.advance_ms(5_000);
    assert!(timer.poll().is_empty());
    assert_eq!(timer.elapsed_seconds(), 1800);
}

#[test]
fn pause_at_five_minutes_for_ten_resumes_at_twenty_five() {
    let clock = ManualClock::new(T0);
    let mut timer = timer(&clock);
    timer.start(SessionConfiguration::new(30, "Stage 1", "seated").unwrap());

    clock.advance(Duration::from_secs(300));
    timer.pause();
    clock.advance(Duration::from_secs(600));
    let events = timer.resume();

    assert_eq!(timer.remaining(), (25, 0));
    assert!(matches!(
        events.last(),
        Some(Event::Tick {
            remaining_minutes: 25,
            remaining_seconds: 0,
            phase: TimerPhase::Running,
            ..
        })
    ));
}

#[test]
fn pause_and_stop_are_idempotent() {
    let clock = ManualClock::new(T0);
    let mut timer = timer(&clock);
    timer.start(SessionConfiguration::new(30, "Stage 1", "seated").unwrap());

    clock.advance(Duration::from_secs(60));
    assert_eq!(timer.pause().len(), 1);
    assert!(timer.pause().is_empty());
    let state = timer.state().clone();
    clock.advance(Duration::from_secs(60));
    assert!(timer.pause().is_empty());
    assert_eq!(timer.state(), &state);

    assert_eq!(timer.stop().len(), 1);
    let stopped = timer.state().clone();
    assert!(timer.stop().is_empty());
    assert_eq!(timer.state(), &stopped);
    assert_eq!(timer.phase(), TimerPhase::Interrupted);
    assert_eq!(timer.elapsed_seconds(), 60);
}
