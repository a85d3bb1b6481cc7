use std::sync::mpsc;
use std::time::Duration;

use chrono::{Local, TimeZone};
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use setwise::clock::FixedClock;
use setwise::progress::ProgressStore;
use setwise::runtime::{AppEvent, FixedTicker, Runner, TestEventSource};
use setwise::session::{RunningState, WorkoutSession};
use setwise::store::MemoryKvStore;
use setwise::workout::{Catalog, WorkoutSource};

fn clock() -> FixedClock {
    FixedClock::new(Local.with_ymd_and_hms(2024, 3, 6, 7, 15, 0).unwrap())
}

fn key(c: char) -> AppEvent {
    AppEvent::Key(KeyEvent::new(KeyCode::Char(c), KeyModifiers::NONE))
}

// Headless integration using the internal runtime + session without a TTY.
// Every Wake stands in for one elapsed second.
#[test]
fn headless_core_circuit_completes() {
    let def = Catalog::builtin().fetch("core-circuit").unwrap();
    let total_sets = def.total_sets();
    let mut session =
        WorkoutSession::new(def, ProgressStore::new(MemoryKvStore::new(), clock())).unwrap();

    let (tx, rx) = mpsc::channel();
    let runner = Runner::new(
        TestEventSource::new(rx),
        FixedTicker::new(Duration::from_millis(1)),
    );

    tx.send(key('g')).unwrap();

    // Drive a tiny event loop; rests are waited out, never skipped.
    // A set is "performed" whenever the loop wakes up with the session active.
    let mut completed = 0;
    for _ in 0..10_000u32 {
        match runner.step() {
            AppEvent::Wake => {
                session.tick();
                if session.running_state() == RunningState::Active {
                    tx.send(key('d')).unwrap();
                }
            }
            AppEvent::Resize => {}
            AppEvent::Key(k) => match k.code {
                KeyCode::Char('g') => assert!(session.start()),
                KeyCode::Char('d') => {
                    assert!(session.complete_current_set());
                    completed += 1;
                }
                _ => {}
            },
        }
        if session.is_finished() {
            break;
        }
    }

    assert!(session.is_finished(), "session should have finished");
    assert_eq!(completed, total_sets);
    let summary = session.summary().unwrap();
    assert_eq!(summary.sets_completed, total_sets);
    assert_eq!(summary.exercises_skipped, 0);
}

#[test]
fn headless_rest_expires_on_wake_ticks() {
    let def = Catalog::builtin().fetch("push-day").unwrap();
    let rest = def.exercises[0].rest_secs;
    let mut session =
        WorkoutSession::new(def, ProgressStore::new(MemoryKvStore::new(), clock())).unwrap();
    session.start();
    session.complete_current_set();

    let (_tx, rx) = mpsc::channel();
    let runner = Runner::new(
        TestEventSource::new(rx),
        FixedTicker::new(Duration::from_millis(1)),
    );

    let mut ticks = 0;
    while session.running_state() == RunningState::Resting {
        if let AppEvent::Wake = runner.step() {
            session.tick();
            ticks += 1;
        }
        assert!(ticks <= rest, "rest should end after {rest} ticks");
    }
    assert_eq!(ticks, rest);
    assert_eq!(session.view().current_set, 2);
}
