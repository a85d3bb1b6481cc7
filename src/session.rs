//! Workout execution state machine.
//!
//! ```text
//! Idle --start--> Active --complete set--> Resting <--pause/resume--> RestingPaused
//!                   ^                         |                          |
//!                   +--- skip rest / timer ---+--------- skip rest ------+
//! ```
//!
//! Completing the last set of the last exercise moves to `Finished`.
//! Transitions that do not apply to the current state are ignored and
//! report `false`.

use std::collections::BTreeSet;

use chrono::{DateTime, Local};
use strum_macros::Display;
use tracing::{debug, info, trace};

use crate::clock::Clock;
use crate::progress::{ProgressSnapshot, ProgressStore};
use crate::store::KvStore;
use crate::timer::{RestTimer, TimerEvent};
use crate::workout::{DefinitionError, ExerciseDefinition, WorkoutDefinition};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum RunningState {
    Idle,
    Active,
    Resting,
    RestingPaused,
    Finished,
}

impl RunningState {
    pub fn is_resting(&self) -> bool {
        matches!(self, RunningState::Resting | RunningState::RestingPaused)
    }
}

/// Mutable position within the workout
#[derive(Debug, Clone, PartialEq)]
pub struct SessionState {
    pub exercise_index: usize,
    pub current_set: u32,
    pub completed_sets: BTreeSet<u32>,
    pub running: RunningState,
    pub started_at: Option<DateTime<Local>>,
    pub finished_at: Option<DateTime<Local>>,
    pub resumed: bool,
    // Bookkeeping for the completion summary
    pub sets_logged: u32,
    pub exercises_skipped: u32,
}

impl Default for SessionState {
    fn default() -> Self {
        Self {
            exercise_index: 0,
            current_set: 1,
            completed_sets: BTreeSet::new(),
            running: RunningState::Idle,
            started_at: None,
            finished_at: None,
            resumed: false,
            sets_logged: 0,
            exercises_skipped: 0,
        }
    }
}

/// Read-only picture of the session for rendering
#[derive(Debug, Clone)]
pub struct SessionView<'a> {
    pub workout_id: &'a str,
    pub workout_name: &'a str,
    pub exercise: &'a ExerciseDefinition,
    pub next_exercise: Option<&'a ExerciseDefinition>,
    pub exercise_index: usize,
    pub exercise_count: usize,
    pub current_set: u32,
    pub set_count: u32,
    pub completed_sets: &'a BTreeSet<u32>,
    pub state: RunningState,
    pub rest_remaining: u32,
    pub resumed: bool,
    pub started_at: Option<DateTime<Local>>,
}

/// Facts about a finished run, for the history log
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionSummary {
    pub workout_id: String,
    pub workout_name: String,
    pub week: String,
    pub started_at: DateTime<Local>,
    pub finished_at: DateTime<Local>,
    pub sets_completed: u32,
    pub exercises_skipped: u32,
}

impl CompletionSummary {
    pub fn elapsed_secs(&self) -> i64 {
        (self.finished_at - self.started_at).num_seconds().max(0)
    }
}

#[derive(Debug)]
pub struct WorkoutSession<S: KvStore, C: Clock> {
    workout: WorkoutDefinition,
    state: SessionState,
    timer: RestTimer,
    progress: ProgressStore<S, C>,
}

impl<S: KvStore, C: Clock> WorkoutSession<S, C> {
    /// Validate the definition and rehydrate this week's saved progress
    pub fn new(
        workout: WorkoutDefinition,
        progress: ProgressStore<S, C>,
    ) -> Result<Self, DefinitionError> {
        workout.validate()?;

        let mut state = SessionState::default();
        if let Some(snapshot) = progress.load(&workout.id) {
            if let Some(restored) = restore(&workout, &snapshot) {
                info!(
                    workout = %workout.id,
                    exercise = restored.exercise_index,
                    set = restored.current_set,
                    "resuming saved progress"
                );
                state = restored;
            } else {
                debug!(workout = %workout.id, "saved progress does not fit this workout, starting fresh");
            }
        }

        Ok(Self {
            workout,
            state,
            timer: RestTimer::new(),
            progress,
        })
    }

    pub fn workout(&self) -> &WorkoutDefinition {
        &self.workout
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn running_state(&self) -> RunningState {
        self.state.running
    }

    pub fn is_finished(&self) -> bool {
        self.state.running == RunningState::Finished
    }

    pub fn rest_remaining(&self) -> u32 {
        if self.state.running.is_resting() {
            self.timer.remaining()
        } else {
            0
        }
    }

    pub fn current_exercise(&self) -> &ExerciseDefinition {
        &self.workout.exercises[self.state.exercise_index]
    }

    fn is_last_exercise(&self) -> bool {
        self.state.exercise_index + 1 >= self.workout.exercises.len()
    }

    pub fn view(&self) -> SessionView<'_> {
        let exercise = self.current_exercise();
        SessionView {
            workout_id: &self.workout.id,
            workout_name: &self.workout.name,
            exercise,
            next_exercise: self.workout.exercises.get(self.state.exercise_index + 1),
            exercise_index: self.state.exercise_index,
            exercise_count: self.workout.exercises.len(),
            current_set: self.state.current_set,
            set_count: exercise.sets,
            completed_sets: &self.state.completed_sets,
            state: self.state.running,
            rest_remaining: self.rest_remaining(),
            resumed: self.state.resumed,
            started_at: self.state.started_at,
        }
    }

    pub fn start(&mut self) -> bool {
        if self.state.running != RunningState::Idle {
            return self.ignored("start");
        }
        self.state.started_at = Some(self.progress.clock().now());
        self.state.running = RunningState::Active;
        debug!(workout = %self.workout.id, "session started");
        true
    }

    pub fn complete_current_set(&mut self) -> bool {
        if self.state.running != RunningState::Active {
            return self.ignored("complete_current_set");
        }
        let set_count = self.current_exercise().sets;
        self.state.completed_sets.insert(self.state.current_set);
        self.state.sets_logged += 1;
        debug!(
            exercise = self.state.exercise_index,
            set = self.state.current_set,
            "set completed"
        );

        if (self.state.completed_sets.len() as u32) < set_count {
            self.state.current_set = (self.state.current_set + 1).min(set_count);
            self.begin_rest();
        } else {
            self.state.completed_sets.clear();
            self.state.current_set = 1;
            if self.is_last_exercise() {
                self.finish();
            } else {
                self.state.exercise_index += 1;
                self.begin_rest();
            }
        }
        self.persist();
        true
    }

    /// End the rest early. Position already moved when the set was
    /// completed, so this never marks anything complete.
    pub fn skip_rest(&mut self) -> bool {
        if !self.state.running.is_resting() {
            return self.ignored("skip_rest");
        }
        self.timer.cancel();
        self.state.running = RunningState::Active;
        debug!(exercise = self.state.exercise_index, set = self.state.current_set, "rest skipped");
        true
    }

    pub fn pause_rest(&mut self) -> bool {
        if self.state.running != RunningState::Resting {
            return self.ignored("pause_rest");
        }
        self.timer.pause();
        self.state.running = RunningState::RestingPaused;
        debug!(remaining = self.timer.remaining(), "rest paused");
        true
    }

    pub fn resume_rest(&mut self) -> bool {
        if self.state.running != RunningState::RestingPaused {
            return self.ignored("resume_rest");
        }
        self.timer.resume();
        self.state.running = RunningState::Resting;
        debug!(remaining = self.timer.remaining(), "rest resumed");
        true
    }

    /// Move on to the next exercise without completing the current one.
    /// On the last exercise only the rest and set tracking are dropped;
    /// skipping never finishes a workout.
    pub fn skip_exercise(&mut self) -> bool {
        if self.state.running == RunningState::Finished {
            return self.ignored("skip_exercise");
        }
        self.timer.cancel();
        if self.state.started_at.is_none() {
            self.state.started_at = Some(self.progress.clock().now());
        }
        self.state.completed_sets.clear();
        self.state.current_set = 1;
        // the last exercise restarts from set 1 instead of finishing
        if !self.is_last_exercise() {
            self.state.exercise_index += 1;
            self.state.exercises_skipped += 1;
        }
        self.state.running = RunningState::Active;
        debug!(exercise = self.state.exercise_index, "exercise skipped");
        self.persist();
        true
    }

    pub fn reset(&mut self) -> bool {
        self.timer.cancel();
        self.state = SessionState::default();
        self.progress.clear(&self.workout.id);
        info!(workout = %self.workout.id, "session reset");
        true
    }

    /// Deliver one second of wall-clock time. Returns true when the rest
    /// period ran out on this tick.
    pub fn tick(&mut self) -> bool {
        if self.timer.tick() != TimerEvent::Elapsed {
            return false;
        }
        if self.state.running != RunningState::Resting {
            return false;
        }
        self.state.running = RunningState::Active;
        debug!(exercise = self.state.exercise_index, set = self.state.current_set, "rest finished");
        true
    }

    /// Available once the session is `Finished` and was started in this run
    pub fn summary(&self) -> Option<CompletionSummary> {
        let started_at = self.state.started_at?;
        let finished_at = self.state.finished_at?;
        Some(CompletionSummary {
            workout_id: self.workout.id.clone(),
            workout_name: self.workout.name.clone(),
            week: self.progress.current_week(),
            started_at,
            finished_at,
            sets_completed: self.state.sets_logged,
            exercises_skipped: self.state.exercises_skipped,
        })
    }

    pub fn snapshot(&self) -> ProgressSnapshot {
        let set_count = self.current_exercise().sets;
        ProgressSnapshot {
            workout_id: self.workout.id.clone(),
            exercise_index: self.state.exercise_index,
            current_set: self.state.current_set,
            completed_sets: self.state.completed_sets.clone(),
            week: self.progress.current_week(),
            completed: self.is_finished()
                || self.state.completed_sets.len() as u32 >= set_count,
            last_updated: self.progress.clock().now(),
        }
    }

    fn begin_rest(&mut self) {
        let rest = self.current_exercise().rest_secs;
        self.timer.start(rest);
        self.state.running = RunningState::Resting;
        debug!(secs = rest, "rest started");
    }

    fn finish(&mut self) {
        self.timer.cancel();
        self.state.running = RunningState::Finished;
        self.state.finished_at = Some(self.progress.clock().now());
        info!(workout = %self.workout.id, sets = self.state.sets_logged, "workout finished");
    }

    fn persist(&mut self) {
        let snapshot = self.snapshot();
        self.progress.save(&snapshot);
    }

    fn ignored(&self, transition: &str) -> bool {
        trace!(transition, state = %self.state.running, "transition ignored");
        false
    }
}

/// Session state from a snapshot, if it still describes a valid position
fn restore(workout: &WorkoutDefinition, snapshot: &ProgressSnapshot) -> Option<SessionState> {
    let exercise = workout.exercises.get(snapshot.exercise_index)?;
    let in_range = |n: &u32| (1..=exercise.sets).contains(n);
    if !in_range(&snapshot.current_set) || !snapshot.completed_sets.iter().all(in_range) {
        return None;
    }
    // an unfinished exercise always has its current set still open
    if !snapshot.completed
        && (snapshot.completed_sets.contains(&snapshot.current_set)
            || snapshot.completed_sets.len() as u32 >= exercise.sets)
    {
        return None;
    }
    Some(SessionState {
        exercise_index: snapshot.exercise_index,
        current_set: snapshot.current_set,
        completed_sets: snapshot.completed_sets.clone(),
        running: if snapshot.completed {
            RunningState::Finished
        } else {
            RunningState::Idle
        },
        resumed: true,
        ..SessionState::default()
    })
}
