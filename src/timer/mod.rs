//! Workout timer - countdown sequencer over a workout plan
//!
//! `idle -> exercise -> rest -> exercise -> ... -> completed`. Rest is skipped after
//! the last set of an exercise. The sequencer is driven by one-second ticks and
//! reports what happened as [`TimerEvent`]s; scheduling the ticks and acting on the
//! events is left to [`session::Session`] and [`runner`].

pub mod runner;
pub mod session;

pub use runner::{SessionCommand, SessionHandle, spawn_session};
pub use session::{RecordLog, Session};

use chrono::{DateTime, Utc};

use crate::plans::{Exercise, WorkoutPlan, WorkoutRecord};

/// Delay between loading a plan and starting its first exercise
pub const START_DELAY_MS: u64 = 500;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum TimerState {
    #[default]
    Idle,
    Exercise,
    Rest,
    Completed,
}

impl TimerState {
    pub fn label(&self) -> &'static str {
        match self {
            TimerState::Idle => "idle",
            TimerState::Exercise => "exercise",
            TimerState::Rest => "rest",
            TimerState::Completed => "completed",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TimerEvent {
    /// Plan loaded; the first exercise waits for [`WorkoutTimer::begin`]
    Armed,
    PhaseStarted {
        state: TimerState,
        previous: TimerState,
        duration: u32,
    },
    /// Paused phase continues with its preserved remaining time
    Resumed {
        state: TimerState,
        remaining: u32,
    },
    Paused,
    /// Workout finished. `None` when the plan had nothing to record.
    Completed(Option<WorkoutRecord>),
    Reset,
}

/// Renderable copy of the timer
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TimerSnapshot {
    pub state: TimerState,
    pub running: bool,
    pub plan_name: Option<String>,
    pub exercise_name: Option<String>,
    pub next_exercise_name: Option<String>,
    pub exercise_index: usize,
    pub exercise_count: usize,
    pub set_index: usize,
    pub total_sets: u32,
    pub time_remaining: u32,
    pub progress: f64,
    pub total_workout_time: u32,
}

#[derive(Debug, Clone, Default)]
pub struct WorkoutTimer {
    plan: Option<WorkoutPlan>,
    state: TimerState,
    exercise_index: usize,
    set_index: usize,
    time_remaining: u32,
    running: bool,
    total_workout_time: u32,
    started_at: Option<DateTime<Utc>>,
}

impl WorkoutTimer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a plan and rewind everything. An empty plan completes at once.
    pub fn init(&mut self, plan: WorkoutPlan) -> Vec<TimerEvent> {
        tracing::info!("Initializing workout '{}'", plan.name);

        self.exercise_index = 0;
        self.set_index = 0;
        self.state = TimerState::Idle;
        self.running = false;
        self.started_at = Some(Utc::now());
        self.total_workout_time = 0;

        let first = plan.exercises.first().map(|e| e.time_per_set);
        self.plan = Some(plan);

        match first {
            Some(time_per_set) => {
                self.time_remaining = time_per_set;
                vec![TimerEvent::Armed]
            }
            None => {
                tracing::warn!("Workout plan has no exercises");
                self.time_remaining = 0;
                self.state = TimerState::Completed;
                vec![TimerEvent::Completed(None)]
            }
        }
    }

    /// Start the armed first exercise
    pub fn begin(&mut self) -> Vec<TimerEvent> {
        if self.state != TimerState::Idle || self.current_exercise().is_none() {
            return Vec::new();
        }
        vec![self.start_phase(TimerState::Exercise)]
    }

    /// Advance one second
    pub fn tick(&mut self) -> Vec<TimerEvent> {
        if !self.running {
            return Vec::new();
        }
        if self.time_remaining > 0 {
            self.time_remaining -= 1;
            if self.state == TimerState::Exercise {
                self.total_workout_time += 1;
            }
        }
        if self.time_remaining > 0 {
            return Vec::new();
        }
        match self.state {
            TimerState::Exercise => self.exercise_completed(),
            TimerState::Rest => self.rest_completed(),
            TimerState::Idle | TimerState::Completed => Vec::new(),
        }
    }

    pub fn pause(&mut self) -> Vec<TimerEvent> {
        if !self.running {
            return Vec::new();
        }
        self.running = false;
        vec![TimerEvent::Paused]
    }

    /// Continue the current phase, or restart the first exercise from idle/completed
    pub fn resume(&mut self) -> Vec<TimerEvent> {
        match self.state {
            TimerState::Idle | TimerState::Completed => {
                let Some(time_per_set) = self.current_exercise().map(|e| e.time_per_set) else {
                    return Vec::new();
                };
                self.time_remaining = time_per_set;
                vec![self.start_phase(TimerState::Exercise)]
            }
            state => {
                self.running = true;
                vec![TimerEvent::Resumed {
                    state,
                    remaining: self.time_remaining,
                }]
            }
        }
    }

    pub fn toggle_pause(&mut self) -> Vec<TimerEvent> {
        if self.running { self.pause() } else { self.resume() }
    }

    /// Finish the current phase early
    pub fn skip(&mut self) -> Vec<TimerEvent> {
        match self.state {
            TimerState::Exercise => self.exercise_completed(),
            TimerState::Rest => self.rest_completed(),
            TimerState::Idle | TimerState::Completed => Vec::new(),
        }
    }

    /// Back to idle at the first exercise with no accumulated time
    pub fn reset(&mut self) -> Vec<TimerEvent> {
        self.running = false;
        self.state = TimerState::Idle;
        self.exercise_index = 0;
        self.set_index = 0;
        self.time_remaining = 0;
        self.total_workout_time = 0;
        self.started_at = Some(Utc::now());
        vec![TimerEvent::Reset]
    }

    fn start_phase(&mut self, state: TimerState) -> TimerEvent {
        tracing::debug!("Starting {} phase ({}s)", state.label(), self.time_remaining);
        let previous = self.state;
        self.state = state;
        self.running = true;
        TimerEvent::PhaseStarted {
            state,
            previous,
            duration: self.time_remaining,
        }
    }

    fn exercise_completed(&mut self) -> Vec<TimerEvent> {
        let Some((sets, rest)) = self
            .current_exercise()
            .map(|e| (e.sets, e.rest_between_sets))
        else {
            return self.complete();
        };
        if self.set_index + 1 < sets as usize {
            self.set_index += 1;
            self.time_remaining = rest;
            vec![self.start_phase(TimerState::Rest)]
        } else {
            self.move_to_next_exercise()
        }
    }

    fn rest_completed(&mut self) -> Vec<TimerEvent> {
        let Some(time_per_set) = self.current_exercise().map(|e| e.time_per_set) else {
            return self.complete();
        };
        self.time_remaining = time_per_set;
        vec![self.start_phase(TimerState::Exercise)]
    }

    fn move_to_next_exercise(&mut self) -> Vec<TimerEvent> {
        self.exercise_index += 1;
        self.set_index = 0;
        match self.current_exercise().map(|e| e.time_per_set) {
            Some(time_per_set) => {
                self.time_remaining = time_per_set;
                vec![self.start_phase(TimerState::Exercise)]
            }
            None => self.complete(),
        }
    }

    fn complete(&mut self) -> Vec<TimerEvent> {
        self.running = false;
        self.time_remaining = 0;
        self.state = TimerState::Completed;

        let record = match (&self.plan, self.started_at) {
            (Some(plan), Some(_)) => {
                Some(WorkoutRecord::completed(&plan.id, self.total_workout_time))
            }
            _ => None,
        };
        tracing::info!("Workout completed, {}s of exercise", self.total_workout_time);
        vec![TimerEvent::Completed(record)]
    }

    pub fn state(&self) -> TimerState {
        self.state
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn plan(&self) -> Option<&WorkoutPlan> {
        self.plan.as_ref()
    }

    pub fn exercise_index(&self) -> usize {
        self.exercise_index
    }

    pub fn set_index(&self) -> usize {
        self.set_index
    }

    pub fn time_remaining(&self) -> u32 {
        self.time_remaining
    }

    /// Seconds spent in exercise phases this session
    pub fn total_workout_time(&self) -> u32 {
        self.total_workout_time
    }

    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        self.started_at
    }

    pub fn current_exercise(&self) -> Option<&Exercise> {
        self.plan.as_ref()?.exercises.get(self.exercise_index)
    }

    pub fn total_sets(&self) -> u32 {
        self.current_exercise().map(|e| e.sets).unwrap_or(0)
    }

    pub fn is_last_set(&self) -> bool {
        self.set_index + 1 == self.total_sets() as usize
    }

    pub fn is_last_exercise(&self) -> bool {
        match &self.plan {
            Some(plan) => self.exercise_index + 1 >= plan.exercises.len(),
            None => true,
        }
    }

    /// Fraction of the current phase already elapsed
    pub fn progress(&self) -> f64 {
        let Some(exercise) = self.current_exercise() else {
            return 0.0;
        };
        let total = match self.state {
            TimerState::Exercise => exercise.time_per_set,
            TimerState::Rest => exercise.rest_between_sets,
            TimerState::Idle | TimerState::Completed => return 0.0,
        };
        if total == 0 {
            return 0.0;
        }
        1.0 - f64::from(self.time_remaining) / f64::from(total)
    }

    pub fn snapshot(&self) -> TimerSnapshot {
        let exercises = self.plan.as_ref().map(|p| p.exercises.as_slice()).unwrap_or_default();
        TimerSnapshot {
            state: self.state,
            running: self.running,
            plan_name: self.plan.as_ref().map(|p| p.name.clone()),
            exercise_name: self.current_exercise().map(|e| e.name.clone()),
            next_exercise_name: exercises.get(self.exercise_index + 1).map(|e| e.name.clone()),
            exercise_index: self.exercise_index,
            exercise_count: exercises.len(),
            set_index: self.set_index,
            total_sets: self.total_sets(),
            time_remaining: self.time_remaining,
            progress: self.progress(),
            total_workout_time: self.total_workout_time,
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::plans::WorkoutType;

    pub(crate) fn plan_with(exercises: Vec<Exercise>) -> WorkoutPlan {
        WorkoutPlan {
            id: "plan-1".to_string(),
            name: "test plan".to_string(),
            workout_type: WorkoutType::Custom,
            exercises,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn started(plan: WorkoutPlan) -> WorkoutTimer {
        let mut timer = WorkoutTimer::new();
        assert_eq!(timer.init(plan), vec![TimerEvent::Armed]);
        timer.begin();
        timer
    }

    fn tick_n(timer: &mut WorkoutTimer, n: u32) -> Vec<TimerEvent> {
        (0..n).flat_map(|_| timer.tick()).collect()
    }

    /// Tick to completion, counting phases and the seconds spent in each kind
    fn run_to_end(timer: &mut WorkoutTimer) -> (usize, usize, u32, Option<WorkoutRecord>) {
        let (mut exercises, mut rests, mut rest_secs) = (1, 0, 0);
        for _ in 0..100_000 {
            let in_rest = timer.state() == TimerState::Rest;
            let events = timer.tick();
            if in_rest {
                rest_secs += 1;
            }
            for event in events {
                match event {
                    TimerEvent::PhaseStarted { state: TimerState::Exercise, .. } => exercises += 1,
                    TimerEvent::PhaseStarted { state: TimerState::Rest, .. } => rests += 1,
                    TimerEvent::Completed(record) => return (exercises, rests, rest_secs, record),
                    _ => {}
                }
            }
        }
        panic!("workout never completed");
    }

    #[test]
    fn test_init_arms_first_exercise() {
        let mut timer = WorkoutTimer::new();
        timer.init(plan_with(vec![Exercise::new("squats", 3, 40, 30)]));
        assert_eq!(timer.state(), TimerState::Idle);
        assert!(!timer.is_running());
        assert_eq!(timer.time_remaining(), 40);
        assert!(timer.started_at().is_some());
        // Idle does not tick
        assert!(timer.tick().is_empty());
        assert_eq!(timer.time_remaining(), 40);
    }

    #[test]
    fn test_begin_starts_exercise() {
        let mut timer = WorkoutTimer::new();
        timer.init(plan_with(vec![Exercise::new("squats", 3, 40, 30)]));
        let events = timer.begin();
        assert_eq!(
            events,
            vec![TimerEvent::PhaseStarted {
                state: TimerState::Exercise,
                previous: TimerState::Idle,
                duration: 40,
            }]
        );
        assert!(timer.is_running());
        assert!(timer.begin().is_empty());
    }

    #[test]
    fn test_empty_plan_completes_immediately() {
        let mut timer = WorkoutTimer::new();
        let events = timer.init(plan_with(vec![]));
        assert_eq!(events, vec![TimerEvent::Completed(None)]);
        assert_eq!(timer.state(), TimerState::Completed);
        assert_eq!(timer.total_workout_time(), 0);
        assert!(timer.begin().is_empty());
        assert!(timer.resume().is_empty());
    }

    #[test]
    fn test_three_sets_example() {
        let mut timer = started(plan_with(vec![Exercise::new("squats", 3, 40, 30)]));
        let (exercises, rests, rest_secs, record) = run_to_end(&mut timer);
        assert_eq!(exercises, 3);
        assert_eq!(rests, 2);
        assert_eq!(rest_secs, 60);
        assert_eq!(timer.total_workout_time(), 120);
        let record = record.unwrap();
        assert_eq!(record.duration, 120);
        assert_eq!(record.plan_id, "plan-1");
        assert!(record.completed);
        assert_eq!(timer.state(), TimerState::Completed);
        assert!(!timer.is_running());
    }

    #[test]
    fn test_phase_counts_for_many_shapes() {
        for n in 1..4usize {
            for s in 1..5u32 {
                let exercises = (0..n)
                    .map(|i| Exercise::new(format!("ex{}", i), s, 3, 2))
                    .collect();
                let mut timer = started(plan_with(exercises));
                let (exercises, rests, _, record) = run_to_end(&mut timer);
                assert_eq!(exercises, n * s as usize, "n={} s={}", n, s);
                assert_eq!(rests, n * (s as usize - 1), "n={} s={}", n, s);
                assert_eq!(record.unwrap().duration, n as u32 * s * 3);
            }
        }
    }

    #[test]
    fn test_exercise_to_rest_transition() {
        let mut timer = started(plan_with(vec![Exercise::new("squats", 2, 3, 5)]));
        assert!(tick_n(&mut timer, 2).is_empty());
        assert_eq!(timer.time_remaining(), 1);
        let events = timer.tick();
        assert_eq!(
            events,
            vec![TimerEvent::PhaseStarted {
                state: TimerState::Rest,
                previous: TimerState::Exercise,
                duration: 5,
            }]
        );
        assert_eq!(timer.set_index(), 1);
        assert!(timer.is_last_set());
    }

    #[test]
    fn test_rest_does_not_count_as_workout_time() {
        let mut timer = started(plan_with(vec![Exercise::new("squats", 2, 3, 5)]));
        tick_n(&mut timer, 3);
        assert_eq!(timer.state(), TimerState::Rest);
        tick_n(&mut timer, 4);
        assert_eq!(timer.total_workout_time(), 3);
    }

    #[test]
    fn test_last_set_moves_to_next_exercise() {
        let mut timer = started(plan_with(vec![
            Exercise::new("squats", 1, 2, 30),
            Exercise::new("lunges", 1, 4, 30),
        ]));
        assert!(!timer.is_last_exercise());
        let events = tick_n(&mut timer, 2);
        assert_eq!(
            events,
            vec![TimerEvent::PhaseStarted {
                state: TimerState::Exercise,
                previous: TimerState::Exercise,
                duration: 4,
            }]
        );
        assert_eq!(timer.exercise_index(), 1);
        assert_eq!(timer.set_index(), 0);
        assert!(timer.is_last_exercise());
        assert_eq!(timer.current_exercise().unwrap().name, "lunges");
    }

    #[test]
    fn test_skip_during_rest_starts_exercise_with_full_duration() {
        let mut timer = started(plan_with(vec![Exercise::new("squats", 3, 40, 30)]));
        timer.skip();
        assert_eq!(timer.state(), TimerState::Rest);
        assert_eq!(timer.time_remaining(), 30);
        tick_n(&mut timer, 10);

        let events = timer.skip();
        assert_eq!(
            events,
            vec![TimerEvent::PhaseStarted {
                state: TimerState::Exercise,
                previous: TimerState::Rest,
                duration: 40,
            }]
        );
        assert_eq!(timer.time_remaining(), 40);
        assert_eq!(timer.set_index(), 1);
    }

    #[test]
    fn test_skip_last_phase_completes() {
        let mut timer = started(plan_with(vec![Exercise::new("plank", 1, 60, 0)]));
        tick_n(&mut timer, 10);
        let events = timer.skip();
        match events.as_slice() {
            [TimerEvent::Completed(Some(record))] => assert_eq!(record.duration, 10),
            other => panic!("unexpected events {:?}", other),
        }
        assert!(timer.skip().is_empty());
    }

    #[test]
    fn test_pause_resume_preserves_remaining() {
        let mut timer = started(plan_with(vec![Exercise::new("squats", 3, 40, 30)]));
        tick_n(&mut timer, 13);
        assert_eq!(timer.time_remaining(), 27);

        assert_eq!(timer.pause(), vec![TimerEvent::Paused]);
        assert!(timer.pause().is_empty());
        tick_n(&mut timer, 5);
        assert_eq!(timer.time_remaining(), 27);
        assert_eq!(timer.total_workout_time(), 13);

        let events = timer.resume();
        assert_eq!(
            events,
            vec![TimerEvent::Resumed { state: TimerState::Exercise, remaining: 27 }]
        );
        assert_eq!(timer.time_remaining(), 27);
        timer.tick();
        assert_eq!(timer.time_remaining(), 26);
    }

    #[test]
    fn test_toggle_pause() {
        let mut timer = started(plan_with(vec![Exercise::new("squats", 1, 10, 0)]));
        timer.toggle_pause();
        assert!(!timer.is_running());
        timer.toggle_pause();
        assert!(timer.is_running());
        assert_eq!(timer.state(), TimerState::Exercise);
    }

    #[test]
    fn test_reset_then_resume_restarts_first_exercise() {
        let mut timer = started(plan_with(vec![
            Exercise::new("squats", 2, 10, 5),
            Exercise::new("lunges", 2, 10, 5),
        ]));
        tick_n(&mut timer, 30);
        assert_eq!(timer.exercise_index(), 1);

        assert_eq!(timer.reset(), vec![TimerEvent::Reset]);
        assert_eq!(timer.state(), TimerState::Idle);
        assert_eq!(timer.total_workout_time(), 0);
        assert_eq!(timer.time_remaining(), 0);
        assert!(!timer.is_running());

        timer.resume();
        assert_eq!(timer.state(), TimerState::Exercise);
        assert_eq!(timer.exercise_index(), 0);
        assert_eq!(timer.time_remaining(), 10);
    }

    #[test]
    fn test_resume_after_completion_is_noop() {
        let mut timer = started(plan_with(vec![Exercise::new("squats", 1, 1, 0)]));
        timer.tick();
        assert_eq!(timer.state(), TimerState::Completed);
        assert!(timer.resume().is_empty());
        assert!(timer.tick().is_empty());
    }

    #[test]
    fn test_zero_rest_elapses_on_next_tick() {
        let mut timer = started(plan_with(vec![Exercise::new("burpees", 2, 2, 0)]));
        tick_n(&mut timer, 2);
        assert_eq!(timer.state(), TimerState::Rest);
        timer.tick();
        assert_eq!(timer.state(), TimerState::Exercise);
        assert_eq!(timer.time_remaining(), 2);
    }

    #[test]
    fn test_progress() {
        let mut timer = started(plan_with(vec![Exercise::new("squats", 2, 40, 20)]));
        assert_eq!(timer.progress(), 0.0);
        tick_n(&mut timer, 10);
        assert!((timer.progress() - 0.25).abs() < 1e-9);
        tick_n(&mut timer, 30);
        assert_eq!(timer.state(), TimerState::Rest);
        tick_n(&mut timer, 10);
        assert!((timer.progress() - 0.5).abs() < 1e-9);

        timer.reset();
        assert_eq!(timer.progress(), 0.0);
    }

    #[test]
    fn test_snapshot() {
        let mut timer = started(plan_with(vec![
            Exercise::new("squats", 3, 40, 30),
            Exercise::new("lunges", 2, 30, 30),
        ]));
        tick_n(&mut timer, 5);
        let snap = timer.snapshot();
        assert_eq!(snap.state, TimerState::Exercise);
        assert!(snap.running);
        assert_eq!(snap.plan_name.as_deref(), Some("test plan"));
        assert_eq!(snap.exercise_name.as_deref(), Some("squats"));
        assert_eq!(snap.next_exercise_name.as_deref(), Some("lunges"));
        assert_eq!(snap.exercise_count, 2);
        assert_eq!(snap.total_sets, 3);
        assert_eq!(snap.time_remaining, 35);
        assert_eq!(snap.total_workout_time, 5);
    }
}
