//! Session - a workout timer wired to the record log and feedback

use std::sync::{Arc, Mutex};

use anyhow::{Result, anyhow};
use tracing::{error, info};

use super::{TimerEvent, TimerSnapshot, TimerState, WorkoutTimer};
use crate::plans::{WorkoutPlan, WorkoutRecord};
use crate::settings::{COMPLETION_PATTERN, Feedback, Sound};
use crate::store::PlanStore;

/// Where finished sessions are written
pub trait RecordLog {
    fn append_record(&mut self, record: WorkoutRecord) -> Result<()>;
}

impl RecordLog for PlanStore {
    fn append_record(&mut self, record: WorkoutRecord) -> Result<()> {
        PlanStore::append_record(self, record)
    }
}

impl RecordLog for Arc<Mutex<PlanStore>> {
    fn append_record(&mut self, record: WorkoutRecord) -> Result<()> {
        let mut store = self
            .lock()
            .map_err(|e| anyhow!("Failed to lock plan store: {}", e))?;
        store.append_record(record)
    }
}

impl RecordLog for Vec<WorkoutRecord> {
    fn append_record(&mut self, record: WorkoutRecord) -> Result<()> {
        self.push(record);
        Ok(())
    }
}

/// One workout run: the timer plus its side effects
pub struct Session<F, L> {
    timer: WorkoutTimer,
    feedback: F,
    log: L,
}

impl<F: Feedback, L: RecordLog> Session<F, L> {
    pub fn new(feedback: F, log: L) -> Self {
        Self {
            timer: WorkoutTimer::new(),
            feedback,
            log,
        }
    }

    pub fn timer(&self) -> &WorkoutTimer {
        &self.timer
    }

    pub fn log(&self) -> &L {
        &self.log
    }

    pub fn snapshot(&self) -> TimerSnapshot {
        self.timer.snapshot()
    }

    pub fn start(&mut self, plan: WorkoutPlan) -> Vec<TimerEvent> {
        let events = self.timer.init(plan);
        self.apply(events)
    }

    pub fn begin(&mut self) -> Vec<TimerEvent> {
        let events = self.timer.begin();
        self.apply(events)
    }

    pub fn tick(&mut self) -> Vec<TimerEvent> {
        let events = self.timer.tick();
        self.apply(events)
    }

    pub fn pause(&mut self) -> Vec<TimerEvent> {
        let events = self.timer.pause();
        self.apply(events)
    }

    pub fn resume(&mut self) -> Vec<TimerEvent> {
        let events = self.timer.resume();
        self.apply(events)
    }

    pub fn toggle_pause(&mut self) -> Vec<TimerEvent> {
        let events = self.timer.toggle_pause();
        self.apply(events)
    }

    pub fn skip(&mut self) -> Vec<TimerEvent> {
        let events = self.timer.skip();
        self.apply(events)
    }

    pub fn reset(&mut self) -> Vec<TimerEvent> {
        let events = self.timer.reset();
        self.apply(events)
    }

    fn apply(&mut self, events: Vec<TimerEvent>) -> Vec<TimerEvent> {
        for event in &events {
            match event {
                TimerEvent::PhaseStarted {
                    state: TimerState::Exercise,
                    previous: TimerState::Rest,
                    ..
                } => {
                    self.feedback.play_sound(Sound::RestEnd);
                }
                TimerEvent::PhaseStarted { state: TimerState::Exercise, .. } => {
                    self.feedback.play_sound(Sound::ExerciseStart);
                }
                TimerEvent::PhaseStarted {
                    state: TimerState::Rest,
                    previous: TimerState::Exercise,
                    ..
                } => {
                    self.feedback.play_sound(Sound::ExerciseEnd);
                }
                TimerEvent::Completed(Some(record)) => {
                    match self.log.append_record(record.clone()) {
                        Ok(()) => {
                            info!("Saved workout record {} ({}s)", record.id, record.duration)
                        }
                        Err(e) => error!("Failed to save workout record {}: {}", record.id, e),
                    }
                    self.feedback.play_sound(Sound::ExerciseEnd);
                    self.feedback.vibrate(&COMPLETION_PATTERN);
                }
                _ => {}
            }
        }
        events
    }
}
