//! Plan store - workout plans, weekly cycles and the record log
//!
//! Every mutation is followed by a full-state write of all three documents.

mod transfer;

pub use transfer::{ExportDocument, ImportSummary, export_file_name};

use std::collections::BTreeMap;

use anyhow::{Context, Result, bail};
use chrono::{Datelike, Local, Utc};
use serde::de::DeserializeOwned;
use tracing::{debug, error, info, warn};

use crate::db::Database;
use crate::plans::{
    CyclePlan, CycleType, Exercise, WorkoutPlan, WorkoutRecord, WorkoutType, next_id,
};

pub const KEY_WORKOUT_PLANS: &str = "workout-plans";
pub const KEY_CYCLE_PLANS: &str = "cycle-plans";
pub const KEY_WORKOUT_RECORDS: &str = "workout-records";

/// Fields for a new workout plan
#[derive(Debug, Clone)]
pub struct NewWorkoutPlan {
    pub name: String,
    pub workout_type: WorkoutType,
    pub exercises: Vec<Exercise>,
}

/// Partial update of a workout plan. `None` keeps the current value.
#[derive(Debug, Clone, Default)]
pub struct WorkoutPlanUpdate {
    pub name: Option<String>,
    pub workout_type: Option<WorkoutType>,
    pub exercises: Option<Vec<Exercise>>,
}

/// Fields for a new cycle plan
#[derive(Debug, Clone)]
pub struct NewCyclePlan {
    pub name: String,
    pub cycle_type: CycleType,
    pub workout_plans: Vec<String>,
    pub schedule: BTreeMap<u8, String>,
    pub active: bool,
}

/// Partial update of a cycle plan
#[derive(Debug, Clone, Default)]
pub struct CyclePlanUpdate {
    pub name: Option<String>,
    pub cycle_type: Option<CycleType>,
    pub workout_plans: Option<Vec<String>>,
    pub schedule: Option<BTreeMap<u8, String>>,
}

pub struct PlanStore {
    db: Database,
    workout_plans: Vec<WorkoutPlan>,
    cycle_plans: Vec<CyclePlan>,
    workout_records: Vec<WorkoutRecord>,
    current_plan_id: Option<String>,
}

/// In-memory state as it was before a mutation
struct Backup {
    workout_plans: Vec<WorkoutPlan>,
    cycle_plans: Vec<CyclePlan>,
    workout_records: Vec<WorkoutRecord>,
    current_plan_id: Option<String>,
}

impl PlanStore {
    /// Wrap a database and load whatever state it holds
    pub fn open(db: Database) -> Self {
        let mut store = Self {
            db,
            workout_plans: Vec::new(),
            cycle_plans: Vec::new(),
            workout_records: Vec::new(),
            current_plan_id: None,
        };
        store.load();
        store
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    /// Reload state from storage. Unreadable documents are logged and treated as empty.
    pub fn load(&mut self) {
        self.workout_plans = read_document(&self.db, KEY_WORKOUT_PLANS).unwrap_or_default();
        self.workout_records = read_document(&self.db, KEY_WORKOUT_RECORDS).unwrap_or_default();
        let mut cycles: Vec<CyclePlan> =
            read_document(&self.db, KEY_CYCLE_PLANS).unwrap_or_default();

        let dropped = rehydrate_cycles(&mut cycles, &self.workout_plans);
        if dropped > 0 {
            warn!("Dropped {} dangling plan references from cycles", dropped);
        }
        normalize_active(&mut cycles);
        self.cycle_plans = cycles;

        info!(
            "Loaded {} plans, {} cycles, {} records",
            self.workout_plans.len(),
            self.cycle_plans.len(),
            self.workout_records.len()
        );
    }

    /// Write the complete state in one transaction
    pub fn save(&self) -> Result<()> {
        let plans = serde_json::to_string(&self.workout_plans)?;
        let cycles = serde_json::to_string(&self.cycle_plans)?;
        let records = serde_json::to_string(&self.workout_records)?;
        self.db
            .set_items(&[
                (KEY_WORKOUT_PLANS, plans),
                (KEY_CYCLE_PLANS, cycles),
                (KEY_WORKOUT_RECORDS, records),
            ])
            .context("failed to save workout data")?;
        debug!(
            "Saved {} plans, {} cycles, {} records",
            self.workout_plans.len(),
            self.cycle_plans.len(),
            self.workout_records.len()
        );
        Ok(())
    }

    fn backup(&self) -> Backup {
        Backup {
            workout_plans: self.workout_plans.clone(),
            cycle_plans: self.cycle_plans.clone(),
            workout_records: self.workout_records.clone(),
            current_plan_id: self.current_plan_id.clone(),
        }
    }

    /// Save, or restore `backup` so memory never runs ahead of storage
    fn commit(&mut self, backup: Backup) -> Result<()> {
        if let Err(e) = self.save() {
            error!("Rolling back unsaved change: {:#}", e);
            self.workout_plans = backup.workout_plans;
            self.cycle_plans = backup.cycle_plans;
            self.workout_records = backup.workout_records;
            self.current_plan_id = backup.current_plan_id;
            return Err(e);
        }
        Ok(())
    }

    pub fn workout_plans(&self) -> &[WorkoutPlan] {
        &self.workout_plans
    }

    pub fn cycle_plans(&self) -> &[CyclePlan] {
        &self.cycle_plans
    }

    pub fn workout_records(&self) -> &[WorkoutRecord] {
        &self.workout_records
    }

    pub fn find_plan(&self, id: &str) -> Option<&WorkoutPlan> {
        self.workout_plans.iter().find(|p| p.id == id)
    }

    pub fn find_cycle(&self, id: &str) -> Option<&CyclePlan> {
        self.cycle_plans.iter().find(|c| c.id == id)
    }

    pub fn add_workout_plan(&mut self, plan: NewWorkoutPlan) -> Result<WorkoutPlan> {
        let backup = self.backup();
        let now = Utc::now();
        let plan = WorkoutPlan {
            id: next_id(),
            name: plan.name,
            workout_type: plan.workout_type,
            exercises: plan.exercises,
            created_at: now,
            updated_at: now,
        };
        info!("Adding workout plan '{}' ({})", plan.name, plan.id);
        self.workout_plans.push(plan.clone());
        self.commit(backup)?;
        Ok(plan)
    }

    /// Merge `update` into the plan with `id`. Returns `None` for an unknown id.
    pub fn update_workout_plan(
        &mut self,
        id: &str,
        update: WorkoutPlanUpdate,
    ) -> Result<Option<WorkoutPlan>> {
        let backup = self.backup();
        let Some(plan) = self.workout_plans.iter_mut().find(|p| p.id == id) else {
            warn!("Update of unknown workout plan {}", id);
            return Ok(None);
        };
        if let Some(name) = update.name {
            plan.name = name;
        }
        if let Some(workout_type) = update.workout_type {
            plan.workout_type = workout_type;
        }
        if let Some(exercises) = update.exercises {
            plan.exercises = exercises;
        }
        plan.updated_at = Utc::now();
        let updated = plan.clone();
        self.commit(backup)?;
        Ok(Some(updated))
    }

    /// Delete a plan and every cycle reference to it
    pub fn delete_workout_plan(&mut self, id: &str) -> Result<bool> {
        let backup = self.backup();
        let before = self.workout_plans.len();
        self.workout_plans.retain(|p| p.id != id);
        if self.workout_plans.len() == before {
            return Ok(false);
        }

        let now = Utc::now();
        for cycle in &mut self.cycle_plans {
            if cycle.forget_plan(id) {
                cycle.updated_at = now;
            }
        }
        if self.current_plan_id.as_deref() == Some(id) {
            self.current_plan_id = None;
        }

        info!("Deleted workout plan {}", id);
        self.commit(backup)?;
        Ok(true)
    }

    pub fn add_cycle_plan(&mut self, cycle: NewCyclePlan) -> Result<CyclePlan> {
        let (workout_plans, schedule) =
            self.validate_cycle_refs(cycle.workout_plans, cycle.schedule)?;
        let backup = self.backup();
        if cycle.active {
            self.deactivate_all();
        }

        let now = Utc::now();
        let cycle = CyclePlan {
            id: next_id(),
            name: cycle.name,
            cycle_type: cycle.cycle_type,
            workout_plans,
            schedule,
            active: cycle.active,
            created_at: now,
            updated_at: now,
        };
        info!("Adding cycle plan '{}' ({})", cycle.name, cycle.id);
        self.cycle_plans.push(cycle.clone());
        self.commit(backup)?;
        Ok(cycle)
    }

    pub fn update_cycle_plan(
        &mut self,
        id: &str,
        update: CyclePlanUpdate,
    ) -> Result<Option<CyclePlan>> {
        let backup = self.backup();
        let Some(index) = self.cycle_plans.iter().position(|c| c.id == id) else {
            warn!("Update of unknown cycle plan {}", id);
            return Ok(None);
        };

        let current = &self.cycle_plans[index];
        let plans = update.workout_plans.unwrap_or_else(|| current.workout_plans.clone());
        let schedule = update.schedule.unwrap_or_else(|| current.schedule.clone());
        let (workout_plans, schedule) = self.validate_cycle_refs(plans, schedule)?;

        let cycle = &mut self.cycle_plans[index];
        if let Some(name) = update.name {
            cycle.name = name;
        }
        if let Some(cycle_type) = update.cycle_type {
            cycle.cycle_type = cycle_type;
        }
        cycle.workout_plans = workout_plans;
        cycle.schedule = schedule;
        cycle.updated_at = Utc::now();
        let updated = cycle.clone();
        self.commit(backup)?;
        Ok(Some(updated))
    }

    pub fn delete_cycle_plan(&mut self, id: &str) -> Result<bool> {
        let backup = self.backup();
        let before = self.cycle_plans.len();
        self.cycle_plans.retain(|c| c.id != id);
        if self.cycle_plans.len() == before {
            return Ok(false);
        }
        info!("Deleted cycle plan {}", id);
        self.commit(backup)?;
        Ok(true)
    }

    /// Make `id` the only active cycle
    pub fn activate_cycle(&mut self, id: &str) -> Result<bool> {
        if self.find_cycle(id).is_none() {
            return Ok(false);
        }
        let backup = self.backup();
        let now = Utc::now();
        for cycle in &mut self.cycle_plans {
            let active = cycle.id == id;
            if cycle.active != active {
                cycle.active = active;
                cycle.updated_at = now;
            }
        }
        info!("Activated cycle plan {}", id);
        self.commit(backup)?;
        Ok(true)
    }

    pub fn set_current_workout_plan(&mut self, id: Option<String>) {
        self.current_plan_id = id;
    }

    pub fn current_workout_plan(&self) -> Option<&WorkoutPlan> {
        self.current_plan_id.as_deref().and_then(|id| self.find_plan(id))
    }

    /// Estimated time of the selected plan, rest included
    pub fn total_workout_time(&self) -> u32 {
        self.current_workout_plan()
            .map(WorkoutPlan::estimated_duration)
            .unwrap_or(0)
    }

    pub fn active_cycle_plan(&self) -> Option<&CyclePlan> {
        self.cycle_plans.iter().find(|c| c.active)
    }

    /// Plan scheduled by the active cycle for a day of week (0 = Sunday)
    pub fn workout_plan_for_day(&self, day: u8) -> Option<&WorkoutPlan> {
        let cycle = self.active_cycle_plan()?;
        let plan_id = cycle.schedule.get(&day)?;
        self.find_plan(plan_id)
    }

    pub fn today_workout_plan(&self) -> Option<&WorkoutPlan> {
        let today = Local::now().weekday().num_days_from_sunday() as u8;
        self.workout_plan_for_day(today)
    }

    /// Log a finished workout by hand
    pub fn record_workout(&mut self, plan_id: &str, duration: u32) -> Result<WorkoutRecord> {
        if self.find_plan(plan_id).is_none() {
            bail!("unknown workout plan: {}", plan_id);
        }
        let record = WorkoutRecord::completed(plan_id, duration);
        self.append_record(record.clone())?;
        Ok(record)
    }

    /// Append a record to the log
    pub fn append_record(&mut self, record: WorkoutRecord) -> Result<()> {
        let backup = self.backup();
        info!("Recording workout {} for plan {} ({}s)", record.id, record.plan_id, record.duration);
        self.workout_records.push(record);
        self.commit(backup)
    }

    pub fn records_for_plan<'a>(
        &'a self,
        plan_id: &'a str,
    ) -> impl Iterator<Item = &'a WorkoutRecord> + 'a {
        self.workout_records.iter().filter(move |r| r.plan_id == plan_id)
    }

    /// Records newest first
    pub fn recent_records(&self, limit: usize) -> Vec<&WorkoutRecord> {
        let mut records: Vec<_> = self.workout_records.iter().collect();
        records.sort_by(|a, b| b.date.cmp(&a.date));
        records.truncate(limit);
        records
    }

    fn deactivate_all(&mut self) {
        let now = Utc::now();
        for cycle in self.cycle_plans.iter_mut().filter(|c| c.active) {
            cycle.active = false;
            cycle.updated_at = now;
        }
    }

    /// Reject unknown plan ids and bad days; scheduled plans join the plan set
    fn validate_cycle_refs(
        &self,
        mut workout_plans: Vec<String>,
        schedule: BTreeMap<u8, String>,
    ) -> Result<(Vec<String>, BTreeMap<u8, String>)> {
        for (day, plan_id) in &schedule {
            if *day > 6 {
                bail!("day of week must be 0-6 (0 = Sunday), got {}", day);
            }
            if !workout_plans.contains(plan_id) {
                workout_plans.push(plan_id.clone());
            }
        }
        let mut seen = Vec::with_capacity(workout_plans.len());
        for plan_id in workout_plans {
            if self.find_plan(&plan_id).is_none() {
                bail!("unknown workout plan: {}", plan_id);
            }
            if !seen.contains(&plan_id) {
                seen.push(plan_id);
            }
        }
        Ok((seen, schedule))
    }
}

fn read_document<T: DeserializeOwned>(db: &Database, key: &str) -> Option<T> {
    let raw = match db.get_item(key) {
        Ok(Some(raw)) => raw,
        Ok(None) => {
            debug!("No saved data under '{}'", key);
            return None;
        }
        Err(e) => {
            error!("Failed to read '{}': {}", key, e);
            return None;
        }
    };
    match serde_json::from_str(&raw) {
        Ok(value) => Some(value),
        Err(e) => {
            error!("Failed to parse '{}': {}", key, e);
            None
        }
    }
}

/// Drop cycle references to plans that do not exist. Returns the number dropped.
pub(crate) fn rehydrate_cycles(cycles: &mut [CyclePlan], plans: &[WorkoutPlan]) -> usize {
    let exists = |id: &String| plans.iter().any(|p| &p.id == id);
    let mut dropped = 0;
    for cycle in cycles.iter_mut() {
        let before = cycle.workout_plans.len() + cycle.schedule.len();
        cycle.workout_plans.retain(|id| exists(id));
        cycle.schedule.retain(|day, id| *day <= 6 && exists(id));
        dropped += before - (cycle.workout_plans.len() + cycle.schedule.len());
    }
    dropped
}

/// Keep only the first active cycle active
pub(crate) fn normalize_active(cycles: &mut [CyclePlan]) {
    let mut seen_active = false;
    for cycle in cycles.iter_mut().filter(|c| c.active) {
        if seen_active {
            warn!("Deactivating extra active cycle {}", cycle.id);
            cycle.active = false;
        }
        seen_active = true;
    }
}
