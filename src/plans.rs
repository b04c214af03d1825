//! Plan definitions - exercises, workout plans, weekly cycles and records

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicI64, Ordering};

use anyhow::{Context, Result, anyhow, bail};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

static LAST_ID: AtomicI64 = AtomicI64::new(0);

/// Time-based identifier (epoch milliseconds), strictly increasing within the process
pub fn next_id() -> String {
    let now = Utc::now().timestamp_millis();
    let mut last = LAST_ID.load(Ordering::Relaxed);
    loop {
        let candidate = now.max(last + 1);
        match LAST_ID.compare_exchange_weak(last, candidate, Ordering::Relaxed, Ordering::Relaxed) {
            Ok(_) => return candidate.to_string(),
            Err(actual) => last = actual,
        }
    }
}

/// Workout category tag
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum WorkoutType {
    #[serde(alias = "推")]
    Push,
    #[serde(alias = "拉")]
    Pull,
    #[serde(alias = "腿")]
    Legs,
    #[serde(alias = "胸")]
    Chest,
    #[serde(alias = "背")]
    Back,
    #[serde(alias = "肩")]
    Shoulders,
    #[serde(alias = "手臂")]
    Arms,
    Custom,
}

impl WorkoutType {
    pub fn emoji(&self) -> &'static str {
        match self {
            WorkoutType::Push => "💪",
            WorkoutType::Pull => "🏋️",
            WorkoutType::Legs => "🦵",
            WorkoutType::Chest => "🫀",
            WorkoutType::Back => "🔙",
            WorkoutType::Shoulders => "🤷",
            WorkoutType::Arms => "🦾",
            WorkoutType::Custom => "⭐",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            WorkoutType::Push => "push",
            WorkoutType::Pull => "pull",
            WorkoutType::Legs => "legs",
            WorkoutType::Chest => "chest",
            WorkoutType::Back => "back",
            WorkoutType::Shoulders => "shoulders",
            WorkoutType::Arms => "arms",
            WorkoutType::Custom => "custom",
        }
    }

    /// All categories for iteration
    pub fn all() -> &'static [WorkoutType] {
        &[
            WorkoutType::Push,
            WorkoutType::Pull,
            WorkoutType::Legs,
            WorkoutType::Chest,
            WorkoutType::Back,
            WorkoutType::Shoulders,
            WorkoutType::Arms,
            WorkoutType::Custom,
        ]
    }
}

impl fmt::Display for WorkoutType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for WorkoutType {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        let needle = s.trim().to_lowercase();
        WorkoutType::all()
            .iter()
            .copied()
            .find(|t| t.as_str() == needle)
            .ok_or_else(|| {
                anyhow!(
                    "unknown workout type '{}' (expected one of: {})",
                    s,
                    WorkoutType::all().iter().map(|t| t.as_str()).collect::<Vec<_>>().join(", ")
                )
            })
    }
}

/// Weekly cycle layout
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "kebab-case")]
pub enum CycleType {
    ThreeSplit,
    FiveSplit,
    Custom,
}

impl CycleType {
    pub fn as_str(&self) -> &'static str {
        match self {
            CycleType::ThreeSplit => "three-split",
            CycleType::FiveSplit => "five-split",
            CycleType::Custom => "custom",
        }
    }
}

impl fmt::Display for CycleType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CycleType {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "three-split" | "3" => Ok(CycleType::ThreeSplit),
            "five-split" | "5" => Ok(CycleType::FiveSplit),
            "custom" => Ok(CycleType::Custom),
            _ => bail!("unknown cycle type '{}' (expected three-split, five-split or custom)", s),
        }
    }
}

/// One movement in a plan
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Exercise {
    pub id: String,
    pub name: String,
    pub sets: u32,
    pub time_per_set: u32,      // seconds
    pub rest_between_sets: u32, // seconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

impl Exercise {
    pub fn new(
        name: impl Into<String>,
        sets: u32,
        time_per_set: u32,
        rest_between_sets: u32,
    ) -> Self {
        Self {
            id: next_id(),
            name: name.into(),
            sets,
            time_per_set,
            rest_between_sets,
            note: None,
        }
    }

    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.note = Some(note.into());
        self
    }

    /// Active time plus rest between sets
    pub fn estimated_duration(&self) -> u32 {
        self.active_duration()
            .saturating_add(self.sets.saturating_sub(1).saturating_mul(self.rest_between_sets))
    }

    /// Time under work in seconds, rest excluded
    pub fn active_duration(&self) -> u32 {
        self.sets.saturating_mul(self.time_per_set)
    }

    /// Parse `name:sets[:timePerSet[:rest[:note]]]`, filling timings from defaults
    pub fn parse_spec(spec: &str, default_time: u32, default_rest: u32) -> Result<Self> {
        let mut parts = spec.splitn(5, ':');
        let name = parts.next().map(str::trim).unwrap_or_default();
        if name.is_empty() {
            bail!("exercise '{}' has no name", spec);
        }

        let sets: u32 = match parts.next() {
            Some(s) => s
                .trim()
                .parse()
                .with_context(|| format!("invalid set count in '{}'", spec))?,
            None => bail!(
                "exercise '{}' is missing a set count (name:sets[:time[:rest[:note]]])",
                spec
            ),
        };
        if sets == 0 {
            bail!("exercise '{}' needs at least one set", spec);
        }

        let time_per_set = match parts.next().map(str::trim).filter(|s| !s.is_empty()) {
            Some(s) => s.parse().with_context(|| format!("invalid time per set in '{}'", spec))?,
            None => default_time,
        };
        let rest = match parts.next().map(str::trim).filter(|s| !s.is_empty()) {
            Some(s) => s.parse().with_context(|| format!("invalid rest time in '{}'", spec))?,
            None => default_rest,
        };

        let mut exercise = Exercise::new(name, sets, time_per_set, rest);
        if let Some(note) = parts.next().map(str::trim).filter(|s| !s.is_empty()) {
            exercise = exercise.with_note(note);
        }
        Ok(exercise)
    }
}

/// Workout plan - an ordered list of exercises
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkoutPlan {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub workout_type: WorkoutType,
    #[serde(default)]
    pub exercises: Vec<Exercise>,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
    #[serde(default = "Utc::now")]
    pub updated_at: DateTime<Utc>,
}

impl WorkoutPlan {
    /// Total planned time in seconds, rest included
    pub fn estimated_duration(&self) -> u32 {
        self.exercises
            .iter()
            .map(Exercise::estimated_duration)
            .fold(0, u32::saturating_add)
    }

    /// Planned time in seconds with rest excluded
    pub fn active_duration(&self) -> u32 {
        self.exercises
            .iter()
            .map(Exercise::active_duration)
            .fold(0, u32::saturating_add)
    }
}

/// Weekly cycle. `schedule` maps day of week (0 = Sunday) to a plan id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CyclePlan {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub cycle_type: CycleType,
    #[serde(default)]
    pub workout_plans: Vec<String>,
    #[serde(default)]
    pub schedule: BTreeMap<u8, String>,
    #[serde(default)]
    pub active: bool,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
    #[serde(default = "Utc::now")]
    pub updated_at: DateTime<Utc>,
}

impl CyclePlan {
    pub fn includes(&self, plan_id: &str) -> bool {
        self.workout_plans.iter().any(|id| id == plan_id)
    }

    /// Drop every reference to `plan_id`. Returns whether anything changed.
    pub fn forget_plan(&mut self, plan_id: &str) -> bool {
        let before = self.workout_plans.len() + self.schedule.len();
        self.workout_plans.retain(|id| id != plan_id);
        self.schedule.retain(|_, id| id != plan_id);
        before != self.workout_plans.len() + self.schedule.len()
    }
}

/// Completed workout session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkoutRecord {
    pub id: String,
    pub plan_id: String,
    #[serde(default = "Utc::now")]
    pub date: DateTime<Utc>,
    #[serde(default)]
    pub duration: u32, // seconds of exercise, rest excluded
    #[serde(default)]
    pub completed: bool,
}

impl WorkoutRecord {
    pub fn completed(plan_id: impl Into<String>, duration: u32) -> Self {
        Self {
            id: next_id(),
            plan_id: plan_id.into(),
            date: Utc::now(),
            duration,
            completed: true,
        }
    }
}

const DAY_NAMES: [&str; 7] = ["sun", "mon", "tue", "wed", "thu", "fri", "sat"];

/// Short day name for a day-of-week number (0 = Sunday)
pub fn day_name(day: u8) -> &'static str {
    DAY_NAMES.get(day as usize).copied().unwrap_or("?")
}

/// Parse a day of week given as `0`..`6` or a name (`mon`, `Monday`, ...)
pub fn parse_weekday(s: &str) -> Result<u8> {
    let s = s.trim().to_lowercase();
    if let Ok(n) = s.parse::<u8>() {
        if n < 7 {
            return Ok(n);
        }
        bail!("day of week must be 0-6 (0 = Sunday), got {}", n);
    }
    DAY_NAMES
        .iter()
        .position(|d| s.starts_with(d))
        .map(|i| i as u8)
        .ok_or_else(|| anyhow!("unknown day of week '{}'", s))
}

/// Format duration in seconds to human-readable string
pub fn format_duration(secs: u32) -> String {
    if secs < 60 {
        format!("{}s", secs)
    } else if secs < 3600 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else {
        format!("{}h {}m", secs / 3600, (secs % 3600) / 60)
    }
}

/// Format seconds as a `mm:ss` countdown
pub fn format_clock(secs: u32) -> String {
    format!("{:02}:{:02}", secs / 60, secs % 60)
}
