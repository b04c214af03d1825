//! Export and import of the complete workout state

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::{PlanStore, normalize_active, rehydrate_cycles};
use crate::plans::{CyclePlan, WorkoutPlan, WorkoutRecord};

/// Exported snapshot. Cycles reference plans by id.
///
/// On import every section is optional; a missing section leaves the current data alone.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportDocument {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workout_plans: Option<Vec<WorkoutPlan>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cycle_plans: Option<Vec<CyclePlan>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workout_records: Option<Vec<WorkoutRecord>>,
    #[serde(default = "Utc::now")]
    pub export_date: DateTime<Utc>,
}

/// What an import replaced
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ImportSummary {
    pub plans: Option<usize>,
    pub cycles: Option<usize>,
    pub records: Option<usize>,
    pub dropped_references: usize,
}

/// `fitness-data-YYYY-MM-DD.json`
pub fn export_file_name(date: NaiveDate) -> String {
    format!("fitness-data-{}.json", date.format("%Y-%m-%d"))
}

impl PlanStore {
    pub fn export_data(&self) -> ExportDocument {
        ExportDocument {
            workout_plans: Some(self.workout_plans.clone()),
            cycle_plans: Some(self.cycle_plans.clone()),
            workout_records: Some(self.workout_records.clone()),
            export_date: Utc::now(),
        }
    }

    pub fn export_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(&self.export_data())?)
    }

    /// Write a dated export file into `dir` and return its path
    pub fn export_to_dir(&self, dir: &Path) -> Result<PathBuf> {
        fs::create_dir_all(dir)
            .with_context(|| format!("failed to create export directory {}", dir.display()))?;
        let path = dir.join(export_file_name(Utc::now().date_naive()));
        fs::write(&path, self.export_json()?)
            .with_context(|| format!("failed to write {}", path.display()))?;
        info!("Exported workout data to {}", path.display());
        Ok(path)
    }

    /// Replace state from an exported document.
    ///
    /// Nothing changes unless the whole document parses.
    pub fn import_json(&mut self, json: &str) -> Result<ImportSummary> {
        let doc: ExportDocument = serde_json::from_str(json).context("invalid import data")?;
        let backup = self.backup();
        let mut summary = ImportSummary::default();

        if let Some(plans) = doc.workout_plans {
            summary.plans = Some(plans.len());
            self.workout_plans = plans;
        }
        if let Some(records) = doc.workout_records {
            summary.records = Some(records.len());
            self.workout_records = records;
        }
        match doc.cycle_plans {
            Some(mut cycles) => {
                summary.dropped_references = rehydrate_cycles(&mut cycles, &self.workout_plans);
                normalize_active(&mut cycles);
                summary.cycles = Some(cycles.len());
                self.cycle_plans = cycles;
            }
            // Kept cycles must not point at plans the import replaced
            None if summary.plans.is_some() => {
                summary.dropped_references =
                    rehydrate_cycles(&mut self.cycle_plans, &self.workout_plans);
            }
            None => {}
        }
        if summary.dropped_references > 0 {
            warn!("Import dropped {} unresolved plan references", summary.dropped_references);
        }
        if let Some(id) = self.current_plan_id.as_deref()
            && self.find_plan(id).is_none()
        {
            self.current_plan_id = None;
        }

        self.commit(backup)?;
        info!("Imported workout data: {:?}", summary);
        Ok(summary)
    }

    pub fn import_file(&mut self, path: &Path) -> Result<ImportSummary> {
        let json = fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        self.import_json(&json)
    }
}
