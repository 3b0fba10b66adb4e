use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use schoolseed_core::{CourseLayout, Phase, ShiftPolicy};

use crate::errors::GenerationError;

/// Options for the generation engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GenerateOptions {
    /// Seed for every random draw of the run.
    pub seed: u64,
    /// Course grid for the synthetic path.
    pub layout: CourseLayout,
    pub shift_policy: ShiftPolicy,
    pub teachers: usize,
    pub preceptors: usize,
    /// Inclusive range of students created per course.
    pub students_min: usize,
    pub students_max: usize,
    pub broadcast_messages: usize,
    /// Maximum sequence bumps when an email collides.
    pub max_email_attempts: u32,
    /// Date ages and due dates are computed from; today when unset.
    pub reference_date: Option<NaiveDate>,
    pub school_domain: String,
    pub family_domain: String,
    pub fixtures: FixtureOptions,
}

impl Default for GenerateOptions {
    fn default() -> Self {
        Self {
            seed: 42,
            layout: CourseLayout {
                years: 7,
                divisions: 3,
                primary_limit: 6,
            },
            shift_policy: ShiftPolicy::Random,
            teachers: 15,
            preceptors: 7,
            students_min: 25,
            students_max: 35,
            broadcast_messages: 20,
            max_email_attempts: 50,
            reference_date: None,
            school_domain: "stellamaris.edu.ar".to_string(),
            family_domain: "gmail.com".to_string(),
            fixtures: FixtureOptions::default(),
        }
    }
}

impl GenerateOptions {
    pub fn validate(&self) -> Result<(), GenerationError> {
        self.layout.validate()?;
        self.fixtures.layout.validate()?;
        if self.students_min > self.students_max {
            return Err(GenerationError::InvalidOptions(format!(
                "students_min ({}) must be <= students_max ({})",
                self.students_min, self.students_max
            )));
        }
        if self.max_email_attempts == 0 {
            return Err(GenerationError::InvalidOptions(
                "max_email_attempts must be at least 1".to_string(),
            ));
        }
        if self.school_domain.is_empty() || self.family_domain.is_empty() {
            return Err(GenerationError::InvalidOptions(
                "email domains must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

/// Options for the fixed-fixture path.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FixtureOptions {
    pub layout: CourseLayout,
}

impl Default for FixtureOptions {
    fn default() -> Self {
        Self {
            layout: CourseLayout {
                years: 12,
                divisions: 3,
                primary_limit: 7,
            },
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PhaseStatus {
    Committed,
    Failed,
}

/// Row counts for one phase.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PhaseReport {
    pub phase: Phase,
    pub status: PhaseStatus,
    pub created: BTreeMap<String, u64>,
    pub skipped: BTreeMap<String, u64>,
    pub duration_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl PhaseReport {
    pub fn new(phase: Phase) -> Self {
        Self {
            phase,
            status: PhaseStatus::Committed,
            created: BTreeMap::new(),
            skipped: BTreeMap::new(),
            duration_ms: 0,
            error: None,
        }
    }

    pub fn record_created(&mut self, entity: &str, count: u64) {
        *self.created.entry(entity.to_string()).or_insert(0) += count;
    }

    pub fn record_skipped(&mut self, entity: &str, count: u64) {
        if count > 0 {
            *self.skipped.entry(entity.to_string()).or_insert(0) += count;
        }
    }

    pub fn created(&self, entity: &str) -> u64 {
        self.created.get(entity).copied().unwrap_or(0)
    }
}

/// Structured generation issue.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationIssue {
    pub code: String,
    pub message: String,
    pub phase: Phase,
}

/// Report for a generation run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationReport {
    pub run_id: String,
    pub seed: u64,
    pub reference_date: NaiveDate,
    pub phases: Vec<PhaseReport>,
    pub warnings_by_code: BTreeMap<String, u64>,
    pub warnings: Vec<GenerationIssue>,
    pub duration_ms: u64,
}

impl GenerationReport {
    pub fn new(run_id: String, seed: u64, reference_date: NaiveDate) -> Self {
        Self {
            run_id,
            seed,
            reference_date,
            phases: Vec::new(),
            warnings_by_code: BTreeMap::new(),
            warnings: Vec::new(),
            duration_ms: 0,
        }
    }

    pub fn record_warning(&mut self, issue: GenerationIssue) {
        *self.warnings_by_code.entry(issue.code.clone()).or_insert(0) += 1;
        self.warnings.push(issue);
    }

    pub fn phase(&self, phase: Phase) -> Option<&PhaseReport> {
        self.phases.iter().find(|report| report.phase == phase)
    }

    /// Total rows created for an entity across all phases.
    pub fn total_created(&self, entity: &str) -> u64 {
        self.phases.iter().map(|report| report.created(entity)).sum()
    }

    pub fn failed_phase(&self) -> Option<Phase> {
        self.phases
            .iter()
            .find(|report| report.status == PhaseStatus::Failed)
            .map(|report| report.phase)
    }
}
