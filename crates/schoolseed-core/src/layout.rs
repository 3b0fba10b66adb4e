use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::model::{Division, Level, Shift};

/// Shape of the course grid: `years × divisions`, split into levels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CourseLayout {
    pub years: u8,
    pub divisions: u8,
    /// Last year (inclusive) taught at primary level.
    pub primary_limit: u8,
}

/// How course shifts are chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShiftPolicy {
    /// Primary divisions other than the third run in the afternoon, everything else in the morning.
    Fixed,
    /// Each course draws its shift from the run's random source.
    Random,
}

/// One (year, division) cell of the layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CourseSlot {
    pub year: u8,
    pub division: Division,
    pub level: Level,
}

impl CourseLayout {
    pub fn new(years: u8, divisions: u8, primary_limit: u8) -> Result<Self> {
        let layout = Self {
            years,
            divisions,
            primary_limit,
        };
        layout.validate()?;
        Ok(layout)
    }

    pub fn validate(&self) -> Result<()> {
        if self.years == 0 {
            return Err(Error::InvalidLayout("years must be at least 1".to_string()));
        }
        if self.divisions == 0 || usize::from(self.divisions) > Division::ALL.len() {
            return Err(Error::InvalidLayout(format!(
                "divisions must be between 1 and {}, got {}",
                Division::ALL.len(),
                self.divisions
            )));
        }
        Ok(())
    }

    pub fn level_for(&self, year: u8) -> Level {
        if year <= self.primary_limit {
            Level::Primary
        } else {
            Level::Secondary
        }
    }

    /// Cells in creation order: year ascending, then division.
    pub fn slots(&self) -> Vec<CourseSlot> {
        let divisions = &Division::ALL[..usize::from(self.divisions).min(Division::ALL.len())];
        (1..=self.years)
            .flat_map(|year| {
                divisions.iter().map(move |division| CourseSlot {
                    year,
                    division: *division,
                    level: self.level_for(year),
                })
            })
            .collect()
    }

    pub fn course_count(&self) -> usize {
        usize::from(self.years) * usize::from(self.divisions)
    }
}

impl ShiftPolicy {
    /// Shift under the fixed rule; `None` when the policy is random.
    pub fn fixed_shift(self, level: Level, division: Division) -> Option<Shift> {
        match self {
            ShiftPolicy::Fixed => Some(fixed_shift(level, division)),
            ShiftPolicy::Random => None,
        }
    }
}

fn fixed_shift(level: Level, division: Division) -> Shift {
    if level == Level::Primary && division.number() != 3 {
        Shift::Afternoon
    } else {
        Shift::Morning
    }
}

const ORDINALS: &[&str] = &[
    "Primer grado",
    "Segundo grado",
    "Tercero grado",
    "Cuarto grado",
    "Quinto grado",
    "Sexto grado",
    "Séptimo grado",
    "Primer año",
    "Segundo año",
    "Tercero año",
    "Cuarto año",
    "Quinto año",
];

const PRIMARY_DIVISIONS: [&str; 3] = ["Mar", "Gaviota", "Estrella"];
const SECONDARY_DIVISIONS: [&str; 3] = ["Economía", "Naturales", "Humanidades"];

pub fn ordinal_name(year: u8) -> String {
    usize::from(year)
        .checked_sub(1)
        .and_then(|idx| ORDINALS.get(idx))
        .map(|name| name.to_string())
        .unwrap_or_else(|| format!("Año {year}"))
}

pub fn division_name(level: Level, division: Division) -> &'static str {
    let idx = usize::from(division.number() - 1);
    match level {
        Level::Primary => PRIMARY_DIVISIONS[idx],
        Level::Secondary => SECONDARY_DIVISIONS[idx],
    }
}

pub fn course_name(year: u8, level: Level, division: Division) -> String {
    format!("{} {}", ordinal_name(year), division_name(level, division))
}
