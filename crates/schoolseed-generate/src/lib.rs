//! Relational data synthesis engine for schoolseed.
//!
//! Builds users, courses, subjects, timetables, assessments, grades and
//! messages in foreign-key order, one committed phase at a time, through the
//! [`Store`] seam. Runs are reproducible from a single seed.

pub mod binder;
pub mod bootstrap;
pub mod catalog;
pub mod errors;
pub mod factory;
pub mod fixtures;
pub mod grading;
pub mod locale;
pub mod memory;
pub mod messaging;
pub mod model;
pub mod orchestrator;
pub mod output;
pub mod random;
pub mod schedule;
pub mod store;

pub use bootstrap::{Bootstrap, BootstrapError, DirectBootstrap, TESTING_ACCOUNTS, TestingAccount};
pub use errors::GenerationError;
pub use factory::{EntityFactory, FixtureCredential};
pub use memory::{Dataset, MemoryStore};
pub use model::{
    FixtureOptions, GenerateOptions, GenerationIssue, GenerationReport, PhaseReport, PhaseStatus,
};
pub use orchestrator::{GenerationEngine, GenerationResult, RunSummary};
pub use store::{Store, StoreError};
