//! Stakeholder Directory - versioned directory of community aid organizations
//!
//! This crate provides the record/version model, search engine, and review
//! workflow state machine behind a community aid directory (food pantries,
//! shelters, and similar organizations).
//!
//! ## Architecture
//! Every edit appends an immutable version row under a shared logical id;
//! reads resolve to the greatest version per id. Search composes optional
//! filter predicates into one bound-parameter query, then ranks by distance
//! from a caller-supplied origin. Review transitions (submit, assign,
//! approve/reject, claim, verify) are compiled to targeted partial updates
//! that keep the mutually exclusive workflow fields consistent.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use stakeholder_directory::database::{DatabaseManager, SearchFilter};
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let manager = DatabaseManager::with_default_config().await?;
//! let service = manager.stakeholder_service();
//! let results = service.search(&SearchFilter {
//!     name: "pantry".to_string(),
//!     ..Default::default()
//! }).await?;
//! println!("{} matches", results.len());
//! # Ok(())
//! # }
//! ```

// Core error handling
pub mod error;

// Record/version DTOs and workflow types
pub mod models;

// Post-query distance ranking
pub mod ranking;

// Version store, query builder, workflow state machine
pub mod database;

// Public re-exports
pub use database::{
    DatabaseConfig, DatabaseManager, SearchFilter, SearchOrigin, StakeholderRepository,
    StakeholderRepositoryTrait, StakeholderService, WorkflowService,
};
pub use error::{DirectoryError, DirectoryResult};
pub use models::{
    CategoryRef, ScheduleEntry, Stakeholder, StakeholderInput, VerificationStatus, WorkflowEvent,
};
pub use ranking::{distance_miles, rank_by_distance, MILES_PER_DEGREE, UNKNOWN_DISTANCE_MILES};
