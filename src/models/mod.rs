//! Data model: stakeholder record/version DTOs and workflow types.

pub mod stakeholder;
pub mod workflow;

pub use stakeholder::{CategoryRef, ScheduleEntry, Stakeholder, StakeholderInput};
pub use workflow::{VerificationStatus, WorkflowEvent};
