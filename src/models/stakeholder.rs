//! Stakeholder record DTOs and the write model.
//!
//! A logical stakeholder is identified by a stable `id`; each edit appends
//! an immutable version row. `Stakeholder` is the normalized read shape of
//! one current version (child collections aggregated, author display names
//! denormalized, `distance` derived at query time). `StakeholderInput` is
//! the full write model accepted by create/update.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{DirectoryError, DirectoryResult};
use crate::models::workflow::VerificationStatus;

/// One weekly or monthly-recurring opening-hours entry of a version.
///
/// `week_of_month` supports recurring monthly schedules ("2nd Tuesday");
/// zero means every week.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleEntry {
    pub week_of_month: i32,
    pub day_of_week: String,
    pub open: String,
    pub close: String,
}

/// Reference category linked to a version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryRef {
    pub id: i32,
    pub name: String,
}

/// Normalized read shape of a stakeholder's current version.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Stakeholder {
    pub id: i64,
    pub version: i32,

    // Identity / contact
    pub name: String,
    pub address_1: String,
    pub address_2: String,
    pub city: String,
    pub state: String,
    pub zip: String,
    pub phone: String,
    pub email: String,
    pub website: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,

    // Descriptive
    pub description: String,
    pub notes: String,
    pub requirements: String,
    pub admin_notes: String,
    pub parent_organization: String,
    pub physical_access: String,
    pub items: String,
    pub services: String,
    pub facebook: String,
    pub twitter: String,
    pub pinterest: String,
    pub linkedin: String,
    pub instagram: String,
    pub admin_contact_name: String,
    pub admin_contact_phone: String,
    pub admin_contact_email: String,
    pub donation_contact_name: String,
    pub donation_contact_phone: String,
    pub donation_contact_email: String,
    pub donation_pickup: bool,
    pub donation_accept_frozen: bool,
    pub donation_accept_refrigerated: bool,
    pub donation_accept_perishable: bool,
    pub donation_schedule: String,
    pub donation_delivery_instructions: String,
    pub donation_notes: String,
    pub covid_notes: String,
    pub category_notes: String,
    pub eligibility_notes: String,
    pub food_types: String,
    pub languages: String,

    // Confirmation flags: a human has verified the field's accuracy
    pub confirmed_name: bool,
    pub confirmed_categories: bool,
    pub confirmed_address: bool,
    pub confirmed_phone: bool,
    pub confirmed_email: bool,
    pub confirmed_hours: bool,

    pub verification_status: VerificationStatus,
    pub inactive: bool,
    pub inactive_temporary: bool,
    pub review_notes: String,

    // Workflow / audit
    pub created_date: Option<DateTime<Utc>>,
    pub created_login_id: Option<i32>,
    pub modified_date: Option<DateTime<Utc>>,
    pub modified_login_id: Option<i32>,
    pub submitted_date: Option<DateTime<Utc>>,
    pub submitted_login_id: Option<i32>,
    pub approved_date: Option<DateTime<Utc>>,
    pub rejected_date: Option<DateTime<Utc>>,
    pub reviewed_login_id: Option<i32>,
    pub assigned_date: Option<DateTime<Utc>>,
    pub assigned_login_id: Option<i32>,
    pub claimed_date: Option<DateTime<Utc>>,
    pub claimed_login_id: Option<i32>,
    pub verified_date: Option<DateTime<Utc>>,
    pub verified_login_id: Option<i32>,

    // Denormalized author display names, empty when unknown
    pub created_user: String,
    pub modified_user: String,
    pub submitted_user: String,
    pub reviewed_user: String,
    pub assigned_user: String,
    pub claimed_user: String,

    // Child collections of the current version
    pub hours: Vec<ScheduleEntry>,
    pub categories: Vec<CategoryRef>,

    /// Miles from the caller-supplied search origin. Derived at query time,
    /// never persisted; `None` when no origin was supplied.
    pub distance: Option<f64>,
}

/// Full write model for create/update. Every call carries the complete
/// field set; the store stamps created/modified audit columns itself.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StakeholderInput {
    /// Acting user, stamped as created/modified author.
    pub login_id: i32,

    pub name: String,
    pub address_1: String,
    pub address_2: String,
    pub city: String,
    pub state: String,
    pub zip: String,
    pub phone: String,
    pub email: String,
    pub website: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,

    pub description: String,
    pub notes: String,
    pub requirements: String,
    pub admin_notes: String,
    pub parent_organization: String,
    pub physical_access: String,
    pub items: String,
    pub services: String,
    pub facebook: String,
    pub twitter: String,
    pub pinterest: String,
    pub linkedin: String,
    pub instagram: String,
    pub admin_contact_name: String,
    pub admin_contact_phone: String,
    pub admin_contact_email: String,
    pub donation_contact_name: String,
    pub donation_contact_phone: String,
    pub donation_contact_email: String,
    pub donation_pickup: bool,
    pub donation_accept_frozen: bool,
    pub donation_accept_refrigerated: bool,
    pub donation_accept_perishable: bool,
    pub donation_schedule: String,
    pub donation_delivery_instructions: String,
    pub donation_notes: String,
    pub covid_notes: String,
    pub category_notes: String,
    pub eligibility_notes: String,
    pub food_types: String,
    pub languages: String,

    pub confirmed_name: bool,
    pub confirmed_categories: bool,
    pub confirmed_address: bool,
    pub confirmed_phone: bool,
    pub confirmed_email: bool,
    pub confirmed_hours: bool,

    pub verification_status: VerificationStatus,
    pub inactive: bool,
    pub inactive_temporary: bool,
    pub review_notes: String,

    // Admin edits may carry workflow stamps wholesale (e.g. importing
    // reviewed data); transitions normally manage these via the workflow
    // service instead.
    pub submitted_date: Option<DateTime<Utc>>,
    pub submitted_login_id: Option<i32>,
    pub approved_date: Option<DateTime<Utc>>,
    pub rejected_date: Option<DateTime<Utc>>,
    pub reviewed_login_id: Option<i32>,
    pub assigned_date: Option<DateTime<Utc>>,
    pub assigned_login_id: Option<i32>,
    pub claimed_date: Option<DateTime<Utc>>,
    pub claimed_login_id: Option<i32>,
    pub verified_date: Option<DateTime<Utc>>,
    pub verified_login_id: Option<i32>,
}

impl StakeholderInput {
    /// Reject malformed input before any query executes.
    pub fn validate(&self) -> DirectoryResult<()> {
        if self.name.trim().is_empty() {
            return Err(DirectoryError::validation("name must not be empty"));
        }
        if self.login_id <= 0 {
            return Err(DirectoryError::validation(
                "login_id must be a positive identifier",
            ));
        }
        if let Some(lat) = self.latitude {
            if !(-90.0..=90.0).contains(&lat) {
                return Err(DirectoryError::validation(format!(
                    "latitude {lat} out of range [-90, 90]"
                )));
            }
        }
        if let Some(lon) = self.longitude {
            if !(-180.0..=180.0).contains(&lon) {
                return Err(DirectoryError::validation(format!(
                    "longitude {lon} out of range [-180, 180]"
                )));
            }
        }
        Ok(())
    }
}
