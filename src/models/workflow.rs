//! Workflow status and transition-log types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Review/verification status of a stakeholder record.
///
/// A small closed enum stored as an integer column. It is driven entirely
/// by the workflow state machine; field edits never set it directly.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[repr(i32)]
pub enum VerificationStatus {
    #[default]
    NeedsVerification = 1,
    Assigned = 2,
    Submitted = 3,
    Verified = 4,
}

impl VerificationStatus {
    /// Map a raw status id from storage; `None` for ids outside the enum.
    pub fn from_id(id: i32) -> Option<Self> {
        match id {
            1 => Some(Self::NeedsVerification),
            2 => Some(Self::Assigned),
            3 => Some(Self::Submitted),
            4 => Some(Self::Verified),
            _ => None,
        }
    }

    pub fn as_id(self) -> i32 {
        self as i32
    }
}

impl std::fmt::Display for VerificationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NeedsVerification => write!(f, "needs_verification"),
            Self::Assigned => write!(f, "assigned"),
            Self::Submitted => write!(f, "submitted"),
            Self::Verified => write!(f, "verified"),
        }
    }
}

/// One row of the append-only workflow transition log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowEvent {
    pub stakeholder_id: i64,
    pub occurred_at: DateTime<Utc>,
    pub actor_login_id: i32,
    pub from_status: VerificationStatus,
    pub to_status: VerificationStatus,
    pub note: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_id_round_trip() {
        for status in [
            VerificationStatus::NeedsVerification,
            VerificationStatus::Assigned,
            VerificationStatus::Submitted,
            VerificationStatus::Verified,
        ] {
            assert_eq!(VerificationStatus::from_id(status.as_id()), Some(status));
        }
    }

    #[test]
    fn test_status_ids_match_storage_contract() {
        assert_eq!(VerificationStatus::NeedsVerification.as_id(), 1);
        assert_eq!(VerificationStatus::Assigned.as_id(), 2);
        assert_eq!(VerificationStatus::Submitted.as_id(), 3);
        assert_eq!(VerificationStatus::Verified.as_id(), 4);
    }

    #[test]
    fn test_unknown_status_id_rejected() {
        assert_eq!(VerificationStatus::from_id(0), None);
        assert_eq!(VerificationStatus::from_id(5), None);
        assert_eq!(VerificationStatus::from_id(-1), None);
    }
}
