//! Review workflow state machine.
//!
//! States move Unsubmitted → Submitted → Assigned → {Approved | Rejected} →
//! Claimed, with verification toggling independently and a
//! needs-verification recall path back to the start. Correctness hinges on
//! clearing the mutually exclusive workflow fields on every transition, so
//! each transition is first compiled to a [`TransitionPlan`] (set list,
//! clear list, resulting status) by pure code, then executed as one
//! targeted UPDATE of the current version row plus an append-only
//! `stakeholder_workflow_event` audit row in the same transaction.
//!
//! Concurrent transitions on the same logical id are last-write-wins at the
//! field level; there is no optimistic locking.

use sqlx::{PgPool, Row};
use tracing::info;

use crate::error::{DirectoryError, DirectoryResult};
use crate::models::{VerificationStatus, WorkflowEvent};

/// A workflow transition requested by an acting user.
#[derive(Debug, Clone, PartialEq)]
pub enum Transition {
    Assign { assignee_login_id: i32 },
    NeedsVerification { message: String },
    Claim { claimant_login_id: i32, set_claimed: bool },
    Verify { set_verified: bool },
    Submit,
    Review { approve: bool },
}

impl Transition {
    fn name(&self) -> &'static str {
        match self {
            Self::Assign { .. } => "assign",
            Self::NeedsVerification { .. } => "needs_verification",
            Self::Claim { .. } => "claim",
            Self::Verify { .. } => "verify",
            Self::Submit => "submit",
            Self::Review { approve: true } => "approve",
            Self::Review { approve: false } => "reject",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum PlanValue {
    Now,
    Int(i32),
}

/// Column-level effect of a transition: which fields get set, which get
/// cleared to NULL, the resulting status (None = unchanged), and an
/// optional review-notes append.
#[derive(Debug, Clone, PartialEq)]
struct TransitionPlan {
    sets: Vec<(&'static str, PlanValue)>,
    clears: Vec<&'static str>,
    status: Option<VerificationStatus>,
    note_append: Option<String>,
}

fn plan(transition: &Transition, actor_login_id: i32) -> TransitionPlan {
    match transition {
        Transition::Assign { assignee_login_id } => TransitionPlan {
            sets: vec![
                ("assigned_login_id", PlanValue::Int(*assignee_login_id)),
                ("assigned_date", PlanValue::Now),
            ],
            clears: vec![
                "submitted_date",
                "submitted_login_id",
                "approved_date",
                "reviewed_login_id",
            ],
            status: Some(VerificationStatus::Assigned),
            note_append: None,
        },
        Transition::NeedsVerification { message } => TransitionPlan {
            sets: vec![],
            clears: vec![
                "assigned_login_id",
                "assigned_date",
                "submitted_date",
                "submitted_login_id",
                "approved_date",
                "reviewed_login_id",
            ],
            status: Some(VerificationStatus::NeedsVerification),
            note_append: if message.trim().is_empty() {
                None
            } else {
                Some(message.clone())
            },
        },
        Transition::Claim {
            claimant_login_id,
            set_claimed: true,
        } => TransitionPlan {
            sets: vec![
                ("claimed_login_id", PlanValue::Int(*claimant_login_id)),
                ("claimed_date", PlanValue::Now),
            ],
            clears: vec![],
            status: None,
            note_append: None,
        },
        Transition::Claim {
            set_claimed: false, ..
        } => TransitionPlan {
            sets: vec![],
            clears: vec!["claimed_login_id", "claimed_date"],
            status: None,
            note_append: None,
        },
        Transition::Verify { set_verified: true } => TransitionPlan {
            sets: vec![
                ("verified_login_id", PlanValue::Int(actor_login_id)),
                ("verified_date", PlanValue::Now),
            ],
            clears: vec![],
            status: Some(VerificationStatus::Verified),
            note_append: None,
        },
        Transition::Verify {
            set_verified: false,
        } => TransitionPlan {
            sets: vec![],
            clears: vec!["verified_login_id", "verified_date"],
            status: Some(VerificationStatus::NeedsVerification),
            note_append: None,
        },
        Transition::Submit => TransitionPlan {
            sets: vec![
                ("submitted_login_id", PlanValue::Int(actor_login_id)),
                ("submitted_date", PlanValue::Now),
            ],
            clears: vec![],
            status: Some(VerificationStatus::Submitted),
            note_append: None,
        },
        Transition::Review { approve: true } => TransitionPlan {
            sets: vec![
                ("approved_date", PlanValue::Now),
                ("reviewed_login_id", PlanValue::Int(actor_login_id)),
            ],
            clears: vec!["rejected_date"],
            status: None,
            note_append: None,
        },
        Transition::Review { approve: false } => TransitionPlan {
            sets: vec![
                ("rejected_date", PlanValue::Now),
                ("reviewed_login_id", PlanValue::Int(actor_login_id)),
            ],
            clears: vec!["approved_date"],
            status: None,
            note_append: None,
        },
    }
}

#[derive(Debug, Clone, PartialEq)]
enum PlanBind {
    Int(i32),
    Text(String),
}

/// Compile a plan to one UPDATE of the current version row. `$1` is the
/// logical id, `$2` the actor; further placeholders follow the returned
/// bind list in order.
fn plan_sql(plan: &TransitionPlan) -> (String, Vec<PlanBind>) {
    let mut sql =
        String::from("UPDATE stakeholder_version SET modified_date = NOW(), modified_login_id = $2");
    let mut binds = Vec::new();
    let mut next = 3;

    for (column, value) in &plan.sets {
        match value {
            PlanValue::Now => sql.push_str(&format!(", {column} = NOW()")),
            PlanValue::Int(v) => {
                sql.push_str(&format!(", {column} = ${next}"));
                binds.push(PlanBind::Int(*v));
                next += 1;
            }
        }
    }
    for column in &plan.clears {
        sql.push_str(&format!(", {column} = NULL"));
    }
    if let Some(status) = plan.status {
        sql.push_str(&format!(", verification_status_id = ${next}"));
        binds.push(PlanBind::Int(status.as_id()));
        next += 1;
    }
    if let Some(note) = &plan.note_append {
        sql.push_str(&format!(
            ", review_notes = CASE WHEN length(review_notes) > 0 \
             THEN review_notes || chr(10) || chr(10) || ${next} \
             ELSE ${next} END"
        ));
        binds.push(PlanBind::Text(note.clone()));
    }

    sql.push_str(
        " WHERE stakeholder_version_id = \
         (SELECT stakeholder_version_id FROM stakeholder_version \
         WHERE id = $1 ORDER BY version DESC LIMIT 1)",
    );
    (sql, binds)
}

/// Executes workflow transitions against the current version row.
pub struct WorkflowService {
    pool: PgPool,
}

impl WorkflowService {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Hand the record to a reviewer. Clears the submission and approval
    /// fields so assignment state is unambiguous.
    pub async fn assign(
        &self,
        id: i64,
        actor_login_id: i32,
        assignee_login_id: i32,
    ) -> DirectoryResult<()> {
        if assignee_login_id <= 0 {
            return Err(DirectoryError::validation(
                "assignee_login_id must be a positive identifier",
            ));
        }
        self.apply(id, actor_login_id, Transition::Assign { assignee_login_id })
            .await
    }

    /// Recall the record for re-verification, appending `message` to the
    /// review notes (blank-line separated when prior notes exist).
    pub async fn needs_verification(
        &self,
        id: i64,
        actor_login_id: i32,
        message: &str,
    ) -> DirectoryResult<()> {
        self.apply(
            id,
            actor_login_id,
            Transition::NeedsVerification {
                message: message.to_string(),
            },
        )
        .await
    }

    /// Set or release a user's claim on the record. Claiming is independent
    /// of assignment state.
    pub async fn claim(
        &self,
        id: i64,
        actor_login_id: i32,
        claimant_login_id: i32,
        set_claimed: bool,
    ) -> DirectoryResult<()> {
        if set_claimed && claimant_login_id <= 0 {
            return Err(DirectoryError::validation(
                "claimant_login_id must be a positive identifier",
            ));
        }
        self.apply(
            id,
            actor_login_id,
            Transition::Claim {
                claimant_login_id,
                set_claimed,
            },
        )
        .await
    }

    /// Toggle the verified stamp without touching the review-workflow
    /// fields.
    pub async fn verify(
        &self,
        id: i64,
        actor_login_id: i32,
        set_verified: bool,
    ) -> DirectoryResult<()> {
        self.apply(id, actor_login_id, Transition::Verify { set_verified })
            .await
    }

    /// Mark the record submitted for review by the acting user.
    pub async fn submit(&self, id: i64, actor_login_id: i32) -> DirectoryResult<()> {
        self.apply(id, actor_login_id, Transition::Submit).await
    }

    /// Record the review outcome; approving clears any rejection and vice
    /// versa.
    pub async fn review(
        &self,
        id: i64,
        actor_login_id: i32,
        approve: bool,
    ) -> DirectoryResult<()> {
        self.apply(id, actor_login_id, Transition::Review { approve })
            .await
    }

    /// Transition history of a record, oldest first.
    pub async fn events(&self, id: i64) -> DirectoryResult<Vec<WorkflowEvent>> {
        let rows = sqlx::query(
            "SELECT stakeholder_id, occurred_at, actor_login_id, from_status, to_status, note \
             FROM stakeholder_workflow_event \
             WHERE stakeholder_id = $1 ORDER BY occurred_at ASC",
        )
        .bind(id)
        .fetch_all(&self.pool)
        .await?;

        let mut events = Vec::with_capacity(rows.len());
        for row in rows {
            events.push(WorkflowEvent {
                stakeholder_id: row.try_get("stakeholder_id")?,
                occurred_at: row.try_get("occurred_at")?,
                actor_login_id: row.try_get("actor_login_id")?,
                from_status: row.try_get("from_status")?,
                to_status: row.try_get("to_status")?,
                note: row.try_get("note")?,
            });
        }
        Ok(events)
    }

    async fn apply(
        &self,
        id: i64,
        actor_login_id: i32,
        transition: Transition,
    ) -> DirectoryResult<()> {
        if actor_login_id <= 0 {
            return Err(DirectoryError::validation(
                "actor_login_id must be a positive identifier",
            ));
        }

        let mut tx = self.pool.begin().await?;
        let current: Option<(i32,)> = sqlx::query_as(
            "SELECT verification_status_id FROM stakeholder_version \
             WHERE id = $1 ORDER BY version DESC LIMIT 1",
        )
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?;
        let (from_status,) = current.ok_or(DirectoryError::NotFound { id })?;

        let plan = plan(&transition, actor_login_id);
        let (sql, binds) = plan_sql(&plan);
        let mut query = sqlx::query(&sql).bind(id).bind(actor_login_id);
        for bind in &binds {
            query = match bind {
                PlanBind::Int(v) => query.bind(*v),
                PlanBind::Text(s) => query.bind(s.clone()),
            };
        }
        let result = query.execute(&mut *tx).await?;
        if result.rows_affected() == 0 {
            return Err(DirectoryError::NotFound { id });
        }

        let to_status = plan.status.map(VerificationStatus::as_id).unwrap_or(from_status);
        sqlx::query(
            "INSERT INTO stakeholder_workflow_event \
             (stakeholder_id, occurred_at, actor_login_id, from_status, to_status, note) \
             VALUES ($1, NOW(), $2, $3, $4, $5)",
        )
        .bind(id)
        .bind(actor_login_id)
        .bind(from_status)
        .bind(to_status)
        .bind(plan.note_append.as_deref().unwrap_or(""))
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;

        info!(
            stakeholder_id = id,
            actor = actor_login_id,
            transition = transition.name(),
            "applied workflow transition"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    const ACTOR: i32 = 99;

    /// Track per-field set/cleared state across a sequence of plans.
    fn run(plans: &[TransitionPlan]) -> (HashMap<&'static str, bool>, Option<VerificationStatus>) {
        let mut fields: HashMap<&'static str, bool> = HashMap::new();
        let mut status = None;
        for p in plans {
            for (column, _) in &p.sets {
                fields.insert(column, true);
            }
            for column in &p.clears {
                fields.insert(column, false);
            }
            if p.status.is_some() {
                status = p.status;
            }
        }
        (fields, status)
    }

    #[test]
    fn test_assign_clears_submission_and_approval() {
        let p = plan(&Transition::Assign { assignee_login_id: 5 }, ACTOR);
        assert!(p.sets.contains(&("assigned_login_id", PlanValue::Int(5))));
        assert!(p.sets.contains(&("assigned_date", PlanValue::Now)));
        assert_eq!(
            p.clears,
            vec![
                "submitted_date",
                "submitted_login_id",
                "approved_date",
                "reviewed_login_id"
            ]
        );
        assert_eq!(p.status, Some(VerificationStatus::Assigned));
    }

    #[test]
    fn test_assign_then_needs_verification_resets_everything() {
        let plans = [
            plan(&Transition::Assign { assignee_login_id: 5 }, ACTOR),
            plan(
                &Transition::NeedsVerification {
                    message: "address looks stale".to_string(),
                },
                ACTOR,
            ),
        ];
        let (fields, status) = run(&plans);
        assert_eq!(fields.get("assigned_login_id"), Some(&false));
        assert_eq!(fields.get("assigned_date"), Some(&false));
        assert_eq!(fields.get("submitted_date"), Some(&false));
        assert_eq!(status, Some(VerificationStatus::NeedsVerification));
    }

    #[test]
    fn test_claim_is_independent_of_assignment() {
        let p = plan(
            &Transition::Claim {
                claimant_login_id: 3,
                set_claimed: true,
            },
            ACTOR,
        );
        assert!(p.sets.contains(&("claimed_login_id", PlanValue::Int(3))));
        assert!(p.clears.is_empty());
        assert_eq!(p.status, None);

        let p = plan(
            &Transition::Claim {
                claimant_login_id: 3,
                set_claimed: false,
            },
            ACTOR,
        );
        assert!(p.sets.is_empty());
        assert_eq!(p.clears, vec!["claimed_login_id", "claimed_date"]);
    }

    #[test]
    fn test_verify_leaves_review_workflow_fields_alone() {
        for set_verified in [true, false] {
            let p = plan(&Transition::Verify { set_verified }, ACTOR);
            let touched: Vec<&str> = p
                .sets
                .iter()
                .map(|(c, _)| *c)
                .chain(p.clears.iter().copied())
                .collect();
            for field in [
                "assigned_login_id",
                "assigned_date",
                "submitted_date",
                "submitted_login_id",
                "approved_date",
                "rejected_date",
                "reviewed_login_id",
                "claimed_login_id",
                "claimed_date",
            ] {
                assert!(!touched.contains(&field), "{field} touched");
            }
        }
        let p = plan(&Transition::Verify { set_verified: true }, ACTOR);
        assert_eq!(p.status, Some(VerificationStatus::Verified));
        let p = plan(&Transition::Verify { set_verified: false }, ACTOR);
        assert_eq!(p.status, Some(VerificationStatus::NeedsVerification));
    }

    #[test]
    fn test_submit_stamps_actor() {
        let p = plan(&Transition::Submit, ACTOR);
        assert!(p.sets.contains(&("submitted_login_id", PlanValue::Int(ACTOR))));
        assert!(p.sets.contains(&("submitted_date", PlanValue::Now)));
        assert_eq!(p.status, Some(VerificationStatus::Submitted));
    }

    #[test]
    fn test_review_outcomes_are_mutually_exclusive() {
        let p = plan(&Transition::Review { approve: true }, ACTOR);
        assert!(p.sets.contains(&("approved_date", PlanValue::Now)));
        assert_eq!(p.clears, vec!["rejected_date"]);

        let p = plan(&Transition::Review { approve: false }, ACTOR);
        assert!(p.sets.contains(&("rejected_date", PlanValue::Now)));
        assert_eq!(p.clears, vec!["approved_date"]);
    }

    #[test]
    fn test_empty_recall_message_skips_notes() {
        let p = plan(
            &Transition::NeedsVerification {
                message: "  ".to_string(),
            },
            ACTOR,
        );
        assert_eq!(p.note_append, None);
        let (sql, binds) = plan_sql(&p);
        assert!(!sql.contains("review_notes"));
        assert_eq!(binds.len(), 1); // status only
    }

    #[test]
    fn test_plan_sql_targets_current_version_only() {
        let p = plan(&Transition::Assign { assignee_login_id: 5 }, ACTOR);
        let (sql, _) = plan_sql(&p);
        assert!(sql.contains(
            "WHERE stakeholder_version_id = \
             (SELECT stakeholder_version_id FROM stakeholder_version \
             WHERE id = $1 ORDER BY version DESC LIMIT 1)"
        ));
        assert!(sql.starts_with(
            "UPDATE stakeholder_version SET modified_date = NOW(), modified_login_id = $2"
        ));
        // Every clause is comma-joined; nothing dangles before WHERE.
        assert!(!sql.contains(", WHERE"));
    }

    #[test]
    fn test_plan_sql_numbering_and_binds() {
        let p = plan(
            &Transition::NeedsVerification {
                message: "please recheck hours".to_string(),
            },
            ACTOR,
        );
        let (sql, binds) = plan_sql(&p);
        // $3 = status, $4 = note (used twice in the CASE, bound once).
        assert!(sql.contains("verification_status_id = $3"));
        assert_eq!(sql.matches("$4").count(), 2);
        assert_eq!(
            binds,
            vec![
                PlanBind::Int(VerificationStatus::NeedsVerification.as_id()),
                PlanBind::Text("please recheck hours".to_string()),
            ]
        );
        assert!(sql.contains("chr(10) || chr(10)"));
    }
}
