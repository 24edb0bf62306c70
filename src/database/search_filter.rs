//! Search predicate composition over current stakeholder versions.
//!
//! Every filter family is a no-op when its parameter is absent. The builder
//! emits a bound `$n` placeholder for every variable value; only fixed
//! structural fragments are concatenated, so free-text input (quotes, LIKE
//! wildcards) can never alter the predicate structure.

use serde::{Deserialize, Serialize};
use sqlx::postgres::PgArguments;
use sqlx::query::Query;
use sqlx::Postgres;

use crate::error::{DirectoryError, DirectoryResult};

/// Caller-supplied search origin for distance ranking.
///
/// `radius_miles <= 0` means "rank but do not filter."
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SearchOrigin {
    pub latitude: f64,
    pub longitude: f64,
    pub radius_miles: f64,
}

/// Composable search filter over current versions.
///
/// Three-valued workflow filters (`Option<bool>`): `Some(true)` matches
/// records where the field is set, `Some(false)` where it is null, `None`
/// matches everything.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SearchFilter {
    /// Case-insensitive substring match on name; empty matches all.
    pub name: String,
    /// Logical OR across category ids; empty means no category filter.
    pub category_ids: Vec<i32>,
    pub is_inactive: Option<bool>,
    pub is_assigned: Option<bool>,
    pub is_submitted: Option<bool>,
    pub is_approved: Option<bool>,
    pub is_rejected: Option<bool>,
    pub is_claimed: Option<bool>,
    /// Exact match; applied only when positive.
    pub assigned_login_id: Option<i32>,
    /// Exact match; applied only when positive.
    pub claimed_login_id: Option<i32>,
    /// Exact match; applied only when positive.
    pub verification_status_id: Option<i32>,
    pub origin: Option<SearchOrigin>,
}

/// Escape LIKE wildcards in user input; the pattern is combined with an
/// `ESCAPE '\'` clause so `%`, `_` and `\` match literally.
fn escape_like(raw: &str) -> String {
    raw.replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_")
}

/// "field is set" / "field is null" / no clause.
fn tristate_clause(column: &str, value: Option<bool>) -> Option<String> {
    value.map(|set| {
        if set {
            format!(" AND {column} IS NOT NULL")
        } else {
            format!(" AND {column} IS NULL")
        }
    })
}

fn positive(value: Option<i32>) -> Option<i32> {
    value.filter(|v| *v > 0)
}

impl SearchFilter {
    /// Reject malformed filter input before any query executes.
    pub fn validate(&self) -> DirectoryResult<()> {
        if let Some(origin) = self.origin {
            if !(-90.0..=90.0).contains(&origin.latitude) {
                return Err(DirectoryError::validation(format!(
                    "origin latitude {} out of range [-90, 90]",
                    origin.latitude
                )));
            }
            if !(-180.0..=180.0).contains(&origin.longitude) {
                return Err(DirectoryError::validation(format!(
                    "origin longitude {} out of range [-180, 180]",
                    origin.longitude
                )));
            }
            if !origin.radius_miles.is_finite() {
                return Err(DirectoryError::validation("radius must be finite"));
            }
        }
        Ok(())
    }

    /// WHERE/ORDER BY fragment over the current-version alias `s`, with
    /// `$n` placeholders matching [`SearchFilter::bind`] order. Results are
    /// ordered by name, case-insensitively; distance ranking (when an
    /// origin is present) happens after the query.
    pub(crate) fn predicate_sql(&self) -> String {
        let mut sql = String::from("WHERE s.name ILIKE $1 ESCAPE '\\'");
        let mut bind = 1;

        if !self.category_ids.is_empty() {
            bind += 1;
            sql.push_str(&format!(
                " AND s.stakeholder_version_id IN \
                 (SELECT sc.stakeholder_id FROM stakeholder_category sc \
                 WHERE sc.category_id = ANY(${bind}))"
            ));
        }

        for clause in [
            tristate_clause("s.assigned_date", self.is_assigned),
            tristate_clause("s.submitted_date", self.is_submitted),
            tristate_clause("s.approved_date", self.is_approved),
            tristate_clause("s.rejected_date", self.is_rejected),
            tristate_clause("s.claimed_date", self.is_claimed),
        ]
        .into_iter()
        .flatten()
        {
            sql.push_str(&clause);
        }

        if self.is_inactive.is_some() {
            bind += 1;
            sql.push_str(&format!(" AND s.inactive = ${bind}"));
        }
        if positive(self.assigned_login_id).is_some() {
            bind += 1;
            sql.push_str(&format!(" AND s.assigned_login_id = ${bind}"));
        }
        if positive(self.claimed_login_id).is_some() {
            bind += 1;
            sql.push_str(&format!(" AND s.claimed_login_id = ${bind}"));
        }
        if positive(self.verification_status_id).is_some() {
            bind += 1;
            sql.push_str(&format!(" AND s.verification_status_id = ${bind}"));
        }

        sql.push_str(" ORDER BY lower(s.name) ASC");
        sql
    }

    /// Bind every variable value in the order [`SearchFilter::predicate_sql`]
    /// numbered it.
    pub(crate) fn bind<'q>(
        &self,
        query: Query<'q, Postgres, PgArguments>,
    ) -> Query<'q, Postgres, PgArguments> {
        let mut query = query.bind(format!("%{}%", escape_like(&self.name)));
        if !self.category_ids.is_empty() {
            query = query.bind(self.category_ids.clone());
        }
        if let Some(inactive) = self.is_inactive {
            query = query.bind(inactive);
        }
        if let Some(id) = positive(self.assigned_login_id) {
            query = query.bind(id);
        }
        if let Some(id) = positive(self.claimed_login_id) {
            query = query.bind(id);
        }
        if let Some(id) = positive(self.verification_status_id) {
            query = query.bind(id);
        }
        query
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_filter_is_name_and_order_only() {
        let sql = SearchFilter::default().predicate_sql();
        assert_eq!(
            sql,
            "WHERE s.name ILIKE $1 ESCAPE '\\' ORDER BY lower(s.name) ASC"
        );
    }

    #[test]
    fn test_quoting_characters_never_reach_the_sql_text() {
        let filter = SearchFilter {
            name: "O'Brien".to_string(),
            ..Default::default()
        };
        // The name travels as a bound parameter: the predicate text is
        // identical whatever the input contains.
        assert_eq!(
            filter.predicate_sql(),
            SearchFilter::default().predicate_sql()
        );
        assert!(!filter.predicate_sql().contains("O'Brien"));
    }

    #[test]
    fn test_like_wildcards_escaped() {
        assert_eq!(escape_like("50% off_sale"), "50\\% off\\_sale");
        assert_eq!(escape_like("a\\b"), "a\\\\b");
        // Apostrophes are not LIKE wildcards; binding neutralizes them.
        assert_eq!(escape_like("O'Brien"), "O'Brien");
    }

    #[test]
    fn test_tristate_clauses() {
        assert_eq!(
            tristate_clause("s.assigned_date", Some(true)).as_deref(),
            Some(" AND s.assigned_date IS NOT NULL")
        );
        assert_eq!(
            tristate_clause("s.assigned_date", Some(false)).as_deref(),
            Some(" AND s.assigned_date IS NULL")
        );
        assert_eq!(tristate_clause("s.assigned_date", None), None);
    }

    #[test]
    fn test_absent_assignment_filter_matches_everything() {
        let sql = SearchFilter::default().predicate_sql();
        assert!(!sql.contains("assigned_date"));
    }

    #[test]
    fn test_category_filter_uses_array_bind() {
        let filter = SearchFilter {
            category_ids: vec![1, 2, 9],
            ..Default::default()
        };
        let sql = filter.predicate_sql();
        assert!(sql.contains("sc.category_id = ANY($2)"));
        // Ids are bound, never spliced into the text.
        assert!(!sql.contains("1, 2, 9"));
    }

    #[test]
    fn test_non_positive_exact_match_ids_skipped() {
        let filter = SearchFilter {
            assigned_login_id: Some(0),
            claimed_login_id: Some(-4),
            verification_status_id: None,
            ..Default::default()
        };
        let sql = filter.predicate_sql();
        assert!(!sql.contains("assigned_login_id"));
        assert!(!sql.contains("claimed_login_id"));
        assert!(!sql.contains("verification_status_id"));
    }

    #[test]
    fn test_bind_numbering_tracks_present_filters() {
        let filter = SearchFilter {
            category_ids: vec![3],
            is_assigned: Some(true),
            is_inactive: Some(false),
            claimed_login_id: Some(12),
            verification_status_id: Some(2),
            ..Default::default()
        };
        let sql = filter.predicate_sql();
        // Tristates consume no placeholders, so numbering skips them.
        assert!(sql.contains("ANY($2)"));
        assert!(sql.contains("s.inactive = $3"));
        assert!(sql.contains("s.claimed_login_id = $4"));
        assert!(sql.contains("s.verification_status_id = $5"));
        assert!(sql.contains("s.assigned_date IS NOT NULL"));
    }

    #[test]
    fn test_ordering_contract_is_case_insensitive_name() {
        let sql = SearchFilter::default().predicate_sql();
        assert!(sql.ends_with("ORDER BY lower(s.name) ASC"));
    }

    #[test]
    fn test_origin_validation() {
        let filter = SearchFilter {
            origin: Some(SearchOrigin {
                latitude: 95.0,
                longitude: 0.0,
                radius_miles: 10.0,
            }),
            ..Default::default()
        };
        assert!(filter.validate().is_err());

        let filter = SearchFilter {
            origin: Some(SearchOrigin {
                latitude: 34.0,
                longitude: -118.0,
                radius_miles: 0.0,
            }),
            ..Default::default()
        };
        assert!(filter.validate().is_ok());
    }
}
