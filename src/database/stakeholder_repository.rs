//! Version store for stakeholder records.
//!
//! The `stakeholder_version` table is an append-only log: one row per
//! (logical id, version), never rewritten on edit. Every write appends a
//! new version row plus its child schedule/category rows inside one
//! transaction; every read resolves "current" by partitioning on the
//! logical id and taking the greatest version per partition
//! (`SELECT DISTINCT ON`), never a max-aggregate join.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgArguments;
use sqlx::query::Query;
use sqlx::{PgPool, Postgres, Row, Transaction};
use tracing::{info, warn};

use crate::database::search_filter::SearchFilter;
use crate::error::{DirectoryError, DirectoryResult};
use crate::models::{CategoryRef, ScheduleEntry, Stakeholder, StakeholderInput};

/// Storage contract for the versioned stakeholder table.
#[async_trait]
pub trait StakeholderRepositoryTrait: Send + Sync {
    /// Allocate a new logical id and write version 1 with its children.
    async fn create(
        &self,
        input: &StakeholderInput,
        hours: &[ScheduleEntry],
        category_ids: &[i32],
    ) -> DirectoryResult<i64>;

    /// Append a new version (prior max + 1) to an existing logical id,
    /// binding fresh schedule/category associations to it.
    async fn create_version(
        &self,
        id: i64,
        input: &StakeholderInput,
        hours: &[ScheduleEntry],
        category_ids: &[i32],
    ) -> DirectoryResult<i32>;

    /// The greatest-version row for `id`, with author names and children.
    async fn current_version(&self, id: i64) -> DirectoryResult<Stakeholder>;

    /// Current version of every logical id whose current version satisfies
    /// the filter, ordered by name.
    async fn all_current(&self, filter: &SearchFilter) -> DirectoryResult<Vec<Stakeholder>>;

    /// Hard-delete every version and child row of the logical id.
    async fn remove(&self, id: i64) -> DirectoryResult<()>;
}

#[derive(Clone)]
pub struct StakeholderRepository {
    pool: PgPool,
}

// Insert column order; bind_input below must bind values in exactly this
// order starting at $6 ($1..$5 are id, version and the audit stamps).
const INSERT_COLUMNS: &str = "id, version, created_date, created_login_id, \
    modified_date, modified_login_id, \
    name, address_1, address_2, city, state, zip, phone, email, website, \
    latitude, longitude, \
    description, notes, requirements, admin_notes, parent_organization, \
    physical_access, items, services, facebook, twitter, pinterest, linkedin, \
    instagram, admin_contact_name, admin_contact_phone, admin_contact_email, \
    donation_contact_name, donation_contact_phone, donation_contact_email, \
    donation_pickup, donation_accept_frozen, donation_accept_refrigerated, \
    donation_accept_perishable, donation_schedule, donation_delivery_instructions, \
    donation_notes, covid_notes, category_notes, eligibility_notes, food_types, \
    languages, \
    confirmed_name, confirmed_categories, confirmed_address, confirmed_phone, \
    confirmed_email, confirmed_hours, \
    verification_status_id, inactive, inactive_temporary, review_notes, \
    submitted_date, submitted_login_id, approved_date, rejected_date, \
    reviewed_login_id, assigned_date, assigned_login_id, claimed_date, \
    claimed_login_id, verified_date, verified_login_id";

const INPUT_BIND_COUNT: usize = 63;

fn insert_sql() -> String {
    let placeholders = (6..=5 + INPUT_BIND_COUNT)
        .map(|n| format!("${n}"))
        .collect::<Vec<_>>()
        .join(", ");
    format!(
        "INSERT INTO stakeholder_version ({INSERT_COLUMNS}) \
         VALUES ($1, $2, COALESCE($3, NOW()), $4, NOW(), $5, {placeholders}) \
         RETURNING stakeholder_version_id"
    )
}

/// Bind the 63 input fields in INSERT_COLUMNS order.
fn bind_input<'q>(
    query: Query<'q, Postgres, PgArguments>,
    input: &'q StakeholderInput,
) -> Query<'q, Postgres, PgArguments> {
    query
        .bind(&input.name)
        .bind(&input.address_1)
        .bind(&input.address_2)
        .bind(&input.city)
        .bind(&input.state)
        .bind(&input.zip)
        .bind(&input.phone)
        .bind(&input.email)
        .bind(&input.website)
        .bind(input.latitude)
        .bind(input.longitude)
        .bind(&input.description)
        .bind(&input.notes)
        .bind(&input.requirements)
        .bind(&input.admin_notes)
        .bind(&input.parent_organization)
        .bind(&input.physical_access)
        .bind(&input.items)
        .bind(&input.services)
        .bind(&input.facebook)
        .bind(&input.twitter)
        .bind(&input.pinterest)
        .bind(&input.linkedin)
        .bind(&input.instagram)
        .bind(&input.admin_contact_name)
        .bind(&input.admin_contact_phone)
        .bind(&input.admin_contact_email)
        .bind(&input.donation_contact_name)
        .bind(&input.donation_contact_phone)
        .bind(&input.donation_contact_email)
        .bind(input.donation_pickup)
        .bind(input.donation_accept_frozen)
        .bind(input.donation_accept_refrigerated)
        .bind(input.donation_accept_perishable)
        .bind(&input.donation_schedule)
        .bind(&input.donation_delivery_instructions)
        .bind(&input.donation_notes)
        .bind(&input.covid_notes)
        .bind(&input.category_notes)
        .bind(&input.eligibility_notes)
        .bind(&input.food_types)
        .bind(&input.languages)
        .bind(input.confirmed_name)
        .bind(input.confirmed_categories)
        .bind(input.confirmed_address)
        .bind(input.confirmed_phone)
        .bind(input.confirmed_email)
        .bind(input.confirmed_hours)
        .bind(input.verification_status)
        .bind(input.inactive)
        .bind(input.inactive_temporary)
        .bind(&input.review_notes)
        .bind(input.submitted_date)
        .bind(input.submitted_login_id)
        .bind(input.approved_date)
        .bind(input.rejected_date)
        .bind(input.reviewed_login_id)
        .bind(input.assigned_date)
        .bind(input.assigned_login_id)
        .bind(input.claimed_date)
        .bind(input.claimed_login_id)
        .bind(input.verified_date)
        .bind(input.verified_login_id)
}

const STAKEHOLDER_COLUMNS: &str = "s.id, s.version, \
    s.name, s.address_1, s.address_2, s.city, s.state, s.zip, s.phone, \
    s.email, s.website, s.latitude, s.longitude, \
    s.description, s.notes, s.requirements, s.admin_notes, \
    s.parent_organization, s.physical_access, s.items, s.services, \
    s.facebook, s.twitter, s.pinterest, s.linkedin, s.instagram, \
    s.admin_contact_name, s.admin_contact_phone, s.admin_contact_email, \
    s.donation_contact_name, s.donation_contact_phone, s.donation_contact_email, \
    s.donation_pickup, s.donation_accept_frozen, s.donation_accept_refrigerated, \
    s.donation_accept_perishable, s.donation_schedule, \
    s.donation_delivery_instructions, s.donation_notes, s.covid_notes, \
    s.category_notes, s.eligibility_notes, s.food_types, s.languages, \
    s.confirmed_name, s.confirmed_categories, s.confirmed_address, \
    s.confirmed_phone, s.confirmed_email, s.confirmed_hours, \
    s.verification_status_id, s.inactive, s.inactive_temporary, s.review_notes, \
    s.created_date, s.created_login_id, s.modified_date, s.modified_login_id, \
    s.submitted_date, s.submitted_login_id, s.approved_date, s.rejected_date, \
    s.reviewed_login_id, s.assigned_date, s.assigned_login_id, \
    s.claimed_date, s.claimed_login_id, s.verified_date, s.verified_login_id";

/// Read skeleton over the current-version view: greatest version per
/// logical id via DISTINCT ON, author names via login left-joins, children
/// JSON-aggregated per version row.
fn select_sql(predicate: &str) -> String {
    format!(
        "SELECT {STAKEHOLDER_COLUMNS}, \
         (SELECT COALESCE(json_agg(json_build_object(\
             'week_of_month', h.week_of_month, 'day_of_week', h.day_of_week, \
             'open', h.open, 'close', h.close)), '[]'::json) \
          FROM stakeholder_schedule h \
          WHERE h.stakeholder_id = s.stakeholder_version_id) AS hours, \
         (SELECT COALESCE(json_agg(json_build_object('id', c.id, 'name', c.name)), '[]'::json) \
          FROM category c \
          JOIN stakeholder_category sc ON c.id = sc.category_id \
          WHERE sc.stakeholder_id = s.stakeholder_version_id) AS categories, \
         COALESCE(l1.first_name || ' ' || l1.last_name, '') AS created_user, \
         COALESCE(l2.first_name || ' ' || l2.last_name, '') AS modified_user, \
         COALESCE(l3.first_name || ' ' || l3.last_name, '') AS submitted_user, \
         COALESCE(l4.first_name || ' ' || l4.last_name, '') AS reviewed_user, \
         COALESCE(l5.first_name || ' ' || l5.last_name, '') AS assigned_user, \
         COALESCE(l6.first_name || ' ' || l6.last_name, '') AS claimed_user \
         FROM (SELECT DISTINCT ON (id) * FROM stakeholder_version \
               ORDER BY id, version DESC) s \
         LEFT JOIN login l1 ON s.created_login_id = l1.id \
         LEFT JOIN login l2 ON s.modified_login_id = l2.id \
         LEFT JOIN login l3 ON s.submitted_login_id = l3.id \
         LEFT JOIN login l4 ON s.reviewed_login_id = l4.id \
         LEFT JOIN login l5 ON s.assigned_login_id = l5.id \
         LEFT JOIN login l6 ON s.claimed_login_id = l6.id \
         {predicate}"
    )
}

fn map_row(row: &sqlx::postgres::PgRow) -> DirectoryResult<Stakeholder> {
    let hours: serde_json::Value = row.try_get("hours")?;
    let categories: serde_json::Value = row.try_get("categories")?;
    let hours: Vec<ScheduleEntry> = serde_json::from_value(hours)?;
    let categories: Vec<CategoryRef> = serde_json::from_value(categories)?;

    Ok(Stakeholder {
        id: row.try_get("id")?,
        version: row.try_get("version")?,
        name: row.try_get("name")?,
        address_1: row.try_get("address_1")?,
        address_2: row.try_get("address_2")?,
        city: row.try_get("city")?,
        state: row.try_get("state")?,
        zip: row.try_get("zip")?,
        phone: row.try_get("phone")?,
        email: row.try_get("email")?,
        website: row.try_get("website")?,
        latitude: row.try_get("latitude")?,
        longitude: row.try_get("longitude")?,
        description: row.try_get("description")?,
        notes: row.try_get("notes")?,
        requirements: row.try_get("requirements")?,
        admin_notes: row.try_get("admin_notes")?,
        parent_organization: row.try_get("parent_organization")?,
        physical_access: row.try_get("physical_access")?,
        items: row.try_get("items")?,
        services: row.try_get("services")?,
        facebook: row.try_get("facebook")?,
        twitter: row.try_get("twitter")?,
        pinterest: row.try_get("pinterest")?,
        linkedin: row.try_get("linkedin")?,
        instagram: row.try_get("instagram")?,
        admin_contact_name: row.try_get("admin_contact_name")?,
        admin_contact_phone: row.try_get("admin_contact_phone")?,
        admin_contact_email: row.try_get("admin_contact_email")?,
        donation_contact_name: row.try_get("donation_contact_name")?,
        donation_contact_phone: row.try_get("donation_contact_phone")?,
        donation_contact_email: row.try_get("donation_contact_email")?,
        donation_pickup: row.try_get("donation_pickup")?,
        donation_accept_frozen: row.try_get("donation_accept_frozen")?,
        donation_accept_refrigerated: row.try_get("donation_accept_refrigerated")?,
        donation_accept_perishable: row.try_get("donation_accept_perishable")?,
        donation_schedule: row.try_get("donation_schedule")?,
        donation_delivery_instructions: row.try_get("donation_delivery_instructions")?,
        donation_notes: row.try_get("donation_notes")?,
        covid_notes: row.try_get("covid_notes")?,
        category_notes: row.try_get("category_notes")?,
        eligibility_notes: row.try_get("eligibility_notes")?,
        food_types: row.try_get("food_types")?,
        languages: row.try_get("languages")?,
        confirmed_name: row.try_get("confirmed_name")?,
        confirmed_categories: row.try_get("confirmed_categories")?,
        confirmed_address: row.try_get("confirmed_address")?,
        confirmed_phone: row.try_get("confirmed_phone")?,
        confirmed_email: row.try_get("confirmed_email")?,
        confirmed_hours: row.try_get("confirmed_hours")?,
        verification_status: row.try_get("verification_status_id")?,
        inactive: row.try_get("inactive")?,
        inactive_temporary: row.try_get("inactive_temporary")?,
        review_notes: row.try_get("review_notes")?,
        created_date: row.try_get("created_date")?,
        created_login_id: row.try_get("created_login_id")?,
        modified_date: row.try_get("modified_date")?,
        modified_login_id: row.try_get("modified_login_id")?,
        submitted_date: row.try_get("submitted_date")?,
        submitted_login_id: row.try_get("submitted_login_id")?,
        approved_date: row.try_get("approved_date")?,
        rejected_date: row.try_get("rejected_date")?,
        reviewed_login_id: row.try_get("reviewed_login_id")?,
        assigned_date: row.try_get("assigned_date")?,
        assigned_login_id: row.try_get("assigned_login_id")?,
        claimed_date: row.try_get("claimed_date")?,
        claimed_login_id: row.try_get("claimed_login_id")?,
        verified_date: row.try_get("verified_date")?,
        verified_login_id: row.try_get("verified_login_id")?,
        created_user: row.try_get("created_user")?,
        modified_user: row.try_get("modified_user")?,
        submitted_user: row.try_get("submitted_user")?,
        reviewed_user: row.try_get("reviewed_user")?,
        assigned_user: row.try_get("assigned_user")?,
        claimed_user: row.try_get("claimed_user")?,
        hours,
        categories,
        distance: None,
    })
}

impl StakeholderRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    async fn insert_version(
        tx: &mut Transaction<'_, Postgres>,
        id: i64,
        version: i32,
        created_date: Option<DateTime<Utc>>,
        created_login_id: Option<i32>,
        input: &StakeholderInput,
    ) -> Result<i64, sqlx::Error> {
        let sql = insert_sql();
        let query = sqlx::query(&sql)
            .bind(id)
            .bind(version)
            .bind(created_date)
            .bind(created_login_id)
            .bind(input.login_id);
        let row = bind_input(query, input).fetch_one(&mut **tx).await?;
        row.try_get("stakeholder_version_id")
    }

    async fn insert_children(
        tx: &mut Transaction<'_, Postgres>,
        version_row_id: i64,
        hours: &[ScheduleEntry],
        category_ids: &[i32],
    ) -> Result<(), sqlx::Error> {
        for entry in hours {
            sqlx::query(
                "INSERT INTO stakeholder_schedule \
                 (stakeholder_id, week_of_month, day_of_week, open, close) \
                 VALUES ($1, $2, $3, $4, $5)",
            )
            .bind(version_row_id)
            .bind(entry.week_of_month)
            .bind(&entry.day_of_week)
            .bind(&entry.open)
            .bind(&entry.close)
            .execute(&mut **tx)
            .await?;
        }
        for category_id in category_ids {
            sqlx::query(
                "INSERT INTO stakeholder_category (stakeholder_id, category_id) \
                 VALUES ($1, $2)",
            )
            .bind(version_row_id)
            .bind(*category_id)
            .execute(&mut **tx)
            .await?;
        }
        Ok(())
    }
}

#[async_trait]
impl StakeholderRepositoryTrait for StakeholderRepository {
    async fn create(
        &self,
        input: &StakeholderInput,
        hours: &[ScheduleEntry],
        category_ids: &[i32],
    ) -> DirectoryResult<i64> {
        input.validate()?;

        let mut tx = self.pool.begin().await?;
        let id: i64 = sqlx::query_scalar("SELECT nextval('stakeholder_id_seq')")
            .fetch_one(&mut *tx)
            .await?;
        let version_row_id = Self::insert_version(&mut tx, id, 1, None, None, input).await?;
        Self::insert_children(&mut tx, version_row_id, hours, category_ids).await?;
        tx.commit().await?;

        info!(
            stakeholder_id = id,
            hours = hours.len(),
            categories = category_ids.len(),
            "created stakeholder"
        );
        Ok(id)
    }

    async fn create_version(
        &self,
        id: i64,
        input: &StakeholderInput,
        hours: &[ScheduleEntry],
        category_ids: &[i32],
    ) -> DirectoryResult<i32> {
        input.validate()?;

        let mut tx = self.pool.begin().await?;
        let prior: Option<(i32, DateTime<Utc>, Option<i32>)> = sqlx::query_as(
            "SELECT version, created_date, created_login_id \
             FROM stakeholder_version \
             WHERE id = $1 ORDER BY version DESC LIMIT 1",
        )
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?;

        let (prior_version, created_date, created_login_id) =
            prior.ok_or(DirectoryError::NotFound { id })?;
        let version = prior_version + 1;

        let version_row_id = Self::insert_version(
            &mut tx,
            id,
            version,
            Some(created_date),
            created_login_id,
            input,
        )
        .await?;
        Self::insert_children(&mut tx, version_row_id, hours, category_ids).await?;
        tx.commit().await?;

        info!(stakeholder_id = id, version, "created stakeholder version");
        Ok(version)
    }

    async fn current_version(&self, id: i64) -> DirectoryResult<Stakeholder> {
        let sql = select_sql("WHERE s.id = $1");
        let row = sqlx::query(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        match row {
            Some(row) => map_row(&row),
            None => Err(DirectoryError::NotFound { id }),
        }
    }

    async fn all_current(&self, filter: &SearchFilter) -> DirectoryResult<Vec<Stakeholder>> {
        let sql = select_sql(&filter.predicate_sql());
        let rows = filter.bind(sqlx::query(&sql)).fetch_all(&self.pool).await?;
        rows.iter().map(map_row).collect()
    }

    async fn remove(&self, id: i64) -> DirectoryResult<()> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM stakeholder_workflow_event WHERE stakeholder_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        // Schedule and category rows go with their version rows (FK cascade).
        let result = sqlx::query("DELETE FROM stakeholder_version WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;

        if result.rows_affected() == 0 {
            warn!(stakeholder_id = id, "remove: no versions found");
        } else {
            info!(
                stakeholder_id = id,
                versions = result.rows_affected(),
                "removed stakeholder"
            );
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_columns_match_bind_count() {
        // $1..$5 cover id/version/audit stamps; the remaining columns must
        // line up one-to-one with the bind_input chain.
        let columns = INSERT_COLUMNS.split(',').count();
        assert_eq!(columns, 6 + INPUT_BIND_COUNT);

        let sql = insert_sql();
        assert!(sql.contains(&format!("${}", 5 + INPUT_BIND_COUNT)));
        assert!(!sql.contains(&format!("${}", 6 + INPUT_BIND_COUNT)));
        assert!(sql.contains("RETURNING stakeholder_version_id"));
    }

    #[test]
    fn test_current_resolution_partitions_by_logical_id() {
        let sql = select_sql("WHERE s.id = $1");
        assert!(sql.contains("SELECT DISTINCT ON (id) * FROM stakeholder_version"));
        assert!(sql.contains("ORDER BY id, version DESC"));
        assert!(!sql.to_lowercase().contains("max("));
    }

    #[test]
    fn test_read_path_uses_true_claimed_timestamp() {
        // The claimed timestamp must come from claimed_date itself, never
        // be derived from the creation timestamp.
        assert!(STAKEHOLDER_COLUMNS.contains("s.claimed_date"));
        let sql = select_sql("").to_lowercase();
        assert!(!sql.contains("created_date as claimed_date"));
    }

    #[test]
    fn test_select_aggregates_children_per_version_row() {
        let sql = select_sql("");
        assert!(sql.contains("h.stakeholder_id = s.stakeholder_version_id"));
        assert!(sql.contains("sc.stakeholder_id = s.stakeholder_version_id"));
    }

    #[test]
    fn test_select_joins_all_six_author_names() {
        let sql = select_sql("");
        for user in [
            "created_user",
            "modified_user",
            "submitted_user",
            "reviewed_user",
            "assigned_user",
            "claimed_user",
        ] {
            assert!(sql.contains(user), "missing {user}");
        }
    }
}
