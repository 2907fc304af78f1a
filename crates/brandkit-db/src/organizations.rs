//! Database operations for the `organizations` table.

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::DbError;

/// Attempts before giving up on a key that keeps flipping under concurrent writers.
const MAX_RESOLVE_ATTEMPTS: usize = 3;

/// A row from the `organizations` table.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow, serde::Serialize)]
pub struct OrganizationRow {
    pub id: Uuid,
    pub app_id: String,
    pub external_org_id: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Fetch an organization by id.
///
/// # Errors
///
/// Returns [`DbError::NotFound`] if no row has the given id, or
/// [`DbError::Sqlx`] if the query fails.
pub async fn get_organization(pool: &PgPool, id: Uuid) -> Result<OrganizationRow, DbError> {
    sqlx::query_as::<_, OrganizationRow>(
        "SELECT id, app_id, external_org_id, created_at, updated_at \
         FROM organizations WHERE id = $1",
    )
    .bind(id)
    .fetch_optional(pool)
    .await?
    .ok_or(DbError::NotFound)
}

async fn find_by_key(
    pool: &PgPool,
    app_id: &str,
    external_org_id: &str,
) -> Result<Option<OrganizationRow>, DbError> {
    Ok(sqlx::query_as::<_, OrganizationRow>(
        "SELECT id, app_id, external_org_id, created_at, updated_at \
         FROM organizations WHERE app_id = $1 AND external_org_id = $2",
    )
    .bind(app_id)
    .bind(external_org_id)
    .fetch_optional(pool)
    .await?)
}

/// Get or create the organization keyed by `(app_id, external_org_id)`.
///
/// Concurrent callers with the same key converge on one row: the insert uses
/// `ON CONFLICT DO NOTHING`, and a caller whose insert returns no row re-reads
/// the winner.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if any query fails.
pub async fn resolve_or_create_organization(
    pool: &PgPool,
    app_id: &str,
    external_org_id: &str,
) -> Result<OrganizationRow, DbError> {
    for _ in 0..MAX_RESOLVE_ATTEMPTS {
        if let Some(existing) = find_by_key(pool, app_id, external_org_id).await? {
            return Ok(existing);
        }

        let inserted = sqlx::query_as::<_, OrganizationRow>(
            "INSERT INTO organizations (id, app_id, external_org_id) \
             VALUES ($1, $2, $3) \
             ON CONFLICT (app_id, external_org_id) DO NOTHING \
             RETURNING id, app_id, external_org_id, created_at, updated_at",
        )
        .bind(Uuid::new_v4())
        .bind(app_id)
        .bind(external_org_id)
        .fetch_optional(pool)
        .await?;

        if let Some(row) = inserted {
            tracing::info!(organization_id = %row.id, app_id, external_org_id, "created organization");
            return Ok(row);
        }

        tracing::debug!(app_id, external_org_id, "lost organization insert race; re-reading");
    }

    Err(DbError::ContentionExhausted {
        entity: "organization",
        key: format!("{app_id}/{external_org_id}"),
    })
}
