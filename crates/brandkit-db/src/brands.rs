//! Brand resolution and merge for the `brands` table.
//!
//! `domain` is globally unique, so a single lookup by domain classifies every
//! resolution request. Each outcome of that classification is its own named
//! operation; writes that can lose a race return `None` and the caller
//! re-classifies against the new state of the table.

use brandkit_core::extract_domain;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::{is_unique_violation, DbError};

const MAX_RESOLVE_ATTEMPTS: usize = 3;

macro_rules! brand_query {
    ($tail:literal) => {
        concat!(
            "SELECT id, organization_id, tenant_external_id, external_organization_id, \
                    domain, url, name, created_at, updated_at \
             FROM brands ",
            $tail
        )
    };
}

macro_rules! returning_brand {
    ($head:literal) => {
        concat!(
            $head,
            " RETURNING id, organization_id, tenant_external_id, external_organization_id, \
                        domain, url, name, created_at, updated_at"
        )
    };
}

// ---------------------------------------------------------------------------
// Row types
// ---------------------------------------------------------------------------

/// A row from the `brands` table.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow, serde::Serialize)]
pub struct BrandRow {
    pub id: Uuid,
    pub organization_id: Option<Uuid>,
    pub tenant_external_id: Option<String>,
    pub external_organization_id: Option<String>,
    pub domain: Option<String>,
    pub url: Option<String>,
    pub name: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl BrandRow {
    /// A skeleton holds an identity link but no known domain yet.
    #[must_use]
    pub fn is_skeleton(&self) -> bool {
        self.domain.is_none()
    }
}

/// Outcome of [`resolve_or_create_brand`].
///
/// `ForeignOwned` is the cross-tenant collision: the domain already belongs
/// to another organization and ownership is never reassigned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolvedBrand {
    Owned(BrandRow),
    ForeignOwned {
        brand: BrandRow,
        requested_organization_id: Uuid,
    },
}

impl ResolvedBrand {
    #[must_use]
    pub fn brand(&self) -> &BrandRow {
        match self {
            ResolvedBrand::Owned(brand) | ResolvedBrand::ForeignOwned { brand, .. } => brand,
        }
    }

    #[must_use]
    pub fn into_brand(self) -> BrandRow {
        match self {
            ResolvedBrand::Owned(brand) | ResolvedBrand::ForeignOwned { brand, .. } => brand,
        }
    }

    #[must_use]
    pub fn is_foreign_owned(&self) -> bool {
        matches!(self, ResolvedBrand::ForeignOwned { .. })
    }
}

/// Fields supplied to [`resolve_or_merge_brand_by_tenant_id`].
#[derive(Debug, Clone, Copy, Default)]
pub struct TenantBrandInput<'a> {
    pub tenant_external_id: &'a str,
    pub name: Option<&'a str>,
    pub url: Option<&'a str>,
    pub external_organization_id: Option<&'a str>,
}

// ---------------------------------------------------------------------------
// Reads
// ---------------------------------------------------------------------------

/// Fetch a brand by id.
///
/// # Errors
///
/// Returns [`DbError::NotFound`] if no row has the given id, or
/// [`DbError::Sqlx`] if the query fails.
pub async fn get_brand(pool: &PgPool, id: Uuid) -> Result<BrandRow, DbError> {
    sqlx::query_as::<_, BrandRow>(brand_query!("WHERE id = $1"))
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or(DbError::NotFound)
}

/// Fetch the brand owning `domain`, if any.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn get_brand_by_domain(pool: &PgPool, domain: &str) -> Result<Option<BrandRow>, DbError> {
    Ok(sqlx::query_as::<_, BrandRow>(brand_query!("WHERE domain = $1"))
        .bind(domain)
        .fetch_optional(pool)
        .await?)
}

/// Fetch the brand linked to a tenant external id, if any.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn get_brand_by_tenant_id(
    pool: &PgPool,
    tenant_external_id: &str,
) -> Result<Option<BrandRow>, DbError> {
    Ok(
        sqlx::query_as::<_, BrandRow>(brand_query!("WHERE tenant_external_id = $1"))
            .bind(tenant_external_id)
            .fetch_optional(pool)
            .await?,
    )
}

/// Oldest skeleton held by an organization, if any.
///
/// This crate never writes one: tenant resolution creates skeletons with no
/// organization. Organization-held skeletons are placed in the shared
/// `brands` table by other writers that register a brand for an organization
/// before its url is known. The first domain resolution for the organization
/// reconciles them.
async fn find_skeleton(pool: &PgPool, organization_id: Uuid) -> Result<Option<BrandRow>, DbError> {
    Ok(sqlx::query_as::<_, BrandRow>(brand_query!(
        "WHERE organization_id = $1 AND domain IS NULL ORDER BY created_at, id LIMIT 1"
    ))
    .bind(organization_id)
    .fetch_optional(pool)
    .await?)
}

// ---------------------------------------------------------------------------
// Entry point A: organization + url
// ---------------------------------------------------------------------------

/// What to do for an `(organization, domain)` request given the current rows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum BrandAction {
    /// The organization already owns the domain and the url is unchanged.
    Keep(BrandRow),
    /// The organization already owns the domain; store the new url.
    UpdateUrl(BrandRow),
    /// The domain row has no organization; the requester claims it.
    ClaimUnowned(BrandRow),
    /// Another organization owns the domain; return it untouched.
    ForeignOwned(BrandRow),
    /// No row has the domain, but the organization holds a skeleton.
    PromoteSkeleton(BrandRow),
    /// No row has the domain and there is nothing to reconcile.
    Insert,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct BrandPlan {
    pub action: BrandAction,
    /// Skeleton to fold into the winning row once the domain is settled.
    pub absorb: Option<BrandRow>,
}

pub(crate) fn plan_brand_resolution(
    organization_id: Uuid,
    url: &str,
    by_domain: Option<BrandRow>,
    skeleton: Option<BrandRow>,
) -> BrandPlan {
    let Some(existing) = by_domain else {
        return match skeleton {
            Some(skeleton) => BrandPlan {
                action: BrandAction::PromoteSkeleton(skeleton),
                absorb: None,
            },
            None => BrandPlan {
                action: BrandAction::Insert,
                absorb: None,
            },
        };
    };

    let action = match existing.organization_id {
        Some(owner) if owner == organization_id => {
            if existing.url.as_deref() == Some(url) {
                BrandAction::Keep(existing)
            } else {
                BrandAction::UpdateUrl(existing)
            }
        }
        Some(_) => {
            return BrandPlan {
                action: BrandAction::ForeignOwned(existing),
                absorb: None,
            }
        }
        None => BrandAction::ClaimUnowned(existing),
    };

    BrandPlan {
        action,
        absorb: skeleton,
    }
}

/// Get or create the brand for `(organization_id, domain(url))`.
///
/// | Existing row for domain        | Result                                        |
/// |--------------------------------|-----------------------------------------------|
/// | owned by `organization_id`     | url refreshed if it changed, `Owned`          |
/// | owned by another organization  | returned untouched, `ForeignOwned`            |
/// | no organization                | claimed by `organization_id`, `Owned`         |
/// | none, organization skeleton    | skeleton promoted with domain + url, `Owned`  |
/// | none                           | inserted, `Owned`                             |
///
/// A skeleton held by the organization is absorbed (and deleted) whenever the
/// organization ends up owning a different row for the domain.
///
/// # Errors
///
/// - [`DbError::InvalidBrandUrl`] if no domain can be derived from `url`.
/// - [`DbError::ContentionExhausted`] if concurrent writers kept invalidating
///   the plan.
/// - [`DbError::Sqlx`] on any store failure.
pub async fn resolve_or_create_brand(
    pool: &PgPool,
    organization_id: Uuid,
    url: &str,
) -> Result<ResolvedBrand, DbError> {
    let domain = extract_domain(url).ok_or_else(|| DbError::InvalidBrandUrl(url.to_string()))?;

    for attempt in 0..MAX_RESOLVE_ATTEMPTS {
        let by_domain = get_brand_by_domain(pool, &domain).await?;
        let skeleton = find_skeleton(pool, organization_id).await?;
        let plan = plan_brand_resolution(organization_id, url, by_domain, skeleton);

        let resolved = match plan.action {
            BrandAction::Keep(brand) => Some(brand),
            BrandAction::UpdateUrl(brand) => update_brand_url(pool, brand.id, url).await?,
            BrandAction::ClaimUnowned(brand) => {
                claim_unowned_brand(pool, brand.id, organization_id, url).await?
            }
            BrandAction::ForeignOwned(brand) => {
                tracing::warn!(
                    brand_id = %brand.id,
                    domain = %domain,
                    owner_organization_id = ?brand.organization_id,
                    requested_organization_id = %organization_id,
                    "domain already owned by another organization; not reassigning"
                );
                return Ok(ResolvedBrand::ForeignOwned {
                    brand,
                    requested_organization_id: organization_id,
                });
            }
            BrandAction::PromoteSkeleton(skeleton) => {
                promote_skeleton(pool, skeleton.id, &domain, url).await?
            }
            BrandAction::Insert => insert_brand(pool, organization_id, &domain, url).await?,
        };

        let Some(brand) = resolved else {
            tracing::debug!(attempt, domain = %domain, "brand resolution raced; re-planning");
            continue;
        };

        let brand = match plan.absorb {
            Some(skeleton) if skeleton.id != brand.id => {
                let Some(absorbed) = absorb_skeleton(pool, &skeleton, brand.id).await? else {
                    tracing::debug!(attempt, domain = %domain, "skeleton absorb raced; re-planning");
                    continue;
                };
                absorbed
            }
            _ => brand,
        };
        return Ok(ResolvedBrand::Owned(brand));
    }

    Err(DbError::ContentionExhausted {
        entity: "brand",
        key: domain,
    })
}

async fn update_brand_url(pool: &PgPool, id: Uuid, url: &str) -> Result<Option<BrandRow>, DbError> {
    Ok(sqlx::query_as::<_, BrandRow>(returning_brand!(
        "UPDATE brands SET url = $2, updated_at = NOW() WHERE id = $1"
    ))
    .bind(id)
    .bind(url)
    .fetch_optional(pool)
    .await?)
}

async fn claim_unowned_brand(
    pool: &PgPool,
    id: Uuid,
    organization_id: Uuid,
    url: &str,
) -> Result<Option<BrandRow>, DbError> {
    let row = sqlx::query_as::<_, BrandRow>(returning_brand!(
        "UPDATE brands SET organization_id = $2, url = $3, updated_at = NOW() \
         WHERE id = $1 AND organization_id IS NULL"
    ))
    .bind(id)
    .bind(organization_id)
    .bind(url)
    .fetch_optional(pool)
    .await?;

    if let Some(brand) = &row {
        tracing::info!(brand_id = %brand.id, %organization_id, "claimed unowned brand");
    }
    Ok(row)
}

async fn promote_skeleton(
    pool: &PgPool,
    id: Uuid,
    domain: &str,
    url: &str,
) -> Result<Option<BrandRow>, DbError> {
    let result = sqlx::query_as::<_, BrandRow>(returning_brand!(
        "UPDATE brands SET domain = $2, url = $3, updated_at = NOW() \
         WHERE id = $1 AND domain IS NULL"
    ))
    .bind(id)
    .bind(domain)
    .bind(url)
    .fetch_optional(pool)
    .await;

    match result {
        Ok(row) => {
            if let Some(brand) = &row {
                tracing::info!(brand_id = %brand.id, domain, "promoted skeleton brand");
            }
            Ok(row)
        }
        // Another caller inserted the domain first.
        Err(e) if is_unique_violation(&e) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

async fn insert_brand(
    pool: &PgPool,
    organization_id: Uuid,
    domain: &str,
    url: &str,
) -> Result<Option<BrandRow>, DbError> {
    let row = sqlx::query_as::<_, BrandRow>(returning_brand!(
        "INSERT INTO brands (id, organization_id, domain, url) \
         VALUES ($1, $2, $3, $4) \
         ON CONFLICT DO NOTHING"
    ))
    .bind(Uuid::new_v4())
    .bind(organization_id)
    .bind(domain)
    .bind(url)
    .fetch_optional(pool)
    .await?;

    if let Some(brand) = &row {
        tracing::info!(brand_id = %brand.id, %organization_id, domain, "created brand");
    }
    Ok(row)
}

/// Delete `skeleton` and fold its identity links into `winner_id`.
///
/// Runs in one transaction. Returns `None`, with nothing changed, if the
/// skeleton or the winner was already gone.
async fn absorb_skeleton(
    pool: &PgPool,
    skeleton: &BrandRow,
    winner_id: Uuid,
) -> Result<Option<BrandRow>, DbError> {
    let mut tx = pool.begin().await?;

    let deleted = sqlx::query("DELETE FROM brands WHERE id = $1 AND domain IS NULL")
        .bind(skeleton.id)
        .execute(&mut *tx)
        .await?;

    if deleted.rows_affected() == 0 {
        tx.rollback().await?;
        return Ok(None);
    }

    // Skeleton is deleted first so its tenant id can move without tripping
    // the unique constraint.
    let winner = sqlx::query_as::<_, BrandRow>(returning_brand!(
        "UPDATE brands SET \
             name                     = COALESCE(name, $2), \
             tenant_external_id       = COALESCE(tenant_external_id, $3), \
             external_organization_id = COALESCE(external_organization_id, $4), \
             updated_at               = NOW() \
         WHERE id = $1"
    ))
    .bind(winner_id)
    .bind(skeleton.name.as_deref())
    .bind(skeleton.tenant_external_id.as_deref())
    .bind(skeleton.external_organization_id.as_deref())
    .fetch_optional(&mut *tx)
    .await?;

    let Some(winner) = winner else {
        tx.rollback().await?;
        return Ok(None);
    };
    tx.commit().await?;

    tracing::info!(
        skeleton_id = %skeleton.id,
        brand_id = %winner_id,
        "absorbed skeleton brand"
    );
    Ok(Some(winner))
}

// ---------------------------------------------------------------------------
// Entry point B: tenant external id
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum TenantMergeAction {
    /// Only the tenant row exists (or both lookups hit the same row).
    UpdateInPlace(Uuid),
    /// Tenant row and domain row differ; the domain row wins.
    MergeIntoDomainOwner { loser: BrandRow, winner_id: Uuid },
    /// Only the domain row exists; link the tenant to it.
    AttachToDomainOwner(Uuid),
    /// Neither exists.
    Insert,
}

pub(crate) fn plan_tenant_merge(
    by_tenant: Option<BrandRow>,
    by_domain: Option<BrandRow>,
) -> TenantMergeAction {
    match (by_tenant, by_domain) {
        (Some(tenant), Some(owner)) if tenant.id != owner.id => {
            TenantMergeAction::MergeIntoDomainOwner {
                loser: tenant,
                winner_id: owner.id,
            }
        }
        (Some(tenant), _) => TenantMergeAction::UpdateInPlace(tenant.id),
        (None, Some(owner)) => TenantMergeAction::AttachToDomainOwner(owner.id),
        (None, None) => TenantMergeAction::Insert,
    }
}

/// Get, merge, or create the brand linked to a tenant external id.
///
/// Supplied `name`, `url` and `external_organization_id` overwrite stored
/// values; `None` leaves a stored value alone. When the tenant's row and the
/// row owning the url's domain differ, the domain row survives: the tenant
/// row is deleted if it is a skeleton, otherwise it only loses its tenant
/// link. Returns the surviving brand id.
///
/// # Errors
///
/// - [`DbError::InvalidBrandUrl`] if `url` is supplied but has no domain.
/// - [`DbError::ContentionExhausted`] if concurrent writers kept invalidating
///   the plan.
/// - [`DbError::Sqlx`] on any store failure.
pub async fn resolve_or_merge_brand_by_tenant_id(
    pool: &PgPool,
    input: &TenantBrandInput<'_>,
) -> Result<Uuid, DbError> {
    let domain = match input.url {
        Some(url) => {
            Some(extract_domain(url).ok_or_else(|| DbError::InvalidBrandUrl(url.to_string()))?)
        }
        None => None,
    };

    for attempt in 0..MAX_RESOLVE_ATTEMPTS {
        let by_tenant = get_brand_by_tenant_id(pool, input.tenant_external_id).await?;
        let by_domain = match domain.as_deref() {
            Some(d) => get_brand_by_domain(pool, d).await?,
            None => None,
        };

        let merged = match plan_tenant_merge(by_tenant, by_domain) {
            TenantMergeAction::UpdateInPlace(id) => {
                update_tenant_brand(pool, id, input, domain.as_deref()).await?
            }
            TenantMergeAction::MergeIntoDomainOwner { loser, winner_id } => {
                merge_into_domain_owner(pool, &loser, winner_id, input).await?
            }
            TenantMergeAction::AttachToDomainOwner(id) => {
                attach_tenant_to_brand(pool, id, input).await?
            }
            TenantMergeAction::Insert => {
                insert_tenant_brand(pool, input, domain.as_deref()).await?
            }
        };

        if let Some(id) = merged {
            return Ok(id);
        }
        tracing::debug!(
            attempt,
            tenant_external_id = input.tenant_external_id,
            "tenant brand merge raced; re-planning"
        );
    }

    Err(DbError::ContentionExhausted {
        entity: "brand",
        key: input.tenant_external_id.to_string(),
    })
}

/// Unique violations mean a concurrent writer moved first; the caller re-plans.
fn conflict_as_retry<T>(result: Result<Option<T>, sqlx::Error>) -> Result<Option<T>, DbError> {
    match result {
        Ok(row) => Ok(row),
        Err(e) if is_unique_violation(&e) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

async fn update_tenant_brand(
    pool: &PgPool,
    id: Uuid,
    input: &TenantBrandInput<'_>,
    domain: Option<&str>,
) -> Result<Option<Uuid>, DbError> {
    conflict_as_retry(
        sqlx::query_scalar::<_, Uuid>(
            "UPDATE brands SET \
                 name                     = COALESCE($2, name), \
                 url                      = COALESCE($3, url), \
                 domain                   = COALESCE($4, domain), \
                 external_organization_id = COALESCE($5, external_organization_id), \
                 updated_at               = NOW() \
             WHERE id = $1 \
             RETURNING id",
        )
        .bind(id)
        .bind(input.name)
        .bind(input.url)
        .bind(domain)
        .bind(input.external_organization_id)
        .fetch_optional(pool)
        .await,
    )
}

async fn attach_tenant_to_brand(
    pool: &PgPool,
    id: Uuid,
    input: &TenantBrandInput<'_>,
) -> Result<Option<Uuid>, DbError> {
    let attached = conflict_as_retry(
        sqlx::query_scalar::<_, Uuid>(
            "UPDATE brands SET \
                 tenant_external_id       = $2, \
                 name                     = COALESCE($3, name), \
                 url                      = COALESCE($4, url), \
                 external_organization_id = COALESCE($5, external_organization_id), \
                 updated_at               = NOW() \
             WHERE id = $1 \
             RETURNING id",
        )
        .bind(id)
        .bind(input.tenant_external_id)
        .bind(input.name)
        .bind(input.url)
        .bind(input.external_organization_id)
        .fetch_optional(pool)
        .await,
    )?;

    if attached.is_some() {
        tracing::info!(
            brand_id = %id,
            tenant_external_id = input.tenant_external_id,
            "linked tenant to existing brand"
        );
    }
    Ok(attached)
}

/// Move the tenant link from `loser` to `winner_id` in one transaction.
async fn merge_into_domain_owner(
    pool: &PgPool,
    loser: &BrandRow,
    winner_id: Uuid,
    input: &TenantBrandInput<'_>,
) -> Result<Option<Uuid>, DbError> {
    let mut tx = pool.begin().await?;

    let released = if loser.is_skeleton() {
        sqlx::query("DELETE FROM brands WHERE id = $1 AND tenant_external_id = $2")
    } else {
        sqlx::query(
            "UPDATE brands SET tenant_external_id = NULL, updated_at = NOW() \
             WHERE id = $1 AND tenant_external_id = $2",
        )
    }
    .bind(loser.id)
    .bind(input.tenant_external_id)
    .execute(&mut *tx)
    .await?;

    if released.rows_affected() == 0 {
        tx.rollback().await?;
        return Ok(None);
    }

    let winner = conflict_as_retry(
        sqlx::query_scalar::<_, Uuid>(
            "UPDATE brands SET \
                 tenant_external_id       = $2, \
                 name                     = COALESCE($3, name), \
                 url                      = COALESCE($4, url), \
                 external_organization_id = COALESCE($5, external_organization_id), \
                 updated_at               = NOW() \
             WHERE id = $1 \
             RETURNING id",
        )
        .bind(winner_id)
        .bind(input.tenant_external_id)
        .bind(input.name)
        .bind(input.url)
        .bind(input.external_organization_id)
        .fetch_optional(&mut *tx)
        .await,
    )?;

    let Some(winner) = winner else {
        tx.rollback().await?;
        return Ok(None);
    };
    tx.commit().await?;

    tracing::info!(
        loser_id = %loser.id,
        brand_id = %winner,
        deleted_loser = loser.is_skeleton(),
        tenant_external_id = input.tenant_external_id,
        "merged tenant brand into domain owner"
    );
    Ok(Some(winner))
}

async fn insert_tenant_brand(
    pool: &PgPool,
    input: &TenantBrandInput<'_>,
    domain: Option<&str>,
) -> Result<Option<Uuid>, DbError> {
    let inserted = sqlx::query_scalar::<_, Uuid>(
        "INSERT INTO brands (id, tenant_external_id, name, url, domain, external_organization_id) \
         VALUES ($1, $2, $3, $4, $5, $6) \
         ON CONFLICT DO NOTHING \
         RETURNING id",
    )
    .bind(Uuid::new_v4())
    .bind(input.tenant_external_id)
    .bind(input.name)
    .bind(input.url)
    .bind(domain)
    .bind(input.external_organization_id)
    .fetch_optional(pool)
    .await?;

    if let Some(id) = inserted {
        tracing::info!(
            brand_id = %id,
            tenant_external_id = input.tenant_external_id,
            "created tenant brand"
        );
    }
    Ok(inserted)
}
