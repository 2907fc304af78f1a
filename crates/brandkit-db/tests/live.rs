//! Live integration tests for brandkit-db using `#[sqlx::test]`.
//!
//! Each test gets a fresh, fully-migrated Postgres database spun up by the
//! sqlx test harness. `"../../migrations"` resolves to the workspace
//! migration directory.

use brandkit_core::{ExtractionKind, TokenUsage};
use brandkit_db::{
    get_brand, get_brand_by_domain, get_brand_by_tenant_id, get_cached_extraction,
    resolve_or_create_brand, resolve_or_create_organization, resolve_or_merge_brand_by_tenant_id,
    upsert_cached_extraction, DbError, NewCachedExtraction, ResolvedBrand, TenantBrandInput,
};
use chrono::Duration;
use rust_decimal::Decimal;
use std::str::FromStr;
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

async fn new_org(pool: &sqlx::PgPool, external_org_id: &str) -> Uuid {
    resolve_or_create_organization(pool, "brandkit-test", external_org_id)
        .await
        .unwrap_or_else(|e| panic!("resolve_or_create_organization failed for '{external_org_id}': {e}"))
        .id
}

/// Insert a domain-less brand owned by `organization_id`.
async fn insert_skeleton(
    pool: &sqlx::PgPool,
    organization_id: Option<Uuid>,
    tenant_external_id: Option<&str>,
    name: Option<&str>,
) -> Uuid {
    sqlx::query_scalar::<_, Uuid>(
        "INSERT INTO brands (id, organization_id, tenant_external_id, name) \
         VALUES ($1, $2, $3, $4) RETURNING id",
    )
    .bind(Uuid::new_v4())
    .bind(organization_id)
    .bind(tenant_external_id)
    .bind(name)
    .fetch_one(pool)
    .await
    .expect("insert_skeleton failed")
}

async fn count_brands(pool: &sqlx::PgPool) -> i64 {
    sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM brands")
        .fetch_one(pool)
        .await
        .expect("count brands failed")
}

// ---------------------------------------------------------------------------
// Section 1: Organizations
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../migrations")]
async fn organization_resolution_is_idempotent(pool: sqlx::PgPool) {
    let first = resolve_or_create_organization(&pool, "app", "org_1")
        .await
        .expect("first resolve failed");
    let second = resolve_or_create_organization(&pool, "app", "org_1")
        .await
        .expect("second resolve failed");
    assert_eq!(first.id, second.id);

    let other_app = resolve_or_create_organization(&pool, "other-app", "org_1")
        .await
        .expect("other app resolve failed");
    assert_ne!(first.id, other_app.id);
}

#[sqlx::test(migrations = "../../migrations")]
async fn concurrent_organization_resolution_converges(pool: sqlx::PgPool) {
    let results = futures::future::join_all(
        (0..5).map(|_| resolve_or_create_organization(&pool, "app", "org_race")),
    )
    .await;

    let ids: Vec<Uuid> = results
        .into_iter()
        .map(|r| r.expect("concurrent resolve failed").id)
        .collect();
    assert!(ids.iter().all(|id| *id == ids[0]));

    let rows: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM organizations")
        .fetch_one(&pool)
        .await
        .expect("count failed");
    assert_eq!(rows, 1);
}

// ---------------------------------------------------------------------------
// Section 2: Brand resolution by organization + url
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../migrations")]
async fn brand_resolution_normalizes_domain(pool: sqlx::PgPool) {
    let org = new_org(&pool, "org_a").await;
    let resolved = resolve_or_create_brand(&pool, org, "https://www.Acme.com/pricing")
        .await
        .expect("resolve failed");

    let brand = resolved.into_brand();
    assert_eq!(brand.domain.as_deref(), Some("acme.com"));
    assert_eq!(brand.url.as_deref(), Some("https://www.Acme.com/pricing"));
    assert_eq!(brand.organization_id, Some(org));
}

#[sqlx::test(migrations = "../../migrations")]
async fn concurrent_brand_resolution_creates_one_row(pool: sqlx::PgPool) {
    let org = new_org(&pool, "org_a").await;
    let results = futures::future::join_all(
        (0..5).map(|_| resolve_or_create_brand(&pool, org, "https://concurrent-test.example.com")),
    )
    .await;

    let ids: Vec<Uuid> = results
        .into_iter()
        .map(|r| r.expect("concurrent resolve failed").brand().id)
        .collect();
    assert!(ids.iter().all(|id| *id == ids[0]));
    assert_eq!(count_brands(&pool).await, 1);
}

#[sqlx::test(migrations = "../../migrations")]
async fn url_change_keeps_brand_id(pool: sqlx::PgPool) {
    let org = new_org(&pool, "org_a").await;
    let first = resolve_or_create_brand(&pool, org, "https://acme.com/a")
        .await
        .expect("first resolve failed")
        .into_brand();
    let second = resolve_or_create_brand(&pool, org, "https://acme.com/b")
        .await
        .expect("second resolve failed")
        .into_brand();

    assert_eq!(first.id, second.id);
    assert_eq!(second.url.as_deref(), Some("https://acme.com/b"));
}

#[sqlx::test(migrations = "../../migrations")]
async fn foreign_owned_domain_is_not_reassigned(pool: sqlx::PgPool) {
    let owner = new_org(&pool, "org_owner").await;
    let intruder = new_org(&pool, "org_intruder").await;

    let original = resolve_or_create_brand(&pool, owner, "https://acme.com")
        .await
        .expect("owner resolve failed")
        .into_brand();

    let resolved = resolve_or_create_brand(&pool, intruder, "https://acme.com/other")
        .await
        .expect("intruder resolve failed");

    match resolved {
        ResolvedBrand::ForeignOwned {
            brand,
            requested_organization_id,
        } => {
            assert_eq!(brand.id, original.id);
            assert_eq!(brand.organization_id, Some(owner));
            assert_eq!(requested_organization_id, intruder);
        }
        ResolvedBrand::Owned(_) => panic!("expected a foreign-owned outcome"),
    }

    let stored = get_brand(&pool, original.id).await.expect("get_brand failed");
    assert_eq!(stored.url.as_deref(), Some("https://acme.com"));
    assert_eq!(count_brands(&pool).await, 1);
}

#[sqlx::test(migrations = "../../migrations")]
async fn skeleton_is_promoted_for_new_domain(pool: sqlx::PgPool) {
    let org = new_org(&pool, "org_a").await;
    let skeleton_id = insert_skeleton(&pool, Some(org), Some("tenant_1"), Some("Acme")).await;

    let brand = resolve_or_create_brand(&pool, org, "https://acme.com")
        .await
        .expect("resolve failed")
        .into_brand();

    assert_eq!(brand.id, skeleton_id);
    assert_eq!(brand.domain.as_deref(), Some("acme.com"));
    assert_eq!(brand.tenant_external_id.as_deref(), Some("tenant_1"));
    assert_eq!(count_brands(&pool).await, 1);
}

#[sqlx::test(migrations = "../../migrations")]
async fn skeleton_is_absorbed_into_existing_owner_row(pool: sqlx::PgPool) {
    let org = new_org(&pool, "org_a").await;
    let existing = resolve_or_create_brand(&pool, org, "https://acme.com")
        .await
        .expect("resolve failed")
        .into_brand();
    let skeleton_id = insert_skeleton(&pool, Some(org), Some("tenant_1"), Some("Acme")).await;

    let brand = resolve_or_create_brand(&pool, org, "https://acme.com")
        .await
        .expect("second resolve failed")
        .into_brand();

    assert_eq!(brand.id, existing.id);
    assert_eq!(brand.tenant_external_id.as_deref(), Some("tenant_1"));
    assert_eq!(brand.name.as_deref(), Some("Acme"));
    assert!(matches!(
        get_brand(&pool, skeleton_id).await,
        Err(DbError::NotFound)
    ));
}

#[sqlx::test(migrations = "../../migrations")]
async fn unowned_domain_row_is_claimed(pool: sqlx::PgPool) {
    let tenant_brand = resolve_or_merge_brand_by_tenant_id(
        &pool,
        &TenantBrandInput {
            tenant_external_id: "tenant_1",
            url: Some("https://acme.com"),
            ..TenantBrandInput::default()
        },
    )
    .await
    .expect("tenant resolve failed");

    let org = new_org(&pool, "org_a").await;
    let resolved = resolve_or_create_brand(&pool, org, "https://acme.com")
        .await
        .expect("resolve failed");

    assert!(!resolved.is_foreign_owned());
    assert_eq!(resolved.brand().id, tenant_brand);
    assert_eq!(resolved.brand().organization_id, Some(org));
}

#[sqlx::test(migrations = "../../migrations")]
async fn url_without_domain_is_rejected(pool: sqlx::PgPool) {
    let org = new_org(&pool, "org_a").await;
    let err = resolve_or_create_brand(&pool, org, "   ")
        .await
        .expect_err("blank url should be rejected");
    assert!(matches!(err, DbError::InvalidBrandUrl(_)));
    assert_eq!(count_brands(&pool).await, 0);
}

// ---------------------------------------------------------------------------
// Section 3: Brand merge by tenant id
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../migrations")]
async fn tenant_brand_is_created_then_updated_in_place(pool: sqlx::PgPool) {
    let created = resolve_or_merge_brand_by_tenant_id(
        &pool,
        &TenantBrandInput {
            tenant_external_id: "tenant_1",
            name: Some("Acme"),
            ..TenantBrandInput::default()
        },
    )
    .await
    .expect("create failed");

    let updated = resolve_or_merge_brand_by_tenant_id(
        &pool,
        &TenantBrandInput {
            tenant_external_id: "tenant_1",
            url: Some("https://acme.com"),
            external_organization_id: Some("ext_9"),
            ..TenantBrandInput::default()
        },
    )
    .await
    .expect("update failed");

    assert_eq!(created, updated);
    let brand = get_brand(&pool, created).await.expect("get_brand failed");
    assert_eq!(brand.name.as_deref(), Some("Acme"));
    assert_eq!(brand.domain.as_deref(), Some("acme.com"));
    assert_eq!(brand.external_organization_id.as_deref(), Some("ext_9"));
}

#[sqlx::test(migrations = "../../migrations")]
async fn tenant_attaches_to_existing_domain_owner(pool: sqlx::PgPool) {
    let org = new_org(&pool, "org_a").await;
    let owner = resolve_or_create_brand(&pool, org, "https://acme.com")
        .await
        .expect("resolve failed")
        .into_brand();

    let id = resolve_or_merge_brand_by_tenant_id(
        &pool,
        &TenantBrandInput {
            tenant_external_id: "tenant_1",
            name: Some("Acme"),
            url: Some("https://acme.com/about"),
            ..TenantBrandInput::default()
        },
    )
    .await
    .expect("merge failed");

    assert_eq!(id, owner.id);
    let linked = get_brand_by_tenant_id(&pool, "tenant_1")
        .await
        .expect("lookup failed")
        .expect("tenant should be linked");
    assert_eq!(linked.id, owner.id);
    assert_eq!(linked.organization_id, Some(org));
    assert_eq!(count_brands(&pool).await, 1);
}

#[sqlx::test(migrations = "../../migrations")]
async fn tenant_skeleton_is_merged_into_domain_owner(pool: sqlx::PgPool) {
    let skeleton_id = insert_skeleton(&pool, None, Some("tenant_1"), Some("Acme")).await;
    let org = new_org(&pool, "org_a").await;
    let owner = resolve_or_create_brand(&pool, org, "https://acme.com")
        .await
        .expect("resolve failed")
        .into_brand();

    let id = resolve_or_merge_brand_by_tenant_id(
        &pool,
        &TenantBrandInput {
            tenant_external_id: "tenant_1",
            url: Some("https://acme.com"),
            ..TenantBrandInput::default()
        },
    )
    .await
    .expect("merge failed");

    assert_eq!(id, owner.id);
    assert!(matches!(
        get_brand(&pool, skeleton_id).await,
        Err(DbError::NotFound)
    ));
    assert_eq!(count_brands(&pool).await, 1);
}

#[sqlx::test(migrations = "../../migrations")]
async fn tenant_row_with_other_domain_only_loses_its_link(pool: sqlx::PgPool) {
    let old_id = resolve_or_merge_brand_by_tenant_id(
        &pool,
        &TenantBrandInput {
            tenant_external_id: "tenant_1",
            url: Some("https://old-acme.com"),
            ..TenantBrandInput::default()
        },
    )
    .await
    .expect("initial tenant brand failed");

    let org = new_org(&pool, "org_a").await;
    let owner = resolve_or_create_brand(&pool, org, "https://acme.com")
        .await
        .expect("resolve failed")
        .into_brand();

    let id = resolve_or_merge_brand_by_tenant_id(
        &pool,
        &TenantBrandInput {
            tenant_external_id: "tenant_1",
            url: Some("https://acme.com"),
            ..TenantBrandInput::default()
        },
    )
    .await
    .expect("merge failed");

    assert_eq!(id, owner.id);
    let old = get_brand(&pool, old_id).await.expect("old brand should survive");
    assert!(old.tenant_external_id.is_none());
    assert_eq!(old.domain.as_deref(), Some("old-acme.com"));

    let by_domain = get_brand_by_domain(&pool, "acme.com")
        .await
        .expect("lookup failed")
        .expect("domain row missing");
    assert_eq!(by_domain.tenant_external_id.as_deref(), Some("tenant_1"));
}

// ---------------------------------------------------------------------------
// Section 4: Cached extractions
// ---------------------------------------------------------------------------

fn sample_extraction(brand_id: Uuid, company: &str) -> NewCachedExtraction {
    NewCachedExtraction {
        brand_id,
        kind: ExtractionKind::SalesProfile,
        payload: serde_json::json!({ "companyName": company }),
        extraction_model: "claude-sonnet-4-5".to_string(),
        usage: TokenUsage {
            input_tokens: 1_000_000,
            output_tokens: 100_000,
        },
    }
}

#[sqlx::test(migrations = "../../migrations")]
async fn fresh_extraction_is_returned_with_cost(pool: sqlx::PgPool) {
    let org = new_org(&pool, "org_a").await;
    let brand = resolve_or_create_brand(&pool, org, "https://acme.com")
        .await
        .expect("resolve failed")
        .into_brand();

    upsert_cached_extraction(&pool, &sample_extraction(brand.id, "Acme"), Duration::days(30))
        .await
        .expect("upsert failed");

    let cached = get_cached_extraction(&pool, brand.id, ExtractionKind::SalesProfile)
        .await
        .expect("get failed")
        .expect("row should be fresh");
    assert_eq!(cached.payload["companyName"], "Acme");
    assert_eq!(cached.cost_usd, Decimal::from_str("4.5").unwrap());
    assert!(get_cached_extraction(&pool, brand.id, ExtractionKind::IcpSuggestion)
        .await
        .expect("get failed")
        .is_none());
}

#[sqlx::test(migrations = "../../migrations")]
async fn expired_extraction_is_invisible(pool: sqlx::PgPool) {
    let org = new_org(&pool, "org_a").await;
    let brand = resolve_or_create_brand(&pool, org, "https://acme.com")
        .await
        .expect("resolve failed")
        .into_brand();

    upsert_cached_extraction(&pool, &sample_extraction(brand.id, "Acme"), Duration::seconds(-1))
        .await
        .expect("upsert failed");

    let cached = get_cached_extraction(&pool, brand.id, ExtractionKind::SalesProfile)
        .await
        .expect("get failed");
    assert!(cached.is_none());
}

#[sqlx::test(migrations = "../../migrations")]
async fn upsert_replaces_existing_extraction(pool: sqlx::PgPool) {
    let org = new_org(&pool, "org_a").await;
    let brand = resolve_or_create_brand(&pool, org, "https://acme.com")
        .await
        .expect("resolve failed")
        .into_brand();

    upsert_cached_extraction(&pool, &sample_extraction(brand.id, "Old"), Duration::seconds(-1))
        .await
        .expect("first upsert failed");
    upsert_cached_extraction(&pool, &sample_extraction(brand.id, "New"), Duration::days(30))
        .await
        .expect("second upsert failed");

    let rows: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM cached_extractions WHERE brand_id = $1")
        .bind(brand.id)
        .fetch_one(&pool)
        .await
        .expect("count failed");
    assert_eq!(rows, 1);

    let cached = get_cached_extraction(&pool, brand.id, ExtractionKind::SalesProfile)
        .await
        .expect("get failed")
        .expect("replacement should be fresh");
    assert_eq!(cached.payload["companyName"], "New");
}
