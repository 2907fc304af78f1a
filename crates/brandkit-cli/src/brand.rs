//! Organization and brand resolution commands.

use brandkit_db::{ResolvedBrand, TenantBrandInput};
use clap::Subcommand;
use uuid::Uuid;

/// Sub-commands available under `org`.
#[derive(Debug, Subcommand)]
pub enum OrgCommands {
    /// Get or create an organization
    Resolve {
        /// External organization id from the identity provider
        #[arg(long)]
        external_org_id: String,
        /// Application scope (defaults to `BRANDKIT_APP_ID`)
        #[arg(long)]
        app_id: Option<String>,
    },
}

/// Sub-commands available under `brand`.
#[derive(Debug, Subcommand)]
pub enum BrandCommands {
    /// Resolve the brand an organization owns for a url
    Resolve {
        #[arg(long)]
        organization_id: Uuid,
        #[arg(long)]
        url: String,
    },
    /// Resolve or merge a brand by tenant id
    Merge {
        #[arg(long)]
        tenant_id: String,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        url: Option<String>,
        #[arg(long)]
        external_org_id: Option<String>,
    },
}

pub(crate) async fn run_org_command(
    pool: &sqlx::PgPool,
    config: &brandkit_core::AppConfig,
    command: OrgCommands,
) -> anyhow::Result<()> {
    match command {
        OrgCommands::Resolve {
            external_org_id,
            app_id,
        } => {
            let app_id = app_id.as_deref().unwrap_or(config.app_id.as_str());
            let org =
                brandkit_db::resolve_or_create_organization(pool, app_id, &external_org_id).await?;
            super::print_json(&org)
        }
    }
}

pub(crate) async fn run_brand_command(
    pool: &sqlx::PgPool,
    command: BrandCommands,
) -> anyhow::Result<()> {
    match command {
        BrandCommands::Resolve {
            organization_id,
            url,
        } => {
            brandkit_db::get_organization(pool, organization_id)
                .await
                .map_err(|e| anyhow::anyhow!("organization {organization_id}: {e}"))?;

            match brandkit_db::resolve_or_create_brand(pool, organization_id, &url).await? {
                ResolvedBrand::Owned(brand) => super::print_json(&brand),
                ResolvedBrand::ForeignOwned { brand, .. } => {
                    eprintln!(
                        "warning: domain {} is owned by another organization; nothing was changed",
                        brand.domain.as_deref().unwrap_or_default()
                    );
                    super::print_json(&brand)
                }
            }
        }
        BrandCommands::Merge {
            tenant_id,
            name,
            url,
            external_org_id,
        } => {
            let input = TenantBrandInput {
                tenant_external_id: &tenant_id,
                name: name.as_deref(),
                url: url.as_deref(),
                external_organization_id: external_org_id.as_deref(),
            };
            let brand_id = brandkit_db::resolve_or_merge_brand_by_tenant_id(pool, &input).await?;
            println!("{brand_id}");
            Ok(())
        }
    }
}
