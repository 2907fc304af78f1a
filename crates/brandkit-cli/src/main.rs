mod brand;
mod extract;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use crate::brand::{BrandCommands, OrgCommands};
use crate::extract::ExtractArgs;

#[derive(Debug, Parser)]
#[command(name = "brandkit-cli")]
#[command(about = "brandkit command line interface")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Apply pending database migrations
    Migrate,
    /// Organization identity
    Org {
        #[command(subcommand)]
        command: OrgCommands,
    },
    /// Brand identity and tenant merges
    Brand {
        #[command(subcommand)]
        command: BrandCommands,
    },
    /// Run the extraction pipeline for a brand
    Extract(ExtractArgs),
    /// Show the fresh cached extraction for a brand
    Cached {
        /// Brand id
        #[arg(long)]
        brand_id: uuid::Uuid,
        /// Extraction kind (`sales_profile` or `icp_suggestion`)
        #[arg(long)]
        kind: brandkit_core::ExtractionKind,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let Some(command) = cli.command else {
        println!("brandkit-cli ready; run with --help for commands");
        return Ok(());
    };

    let config = brandkit_core::load_app_config()?;
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config.log_level.clone()))?;
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    let pool_config = brandkit_db::PoolConfig::from_app_config(&config);
    let pool = brandkit_db::connect_pool(&config.database_url, pool_config).await?;

    match command {
        Commands::Migrate => {
            let applied = brandkit_db::run_migrations(&pool).await?;
            println!("applied {applied} migration(s)");
        }
        Commands::Org { command } => brand::run_org_command(&pool, &config, command).await?,
        Commands::Brand { command } => brand::run_brand_command(&pool, command).await?,
        Commands::Extract(args) => extract::run_extract(pool, &config, args).await?,
        Commands::Cached { brand_id, kind } => extract::run_cached(&pool, brand_id, kind).await?,
    }

    Ok(())
}

/// Print `value` as pretty JSON on stdout.
fn print_json<T: serde::Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
