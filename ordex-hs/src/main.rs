//! ordex-hs (History Service) - Operator tooling entry point
//!
//! Command-line surface for the initiatic-history consistency core:
//! integrity audits, legacy migration, and forced cache rebuilds. Form and
//! API layers call the service library directly; this binary exists for the
//! operator-triggered paths.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::{info, warn};

use ordex_hs::{CacheSynchronizer, IntegrityAuditor, LegacyMigration};

/// Command-line arguments for ordex-hs
#[derive(Parser, Debug)]
#[command(name = "ordex-hs")]
#[command(about = "History consistency tooling for the ordex records backend")]
#[command(version)]
struct Args {
    /// Path to the ordex database (default: ORDEX_DATABASE, then the config
    /// file, then the platform data directory)
    #[arg(short, long)]
    database: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Verify stored history checksums against the event store
    Audit {
        /// Rebuild the cache for divergent members
        #[arg(long)]
        repair: bool,

        /// Member ids to audit (default: all members)
        #[arg(short, long = "member")]
        members: Vec<i64>,
    },

    /// Convert and import legacy history records from a JSON file
    Migrate {
        /// JSON file mapping member id to an array of legacy event objects
        input: PathBuf,

        /// Convert and validate without writing
        #[arg(long)]
        dry_run: bool,
    },

    /// Force a history cache rebuild
    Sync {
        /// Member ids to rebuild (default: all members)
        #[arg(short, long = "member")]
        members: Vec<i64>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing subscriber
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    info!(
        "Starting Ordex History Service (ordex-hs) v{} [{}] built {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );

    let args = Args::parse();

    let db_path =
        ordex_common::config::resolve_database_path(args.database.as_deref(), "ORDEX_DATABASE")?;
    info!("Database path: {}", db_path.display());

    let pool = ordex_hs::db::init_database_pool(&db_path).await?;

    match args.command {
        Command::Audit { repair, members } => {
            let scope = if members.is_empty() {
                None
            } else {
                Some(members.as_slice())
            };

            let auditor = IntegrityAuditor::new(pool);
            let summary = auditor.audit(scope, repair).await?;

            let unrepaired = summary.divergent_count - summary.repaired_count;
            if unrepaired > 0 {
                warn!(
                    unrepaired,
                    "Divergent members left unrepaired (rerun with --repair to fix)"
                );
            }

            println!("{}", serde_json::to_string_pretty(&summary)?);
        }

        Command::Migrate { input, dry_run } => {
            let text = std::fs::read_to_string(&input)
                .with_context(|| format!("Failed to read {}", input.display()))?;
            let document: serde_json::Value = serde_json::from_str(&text)
                .with_context(|| format!("Failed to parse {}", input.display()))?;

            let migration = LegacyMigration::new(pool);
            let report = migration.run(&document, dry_run).await?;

            println!("{}", serde_json::to_string_pretty(&report)?);
        }

        Command::Sync { members } => {
            let ids = if members.is_empty() {
                ordex_common::db::members::list_member_ids(&pool).await?
            } else {
                members
            };

            let synchronizer = CacheSynchronizer::new(pool);
            for member_id in &ids {
                synchronizer.rebuild(*member_id).await?;
            }

            info!("Rebuilt history cache for {} members", ids.len());
        }
    }

    Ok(())
}
