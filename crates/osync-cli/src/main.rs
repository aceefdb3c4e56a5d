use anyhow::Result;
use clap::{Parser, Subcommand};
use chrono::NaiveDateTime;
use osync_db::SyncStore;
use osync_schemas::{ModificationStatus, NewSyncConfig, SyncOrderFilter, SyncStatus};

mod commands;

use commands::{
    parse_modification_status, parse_start_moment, parse_sync_status, print_json,
    sync::Pass,
};

#[derive(Parser)]
#[command(name = "osync")]
#[command(about = "Order sync operator CLI", long_about = None)]
struct Cli {
    #[command(subcommand)]
    cmd: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Database commands
    Db {
        #[command(subcommand)]
        cmd: DbCmd,
    },

    /// Compute layered config hash + print canonical JSON
    ConfigHash {
        /// Paths in merge order (base -> env overrides ...)
        #[arg(required = true)]
        paths: Vec<String>,
    },

    /// Sync configs (counterparty -> organization/group/store bindings)
    Config {
        #[command(subcommand)]
        cmd: ConfigCmd,
    },

    /// Run one pass now
    Sync {
        #[command(subcommand)]
        cmd: SyncCmd,

        /// Layered config paths in merge order (default: OSYNC_CONFIG or config/base.yaml)
        #[arg(long = "config", global = true)]
        config_paths: Vec<String>,
    },

    /// Tracked orders
    Orders {
        #[command(subcommand)]
        cmd: OrdersCmd,

        /// Layered config paths in merge order (resync/approve/mark-resynced only)
        #[arg(long = "config", global = true)]
        config_paths: Vec<String>,
    },
}

#[derive(Subcommand)]
enum DbCmd {
    Status,

    /// Apply SQL migrations.
    Migrate,
}

#[derive(Subcommand)]
enum ConfigCmd {
    /// Create a sync config
    Add {
        #[arg(long)]
        name: String,

        /// Source-ledger counterparty id whose orders are synced
        #[arg(long)]
        counterparty: String,

        /// Target-ledger organization id (purchase document agent)
        #[arg(long)]
        organization: String,

        /// Target-ledger group id
        #[arg(long)]
        group: String,

        /// Target-ledger store id
        #[arg(long)]
        store: String,

        /// Discovery cutoff: YYYY-MM-DD or YYYY-MM-DD HH:MM:SS
        #[arg(long, value_parser = parse_start_moment)]
        start: NaiveDateTime,

        #[arg(long)]
        description: Option<String>,

        /// Create the config switched off
        #[arg(long, default_value_t = false)]
        inactive: bool,
    },

    /// List all sync configs
    List,
}

#[derive(Subcommand)]
enum SyncCmd {
    /// Discovery then materialization
    All,
    /// Materialize PENDING orders
    Pending,
    /// Discovery with inline reconciliation
    Statuses,
    /// Re-check SYNCED and WAITING_FOR_CONFIRM orders against the source ledger
    Reconcile,
}

#[derive(Subcommand)]
enum OrdersCmd {
    /// Filtered listing, newest first
    List {
        #[arg(long, value_parser = parse_sync_status)]
        status: Option<SyncStatus>,

        #[arg(long, value_parser = parse_modification_status)]
        modification: Option<ModificationStatus>,

        #[arg(long)]
        config_id: Option<i64>,

        /// Substring over order/purchase ids and messages
        #[arg(long)]
        search: Option<String>,

        #[arg(long, default_value_t = 0)]
        skip: i64,

        /// 1..=100
        #[arg(long, default_value_t = 10)]
        limit: i64,
    },

    /// Print one tracked order as JSON
    Get {
        #[arg(long)]
        id: i64,
    },

    /// Materialize one order now (PENDING, FAILED or WAITING_FOR_CONFIRM)
    Resync {
        #[arg(long)]
        id: i64,
    },

    /// Approve a drifted order (WAITING_FOR_APPROVE -> APPROVED)
    Approve {
        #[arg(long)]
        id: i64,
    },

    /// Target fixed by hand; take the current source order as the new
    /// baseline (APPROVED -> RESYNCED)
    MarkResynced {
        #[arg(long)]
        id: i64,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::from_filename(".env.local");

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "warn".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.cmd {
        Commands::Db { cmd } => {
            let pool = osync_db::connect_from_env().await?;
            match cmd {
                DbCmd::Status => {
                    let s = osync_db::status(&pool).await?;
                    println!("db_ok={} has_sync_tables={}", s.ok, s.has_sync_tables);
                }
                DbCmd::Migrate => {
                    osync_db::migrate(&pool).await?;
                    println!("migrations_applied=true");
                }
            }
        }

        Commands::ConfigHash { paths } => {
            let loaded = commands::load_config(&paths)?;
            println!("config_hash={}", loaded.config_hash);
            println!("{}", loaded.canonical_json);
        }

        Commands::Config { cmd } => match cmd {
            ConfigCmd::Add {
                name,
                counterparty,
                organization,
                group,
                store,
                start,
                description,
                inactive,
            } => {
                let new_cfg = NewSyncConfig {
                    name,
                    source_counterparty_id: counterparty,
                    target_organization_id: organization,
                    target_group_id: group,
                    target_store_id: store,
                    start_sync_datetime: start,
                    description,
                    is_active: !inactive,
                };
                let db = commands::open_store().await?;
                let cfg = db.insert_config(&new_cfg).await?;
                println!("config_id={} name={} active={}", cfg.id, cfg.name, cfg.is_active);
            }
            ConfigCmd::List => {
                let db = commands::open_store().await?;
                print_json(&db.list_configs().await?)?;
            }
        },

        Commands::Sync { cmd, config_paths } => {
            let pass = match cmd {
                SyncCmd::All => Pass::All,
                SyncCmd::Pending => Pass::Pending,
                SyncCmd::Statuses => Pass::Statuses,
                SyncCmd::Reconcile => Pass::Reconcile,
            };
            commands::sync::run(pass, &config_paths).await?;
        }

        Commands::Orders { cmd, config_paths } => match cmd {
            OrdersCmd::List {
                status,
                modification,
                config_id,
                search,
                skip,
                limit,
            } => {
                let filter = SyncOrderFilter {
                    sync_status: status,
                    modification_status: modification,
                    config_id,
                    search,
                    skip: Some(skip),
                    limit: Some(limit),
                    ..SyncOrderFilter::default()
                };
                commands::orders::list(filter).await?;
            }
            OrdersCmd::Get { id } => commands::orders::get(id).await?,
            OrdersCmd::Resync { id } => commands::orders::resync(id, &config_paths).await?,
            OrdersCmd::Approve { id } => commands::orders::approve(id, &config_paths).await?,
            OrdersCmd::MarkResynced { id } => {
                commands::orders::mark_resynced(id, &config_paths).await?
            }
        },
    }

    Ok(())
}
