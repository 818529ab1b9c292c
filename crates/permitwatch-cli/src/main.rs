mod refresh;

use clap::{Parser, Subcommand};
use permitwatch_core::Issuer;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "permitwatch")]
#[command(about = "Building permit ingestion for Bucharest issuers")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Database maintenance
    Db {
        #[command(subcommand)]
        command: DbCommands,
    },
    /// Scrape an issuer and replace its stored permits
    Refresh {
        /// Issuer to refresh (ps1 or pmb)
        issuer: Issuer,

        /// Name recorded as the one who triggered the refresh
        #[arg(long)]
        actor: Option<String>,

        /// Scrape into memory and print a sample; DATABASE_URL is not needed
        #[arg(long)]
        dry_run: bool,
    },
    /// Show the refresh status of one or all issuers
    Status { issuer: Option<Issuer> },
    /// Search stored permits by address
    Search {
        query: String,

        #[arg(long)]
        issuer: Option<Issuer>,

        #[arg(long, default_value_t = 20)]
        limit: i64,
    },
}

#[derive(Debug, Subcommand)]
enum DbCommands {
    /// Check that the database is reachable
    Ping,
    /// Apply pending migrations
    Migrate,
    /// Ensure every issuer has a status row
    Seed,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let Some(command) = cli.command else {
        println!("permitwatch: run with --help to list commands");
        return Ok(());
    };

    let config = permitwatch_core::load_app_config()?;
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config.log_level.clone()))?;
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_ansi(config.env.colored_logs())
        .init();

    match command {
        Commands::Db { command } => run_db(&config, command).await,
        Commands::Refresh {
            issuer,
            actor,
            dry_run,
        } => refresh::run_refresh(&config, issuer, actor.as_deref(), dry_run).await,
        Commands::Status { issuer } => refresh::run_status(&config, issuer).await,
        Commands::Search {
            query,
            issuer,
            limit,
        } => refresh::run_search(&config, &query, issuer, limit).await,
    }
}

async fn run_db(config: &permitwatch_core::AppConfig, command: DbCommands) -> anyhow::Result<()> {
    let pool = permitwatch_db::connect_pool_from_config(config).await?;
    match command {
        DbCommands::Ping => {
            let health = permitwatch_db::health_check(&pool).await?;
            println!("{}", describe_health(health));
        }
        DbCommands::Migrate => {
            let applied = permitwatch_db::run_migrations(&pool).await?;
            println!("applied {applied} migration(s)");
        }
        DbCommands::Seed => {
            let created = permitwatch_db::seed_issuers(&pool, &Issuer::ALL).await?;
            println!("seeded {created} issuer status row(s)");
        }
    }
    pool.close().await;
    Ok(())
}

fn describe_health(health: permitwatch_db::DbHealth) -> String {
    if health.migrated {
        format!(
            "database is reachable; {} issuer status row(s)",
            health.seeded_issuers
        )
    } else {
        "database is reachable but not migrated; run `permitwatch db migrate`".to_string()
    }
}
