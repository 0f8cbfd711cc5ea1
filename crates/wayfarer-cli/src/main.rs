mod config;
mod trip_cmds;

use anyhow::Context;
use clap::{Parser, Subcommand};
use sqlx::Executor;

use wayfarer_db::config::DbConfig;
use wayfarer_db::pool;

use config::WayfarerConfig;

#[derive(Parser)]
#[command(name = "wayfarer", about = "Trip plan lifecycle engine")]
struct Cli {
    /// Database URL (overrides WAYFARER_DATABASE_URL env var)
    #[arg(long, global = true)]
    database_url: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Write a wayfarer config file (no database required)
    Init {
        /// PostgreSQL connection URL
        #[arg(long, default_value = "postgresql://localhost:5432/wayfarer")]
        db_url: String,
        /// Overwrite existing config file
        #[arg(long)]
        force: bool,
    },
    /// Initialize the wayfarer database (create + migrate)
    DbInit,
    /// Trip inspection
    Trip {
        #[command(subcommand)]
        command: TripCommands,
    },
}

#[derive(Subcommand)]
pub enum TripCommands {
    /// Show a trip's preferences and current itinerary
    Show {
        /// Trip ID
        trip_id: String,
    },
    /// List a trip's version history
    Versions {
        /// Trip ID
        trip_id: String,
    },
    /// Validate a trip's current itinerary
    Validate {
        /// Trip ID
        trip_id: String,
    },
}

/// Execute the `wayfarer init` command: write config file.
fn cmd_init(db_url: &str, force: bool) -> anyhow::Result<()> {
    let path = config::config_path();

    if path.exists() && !force {
        anyhow::bail!(
            "config file already exists at {}\nUse --force to overwrite.",
            path.display()
        );
    }

    let cfg = config::ConfigFile {
        database: config::DatabaseSection {
            url: db_url.to_string(),
        },
    };
    config::save_config(&cfg)?;

    println!("Config written to {}", path.display());
    println!("  database.url = {db_url}");
    println!();
    println!("Next: run `wayfarer db-init` to create and migrate the database.");

    Ok(())
}

/// Execute the `wayfarer db-init` command: create the database when
/// absent, bring the schema up to date, and report trip-store counts.
async fn cmd_db_init(cli_db_url: Option<&str>) -> anyhow::Result<()> {
    let resolved = WayfarerConfig::resolve(cli_db_url)?;
    let db_config = &resolved.db_config;

    let db_name = db_config
        .database_name()
        .context("database URL names no database; db-init needs one to create it")?
        .to_owned();
    // Database names cannot be parameterised in CREATE DATABASE, so the
    // name is validated before string formatting.
    if !db_name
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_')
    {
        anyhow::bail!("database name {db_name:?} contains invalid characters");
    }

    let maint = pool::connect_with(
        &DbConfig::new(db_config.maintenance_url()),
        pool::PoolSettings {
            max_connections: 1,
            ..Default::default()
        },
    )
    .await?;
    let exists: bool =
        sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM pg_database WHERE datname = $1)")
            .bind(&db_name)
            .fetch_one(&maint)
            .await
            .context("failed to query pg_database")?;
    if exists {
        println!("database {db_name} already exists");
    } else {
        maint
            .execute(format!("CREATE DATABASE {db_name}").as_str())
            .await
            .with_context(|| format!("failed to create database {db_name}"))?;
        println!("database {db_name} created");
    }
    maint.close().await;

    let db_pool = pool::connect(db_config).await?;
    pool::run_migrations(&db_pool).await?;

    let trips: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM trips")
        .fetch_one(&db_pool)
        .await
        .context("failed to count trips")?;
    let bookings: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM bookings")
        .fetch_one(&db_pool)
        .await
        .context("failed to count bookings")?;
    let events: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM event_signals")
        .fetch_one(&db_pool)
        .await
        .context("failed to count event signals")?;
    db_pool.close().await;

    println!("trip store ready: {trips} trips, {bookings} bookings, {events} event signals");
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Init { db_url, force } => {
            cmd_init(&db_url, force)?;
        }
        Commands::DbInit => {
            cmd_db_init(cli.database_url.as_deref()).await?;
        }
        Commands::Trip { command } => {
            let resolved = WayfarerConfig::resolve(cli.database_url.as_deref())?;
            let db_pool = pool::connect(&resolved.db_config).await?;
            let result = trip_cmds::run_trip_command(command, &db_pool).await;
            db_pool.close().await;
            result?;
        }
    }

    Ok(())
}
