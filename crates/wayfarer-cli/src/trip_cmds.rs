//! Trip inspection commands: show, versions, validate.

use anyhow::{bail, Context, Result};
use sqlx::PgPool;
use uuid::Uuid;

use wayfarer_core::catalog::InMemoryCatalog;
use wayfarer_core::editor::validate;
use wayfarer_db::queries::{items, trips, versions};

use crate::TripCommands;

pub async fn run_trip_command(command: TripCommands, pool: &PgPool) -> Result<()> {
    match command {
        TripCommands::Show { trip_id } => cmd_show(pool, &trip_id).await,
        TripCommands::Versions { trip_id } => cmd_versions(pool, &trip_id).await,
        TripCommands::Validate { trip_id } => cmd_validate(pool, &trip_id).await,
    }
}

fn parse_id(raw: &str) -> Result<Uuid> {
    raw.parse()
        .with_context(|| format!("{raw:?} is not a valid trip id"))
}

/// Print a trip's status, preferences, and day-by-day itinerary.
async fn cmd_show(pool: &PgPool, raw_id: &str) -> Result<()> {
    let trip_id = parse_id(raw_id)?;
    let trip = trips::get_trip(pool, trip_id)
        .await?
        .with_context(|| format!("trip {trip_id} not found"))?;

    println!("Trip {}", trip.id);
    println!("  owner:  {} ({})", trip.owner_id, trip.owner_kind);
    println!("  status: {}", trip.status);

    if let Some(prefs) = trips::get_preferences(pool, trip_id).await? {
        println!(
            "  {} | {} .. {} | window {}-{}",
            prefs.destination.name,
            prefs.start_date,
            prefs.end_date,
            prefs.window_start,
            prefs.window_end
        );
    }

    match items::get_itinerary(pool, trip_id).await? {
        None => println!("  no itinerary yet"),
        Some(head) => println!("  itinerary version {}", head.version),
    }

    let all_items = items::list_items_for_trip(pool, trip_id).await?;
    let mut current_day = 0;
    for item in &all_items {
        if item.day != current_day {
            current_day = item.day;
            println!("  Day {current_day}:");
        }
        let pin = if item.is_pinned { " [pinned]" } else { "" };
        println!(
            "    {}-{}  {}{pin}",
            item.start_time, item.end_time, item.name
        );
    }
    if all_items.is_empty() {
        println!("  (no items)");
    }

    Ok(())
}

/// Print the version history of a trip.
async fn cmd_versions(pool: &PgPool, raw_id: &str) -> Result<()> {
    let trip_id = parse_id(raw_id)?;
    let history = versions::list_versions(pool, trip_id).await?;
    if history.is_empty() {
        bail!("no versions recorded for trip {trip_id}");
    }

    println!("{:<8} {:<16} {:<8} created", "version", "change", "items");
    for version in history {
        let item_count: usize = version.snapshot.days.iter().map(|d| d.items.len()).sum();
        println!(
            "{:<8} {:<16} {:<8} {}",
            version.version,
            version.change_type,
            item_count,
            version.created_at.format("%Y-%m-%d %H:%M:%S")
        );
    }

    Ok(())
}

/// Run the validator and print its report.
///
/// Uses an empty catalog, so opening-hours checks are skipped; time
/// conflicts, window, distance, and budget checks still apply.
async fn cmd_validate(pool: &PgPool, raw_id: &str) -> Result<()> {
    let trip_id = parse_id(raw_id)?;
    let catalog = InMemoryCatalog::default();
    let report = validate::validate(pool, &catalog, trip_id)
        .await
        .map_err(|e| anyhow::anyhow!("[{}] {e}", e.code()))?;

    if report.issues.is_empty() {
        println!("itinerary is clean");
        return Ok(());
    }

    for issue in &report.issues {
        let severity = match issue.severity {
            validate::IssueSeverity::Error => "ERROR",
            validate::IssueSeverity::Warning => "warn ",
        };
        println!("{severity} {:?}: {}", issue.issue_type, issue.message);
        if let Some(suggestion) = &issue.suggestion {
            println!("      suggestion: {suggestion}");
        }
    }
    println!();
    println!("valid: {}", report.valid);

    Ok(())
}
