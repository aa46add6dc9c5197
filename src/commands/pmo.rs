//! PMO backend commands: one-shot sync and the sheet mirror

use crate::config::Config;
use crate::error::Result;
use crate::pmo::sheets::{self, ExportResult, GoogleSheetsClient, ImportStats, SheetClient};
use crate::pmo::sync::{run_initial_sync, SyncStats};
use crate::pmo::PmoDb;
use tracing::info;

async fn open_db(config: &Config) -> Result<PmoDb> {
    info!("Opening PMO database at {:?}", config.pmo.db_path);
    PmoDb::connect(&config.pmo.db_path).await
}

/// Run the filesystem sync without starting the server
pub async fn cmd_pmo_sync(config: &Config) -> Result<SyncStats> {
    let db = open_db(config).await?;
    run_initial_sync(&db, &config.pmo.pmo_root, &config.pmo.config_root).await
}

/// Push every table to the configured Google Sheet
pub async fn cmd_sheet_export(config: &Config) -> Result<ExportResult> {
    let client = GoogleSheetsClient::from_config(&config.sheets)?;
    let db = open_db(config).await?;
    let sheet_id = config.sheets.sheet_id.clone().unwrap_or_default();
    export_with(&db, &client, &sheet_id).await
}

/// Pull sheet rows back into the database
pub async fn cmd_sheet_import(config: &Config) -> Result<ImportStats> {
    let client = GoogleSheetsClient::from_config(&config.sheets)?;
    let db = open_db(config).await?;
    sheets::import_from_sheet(&db, &client).await
}

async fn export_with(db: &PmoDb, client: &dyn SheetClient, sheet_id: &str) -> Result<ExportResult> {
    let result = sheets::export_to_sheet(db, client, sheet_id).await?;
    info!("Exported to {}", result.sheet_url);
    Ok(result)
}

pub fn print_sync_stats(stats: &SyncStats) {
    let s = &stats.suppliers;
    println!("✓ Sync complete");
    println!("  Projects scanned:  {}", s.projects_scanned);
    println!(
        "  Suppliers:         {} created, {} existing",
        s.suppliers_created, s.suppliers_existing
    );
    println!(
        "  Contacts:          {} created, {} existing",
        s.contacts_created, s.contacts_existing
    );
    println!("  Project links:     {}", s.links_created);
    for (code, schedule) in &stats.schedules {
        println!(
            "  {}: tasks +{} ~{}, milestones +{} ~{}",
            code,
            schedule.tasks_created,
            schedule.tasks_updated,
            schedule.milestones_created,
            schedule.milestones_updated
        );
    }
}

pub fn print_export_result(result: &ExportResult) {
    let rows = &result.rows_synced;
    println!("✓ Exported to {}", result.sheet_url);
    println!(
        "  Suppliers: {}, Contacts: {}, Quotes: {}, Catalogs: {}",
        rows.suppliers, rows.contacts, rows.quotes, rows.catalogs
    );
}

pub fn print_import_stats(stats: &ImportStats) {
    println!("✓ Imported {} row(s)", stats.total_imported());
    for (tab, counts) in [
        ("Suppliers", stats.suppliers),
        ("Contacts", stats.contacts),
        ("Quotes", stats.quotes),
        ("Catalogs", stats.catalogs),
    ] {
        println!("  {:<10} {} new, {} updated", tab, counts.imported, counts.updated);
    }
}
