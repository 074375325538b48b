//! `inventory` command.

use anyhow::Context;
use console::style;

use super::helpers;
use crate::config::Settings;
use crate::storage::load_inventory;

pub async fn cmd_inventory(settings: &Settings, refresh: bool) -> anyhow::Result<()> {
    let store = helpers::artifact_store(settings);
    let inventory = load_inventory(&store, &settings.inventory_csv, refresh)
        .await
        .context("loading inventory")?;

    println!(
        "{} {} accessions persisted under {}",
        style("✓").green(),
        inventory.len(),
        store.root().display()
    );
    if refresh {
        println!("Inventory file: {}", settings.inventory_csv.display());
    }
    Ok(())
}
