//! `discover` command: list a filer's 13F submissions into a batch file.

use std::path::PathBuf;

use anyhow::Context;
use console::style;

use super::helpers;
use crate::config::Settings;
use crate::models::normalize_cik;
use crate::pipeline::write_batch;
use crate::source::FilingSource;

pub async fn cmd_discover(
    settings: &Settings,
    ciks: &[String],
    output: Option<PathBuf>,
) -> anyhow::Result<()> {
    let source = helpers::edgar_source(settings)?;
    let dir = output.unwrap_or_else(|| settings.batches_dir.clone());
    std::fs::create_dir_all(&dir).with_context(|| format!("creating {}", dir.display()))?;

    for cik in ciks {
        let cik = normalize_cik(cik);
        match source.list_pending_accessions(&cik).await {
            Ok(accessions) => {
                let path = dir.join(format!("{}.csv", cik));
                write_batch(&path, &accessions)
                    .with_context(|| format!("writing {}", path.display()))?;
                println!(
                    "{} {}: {} filings -> {}",
                    style("✓").green(),
                    cik,
                    accessions.len(),
                    path.display()
                );
            }
            Err(e) => {
                println!("{} {}: {}", style("✗").red(), cik, e);
            }
        }
    }
    Ok(())
}
