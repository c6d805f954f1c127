//! `gapneedle scan-gaps`: report runs of N

use anyhow::{Context, Result};
use std::path::PathBuf;

use gapneedle_core::scan_gaps;

use crate::config::Config;

pub fn execute(config: &Config, fasta: PathBuf, min_gap: Option<u64>, json: bool) -> Result<()> {
    super::require_file(&fasta)?;
    let min_gap = min_gap.unwrap_or(config.gaps.min_gap);
    log::info!("Scanning {} for gaps of at least {} bp", fasta.display(), min_gap);

    let gaps = scan_gaps(&fasta, min_gap)
        .with_context(|| format!("Failed to scan FASTA file: {}", fasta.display()))?;
    let total: u64 = gaps.iter().map(|g| g.len()).sum();
    log::info!("Found {} gaps totalling {} bp", gaps.len(), total);

    if json {
        return super::print_json(&gaps);
    }
    for gap in &gaps {
        println!("{}\t{}\t{}", gap.name, gap.start, gap.end);
    }
    Ok(())
}
