//! Assembly gap detection: runs of `N` in a FASTA file.

use std::path::Path;

use rayon::prelude::*;

use crate::io::fasta::{read_fasta, FastaError};
use crate::types::{GenomicInterval, GenomicPos};

pub const DEFAULT_MIN_GAP: u64 = 10;

/// A gap is a half-open interval of `N` bases on one sequence.
pub type GapRegion = GenomicInterval;

/// `[start, end)` runs of `N`/`n` at least `min_gap` long, left to right.
pub fn find_gaps(seq: &[u8], min_gap: u64) -> Vec<(GenomicPos, GenomicPos)> {
    let min_gap = min_gap.max(1);
    let mut gaps = Vec::new();
    let mut run_start: Option<usize> = None;

    for (i, &b) in seq.iter().enumerate() {
        if b == b'N' || b == b'n' {
            run_start.get_or_insert(i);
        } else if let Some(start) = run_start.take() {
            if (i - start) as u64 >= min_gap {
                gaps.push((start as u64, i as u64));
            }
        }
    }
    if let Some(start) = run_start {
        if (seq.len() - start) as u64 >= min_gap {
            gaps.push((start as u64, seq.len() as u64));
        }
    }
    gaps
}

/// Gaps of every sequence in a FASTA file, in file order.
///
/// Sequences are scanned in parallel.
pub fn scan_gaps<P: AsRef<Path>>(path: P, min_gap: u64) -> Result<Vec<GapRegion>, FastaError> {
    let records = read_fasta(&path)?;
    let gaps: Vec<GapRegion> = records
        .par_iter()
        .map(|record| {
            find_gaps(record.sequence.as_bytes(), min_gap)
                .into_iter()
                .map(|(start, end)| GapRegion::new(record.name.clone(), start, end))
                .collect::<Vec<_>>()
        })
        .flatten()
        .collect();

    log::info!(
        "Found {} gaps >= {} bp across {} sequences in {}",
        gaps.len(),
        min_gap,
        records.len(),
        path.as_ref().display()
    );
    Ok(gaps)
}
