//! Telomere repeat detection at sequence ends
//!
//! A sequence end is called telomeric when its terminal window holds at least
//! `min_repeats` back-to-back copies of the motif (or of its reverse
//! complement). Only the two windows are read, through the FASTA index.

use serde::{Deserialize, Serialize};

use crate::io::faidx::{FaidxError, IndexedFasta};
use crate::io::fasta::reverse_complement;
use crate::types::GenomicPos;

pub const DEFAULT_WINDOW: u64 = 1_000_000;
pub const DEFAULT_MOTIF: &str = "CCCTAA";
pub const DEFAULT_MIN_REPEATS: usize = 15;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TelomereParams {
    pub window: u64,
    pub motif: String,
    pub min_repeats: usize,
}

impl Default for TelomereParams {
    fn default() -> Self {
        Self {
            window: DEFAULT_WINDOW,
            motif: DEFAULT_MOTIF.to_string(),
            min_repeats: DEFAULT_MIN_REPEATS,
        }
    }
}

/// Longest tandem run found at one end.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TelomereEnd {
    pub has: bool,
    pub repeat_count: usize,
    /// `[start, end)` of the run in sequence coordinates.
    pub span: Option<(GenomicPos, GenomicPos)>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TelomereReport {
    pub name: String,
    pub length: GenomicPos,
    pub left: TelomereEnd,
    pub right: TelomereEnd,
}

/// Longest run of consecutive `motif` copies in `seq` as `(start, copies)`.
///
/// A mismatch restarts the search one base further on, so runs in any phase
/// are found.
pub fn longest_motif_run(seq: &[u8], motif: &[u8]) -> Option<(usize, usize)> {
    if motif.is_empty() {
        return None;
    }
    let mut best: Option<(usize, usize)> = None;
    let mut count = 0usize;
    let mut run_start = 0usize;
    let mut pos = 0usize;

    while pos + motif.len() <= seq.len() {
        if &seq[pos..pos + motif.len()] == motif {
            if count == 0 {
                run_start = pos;
            }
            count += 1;
            if best.map_or(true, |(_, n)| count > n) {
                best = Some((run_start, count));
            }
            pos += motif.len();
        } else {
            count = 0;
            pos += 1;
        }
    }
    best
}

fn scan_end(window: &str, offset: GenomicPos, params: &TelomereParams) -> TelomereEnd {
    let motif = params.motif.to_ascii_uppercase();
    let rc = reverse_complement(&motif);
    let seq = window.as_bytes();

    let forward = longest_motif_run(seq, motif.as_bytes());
    let reverse = longest_motif_run(seq, rc.as_bytes());
    let best = match (forward, reverse) {
        (Some(f), Some(r)) => Some(if r.1 > f.1 { r } else { f }),
        (f, r) => f.or(r),
    };

    match best {
        Some((start, count)) => {
            let start = offset + start as u64;
            TelomereEnd {
                has: params.min_repeats > 0 && count >= params.min_repeats,
                repeat_count: count,
                span: Some((start, start + (count * motif.len()) as u64)),
            }
        }
        None => TelomereEnd::default(),
    }
}

/// Look for telomere repeats in the first and last `window` bases of `name`.
pub fn check_telomere(
    store: &IndexedFasta,
    name: &str,
    params: &TelomereParams,
) -> Result<TelomereReport, FaidxError> {
    let length = store
        .length(name)
        .ok_or_else(|| FaidxError::SequenceNotFound(name.to_string()))?;
    let window = params.window.min(length);

    let left_seq = store.fetch(name, 0, window)?;
    let right_start = length - window;
    let right_seq = store.fetch(name, right_start, length)?;

    let report = TelomereReport {
        name: name.to_string(),
        length,
        left: scan_end(&left_seq, 0, params),
        right: scan_end(&right_seq, right_start, params),
    };
    log::debug!(
        "{}: left {} ({} copies), right {} ({} copies)",
        name,
        report.left.has,
        report.left.repeat_count,
        report.right.has,
        report.right.repeat_count
    );
    Ok(report)
}
