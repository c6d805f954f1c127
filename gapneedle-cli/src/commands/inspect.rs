//! Read-only inspection commands: `overlaps`, `map`, `fetch` and `names`

use anyhow::{Context, Result};
use serde::Serialize;
use std::path::{Path, PathBuf};

use gapneedle_core::io::fasta::reverse_complement;
use gapneedle_core::io::paf::rank_overlaps;
use gapneedle_core::{
    map_query_to_target, mark_overlaps, parse_alignment_records, AlignmentRecord, GenomicInterval, GenomicPos,
    IndexedFasta, MappingResult,
};

use crate::config::Config;
use crate::error::CliError;

#[derive(Serialize)]
struct OverlapRow<'a> {
    #[serde(flatten)]
    record: &'a AlignmentRecord,
    overlap_size: GenomicPos,
    identity: Option<f64>,
    query_overlaps_other: bool,
}

fn load_records(paf: &Path, target: &str, query: &str) -> Result<Vec<AlignmentRecord>> {
    super::require_file(paf)?;
    let records = parse_alignment_records(paf, target, query)
        .with_context(|| format!("Failed to parse PAF file: {}", paf.display()))?;
    log::info!("{} alignments of {} onto {}", records.len(), query, target);
    Ok(records)
}

/// List candidate overlaps between `query` and `target`, largest first.
pub fn overlaps(
    config: &Config,
    paf: PathBuf,
    target: String,
    query: String,
    limit: Option<usize>,
    json: bool,
) -> Result<()> {
    let records = load_records(&paf, &target, &query)?;
    let ranked = rank_overlaps(records, Some(limit.unwrap_or(config.paf.suggest_limit)));
    let flags = mark_overlaps(&ranked);

    let rows: Vec<OverlapRow> = ranked
        .iter()
        .zip(flags)
        .map(|(record, query_overlaps_other)| OverlapRow {
            record,
            overlap_size: record.overlap_size(),
            identity: record.identity(),
            query_overlaps_other,
        })
        .collect();

    if json {
        return super::print_json(&rows);
    }

    println!("#query\tq_start\tq_end\tstrand\ttarget\tt_start\tt_end\toverlap\tmapq\tidentity\tshared_query");
    for row in &rows {
        let r = row.record;
        println!(
            "{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}",
            r.query_name,
            r.query_start,
            r.query_end,
            r.strand,
            r.target_name,
            r.target_start,
            r.target_end,
            row.overlap_size,
            r.mapping_quality,
            row.identity.map_or_else(|| ".".to_string(), |i| format!("{:.4}", i)),
            if row.query_overlaps_other { "yes" } else { "no" }
        );
    }
    Ok(())
}

/// Pick the record that should answer for `position`: the explicit index, or
/// the first one whose query span contains it, or the first one.
fn record_for<'a>(records: &'a [AlignmentRecord], position: GenomicPos, index: Option<usize>) -> Option<&'a AlignmentRecord> {
    match index {
        Some(i) => records.get(i),
        None => records
            .iter()
            .find(|r| r.query_start <= position && position < r.query_end)
            .or_else(|| records.first()),
    }
}

pub fn map(
    paf: PathBuf,
    target: String,
    query: String,
    positions: Vec<GenomicPos>,
    record_index: Option<usize>,
    json: bool,
) -> Result<()> {
    let records = load_records(&paf, &target, &query)?;
    if records.is_empty() {
        return Err(CliError::NoAlignment { target, query, path: paf }.into());
    }
    if let Some(i) = record_index.filter(|&i| i >= records.len()) {
        return Err(CliError::validation(format!(
            "record index {} out of range ({} alignments)",
            i,
            records.len()
        ))
        .into());
    }

    let mut results: Vec<MappingResult> = Vec::with_capacity(positions.len());
    for &position in &positions {
        let Some(record) = record_for(&records, position, record_index) else {
            continue;
        };
        let result = map_query_to_target(record, position);
        if result.span_mismatch(record) {
            log::warn!(
                "CIGAR of {} [{}, {}) does not add up to the PAF spans",
                record.query_name,
                record.query_start,
                record.query_end
            );
        }
        results.push(result);
    }

    if json {
        return super::print_json(&results);
    }

    println!("#query_pos\ttarget_pos\treason\top\top_offset\tcounts_before");
    for result in &results {
        println!(
            "{}\t{}\t{}\t{}\t{}\t{}",
            result.query_position,
            result.target_position.map_or_else(|| ".".to_string(), |p| p.to_string()),
            result.reason,
            result.op.map_or_else(|| ".".to_string(), |c| format!("{}{}", result.op_length, c)),
            result.op_offset,
            result.counts_before
        );
    }
    Ok(())
}

/// `name`, or `name:start-end` with 0-based half-open coordinates.
///
/// Sequence names may contain ':'; only a trailing `:start-end` that parses is
/// taken as a range.
fn parse_region(store: &IndexedFasta, region: &str) -> Result<GenomicInterval> {
    if store.contains(region) {
        let len = store.length(region).unwrap_or(0);
        return Ok(GenomicInterval::new(region, 0, len));
    }
    if let Some((name, range)) = region.rsplit_once(':') {
        if let Some((start, end)) = range.split_once('-') {
            let start: GenomicPos = start
                .replace(',', "")
                .parse()
                .with_context(|| format!("Invalid start in region '{}'", region))?;
            let end: GenomicPos = end
                .replace(',', "")
                .parse()
                .with_context(|| format!("Invalid end in region '{}'", region))?;
            if start > end {
                return Err(CliError::validation(format!("region '{}' has start > end", region)).into());
            }
            return Ok(GenomicInterval::new(name, start, end));
        }
    }
    Ok(GenomicInterval::new(region, 0, 0))
}

#[derive(Serialize)]
struct FetchedRegion {
    #[serde(flatten)]
    interval: GenomicInterval,
    reverse: bool,
    sequence: String,
}

pub fn fetch(fasta: PathBuf, regions: Vec<String>, reverse: bool, json: bool) -> Result<()> {
    super::require_file(&fasta)?;
    let store = IndexedFasta::open(&fasta)
        .with_context(|| format!("Failed to index FASTA file: {}", fasta.display()))?;

    let mut fetched = Vec::with_capacity(regions.len());
    for region in &regions {
        let interval = parse_region(&store, region)?;
        if !store.contains(&interval.name) {
            return Err(CliError::sequence_not_found(interval.name, fasta).into());
        }
        let mut sequence = store
            .fetch(&interval.name, interval.start, interval.end)
            .with_context(|| format!("Failed to fetch {}", region))?;
        if reverse {
            sequence = reverse_complement(&sequence);
        }
        log::debug!("Fetched {} bases for {}", sequence.len(), region);
        fetched.push(FetchedRegion {
            interval,
            reverse,
            sequence,
        });
    }

    if json {
        return super::print_json(&fetched);
    }

    for region in &fetched {
        let i = &region.interval;
        let suffix = if region.reverse { ":rc" } else { "" };
        println!(">{}:{}-{}{}", i.name, i.start, i.start + region.sequence.len() as u64, suffix);
        for line in region.sequence.as_bytes().chunks(80) {
            println!("{}", String::from_utf8_lossy(line));
        }
    }
    Ok(())
}

#[derive(Serialize)]
struct NameRow<'a> {
    name: &'a str,
    length: GenomicPos,
}

pub fn names(fasta: PathBuf, json: bool) -> Result<()> {
    super::require_file(&fasta)?;
    let store = IndexedFasta::open(&fasta)
        .with_context(|| format!("Failed to index FASTA file: {}", fasta.display()))?;
    log::info!("{} sequences in {}", store.names().len(), fasta.display());

    let rows: Vec<NameRow> = store
        .entries()
        .iter()
        .map(|e| NameRow {
            name: &e.name,
            length: e.length,
        })
        .collect();

    if json {
        return super::print_json(&rows);
    }
    for row in &rows {
        println!("{}\t{}", row.name, row.length);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use gapneedle_core::io::paf::PafParser;
    use tempfile::tempdir;

    #[test]
    fn test_parse_region() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("asm.fa");
        std::fs::write(&path, ">chr1\nACGTACGTAC\n>HLA:01\nGGGG\n").unwrap();
        let store = IndexedFasta::open(&path).unwrap();

        assert_eq!(parse_region(&store, "chr1").unwrap(), GenomicInterval::new("chr1", 0, 10));
        assert_eq!(parse_region(&store, "chr1:2-6").unwrap(), GenomicInterval::new("chr1", 2, 6));
        assert_eq!(parse_region(&store, "HLA:01").unwrap(), GenomicInterval::new("HLA:01", 0, 4));
        assert_eq!(parse_region(&store, "HLA:01:1-3").unwrap(), GenomicInterval::new("HLA:01", 1, 3));
        assert!(parse_region(&store, "chr1:6-2").is_err());
        assert!(parse_region(&store, "chr1:x-2").is_err());
    }

    #[test]
    fn test_record_for_prefers_containing_span() {
        let records: Vec<AlignmentRecord> = [
            "q\t100\t0\t10\t+\tt\t100\t0\t10\t10\t10\t60\tcg:Z:10M",
            "q\t100\t50\t60\t+\tt\t100\t50\t60\t10\t10\t60\tcg:Z:10M",
        ]
        .iter()
        .map(|l| PafParser::parse_line(l).unwrap())
        .collect();

        assert_eq!(record_for(&records, 55, None).unwrap().query_start, 50);
        assert_eq!(record_for(&records, 30, None).unwrap().query_start, 0);
        assert_eq!(record_for(&records, 55, Some(0)).unwrap().query_start, 0);
        assert!(record_for(&records, 55, Some(2)).is_none());
    }

    #[test]
    fn test_map_without_alignment_is_error() {
        let dir = tempdir().unwrap();
        let paf = dir.path().join("aln.paf");
        std::fs::write(&paf, "q\t100\t0\t10\t+\tt\t100\t0\t10\t10\t10\t60\tcg:Z:10M\n").unwrap();

        let err = map(paf.clone(), "t".into(), "other".into(), vec![5], None, false).unwrap_err();
        assert!(matches!(err.downcast_ref::<CliError>(), Some(CliError::NoAlignment { .. })));
        assert!(map(paf, "t".into(), "q".into(), vec![5], None, true).is_ok());
    }

    #[test]
    fn test_fetch_unknown_sequence() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("asm.fa");
        std::fs::write(&path, ">chr1\nACGT\n").unwrap();

        let err = fetch(path.clone(), vec!["chr2:0-2".into()], false, false).unwrap_err();
        assert!(matches!(err.downcast_ref::<CliError>(), Some(CliError::SequenceNotFound { .. })));
        assert!(fetch(path.clone(), vec!["chr1:1-3".into()], true, true).is_ok());
        assert!(names(path, false).is_ok());
    }
}
