//! `gapneedle stitch` and `gapneedle auto-stitch`

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

use gapneedle_core::io::paf::rank_overlaps;
use gapneedle_core::stitch::{FlankChoice, PlanChoices, QUERY_SOURCE, TARGET_SOURCE};
use gapneedle_core::{parse_alignment_records, stitch, FastaCache, Segment, StitchPlan, StitchRequest, StitchResult};

use crate::config::Config;
use crate::error::CliError;

pub struct StitchArgs {
    pub target_fasta: PathBuf,
    pub query_fasta: PathBuf,
    pub segments: Vec<String>,
    /// Extra sources as `key=path`
    pub sources: Vec<String>,
    pub output: PathBuf,
    pub output_name: Option<String>,
    pub context: Option<usize>,
}

fn parse_source(arg: &str) -> Result<(String, PathBuf)> {
    match arg.split_once('=') {
        Some((key, path)) if !key.is_empty() && !path.is_empty() => {
            if key == TARGET_SOURCE || key == QUERY_SOURCE {
                return Err(CliError::validation(format!("source key '{}' is reserved", key)).into());
            }
            Ok((key.to_string(), PathBuf::from(path)))
        }
        _ => Err(CliError::validation(format!("expected KEY=PATH for --source, got '{}'", arg)).into()),
    }
}

fn report(result: &StitchResult, json: bool) -> Result<()> {
    if json {
        return super::print_json(result);
    }
    println!("Output FASTA: {}", result.output_fasta.display());
    println!("Session log: {}", result.session_log.display());
    println!("Merged length: {}", result.merged_length);
    for bp in &result.breakpoints {
        println!(
            "Junction {}: left_flank_match={} right_flank_match={} {}",
            bp.index, bp.left_flank_match, bp.right_flank_match, bp.preview
        );
    }
    Ok(())
}

fn run(request: &StitchRequest, cache: &mut FastaCache) -> Result<StitchResult> {
    let result = stitch(request, cache)
        .with_context(|| format!("Failed to stitch into {}", request.output_fasta.display()))?;
    log::info!(
        "Wrote {} ({} bp from {} segments)",
        result.output_fasta.display(),
        result.merged_length,
        request.segments.len()
    );
    Ok(result)
}

pub fn execute(config: &Config, args: StitchArgs, json: bool) -> Result<()> {
    super::require_file(&args.target_fasta)?;
    super::require_file(&args.query_fasta)?;

    let mut request = StitchRequest::new(args.target_fasta, args.query_fasta, args.output);
    for arg in &args.sources {
        let (key, path) = parse_source(arg)?;
        super::require_file(&path)?;
        request.extra_sources.insert(key, path);
    }
    request.segments = args
        .segments
        .iter()
        .map(|s| s.parse::<Segment>())
        .collect::<Result<_, _>>()?;
    if let Some(name) = args.output_name {
        request.output_seq_name = name;
    }
    request.context_bp = args.context.unwrap_or(config.stitch.context_bp);

    log::info!("Stitching {} segments", request.segments.len());
    let result = run(&request, &mut FastaCache::new())?;
    report(&result, json)
}

pub struct AutoStitchArgs {
    pub paf: PathBuf,
    pub target_fasta: PathBuf,
    pub query_fasta: PathBuf,
    pub target: String,
    pub query: String,
    /// Index into the ranked candidates; 0 is the largest overlap
    pub rank: usize,
    pub left: FlankChoice,
    pub overlap: FlankChoice,
    pub right: FlankChoice,
    pub output: PathBuf,
    pub output_name: Option<String>,
    pub context: Option<usize>,
    pub plan_only: bool,
}

fn sequence_length(cache: &mut FastaCache, fasta: &Path, name: &str) -> Result<u64> {
    let store = cache
        .open(fasta)
        .with_context(|| format!("Failed to index FASTA file: {}", fasta.display()))?;
    store
        .length(name)
        .ok_or_else(|| CliError::sequence_not_found(name, fasta).into())
}

pub fn auto(config: &Config, args: AutoStitchArgs, json: bool) -> Result<()> {
    super::require_file(&args.paf)?;
    super::require_file(&args.target_fasta)?;
    super::require_file(&args.query_fasta)?;

    let records = parse_alignment_records(&args.paf, &args.target, &args.query)
        .with_context(|| format!("Failed to parse PAF file: {}", args.paf.display()))?;
    let ranked = rank_overlaps(records, None);
    let record = ranked.get(args.rank).ok_or_else(|| {
        if ranked.is_empty() {
            CliError::NoAlignment {
                target: args.target.clone(),
                query: args.query.clone(),
                path: args.paf.clone(),
            }
        } else {
            CliError::validation(format!("rank {} out of range ({} alignments)", args.rank, ranked.len()))
        }
    })?;
    log::info!(
        "Using alignment {}:{}-{} ({}) -> {}:{}-{}",
        record.query_name,
        record.query_start,
        record.query_end,
        record.strand,
        record.target_name,
        record.target_start,
        record.target_end
    );

    let mut cache = FastaCache::new();
    let target_len = sequence_length(&mut cache, &args.target_fasta, &args.target)?;
    let query_len = sequence_length(&mut cache, &args.query_fasta, &args.query)?;
    if target_len != record.target_len || query_len != record.query_len {
        log::warn!(
            "PAF lengths ({} / {}) differ from the FASTA ({} / {})",
            record.target_len,
            record.query_len,
            target_len,
            query_len
        );
    }

    let choices = PlanChoices {
        left: args.left,
        overlap: args.overlap,
        right: args.right,
    };
    let mut plan = StitchPlan::from_alignment(record, target_len, query_len, choices);
    if let Some(name) = args.output_name {
        plan.output_seq_name = name;
    }

    if args.plan_only {
        if json {
            return super::print_json(&plan);
        }
        for segment in &plan.segments {
            println!("{}", segment);
        }
        return Ok(());
    }

    let mut request = plan.into_request(args.target_fasta, args.query_fasta, args.output);
    request.context_bp = args.context.unwrap_or(config.stitch.context_bp);
    let result = run(&request, &mut cache)?;
    report(&result, json)
}
