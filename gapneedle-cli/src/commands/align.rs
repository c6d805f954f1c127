//! `gapneedle align`: run minimap2 on one target/query sequence pair

use anyhow::Result;
use std::path::PathBuf;

use gapneedle_core::{Aligner, AlignmentRequest, Minimap2Aligner};

use crate::config::Config;
use crate::error::from_aligner_error;

pub struct AlignArgs {
    pub target_fasta: PathBuf,
    pub query_fasta: PathBuf,
    pub target_seq: String,
    pub query_seq: String,
    pub output: Option<PathBuf>,
    pub preset: Option<String>,
    pub threads: Option<usize>,
    pub reverse_query: bool,
    pub force: bool,
    pub dry_run: bool,
    pub extra_args: Vec<String>,
}

impl AlignArgs {
    /// Merge flags over the `[align]` section.
    fn into_request(self, config: &Config) -> AlignmentRequest {
        let mut request = AlignmentRequest::new(self.target_fasta, self.query_fasta, self.target_seq, self.query_seq);
        request.preset = self.preset.unwrap_or_else(|| config.align.preset.clone());
        request.threads = self.threads.unwrap_or(config.align.threads);
        request.output = self.output;
        request.output_dir = config.align.output_dir.clone();
        request.reverse_query = self.reverse_query;
        request.reuse_existing = config.align.reuse_existing && !self.force;
        request.extra_args = self.extra_args;
        request.dry_run = self.dry_run;
        request
    }
}

pub fn execute(config: &Config, args: AlignArgs, json: bool) -> Result<()> {
    if !args.dry_run {
        super::require_file(&args.target_fasta)?;
        super::require_file(&args.query_fasta)?;
    }

    let request = args.into_request(config);
    log::info!(
        "Aligning {}:{} onto {}:{} (preset {}, {} threads)",
        request.query_fasta.display(),
        request.query_seq,
        request.target_fasta.display(),
        request.target_seq,
        request.preset,
        request.threads
    );

    let aligner = Minimap2Aligner::new(Some(PathBuf::from(&config.align.minimap2)));
    if !request.dry_run {
        if let Some(version) = aligner.version() {
            log::debug!("Using {} {}", aligner.name(), version);
        }
    }
    let run = aligner.align(&request).map_err(from_aligner_error)?;

    if json {
        return super::print_json(&run);
    }

    if run.dry_run {
        println!("{}", run.command.join(" "));
        return Ok(());
    }

    println!("PAF: {}", run.output_path.display());
    if run.skipped {
        println!("Reused existing alignment");
    } else {
        println!("Runtime: {:.2}s", run.runtime_seconds);
    }
    if let Some(stats) = &run.stats {
        println!(
            "Records: {} (+{} / -{}), aligned bases: {}, mean identity: {:.4}",
            stats.total_records,
            stats.strand_forward_count,
            stats.strand_reverse_count,
            stats.total_aligned_bases,
            stats.mean_identity
        );
    }
    Ok(())
}
