//! `gapneedle check-telomere`

use anyhow::{Context, Result};
use std::path::PathBuf;

use gapneedle_core::telomere::TelomereEnd;
use gapneedle_core::{check_telomere, FastaCache};

use crate::config::Config;
use crate::error::CliError;

pub struct TelomereArgs {
    pub fasta: PathBuf,
    /// Empty checks every sequence in the file
    pub names: Vec<String>,
    pub window: Option<u64>,
    pub motif: Option<String>,
    pub min_repeats: Option<usize>,
}

fn describe(end: &TelomereEnd) -> String {
    match end.span {
        Some((start, stop)) => format!("{} ({}x at {}-{})", end.has, end.repeat_count, start, stop),
        None => end.has.to_string(),
    }
}

pub fn execute(config: &Config, args: TelomereArgs, json: bool) -> Result<()> {
    super::require_file(&args.fasta)?;

    let mut params = config.telomere.to_params();
    if let Some(window) = args.window {
        params.window = window;
    }
    if let Some(motif) = args.motif {
        params.motif = motif;
    }
    if let Some(min_repeats) = args.min_repeats {
        params.min_repeats = min_repeats;
    }
    if params.motif.is_empty() || params.window == 0 {
        return Err(CliError::validation("motif and window must be non-empty").into());
    }

    let mut cache = FastaCache::new();
    let store = cache
        .open(&args.fasta)
        .with_context(|| format!("Failed to index FASTA file: {}", args.fasta.display()))?;

    let names = if args.names.is_empty() {
        store.names().to_vec()
    } else {
        args.names
    };
    log::info!(
        "Checking {} sequences for {} x{} within {} bp of each end",
        names.len(),
        params.motif,
        params.min_repeats,
        params.window
    );

    let mut reports = Vec::with_capacity(names.len());
    for name in &names {
        if !store.contains(name) {
            return Err(CliError::sequence_not_found(name.as_str(), args.fasta.as_path()).into());
        }
        let report = check_telomere(&store, name, &params)
            .with_context(|| format!("Failed to check telomeres of {}", name))?;
        reports.push(report);
    }

    if json {
        return super::print_json(&reports);
    }
    for report in &reports {
        println!(
            "{}\tleft={}\tright={}",
            report.name,
            describe(&report.left),
            describe(&report.right)
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_describe() {
        assert_eq!(describe(&TelomereEnd::default()), "false");
        let end = TelomereEnd {
            has: true,
            repeat_count: 20,
            span: Some((0, 120)),
        };
        assert_eq!(describe(&end), "true (20x at 0-120)");
    }

    #[test]
    fn test_unknown_sequence_is_reported() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("asm.fa");
        std::fs::write(&path, ">chr1\nCCCTAACCCTAAACGT\n").unwrap();

        let args = |names: Vec<String>| TelomereArgs {
            fasta: path.clone(),
            names,
            window: Some(50),
            motif: None,
            min_repeats: Some(2),
        };
        assert!(execute(&Config::default(), args(Vec::new()), false).is_ok());
        let err = execute(&Config::default(), args(vec!["chr9".into()]), false).unwrap_err();
        assert!(matches!(err.downcast_ref::<CliError>(), Some(CliError::SequenceNotFound { .. })));
    }
}
