use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod commands;
mod config;
mod error;

use config::Config;
use gapneedle_core::stitch::FlankChoice;

#[derive(Parser)]
#[command(name = "gapneedle")]
#[command(about = "GapNeedle - alignment inspection and gap-filling toolkit")]
#[command(version)]
#[command(long_about = "
GapNeedle reads minimap2 PAF alignments between two assemblies, maps query
coordinates onto the target through the CIGAR, and stitches target and query
pieces into a new sequence to close gaps.

Examples:
  gapneedle align --target-fasta ref.fa --query-fasta asm.fa --target chr1 --query ctg7
  gapneedle overlaps --paf aln.paf --target chr1 --query ctg7
  gapneedle map --paf aln.paf --target chr1 --query ctg7 --pos 15000
  gapneedle stitch --target-fasta ref.fa --query-fasta asm.fa --out merged.fa \\
      --segment t:chr1:0:100000 --segment q:ctg7:5000:80000:rc
  gapneedle auto-stitch --paf aln.paf --target-fasta ref.fa --query-fasta asm.fa \\
      --target chr1 --query ctg7 --out merged.fa
  gapneedle scan-gaps --fasta ref.fa --min-gap 100
")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Configuration file path
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Number of threads for parallel scans
    #[arg(short, long, global = true)]
    pub threads: Option<usize>,

    /// Print results as JSON
    #[arg(long, global = true)]
    pub json: bool,

    /// Verbose output
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Quiet mode (suppress non-error output)
    #[arg(short, long, global = true)]
    pub quiet: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Align one query sequence onto one target sequence with minimap2
    Align {
        #[arg(long)]
        target_fasta: PathBuf,

        #[arg(long)]
        query_fasta: PathBuf,

        /// Target sequence name
        #[arg(long)]
        target: String,

        /// Query sequence name
        #[arg(long)]
        query: String,

        /// Output PAF file or directory (default: [align] output_dir)
        #[arg(short, long)]
        out: Option<PathBuf>,

        /// minimap2 preset
        #[arg(long)]
        preset: Option<String>,

        /// Threads passed to minimap2
        #[arg(long)]
        aligner_threads: Option<usize>,

        /// Reverse-complement the query before aligning
        #[arg(long)]
        reverse_query: bool,

        /// Re-run even if the PAF already exists
        #[arg(long)]
        force: bool,

        /// Print the command without running it
        #[arg(long)]
        dry_run: bool,

        /// Additional minimap2 arguments
        #[arg(long, allow_hyphen_values = true)]
        extra_args: Vec<String>,
    },

    /// List candidate overlaps between two sequences, largest first
    Overlaps {
        #[arg(long)]
        paf: PathBuf,

        #[arg(long)]
        target: String,

        #[arg(long)]
        query: String,

        /// Maximum candidates (0 lists all; default: [paf] suggest_limit)
        #[arg(short, long)]
        limit: Option<usize>,
    },

    /// Map query positions onto the target through the CIGAR
    Map {
        #[arg(long)]
        paf: PathBuf,

        #[arg(long)]
        target: String,

        #[arg(long)]
        query: String,

        /// 0-based query positions
        #[arg(long = "pos", required = true, num_args = 1..)]
        positions: Vec<u64>,

        /// Use this alignment (0-based, file order) instead of the one covering each position
        #[arg(long)]
        record: Option<usize>,
    },

    /// Print regions (`name` or `name:start-end`, 0-based half-open) as FASTA
    Fetch {
        #[arg(long)]
        fasta: PathBuf,

        #[arg(required = true)]
        regions: Vec<String>,

        /// Reverse-complement each region
        #[arg(long)]
        rc: bool,
    },

    /// List sequence names and lengths
    Names {
        fasta: PathBuf,
    },

    /// Join segments into one sequence
    Stitch {
        #[arg(long)]
        target_fasta: PathBuf,

        #[arg(long)]
        query_fasta: PathBuf,

        /// Segment as source:name:start:end[:rc]
        #[arg(long = "segment", required = true)]
        segments: Vec<String>,

        /// Extra segment source as KEY=PATH
        #[arg(long = "source")]
        sources: Vec<String>,

        #[arg(short, long)]
        out: PathBuf,

        /// Output sequence name
        #[arg(long)]
        output_name: Option<String>,

        /// Bases shown on each side of a junction
        #[arg(long)]
        context: Option<usize>,
    },

    /// Plan and stitch the flanks around one alignment
    AutoStitch {
        #[arg(long)]
        paf: PathBuf,

        #[arg(long)]
        target_fasta: PathBuf,

        #[arg(long)]
        query_fasta: PathBuf,

        #[arg(long)]
        target: String,

        #[arg(long)]
        query: String,

        /// Which ranked alignment to use (0 is the largest overlap)
        #[arg(long, default_value = "0")]
        rank: usize,

        /// Source of the left flank: target, query or longer
        #[arg(long, default_value = "longer")]
        left: FlankChoice,

        /// Source of the aligned block
        #[arg(long, default_value = "target")]
        overlap: FlankChoice,

        /// Source of the right flank
        #[arg(long, default_value = "longer")]
        right: FlankChoice,

        #[arg(short, long)]
        out: PathBuf,

        #[arg(long)]
        output_name: Option<String>,

        #[arg(long)]
        context: Option<usize>,

        /// Print the planned segments without writing anything
        #[arg(long)]
        plan_only: bool,
    },

    /// Report runs of N
    ScanGaps {
        #[arg(long)]
        fasta: PathBuf,

        /// Shortest reported gap (default: [gaps] min_gap)
        #[arg(long)]
        min_gap: Option<u64>,
    },

    /// Look for telomere repeats near both ends of each sequence
    CheckTelomere {
        #[arg(long)]
        fasta: PathBuf,

        /// Sequences to check (default: all)
        #[arg(long = "seq")]
        names: Vec<String>,

        #[arg(long)]
        window: Option<u64>,

        #[arg(long)]
        motif: Option<String>,

        #[arg(long)]
        min_repeats: Option<usize>,
    },

    /// Print or write an example gapneedle.toml
    Config {
        /// Write to this file instead of stdout
        #[arg(short, long)]
        out: Option<PathBuf>,
    },
}

fn setup_logging(verbose: u8, quiet: bool) -> Result<()> {
    if quiet {
        std::env::set_var("RUST_LOG", "error");
    } else {
        let level = match verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        };
        std::env::set_var("RUST_LOG", level);
    }

    env_logger::Builder::from_default_env()
        .format_timestamp_secs()
        .init();

    Ok(())
}

fn run(cli: Cli) -> Result<()> {
    let config = Config::load(cli.config.as_deref())?;

    if let Some(threads) = cli.threads {
        rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .build_global()
            .context("Failed to set thread count")?;
    }

    let json = cli.json;
    match cli.command {
        Commands::Align {
            target_fasta,
            query_fasta,
            target,
            query,
            out,
            preset,
            aligner_threads,
            reverse_query,
            force,
            dry_run,
            extra_args,
        } => {
            let args = commands::align::AlignArgs {
                target_fasta,
                query_fasta,
                target_seq: target,
                query_seq: query,
                output: out,
                preset,
                threads: aligner_threads,
                reverse_query,
                force,
                dry_run,
                extra_args,
            };
            commands::align::execute(&config, args, json)?;
        }

        Commands::Overlaps { paf, target, query, limit } => {
            commands::inspect::overlaps(&config, paf, target, query, limit, json)?;
        }

        Commands::Map { paf, target, query, positions, record } => {
            commands::inspect::map(paf, target, query, positions, record, json)?;
        }

        Commands::Fetch { fasta, regions, rc } => {
            commands::inspect::fetch(fasta, regions, rc, json)?;
        }

        Commands::Names { fasta } => {
            commands::inspect::names(fasta, json)?;
        }

        Commands::Stitch {
            target_fasta,
            query_fasta,
            segments,
            sources,
            out,
            output_name,
            context,
        } => {
            let args = commands::stitch::StitchArgs {
                target_fasta,
                query_fasta,
                segments,
                sources,
                output: out,
                output_name,
                context,
            };
            commands::stitch::execute(&config, args, json)?;
        }

        Commands::AutoStitch {
            paf,
            target_fasta,
            query_fasta,
            target,
            query,
            rank,
            left,
            overlap,
            right,
            out,
            output_name,
            context,
            plan_only,
        } => {
            let args = commands::stitch::AutoStitchArgs {
                paf,
                target_fasta,
                query_fasta,
                target,
                query,
                rank,
                left,
                overlap,
                right,
                output: out,
                output_name,
                context,
                plan_only,
            };
            commands::stitch::auto(&config, args, json)?;
        }

        Commands::ScanGaps { fasta, min_gap } => {
            commands::gaps::execute(&config, fasta, min_gap, json)?;
        }

        Commands::CheckTelomere {
            fasta,
            names,
            window,
            motif,
            min_repeats,
        } => {
            let args = commands::telomere::TelomereArgs {
                fasta,
                names,
                window,
                motif,
                min_repeats,
            };
            commands::telomere::execute(&config, args, json)?;
        }

        Commands::Config { out } => match out {
            Some(path) => {
                config.save_to_file(&path)?;
                log::info!("Configuration written to {}", path.display());
            }
            None => print!("{}", Config::example_toml()?),
        },
    }

    Ok(())
}

fn main() {
    let cli = Cli::parse();

    if let Err(e) = setup_logging(cli.verbose, cli.quiet) {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }

    if let Err(e) = run(cli) {
        match e.downcast_ref::<error::CliError>() {
            Some(cli_error) => eprintln!("Error: {}", error::format_error_with_suggestions(cli_error)),
            None => eprintln!("Error: {:#}", e),
        }
        std::process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_segments_and_globals() {
        let cli = Cli::try_parse_from([
            "gapneedle",
            "-vv",
            "--json",
            "stitch",
            "--target-fasta",
            "t.fa",
            "--query-fasta",
            "q.fa",
            "--out",
            "m.fa",
            "--segment",
            "t:chr1:0:10",
            "--segment",
            "q:ctg:5:9:rc",
        ])
        .unwrap();
        assert_eq!(cli.verbose, 2);
        assert!(cli.json);
        match cli.command {
            Commands::Stitch { segments, .. } => assert_eq!(segments.len(), 2),
            _ => panic!("expected stitch"),
        }
    }

    #[test]
    fn test_flank_choice_flags() {
        let cli = Cli::try_parse_from([
            "gapneedle",
            "auto-stitch",
            "--paf",
            "a.paf",
            "--target-fasta",
            "t.fa",
            "--query-fasta",
            "q.fa",
            "--target",
            "chr1",
            "--query",
            "ctg",
            "--out",
            "m.fa",
            "--right",
            "q",
        ])
        .unwrap();
        match cli.command {
            Commands::AutoStitch { left, overlap, right, .. } => {
                assert_eq!(left, FlankChoice::Longer);
                assert_eq!(overlap, FlankChoice::Target);
                assert_eq!(right, FlankChoice::Query);
            }
            _ => panic!("expected auto-stitch"),
        }
    }
}
