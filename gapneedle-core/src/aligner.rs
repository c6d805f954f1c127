//! External aligner invocation
//!
//! GapNeedle does not align anything itself. It cuts the two sequences of
//! interest out of their FASTA files, hands them to minimap2 and keeps the PAF
//! it writes. Alignments are cached on disk under a name derived from the
//! inputs, so re-running the same request is free.

use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::Instant;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::io::fasta::{read_fasta_selected, reverse_complement, write_fasta, FastaError, FastaRecord};
use crate::io::paf::{PafError, PafParser};
use crate::types::Strand;

pub const DEFAULT_PRESET: &str = "asm10";
pub const DEFAULT_THREADS: usize = 4;
pub const DEFAULT_OUTPUT_DIR: &str = "resources";

#[derive(Debug, Error)]
pub enum AlignerError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Fasta(#[from] FastaError),
    #[error(transparent)]
    Paf(#[from] PafError),
    #[error("Sequence '{name}' not found in {}", .path.display())]
    SequenceNotFound { name: String, path: PathBuf },
    #[error("Aligner binary not found: {0}")]
    ToolNotFound(String),
    #[error("{tool} failed ({status}): {stderr}")]
    ToolFailed {
        tool: String,
        status: String,
        stderr: String,
    },
}

/// Everything needed to align one query sequence onto one target sequence.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlignmentRequest {
    pub target_fasta: PathBuf,
    pub query_fasta: PathBuf,
    pub target_seq: String,
    pub query_seq: String,
    /// minimap2 `-x` preset.
    pub preset: String,
    pub threads: usize,
    /// Explicit PAF path. A directory, or `None`, selects [`default_paf_path`].
    pub output: Option<PathBuf>,
    pub output_dir: PathBuf,
    pub reverse_query: bool,
    pub reuse_existing: bool,
    pub extra_args: Vec<String>,
    pub dry_run: bool,
}

impl AlignmentRequest {
    pub fn new(
        target_fasta: impl Into<PathBuf>,
        query_fasta: impl Into<PathBuf>,
        target_seq: impl Into<String>,
        query_seq: impl Into<String>,
    ) -> Self {
        Self {
            target_fasta: target_fasta.into(),
            query_fasta: query_fasta.into(),
            target_seq: target_seq.into(),
            query_seq: query_seq.into(),
            preset: DEFAULT_PRESET.to_string(),
            threads: DEFAULT_THREADS,
            output: None,
            output_dir: PathBuf::from(DEFAULT_OUTPUT_DIR),
            reverse_query: false,
            reuse_existing: true,
            extra_args: Vec::new(),
            dry_run: false,
        }
    }

    /// Where the PAF for this request lives.
    pub fn output_path(&self) -> PathBuf {
        match &self.output {
            Some(path) if !path.is_dir() => {
                let mut path = path.clone();
                if path.extension().map_or(true, |ext| ext != "paf") {
                    path.set_extension("paf");
                }
                path
            }
            Some(dir) => default_paf_path(self, dir),
            None => default_paf_path(self, &self.output_dir),
        }
    }
}

/// Replace anything outside `[A-Za-z0-9._-]` with `_`.
pub fn safe_part(name: &str) -> String {
    name.chars()
        .map(|c| if c.is_ascii_alphanumeric() || "._-".contains(c) { c } else { '_' })
        .collect()
}

fn file_stem(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// `<dir>/<qfile>.<qseq>[_rc]_vs_<tfile>.<tseq>/<same>.<preset>.paf`
///
/// File stems are part of the name so that identically named sequences from
/// different assemblies do not collide.
pub fn default_paf_path(request: &AlignmentRequest, dir: &Path) -> PathBuf {
    let mut query = safe_part(&request.query_seq);
    if request.reverse_query {
        query.push_str("_rc");
    }
    let preset = if request.preset.is_empty() {
        "default".to_string()
    } else {
        safe_part(&request.preset)
    };
    let name = format!(
        "{}.{}_vs_{}.{}",
        safe_part(&file_stem(&request.query_fasta)),
        query,
        safe_part(&file_stem(&request.target_fasta)),
        safe_part(&request.target_seq),
    );
    dir.join(&name).join(format!("{name}.{preset}.paf"))
}

/// Summary of a finished alignment run, computed from its PAF.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AlignmentRunStats {
    pub total_records: u64,
    pub total_aligned_bases: u64,
    pub mean_identity: f64,
    pub strand_forward_count: u64,
    pub strand_reverse_count: u64,
}

impl AlignmentRunStats {
    pub fn from_paf(path: &Path) -> Result<Self, PafError> {
        let records = PafParser::parse_file(path)?;
        let mut stats = AlignmentRunStats::default();
        let mut identity_sum = 0.0;
        let mut identity_n = 0u64;

        for record in &records {
            stats.total_records += 1;
            stats.total_aligned_bases += record.alignment_len;
            match record.strand {
                Strand::Forward => stats.strand_forward_count += 1,
                Strand::Reverse => stats.strand_reverse_count += 1,
            }
            if let Some(identity) = record.identity() {
                identity_sum += identity;
                identity_n += 1;
            }
        }
        if identity_n > 0 {
            stats.mean_identity = identity_sum / identity_n as f64;
        }
        Ok(stats)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlignmentRun {
    pub target_fasta: PathBuf,
    pub query_fasta: PathBuf,
    pub target_seq: String,
    pub query_seq: String,
    pub preset: String,
    pub output_path: PathBuf,
    /// Command line, empty when an existing PAF was reused.
    pub command: Vec<String>,
    pub skipped: bool,
    pub dry_run: bool,
    pub stats: Option<AlignmentRunStats>,
    pub runtime_seconds: f64,
}

impl AlignmentRun {
    fn for_request(request: &AlignmentRequest, output_path: PathBuf) -> Self {
        Self {
            target_fasta: request.target_fasta.clone(),
            query_fasta: request.query_fasta.clone(),
            target_seq: request.target_seq.clone(),
            query_seq: request.query_seq.clone(),
            preset: request.preset.clone(),
            output_path,
            command: Vec::new(),
            skipped: false,
            dry_run: request.dry_run,
            stats: None,
            runtime_seconds: 0.0,
        }
    }
}

pub trait Aligner {
    fn align(&self, request: &AlignmentRequest) -> Result<AlignmentRun, AlignerError>;
    fn name(&self) -> &'static str;
    fn version(&self) -> Option<String>;
}

pub struct Minimap2Aligner {
    binary: PathBuf,
}

impl Default for Minimap2Aligner {
    fn default() -> Self {
        Self::new(None)
    }
}

impl Minimap2Aligner {
    /// `binary` may be a bare name looked up on `PATH` or a full path.
    pub fn new(binary: Option<PathBuf>) -> Self {
        Self {
            binary: binary.unwrap_or_else(|| PathBuf::from("minimap2")),
        }
    }

    pub fn binary(&self) -> &Path {
        &self.binary
    }

    fn resolve_binary(&self) -> Result<PathBuf, AlignerError> {
        which::which(&self.binary)
            .map_err(|_| AlignerError::ToolNotFound(self.binary.display().to_string()))
    }

    /// minimap2 arguments, with `-c` so that the PAF carries `cg` tags.
    pub fn build_args(request: &AlignmentRequest, target_fa: &Path, query_fa: &Path, output: &Path) -> Vec<String> {
        let mut args = vec![
            "-c".to_string(),
            "-x".to_string(),
            request.preset.clone(),
            "-t".to_string(),
            request.threads.max(1).to_string(),
        ];
        args.extend(request.extra_args.iter().cloned());
        args.push("-o".to_string());
        args.push(output.display().to_string());
        args.push(target_fa.display().to_string());
        args.push(query_fa.display().to_string());
        args
    }
}

/// Scratch file name for one side of an alignment.
///
/// The role prefix keeps a target and query that share a sequence name apart.
fn work_file_name(role: &str, name: &str) -> String {
    format!("{}.{}.fa", role, safe_part(name))
}

/// Write one sequence from `fasta` into `dir`, reverse-complemented if asked.
fn materialize_sequence(
    fasta: &Path,
    name: &str,
    role: &str,
    dir: &Path,
    reverse: bool,
) -> Result<PathBuf, AlignerError> {
    let record = read_fasta_selected(fasta, &[name])?
        .into_iter()
        .next()
        .ok_or_else(|| AlignerError::SequenceNotFound {
            name: name.to_string(),
            path: fasta.to_path_buf(),
        })?;
    let record = if reverse {
        FastaRecord::new(record.name, reverse_complement(&record.sequence))
    } else {
        record
    };
    let path = dir.join(work_file_name(role, name));
    write_fasta(&path, &[record])?;
    Ok(path)
}

impl Aligner for Minimap2Aligner {
    fn align(&self, request: &AlignmentRequest) -> Result<AlignmentRun, AlignerError> {
        let output = request.output_path();
        let mut run = AlignmentRun::for_request(request, output.clone());

        if request.reuse_existing && output.exists() {
            log::info!("Reusing existing alignment {}", output.display());
            run.skipped = true;
            run.stats = Some(AlignmentRunStats::from_paf(&output)?);
            return Ok(run);
        }

        if request.dry_run {
            let target_fa = PathBuf::from(work_file_name("target", &request.target_seq));
            let query_fa = PathBuf::from(work_file_name("query", &request.query_seq));
            run.command = std::iter::once(self.binary.display().to_string())
                .chain(Self::build_args(request, &target_fa, &query_fa, &output))
                .collect();
            return Ok(run);
        }

        let binary = self.resolve_binary()?;
        let parent = output.parent().unwrap_or_else(|| Path::new("."));
        std::fs::create_dir_all(parent)?;

        let work_dir = tempfile::Builder::new()
            .prefix("gapneedle_")
            .tempdir_in(parent)?;
        let target_fa = materialize_sequence(
            &request.target_fasta,
            &request.target_seq,
            "target",
            work_dir.path(),
            false,
        )?;
        let query_fa = materialize_sequence(
            &request.query_fasta,
            &request.query_seq,
            "query",
            work_dir.path(),
            request.reverse_query,
        )?;

        let args = Self::build_args(request, &target_fa, &query_fa, &output);
        run.command = std::iter::once(binary.display().to_string())
            .chain(args.iter().cloned())
            .collect();

        log::info!("Running {}: {}", self.name(), run.command.join(" "));
        let start_time = Instant::now();
        let result = Command::new(&binary).args(&args).output()?;
        run.runtime_seconds = start_time.elapsed().as_secs_f64();

        if !result.status.success() {
            return Err(AlignerError::ToolFailed {
                tool: self.name().to_string(),
                status: result.status.to_string(),
                stderr: String::from_utf8_lossy(&result.stderr).trim().to_string(),
            });
        }

        run.stats = Some(AlignmentRunStats::from_paf(&output)?);
        log::info!(
            "Wrote {} in {:.1}s",
            output.display(),
            run.runtime_seconds
        );
        Ok(run)
    }

    fn name(&self) -> &'static str {
        "minimap2"
    }

    fn version(&self) -> Option<String> {
        let output = Command::new(&self.binary).arg("--version").output().ok()?;
        if !output.status.success() {
            return None;
        }
        Some(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }
}
