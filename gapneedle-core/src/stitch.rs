//! Stitching sequence pieces into one merged record
//!
//! A stitch is an ordered list of [`Segment`]s, each a half-open slice of a
//! named sequence from one of several FASTA sources, optionally taken from the
//! reverse complement. Pieces are concatenated into a single FASTA record and
//! every junction is summarised so the user can check it by eye. A JSON
//! session log is written next to the output for provenance.

use std::collections::BTreeMap;
use std::fmt;
use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::cache::FastaCache;
use crate::io::faidx::FaidxError;
use crate::io::fasta::{reverse_complement, write_fasta, FastaError, FastaRecord};
use crate::io::paf::AlignmentRecord;
use crate::types::GenomicPos;

pub const TARGET_SOURCE: &str = "t";
pub const QUERY_SOURCE: &str = "q";
pub const DEFAULT_OUTPUT_NAME: &str = "stitched";
pub const DEFAULT_CONTEXT_BP: usize = 200;
/// Bases compared on each side of a junction.
pub const FLANK_COMPARE_BP: usize = 50;

#[derive(Debug, Error)]
pub enum StitchError {
    #[error("Stitch request has no segments")]
    NoSegments,
    #[error("Output FASTA path is required")]
    MissingOutput,
    #[error("Unknown segment source: {0}")]
    UnknownSource(String),
    #[error("Sequence not found: {name} from source {source_key}")]
    SequenceNotFound { source_key: String, name: String },
    #[error("Invalid segment range for {name}: [{start}, {end}) on a sequence of length {len}")]
    InvalidRange {
        name: String,
        start: GenomicPos,
        end: GenomicPos,
        len: GenomicPos,
    },
    #[error("Invalid segment '{0}': expected source:name:start:end[:rc]")]
    InvalidSegment(String),
    #[error(transparent)]
    Faidx(#[from] FaidxError),
    #[error(transparent)]
    Fasta(#[from] FastaError),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to write session log: {0}")]
    Json(#[from] serde_json::Error),
}

/// One slice of a source sequence.
///
/// For a reversed segment, `start` and `end` are coordinates on the reverse
/// complement of the sequence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Segment {
    pub source: String,
    #[serde(rename = "name")]
    pub seq_name: String,
    pub start: GenomicPos,
    pub end: GenomicPos,
    pub reverse: bool,
}

impl Segment {
    pub fn new(source: impl Into<String>, seq_name: impl Into<String>, start: GenomicPos, end: GenomicPos) -> Self {
        Self {
            source: source.into(),
            seq_name: seq_name.into(),
            start,
            end,
            reverse: false,
        }
    }

    pub fn reversed(mut self, reverse: bool) -> Self {
        self.reverse = reverse;
        self
    }

    pub fn len(&self) -> GenomicPos {
        self.end.saturating_sub(self.start)
    }

    pub fn is_empty(&self) -> bool {
        self.end <= self.start
    }
}

/// `source:name:start:end[:rc]`. Sequence names may themselves contain `:`.
impl FromStr for Segment {
    type Err = StitchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || StitchError::InvalidSegment(s.to_string());
        let mut parts: Vec<&str> = s.split(':').collect();

        let reverse = parts.last() == Some(&"rc");
        if reverse {
            parts.pop();
        }
        if parts.len() < 4 {
            return Err(invalid());
        }

        let end = parts.pop().ok_or_else(invalid)?.parse::<GenomicPos>().map_err(|_| invalid())?;
        let start = parts.pop().ok_or_else(invalid)?.parse::<GenomicPos>().map_err(|_| invalid())?;
        let source = parts[0];
        let name = parts[1..].join(":");
        if source.is_empty() || name.is_empty() {
            return Err(invalid());
        }
        Ok(Segment::new(source, name, start, end).reversed(reverse))
    }
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}:{}", self.source, self.seq_name, self.start, self.end)?;
        if self.reverse {
            write!(f, ":rc")?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StitchRequest {
    pub target_fasta: PathBuf,
    pub query_fasta: PathBuf,
    /// Further FASTA files addressable by segment source key.
    pub extra_sources: BTreeMap<String, PathBuf>,
    pub segments: Vec<Segment>,
    pub output_fasta: PathBuf,
    pub output_seq_name: String,
    pub context_bp: usize,
}

impl StitchRequest {
    pub fn new(
        target_fasta: impl Into<PathBuf>,
        query_fasta: impl Into<PathBuf>,
        output_fasta: impl Into<PathBuf>,
    ) -> Self {
        Self {
            target_fasta: target_fasta.into(),
            query_fasta: query_fasta.into(),
            extra_sources: BTreeMap::new(),
            segments: Vec::new(),
            output_fasta: output_fasta.into(),
            output_seq_name: DEFAULT_OUTPUT_NAME.to_string(),
            context_bp: DEFAULT_CONTEXT_BP,
        }
    }

    fn source_path(&self, source: &str) -> Option<&Path> {
        match source {
            TARGET_SOURCE => Some(self.target_fasta.as_path()),
            QUERY_SOURCE => Some(self.query_fasta.as_path()),
            other => self.extra_sources.get(other).map(PathBuf::as_path),
        }
    }

    fn output_name(&self) -> &str {
        if self.output_seq_name.is_empty() {
            DEFAULT_OUTPUT_NAME
        } else {
            &self.output_seq_name
        }
    }
}

/// Junction between piece `index` and piece `index + 1`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BreakpointSummary {
    pub index: usize,
    /// The last [`FLANK_COMPARE_BP`] bases of both pieces agree.
    pub left_flank_match: bool,
    /// The first [`FLANK_COMPARE_BP`] bases of both pieces agree.
    pub right_flank_match: bool,
    /// `left_tail|right_head`
    pub preview: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StitchResult {
    pub output_fasta: PathBuf,
    pub session_log: PathBuf,
    pub output_name: String,
    pub merged_length: u64,
    pub breakpoints: Vec<BreakpointSummary>,
}

#[derive(Debug, Serialize)]
struct SessionLog<'a> {
    output_fasta: &'a Path,
    output_name: &'a str,
    merged_length: u64,
    context_bp: usize,
    segments: &'a [Segment],
    breakpoints: &'a [BreakpointSummary],
    created_at: DateTime<Utc>,
}

/// `<output>.session.json`
pub fn session_log_path(output: &Path) -> PathBuf {
    let mut s = output.as_os_str().to_owned();
    s.push(".session.json");
    PathBuf::from(s)
}

fn suffix_match(a: &str, b: &str, n: usize) -> bool {
    if a.is_empty() || b.is_empty() || n == 0 {
        return false;
    }
    let n = n.min(a.len()).min(b.len());
    a[a.len() - n..] == b[b.len() - n..]
}

fn prefix_match(a: &str, b: &str, n: usize) -> bool {
    if a.is_empty() || b.is_empty() || n == 0 {
        return false;
    }
    let n = n.min(a.len()).min(b.len());
    a[..n] == b[..n]
}

/// Last `context` bases of `left`, a bar, then the first `context` of `right`.
pub fn junction_preview(left: &str, right: &str, context: usize) -> String {
    let tail = &left[left.len().saturating_sub(context)..];
    let head = &right[..context.min(right.len())];
    format!("{tail}|{head}")
}

pub fn summarize_breakpoints(pieces: &[String], context: usize) -> Vec<BreakpointSummary> {
    pieces
        .windows(2)
        .enumerate()
        .map(|(index, pair)| BreakpointSummary {
            index,
            left_flank_match: suffix_match(&pair[0], &pair[1], FLANK_COMPARE_BP),
            right_flank_match: prefix_match(&pair[0], &pair[1], FLANK_COMPARE_BP),
            preview: junction_preview(&pair[0], &pair[1], context),
        })
        .collect()
}

fn fetch_segment(request: &StitchRequest, segment: &Segment, cache: &mut FastaCache) -> Result<String, StitchError> {
    let path = request
        .source_path(&segment.source)
        .ok_or_else(|| StitchError::UnknownSource(segment.source.clone()))?;
    let store = cache.open(path)?;
    let len = store
        .length(&segment.seq_name)
        .ok_or_else(|| StitchError::SequenceNotFound {
            source_key: segment.source.clone(),
            name: segment.seq_name.clone(),
        })?;

    if segment.start >= segment.end || segment.end > len {
        return Err(StitchError::InvalidRange {
            name: segment.seq_name.clone(),
            start: segment.start,
            end: segment.end,
            len,
        });
    }

    if segment.reverse {
        let forward = store.fetch(&segment.seq_name, len - segment.end, len - segment.start)?;
        Ok(reverse_complement(&forward))
    } else {
        Ok(store.fetch(&segment.seq_name, segment.start, segment.end)?)
    }
}

/// Concatenate the request's segments and write the merged FASTA and session log.
pub fn stitch(request: &StitchRequest, cache: &mut FastaCache) -> Result<StitchResult, StitchError> {
    if request.segments.is_empty() {
        return Err(StitchError::NoSegments);
    }
    if request.output_fasta.as_os_str().is_empty() {
        return Err(StitchError::MissingOutput);
    }

    let pieces = request
        .segments
        .iter()
        .map(|segment| fetch_segment(request, segment, cache))
        .collect::<Result<Vec<String>, StitchError>>()?;

    let merged: String = pieces.concat();
    let output_name = request.output_name().to_string();
    if let Some(parent) = request.output_fasta.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    write_fasta(&request.output_fasta, &[FastaRecord::new(output_name.clone(), merged.clone())])?;

    let breakpoints = summarize_breakpoints(&pieces, request.context_bp);
    let session_log = session_log_path(&request.output_fasta);
    let log_entry = SessionLog {
        output_fasta: &request.output_fasta,
        output_name: &output_name,
        merged_length: merged.len() as u64,
        context_bp: request.context_bp,
        segments: &request.segments,
        breakpoints: &breakpoints,
        created_at: Utc::now(),
    };
    serde_json::to_writer_pretty(BufWriter::new(File::create(&session_log)?), &log_entry)?;

    log::info!(
        "Stitched {} segments into {} ({} bp)",
        request.segments.len(),
        request.output_fasta.display(),
        merged.len()
    );

    Ok(StitchResult {
        output_fasta: request.output_fasta.clone(),
        session_log,
        output_name,
        merged_length: merged.len() as u64,
        breakpoints,
    })
}

/// Which sequence supplies one part of an automatic stitch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FlankChoice {
    Target,
    Query,
    /// Whichever sequence has more bases on that side; target on a tie.
    Longer,
}

impl FromStr for FlankChoice {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "t" | "target" => Ok(FlankChoice::Target),
            "q" | "query" => Ok(FlankChoice::Query),
            "longer" | "auto" => Ok(FlankChoice::Longer),
            other => Err(format!("unknown flank choice '{other}', expected target, query or longer")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanChoices {
    pub left: FlankChoice,
    pub overlap: FlankChoice,
    pub right: FlankChoice,
}

impl Default for PlanChoices {
    fn default() -> Self {
        Self {
            left: FlankChoice::Longer,
            overlap: FlankChoice::Target,
            right: FlankChoice::Longer,
        }
    }
}

/// Segments joining target and query across one alignment.
///
/// The query is taken in the alignment's orientation, so on a `-` record all
/// query segments are reverse-complemented.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StitchPlan {
    pub output_seq_name: String,
    pub segments: Vec<Segment>,
}

impl StitchPlan {
    pub fn from_alignment(
        record: &AlignmentRecord,
        target_len: GenomicPos,
        query_len: GenomicPos,
        choices: PlanChoices,
    ) -> Self {
        let reverse = record.strand.is_reverse();
        let (q_start, q_end) = if reverse {
            (
                query_len.saturating_sub(record.query_end),
                query_len.saturating_sub(record.query_start),
            )
        } else {
            (record.query_start, record.query_end)
        };
        let (t_start, t_end) = (record.target_start, record.target_end);

        let target = |start, end| Segment::new(TARGET_SOURCE, record.target_name.clone(), start, end);
        let query = |start, end| Segment::new(QUERY_SOURCE, record.query_name.clone(), start, end).reversed(reverse);

        let pick = |choice: FlankChoice, t: Segment, q: Segment| match choice {
            FlankChoice::Target => t,
            FlankChoice::Query => q,
            FlankChoice::Longer => {
                if q.len() > t.len() {
                    q
                } else {
                    t
                }
            }
        };

        let parts = [
            pick(choices.left, target(0, t_start), query(0, q_start)),
            pick(choices.overlap, target(t_start, t_end), query(q_start, q_end)),
            pick(choices.right, target(t_end, target_len), query(q_end, query_len)),
        ];

        Self {
            output_seq_name: format!("{}+{}", record.target_name, record.query_name),
            segments: parts.into_iter().filter(|s| !s.is_empty()).collect(),
        }
    }

    pub fn into_request(
        self,
        target_fasta: impl Into<PathBuf>,
        query_fasta: impl Into<PathBuf>,
        output_fasta: impl Into<PathBuf>,
    ) -> StitchRequest {
        let mut request = StitchRequest::new(target_fasta, query_fasta, output_fasta);
        request.segments = self.segments;
        request.output_seq_name = self.output_seq_name;
        request
    }
}
