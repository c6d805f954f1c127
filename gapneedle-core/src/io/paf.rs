//! PAF (Pairwise mApping Format) parser
//!
//! PAF is the tab-separated output of minimap2: twelve mandatory columns
//! followed by optional `XX:T:value` tags. GapNeedle always works on one
//! (query, target) sequence pair at a time, so records are filtered while
//! reading and only matching lines are parsed in full.

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader, Read};
use std::path::Path;

use flate2::read::GzDecoder;
use serde::Serialize;
use thiserror::Error;

use crate::types::{GenomicInterval, GenomicPos, Strand};

/// Number of mandatory PAF columns.
pub const PAF_MANDATORY_FIELDS: usize = 12;

#[derive(Debug, Error)]
pub enum PafError {
    #[error("Invalid PAF line: insufficient fields (expected at least 12, got {0})")]
    InsufficientFields(usize),
    #[error("Invalid {field} value: '{value}'")]
    InvalidNumber { field: &'static str, value: String },
    #[error("Invalid strand: {0}")]
    InvalidStrand(String),
    #[error("Inconsistent {0} interval: start <= end <= length does not hold")]
    InvalidInterval(&'static str),
    #[error("Error parsing line {line}: {source}")]
    Line {
        line: usize,
        #[source]
        source: Box<PafError>,
    },
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// One PAF line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AlignmentRecord {
    pub query_name: String,
    pub query_len: GenomicPos,
    pub query_start: GenomicPos,
    pub query_end: GenomicPos,
    pub strand: Strand,
    pub target_name: String,
    pub target_len: GenomicPos,
    pub target_start: GenomicPos,
    pub target_end: GenomicPos,
    pub residue_matches: u64,
    pub alignment_len: u64,
    pub mapping_quality: u8,
    /// Columns 13 onwards, verbatim.
    pub extra_fields: Vec<String>,
    #[serde(skip)]
    tag_index: HashMap<String, usize>,
}

impl AlignmentRecord {
    /// Raw value of the optional tag with this two-letter code.
    ///
    /// For `cg:Z:30M` the value is `30M`. When a code repeats, the first one wins.
    pub fn tag(&self, code: &str) -> Option<&str> {
        let idx = *self.tag_index.get(code)?;
        split_tag(&self.extra_fields[idx]).map(|(_, value)| value)
    }

    /// The run-length operation list from the `cg` tag.
    pub fn cigar(&self) -> Option<&str> {
        self.tag("cg")
    }

    pub fn query_span(&self) -> GenomicPos {
        self.query_end - self.query_start
    }

    pub fn target_span(&self) -> GenomicPos {
        self.target_end - self.target_start
    }

    /// Smaller of the two covered spans, used to rank candidate overlaps.
    pub fn overlap_size(&self) -> GenomicPos {
        self.query_span().min(self.target_span())
    }

    pub fn query_interval(&self) -> GenomicInterval {
        GenomicInterval::new(self.query_name.clone(), self.query_start, self.query_end)
    }

    pub fn target_interval(&self) -> GenomicInterval {
        GenomicInterval::new(self.target_name.clone(), self.target_start, self.target_end)
    }

    /// Whether the query intervals of two records share at least one base.
    pub fn query_overlaps(&self, other: &AlignmentRecord) -> bool {
        self.query_start < other.query_end && self.query_end > other.query_start
    }

    /// Identity of the alignment over its block, when the block is non-empty.
    pub fn identity(&self) -> Option<f64> {
        if self.alignment_len == 0 {
            None
        } else {
            Some(self.residue_matches as f64 / self.alignment_len as f64)
        }
    }
}

/// Split `XX:T:value` into its code and value.
fn split_tag(field: &str) -> Option<(&str, &str)> {
    let mut parts = field.splitn(3, ':');
    let code = parts.next()?;
    let _type = parts.next()?;
    let value = parts.next()?;
    Some((code, value))
}

fn parse_number(value: &str, field: &'static str) -> Result<u64, PafError> {
    value.trim().parse::<u64>().map_err(|_| PafError::InvalidNumber {
        field,
        value: value.to_string(),
    })
}

/// PAF parser for reading alignment records
pub struct PafParser;

impl PafParser {
    /// Parse a single PAF line into an [`AlignmentRecord`].
    pub fn parse_line(line: &str) -> Result<AlignmentRecord, PafError> {
        let fields: Vec<&str> = line.split('\t').collect();
        if fields.len() < PAF_MANDATORY_FIELDS {
            return Err(PafError::InsufficientFields(fields.len()));
        }
        Self::parse_fields(&fields)
    }

    fn parse_fields(fields: &[&str]) -> Result<AlignmentRecord, PafError> {
        let strand = fields[4]
            .parse::<Strand>()
            .map_err(|e| PafError::InvalidStrand(e.0))?;

        let mapping_quality = fields[11]
            .trim()
            .parse::<u8>()
            .map_err(|_| PafError::InvalidNumber {
                field: "mapping quality",
                value: fields[11].to_string(),
            })?;

        let extra_fields: Vec<String> = fields[PAF_MANDATORY_FIELDS..]
            .iter()
            .map(|f| f.trim_end_matches('\r').to_string())
            .collect();

        let mut tag_index = HashMap::new();
        for (idx, field) in extra_fields.iter().enumerate() {
            if let Some((code, _)) = split_tag(field) {
                tag_index.entry(code.to_string()).or_insert(idx);
            }
        }

        let record = AlignmentRecord {
            query_name: fields[0].to_string(),
            query_len: parse_number(fields[1], "query length")?,
            query_start: parse_number(fields[2], "query start")?,
            query_end: parse_number(fields[3], "query end")?,
            strand,
            target_name: fields[5].to_string(),
            target_len: parse_number(fields[6], "target length")?,
            target_start: parse_number(fields[7], "target start")?,
            target_end: parse_number(fields[8], "target end")?,
            residue_matches: parse_number(fields[9], "residue matches")?,
            alignment_len: parse_number(fields[10], "alignment block length")?,
            mapping_quality,
            extra_fields,
            tag_index,
        };

        if record.query_start > record.query_end || record.query_end > record.query_len {
            return Err(PafError::InvalidInterval("query"));
        }
        if record.target_start > record.target_end || record.target_end > record.target_len {
            return Err(PafError::InvalidInterval("target"));
        }
        Ok(record)
    }

    /// Open a PAF file, decompressing `.gz` transparently.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Box<dyn BufRead>, PafError> {
        let file = File::open(&path)?;
        let path_str = path.as_ref().to_string_lossy();
        let reader: Box<dyn Read> = if path_str.ends_with(".gz") {
            Box::new(GzDecoder::new(file))
        } else {
            Box::new(file)
        };
        Ok(Box::new(BufReader::new(reader)))
    }

    /// Parse records from any reader, keeping those whose query and target
    /// names match the given filters. `None` accepts any name.
    pub fn parse_reader<R: BufRead>(
        reader: R,
        target: Option<&str>,
        query: Option<&str>,
    ) -> Result<Vec<AlignmentRecord>, PafError> {
        let mut records = Vec::new();
        let mut skipped = 0usize;

        for (line_num, line) in reader.lines().enumerate() {
            let line = line?;
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            let fields: Vec<&str> = line.split('\t').collect();
            if fields.len() < PAF_MANDATORY_FIELDS {
                log::debug!(
                    "Skipping PAF line {}: {} fields",
                    line_num + 1,
                    fields.len()
                );
                skipped += 1;
                continue;
            }
            if query.is_some_and(|q| fields[0] != q) || target.is_some_and(|t| fields[5] != t) {
                continue;
            }

            let record = Self::parse_fields(&fields).map_err(|e| PafError::Line {
                line: line_num + 1,
                source: Box::new(e),
            })?;
            records.push(record);
        }

        if skipped > 0 {
            log::debug!("Skipped {} malformed PAF lines", skipped);
        }
        Ok(records)
    }

    /// Parse every record in a file, unfiltered.
    pub fn parse_file<P: AsRef<Path>>(path: P) -> Result<Vec<AlignmentRecord>, PafError> {
        Self::parse_reader(Self::open(path)?, None, None)
    }
}

/// Records aligning `query` onto `target`, in file order.
pub fn parse_alignment_records<P: AsRef<Path>>(
    path: P,
    target: &str,
    query: &str,
) -> Result<Vec<AlignmentRecord>, PafError> {
    let reader = PafParser::open(&path)?;
    let records = PafParser::parse_reader(reader, Some(target), Some(query))?;
    log::debug!(
        "{} records for {} vs {} in {}",
        records.len(),
        query,
        target,
        path.as_ref().display()
    );
    Ok(records)
}

/// Sort records by decreasing [`AlignmentRecord::overlap_size`] and keep at
/// most `limit` of them. Ties keep file order. `None` or `Some(0)` keeps all.
pub fn rank_overlaps(mut records: Vec<AlignmentRecord>, limit: Option<usize>) -> Vec<AlignmentRecord> {
    records.sort_by(|a, b| b.overlap_size().cmp(&a.overlap_size()));
    if let Some(limit) = limit.filter(|&l| l > 0) {
        records.truncate(limit);
    }
    records
}

/// Best candidate overlaps between `query` and `target`.
pub fn suggest_overlaps<P: AsRef<Path>>(
    path: P,
    target: &str,
    query: &str,
    limit: Option<usize>,
) -> Result<Vec<AlignmentRecord>, PafError> {
    let records = parse_alignment_records(path, target, query)?;
    Ok(rank_overlaps(records, limit))
}

/// Flag every record whose query interval intersects another record's.
pub fn mark_overlaps(records: &[AlignmentRecord]) -> Vec<bool> {
    records
        .iter()
        .enumerate()
        .map(|(i, a)| {
            records
                .iter()
                .enumerate()
                .any(|(j, b)| i != j && a.query_overlaps(b))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Cursor, Write};
    use tempfile::NamedTempFile;

    fn line(q: &str, qs: u64, qe: u64, t: &str, ts: u64, te: u64) -> String {
        format!("{q}\t1000\t{qs}\t{qe}\t+\t{t}\t2000\t{ts}\t{te}\t10\t20\t60")
    }

    #[test]
    fn test_parse_basic_paf_line() {
        let line = "query1\t1000\t100\t900\t+\ttarget1\t2000\t500\t1300\t750\t800\t60\tAS:i:750\tcg:Z:800M";
        let record = PafParser::parse_line(line).unwrap();

        assert_eq!(record.query_name, "query1");
        assert_eq!(record.query_len, 1000);
        assert_eq!(record.query_start, 100);
        assert_eq!(record.query_end, 900);
        assert_eq!(record.strand, Strand::Forward);
        assert_eq!(record.target_name, "target1");
        assert_eq!(record.target_len, 2000);
        assert_eq!(record.target_start, 500);
        assert_eq!(record.target_end, 1300);
        assert_eq!(record.residue_matches, 750);
        assert_eq!(record.alignment_len, 800);
        assert_eq!(record.mapping_quality, 60);
        assert_eq!(record.extra_fields, vec!["AS:i:750", "cg:Z:800M"]);
        assert_eq!(record.tag("AS"), Some("750"));
        assert_eq!(record.cigar(), Some("800M"));
        assert_eq!(record.tag("NM"), None);
    }

    #[test]
    fn test_first_repeated_tag_wins() {
        let line = "q\t100\t0\t10\t-\tt\t100\t0\t10\t10\t10\t255\tcg:Z:10M\tcg:Z:5M5I\tbad";
        let record = PafParser::parse_line(line).unwrap();
        assert_eq!(record.strand, Strand::Reverse);
        assert_eq!(record.mapping_quality, 255);
        assert_eq!(record.cigar(), Some("10M"));
        assert_eq!(record.extra_fields.len(), 3);
    }

    #[test]
    fn test_parse_invalid_fields() {
        let short = "query1\t1000\t100\t900\t+\ttarget1\t2000\t500";
        assert!(matches!(PafParser::parse_line(short), Err(PafError::InsufficientFields(8))));

        let strand = "q\t1000\t100\t900\tx\tt\t2000\t500\t1300\t750\t800\t60";
        assert!(matches!(PafParser::parse_line(strand), Err(PafError::InvalidStrand(_))));

        let number = "q\t1000\tabc\t900\t+\tt\t2000\t500\t1300\t750\t800\t60";
        assert!(matches!(PafParser::parse_line(number), Err(PafError::InvalidNumber { .. })));

        let interval = "q\t1000\t900\t100\t+\tt\t2000\t500\t1300\t750\t800\t60";
        assert!(matches!(PafParser::parse_line(interval), Err(PafError::InvalidInterval("query"))));
    }

    #[test]
    fn test_filter_keeps_requested_pair_in_file_order() {
        let data = [
            line("q1", 0, 10, "t1", 0, 10),
            line("q2", 0, 10, "t1", 0, 10),
            line("q1", 20, 30, "t2", 0, 10),
            line("q1", 40, 50, "t1", 40, 50),
        ]
        .join("\n");
        let records = PafParser::parse_reader(Cursor::new(data), Some("t1"), Some("q1")).unwrap();
        let starts: Vec<u64> = records.iter().map(|r| r.query_start).collect();
        assert_eq!(starts, vec![0, 40]);
    }

    #[test]
    fn test_malformed_lines_are_skipped() {
        let data = format!(
            "a\tb\tc\td\te\tf\tg\th\n{}\tNM:i:0\n",
            line("q", 0, 10, "t", 0, 10)
        );
        let records = PafParser::parse_reader(Cursor::new(data), Some("t"), Some("q")).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].extra_fields, vec!["NM:i:0"]);
    }

    #[test]
    fn test_bad_number_on_unmatched_line_is_ignored() {
        let data = format!(
            "other\t1000\tabc\t900\t+\tt\t2000\t500\t1300\t750\t800\t60\n{}\n",
            line("q", 0, 10, "t", 0, 10)
        );
        let records = PafParser::parse_reader(Cursor::new(data.clone()), Some("t"), Some("q")).unwrap();
        assert_eq!(records.len(), 1);

        let err = PafParser::parse_reader(Cursor::new(data), None, None).unwrap_err();
        assert!(matches!(err, PafError::Line { line: 1, .. }));
    }

    #[test]
    fn test_skip_comments_and_empty_lines() {
        let data = format!("# comment\n\n{}\n\n", line("q", 0, 10, "t", 0, 10));
        let records = PafParser::parse_reader(Cursor::new(data), None, None).unwrap();
        assert_eq!(records.len(), 1);
    }

    #[test]
    fn test_mark_overlaps_half_open() {
        let parse = |qs, qe| PafParser::parse_line(&line("q", qs, qe, "t", 0, 10)).unwrap();

        let flags = mark_overlaps(&[parse(0, 100), parse(50, 150)]);
        assert_eq!(flags, vec![true, true]);

        let flags = mark_overlaps(&[parse(0, 50), parse(50, 100)]);
        assert_eq!(flags, vec![false, false]);

        let flags = mark_overlaps(&[parse(0, 10), parse(200, 300), parse(5, 20)]);
        assert_eq!(flags, vec![true, false, true]);
    }

    #[test]
    fn test_rank_overlaps_sorts_by_smaller_span() {
        let records: Vec<AlignmentRecord> = [
            line("q", 0, 100, "t", 0, 10),   // min 10
            line("q", 0, 50, "t", 0, 60),    // min 50
            line("q", 0, 30, "t", 0, 30),    // min 30
            line("q", 100, 150, "t", 0, 90), // min 50, after the first 50
        ]
        .iter()
        .map(|l| PafParser::parse_line(l).unwrap())
        .collect();

        let ranked = rank_overlaps(records.clone(), None);
        let sizes: Vec<(u64, u64)> = ranked.iter().map(|r| (r.overlap_size(), r.query_start)).collect();
        assert_eq!(sizes, vec![(50, 0), (50, 100), (30, 0), (10, 0)]);

        assert_eq!(rank_overlaps(records.clone(), Some(2)).len(), 2);
        assert_eq!(rank_overlaps(records, Some(0)).len(), 4);
    }

    #[test]
    fn test_suggest_overlaps_from_gzip_file() {
        use flate2::write::GzEncoder;
        use flate2::Compression;

        let file = tempfile::Builder::new().suffix(".paf.gz").tempfile().unwrap();
        let mut encoder = GzEncoder::new(File::create(file.path()).unwrap(), Compression::default());
        writeln!(encoder, "{}", line("q", 0, 10, "t", 0, 10)).unwrap();
        writeln!(encoder, "{}", line("q", 0, 500, "t", 0, 400)).unwrap();
        writeln!(encoder, "{}", line("x", 0, 900, "t", 0, 900)).unwrap();
        encoder.finish().unwrap();

        let best = suggest_overlaps(file.path(), "t", "q", Some(1)).unwrap();
        assert_eq!(best.len(), 1);
        assert_eq!(best[0].overlap_size(), 400);
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let err = parse_alignment_records("/no/such/file.paf", "t", "q").unwrap_err();
        assert!(matches!(err, PafError::Io(_)));
    }

    #[test]
    fn test_parse_file_plain() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "{}", line("q", 0, 10, "t", 0, 10)).unwrap();
        writeln!(file, "{}", line("q2", 0, 10, "t", 0, 10)).unwrap();
        assert_eq!(PafParser::parse_file(file.path()).unwrap().len(), 2);
    }
}
