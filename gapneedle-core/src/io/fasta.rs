//! Whole-file FASTA reading and writing
//!
//! Used by the stitch and gap-scanning layers when every base of a file is
//! needed. Random access into large files goes through [`super::faidx`].

use std::collections::HashSet;
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;
use thiserror::Error;

use needletail::{parse_fastx_file, parse_fastx_reader};
use serde::{Deserialize, Serialize};

/// Bases per line when writing FASTA output.
pub const FASTA_LINE_WIDTH: usize = 80;

#[derive(Debug, Error)]
pub enum FastaError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Parse error: {0}")]
    Parse(String),
    #[error("Empty file or no sequences found")]
    EmptyFile,
    #[error("Sequence not found: {0}")]
    SequenceNotFound(String),
}

/// One named sequence, upper-cased, with the header reduced to its first token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FastaRecord {
    pub name: String,
    pub sequence: String,
}

impl FastaRecord {
    pub fn new(name: impl Into<String>, sequence: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            sequence: sequence.into(),
        }
    }

    pub fn len(&self) -> usize {
        self.sequence.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sequence.is_empty()
    }
}

/// First whitespace-delimited token of a header line (without the `>`).
pub fn normalize_name(header: &str) -> &str {
    header.split_whitespace().next().unwrap_or("")
}

/// Read every record of a FASTA (optionally gzipped) file in file order.
pub fn read_fasta<P: AsRef<Path>>(path: P) -> Result<Vec<FastaRecord>, FastaError> {
    let path = path.as_ref();
    check_readable(path)?;
    let mut reader = parse_fastx_file(path).map_err(|e| FastaError::Parse(e.to_string()))?;
    collect_records(&mut *reader, |_| true)
}

/// Parse FASTA data from any readable source.
pub fn read_fasta_from_reader<R: std::io::Read + Send>(reader: R) -> Result<Vec<FastaRecord>, FastaError> {
    let mut reader = parse_fastx_reader(reader).map_err(|e| FastaError::Parse(e.to_string()))?;
    collect_records(&mut *reader, |_| true)
}

/// Read only the named records, preserving file order.
pub fn read_fasta_selected<P: AsRef<Path>>(path: P, names: &[&str]) -> Result<Vec<FastaRecord>, FastaError> {
    if names.is_empty() {
        return Ok(Vec::new());
    }
    let wanted: HashSet<&str> = names.iter().copied().collect();
    let path = path.as_ref();
    check_readable(path)?;
    let mut reader = parse_fastx_file(path).map_err(|e| FastaError::Parse(e.to_string()))?;
    let records = collect_records(&mut *reader, |name| wanted.contains(name))?;
    Ok(records)
}

/// Plain IO and empty-file errors, before needletail wraps them.
fn check_readable(path: &Path) -> Result<(), FastaError> {
    if File::open(path)?.metadata()?.len() == 0 {
        return Err(FastaError::EmptyFile);
    }
    Ok(())
}

fn collect_records<F>(
    reader: &mut dyn needletail::FastxReader,
    mut keep: F,
) -> Result<Vec<FastaRecord>, FastaError>
where
    F: FnMut(&str) -> bool,
{
    let mut records = Vec::new();
    let mut seen = 0usize;

    while let Some(record) = reader.next() {
        let record = record.map_err(|e| FastaError::Parse(e.to_string()))?;
        seen += 1;
        let header = String::from_utf8_lossy(record.id());
        let name = normalize_name(&header);
        if name.is_empty() || !keep(name) {
            continue;
        }
        let sequence: String = record
            .seq()
            .iter()
            .filter(|b| !b.is_ascii_whitespace())
            .map(|b| b.to_ascii_uppercase() as char)
            .collect();
        records.push(FastaRecord::new(name, sequence));
    }

    if seen == 0 {
        return Err(FastaError::EmptyFile);
    }
    Ok(records)
}

/// List sequence names by scanning header lines only, de-duplicated, in file order.
pub fn read_fasta_names<P: AsRef<Path>>(path: P) -> Result<Vec<String>, FastaError> {
    let file = File::open(path.as_ref())?;
    let mut reader = BufReader::new(file);
    let mut names = Vec::new();
    let mut seen = HashSet::new();
    let mut line = Vec::new();

    loop {
        line.clear();
        if reader.read_until(b'\n', &mut line)? == 0 {
            break;
        }
        if let Some(header) = line.strip_prefix(b">") {
            let header = String::from_utf8_lossy(header);
            let name = normalize_name(&header);
            if !name.is_empty() && seen.insert(name.to_string()) {
                names.push(name.to_string());
            }
        }
    }

    Ok(names)
}

/// Write records as FASTA, wrapping sequence lines at [`FASTA_LINE_WIDTH`].
pub fn write_fasta<P: AsRef<Path>>(path: P, records: &[FastaRecord]) -> Result<(), FastaError> {
    let file = File::create(path.as_ref())?;
    let mut writer = BufWriter::new(file);
    for record in records {
        writeln!(writer, ">{}", record.name)?;
        for chunk in record.sequence.as_bytes().chunks(FASTA_LINE_WIDTH) {
            writer.write_all(chunk)?;
            writer.write_all(b"\n")?;
        }
    }
    writer.flush()?;
    Ok(())
}

/// Reverse complement; output is upper-case and any non-ACGT base becomes `N`.
pub fn reverse_complement(seq: &str) -> String {
    seq.bytes()
        .rev()
        .map(|b| match b.to_ascii_uppercase() {
            b'A' => 'T',
            b'T' => 'A',
            b'C' => 'G',
            b'G' => 'C',
            _ => 'N',
        })
        .collect()
}
