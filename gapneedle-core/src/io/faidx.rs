//! Random access into FASTA files through a `.fai` sidecar index
//!
//! The index records, per sequence, its length, the byte offset of its first
//! base and the line geometry (bases per line, bytes per line). With those five
//! numbers any base can be located with one seek, so slicing a small window out
//! of a multi-gigabyte assembly never reads more than the window itself.
//!
//! The sidecar is `<fasta>.fai` and is interchangeable with `samtools faidx`.

use std::collections::{HashMap, HashSet};
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::io::fasta::normalize_name;
use crate::types::GenomicPos;

#[derive(Debug, Error)]
pub enum FaidxError {
    #[error("Failed to open FASTA {}: {source}", .path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("IO error reading {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Invalid FASTA index {}: {message}", .path.display())]
    InvalidIndex { path: PathBuf, message: String },
    #[error("Sequence not found in FASTA index: {0}")]
    SequenceNotFound(String),
    #[error("Short read for {name}: wanted {wanted} bases, got {got}")]
    ShortRead { name: String, wanted: u64, got: u64 },
}

/// Position of one sequence inside its FASTA file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FaiEntry {
    pub name: String,
    pub length: GenomicPos,
    /// Byte offset of the first base.
    pub offset: u64,
    /// Bases per full line.
    pub line_bases: u64,
    /// Bytes per full line, terminator included.
    pub line_width: u64,
}

impl FaiEntry {
    fn is_valid(&self) -> bool {
        !self.name.is_empty()
            && self.line_bases > 0
            && self.line_width >= self.line_bases
            && self.byte_offset_of(self.length).is_some()
    }

    /// Byte offset of base `pos` (0-based) within the file, or `None` when the
    /// geometry puts it beyond `u64`.
    pub fn byte_offset_of(&self, pos: GenomicPos) -> Option<u64> {
        if self.line_bases == 0 {
            return None;
        }
        (pos / self.line_bases)
            .checked_mul(self.line_width)?
            .checked_add(pos % self.line_bases)?
            .checked_add(self.offset)
    }

    fn to_line(&self) -> String {
        format!(
            "{}\t{}\t{}\t{}\t{}",
            self.name, self.length, self.offset, self.line_bases, self.line_width
        )
    }
}

/// Sidecar path for a FASTA file: the FASTA path with `.fai` appended.
pub fn fai_path_of(fasta: &Path) -> PathBuf {
    let mut s = fasta.as_os_str().to_owned();
    s.push(".fai");
    PathBuf::from(s)
}

/// A FASTA file opened for random-access slicing.
///
/// Each [`fetch`](IndexedFasta::fetch) opens, seeks and reads independently, so
/// one instance can be shared between threads without locking.
#[derive(Debug, Clone)]
pub struct IndexedFasta {
    path: PathBuf,
    entries: Vec<FaiEntry>,
    names: Vec<String>,
    by_name: HashMap<String, usize>,
}

impl IndexedFasta {
    /// Open a FASTA file, loading its sidecar index or building one.
    ///
    /// A missing or unreadable sidecar triggers exactly one rebuild, which is
    /// then persisted next to the FASTA file.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, FaidxError> {
        let path = path.as_ref().to_path_buf();
        let fai = fai_path_of(&path);

        let entries = match load_fai(&fai) {
            Ok(entries) => {
                log::debug!("Loaded {} index entries from {}", entries.len(), fai.display());
                entries
            }
            Err(e) => {
                log::debug!("Rebuilding index for {} ({})", path.display(), e);
                let entries = build_fai(&path)?;
                if entries.is_empty() {
                    return Err(FaidxError::InvalidIndex {
                        path: fai,
                        message: "no sequences found while building index".to_string(),
                    });
                }
                if let Err(e) = write_fai(&fai, &entries) {
                    log::warn!("Could not persist FASTA index {}: {}", fai.display(), e);
                }
                entries
            }
        };

        Ok(Self::from_entries(path, entries))
    }

    fn from_entries(path: PathBuf, entries: Vec<FaiEntry>) -> Self {
        let by_name = entries
            .iter()
            .enumerate()
            .map(|(i, e)| (e.name.clone(), i))
            .collect();
        let names = entries.iter().map(|e| e.name.clone()).collect();
        Self {
            path,
            entries,
            names,
            by_name,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Sequence names in index order.
    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn entries(&self) -> &[FaiEntry] {
        &self.entries
    }

    pub fn entry(&self, name: &str) -> Option<&FaiEntry> {
        self.by_name.get(name).map(|&i| &self.entries[i])
    }

    pub fn contains(&self, name: &str) -> bool {
        self.by_name.contains_key(name)
    }

    /// Indexed length, or `None` for an unknown name.
    pub fn length(&self, name: &str) -> Option<GenomicPos> {
        self.entry(name).map(|e| e.length)
    }

    /// Upper-cased bases of `[start, end)`, with `end` clamped to the sequence length.
    pub fn fetch(&self, name: &str, start: GenomicPos, end: GenomicPos) -> Result<String, FaidxError> {
        let entry = self
            .entry(name)
            .ok_or_else(|| FaidxError::SequenceNotFound(name.to_string()))?;

        let end = end.min(entry.length);
        if end <= start {
            return Ok(String::new());
        }
        let wanted = end - start;

        let io_err = |source| FaidxError::Io {
            path: self.path.clone(),
            source,
        };
        let overflow = || FaidxError::InvalidIndex {
            path: fai_path_of(&self.path),
            message: format!("offset of {}:{}-{} overflows", name, start, end),
        };
        let first = entry.byte_offset_of(start).ok_or_else(overflow)?;
        let last = entry.byte_offset_of(end - 1).ok_or_else(overflow)?;

        let mut file = File::open(&self.path).map_err(|source| FaidxError::Open {
            path: self.path.clone(),
            source,
        })?;
        file.seek(SeekFrom::Start(first)).map_err(io_err)?;

        let span = (last - first).saturating_add(1);
        let reader = BufReader::with_capacity(span.min(1 << 20) as usize, file);

        let mut out = Vec::with_capacity(wanted as usize);
        for byte in reader.bytes() {
            let b = byte.map_err(io_err)?;
            if b == b'\n' || b == b'\r' {
                continue;
            }
            out.push(b.to_ascii_uppercase());
            if out.len() as u64 == wanted {
                break;
            }
        }

        if (out.len() as u64) != wanted {
            return Err(FaidxError::ShortRead {
                name: name.to_string(),
                wanted,
                got: out.len() as u64,
            });
        }
        Ok(String::from_utf8_lossy(&out).into_owned())
    }

    /// Whole sequence by name.
    pub fn fetch_all(&self, name: &str) -> Result<String, FaidxError> {
        let length = self
            .length(name)
            .ok_or_else(|| FaidxError::SequenceNotFound(name.to_string()))?;
        self.fetch(name, 0, length)
    }
}

/// Parse a `.fai` file. Short lines and entries with impossible geometry are
/// skipped; a non-numeric field fails the whole load.
pub fn load_fai(path: &Path) -> Result<Vec<FaiEntry>, FaidxError> {
    let file = File::open(path).map_err(|source| FaidxError::Open {
        path: path.to_path_buf(),
        source,
    })?;
    let reader = BufReader::new(file);
    let invalid = |message: String| FaidxError::InvalidIndex {
        path: path.to_path_buf(),
        message,
    };

    let mut entries: Vec<FaiEntry> = Vec::new();
    let mut seen: HashSet<String> = HashSet::new();

    for (line_num, line) in reader.lines().enumerate() {
        let line = line.map_err(|source| FaidxError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        if line.is_empty() {
            continue;
        }
        let fields: Vec<&str> = line.split('\t').collect();
        if fields.len() < 5 {
            continue;
        }

        let number = |idx: usize, what: &str| -> Result<u64, FaidxError> {
            fields[idx].trim().parse::<u64>().map_err(|_| {
                invalid(format!(
                    "line {}: invalid {} '{}'",
                    line_num + 1,
                    what,
                    fields[idx]
                ))
            })
        };

        let entry = FaiEntry {
            name: fields[0].to_string(),
            length: number(1, "length")?,
            offset: number(2, "offset")?,
            line_bases: number(3, "line bases")?,
            line_width: number(4, "line width")?,
        };
        if !entry.is_valid() {
            continue;
        }
        if seen.insert(entry.name.clone()) {
            entries.push(entry);
        }
    }

    if entries.is_empty() {
        return Err(invalid("no valid entries".to_string()));
    }
    Ok(entries)
}

/// Build index entries with a single pass over the FASTA file.
///
/// Sequences without any bases are left out, since they have no line geometry.
pub fn build_fai(path: &Path) -> Result<Vec<FaiEntry>, FaidxError> {
    let file = File::open(path).map_err(|source| FaidxError::Open {
        path: path.to_path_buf(),
        source,
    })?;
    let mut reader = BufReader::new(file);

    let mut entries = Vec::new();
    let mut current: Option<FaiEntry> = None;
    let mut line = Vec::new();
    let mut line_start = 0u64;

    let flush = |entry: Option<FaiEntry>, entries: &mut Vec<FaiEntry>| {
        if let Some(entry) = entry {
            if entry.line_bases > 0 {
                entries.push(entry);
            } else {
                log::debug!("Skipping empty sequence '{}' while indexing", entry.name);
            }
        }
    };

    loop {
        line.clear();
        let read = reader.read_until(b'\n', &mut line).map_err(|source| FaidxError::Io {
            path: path.to_path_buf(),
            source,
        })? as u64;
        if read == 0 {
            break;
        }
        let next_start = line_start + read;
        let has_terminator = line.last() == Some(&b'\n');

        if let Some(header) = line.strip_prefix(b">") {
            flush(current.take(), &mut entries);
            let header = String::from_utf8_lossy(header);
            let name = normalize_name(&header);
            if !name.is_empty() {
                current = Some(FaiEntry {
                    name: name.to_string(),
                    length: 0,
                    offset: 0,
                    line_bases: 0,
                    line_width: 0,
                });
            }
        } else if let Some(entry) = current.as_mut() {
            let bases = line.iter().filter(|b| !b.is_ascii_whitespace()).count() as u64;
            if bases > 0 {
                if entry.line_bases == 0 {
                    entry.offset = line_start;
                    entry.line_bases = bases;
                    entry.line_width = if has_terminator { read } else { bases };
                }
                entry.length += bases;
            }
        }

        line_start = next_start;
    }
    flush(current.take(), &mut entries);

    log::debug!("Indexed {} sequences in {}", entries.len(), path.display());
    Ok(entries)
}

pub fn write_fai(path: &Path, entries: &[FaiEntry]) -> std::io::Result<()> {
    let mut writer = BufWriter::new(File::create(path)?);
    for entry in entries {
        writeln!(writer, "{}", entry.to_line())?;
    }
    writer.flush()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn write(dir: &Path, name: &str, content: &str) -> PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn test_overflowing_geometry_is_rejected() {
        let entry = FaiEntry { name: "s".into(), length: 4, offset: 3, line_bases: 1, line_width: u64::MAX };
        assert_eq!(entry.byte_offset_of(0), Some(3));
        assert_eq!(entry.byte_offset_of(2), None);
        assert!(!entry.is_valid());

        let sane = FaiEntry { name: "s".into(), length: 4, offset: 3, line_bases: 4, line_width: 5 };
        assert_eq!(sane.byte_offset_of(2), Some(5));
        assert!(sane.is_valid());
    }

    #[test]
    fn test_corrupt_sidecar_geometry_triggers_rebuild() {
        let dir = tempdir().unwrap();
        let fa = write(dir.path(), "s.fa", ">s\nACGT\n");
        write(dir.path(), "s.fa.fai", "s\t4\t3\t1\t18446744073709551615\n");

        let store = IndexedFasta::open(&fa).unwrap();
        assert_eq!(store.entry("s").unwrap().line_width, 5);
        assert_eq!(store.fetch("s", 2, 3).unwrap(), "G");
    }

    #[test]
    fn test_fetch_reports_overflow_as_invalid_index() {
        let dir = tempdir().unwrap();
        let fa = write(dir.path(), "s.fa", ">s\nACGT\n");
        let entry = FaiEntry { name: "s".into(), length: 4, offset: 3, line_bases: 1, line_width: u64::MAX };
        let store = IndexedFasta::from_entries(fa, vec![entry]);
        assert!(matches!(store.fetch("s", 2, 3), Err(FaidxError::InvalidIndex { .. })));
    }

    #[test]
    fn test_build_records_geometry() {
        let dir = tempdir().unwrap();
        let fa = write(dir.path(), "a.fa", ">chr1 desc\nACGT\nACGT\nAC\n>chr2\nGGGGG\n");
        let entries = build_fai(&fa).unwrap();
        assert_eq!(
            entries,
            vec![
                FaiEntry { name: "chr1".into(), length: 10, offset: 11, line_bases: 4, line_width: 5 },
                FaiEntry { name: "chr2".into(), length: 5, offset: 30, line_bases: 5, line_width: 6 },
            ]
        );
    }

    #[test]
    fn test_build_without_trailing_newline_uses_bases_as_width() {
        let dir = tempdir().unwrap();
        let fa = write(dir.path(), "a.fa", ">only\nACG");
        let entries = build_fai(&fa).unwrap();
        assert_eq!(entries[0].line_bases, 3);
        assert_eq!(entries[0].line_width, 3);
        assert_eq!(entries[0].offset, 6);
    }

    #[test]
    fn test_open_persists_sidecar_and_reloads() {
        let dir = tempdir().unwrap();
        let fa = write(dir.path(), "a.fa", ">s1\nACGTA\nCG\n>s2\nTT\n");
        let built = IndexedFasta::open(&fa).unwrap();
        let fai = fai_path_of(&fa);
        assert!(fai.exists());
        assert_eq!(std::fs::read_to_string(&fai).unwrap(), "s1\t7\t4\t5\t6\ns2\t2\t17\t2\t3\n");

        let loaded = IndexedFasta::open(&fa).unwrap();
        assert_eq!(built.entries(), loaded.entries());
        assert_eq!(loaded.names(), vec!["s1", "s2"]);
        assert_eq!(loaded.length("s1"), Some(7));
        assert_eq!(loaded.length("nope"), None);
    }

    #[test]
    fn test_malformed_sidecar_triggers_rebuild() {
        let dir = tempdir().unwrap();
        let fa = write(dir.path(), "a.fa", ">s1\nACGT\n");
        std::fs::write(fai_path_of(&fa), "s1\tnot_a_number\t4\t4\t5\n").unwrap();
        let idx = IndexedFasta::open(&fa).unwrap();
        assert_eq!(idx.length("s1"), Some(4));
        assert_eq!(std::fs::read_to_string(fai_path_of(&fa)).unwrap(), "s1\t4\t4\t4\t5\n");
    }

    #[test]
    fn test_fetch_across_lines_and_crlf() {
        let dir = tempdir().unwrap();
        let fa = write(dir.path(), "a.fa", ">s\r\nacgt\r\nACGT\r\nNN\r\n");
        let idx = IndexedFasta::open(&fa).unwrap();
        assert_eq!(idx.entry("s").unwrap().line_width, 6);
        assert_eq!(idx.fetch("s", 0, 10).unwrap(), "ACGTACGTNN");
        assert_eq!(idx.fetch("s", 3, 6).unwrap(), "TAC");
        assert_eq!(idx.fetch("s", 8, 100).unwrap(), "NN");
        assert_eq!(idx.fetch("s", 7, 7).unwrap(), "");
        assert_eq!(idx.fetch("s", 50, 60).unwrap(), "");
    }

    #[test]
    fn test_fetch_unknown_name_is_error() {
        let dir = tempdir().unwrap();
        let fa = write(dir.path(), "a.fa", ">s\nACGT\n");
        let idx = IndexedFasta::open(&fa).unwrap();
        assert!(matches!(idx.fetch("x", 0, 1), Err(FaidxError::SequenceNotFound(_))));
    }

    #[test]
    fn test_truncated_file_is_short_read() {
        let dir = tempdir().unwrap();
        let fa = write(dir.path(), "a.fa", ">s\nACGT\nACGT\n");
        // Sidecar claims more bases than the file holds
        std::fs::write(fai_path_of(&fa), "s\t20\t3\t4\t5\n").unwrap();
        let idx = IndexedFasta::open(&fa).unwrap();
        let err = idx.fetch("s", 0, 20).unwrap_err();
        assert!(matches!(err, FaidxError::ShortRead { wanted: 20, got: 8, .. }));
    }

    #[test]
    fn test_missing_fasta_is_open_error() {
        let err = IndexedFasta::open("/no/such/file.fa").unwrap_err();
        assert!(matches!(err, FaidxError::Open { .. }));
    }

    #[test]
    fn test_headers_only_is_invalid_index() {
        let dir = tempdir().unwrap();
        let fa = write(dir.path(), "a.fa", ">empty1\n>empty2\n");
        let err = IndexedFasta::open(&fa).unwrap_err();
        assert!(matches!(err, FaidxError::InvalidIndex { .. }));
    }
}
