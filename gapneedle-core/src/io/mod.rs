//! File format I/O for GapNeedle
//!
//! FASTA access comes in two flavours: [`faidx`] for random-access slicing
//! through a `.fai` index, and [`fasta`] for whole-file reads and writes.
//! [`paf`] parses aligner output.

pub mod faidx;
pub mod fasta;
pub mod paf;

pub use faidx::{FaiEntry, FaidxError, IndexedFasta};
pub use fasta::{read_fasta, read_fasta_names, read_fasta_selected, reverse_complement, write_fasta, FastaError, FastaRecord};
pub use paf::{mark_overlaps, parse_alignment_records, rank_overlaps, suggest_overlaps, AlignmentRecord, PafError, PafParser};
