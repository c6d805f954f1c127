//! Run-length alignment operations (the PAF `cg` tag)
//!
//! A CIGAR string such as `30M2I5M` is parsed once into a list of
//! [`CigarElement`]s so that consumers can match on [`CigarOp`] exhaustively
//! instead of re-interpreting characters.

use std::fmt;
use std::ops::{Index, IndexMut};
use std::str::FromStr;

use serde::ser::{Serialize, SerializeMap, Serializer};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CigarError {
    #[error("Unknown CIGAR operation '{op}' (length {len})")]
    UnknownOp { op: char, len: u64 },
    #[error("CIGAR operation '{0}' has no length")]
    MissingLength(char),
    #[error("CIGAR ends with a length but no operation: {0}")]
    TrailingLength(String),
    #[error("CIGAR length out of range: {0}")]
    LengthOverflow(String),
}

impl CigarError {
    /// Offending operation character and length, where known.
    pub fn offending(&self) -> (Option<char>, u64) {
        match self {
            CigarError::UnknownOp { op, len } => (Some(*op), *len),
            CigarError::MissingLength(op) => (Some(*op), 0),
            CigarError::TrailingLength(_) | CigarError::LengthOverflow(_) => (None, 0),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CigarOp {
    /// `M`
    Match,
    /// `=`
    SeqMatch,
    /// `X`
    SeqMismatch,
    /// `I`
    Insertion,
    /// `D`
    Deletion,
    /// `N`
    Skip,
    /// `S`
    SoftClip,
    /// `H`
    HardClip,
    /// `P`
    Pad,
}

impl CigarOp {
    pub const ALL: [CigarOp; 9] = [
        CigarOp::Match,
        CigarOp::SeqMatch,
        CigarOp::SeqMismatch,
        CigarOp::Insertion,
        CigarOp::Deletion,
        CigarOp::Skip,
        CigarOp::SoftClip,
        CigarOp::HardClip,
        CigarOp::Pad,
    ];

    pub fn from_char(c: char) -> Option<Self> {
        match c {
            'M' => Some(CigarOp::Match),
            '=' => Some(CigarOp::SeqMatch),
            'X' => Some(CigarOp::SeqMismatch),
            'I' => Some(CigarOp::Insertion),
            'D' => Some(CigarOp::Deletion),
            'N' => Some(CigarOp::Skip),
            'S' => Some(CigarOp::SoftClip),
            'H' => Some(CigarOp::HardClip),
            'P' => Some(CigarOp::Pad),
            _ => None,
        }
    }

    pub fn as_char(self) -> char {
        match self {
            CigarOp::Match => 'M',
            CigarOp::SeqMatch => '=',
            CigarOp::SeqMismatch => 'X',
            CigarOp::Insertion => 'I',
            CigarOp::Deletion => 'D',
            CigarOp::Skip => 'N',
            CigarOp::SoftClip => 'S',
            CigarOp::HardClip => 'H',
            CigarOp::Pad => 'P',
        }
    }

    pub fn consumes_query(self) -> bool {
        matches!(
            self,
            CigarOp::Match | CigarOp::SeqMatch | CigarOp::SeqMismatch | CigarOp::Insertion | CigarOp::SoftClip
        )
    }

    pub fn consumes_target(self) -> bool {
        matches!(
            self,
            CigarOp::Match | CigarOp::SeqMatch | CigarOp::SeqMismatch | CigarOp::Deletion | CigarOp::Skip
        )
    }

    fn slot(self) -> usize {
        self as usize
    }
}

impl fmt::Display for CigarOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_char())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CigarElement {
    pub len: u64,
    pub op: CigarOp,
}

impl CigarElement {
    pub fn new(len: u64, op: CigarOp) -> Self {
        Self { len, op }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Cigar(Vec<CigarElement>);

impl Cigar {
    pub fn parse(s: &str) -> Result<Self, CigarError> {
        match Self::parse_prefix(s) {
            (cigar, None) => Ok(cigar),
            (_, Some(e)) => Err(e),
        }
    }

    /// Parse up to the first malformed operation.
    ///
    /// Returns the well-formed leading operations together with the error that
    /// stopped parsing, if any. `10M10Q` yields `[10M]` and `UnknownOp('Q', 10)`.
    pub fn parse_prefix(s: &str) -> (Self, Option<CigarError>) {
        let mut elements = Vec::new();
        let mut digits_start: Option<usize> = None;

        for (i, c) in s.char_indices() {
            if c.is_ascii_digit() {
                digits_start.get_or_insert(i);
                continue;
            }
            let Some(start) = digits_start.take() else {
                return (Cigar(elements), Some(CigarError::MissingLength(c)));
            };
            let len = match s[start..i].parse::<u64>() {
                Ok(len) => len,
                Err(_) => {
                    return (Cigar(elements), Some(CigarError::LengthOverflow(s[start..i].to_string())));
                }
            };
            match CigarOp::from_char(c) {
                Some(op) => elements.push(CigarElement::new(len, op)),
                None => return (Cigar(elements), Some(CigarError::UnknownOp { op: c, len })),
            }
        }

        let trailing = digits_start.map(|start| CigarError::TrailingLength(s[start..].to_string()));
        (Cigar(elements), trailing)
    }

    pub fn elements(&self) -> &[CigarElement] {
        &self.0
    }

    pub fn iter(&self) -> std::slice::Iter<'_, CigarElement> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Query bases covered by the operations (M, =, X, I, S).
    pub fn query_len(&self) -> u64 {
        self.iter().filter(|e| e.op.consumes_query()).map(|e| e.len).sum()
    }

    /// Target bases covered by the operations (M, =, X, D, N).
    pub fn target_len(&self) -> u64 {
        self.iter().filter(|e| e.op.consumes_target()).map(|e| e.len).sum()
    }

    pub fn tally(&self) -> OpTally {
        let mut tally = OpTally::default();
        for e in self.iter() {
            tally.add(e.op, e.len);
        }
        tally
    }
}

impl FromStr for Cigar {
    type Err = CigarError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Cigar::parse(s)
    }
}

impl fmt::Display for Cigar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for e in self.iter() {
            write!(f, "{}{}", e.len, e.op)?;
        }
        Ok(())
    }
}

impl<'a> IntoIterator for &'a Cigar {
    type Item = &'a CigarElement;
    type IntoIter = std::slice::Iter<'a, CigarElement>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

/// Bases consumed per operation kind.
///
/// Only operations that move a cursor are counted; `H` and `P` stay at zero.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OpTally([u64; 9]);

impl OpTally {
    pub fn add(&mut self, op: CigarOp, len: u64) {
        if op.consumes_query() || op.consumes_target() {
            self[op] += len;
        }
    }

    pub fn get(&self, op: CigarOp) -> u64 {
        self[op]
    }

    pub fn query_consumed(&self) -> u64 {
        CigarOp::ALL
            .iter()
            .filter(|op| op.consumes_query())
            .map(|&op| self[op])
            .sum()
    }

    pub fn target_consumed(&self) -> u64 {
        CigarOp::ALL
            .iter()
            .filter(|op| op.consumes_target())
            .map(|&op| self[op])
            .sum()
    }

    /// Non-zero counts in canonical operation order.
    pub fn nonzero(&self) -> impl Iterator<Item = (CigarOp, u64)> + '_ {
        CigarOp::ALL
            .iter()
            .map(move |&op| (op, self[op]))
            .filter(|&(_, n)| n > 0)
    }
}

impl Index<CigarOp> for OpTally {
    type Output = u64;

    fn index(&self, op: CigarOp) -> &u64 {
        &self.0[op.slot()]
    }
}

impl IndexMut<CigarOp> for OpTally {
    fn index_mut(&mut self, op: CigarOp) -> &mut u64 {
        &mut self.0[op.slot()]
    }
}

impl fmt::Display for OpTally {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for (op, n) in self.nonzero() {
            if !first {
                write!(f, " ")?;
            }
            write!(f, "{}={}", op, n)?;
            first = false;
        }
        if first {
            write!(f, "-")?;
        }
        Ok(())
    }
}

impl Serialize for OpTally {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(CigarOp::ALL.len()))?;
        for op in CigarOp::ALL {
            map.serialize_entry(&op.as_char(), &self[op])?;
        }
        map.end()
    }
}
