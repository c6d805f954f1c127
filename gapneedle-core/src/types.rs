use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub type GenomicPos = u64;

/// Half-open `[start, end)` interval on a named sequence.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GenomicInterval {
    pub name: String,
    pub start: GenomicPos,
    pub end: GenomicPos,
}

impl GenomicInterval {
    pub fn new(name: impl Into<String>, start: GenomicPos, end: GenomicPos) -> Self {
        Self {
            name: name.into(),
            start,
            end,
        }
    }

    pub fn len(&self) -> GenomicPos {
        self.end.saturating_sub(self.start)
    }

    pub fn is_empty(&self) -> bool {
        self.end <= self.start
    }

    /// True when the two intervals share at least one base on the same sequence.
    pub fn overlaps(&self, other: &GenomicInterval) -> bool {
        self.name == other.name && self.start < other.end && other.start < self.end
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Strand {
    Forward,
    Reverse,
}

impl Strand {
    pub fn is_reverse(self) -> bool {
        matches!(self, Strand::Reverse)
    }
}

impl From<bool> for Strand {
    fn from(forward: bool) -> Self {
        if forward {
            Strand::Forward
        } else {
            Strand::Reverse
        }
    }
}

impl From<Strand> for char {
    fn from(strand: Strand) -> Self {
        match strand {
            Strand::Forward => '+',
            Strand::Reverse => '-',
        }
    }
}

impl fmt::Display for Strand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", char::from(*self))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidStrand(pub String);

impl fmt::Display for InvalidStrand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid strand '{}', expected '+' or '-'", self.0)
    }
}

impl std::error::Error for InvalidStrand {}

impl FromStr for Strand {
    type Err = InvalidStrand;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "+" => Ok(Strand::Forward),
            "-" => Ok(Strand::Reverse),
            other => Err(InvalidStrand(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strand_parse_and_display() {
        assert_eq!("+".parse::<Strand>().unwrap(), Strand::Forward);
        assert_eq!("-".parse::<Strand>().unwrap(), Strand::Reverse);
        assert!("x".parse::<Strand>().is_err());
        assert_eq!(Strand::Reverse.to_string(), "-");
        assert!(Strand::from(false).is_reverse());
    }

    #[test]
    fn test_interval_overlap_is_half_open() {
        let a = GenomicInterval::new("chr1", 0, 50);
        let b = GenomicInterval::new("chr1", 50, 100);
        let c = GenomicInterval::new("chr1", 49, 60);
        assert!(!a.overlaps(&b));
        assert!(a.overlaps(&c));
        assert!(!a.overlaps(&GenomicInterval::new("chr2", 0, 50)));
        assert_eq!(c.len(), 11);
    }
}
