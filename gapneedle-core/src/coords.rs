//! Query → target coordinate mapping through an alignment's operation list
//!
//! [`map_query_to_target`] walks the `cg` operations of one record, keeping a
//! query cursor and a target cursor, until it finds the operation covering the
//! requested query base. Every outcome is a [`MappingResult`]; positions that
//! cannot be mapped are reported through [`MappingReason`], never as errors.

use std::fmt;

use serde::Serialize;

use crate::cigar::{Cigar, CigarOp, OpTally};
use crate::io::paf::AlignmentRecord;
use crate::types::GenomicPos;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MappingReason {
    Ok,
    /// The record carries no `cg` tag, or an empty one.
    MissingCigar,
    /// The position is outside `[query_start, query_end)`.
    OutOfRange,
    /// The position falls in query-only bases (`I` or `S`).
    Insertion,
    /// The scan reached an operation it does not recognise.
    BadCigar,
    /// The operations ran out before reaching the position.
    NoMapping,
}

impl MappingReason {
    pub fn as_str(self) -> &'static str {
        match self {
            MappingReason::Ok => "ok",
            MappingReason::MissingCigar => "missing_cigar",
            MappingReason::OutOfRange => "out_of_range",
            MappingReason::Insertion => "insertion",
            MappingReason::BadCigar => "bad_cigar",
            MappingReason::NoMapping => "no_mapping",
        }
    }
}

impl fmt::Display for MappingReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MappingResult {
    pub target_position: Option<GenomicPos>,
    pub reason: MappingReason,
    pub query_position: GenomicPos,
    /// Position in the orientation of the operation list (flipped for `-`).
    pub oriented_query_position: Option<GenomicPos>,
    /// Matched operation, or the offending one for `bad_cigar`.
    pub op: Option<char>,
    pub op_length: u64,
    pub op_offset: u64,
    pub query_consumed_before: u64,
    pub target_consumed_before: u64,
    pub counts_before: OpTally,
    pub counts_total: OpTally,
}

impl MappingResult {
    fn new(query_position: GenomicPos, reason: MappingReason) -> Self {
        Self {
            target_position: None,
            reason,
            query_position,
            oriented_query_position: None,
            op: None,
            op_length: 0,
            op_offset: 0,
            query_consumed_before: 0,
            target_consumed_before: 0,
            counts_before: OpTally::default(),
            counts_total: OpTally::default(),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.reason == MappingReason::Ok
    }

    /// True when the record was scanned and its operations do not add up to
    /// the spans declared in the PAF columns.
    ///
    /// Separates an inconsistent record from a position that genuinely lies
    /// beyond the alignment when the reason is `no_mapping`.
    pub fn span_mismatch(&self, record: &AlignmentRecord) -> bool {
        let scanned = matches!(
            self.reason,
            MappingReason::Ok | MappingReason::Insertion | MappingReason::NoMapping
        );
        scanned
            && (self.counts_total.query_consumed() != record.query_span()
                || self.counts_total.target_consumed() != record.target_span())
    }
}

/// Map a query-forward position onto the target sequence.
pub fn map_query_to_target(record: &AlignmentRecord, query_position: GenomicPos) -> MappingResult {
    let mut result = MappingResult::new(query_position, MappingReason::NoMapping);

    let Some(cg) = record.cigar().map(str::trim).filter(|cg| !cg.is_empty()) else {
        result.reason = MappingReason::MissingCigar;
        return result;
    };

    if query_position < record.query_start || query_position >= record.query_end {
        result.reason = MappingReason::OutOfRange;
        return result;
    }

    let (oriented, mut q_cursor) = if record.strand.is_reverse() {
        (
            record.query_len - 1 - query_position,
            record.query_len - record.query_end,
        )
    } else {
        (query_position, record.query_start)
    };
    result.oriented_query_position = Some(oriented);

    let (cigar, malformed) = Cigar::parse_prefix(cg);

    let mut t_cursor = record.target_start;
    let mut before = OpTally::default();
    let mut found = false;

    for element in &cigar {
        let len = element.len;
        let end = q_cursor.saturating_add(len);
        let hit = match element.op {
            CigarOp::Match | CigarOp::SeqMatch | CigarOp::SeqMismatch => {
                if oriented < end {
                    let offset = oriented - q_cursor;
                    result.target_position = Some(t_cursor + offset);
                    Some((MappingReason::Ok, offset))
                } else {
                    q_cursor = end;
                    t_cursor = t_cursor.saturating_add(len);
                    None
                }
            }
            CigarOp::Insertion | CigarOp::SoftClip => {
                if oriented < end {
                    Some((MappingReason::Insertion, oriented - q_cursor))
                } else {
                    q_cursor = end;
                    None
                }
            }
            CigarOp::Deletion | CigarOp::Skip => {
                t_cursor = t_cursor.saturating_add(len);
                None
            }
            CigarOp::HardClip | CigarOp::Pad => None,
        };

        if let Some((reason, offset)) = hit {
            found = true;
            result.reason = reason;
            result.op = Some(element.op.as_char());
            result.op_length = len;
            result.op_offset = offset;
            break;
        }
        before.add(element.op, len);
    }

    // A malformed operation only matters once the scan runs into it
    if let (false, Some(e)) = (found, &malformed) {
        let (op, len) = e.offending();
        log::debug!("Bad cg tag on {} vs {}: {}", record.query_name, record.target_name, e);
        result.reason = MappingReason::BadCigar;
        result.op = op;
        result.op_length = len;
    }

    result.query_consumed_before = before.query_consumed();
    result.target_consumed_before = before.target_consumed();
    result.counts_before = before;
    // Totals always cover the whole record, independent of where the match fell
    result.counts_total = cigar.tally();
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::paf::PafParser;

    fn record(qlen: u64, qs: u64, qe: u64, strand: char, ts: u64, te: u64, cg: Option<&str>) -> AlignmentRecord {
        let mut line = format!("q\t{qlen}\t{qs}\t{qe}\t{strand}\tt\t10000\t{ts}\t{te}\t0\t0\t60\ttp:A:P");
        if let Some(cg) = cg {
            line.push_str(&format!("\tcg:Z:{cg}"));
        }
        PafParser::parse_line(&line).unwrap()
    }

    #[test]
    fn test_simple_match() {
        let rec = record(100, 10, 40, '+', 20, 50, Some("30M"));
        let res = map_query_to_target(&rec, 15);
        assert_eq!(res.reason, MappingReason::Ok);
        assert_eq!(res.target_position, Some(25));
        assert_eq!(res.op, Some('M'));
        assert_eq!(res.op_length, 30);
        assert_eq!(res.op_offset, 5);
        assert_eq!(res.query_consumed_before, 0);
        assert_eq!(res.counts_total.get(CigarOp::Match), 30);
        assert!(!res.span_mismatch(&rec));
    }

    #[test]
    fn test_span_edges() {
        let rec = record(100, 10, 40, '+', 20, 50, Some("30M"));
        assert_eq!(map_query_to_target(&rec, 10).target_position, Some(20));
        assert_eq!(map_query_to_target(&rec, 39).target_position, Some(49));
        assert_eq!(map_query_to_target(&rec, 40).reason, MappingReason::OutOfRange);
        assert_eq!(map_query_to_target(&rec, 9).reason, MappingReason::OutOfRange);
    }

    #[test]
    fn test_missing_cigar() {
        let rec = record(100, 10, 40, '+', 20, 50, None);
        for pos in [0, 15, 99, 1000] {
            let res = map_query_to_target(&rec, pos);
            assert_eq!(res.reason, MappingReason::MissingCigar);
            assert_eq!(res.target_position, None);
        }
    }

    #[test]
    fn test_out_of_range_ignores_cigar_content() {
        let rec = record(100, 10, 40, '+', 20, 50, Some("garbage"));
        let res = map_query_to_target(&rec, 50);
        assert_eq!(res.reason, MappingReason::OutOfRange);
        assert_eq!(res.oriented_query_position, None);
    }

    #[test]
    fn test_position_in_insertion() {
        let rec = record(25, 0, 25, '+', 0, 20, Some("10M5I10M"));
        let res = map_query_to_target(&rec, 12);
        assert_eq!(res.reason, MappingReason::Insertion);
        assert_eq!(res.target_position, None);
        assert_eq!(res.op, Some('I'));
        assert_eq!(res.op_offset, 2);
        assert_eq!(res.query_consumed_before, 10);
        assert_eq!(res.counts_before.get(CigarOp::Match), 10);
        assert_eq!(res.counts_total.get(CigarOp::Match), 20);
        assert_eq!(res.counts_total.get(CigarOp::Insertion), 5);

        // After the insertion the target lags by the inserted length
        let res = map_query_to_target(&rec, 16);
        assert_eq!(res.reason, MappingReason::Ok);
        assert_eq!(res.target_position, Some(11));
    }

    #[test]
    fn test_deletion_and_skip_shift_target() {
        let rec = record(100, 0, 20, '+', 100, 127, Some("10M3D2N10M"));
        let res = map_query_to_target(&rec, 10);
        assert_eq!(res.reason, MappingReason::Ok);
        assert_eq!(res.target_position, Some(115));
        assert_eq!(res.target_consumed_before, 15);
        assert_eq!(res.counts_before.get(CigarOp::Deletion), 3);
        assert_eq!(res.counts_before.get(CigarOp::Skip), 2);
    }

    #[test]
    fn test_clips_and_padding() {
        let rec = record(100, 0, 15, '+', 0, 10, Some("2H5S1P10M"));
        assert_eq!(map_query_to_target(&rec, 3).reason, MappingReason::Insertion);
        let res = map_query_to_target(&rec, 5);
        assert_eq!(res.target_position, Some(0));
        assert_eq!(res.counts_before.get(CigarOp::SoftClip), 5);
        assert_eq!(res.counts_before.get(CigarOp::HardClip), 0);
    }

    #[test]
    fn test_reverse_strand() {
        // Query length 100, aligned span [10, 40) on '-'; the operation list
        // runs over reverse-complement coordinates [60, 90).
        let rec = record(100, 10, 40, '-', 200, 230, Some("30M"));
        let res = map_query_to_target(&rec, 39);
        assert_eq!(res.oriented_query_position, Some(60));
        assert_eq!(res.target_position, Some(200));

        let res = map_query_to_target(&rec, 10);
        assert_eq!(res.oriented_query_position, Some(89));
        assert_eq!(res.target_position, Some(229));
    }

    #[test]
    fn test_bad_cigar_only_when_scan_reaches_it() {
        let rec = record(100, 0, 20, '+', 0, 20, Some("10M10Q"));
        let res = map_query_to_target(&rec, 5);
        assert_eq!(res.reason, MappingReason::Ok);
        assert_eq!(res.target_position, Some(5));
        assert_eq!(res.op, Some('M'));

        let res = map_query_to_target(&rec, 15);
        assert_eq!(res.reason, MappingReason::BadCigar);
        assert_eq!(res.op, Some('Q'));
        assert_eq!(res.op_length, 10);
        assert_eq!(res.target_position, None);
        assert_eq!(res.query_consumed_before, 10);
        assert!(!res.span_mismatch(&rec));
    }

    #[test]
    fn test_empty_cigar_tag_is_missing() {
        let rec = record(100, 10, 40, '+', 20, 50, Some(""));
        let res = map_query_to_target(&rec, 15);
        assert_eq!(res.reason, MappingReason::MissingCigar);
        assert_eq!(res.target_position, None);
    }

    #[test]
    fn test_no_mapping_when_operations_fall_short() {
        let rec = record(100, 0, 30, '+', 0, 30, Some("10M"));
        let res = map_query_to_target(&rec, 20);
        assert_eq!(res.reason, MappingReason::NoMapping);
        assert_eq!(res.query_consumed_before, 10);
        assert!(res.span_mismatch(&rec));
    }

    #[test]
    fn test_reason_serializes_snake_case() {
        let rec = record(100, 0, 30, '+', 0, 30, None);
        let json = serde_json::to_value(map_query_to_target(&rec, 0)).unwrap();
        assert_eq!(json["reason"], "missing_cigar");
        assert_eq!(MappingReason::OutOfRange.to_string(), "out_of_range");
    }
}
