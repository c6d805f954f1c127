use gapneedle_core::io::fasta::{read_fasta, reverse_complement, write_fasta, FastaRecord};
use gapneedle_core::stitch::PlanChoices;
use gapneedle_core::{
    map_query_to_target, mark_overlaps, parse_alignment_records, stitch, suggest_overlaps, FastaCache,
    MappingReason, StitchPlan,
};
use std::io::Write;
use tempfile::{tempdir, NamedTempFile};

fn write_paf(lines: &[&str]) -> NamedTempFile {
    let mut f = NamedTempFile::new().expect("create temp paf");
    for l in lines {
        writeln!(f, "{}", l).unwrap();
    }
    f
}

#[test]
fn parse_filter_and_rank_candidates() {
    let paf = write_paf(&[
        "ctg1\t5000\t0\t1000\t+\tchr1\t9000\t8000\t9000\t990\t1000\t60\tcg:Z:1000M",
        "ctg2\t5000\t0\t4000\t+\tchr1\t9000\t0\t4000\t3990\t4000\t60\tcg:Z:4000M",
        "too\tfew\tcolumns\there",
        "ctg1\t5000\t500\t3500\t+\tchr1\t9000\t1000\t4000\t2990\t3000\t60\tcg:Z:3000M",
        "ctg1\t5000\t4000\t5000\t-\tchr2\t7000\t0\t1000\t990\t1000\t60\tcg:Z:1000M",
    ]);

    let records = parse_alignment_records(paf.path(), "chr1", "ctg1").expect("parse PAF");
    let starts: Vec<u64> = records.iter().map(|r| r.query_start).collect();
    assert_eq!(starts, vec![0, 500]);
    assert_eq!(mark_overlaps(&records), vec![true, true]);

    let best = suggest_overlaps(paf.path(), "chr1", "ctg1", Some(1)).expect("suggest");
    assert_eq!(best.len(), 1);
    assert_eq!(best[0].query_start, 500);

    let none = parse_alignment_records(paf.path(), "chr1", "missing").expect("parse PAF");
    assert!(none.is_empty());
}

#[test]
fn map_through_indels_on_both_strands() {
    let paf = write_paf(&[
        "ctg\t100\t10\t40\t+\tchr\t500\t200\t232\t25\t32\t60\tNM:i:4\tcg:Z:10M2I5M4D13M",
        "ctg\t100\t10\t40\t-\tchr\t500\t300\t330\t30\t30\t60\tcg:Z:30M",
    ]);
    let records = parse_alignment_records(paf.path(), "chr", "ctg").unwrap();
    let (fwd, rev) = (&records[0], &records[1]);

    assert_eq!(map_query_to_target(fwd, 10).target_position, Some(200));
    assert_eq!(map_query_to_target(fwd, 20).reason, MappingReason::Insertion);
    // 10M then 2I puts query 22 at target 210; 5M ends at 215, then 4D
    assert_eq!(map_query_to_target(fwd, 22).target_position, Some(210));
    assert_eq!(map_query_to_target(fwd, 27).target_position, Some(219));
    assert_eq!(map_query_to_target(fwd, 40).reason, MappingReason::OutOfRange);

    let res = map_query_to_target(rev, 39);
    assert_eq!(res.oriented_query_position, Some(60));
    assert_eq!(res.target_position, Some(300));
    assert!(!res.span_mismatch(rev));
}

#[test]
fn auto_stitch_joins_target_and_reverse_query() {
    let dir = tempdir().unwrap();
    let target_fa = dir.path().join("target.fa");
    let query_fa = dir.path().join("query.fa");

    // Target ends in a 20 bp block that the query carries, reverse-complemented,
    // at its start, followed by 12 bp of new sequence.
    let shared = "ACGTTGCAACGGTACCTTAG";
    let target_seq = format!("{}{}", "G".repeat(30), shared);
    let extension = "CATCATCATCAT";
    let query_forward = format!("{}{}", shared, extension);
    let query_seq = reverse_complement(&query_forward);
    write_fasta(&target_fa, &[FastaRecord::new("chr1", target_seq.clone())]).unwrap();
    write_fasta(&query_fa, &[FastaRecord::new("ctg9", query_seq.clone())]).unwrap();

    // In query-forward coordinates the shared block sits at [12, 32) on '-'
    let paf = write_paf(&["ctg9\t32\t12\t32\t-\tchr1\t50\t30\t50\t20\t20\t60\tcg:Z:20M"]);
    let record = parse_alignment_records(paf.path(), "chr1", "ctg9").unwrap().remove(0);

    let plan = StitchPlan::from_alignment(&record, 50, 32, PlanChoices::default());
    let out = dir.path().join("merged.fa");
    let request = plan.into_request(&target_fa, &query_fa, &out);

    let mut cache = FastaCache::new();
    let result = stitch(&request, &mut cache).expect("stitch");
    assert_eq!(result.output_name, "chr1+ctg9");
    assert_eq!(result.merged_length, 62);

    let merged = read_fasta(&out).unwrap();
    assert_eq!(merged[0].sequence, format!("{}{}", target_seq, extension));
    assert!(result.session_log.exists());
}
