#[path = "common/mod.rs"]
mod common;

use common::{read, region};
use pileup_features::pileup::{check_agreement, expected_discrepancies, InterpretiveCounter, OptimizedCounter};
use pileup_features::{split_covered, AlignedRead, EncoderConfig, EncodingScheme, PileupCounter};
use proptest::prelude::*;

fn base() -> impl Strategy<Value = u8> {
    prop_oneof![Just(b'A'), Just(b'C'), Just(b'G'), Just(b'T')]
}

/// A read starting with a match, followed by a few match, insertion or deletion runs.
fn aligned_read() -> impl Strategy<Value = AlignedRead> {
    (
        0u32..40,
        1u32..6,
        proptest::collection::vec((0u8..3, 1u32..4), 0..5),
        proptest::collection::vec(base(), 32),
        any::<bool>(),
    )
        .prop_map(|(pos, first, ops, bases, is_reverse)| {
            let mut cigar = format!("{first}M");
            let mut query_len = first as usize;
            for (kind, len) in ops {
                let op = match kind {
                    0 => 'M',
                    1 => 'I',
                    _ => 'D',
                };
                if op != 'D' {
                    query_len += len as usize;
                }
                cigar.push_str(&format!("{len}{op}"));
            }
            read("r", pos, &cigar, &bases[..query_len], is_reverse)
        })
}

fn scheme() -> EncodingScheme {
    EncodingScheme::new(&EncoderConfig::raw_counts().with_max_hp_len(2)).expect("valid configuration")
}

proptest! {
    #[test]
    fn engines_differ_only_where_predicted(reads in proptest::collection::vec(aligned_read(), 1..12)) {
        let scheme = scheme();
        for chunk in split_covered(&reads, &region(0, 60)) {
            let reference = InterpretiveCounter.count(&reads, &chunk, &scheme).expect("interpretive counts");
            let optimized = OptimizedCounter.count(&reads, &chunk, &scheme).expect("optimized counts");
            let expected = expected_discrepancies(&reads, &chunk, &scheme);
            let report = check_agreement(&reference, &optimized, &expected);
            prop_assert!(report.is_ok(), "disagreement in {}: {:?}", chunk, report);

            let extra: u32 = expected.values().sum();
            let reference_total: u32 = reference.depth().iter().sum();
            let optimized_total: u32 = optimized.depth().iter().sum();
            prop_assert_eq!(optimized_total, reference_total + extra);
            prop_assert!(optimized.positions().windows(2).all(|pair| pair[0] < pair[1]));
        }
    }

    #[test]
    fn chunks_are_ordered_disjoint_and_covered(reads in proptest::collection::vec(aligned_read(), 0..12)) {
        let target = region(5, 50);
        let chunks = split_covered(&reads, &target);
        for pair in chunks.windows(2) {
            prop_assert!(pair[0].end() <= pair[1].start());
        }
        for chunk in &chunks {
            prop_assert!(target.contains(chunk));
            for coordinate in chunk.start()..chunk.end() {
                prop_assert!(
                    reads.iter().any(|r| r.pos <= coordinate && coordinate < r.end()),
                    "coordinate {} of {} is uncovered", coordinate, chunk
                );
            }
        }
        for coordinate in target.start()..target.end() {
            let covered = reads.iter().any(|r| r.pos <= coordinate && coordinate < r.end());
            let chunked = chunks.iter().any(|c| c.contains_coordinate(coordinate));
            prop_assert_eq!(covered, chunked);
        }
    }
}
