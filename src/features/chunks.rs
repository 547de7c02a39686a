use crate::genomics::{AlignedRead, Region};

/// Split `region` into maximal sub-regions continuously covered by reads.
///
/// Each read's reference span is clipped to the region. Spans sharing at
/// least one coordinate merge; spans that merely abut do not, so coverage
/// `[0, 10)` and `[10, 20)` yields two chunks. Chunks come back in
/// increasing coordinate order and never overlap.
pub fn split_covered(records: &[AlignedRead], region: &Region) -> Vec<Region> {
    let mut spans: Vec<(u32, u32)> = records
        .iter()
        .filter(|read| read.overlaps(region.name(), region.start(), region.end()))
        .map(|read| (read.pos.max(region.start()), read.end().min(region.end())))
        .filter(|(start, end)| start < end)
        .collect();
    spans.sort_unstable();

    let mut merged: Vec<(u32, u32)> = Vec::new();
    for (start, end) in spans {
        match merged.last_mut() {
            Some((_, current_end)) if start < *current_end => {
                *current_end = (*current_end).max(end);
            }
            _ => merged.push((start, end)),
        }
    }

    merged
        .into_iter()
        .filter_map(|(start, end)| region.intersect(start, end))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::genomics::CigarOp;
    use test_case::test_case;

    fn span(chrom: &str, pos: u32, len: u32) -> AlignedRead {
        AlignedRead::new(
            "r",
            chrom,
            pos,
            CigarOp::parse_string(&format!("{len}M")).unwrap(),
            vec![b'A'; len as usize],
            false,
        )
    }

    fn bounds(chunks: &[Region]) -> Vec<(u32, u32)> {
        chunks.iter().map(|c| (c.start(), c.end())).collect()
    }

    #[test]
    fn gap_in_coverage_gives_two_chunks() {
        let region = Region::new("chr1", 0, 30).unwrap();
        let records = vec![span("chr1", 0, 10), span("chr1", 14, 16), span("chr1", 3, 5)];
        let chunks = split_covered(&records, &region);
        assert_eq!(bounds(&chunks), vec![(0, 10), (14, 30)]);
        assert!(chunks.iter().all(|c| c.name() == "chr1"));
    }

    #[test_case(&[(0, 10), (10, 10)], &[(0, 10), (10, 20)] ; "abutting spans stay apart")]
    #[test_case(&[(0, 10), (9, 10)], &[(0, 19)] ; "one shared coordinate merges")]
    #[test_case(&[(5, 30)], &[(5, 25)] ; "spans are clipped to the region")]
    #[test_case(&[], &[] ; "no reads no chunks")]
    fn merges_only_overlapping_spans(reads: &[(u32, u32)], expected: &[(u32, u32)]) {
        let region = Region::new("chr1", 0, 25).unwrap();
        let records: Vec<AlignedRead> = reads.iter().map(|&(pos, len)| span("chr1", pos, len)).collect();
        assert_eq!(bounds(&split_covered(&records, &region)), expected);
    }

    #[test]
    fn other_contigs_are_ignored() {
        let region = Region::new("chr1", 0, 20).unwrap();
        let records = vec![span("chr2", 0, 20), span("chr1", 4, 2)];
        assert_eq!(bounds(&split_covered(&records, &region)), vec![(4, 6)]);
    }
}
