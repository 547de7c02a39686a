use tracing::trace;

use crate::features::EncodingScheme;
use crate::genomics::{AlignedRead, CigarOpKind, Position, Region};
use crate::pileup::{counted_reads, into_matrix, stored_run_length, PileupCounter, RawCounts};
use crate::FeatureError;

/// Performance counting engine.
///
/// Pass one sizes every locus by its widest insertion; a prefix sum turns
/// those sizes into row offsets of one flat `u32` buffer. Pass two walks each
/// read once and increments cells directly. Unlike [`InterpretiveCounter`]
/// it counts the final base of a read ending `...I 1M`.
///
/// [`InterpretiveCounter`]: super::InterpretiveCounter
#[derive(Debug, Clone, Copy, Default)]
pub struct OptimizedCounter;

/// Row layout of a chunk.
struct RowLayout {
    start: u32,
    /// Widest insertion anchored at each coordinate.
    widest: Vec<u32>,
    /// Row index of each coordinate's reference-anchored row; one extra
    /// trailing entry holds the total row count.
    offsets: Vec<usize>,
}

impl RowLayout {
    fn new(chunk: &Region, reads: &[(usize, &AlignedRead)]) -> Self {
        let start = chunk.start();
        let mut widest = vec![0u32; chunk.len()];
        for (_, read) in reads {
            for (anchor, len) in insertion_runs(read) {
                if chunk.contains_coordinate(anchor) {
                    let slot = &mut widest[(anchor - start) as usize];
                    *slot = (*slot).max(len);
                }
            }
        }

        let mut offsets = Vec::with_capacity(widest.len() + 1);
        let mut total = 0usize;
        for &insertion in &widest {
            offsets.push(total);
            total += 1 + insertion as usize;
        }
        offsets.push(total);

        Self {
            start,
            widest,
            offsets,
        }
    }

    fn rows(&self) -> usize {
        self.offsets[self.offsets.len() - 1]
    }

    fn positions(&self) -> Vec<Position> {
        let mut positions = Vec::with_capacity(self.rows());
        for (idx, &insertion) in self.widest.iter().enumerate() {
            let coordinate = self.start + idx as u32;
            positions.extend((0..=insertion).map(|offset| Position::new(coordinate, offset)));
        }
        positions
    }
}

impl PileupCounter for OptimizedCounter {
    fn name(&self) -> &'static str {
        "optimized"
    }

    fn count(
        &self,
        records: &[AlignedRead],
        chunk: &Region,
        scheme: &EncodingScheme,
    ) -> Result<RawCounts, FeatureError> {
        let reads = counted_reads(records, chunk, scheme)?;
        let layout = RowLayout::new(chunk, &reads);
        let width = scheme.read_width();
        let mut counts = vec![0u32; layout.rows() * width];

        for &(data_type, read) in &reads {
            accumulate_read(read, data_type, chunk, scheme, &layout, &mut counts, width)?;
        }

        trace!(chunk = %chunk, rows = layout.rows(), engine = self.name(), "counted chunk");
        into_matrix(chunk, layout.positions(), counts, width)
    }
}

fn accumulate_read(
    read: &AlignedRead,
    data_type: usize,
    chunk: &Region,
    scheme: &EncodingScheme,
    layout: &RowLayout,
    counts: &mut [u32],
    width: usize,
) -> Result<(), FeatureError> {
    let runs = (!scheme.is_compressed())
        .then(|| homopolymer_runs(&read.sequence, scheme.max_hp_len()));
    let run_at = |query_pos: usize| match &runs {
        Some(runs) => runs[query_pos],
        None => stored_run_length(read, query_pos),
    };
    let gap = scheme.gap_index(data_type, read.is_reverse);
    let slot = |coordinate: u32| {
        chunk
            .contains_coordinate(coordinate)
            .then(|| (coordinate - layout.start) as usize)
    };

    let mut ref_pos = read.pos;
    let mut query_pos = 0usize;
    // last reference coordinate seen and the bases inserted after it so far
    let mut anchor: Option<(u32, u32)> = None;

    for op in &read.cigar {
        match op.kind {
            CigarOpKind::Match | CigarOpKind::Deletion => {
                let is_match = op.kind == CigarOpKind::Match;
                for _ in 0..op.len {
                    // the read continues past the anchor: pad its unfilled insertion rows
                    if let Some((previous, inserted)) = anchor.take() {
                        if let Some(idx) = slot(previous) {
                            let first_row = layout.offsets[idx] + 1;
                            for extra in inserted..layout.widest[idx] {
                                counts[(first_row + extra as usize) * width + gap] += 1;
                            }
                        }
                    }
                    if let Some(idx) = slot(ref_pos) {
                        let column = if is_match {
                            scheme.lookup(
                                data_type,
                                read.is_reverse,
                                read.sequence[query_pos],
                                run_at(query_pos),
                            )?
                        } else {
                            gap
                        };
                        counts[layout.offsets[idx] * width + column] += 1;
                    }
                    anchor = Some((ref_pos, 0));
                    ref_pos += 1;
                    if is_match {
                        query_pos += 1;
                    }
                }
            }
            CigarOpKind::Insertion => {
                if let Some((coordinate, inserted)) = anchor.as_mut() {
                    if let Some(idx) = slot(*coordinate) {
                        let first_row = layout.offsets[idx] + 1 + *inserted as usize;
                        for k in 0..op.len as usize {
                            let column = scheme.lookup(
                                data_type,
                                read.is_reverse,
                                read.sequence[query_pos + k],
                                run_at(query_pos + k),
                            )?;
                            counts[(first_row + k) * width + column] += 1;
                        }
                    }
                    *inserted += op.len;
                }
                query_pos += op.len as usize;
            }
            CigarOpKind::SoftClip => query_pos += op.len as usize,
            CigarOpKind::HardClip => {}
            CigarOpKind::RefSkip | CigarOpKind::Padding => {
                return Err(FeatureError::UnsupportedCigarOperation {
                    read: read.name.to_string(),
                    op: op.kind.as_char(),
                });
            }
        }
    }
    Ok(())
}

/// Total inserted bases per anchor coordinate, in read order.
///
/// Insertions before the first reference-consuming operation have no anchor.
fn insertion_runs(read: &AlignedRead) -> Vec<(u32, u32)> {
    let mut runs: Vec<(u32, u32)> = Vec::new();
    let mut ref_pos = read.pos;
    let mut consumed_reference = false;
    for op in &read.cigar {
        match op.kind {
            CigarOpKind::Insertion if consumed_reference => {
                let anchor = ref_pos - 1;
                match runs.last_mut() {
                    Some((last, len)) if *last == anchor => *len += op.len,
                    _ => runs.push((anchor, op.len)),
                }
            }
            kind if kind.consumes_reference() => {
                ref_pos += op.len;
                consumed_reference |= op.len > 0;
            }
            _ => {}
        }
    }
    runs
}

/// Capped length of the homopolymer run containing each base.
fn homopolymer_runs(sequence: &[u8], cap: u8) -> Vec<u8> {
    let mut runs = vec![0u8; sequence.len()];
    let mut start = 0;
    while start < sequence.len() {
        let base = sequence[start].to_ascii_uppercase();
        let mut end = start + 1;
        while end < sequence.len() && sequence[end].to_ascii_uppercase() == base {
            end += 1;
        }
        runs[start..end].fill((end - start).min(cap as usize) as u8);
        start = end;
    }
    runs
}
