use std::collections::BTreeMap;
use std::ops::Range;

use tracing::trace;

use crate::features::EncodingScheme;
use crate::genomics::{AlignedRead, CigarOpKind, Position, Region};
use crate::pileup::{counted_reads, into_matrix, stored_run_length, PileupCounter, RawCounts};
use crate::FeatureError;

/// Reference counting engine: builds a column-wise pileup explicitly.
///
/// Each read is expanded into one entry per reference coordinate it aligns
/// to, entries are grouped by coordinate, and every row is tallied from the
/// entries of its column. Like the column-wise pileup walkers it mirrors, it
/// does not report a read's last aligned base when that base is a single
/// aligned base directly after an insertion (`...I 1M`).
#[derive(Debug, Clone, Copy, Default)]
pub struct InterpretiveCounter;

/// One read's alignment at one reference coordinate.
#[derive(Debug, Clone, PartialEq, Eq)]
struct AlignedColumn {
    coordinate: u32,
    /// Read offset of the aligned base; `None` for a deletion.
    query_pos: Option<usize>,
    /// Read offsets of the bases inserted after this coordinate.
    inserted: Range<usize>,
}

/// Entry of a pileup column.
struct PileupEntry<'a> {
    read: &'a AlignedRead,
    data_type: usize,
    column: AlignedColumn,
    /// The read also aligns to the next coordinate.
    spans_next: bool,
}

impl PileupEntry<'_> {
    /// Column observed by this entry at an insertion offset, if any.
    fn observe(&self, offset: usize, scheme: &EncodingScheme) -> Result<Option<usize>, FeatureError> {
        let gap = scheme.gap_index(self.data_type, self.read.is_reverse);
        if offset == 0 {
            return match self.column.query_pos {
                Some(query_pos) => self.base_column(query_pos, scheme).map(Some),
                None => Ok(Some(gap)),
            };
        }
        match self.column.inserted.clone().nth(offset - 1) {
            Some(query_pos) => self.base_column(query_pos, scheme).map(Some),
            None if self.spans_next => Ok(Some(gap)),
            None => Ok(None),
        }
    }

    fn base_column(&self, query_pos: usize, scheme: &EncodingScheme) -> Result<usize, FeatureError> {
        let run_length = if scheme.is_compressed() {
            stored_run_length(self.read, query_pos)
        } else {
            scan_run_length(&self.read.sequence, query_pos, scheme.max_hp_len())
        };
        scheme.lookup(
            self.data_type,
            self.read.is_reverse,
            self.read.sequence[query_pos],
            run_length,
        )
    }
}

impl PileupCounter for InterpretiveCounter {
    fn name(&self) -> &'static str {
        "interpretive"
    }

    fn count(
        &self,
        records: &[AlignedRead],
        chunk: &Region,
        scheme: &EncodingScheme,
    ) -> Result<RawCounts, FeatureError> {
        let reads = counted_reads(records, chunk, scheme)?;

        let mut columns: BTreeMap<u32, Vec<PileupEntry<'_>>> = BTreeMap::new();
        for (data_type, read) in reads {
            let read_end = read.end();
            for column in walk_alignment(read)? {
                if !chunk.contains_coordinate(column.coordinate) {
                    continue;
                }
                let spans_next = column.coordinate + 1 < read_end;
                columns.entry(column.coordinate).or_default().push(PileupEntry {
                    read,
                    data_type,
                    column,
                    spans_next,
                });
            }
        }

        let width = scheme.read_width();
        let mut positions = Vec::with_capacity(chunk.len());
        let mut flat = Vec::with_capacity(chunk.len() * width);
        for coordinate in chunk.start()..chunk.end() {
            let entries = columns.get(&coordinate).map(Vec::as_slice).unwrap_or(&[]);
            let widest_insertion = entries
                .iter()
                .map(|entry| entry.column.inserted.len())
                .max()
                .unwrap_or(0);

            for offset in 0..=widest_insertion {
                let mut row = vec![0u32; width];
                for entry in entries {
                    if let Some(column) = entry.observe(offset, scheme)? {
                        row[column] += 1;
                    }
                }
                positions.push(Position::new(coordinate, offset as u32));
                flat.extend_from_slice(&row);
            }
        }

        trace!(chunk = %chunk, rows = positions.len(), engine = self.name(), "counted chunk");
        into_matrix(chunk, positions, flat, width)
    }
}

/// Expand a read into its aligned reference columns.
fn walk_alignment(read: &AlignedRead) -> Result<Vec<AlignedColumn>, FeatureError> {
    let mut columns: Vec<AlignedColumn> = Vec::with_capacity(read.reference_span() as usize);
    let mut ref_pos = read.pos;
    let mut query_pos = 0usize;

    for op in &read.cigar {
        let len = op.len as usize;
        match op.kind {
            CigarOpKind::Match => {
                for _ in 0..len {
                    columns.push(AlignedColumn {
                        coordinate: ref_pos,
                        query_pos: Some(query_pos),
                        inserted: 0..0,
                    });
                    ref_pos += 1;
                    query_pos += 1;
                }
            }
            CigarOpKind::Deletion => {
                for _ in 0..len {
                    columns.push(AlignedColumn {
                        coordinate: ref_pos,
                        query_pos: None,
                        inserted: 0..0,
                    });
                    ref_pos += 1;
                }
            }
            CigarOpKind::Insertion => {
                // leading insertions have no anchor and are dropped
                if let Some(last) = columns.last_mut() {
                    last.inserted = if last.inserted.is_empty() {
                        query_pos..query_pos + len
                    } else {
                        last.inserted.start..query_pos + len
                    };
                }
                query_pos += len;
            }
            CigarOpKind::SoftClip => query_pos += len,
            CigarOpKind::HardClip => {}
            CigarOpKind::RefSkip | CigarOpKind::Padding => {
                return Err(FeatureError::UnsupportedCigarOperation {
                    read: read.name.to_string(),
                    op: op.kind.as_char(),
                });
            }
        }
    }

    if read.ends_with_insertion_then_base() {
        columns.pop();
    }
    Ok(columns)
}

/// Length of the run of identical bases containing `query_pos`, capped.
fn scan_run_length(sequence: &[u8], query_pos: usize, cap: u8) -> u8 {
    let base = sequence[query_pos].to_ascii_uppercase();
    let left = sequence[..query_pos]
        .iter()
        .rev()
        .take_while(|b| b.to_ascii_uppercase() == base)
        .count();
    let right = sequence[query_pos + 1..]
        .iter()
        .take_while(|b| b.to_ascii_uppercase() == base)
        .count();
    (left + right + 1).min(cap as usize) as u8
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::EncoderConfig;
    use crate::genomics::CigarOp;
    use ndarray::array;

    fn read(name: &str, pos: u32, cigar: &str, seq: &[u8], is_reverse: bool) -> AlignedRead {
        AlignedRead::new(
            name,
            "chr1",
            pos,
            CigarOp::parse_string(cigar).unwrap(),
            seq.to_vec(),
            is_reverse,
        )
    }

    fn raw_scheme() -> EncodingScheme {
        EncodingScheme::new(&EncoderConfig::raw_counts()).unwrap()
    }

    #[test]
    fn walk_attaches_insertions_to_preceding_column() {
        let columns = walk_alignment(&read("r", 10, "2S2M2I1D2M", b"TTACGGTA", false)).unwrap();
        let coordinates: Vec<u32> = columns.iter().map(|c| c.coordinate).collect();
        assert_eq!(coordinates, vec![10, 11, 12, 13, 14]);
        assert_eq!(columns[0].query_pos, Some(2));
        assert_eq!(columns[1].inserted, 4..6);
        assert_eq!(columns[2].query_pos, None);
        assert_eq!(columns[3].query_pos, Some(6));
    }

    #[test]
    fn walk_drops_leading_insertion_and_trailing_base_after_insertion() {
        let columns = walk_alignment(&read("r", 0, "1I3M1I1M", b"GACGTA", false)).unwrap();
        let coordinates: Vec<u32> = columns.iter().map(|c| c.coordinate).collect();
        assert_eq!(coordinates, vec![0, 1, 2]);
        assert_eq!(columns[2].inserted, 4..5);
    }

    #[test]
    fn counts_matches_deletions_and_padded_insertions() {
        let chunk = Region::new("chr1", 0, 4).unwrap();
        let records = vec![
            read("a", 0, "2M2I2M", b"ACTTGT", false),
            read("b", 0, "1M1D2M", b"AGT", true),
        ];
        let counts = InterpretiveCounter.count(&records, &chunk, &raw_scheme()).unwrap();

        let expected_positions = vec![
            Position::new(0, 0),
            Position::new(1, 0),
            Position::new(1, 1),
            Position::new(1, 2),
            Position::new(2, 0),
            Position::new(3, 0),
        ];
        assert_eq!(counts.positions(), expected_positions.as_slice());
        // columns: rev A C G T *, fwd A C G T *
        let expected = array![
            [1u32, 0, 0, 0, 0, 1, 0, 0, 0, 0],
            [0, 0, 0, 0, 1, 0, 1, 0, 0, 0],
            [0, 0, 0, 0, 1, 0, 0, 0, 1, 0],
            [0, 0, 0, 0, 1, 0, 0, 0, 1, 0],
            [0, 0, 1, 0, 0, 0, 0, 1, 0, 0],
            [0, 0, 0, 1, 0, 0, 0, 0, 1, 0],
        ];
        assert_eq!(counts.counts(), &expected);
    }

    #[test]
    fn homopolymer_runs_select_run_length_columns() {
        let scheme = EncodingScheme::new(&EncoderConfig::raw_counts().with_max_hp_len(3)).unwrap();
        let chunk = Region::new("chr1", 0, 6).unwrap();
        let records = vec![read("a", 0, "6M", b"AAAACG", false)];
        let counts = InterpretiveCounter.count(&records, &chunk, &scheme).unwrap();
        let fwd_a3 = scheme.column_index(0, false, crate::features::Symbol::A, 3);
        let fwd_c1 = scheme.column_index(0, false, crate::features::Symbol::C, 1);
        for row in 0..4 {
            assert_eq!(counts.counts()[[row, fwd_a3]], 1);
        }
        assert_eq!(counts.counts()[[4, fwd_c1]], 1);
    }

    #[test]
    fn compressed_reads_use_stored_run_lengths() {
        let scheme = EncodingScheme::new(
            &EncoderConfig::raw_counts().with_max_hp_len(4).with_compression(true),
        )
        .unwrap();
        let chunk = Region::new("chr1", 0, 3).unwrap();
        let records = vec![read("a", 0, "3M", b"ACA", true).with_run_lengths(vec![6, 2, 1])];
        let counts = InterpretiveCounter.count(&records, &chunk, &scheme).unwrap();
        let a4 = scheme.column_index(0, true, crate::features::Symbol::A, 4);
        let c2 = scheme.column_index(0, true, crate::features::Symbol::C, 2);
        let a1 = scheme.column_index(0, true, crate::features::Symbol::A, 1);
        assert_eq!(counts.counts()[[0, a4]], 1);
        assert_eq!(counts.counts()[[1, c2]], 1);
        assert_eq!(counts.counts()[[2, a1]], 1);
    }

    #[test]
    fn unknown_base_fails_the_chunk() {
        let chunk = Region::new("chr1", 0, 3).unwrap();
        let records = vec![read("a", 0, "3M", b"ANA", false)];
        assert!(matches!(
            InterpretiveCounter.count(&records, &chunk, &raw_scheme()),
            Err(FeatureError::UnknownSymbol('N'))
        ));
    }
}
