//! Pileup counting engines.
//!
//! Both engines share one contract: given a gap-free chunk and the records
//! overlapping it, emit one row per reference coordinate plus one row per
//! insertion offset, each holding raw counts over the read columns of the
//! [`EncodingScheme`]. They differ only in how they walk the alignments and
//! in the trailing-insertion case described on [`InterpretiveCounter`].

mod agreement;
mod interpretive;
mod optimized;

pub use agreement::{check_agreement, expected_discrepancies, AgreementReport};
pub use interpretive::InterpretiveCounter;
pub use optimized::OptimizedCounter;

use std::fmt;
use std::str::FromStr;

use ndarray::Array2;
use tracing::{debug, warn};

use crate::features::EncodingScheme;
use crate::genomics::{is_strictly_increasing, AlignedRead, Position, Region};
use crate::FeatureError;

/// Unnormalised counts for one chunk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawCounts {
    region: Region,
    positions: Vec<Position>,
    counts: Array2<u32>,
}

impl RawCounts {
    /// Assemble counts, checking shape and position ordering.
    pub fn new(
        region: Region,
        positions: Vec<Position>,
        counts: Array2<u32>,
    ) -> Result<Self, FeatureError> {
        if positions.len() != counts.nrows() {
            return Err(FeatureError::InvalidSample(format!(
                "{} positions but {} count rows for {}",
                positions.len(),
                counts.nrows(),
                region
            )));
        }
        if !is_strictly_increasing(&positions) {
            return Err(FeatureError::InvalidSample(format!(
                "positions for {region} are not strictly increasing"
            )));
        }
        Ok(Self {
            region,
            positions,
            counts,
        })
    }

    /// Chunk the counts cover.
    pub fn region(&self) -> &Region {
        &self.region
    }

    /// Row positions.
    pub fn positions(&self) -> &[Position] {
        &self.positions
    }

    /// Count matrix, one row per position.
    pub fn counts(&self) -> &Array2<u32> {
        &self.counts
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.positions.len()
    }

    /// Whether there are no rows.
    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    /// Total observations per row.
    pub fn depth(&self) -> Vec<u32> {
        self.counts.rows().into_iter().map(|row| row.sum()).collect()
    }

    /// Split into region, positions and counts.
    pub fn into_parts(self) -> (Region, Vec<Position>, Array2<u32>) {
        (self.region, self.positions, self.counts)
    }
}

/// Counting engine contract.
pub trait PileupCounter {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    /// Count `records` over the gap-free `chunk`.
    fn count(
        &self,
        records: &[AlignedRead],
        chunk: &Region,
        scheme: &EncodingScheme,
    ) -> Result<RawCounts, FeatureError>;
}

/// Which counting engine the encoder drives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Implementation {
    /// Interpretive walker, the reference behaviour.
    Reference,
    /// Two-pass flat-buffer counter.
    #[default]
    Optimized,
    /// Run both, verify agreement, return the optimized counts.
    Checked,
}

impl Implementation {
    /// Count one chunk with the selected engine.
    pub fn count(
        self,
        records: &[AlignedRead],
        chunk: &Region,
        scheme: &EncodingScheme,
    ) -> Result<RawCounts, FeatureError> {
        match self {
            Self::Reference => InterpretiveCounter.count(records, chunk, scheme),
            Self::Optimized => OptimizedCounter.count(records, chunk, scheme),
            Self::Checked => {
                let reference = InterpretiveCounter.count(records, chunk, scheme)?;
                let optimized = OptimizedCounter.count(records, chunk, scheme)?;
                let expected = expected_discrepancies(records, chunk, scheme);
                let report = check_agreement(&reference, &optimized, &expected)?;
                debug!(
                    chunk = %chunk,
                    rows = report.rows_compared,
                    discrepant = report.discrepant.len(),
                    "counting implementations agree"
                );
                Ok(optimized)
            }
        }
    }
}

impl fmt::Display for Implementation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Reference => write!(f, "reference"),
            Self::Optimized => write!(f, "optimized"),
            Self::Checked => write!(f, "checked"),
        }
    }
}

impl FromStr for Implementation {
    type Err = FeatureError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "reference" | "interpretive" => Ok(Self::Reference),
            "optimized" => Ok(Self::Optimized),
            "checked" => Ok(Self::Checked),
            other => Err(FeatureError::InvalidConfiguration(format!(
                "unknown implementation '{other}' (expected reference, optimized or checked)"
            ))),
        }
    }
}

/// Reads both engines count for a chunk, paired with their data type.
///
/// Reads on other contigs, outside the chunk, without reference span, or
/// matching no data type are dropped. Reads whose sequence disagrees with their CIGAR are skipped with
/// a warning. Unsupported operations fail the whole chunk.
pub(crate) fn counted_reads<'a>(
    records: &'a [AlignedRead],
    chunk: &Region,
    scheme: &EncodingScheme,
) -> Result<Vec<(usize, &'a AlignedRead)>, FeatureError> {
    let mut reads = Vec::with_capacity(records.len());
    for read in records {
        if read.reference_span() == 0 || !read.overlaps(chunk.name(), chunk.start(), chunk.end()) {
            continue;
        }
        if let Some(kind) = read.unsupported_op() {
            return Err(FeatureError::UnsupportedCigarOperation {
                read: read.name.to_string(),
                op: kind.as_char(),
            });
        }
        let Some(data_type) = scheme.data_type_for(&read.name) else {
            continue;
        };
        if read.len() != read.query_len() {
            warn!(
                read = %read.name,
                sequence = read.len(),
                cigar = read.query_len(),
                "sequence length disagrees with CIGAR, skipping read"
            );
            continue;
        }
        reads.push((data_type, read));
    }
    if reads.is_empty() {
        return Err(FeatureError::EmptyRegion(chunk.to_string()));
    }
    Ok(reads)
}

/// Run length recorded for a compressed read, defaulting to 1.
pub(crate) fn stored_run_length(read: &AlignedRead, query_pos: usize) -> u8 {
    read.run_length_at(query_pos).unwrap_or(1)
}

pub(crate) fn into_matrix(
    chunk: &Region,
    positions: Vec<Position>,
    flat: Vec<u32>,
    width: usize,
) -> Result<RawCounts, FeatureError> {
    let counts = Array2::from_shape_vec((positions.len(), width), flat)
        .map_err(|err| FeatureError::InvalidSample(err.to_string()))?;
    RawCounts::new(chunk.clone(), positions, counts)
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

    #[test]
    fn raw_counts_reject_inconsistent_rows() {
        let region = Region::new("chr1", 0, 2).unwrap();
        let counts = array![[1u32, 0], [0, 1]];
        assert!(RawCounts::new(region.clone(), vec![Position::new(0, 0)], counts.clone()).is_err());
        assert!(RawCounts::new(
            region.clone(),
            vec![Position::new(1, 0), Position::new(0, 0)],
            counts.clone()
        )
        .is_err());
        let ok = RawCounts::new(region, vec![Position::new(0, 0), Position::new(0, 1)], counts)
            .unwrap();
        assert_eq!(ok.depth(), vec![1, 1]);
    }

    #[test]
    fn counted_reads_filters_and_validates() {
        let scheme = EncodingScheme::new(&EncoderConfig::default().with_data_types(["ont"])).unwrap();
        let chunk = Region::new("chr1", 0, 10).unwrap();
        let records = vec![
            read("ont1", 0, "4M", b"ACGT", false),
            read("pb1", 0, "4M", b"ACGT", false),
            read("ont2", 20, "4M", b"ACGT", false),
            read("ont3", 2, "4M", b"ACG", false),
        ];
        let reads = counted_reads(&records, &chunk, &scheme).unwrap();
        assert_eq!(reads.len(), 1);
        assert_eq!(reads[0].1.name.as_ref(), "ont1");

        let spliced = vec![read("ont4", 0, "2M3N2M", b"ACGT", false)];
        assert!(matches!(
            counted_reads(&spliced, &chunk, &scheme),
            Err(FeatureError::UnsupportedCigarOperation { op: 'N', .. })
        ));

        assert!(matches!(
            counted_reads(&records[1..2], &chunk, &scheme),
            Err(FeatureError::EmptyRegion(_))
        ));
    }

    #[test]
    fn checked_implementation_returns_optimized_counts() {
        let scheme = EncodingScheme::new(&EncoderConfig::raw_counts()).unwrap();
        let chunk = Region::new("chr1", 0, 8).unwrap();
        let records = vec![
            read("a", 0, "5M2I1M", b"ACGTAGGC", false),
            read("b", 0, "8M", b"ACGTACCC", true),
        ];
        let checked = Implementation::Checked.count(&records, &chunk, &scheme).unwrap();
        let optimized = Implementation::Optimized.count(&records, &chunk, &scheme).unwrap();
        assert_eq!(checked, optimized);
    }

    #[test]
    fn implementation_names_round_trip() {
        for implementation in [
            Implementation::Reference,
            Implementation::Optimized,
            Implementation::Checked,
        ] {
            assert_eq!(
                implementation.to_string().parse::<Implementation>().unwrap(),
                implementation
            );
        }
    }
}
