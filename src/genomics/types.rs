use std::sync::Arc;

use crate::FeatureError;

/// CIGAR operation kinds describing how a read aligns to the reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CigarOpKind {
    /// Consuming match/mismatch (`M`, `=`, `X`).
    Match,
    /// Insertion relative to the reference.
    Insertion,
    /// Deletion relative to the reference.
    Deletion,
    /// Soft clipping (sequence present in read only).
    SoftClip,
    /// Hard clipping (trimmed sequence not present in read).
    HardClip,
    /// Skipped reference region (`N`); never counted.
    RefSkip,
    /// Silent padding (`P`); never counted.
    Padding,
}

impl CigarOpKind {
    /// Whether the operation advances along the reference.
    pub fn consumes_reference(self) -> bool {
        matches!(self, Self::Match | Self::Deletion | Self::RefSkip)
    }

    /// Whether the operation advances along the read sequence.
    pub fn consumes_query(self) -> bool {
        matches!(self, Self::Match | Self::Insertion | Self::SoftClip)
    }

    /// SAM character for the operation.
    pub fn as_char(self) -> char {
        match self {
            Self::Match => 'M',
            Self::Insertion => 'I',
            Self::Deletion => 'D',
            Self::SoftClip => 'S',
            Self::HardClip => 'H',
            Self::RefSkip => 'N',
            Self::Padding => 'P',
        }
    }

    /// Parse a SAM operation character.
    pub fn from_char(op: char) -> Option<Self> {
        match op {
            'M' | '=' | 'X' => Some(Self::Match),
            'I' => Some(Self::Insertion),
            'D' => Some(Self::Deletion),
            'S' => Some(Self::SoftClip),
            'H' => Some(Self::HardClip),
            'N' => Some(Self::RefSkip),
            'P' => Some(Self::Padding),
            _ => None,
        }
    }
}

/// CIGAR operation with length.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CigarOp {
    /// Operation kind.
    pub kind: CigarOpKind,
    /// Number of bases affected by the operation.
    pub len: u32,
}

impl CigarOp {
    /// Construct a new CIGAR operation.
    pub fn new(kind: CigarOpKind, len: u32) -> Self {
        Self { kind, len }
    }

    /// Parse a SAM CIGAR string such as `5M2I1M3S`.
    ///
    /// `*` yields an empty operation list.
    pub fn parse_string(cigar: &str) -> Result<Vec<CigarOp>, FeatureError> {
        if cigar == "*" {
            return Ok(Vec::new());
        }

        let malformed = |reason: String| FeatureError::MalformedCigar {
            cigar: cigar.to_string(),
            reason,
        };
        let mut ops = Vec::new();
        let mut num_start = 0;
        for (i, c) in cigar.char_indices() {
            if c.is_ascii_digit() {
                continue;
            }
            let digits = &cigar[num_start..i];
            if digits.is_empty() {
                return Err(malformed(format!("operation '{c}' at offset {i} has no length")));
            }
            let kind = CigarOpKind::from_char(c).ok_or_else(|| {
                FeatureError::UnsupportedCigarOperation {
                    read: cigar.to_string(),
                    op: c,
                }
            })?;
            let len: u32 = digits
                .parse()
                .map_err(|_| malformed(format!("length '{digits}' does not fit in 32 bits")))?;
            ops.push(CigarOp::new(kind, len));
            num_start = i + 1;
        }
        if num_start < cigar.len() {
            return Err(malformed(format!(
                "trailing length '{}' has no operation",
                &cigar[num_start..]
            )));
        }
        Ok(ops)
    }
}

/// Aligned read with the per-base alignment decomposition the counters walk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlignedRead {
    /// Read name; its prefix selects the data type the read is counted under.
    pub name: Arc<str>,
    /// Reference contig/chromosome name.
    pub chrom: Arc<str>,
    /// 0-based leftmost reference coordinate.
    pub pos: u32,
    /// CIGAR describing the alignment.
    pub cigar: Vec<CigarOp>,
    /// Read sequence stored as ASCII.
    pub sequence: Arc<[u8]>,
    /// Per-base homopolymer run lengths of a run-length compressed read.
    pub run_lengths: Option<Arc<[u8]>>,
    /// Whether the read maps to the reverse complement strand.
    pub is_reverse: bool,
}

impl AlignedRead {
    /// Construct a new aligned read wrapper.
    pub fn new(
        name: impl Into<Arc<str>>,
        chrom: impl Into<Arc<str>>,
        pos: u32,
        cigar: Vec<CigarOp>,
        sequence: impl Into<Arc<[u8]>>,
        is_reverse: bool,
    ) -> Self {
        Self {
            name: name.into(),
            chrom: chrom.into(),
            pos,
            cigar,
            sequence: sequence.into(),
            run_lengths: None,
            is_reverse,
        }
    }

    /// Attach per-base run lengths for a homopolymer-compressed read.
    pub fn with_run_lengths(mut self, run_lengths: impl Into<Arc<[u8]>>) -> Self {
        self.run_lengths = Some(run_lengths.into());
        self
    }

    /// Read length inferred from the sequence.
    pub fn len(&self) -> usize {
        self.sequence.len()
    }

    /// Whether the read carries no sequence.
    pub fn is_empty(&self) -> bool {
        self.sequence.is_empty()
    }

    /// Number of reference bases the alignment spans.
    pub fn reference_span(&self) -> u32 {
        self.cigar
            .iter()
            .filter(|op| op.kind.consumes_reference())
            .fold(0u32, |span, op| span.saturating_add(op.len))
    }

    /// Number of read bases the CIGAR accounts for (hard clips excluded).
    pub fn query_len(&self) -> usize {
        self.cigar
            .iter()
            .filter(|op| op.kind.consumes_query())
            .map(|op| op.len as usize)
            .sum()
    }

    /// End position (half-open) on the reference, saturating at `u32::MAX`.
    pub fn end(&self) -> u32 {
        self.pos.saturating_add(self.reference_span())
    }

    /// Whether the read's reference span intersects `[start, end)`.
    pub fn overlaps(&self, chrom: &str, start: u32, end: u32) -> bool {
        self.chrom.as_ref() == chrom && self.pos < end && self.end() > start
    }

    /// Base at the provided read offset.
    pub fn base_at(&self, offset: usize) -> Option<u8> {
        self.sequence.get(offset).copied()
    }

    /// Stored run length at the provided read offset, if the read is compressed.
    pub fn run_length_at(&self, offset: usize) -> Option<u8> {
        self.run_lengths
            .as_ref()
            .and_then(|runs| runs.get(offset).copied())
    }

    /// First operation the counters cannot handle, if any.
    pub fn unsupported_op(&self) -> Option<CigarOpKind> {
        self.cigar
            .iter()
            .map(|op| op.kind)
            .find(|kind| matches!(kind, CigarOpKind::RefSkip | CigarOpKind::Padding))
    }

    /// Whether the alignment ends with a single aligned base directly after an
    /// insertion (`...I 1M`, clips aside).
    ///
    /// Column-wise pileup walkers never report that final base.
    pub fn ends_with_insertion_then_base(&self) -> bool {
        let mut aligned = self
            .cigar
            .iter()
            .rev()
            .filter(|op| !matches!(op.kind, CigarOpKind::SoftClip | CigarOpKind::HardClip));
        matches!(
            (aligned.next(), aligned.next()),
            (
                Some(CigarOp { kind: CigarOpKind::Match, len: 1 }),
                Some(CigarOp { kind: CigarOpKind::Insertion, .. })
            )
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_string_reads_all_operations() {
        let ops = CigarOp::parse_string("3S5M2I1D4=1X2H").expect("valid cigar");
        assert_eq!(
            ops,
            vec![
                CigarOp::new(CigarOpKind::SoftClip, 3),
                CigarOp::new(CigarOpKind::Match, 5),
                CigarOp::new(CigarOpKind::Insertion, 2),
                CigarOp::new(CigarOpKind::Deletion, 1),
                CigarOp::new(CigarOpKind::Match, 4),
                CigarOp::new(CigarOpKind::Match, 1),
                CigarOp::new(CigarOpKind::HardClip, 2),
            ]
        );
        assert!(CigarOp::parse_string("*").unwrap().is_empty());
        assert!(matches!(
            CigarOp::parse_string("4Q"),
            Err(FeatureError::UnsupportedCigarOperation { op: 'Q', .. })
        ));
    }

    #[test]
    fn parse_string_rejects_missing_or_dangling_lengths() {
        for cigar in ["5M3", "M", "3M2", "4MI"] {
            assert!(
                matches!(
                    CigarOp::parse_string(cigar),
                    Err(FeatureError::MalformedCigar { .. })
                ),
                "{cigar} should be malformed"
            );
        }
        assert!(matches!(
            CigarOp::parse_string("99999999999M"),
            Err(FeatureError::MalformedCigar { .. })
        ));
        assert!(CigarOp::parse_string("").unwrap().is_empty());
    }

    #[test]
    fn end_saturates_near_the_coordinate_limit() {
        let read = AlignedRead::new(
            "edge",
            "chr1",
            u32::MAX - 2,
            CigarOp::parse_string("10M").unwrap(),
            b"ACGTACGTAC".to_vec(),
            false,
        );
        assert_eq!(read.end(), u32::MAX);
        assert!(read.overlaps("chr1", u32::MAX - 1, u32::MAX));

        let huge = AlignedRead::new(
            "huge",
            "chr1",
            0,
            vec![
                CigarOp::new(CigarOpKind::Deletion, u32::MAX),
                CigarOp::new(CigarOpKind::Deletion, u32::MAX),
            ],
            Vec::<u8>::new(),
            false,
        );
        assert_eq!(huge.reference_span(), u32::MAX);
    }

    #[test]
    fn end_follows_reference_consuming_ops() {
        let read = AlignedRead::new(
            "r1",
            "chr1",
            100,
            CigarOp::parse_string("2S4M2I3D1M").unwrap(),
            b"TTACGTGGA".to_vec(),
            false,
        );
        assert_eq!(read.reference_span(), 8);
        assert_eq!(read.end(), 108);
        assert!(read.overlaps("chr1", 107, 200));
        assert!(!read.overlaps("chr1", 108, 200));
        assert!(!read.overlaps("chr2", 100, 108));
    }

    #[test]
    fn detects_trailing_insertion_then_single_base() {
        let read = |cigar: &str| {
            AlignedRead::new("r", "chr1", 0, CigarOp::parse_string(cigar).unwrap(), b"".to_vec(), false)
        };
        assert!(read("5M2I1M").ends_with_insertion_then_base());
        assert!(read("5M2I1M4S").ends_with_insertion_then_base());
        assert!(!read("5M2I2M").ends_with_insertion_then_base());
        assert!(!read("5M1D1M").ends_with_insertion_then_base());
        assert!(!read("1M").ends_with_insertion_then_base());
    }
}
