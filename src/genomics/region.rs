use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use crate::FeatureError;

/// Half-open interval `[start, end)` on a named reference sequence.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Region {
    name: Arc<str>,
    start: u32,
    end: u32,
}

impl Region {
    /// Construct a region, rejecting `end < start`.
    pub fn new(name: impl Into<Arc<str>>, start: u32, end: u32) -> Result<Self, FeatureError> {
        let name = name.into();
        if end < start {
            return Err(FeatureError::MalformedRegion(format!("{name}:{start}-{end}")));
        }
        Ok(Self { name, start, end })
    }

    /// Reference sequence name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Shared handle to the reference sequence name.
    pub fn name_arc(&self) -> &Arc<str> {
        &self.name
    }

    /// Inclusive 0-based start.
    pub fn start(&self) -> u32 {
        self.start
    }

    /// Exclusive 0-based end.
    pub fn end(&self) -> u32 {
        self.end
    }

    /// Number of reference coordinates covered.
    pub fn len(&self) -> usize {
        (self.end - self.start) as usize
    }

    /// Whether the region covers no coordinates.
    pub fn is_empty(&self) -> bool {
        self.end == self.start
    }

    /// Whether `coordinate` lies in `[start, end)`.
    pub fn contains_coordinate(&self, coordinate: u32) -> bool {
        self.start <= coordinate && coordinate < self.end
    }

    /// Whether `other` lies entirely within this region.
    pub fn contains(&self, other: &Region) -> bool {
        self.name == other.name && self.start <= other.start && other.end <= self.end
    }

    /// Whether the two regions share at least one coordinate.
    pub fn overlaps(&self, other: &Region) -> bool {
        self.name == other.name && self.start < other.end && other.start < self.end
    }

    /// Sub-interval shared with `[start, end)` on the same contig, if non-empty.
    pub fn intersect(&self, start: u32, end: u32) -> Option<Region> {
        let start = self.start.max(start);
        let end = self.end.min(end);
        (start < end).then(|| Region {
            name: Arc::clone(&self.name),
            start,
            end,
        })
    }
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}-{}", self.name, self.start, self.end)
    }
}

impl FromStr for Region {
    type Err = FeatureError;

    /// Parse `"<name>:<start>-<end>"`; the name may itself contain `:`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let malformed = || FeatureError::MalformedRegion(s.to_string());
        let (name, bounds) = s.rsplit_once(':').ok_or_else(malformed)?;
        let (start, end) = bounds.split_once('-').ok_or_else(malformed)?;
        if name.is_empty() {
            return Err(malformed());
        }
        let start: u32 = start.trim().parse().map_err(|_| malformed())?;
        let end: u32 = end.trim().parse().map_err(|_| malformed())?;
        if end < start {
            return Err(malformed());
        }
        Ok(Self {
            name: Arc::from(name),
            start,
            end,
        })
    }
}

/// Pileup row coordinate: a reference coordinate plus an insertion offset.
///
/// Offset 0 is the reference-anchored column; offset `k > 0` is the k-th
/// inserted column after the coordinate. Ordering is by coordinate, then
/// offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Position {
    /// 0-based reference coordinate.
    pub coordinate: u32,
    /// Insertion sub-position following the coordinate.
    pub insertion_offset: u32,
}

impl Position {
    /// Construct a position.
    pub fn new(coordinate: u32, insertion_offset: u32) -> Self {
        Self {
            coordinate,
            insertion_offset,
        }
    }

    /// Whether this row is anchored to a reference base.
    pub fn is_reference_anchored(&self) -> bool {
        self.insertion_offset == 0
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.coordinate, self.insertion_offset)
    }
}

/// Whether `positions` is strictly increasing.
pub fn is_strictly_increasing(positions: &[Position]) -> bool {
    positions.windows(2).all(|pair| pair[0] < pair[1])
}
