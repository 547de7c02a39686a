use std::path::Path;
use std::sync::Arc;

use rust_htslib::faidx;

use crate::genomics::Region;
use crate::FeatureError;

/// Reference sequence window used for reference-derived feature columns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reference {
    name: Arc<str>,
    start: u32,
    sequence: Arc<[u8]>,
}

impl Reference {
    /// Wrap a sequence whose first base sits at `start` on contig `name`.
    pub fn new(name: impl Into<Arc<str>>, start: u32, sequence: impl Into<Arc<[u8]>>) -> Self {
        Self {
            name: name.into(),
            start,
            sequence: sequence.into(),
        }
    }

    /// Load the bases of `region` from an indexed FASTA file.
    pub fn from_fasta<P: AsRef<Path>>(path: P, region: &Region) -> Result<Self, FeatureError> {
        if region.is_empty() {
            return Ok(Self::new(Arc::clone(region.name_arc()), region.start(), Vec::new()));
        }
        let reader = faidx::Reader::from_path(path.as_ref())?;
        // faidx end coordinates are inclusive
        let bases = reader.fetch_seq_string(
            region.name(),
            region.start() as usize,
            region.end() as usize - 1,
        )?;
        Ok(Self::new(
            Arc::clone(region.name_arc()),
            region.start(),
            bases.to_ascii_uppercase().into_bytes(),
        ))
    }

    /// Contig name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Coordinate of the first stored base.
    pub fn start(&self) -> u32 {
        self.start
    }

    /// Coordinate one past the last stored base.
    pub fn end(&self) -> u32 {
        self.start + self.sequence.len() as u32
    }

    /// Stored bases.
    pub fn sequence(&self) -> &[u8] {
        &self.sequence
    }

    /// Base at a reference coordinate.
    pub fn base_at(&self, coordinate: u32) -> Option<u8> {
        coordinate
            .checked_sub(self.start)
            .and_then(|offset| self.sequence.get(offset as usize).copied())
    }

    /// Check that the reference names the region's contig and spans it.
    pub fn ensure_covers(&self, region: &Region) -> Result<(), FeatureError> {
        if self.name() != region.name() {
            return Err(FeatureError::ReferenceMismatch {
                reference: self.name().to_string(),
                region: region.name().to_string(),
            });
        }
        if region.start() < self.start || region.end() > self.end() {
            return Err(FeatureError::ReferenceOutOfRange {
                reference: format!("{}:{}-{}", self.name, self.start, self.end()),
                region: region.to_string(),
            });
        }
        Ok(())
    }

    /// Length of the homopolymer run containing `coordinate`, capped at `cap`.
    ///
    /// Runs are measured within the stored window only.
    pub fn homopolymer_run(&self, coordinate: u32, cap: u8) -> u8 {
        let Some(offset) = coordinate.checked_sub(self.start).map(|o| o as usize) else {
            return 0;
        };
        let Some(&base) = self.sequence.get(offset) else {
            return 0;
        };
        let base = base.to_ascii_uppercase();
        let left = self.sequence[..offset]
            .iter()
            .rev()
            .take_while(|b| b.to_ascii_uppercase() == base)
            .count();
        let right = self.sequence[offset + 1..]
            .iter()
            .take_while(|b| b.to_ascii_uppercase() == base)
            .count();
        (left + right + 1).min(cap as usize) as u8
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_lookup_is_offset_by_start() {
        let reference = Reference::new("chr1", 100, b"ACGTT".to_vec());
        assert_eq!(reference.base_at(100), Some(b'A'));
        assert_eq!(reference.base_at(104), Some(b'T'));
        assert_eq!(reference.base_at(99), None);
        assert_eq!(reference.base_at(105), None);
        assert_eq!(reference.end(), 105);
    }

    #[test]
    fn homopolymer_run_spans_both_directions() {
        let reference = Reference::new("chr1", 0, b"ACCCCGT".to_vec());
        assert_eq!(reference.homopolymer_run(0, 10), 1);
        assert_eq!(reference.homopolymer_run(3, 10), 4);
        assert_eq!(reference.homopolymer_run(3, 2), 2);
        assert_eq!(reference.homopolymer_run(9, 10), 0);
    }

    #[test]
    fn coverage_checks_contig_and_bounds() {
        let reference = Reference::new("chr1", 10, vec![b'A'; 20]);
        assert!(reference.ensure_covers(&Region::new("chr1", 10, 30).unwrap()).is_ok());
        assert!(matches!(
            reference.ensure_covers(&Region::new("chr2", 10, 30).unwrap()),
            Err(FeatureError::ReferenceMismatch { .. })
        ));
        assert!(matches!(
            reference.ensure_covers(&Region::new("chr1", 5, 30).unwrap()),
            Err(FeatureError::ReferenceOutOfRange { .. })
        ));
    }
}
