use ndarray::{s, Array2, ArrayView1};
use rayon::prelude::*;
use tracing::{debug, info, warn};

use crate::features::normalise::{apply_log_floor, normalise_counts};
use crate::features::{split_covered, EncoderConfig, EncodingScheme, RefMode, Sample, Symbol};
use crate::genomics::{AlignedRead, AlignmentSource, Reference, Region};
use crate::pileup::{Implementation, RawCounts};
use crate::FeatureError;

/// Turns the reads covering a region into per-chunk feature matrices.
///
/// Holds a validated [`EncoderConfig`] and the [`EncodingScheme`] derived
/// from it. Neither changes after construction, so one encoder can serve
/// any number of concurrent `encode` calls.
#[derive(Debug, Clone)]
pub struct FeatureEncoder {
    config: EncoderConfig,
    scheme: EncodingScheme,
}

impl FeatureEncoder {
    /// Validate `config` and build its column catalogue.
    pub fn new(config: EncoderConfig) -> Result<Self, FeatureError> {
        let scheme = EncodingScheme::new(&config)?;
        Ok(Self { config, scheme })
    }

    /// Configuration in use.
    pub fn config(&self) -> &EncoderConfig {
        &self.config
    }

    /// Column catalogue shared by every sample this encoder produces.
    pub fn scheme(&self) -> &EncodingScheme {
        &self.scheme
    }

    /// Encode `region` into one [`Sample`] per covered chunk, in coordinate order.
    ///
    /// A region without covering reads yields no samples. Any chunk failure
    /// fails the whole call.
    pub fn encode<S: AlignmentSource + ?Sized>(
        &self,
        source: &S,
        region: &Region,
        reference: Option<&Reference>,
        implementation: Implementation,
    ) -> Result<Vec<Sample>, FeatureError> {
        let reference = self.checked_reference(region, reference)?;
        let (records, chunks) = self.prepare(source, region)?;
        info!(
            region = %region,
            reads = records.len(),
            chunks = chunks.len(),
            %implementation,
            "encoding region"
        );

        let encode_chunk = |chunk: &Region| -> Result<Sample, FeatureError> {
            let counts = implementation.count(&records, chunk, &self.scheme)?;
            debug!(chunk = %chunk, rows = counts.len(), "counted chunk");
            self.assemble(counts, reference)
        };
        if self.config.parallel {
            chunks.par_iter().map(encode_chunk).collect()
        } else {
            chunks.iter().map(encode_chunk).collect()
        }
    }

    /// Raw per-chunk counts for `region`, without normalisation or extra columns.
    pub fn pileup_counts<S: AlignmentSource + ?Sized>(
        &self,
        source: &S,
        region: &Region,
        implementation: Implementation,
    ) -> Result<Vec<RawCounts>, FeatureError> {
        let (records, chunks) = self.prepare(source, region)?;
        let count_chunk = |chunk: &Region| implementation.count(&records, chunk, &self.scheme);
        if self.config.parallel {
            chunks.par_iter().map(count_chunk).collect()
        } else {
            chunks.iter().map(count_chunk).collect()
        }
    }

    /// The reference the configuration needs, checked against `region`.
    fn checked_reference<'r>(
        &self,
        region: &Region,
        reference: Option<&'r Reference>,
    ) -> Result<Option<&'r Reference>, FeatureError> {
        if self.config.ref_mode.is_none() || self.config.consensus_as_ref {
            return Ok(None);
        }
        let reference =
            reference.ok_or_else(|| FeatureError::MissingReference(region.to_string()))?;
        reference.ensure_covers(region)?;
        Ok(Some(reference))
    }

    /// Fetch the records that can be counted and split the region on them.
    fn prepare<S: AlignmentSource + ?Sized>(
        &self,
        source: &S,
        region: &Region,
    ) -> Result<(Vec<AlignedRead>, Vec<Region>), FeatureError> {
        let mut records = source.fetch(region)?;
        let fetched = records.len();
        records.retain(|read| {
            if read.chrom.as_ref() != region.name() || self.scheme.data_type_for(&read.name).is_none() {
                return false;
            }
            if read.len() != read.query_len() {
                warn!(
                    read = %read.name,
                    sequence = read.len(),
                    cigar = read.query_len(),
                    "sequence length disagrees with CIGAR, skipping read"
                );
                return false;
            }
            true
        });
        if let Some(fraction) = self.config.read_fraction.filter(|&f| f < 1.0) {
            records.retain(|read| in_subsample(&read.name, fraction));
        }
        debug!(region = %region, fetched, kept = records.len(), "fetched records");

        let chunks = split_covered(&records, region);
        Ok((records, chunks))
    }

    fn assemble(
        &self,
        counts: RawCounts,
        reference: Option<&Reference>,
    ) -> Result<Sample, FeatureError> {
        let (chunk, positions, counts) = counts.into_parts();
        let scheme = &self.scheme;
        let read_width = scheme.read_width();
        let mut features = Array2::<f32>::zeros((positions.len(), scheme.width()));

        let normalised = normalise_counts(&counts, scheme, self.config.normalise);
        features.slice_mut(s![.., ..read_width]).assign(&normalised);
        if let Some(log_min) = self.config.log_min {
            apply_log_floor(features.slice_mut(s![.., ..read_width]), log_min);
        }

        if let Some(mode) = scheme.ref_mode() {
            for (row, position) in positions.iter().enumerate() {
                let (symbol, run_length) = if !position.is_reference_anchored() {
                    (Symbol::Gap, 1)
                } else if self.config.consensus_as_ref {
                    self.consensus(counts.row(row))
                } else {
                    let reference = reference
                        .ok_or_else(|| FeatureError::MissingReference(chunk.to_string()))?;
                    reference_symbol(reference, position.coordinate, scheme.max_hp_len())
                };
                let columns = scheme.reference_columns();
                match mode {
                    RefMode::OneHot => {
                        features[[row, scheme.reference_onehot_index(symbol, run_length)]] = 1.0;
                    }
                    RefMode::BaseLength => {
                        features[[row, columns.start]] = f32::from(symbol.code());
                        features[[row, columns.start + 1]] = f32::from(run_length);
                    }
                    RefMode::Index => {
                        features[[row, columns.start]] =
                            scheme.column_index(0, false, symbol, run_length) as f32;
                    }
                }
            }
        }

        if let Some(depth_column) = scheme.depth_column() {
            for (row, depth) in counts.rows().into_iter().enumerate() {
                features[[row, depth_column]] = depth.sum() as f32;
            }
        }

        Sample::new(chunk, positions, features)
    }

    /// Majority `(symbol, run length)` of a row, strands and data types pooled.
    ///
    /// Ties go to the earliest catalogue column; empty rows give the gap.
    fn consensus(&self, row: ArrayView1<'_, u32>) -> (Symbol, u8) {
        let scheme = &self.scheme;
        let strand_width = scheme.strand_width();
        let mut pooled = vec![0u64; strand_width];
        for (column, &count) in row.iter().enumerate() {
            pooled[column % strand_width] += u64::from(count);
        }

        let mut best = strand_width - 1;
        let mut best_count = 0u64;
        for (offset, &count) in pooled.iter().enumerate() {
            if count > best_count {
                best = offset;
                best_count = count;
            }
        }
        if best_count == 0 || best == strand_width - 1 {
            return (Symbol::Gap, 1);
        }
        let max_hp_len = scheme.max_hp_len() as usize;
        (
            Symbol::BASES[best / max_hp_len],
            (best % max_hp_len + 1) as u8,
        )
    }
}

/// Whether a read belongs to a `fraction` subsample, decided by its name alone.
fn in_subsample(name: &str, fraction: f64) -> bool {
    let digest = blake3::hash(name.as_bytes());
    let mut prefix = [0u8; 8];
    prefix.copy_from_slice(&digest.as_bytes()[..8]);
    (u64::from_le_bytes(prefix) as f64) < fraction * u64::MAX as f64
}

/// Reference symbol and run length at a coordinate; bases outside the
/// alphabet (such as `N`) read as the gap.
fn reference_symbol(reference: &Reference, coordinate: u32, cap: u8) -> (Symbol, u8) {
    match reference.base_at(coordinate).map(Symbol::from_base) {
        Some(Ok(symbol)) if !symbol.is_gap() => {
            (symbol, reference.homopolymer_run(coordinate, cap).max(1))
        }
        _ => (Symbol::Gap, 1),
    }
}

/// Raw counts for `region` under the default configuration.
pub fn pileup_counts<S: AlignmentSource + ?Sized>(
    source: &S,
    region: &Region,
    implementation: Implementation,
) -> Result<Vec<RawCounts>, FeatureError> {
    FeatureEncoder::new(EncoderConfig::default())?.pileup_counts(source, region, implementation)
}
