//! # Pileup feature encoding
//!
//! Converts aligned sequencing reads covering a genomic region into dense
//! per-locus count matrices consumed by consensus and variant models.
//!
//! ## Pipeline
//!
//! 1. **Chunk splitting**: the requested region is cut into maximal
//!    sub-intervals with read coverage, so no chunk spans a coverage gap
//! 2. **Pileup counting**: every reference coordinate and every insertion
//!    sub-position inside a chunk receives one row of categorical counts
//!    keyed by data type, strand, base and homopolymer run length
//! 3. **Feature assembly**: counts are normalised, optionally log scaled,
//!    and extended with reference and depth columns
//!
//! Counting exists twice: an interpretive walker that serves as ground
//! truth and a two-pass optimized counter. They agree on every row except
//! the documented trailing-insertion case checked by
//! [`pileup::check_agreement`].
//!
//! ## Usage Example
//!
//! ```ignore
//! use pileup_features::{BamSource, EncoderConfig, FeatureEncoder, Implementation, Region};
//!
//! let encoder = FeatureEncoder::new(EncoderConfig::default())?;
//! let region: Region = "contig1:50000-100000".parse()?;
//! let samples = encoder.encode(&BamSource::new("reads.bam"), &region, None, Implementation::Optimized)?;
//! for sample in &samples {
//!     println!("{} rows for {}", sample.len(), sample.region());
//! }
//! ```

#![warn(missing_docs, missing_debug_implementations)]

pub mod features; // Encoding scheme, chunking, normalisation and orchestration
pub mod genomics; // Regions, alignment records and their sources
pub mod pileup; // Interpretive and optimized counting engines

// Re-exports for convenience
pub use features::{
    pileup_counts, split_covered, EncoderConfig, EncodingScheme, FeatureColumn, FeatureEncoder,
    Normalisation, RefMode, Sample, Symbol,
};
pub use genomics::{
    AlignedRead, AlignmentSource, BamSource, CigarOp, CigarOpKind, InMemorySource, Position,
    Reference, Region,
};
pub use pileup::{Implementation, PileupCounter, RawCounts};

use thiserror::Error;

/// Errors raised while splitting, counting or encoding a region.
///
/// None of these are retried: each is deterministic for a given input and
/// the chunk that raised it fails as a whole.
#[derive(Error, Debug)]
pub enum FeatureError {
    /// Region string did not follow `<name>:<start>-<end>`.
    #[error("malformed region '{0}': expected <name>:<start>-<end>")]
    MalformedRegion(String),

    /// Alignment record carries an operation the engines cannot count.
    #[error("unsupported CIGAR operation '{op}' in read {read}")]
    UnsupportedCigarOperation {
        /// Name of the offending read.
        read: String,
        /// SAM character of the operation.
        op: char,
    },

    /// CIGAR string is not a sequence of `<length><op>` pairs.
    #[error("malformed CIGAR '{cigar}': {reason}")]
    MalformedCigar {
        /// Offending CIGAR string.
        cigar: String,
        /// What is wrong with it.
        reason: String,
    },

    /// Observed base is outside the encoded alphabet.
    #[error("unknown symbol '{0}' outside the A/C/G/T/* alphabet")]
    UnknownSymbol(char),

    /// Counting was requested over an interval no record overlaps.
    #[error("no alignment records overlap {0}")]
    EmptyRegion(String),

    /// Encoder options failed validation.
    #[error("invalid encoder configuration: {0}")]
    InvalidConfiguration(String),

    /// A reference mode needs a reference sequence that was not supplied.
    #[error("a reference sequence is required to encode {0} with a ref_mode")]
    MissingReference(String),

    /// Supplied reference names a different contig than the region.
    #[error("reference '{reference}' does not match region contig '{region}'")]
    ReferenceMismatch {
        /// Contig named by the reference.
        reference: String,
        /// Contig named by the region.
        region: String,
    },

    /// Supplied reference does not span the whole region.
    #[error("reference {reference} does not cover {region}")]
    ReferenceOutOfRange {
        /// Interval held by the reference.
        reference: String,
        /// Interval that needed covering.
        region: String,
    },

    /// Interpretive and optimized counts differ outside the known exception.
    #[error("counting implementations disagree at {0}")]
    ImplementationDisagreement(Position),

    /// Positions and feature rows are inconsistent.
    #[error("invalid sample: {0}")]
    InvalidSample(String),

    /// Failure reported by htslib while reading BAM or FASTA input.
    #[error("htslib error: {0}")]
    Htslib(#[from] rust_htslib::errors::Error),
}
