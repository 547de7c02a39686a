//! Genomic primitives shared by the counting engines and the encoder.
//!
//! Regions and pileup positions, alignment records with their CIGAR
//! decomposition, and the sources that supply reads and reference bases.

mod io;
mod reference;
mod region;
mod types;

pub use io::{create_bam_writer, write_indexed_bam, AlignmentSource, BamSource, InMemorySource};
pub use reference::Reference;
pub use region::{is_strictly_increasing, Position, Region};
pub use types::{AlignedRead, CigarOp, CigarOpKind};
