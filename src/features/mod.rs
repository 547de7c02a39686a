//! Feature encoding: column catalogue, chunking, normalisation and the
//! [`FeatureEncoder`] that ties them to the counting engines.

mod chunks;
mod config;
mod encoder;
mod encoding;
mod normalise;
mod sample;

pub use chunks::split_covered;
pub use config::{EncoderConfig, Normalisation, RefMode};
pub use encoder::{pileup_counts, FeatureEncoder};
pub use encoding::{EncodingScheme, FeatureColumn, Symbol};
pub use normalise::{apply_log_floor, normalise_counts};
pub use sample::Sample;
