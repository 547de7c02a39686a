//! Encoder configuration
//!
//! Options are fixed once a [`FeatureEncoder`](super::FeatureEncoder) is
//! built: the same configuration always yields the same column catalogue.

use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use crate::FeatureError;

/// Row normalisation applied to raw read counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Normalisation {
    /// Divide each row by its own total; all-zero rows stay zero.
    Total,
    /// Scale forward-strand and reverse-strand columns by their own strand totals.
    FwdRev,
}

impl fmt::Display for Normalisation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Total => write!(f, "total"),
            Self::FwdRev => write!(f, "fwd_rev"),
        }
    }
}

impl FromStr for Normalisation {
    type Err = FeatureError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "total" => Ok(Self::Total),
            "fwd_rev" | "fwd-rev" => Ok(Self::FwdRev),
            other => Err(FeatureError::InvalidConfiguration(format!(
                "unknown normalisation '{other}' (expected total or fwd_rev)"
            ))),
        }
    }
}

/// How a reference (or consensus) base is folded into the features.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum RefMode {
    /// One column per reference symbol and run length, plus the gap.
    OneHot,
    /// Two columns: base code (gap 0, A 1, C 2, G 3, T 4) and run length.
    BaseLength,
    /// One column holding the catalogue index of the matching forward read column.
    Index,
}

impl fmt::Display for RefMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::OneHot => write!(f, "onehot"),
            Self::BaseLength => write!(f, "base_length"),
            Self::Index => write!(f, "index"),
        }
    }
}

impl FromStr for RefMode {
    type Err = FeatureError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "onehot" => Ok(Self::OneHot),
            "base_length" => Ok(Self::BaseLength),
            "index" => Ok(Self::Index),
            other => Err(FeatureError::InvalidConfiguration(format!(
                "unknown ref_mode '{other}' (expected onehot, base_length or index)"
            ))),
        }
    }
}

/// Configuration parameters for feature encoding.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct EncoderConfig {
    /// Row normalisation; `None` keeps raw counts.
    pub normalise: Option<Normalisation>,

    /// Longest tracked homopolymer run; longer runs saturate.
    pub max_hp_len: u8,

    /// Reads are homopolymer compressed and carry per-base run lengths.
    pub is_compressed: bool,

    /// Reference signal appended after the read columns.
    pub ref_mode: Option<RefMode>,

    /// Derive the reference signal from the majority observation per row.
    pub consensus_as_ref: bool,

    /// Take `log10` of read features, flooring at this exponent.
    pub log_min: Option<i32>,

    /// Append the raw total depth of each row as a final column.
    pub with_depth: bool,

    /// Read-name prefixes counted as separate data types.
    pub data_types: Vec<String>,

    /// Keep roughly this fraction of reads, chosen by a hash of the read name.
    pub read_fraction: Option<f64>,

    /// Count chunks on the rayon thread pool.
    pub parallel: bool,
}

impl Default for EncoderConfig {
    fn default() -> Self {
        Self {
            normalise: Some(Normalisation::Total),
            max_hp_len: 1,
            is_compressed: false,
            ref_mode: None,
            consensus_as_ref: false,
            log_min: None,
            with_depth: false,
            data_types: vec![String::new()],
            read_fraction: None,
            parallel: true,
        }
    }
}

impl EncoderConfig {
    /// Raw counts: no normalisation, everything else default.
    pub fn raw_counts() -> Self {
        Self::default().with_normalise(None)
    }

    /// Set row normalisation.
    pub fn with_normalise(mut self, normalise: Option<Normalisation>) -> Self {
        self.normalise = normalise;
        self
    }

    /// Set the homopolymer cap.
    pub fn with_max_hp_len(mut self, max_hp_len: u8) -> Self {
        self.max_hp_len = max_hp_len;
        self
    }

    /// Treat reads as homopolymer compressed.
    pub fn with_compression(mut self, is_compressed: bool) -> Self {
        self.is_compressed = is_compressed;
        self
    }

    /// Set the reference signal mode.
    pub fn with_ref_mode(mut self, ref_mode: Option<RefMode>) -> Self {
        self.ref_mode = ref_mode;
        self
    }

    /// Use the per-row majority observation instead of a supplied reference.
    pub fn with_consensus_as_ref(mut self, enabled: bool) -> Self {
        self.consensus_as_ref = enabled;
        self
    }

    /// Enable the floored log transform.
    pub fn with_log_min(mut self, log_min: Option<i32>) -> Self {
        self.log_min = log_min;
        self
    }

    /// Append the depth column.
    pub fn with_depth(mut self, enabled: bool) -> Self {
        self.with_depth = enabled;
        self
    }

    /// Set the read-name prefixes defining data types.
    pub fn with_data_types<I, S>(mut self, data_types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.data_types = data_types.into_iter().map(Into::into).collect();
        self
    }

    /// Subsample reads; the same read is always kept or always dropped.
    pub fn with_read_fraction(mut self, read_fraction: Option<f64>) -> Self {
        self.read_fraction = read_fraction;
        self
    }

    /// Enable or disable parallel chunk counting.
    pub fn with_parallel(mut self, enabled: bool) -> Self {
        self.parallel = enabled;
        self
    }

    /// Check option combinations.
    pub fn validate(&self) -> Result<(), FeatureError> {
        if self.max_hp_len == 0 {
            return Err(FeatureError::InvalidConfiguration(
                "max_hp_len must be >= 1".to_string(),
            ));
        }
        if self.data_types.is_empty() {
            return Err(FeatureError::InvalidConfiguration(
                "at least one data type is required".to_string(),
            ));
        }
        let mut seen = HashSet::new();
        if let Some(dup) = self.data_types.iter().find(|dt| !seen.insert(dt.as_str())) {
            return Err(FeatureError::InvalidConfiguration(format!(
                "duplicate data type '{dup}'"
            )));
        }
        if let Some(fraction) = self.read_fraction {
            if !(fraction > 0.0 && fraction <= 1.0) {
                return Err(FeatureError::InvalidConfiguration(format!(
                    "read_fraction must lie in (0, 1], got {fraction}"
                )));
            }
        }
        if self.consensus_as_ref && self.ref_mode.is_none() {
            return Err(FeatureError::InvalidConfiguration(
                "consensus_as_ref requires a ref_mode".to_string(),
            ));
        }
        Ok(())
    }
}
