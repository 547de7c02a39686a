use std::fmt;
use std::ops::Range;
use std::sync::Arc;

use crate::features::{EncoderConfig, RefMode};
use crate::FeatureError;

/// Symbols a pileup column can observe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Symbol {
    /// Adenine.
    A,
    /// Cytosine.
    C,
    /// Guanine.
    G,
    /// Thymine.
    T,
    /// Deletion, or padding for a read without an inserted base here.
    Gap,
}

impl Symbol {
    /// Bases in catalogue order.
    pub const BASES: [Symbol; 4] = [Symbol::A, Symbol::C, Symbol::G, Symbol::T];

    /// Decode an ASCII base; `*` is the gap.
    pub fn from_base(base: u8) -> Result<Self, FeatureError> {
        match base {
            b'A' | b'a' => Ok(Self::A),
            b'C' | b'c' => Ok(Self::C),
            b'G' | b'g' => Ok(Self::G),
            b'T' | b't' => Ok(Self::T),
            b'*' => Ok(Self::Gap),
            other => Err(FeatureError::UnknownSymbol(other as char)),
        }
    }

    /// Character used in column labels.
    pub fn as_char(self) -> char {
        match self {
            Self::A => 'A',
            Self::C => 'C',
            Self::G => 'G',
            Self::T => 'T',
            Self::Gap => '*',
        }
    }

    /// Whether this is the gap symbol.
    pub fn is_gap(self) -> bool {
        self == Self::Gap
    }

    /// Numeric code used by [`RefMode::BaseLength`]: gap 0, A 1, C 2, G 3, T 4.
    pub fn code(self) -> u8 {
        match self {
            Self::Gap => 0,
            Self::A => 1,
            Self::C => 2,
            Self::G => 3,
            Self::T => 4,
        }
    }

    fn offset(self) -> usize {
        match self {
            Self::A => 0,
            Self::C => 1,
            Self::G => 2,
            Self::T => 3,
            Self::Gap => 4,
        }
    }
}

/// One column of the feature catalogue.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum FeatureColumn {
    /// Count of reads of a data type showing `symbol` on a strand.
    Read {
        /// Read-name prefix of the data type.
        data_type: Arc<str>,
        /// Whether the reads are reverse-strand.
        is_reverse: bool,
        /// Observed symbol.
        symbol: Symbol,
        /// Homopolymer run-length bucket (always 1 for the gap).
        run_length: u8,
    },
    /// One-hot reference indicator.
    Reference {
        /// Reference symbol.
        symbol: Symbol,
        /// Reference run-length bucket.
        run_length: u8,
    },
    /// Reference base code.
    ReferenceBase,
    /// Reference run length.
    ReferenceLength,
    /// Catalogue index of the reference symbol's forward read column.
    ReferenceIndex,
    /// Raw total depth before normalisation.
    Depth,
}

impl FeatureColumn {
    /// Whether this column counts reads.
    pub fn is_read(&self) -> bool {
        matches!(self, Self::Read { .. })
    }
}

impl fmt::Display for FeatureColumn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Read {
                data_type,
                is_reverse,
                symbol,
                run_length,
            } => write!(
                f,
                "read:{}:{}:{}:{}",
                data_type,
                if *is_reverse { "rev" } else { "fwd" },
                symbol.as_char(),
                run_length
            ),
            Self::Reference { symbol, run_length } => {
                write!(f, "ref:{}:{}", symbol.as_char(), run_length)
            }
            Self::ReferenceBase => write!(f, "ref:base"),
            Self::ReferenceLength => write!(f, "ref:length"),
            Self::ReferenceIndex => write!(f, "ref:index"),
            Self::Depth => write!(f, "depth"),
        }
    }
}

/// Ordered catalogue of feature columns for one configuration.
///
/// Layout, for each data type and each strand (reverse first): the four
/// bases at run lengths `1..=max_hp_len`, then the gap. Reference columns
/// and the depth column follow the read columns. Read columns are
/// addressed arithmetically, so lookups never hash.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodingScheme {
    columns: Vec<FeatureColumn>,
    data_types: Vec<Arc<str>>,
    max_hp_len: u8,
    is_compressed: bool,
    ref_mode: Option<RefMode>,
    with_depth: bool,
}

impl EncodingScheme {
    /// Build the catalogue for a configuration.
    pub fn new(config: &EncoderConfig) -> Result<Self, FeatureError> {
        config.validate()?;
        let data_types: Vec<Arc<str>> = config
            .data_types
            .iter()
            .map(|dt| Arc::from(dt.as_str()))
            .collect();
        let max_hp_len = config.max_hp_len;

        let mut columns = Vec::new();
        for data_type in &data_types {
            for is_reverse in [true, false] {
                for symbol in Symbol::BASES {
                    for run_length in 1..=max_hp_len {
                        columns.push(FeatureColumn::Read {
                            data_type: Arc::clone(data_type),
                            is_reverse,
                            symbol,
                            run_length,
                        });
                    }
                }
                // gaps are not run-length encoded
                columns.push(FeatureColumn::Read {
                    data_type: Arc::clone(data_type),
                    is_reverse,
                    symbol: Symbol::Gap,
                    run_length: 1,
                });
            }
        }

        match config.ref_mode {
            Some(RefMode::OneHot) => {
                for symbol in Symbol::BASES {
                    for run_length in 1..=max_hp_len {
                        columns.push(FeatureColumn::Reference { symbol, run_length });
                    }
                }
                columns.push(FeatureColumn::Reference {
                    symbol: Symbol::Gap,
                    run_length: 1,
                });
            }
            Some(RefMode::BaseLength) => {
                columns.push(FeatureColumn::ReferenceBase);
                columns.push(FeatureColumn::ReferenceLength);
            }
            Some(RefMode::Index) => columns.push(FeatureColumn::ReferenceIndex),
            None => {}
        }

        if config.with_depth {
            columns.push(FeatureColumn::Depth);
        }

        Ok(Self {
            columns,
            data_types,
            max_hp_len,
            is_compressed: config.is_compressed,
            ref_mode: config.ref_mode,
            with_depth: config.with_depth,
        })
    }

    /// All columns in order.
    pub fn columns(&self) -> &[FeatureColumn] {
        &self.columns
    }

    /// Total number of columns of every feature matrix.
    pub fn width(&self) -> usize {
        self.columns.len()
    }

    /// Number of leading read-count columns.
    pub fn read_width(&self) -> usize {
        self.data_types.len() * 2 * self.strand_width()
    }

    /// Columns per data type and strand.
    pub fn strand_width(&self) -> usize {
        4 * self.max_hp_len as usize + 1
    }

    /// Homopolymer cap.
    pub fn max_hp_len(&self) -> u8 {
        self.max_hp_len
    }

    /// Whether reads carry run-length annotations.
    pub fn is_compressed(&self) -> bool {
        self.is_compressed
    }

    /// Reference signal mode.
    pub fn ref_mode(&self) -> Option<RefMode> {
        self.ref_mode
    }

    /// Data type prefixes in catalogue order.
    pub fn data_types(&self) -> &[Arc<str>] {
        &self.data_types
    }

    /// Data type a read is counted under: the first prefix its name matches.
    pub fn data_type_for(&self, read_name: &str) -> Option<usize> {
        self.data_types
            .iter()
            .position(|prefix| read_name.starts_with(prefix.as_ref()))
    }

    /// Clamp a run length into `[1, max_hp_len]`.
    pub fn saturate(&self, run_length: u8) -> u8 {
        run_length.clamp(1, self.max_hp_len)
    }

    /// Read column for an already decoded observation.
    pub fn column_index(
        &self,
        data_type: usize,
        is_reverse: bool,
        symbol: Symbol,
        run_length: u8,
    ) -> usize {
        let strand_width = self.strand_width();
        let base = data_type * 2 * strand_width + if is_reverse { 0 } else { strand_width };
        base + self.symbol_offset(symbol, run_length)
    }

    /// Read column for an ASCII base, saturating the run length.
    pub fn lookup(
        &self,
        data_type: usize,
        is_reverse: bool,
        base: u8,
        run_length: u8,
    ) -> Result<usize, FeatureError> {
        let symbol = Symbol::from_base(base)?;
        Ok(self.column_index(data_type, is_reverse, symbol, run_length))
    }

    /// Gap column of a data type and strand.
    pub fn gap_index(&self, data_type: usize, is_reverse: bool) -> usize {
        self.column_index(data_type, is_reverse, Symbol::Gap, 1)
    }

    /// Read columns (any data type) belonging to one strand.
    pub fn strand_columns(&self, is_reverse: bool) -> Vec<usize> {
        let strand_width = self.strand_width();
        (0..self.data_types.len())
            .flat_map(|dt| {
                let start = self.column_index(dt, is_reverse, Symbol::A, 1);
                start..start + strand_width
            })
            .collect()
    }

    /// Span of the reference columns (empty without a ref mode).
    pub fn reference_columns(&self) -> Range<usize> {
        let start = self.read_width();
        let len = match self.ref_mode {
            Some(RefMode::OneHot) => self.strand_width(),
            Some(RefMode::BaseLength) => 2,
            Some(RefMode::Index) => 1,
            None => 0,
        };
        start..start + len
    }

    /// One-hot reference column for a symbol.
    pub fn reference_onehot_index(&self, symbol: Symbol, run_length: u8) -> usize {
        self.reference_columns().start + self.symbol_offset(symbol, run_length)
    }

    /// Index of the depth column, if present.
    pub fn depth_column(&self) -> Option<usize> {
        self.with_depth.then(|| self.columns.len() - 1)
    }

    /// Canonical text form of the catalogue, one column label per line.
    pub fn canonical_bytes(&self) -> Vec<u8> {
        let mut out = String::new();
        for column in &self.columns {
            out.push_str(&column.to_string());
            out.push('\n');
        }
        out.into_bytes()
    }

    /// Digest of the canonical form; equal configurations give equal digests.
    pub fn digest(&self) -> blake3::Hash {
        blake3::hash(&self.canonical_bytes())
    }

    fn symbol_offset(&self, symbol: Symbol, run_length: u8) -> usize {
        match symbol {
            Symbol::Gap => 4 * self.max_hp_len as usize,
            base => base.offset() * self.max_hp_len as usize + (self.saturate(run_length) - 1) as usize,
        }
    }
}
