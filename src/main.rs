use std::io::{self, BufWriter, Write};
use std::path::PathBuf;

use anyhow::{anyhow, Context, Result};
use clap::{Args, Parser, Subcommand};
use pileup_features::{
    BamSource, EncoderConfig, FeatureEncoder, Implementation, Normalisation, Position, RefMode,
    Reference, Region, Sample,
};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "pileup-features", about = "Pileup counts and features from an indexed BAM")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Encode a region into normalised feature matrices, one TSV block per covered chunk.
    Features {
        #[command(flatten)]
        input: InputArgs,
        /// Indexed FASTA supplying the reference signal.
        #[arg(long)]
        reference: Option<PathBuf>,
        /// Row normalisation: total, fwd_rev or none.
        #[arg(long, default_value = "total")]
        normalise: String,
        /// Append a reference signal: onehot, base_length or index.
        #[arg(long)]
        ref_mode: Option<String>,
        /// Derive the reference signal from the per-row majority.
        #[arg(long)]
        consensus_as_ref: bool,
        /// Log-transform read features, flooring at this exponent.
        #[arg(long, allow_hyphen_values = true)]
        log_min: Option<i32>,
        /// Append the raw depth column.
        #[arg(long)]
        with_depth: bool,
    },
    /// Print raw pileup counts per covered chunk.
    Counts {
        #[command(flatten)]
        input: InputArgs,
    },
}

#[derive(Args, Debug)]
struct InputArgs {
    /// Coordinate-sorted, indexed BAM.
    bam: PathBuf,
    /// Region as `<name>:<start>-<end>`, 0-based half-open.
    region: String,
    /// Longest tracked homopolymer run.
    #[arg(long, default_value_t = 1)]
    max_hp_len: u8,
    /// Reads are homopolymer compressed.
    #[arg(long)]
    compressed: bool,
    /// Two-letter BAM tag carrying per-base run lengths of compressed reads.
    #[arg(long)]
    run_length_tag: Option<String>,
    /// Read-name prefixes counted as separate data types.
    #[arg(long = "data-type", value_delimiter = ',')]
    data_types: Vec<String>,
    /// Counting engine: reference, optimized or checked.
    #[arg(long, default_value = "optimized")]
    implementation: String,
    /// Keep this fraction of reads, chosen deterministically by read name.
    #[arg(long)]
    read_fraction: Option<f64>,
    /// Count chunks one after another.
    #[arg(long)]
    sequential: bool,
}

impl InputArgs {
    fn config(&self) -> EncoderConfig {
        let config = EncoderConfig::default()
            .with_max_hp_len(self.max_hp_len)
            .with_compression(self.compressed)
            .with_read_fraction(self.read_fraction)
            .with_parallel(!self.sequential);
        if self.data_types.is_empty() {
            config
        } else {
            config.with_data_types(self.data_types.iter().cloned())
        }
    }

    fn source(&self) -> Result<BamSource> {
        let source = BamSource::new(&self.bam);
        match self.run_length_tag.as_deref() {
            None => Ok(source),
            Some(tag) => match tag.as_bytes() {
                &[a, b] => Ok(source.with_run_length_tag([a, b])),
                _ => Err(anyhow!("run length tag '{tag}' must be two characters")),
            },
        }
    }

    fn region(&self) -> Result<Region> {
        self.region
            .parse()
            .with_context(|| format!("invalid region '{}'", self.region))
    }

    fn implementation(&self) -> Result<Implementation> {
        Ok(self.implementation.parse()?)
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Features {
            input,
            reference,
            normalise,
            ref_mode,
            consensus_as_ref,
            log_min,
            with_depth,
        } => {
            let normalise = match normalise.as_str() {
                "none" => None,
                other => Some(other.parse::<Normalisation>()?),
            };
            let ref_mode = ref_mode.map(|mode| mode.parse::<RefMode>()).transpose()?;
            let config = input
                .config()
                .with_normalise(normalise)
                .with_ref_mode(ref_mode)
                .with_consensus_as_ref(consensus_as_ref)
                .with_log_min(log_min)
                .with_depth(with_depth);
            run_features(&input, config, reference)?
        }
        Commands::Counts { input } => run_counts(&input)?,
    }

    Ok(())
}

fn run_features(input: &InputArgs, config: EncoderConfig, fasta: Option<PathBuf>) -> Result<()> {
    let region = input.region()?;
    let encoder = FeatureEncoder::new(config).context("invalid encoder configuration")?;
    let reference = fasta
        .map(|path| {
            Reference::from_fasta(&path, &region)
                .with_context(|| format!("failed to load reference from {}", path.display()))
        })
        .transpose()?;

    let samples = encoder
        .encode(
            &input.source()?,
            &region,
            reference.as_ref(),
            input.implementation()?,
        )
        .with_context(|| format!("failed to encode {region}"))?;

    let labels: Vec<String> = encoder
        .scheme()
        .columns()
        .iter()
        .map(|column| column.to_string())
        .collect();
    let mut out = BufWriter::new(io::stdout().lock());
    for sample in &samples {
        write_sample(&mut out, sample, &labels)?;
    }
    out.flush()?;
    Ok(())
}

fn run_counts(input: &InputArgs) -> Result<()> {
    let region = input.region()?;
    let encoder = FeatureEncoder::new(input.config().with_normalise(None))
        .context("invalid encoder configuration")?;
    let chunks = encoder
        .pileup_counts(&input.source()?, &region, input.implementation()?)
        .with_context(|| format!("failed to count {region}"))?;

    let labels: Vec<String> = encoder.scheme().columns()[..encoder.scheme().read_width()]
        .iter()
        .map(|column| column.to_string())
        .collect();
    let mut out = BufWriter::new(io::stdout().lock());
    for chunk in &chunks {
        writeln!(out, "# {}", chunk.region())?;
        write_header(&mut out, &labels)?;
        for (position, row) in chunk.positions().iter().zip(chunk.counts().rows()) {
            write_position(&mut out, position)?;
            for value in row {
                write!(out, "\t{value}")?;
            }
            writeln!(out)?;
        }
    }
    out.flush()?;
    Ok(())
}

fn write_sample<W: Write>(out: &mut W, sample: &Sample, labels: &[String]) -> Result<()> {
    writeln!(out, "# {}", sample.region())?;
    write_header(out, labels)?;
    for (position, row) in sample.positions().iter().zip(sample.features().rows()) {
        write_position(out, position)?;
        for value in row {
            write!(out, "\t{value}")?;
        }
        writeln!(out)?;
    }
    Ok(())
}

fn write_header<W: Write>(out: &mut W, labels: &[String]) -> Result<()> {
    write!(out, "coordinate\tinsertion_offset")?;
    for label in labels {
        write!(out, "\t{label}")?;
    }
    writeln!(out)?;
    Ok(())
}

fn write_position<W: Write>(out: &mut W, position: &Position) -> Result<()> {
    write!(out, "{}\t{}", position.coordinate, position.insertion_offset)?;
    Ok(())
}
