use std::path::{Path, PathBuf};
use std::sync::Arc;

use rust_htslib::bam::{
    self,
    header::{Header, HeaderRecord},
    record::{Aux, AuxArray, Cigar, CigarString},
    Read, Writer,
};
use tracing::{debug, warn};

use crate::genomics::{AlignedRead, CigarOp, CigarOpKind, Region};
use crate::FeatureError;

/// Read-only supplier of alignment records overlapping a region.
///
/// Records come back in no guaranteed order. Implementations must be
/// shareable across the threads that count chunks in parallel.
pub trait AlignmentSource: Sync {
    /// Records whose reference span intersects `region`.
    fn fetch(&self, region: &Region) -> Result<Vec<AlignedRead>, FeatureError>;
}

/// Alignment source backed by reads held in memory.
#[derive(Debug, Clone)]
pub struct InMemorySource {
    reads: Arc<[AlignedRead]>,
}

impl InMemorySource {
    /// Wrap a batch of reads.
    pub fn new(reads: Vec<AlignedRead>) -> Self {
        Self {
            reads: Arc::from(reads.into_boxed_slice()),
        }
    }

    /// All held reads.
    pub fn reads(&self) -> &[AlignedRead] {
        &self.reads
    }
}

impl AlignmentSource for InMemorySource {
    fn fetch(&self, region: &Region) -> Result<Vec<AlignedRead>, FeatureError> {
        Ok(self
            .reads
            .iter()
            .filter(|read| read.overlaps(region.name(), region.start(), region.end()))
            .cloned()
            .collect())
    }
}

/// Alignment source reading an indexed BAM file through htslib.
///
/// Every fetch opens its own reader, so concurrent chunk workers never share
/// htslib state.
#[derive(Debug, Clone)]
pub struct BamSource {
    path: PathBuf,
    run_length_tag: Option<[u8; 2]>,
}

impl BamSource {
    /// Source for the BAM at `path` (its `.bai` must sit alongside).
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            run_length_tag: None,
        }
    }

    /// Read per-base homopolymer run lengths from a `B:C` aux tag.
    pub fn with_run_length_tag(mut self, tag: [u8; 2]) -> Self {
        self.run_length_tag = Some(tag);
        self
    }

    /// Path of the underlying BAM.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn convert(&self, record: &bam::Record, chrom: &Arc<str>) -> Option<AlignedRead> {
        let pos = u32::try_from(record.pos()).ok()?;
        let cigar = record
            .cigar()
            .iter()
            .map(|op| match *op {
                Cigar::Match(len) | Cigar::Equal(len) | Cigar::Diff(len) => {
                    CigarOp::new(CigarOpKind::Match, len)
                }
                Cigar::Ins(len) => CigarOp::new(CigarOpKind::Insertion, len),
                Cigar::Del(len) => CigarOp::new(CigarOpKind::Deletion, len),
                Cigar::RefSkip(len) => CigarOp::new(CigarOpKind::RefSkip, len),
                Cigar::SoftClip(len) => CigarOp::new(CigarOpKind::SoftClip, len),
                Cigar::HardClip(len) => CigarOp::new(CigarOpKind::HardClip, len),
                Cigar::Pad(len) => CigarOp::new(CigarOpKind::Padding, len),
            })
            .collect();

        let name = String::from_utf8_lossy(record.qname()).into_owned();
        let mut read = AlignedRead::new(
            name,
            Arc::clone(chrom),
            pos,
            cigar,
            record.seq().as_bytes(),
            record.is_reverse(),
        );

        if let Some(tag) = self.run_length_tag {
            match record.aux(&tag) {
                Ok(Aux::ArrayU8(runs)) => {
                    read = read.with_run_lengths(runs.iter().collect::<Vec<u8>>());
                }
                Ok(_) => warn!(
                    read = %read.name,
                    "run length tag {} is not a B:C array",
                    String::from_utf8_lossy(&tag)
                ),
                Err(_) => {}
            }
        }
        Some(read)
    }
}

impl AlignmentSource for BamSource {
    fn fetch(&self, region: &Region) -> Result<Vec<AlignedRead>, FeatureError> {
        let mut reader = bam::IndexedReader::from_path(&self.path)?;
        let Some(tid) = reader.header().tid(region.name().as_bytes()) else {
            warn!(contig = region.name(), path = %self.path.display(), "contig absent from BAM header");
            return Ok(Vec::new());
        };
        reader.fetch((tid, region.start() as i64, region.end() as i64))?;

        let mut reads = Vec::new();
        let mut skipped = 0usize;
        for result in reader.records() {
            let record = result?;
            if record.is_unmapped()
                || record.is_secondary()
                || record.is_quality_check_failed()
                || record.is_duplicate()
            {
                skipped += 1;
                continue;
            }
            match self.convert(&record, region.name_arc()) {
                Some(read) if read.overlaps(region.name(), region.start(), region.end()) => {
                    reads.push(read)
                }
                _ => skipped += 1,
            }
        }
        debug!(region = %region, reads = reads.len(), skipped, "fetched alignment records");
        Ok(reads)
    }
}

/// Create a BAM writer with a minimal header for a single-reference alignment.
///
/// The caller is responsible for writing alignment records using the returned writer.
pub fn create_bam_writer<P: AsRef<Path>>(
    output_path: P,
    reference_name: &str,
    reference_length: usize,
) -> Result<Writer, FeatureError> {
    let mut header = Header::new();

    let mut hd = HeaderRecord::new(b"HD");
    hd.push_tag(b"VN", &"1.6");
    hd.push_tag(b"SO", &"coordinate");
    header.push_record(&hd);

    let mut sq = HeaderRecord::new(b"SQ");
    sq.push_tag(b"SN", &reference_name);
    sq.push_tag(b"LN", &(reference_length as i64));
    header.push_record(&sq);

    let writer = bam::Writer::from_path(output_path, &header, bam::Format::Bam)?;
    Ok(writer)
}

/// Write `reads` as a coordinate-sorted, indexed BAM on a single reference.
///
/// Run lengths, when present, are stored under `run_length_tag` as `B:C`.
pub fn write_indexed_bam<P: AsRef<Path>>(
    output_path: P,
    reference_name: &str,
    reference_length: usize,
    reads: &[AlignedRead],
    run_length_tag: Option<[u8; 2]>,
) -> Result<(), FeatureError> {
    let path = output_path.as_ref();
    let mut sorted: Vec<&AlignedRead> = reads.iter().collect();
    sorted.sort_by_key(|read| read.pos);

    {
        let mut writer = create_bam_writer(path, reference_name, reference_length)?;
        for read in sorted {
            let cigar = CigarString(read.cigar.iter().map(to_htslib_cigar).collect());
            let qualities = vec![30u8; read.len()];
            let mut record = bam::Record::new();
            record.set(read.name.as_bytes(), Some(&cigar), &read.sequence, &qualities);
            record.set_tid(0);
            record.set_pos(i64::from(read.pos));
            record.set_mapq(60);
            record.set_mtid(-1);
            record.set_mpos(-1);
            record.set_flags(if read.is_reverse { 0x10 } else { 0 });
            if let (Some(tag), Some(runs)) = (run_length_tag, read.run_lengths.as_ref()) {
                let runs = runs.to_vec();
                let runs: AuxArray<u8> = (&runs).into();
                record.push_aux(&tag, Aux::ArrayU8(runs))?;
            }
            writer.write(&record)?;
        }
    }

    bam::index::build(path, None, bam::index::Type::Bai, 1)?;
    Ok(())
}

fn to_htslib_cigar(op: &CigarOp) -> Cigar {
    match op.kind {
        CigarOpKind::Match => Cigar::Match(op.len),
        CigarOpKind::Insertion => Cigar::Ins(op.len),
        CigarOpKind::Deletion => Cigar::Del(op.len),
        CigarOpKind::SoftClip => Cigar::SoftClip(op.len),
        CigarOpKind::HardClip => Cigar::HardClip(op.len),
        CigarOpKind::RefSkip => Cigar::RefSkip(op.len),
        CigarOpKind::Padding => Cigar::Pad(op.len),
    }
}
