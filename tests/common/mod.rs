#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};

use pileup_features::{AlignedRead, CigarOp, Region, Sample};

fn snapshot_root() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("snapshots")
}

pub fn assert_snapshot(name: &str, actual: &str) {
    let path = snapshot_root().join(name);
    if std::env::var("PILEUP_FEATURES_UPDATE_SNAPSHOTS").is_ok() {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("create snapshot directory");
        }
        fs::write(&path, actual).expect("write snapshot");
        return;
    }

    let expected =
        fs::read_to_string(&path).unwrap_or_else(|_| panic!("snapshot {:?} not found", path));
    if normalize(&expected) != normalize(actual) {
        panic!(
            "Snapshot mismatch for {:?}. Set PILEUP_FEATURES_UPDATE_SNAPSHOTS=1 to regenerate.\nExpected:\n{}\nActual:\n{}",
            path,
            expected,
            actual
        );
    }
}

fn normalize(input: &str) -> String {
    input.replace("\r\n", "\n")
}

pub const CONTIG: &str = "contig1";

pub fn read(name: &str, pos: u32, cigar: &str, seq: &[u8], is_reverse: bool) -> AlignedRead {
    AlignedRead::new(
        name,
        CONTIG,
        pos,
        CigarOp::parse_string(cigar).expect("valid cigar"),
        seq.to_vec(),
        is_reverse,
    )
}

pub fn region(start: u32, end: u32) -> Region {
    Region::new(CONTIG, start, end).expect("valid region")
}

/// Coverage over `[0, 10)` and `[14, 30)` with nothing in between.
///
/// Coordinate 0 sees 21 reverse reads with `C`, one reverse read with `T` and
/// 14 forward reads with `A`. Three reverse reads end in a two-base
/// insertion after coordinate 29.
pub fn gapped_reads() -> Vec<AlignedRead> {
    let mut reads = Vec::new();
    for idx in 0..21 {
        reads.push(read(&format!("rev_c{idx}"), 0, "10M", b"CAGTCAGTCA", true));
    }
    reads.push(read("rev_t0", 0, "10M", b"TAGTCAGTCA", true));
    for idx in 0..14 {
        reads.push(read(&format!("fwd_a{idx}"), 0, "10M", b"AAGTCAGTCA", false));
    }

    for idx in 0..5 {
        reads.push(read(&format!("fwd_b{idx}"), 14, "16M", b"GATTACAGATTACAGA", false));
    }
    for idx in 0..3 {
        reads.push(read(&format!("rev_b{idx}"), 16, "14M2I", b"TTACAGATTACAGAGG", true));
    }
    reads
}

/// Digest of every sample's region, positions and feature bits.
pub fn fingerprint(samples: &[Sample]) -> blake3::Hash {
    let mut hasher = blake3::Hasher::new();
    for sample in samples {
        hasher.update(sample.region().to_string().as_bytes());
        for (position, row) in sample.positions().iter().zip(sample.features().rows()) {
            hasher.update(&position.coordinate.to_le_bytes());
            hasher.update(&position.insertion_offset.to_le_bytes());
            for value in row {
                hasher.update(&value.to_le_bytes());
            }
        }
    }
    hasher.finalize()
}
