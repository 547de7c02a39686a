#[path = "common/mod.rs"]
mod common;

use std::collections::HashSet;

use common::{fingerprint, gapped_reads, region};
use pileup_features::{EncoderConfig, FeatureEncoder, Implementation, InMemorySource, RefMode};

#[test]
fn encoding_is_deterministic() {
    let source = InMemorySource::new(gapped_reads());
    let config = EncoderConfig::default()
        .with_max_hp_len(3)
        .with_ref_mode(Some(RefMode::OneHot))
        .with_consensus_as_ref(true)
        .with_depth(true);

    let mut fingerprints = HashSet::new();
    for implementation in [Implementation::Optimized, Implementation::Checked] {
        for _ in 0..5 {
            let encoder = FeatureEncoder::new(config.clone()).expect("valid configuration");
            let samples = encoder
                .encode(&source, &region(0, 30), None, implementation)
                .expect("encoding succeeds");
            fingerprints.insert(fingerprint(&samples));
        }
    }

    assert_eq!(fingerprints.len(), 1, "outputs diverged across runs");
}

#[test]
fn equal_configurations_share_a_catalogue() {
    let build = || {
        FeatureEncoder::new(EncoderConfig::default().with_max_hp_len(4).with_depth(true))
            .expect("valid configuration")
    };
    let (left, right) = (build(), build());
    assert_eq!(left.scheme().canonical_bytes(), right.scheme().canonical_bytes());
    assert_eq!(left.scheme().digest(), right.scheme().digest());
}
