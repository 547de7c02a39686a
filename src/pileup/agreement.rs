use std::collections::BTreeMap;

use ndarray::Zip;

use crate::features::EncodingScheme;
use crate::genomics::{AlignedRead, Position, Region};
use crate::pileup::RawCounts;
use crate::FeatureError;

/// Outcome of a successful engine comparison.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AgreementReport {
    /// Rows compared.
    pub rows_compared: usize,
    /// Rows that differed, all of them predicted.
    pub discrepant: Vec<Position>,
}

/// Rows where the optimized engine may count more than the interpretive one,
/// with the number of extra observations expected at each.
///
/// Every counted read ending `...I 1M` contributes one extra base on the
/// reference-anchored row of its last coordinate.
pub fn expected_discrepancies(
    records: &[AlignedRead],
    chunk: &Region,
    scheme: &EncodingScheme,
) -> BTreeMap<Position, u32> {
    let mut expected = BTreeMap::new();
    for read in records {
        let counted = read.overlaps(chunk.name(), chunk.start(), chunk.end())
            && read.unsupported_op().is_none()
            && scheme.data_type_for(&read.name).is_some()
            && read.len() == read.query_len();
        if !counted || !read.ends_with_insertion_then_base() {
            continue;
        }
        let last = read.end() - 1;
        if chunk.contains_coordinate(last) {
            *expected.entry(Position::new(last, 0)).or_insert(0) += 1;
        }
    }
    expected
}

/// Compare interpretive and optimized counts for the same chunk.
///
/// Positions must be identical. A row may differ only at a predicted
/// position, with the optimized side never lower and ahead by exactly the
/// predicted number of observations.
pub fn check_agreement(
    reference: &RawCounts,
    optimized: &RawCounts,
    expected: &BTreeMap<Position, u32>,
) -> Result<AgreementReport, FeatureError> {
    if let Some(position) = first_position_mismatch(reference.positions(), optimized.positions()) {
        return Err(FeatureError::ImplementationDisagreement(position));
    }

    let mut report = AgreementReport {
        rows_compared: reference.len(),
        discrepant: Vec::new(),
    };
    let rows = reference.counts().rows().into_iter();
    for ((position, left), right) in reference
        .positions()
        .iter()
        .zip(rows)
        .zip(optimized.counts().rows())
    {
        if left == right {
            continue;
        }
        let extra = expected.get(position).copied().unwrap_or(0);
        let mut never_lower = true;
        Zip::from(&left).and(&right).for_each(|&l, &r| never_lower &= r >= l);
        let difference = right.sum() as i64 - left.sum() as i64;
        if extra == 0 || !never_lower || difference != i64::from(extra) {
            return Err(FeatureError::ImplementationDisagreement(*position));
        }
        report.discrepant.push(*position);
    }
    Ok(report)
}

fn first_position_mismatch(left: &[Position], right: &[Position]) -> Option<Position> {
    let shared = left.len().min(right.len());
    if let Some(idx) = (0..shared).find(|&idx| left[idx] != right[idx]) {
        return Some(left[idx].min(right[idx]));
    }
    match left.len().cmp(&right.len()) {
        std::cmp::Ordering::Less => Some(right[shared]),
        std::cmp::Ordering::Greater => Some(left[shared]),
        std::cmp::Ordering::Equal => None,
    }
}
