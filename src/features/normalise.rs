use ndarray::{Array2, ArrayViewMut2, Axis};

use crate::features::{EncodingScheme, Normalisation};

/// Convert raw read counts to `f32` features, normalising each row.
///
/// Rows (or strand groups) without observations stay all-zero.
pub fn normalise_counts(
    counts: &Array2<u32>,
    scheme: &EncodingScheme,
    mode: Option<Normalisation>,
) -> Array2<f32> {
    let mut features = counts.mapv(|count| count as f32);
    match mode {
        None => {}
        Some(Normalisation::Total) => {
            for mut row in features.axis_iter_mut(Axis(0)) {
                let total = row.sum();
                if total > 0.0 {
                    row /= total;
                }
            }
        }
        Some(Normalisation::FwdRev) => {
            for is_reverse in [true, false] {
                let columns = scheme.strand_columns(is_reverse);
                for mut row in features.axis_iter_mut(Axis(0)) {
                    let total: f32 = columns.iter().map(|&col| row[col]).sum();
                    if total > 0.0 {
                        for &col in &columns {
                            row[col] /= total;
                        }
                    }
                }
            }
        }
    }
    features
}

/// Replace every value `x` with `max(log10(x), log_min)`; zeros become `log_min`.
pub fn apply_log_floor(mut features: ArrayViewMut2<'_, f32>, log_min: i32) {
    let floor = log_min as f32;
    features.mapv_inplace(|x| if x > 0.0 { x.log10().max(floor) } else { floor });
}
