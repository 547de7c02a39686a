use ndarray::Array2;

use crate::genomics::{is_strictly_increasing, Position, Region};
use crate::FeatureError;

/// Encoded features for one covered chunk.
///
/// Rows follow [`positions`](Self::positions), which are strictly increasing
/// in `(coordinate, insertion_offset)` order; columns follow the encoder's
/// [`EncodingScheme`](crate::EncodingScheme).
#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    region: Region,
    positions: Vec<Position>,
    features: Array2<f32>,
}

impl Sample {
    /// Assemble a sample, checking shape and position ordering.
    pub fn new(
        region: Region,
        positions: Vec<Position>,
        features: Array2<f32>,
    ) -> Result<Self, FeatureError> {
        if positions.len() != features.nrows() {
            return Err(FeatureError::InvalidSample(format!(
                "{} positions but {} feature rows for {}",
                positions.len(),
                features.nrows(),
                region
            )));
        }
        if !is_strictly_increasing(&positions) {
            return Err(FeatureError::InvalidSample(format!(
                "positions for {region} are not strictly increasing"
            )));
        }
        if let Some(outside) = positions
            .iter()
            .find(|p| !region.contains_coordinate(p.coordinate))
        {
            return Err(FeatureError::InvalidSample(format!(
                "position {outside} lies outside {region}"
            )));
        }
        Ok(Self {
            region,
            positions,
            features,
        })
    }

    /// Chunk this sample covers.
    pub fn region(&self) -> &Region {
        &self.region
    }

    /// Row positions.
    pub fn positions(&self) -> &[Position] {
        &self.positions
    }

    /// Feature matrix.
    pub fn features(&self) -> &Array2<f32> {
        &self.features
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.positions.len()
    }

    /// Whether the sample has no rows.
    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    /// Split into region, positions and features.
    pub fn into_parts(self) -> (Region, Vec<Position>, Array2<f32>) {
        (self.region, self.positions, self.features)
    }
}
