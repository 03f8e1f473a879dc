use rayon::prelude::*;

use crate::error::{LevelSetError, Result};
use crate::field::ScalarField;
use crate::tables::CaseTable;
use crate::types::{Dimension, Point, Value};

/// Half-extent of the sampling domain along every active axis.
pub const DOMAIN_EXTENT: Value = 1.0;

/// A scalar field sampled over the uniform grid
/// `[-DOMAIN_EXTENT, DOMAIN_EXTENT]^d`.
///
/// Samples are flat-indexed with the first axis varying fastest, so sample
/// `i` sits at x-index `i % n`, y-index `(i / n) % n` and so on. Cells are
/// never materialised; they are addressed through the same flat indices via
/// [`CellIndexer`].
#[derive(Debug, Clone)]
pub struct SampleGrid {
    dimension: Dimension,
    resolution: u32,
    positions: Vec<Point>,
    values: Vec<Value>,
}

impl SampleGrid {
    /// Samples `field` at every grid point in parallel.
    pub fn sample(
        dimension: Dimension,
        resolution: u32,
        field: ScalarField,
        time: f32,
    ) -> Result<Self> {
        if resolution < 2 {
            return Err(LevelSetError::ResolutionTooSmall(resolution));
        }
        let count = dimension.sample_count(resolution);
        let (positions, values): (Vec<Point>, Vec<Value>) = (0..count)
            .into_par_iter()
            .map(|sample| {
                let position = sample_position(dimension, resolution, sample);
                (position, field.evaluate(dimension, position, time))
            })
            .unzip();
        Ok(Self {
            dimension,
            resolution,
            positions,
            values,
        })
    }

    /// Wraps precomputed values over the same grid layout.
    ///
    /// Positions are still derived from the grid, only the field values are
    /// taken as given, in flat sample order.
    ///
    /// # Panics
    /// Panics if `values` does not hold exactly one value per sample.
    pub fn from_values(dimension: Dimension, resolution: u32, values: Vec<Value>) -> Result<Self> {
        if resolution < 2 {
            return Err(LevelSetError::ResolutionTooSmall(resolution));
        }
        let count = dimension.sample_count(resolution);
        assert_eq!(values.len(), count, "one value per grid sample");
        let positions = (0..count)
            .map(|sample| sample_position(dimension, resolution, sample))
            .collect();
        Ok(Self {
            dimension,
            resolution,
            positions,
            values,
        })
    }

    pub fn dimension(&self) -> Dimension {
        self.dimension
    }

    pub fn resolution(&self) -> u32 {
        self.resolution
    }

    /// Distance between neighbouring samples along one axis.
    pub fn spacing(&self) -> Value {
        2.0 * DOMAIN_EXTENT / (self.resolution - 1) as Value
    }

    pub fn sample_count(&self) -> usize {
        self.positions.len()
    }

    pub fn cell_count(&self) -> usize {
        self.dimension.cell_count(self.resolution)
    }

    #[inline]
    pub fn position(&self, sample: usize) -> Point {
        self.positions[sample]
    }

    #[inline]
    pub fn value(&self, sample: usize) -> Value {
        self.values[sample]
    }

    pub fn positions(&self) -> &[Point] {
        &self.positions
    }

    pub fn values(&self) -> &[Value] {
        &self.values
    }
}

/// World position of a sample, flat-indexed with the first axis fastest.
/// Inactive axes stay at zero. `resolution` must be at least 2.
pub fn sample_position(dimension: Dimension, resolution: u32, sample: usize) -> Point {
    debug_assert!(resolution >= 2);
    let n = resolution as usize;
    let spacing = 2.0 * DOMAIN_EXTENT / (resolution - 1) as Value;
    let mut position = Point::origin();
    let mut rest = sample;
    for axis in 0..dimension.axes() {
        position[axis] = (rest % n) as Value * spacing - DOMAIN_EXTENT;
        rest /= n;
    }
    position
}

/// Maps flat cell indices to the flat sample indices of their corners.
///
/// The corner offsets are fixed for a given dimension and resolution, so
/// they are computed once up front and every cell visit reduces to one base
/// decomposition plus an add per corner.
pub(crate) struct CellIndexer {
    resolution: usize,
    axes: usize,
    corner_count: usize,
    corner_offsets: [usize; 8],
}

impl CellIndexer {
    pub(crate) fn new(dimension: Dimension, resolution: u32) -> Self {
        let n = resolution as usize;
        let corners = CaseTable::of(dimension).corners();
        let mut corner_offsets = [0usize; 8];
        for (slot, corner) in corners.iter().enumerate() {
            let mut stride = 1;
            for axis in 0..dimension.axes() {
                corner_offsets[slot] += corner[axis] * stride;
                stride *= n;
            }
        }
        Self {
            resolution: n,
            axes: dimension.axes(),
            corner_count: corners.len(),
            corner_offsets,
        }
    }

    pub(crate) fn corner_count(&self) -> usize {
        self.corner_count
    }

    /// Sample index of corner 0 of the given cell.
    pub(crate) fn base_sample(&self, cell: usize) -> usize {
        let cells = self.resolution - 1;
        let mut rest = cell;
        let mut base = 0;
        let mut stride = 1;
        for _ in 0..self.axes {
            base += (rest % cells) * stride;
            rest /= cells;
            stride *= self.resolution;
        }
        base
    }

    /// Sample index of a corner, relative to a cell's base sample.
    #[inline]
    pub(crate) fn corner_sample(&self, base: usize, corner: usize) -> usize {
        base + self.corner_offsets[corner]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn positions_span_the_domain() {
        let grid = SampleGrid::sample(Dimension::Three, 2, ScalarField::Sphere, 0.0).unwrap();
        assert_eq!(grid.sample_count(), 8);
        assert_eq!(grid.cell_count(), 1);
        assert_eq!(grid.position(0), Point::new(-1.0, -1.0, -1.0));
        assert_eq!(grid.position(7), Point::new(1.0, 1.0, 1.0));
    }

    #[test]
    fn first_axis_varies_fastest() {
        let grid = SampleGrid::sample(Dimension::Two, 3, ScalarField::Sphere, 0.0).unwrap();
        assert_eq!(grid.position(0), Point::new(-1.0, -1.0, 0.0));
        assert_eq!(grid.position(1), Point::new(0.0, -1.0, 0.0));
        assert_eq!(grid.position(3), Point::new(-1.0, 0.0, 0.0));
        assert_eq!(grid.position(4), Point::new(0.0, 0.0, 0.0));
    }

    #[test]
    fn inactive_axes_stay_at_zero() {
        let grid = SampleGrid::sample(Dimension::One, 5, ScalarField::Ripple, 0.0).unwrap();
        assert_eq!(grid.spacing(), 0.5);
        for position in grid.positions() {
            assert_eq!(position.y, 0.0);
            assert_eq!(position.z, 0.0);
        }
    }

    #[test]
    fn rejects_degenerate_resolutions() {
        for resolution in [0, 1] {
            let result = SampleGrid::sample(Dimension::Two, resolution, ScalarField::Sphere, 0.0);
            assert_eq!(
                result.unwrap_err(),
                LevelSetError::ResolutionTooSmall(resolution)
            );
        }
    }

    #[test]
    fn values_match_the_field() {
        let grid = SampleGrid::sample(Dimension::Two, 5, ScalarField::Sphere, 0.0).unwrap();
        for sample in 0..grid.sample_count() {
            let expected = ScalarField::Sphere.evaluate(Dimension::Two, grid.position(sample), 0.0);
            assert_eq!(grid.value(sample), expected);
        }
    }

    #[test]
    fn precomputed_values_keep_grid_positions() {
        let grid = SampleGrid::from_values(Dimension::Three, 3, vec![0.25; 27]).unwrap();
        assert_eq!(grid.value(13), 0.25);
        assert_eq!(grid.position(13), Point::new(0.0, 0.0, 0.0));
    }

    #[test]
    fn cell_indexer_walks_corner_samples() {
        let indexer = CellIndexer::new(Dimension::Three, 3);
        let base = indexer.base_sample(0);
        assert_eq!(base, 0);
        let corners: Vec<usize> = (0..8)
            .map(|corner| indexer.corner_sample(base, corner))
            .collect();
        assert_eq!(corners, [0, 1, 4, 3, 9, 10, 13, 12]);

        // Last cell of the 2x2x2 cell grid.
        assert_eq!(indexer.base_sample(7), 1 + 3 + 9);
    }

    #[test]
    fn cell_indexer_matches_lower_dimensions() {
        let indexer = CellIndexer::new(Dimension::Two, 4);
        assert_eq!(indexer.corner_count(), 4);
        // Cell (2, 1) of the 3x3 cell grid.
        assert_eq!(indexer.base_sample(5), 6);
        assert_eq!(indexer.corner_sample(6, 2), 6 + 1 + 4);
    }
}
