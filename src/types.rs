use nalgebra::{Point3, Vector3};

use crate::error::{LevelSetError, Result};

/// Scalar field value at a point in space.
pub type Value = f32;

/// A 3D point with [`Value`] components.
///
/// Grids of lower dimension keep their unused axes at zero, so 1D and 2D
/// geometry lives on the x axis and in the xy plane respectively.
pub type Point = Point3<Value>;

/// A 3D vector with [`Value`] components.
pub type Vector = Vector3<Value>;

/// Dimensionality of the sampling grid.
///
/// The dimension selects the case table and with it the kind of primitive
/// the extraction emits: points on a line, contour segments in a plane, or
/// triangles in a volume. Exactly one dimension is active at a time and
/// switching it invalidates every derived buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Dimension {
    One,
    Two,
    #[default]
    Three,
}

impl Dimension {
    /// Every dimension, in `1 -> 2 -> 3` order.
    pub const ALL: [Dimension; 3] = [Dimension::One, Dimension::Two, Dimension::Three];

    /// Numeric form, `1`, `2` or `3`.
    pub const fn index(self) -> u8 {
        match self {
            Dimension::One => 1,
            Dimension::Two => 2,
            Dimension::Three => 3,
        }
    }

    /// Parses the numeric form used by the viewer keys.
    pub fn from_index(index: u8) -> Result<Self> {
        match index {
            1 => Ok(Dimension::One),
            2 => Ok(Dimension::Two),
            3 => Ok(Dimension::Three),
            other => Err(LevelSetError::UnknownDimension(other)),
        }
    }

    /// Number of axes as a `usize`, for loops over coordinates.
    pub const fn axes(self) -> usize {
        self.index() as usize
    }

    /// Corners per cell, `2^d`.
    pub const fn corner_count(self) -> usize {
        1 << self.axes()
    }

    /// Number of corner-sign configurations, `2^(2^d)`.
    pub const fn configuration_count(self) -> usize {
        1 << self.corner_count()
    }

    /// Cell edges that can carry a threshold crossing.
    pub const fn edge_count(self) -> usize {
        match self {
            Dimension::One => 1,
            Dimension::Two => 4,
            Dimension::Three => 12,
        }
    }

    /// Vertices per emitted primitive: a point, a segment or a triangle.
    pub const fn primitive_vertices(self) -> usize {
        self.axes()
    }

    /// Most primitives a single cell can emit.
    pub const fn max_primitives_per_cell(self) -> usize {
        match self {
            Dimension::One => 1,
            Dimension::Two => 2,
            Dimension::Three => 5,
        }
    }

    /// Total samples in a grid with `resolution` samples per axis.
    ///
    /// Saturates at `usize::MAX` when the count does not fit.
    pub const fn sample_count(self, resolution: u32) -> usize {
        (resolution as usize).saturating_pow(self.index() as u32)
    }

    /// Total cells in a grid with `resolution` samples per axis.
    ///
    /// Saturates at `usize::MAX` when the count does not fit.
    pub const fn cell_count(self, resolution: u32) -> usize {
        (resolution.saturating_sub(1) as usize).saturating_pow(self.index() as u32)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_scale_with_dimension() {
        assert_eq!(Dimension::One.corner_count(), 2);
        assert_eq!(Dimension::Two.corner_count(), 4);
        assert_eq!(Dimension::Three.corner_count(), 8);

        assert_eq!(Dimension::One.configuration_count(), 4);
        assert_eq!(Dimension::Two.configuration_count(), 16);
        assert_eq!(Dimension::Three.configuration_count(), 256);

        assert_eq!(Dimension::One.primitive_vertices(), 1);
        assert_eq!(Dimension::Two.primitive_vertices(), 2);
        assert_eq!(Dimension::Three.primitive_vertices(), 3);
    }

    #[test]
    fn sample_and_cell_counts() {
        assert_eq!(Dimension::One.sample_count(8), 8);
        assert_eq!(Dimension::Two.sample_count(8), 64);
        assert_eq!(Dimension::Three.sample_count(8), 512);

        assert_eq!(Dimension::One.cell_count(8), 7);
        assert_eq!(Dimension::Two.cell_count(8), 49);
        assert_eq!(Dimension::Three.cell_count(8), 343);
    }

    #[test]
    fn counts_saturate_at_extreme_resolutions() {
        assert_eq!(Dimension::Three.sample_count(u32::MAX), usize::MAX);
        assert_eq!(Dimension::Three.cell_count(u32::MAX), usize::MAX);
        assert_eq!(Dimension::One.cell_count(0), 0);
        assert_eq!(Dimension::Three.cell_count(1), 0);
    }

    #[test]
    fn index_round_trips() {
        for dimension in Dimension::ALL {
            assert_eq!(Dimension::from_index(dimension.index()), Ok(dimension));
        }
        assert_eq!(
            Dimension::from_index(4),
            Err(LevelSetError::UnknownDimension(4))
        );
    }
}
