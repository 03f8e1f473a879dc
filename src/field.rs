use crate::error::{LevelSetError, Result};
use crate::types::{Dimension, Point, Value};

/// Squared radius of one metaball in [`ScalarField::Blobs`].
const BLOB_RADIUS_SQUARED: Value = 0.09;

/// Built-in scalar fields the extraction can sample.
///
/// The set is fixed and cyclic: the viewer's field key steps through it with
/// [`next`](ScalarField::next). Every field crosses zero inside the sampling
/// domain, so the default threshold of `0.0` always produces geometry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ScalarField {
    /// Distance to the origin minus a radius that pulses over time.
    #[default]
    Sphere,
    /// The gyroid triply periodic surface, phase-shifted over time.
    Gyroid,
    /// Three orbiting metaballs, negative inside and positive outside.
    Blobs,
    /// A radial wave travelling outward from the origin.
    Ripple,
}

impl ScalarField {
    /// Every field, in cycling order.
    pub const ALL: [ScalarField; 4] = [
        ScalarField::Sphere,
        ScalarField::Gyroid,
        ScalarField::Blobs,
        ScalarField::Ripple,
    ];

    /// Position of this field in [`ALL`](ScalarField::ALL).
    pub const fn index(self) -> usize {
        match self {
            ScalarField::Sphere => 0,
            ScalarField::Gyroid => 1,
            ScalarField::Blobs => 2,
            ScalarField::Ripple => 3,
        }
    }

    /// Looks a field up by its [`index`](ScalarField::index).
    pub fn from_index(index: usize) -> Result<Self> {
        ScalarField::ALL
            .get(index)
            .copied()
            .ok_or(LevelSetError::UnknownField(index))
    }

    /// The field after this one, wrapping at the end of the set.
    pub const fn next(self) -> Self {
        match self {
            ScalarField::Sphere => ScalarField::Gyroid,
            ScalarField::Gyroid => ScalarField::Blobs,
            ScalarField::Blobs => ScalarField::Ripple,
            ScalarField::Ripple => ScalarField::Sphere,
        }
    }

    /// Short lowercase name for logs and window titles.
    pub const fn name(self) -> &'static str {
        match self {
            ScalarField::Sphere => "sphere",
            ScalarField::Gyroid => "gyroid",
            ScalarField::Blobs => "blobs",
            ScalarField::Ripple => "ripple",
        }
    }

    /// Samples the field at `point`.
    ///
    /// A fixed `time` always reproduces the same values, so resampling a
    /// grid with unchanged settings is deterministic. The blob orbits depend
    /// on `dimension` to keep all three blobs on the active axes; the other
    /// fields read the inactive coordinates as the zeros they are.
    pub fn evaluate(self, dimension: Dimension, point: Point, time: f32) -> Value {
        match self {
            ScalarField::Sphere => point.coords.norm() - (0.6 + 0.2 * (0.8 * time).sin()),
            ScalarField::Gyroid => {
                let phase = 0.6 * time;
                let x = 4.0 * point.x + phase;
                let y = 4.0 * point.y + phase;
                let z = 4.0 * point.z + phase;
                x.sin() * y.cos() + y.sin() * z.cos() + z.sin() * x.cos()
            }
            ScalarField::Blobs => {
                let mut sum = 0.0;
                for center in blob_centers(dimension, time) {
                    let distance_squared = (point - center).norm_squared().max(1e-6);
                    sum += BLOB_RADIUS_SQUARED / distance_squared;
                }
                1.0 - sum
            }
            ScalarField::Ripple => (8.0 * point.coords.norm() - 3.0 * time).sin(),
        }
    }
}

/// Orbit positions of the three metaballs, restricted to the active axes.
fn blob_centers(dimension: Dimension, time: f32) -> [Point; 3] {
    let t = time;
    match dimension {
        Dimension::One => [
            Point::new(0.6 * (0.7 * t).sin(), 0.0, 0.0),
            Point::new(0.5 * (1.1 * t + 2.0).sin(), 0.0, 0.0),
            Point::new(0.55 * (0.9 * t + 4.0).sin(), 0.0, 0.0),
        ],
        Dimension::Two => [
            Point::new(0.5 * t.cos(), 0.5 * t.sin(), 0.0),
            Point::new(0.45 * (1.3 * t + 2.0).cos(), 0.35 * (0.8 * t).sin(), 0.0),
            Point::new(0.4 * (0.7 * t + 4.0).cos(), 0.45 * (1.2 * t + 1.0).sin(), 0.0),
        ],
        Dimension::Three => [
            Point::new(0.5 * t.cos(), 0.5 * t.sin(), 0.35 * (0.7 * t).sin()),
            Point::new(
                0.45 * (1.3 * t + 2.0).cos(),
                0.35 * (0.8 * t).sin(),
                0.45 * (1.1 * t).cos(),
            ),
            Point::new(
                0.4 * (0.9 * t + 4.0).sin(),
                0.45 * (1.2 * t + 1.0).cos(),
                0.4 * (0.6 * t + 3.0).sin(),
            ),
        ],
    }
}
