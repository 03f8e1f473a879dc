use crate::types::{Point, Value};

// Interpolation factor of the threshold crossing between two corner values.
// Falls back to the midpoint when the edge is flat or a corner value is not
// finite, so a crossed edge always yields a finite point.
pub fn crossing_factor(v0: Value, v1: Value, threshold: Value) -> Value {
    let span = v1 - v0;
    if span == 0.0 {
        return 0.5;
    }
    let factor = (threshold - v0) / span;
    if factor.is_finite() { factor } else { 0.5 }
}

// Point where the field crosses the threshold along the edge p0 -> p1.
pub fn crossing_point(p0: Point, p1: Point, v0: Value, v1: Value, threshold: Value) -> Point {
    p0 + (p1 - p0) * crossing_factor(v0, v1, threshold)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn factor_is_linear_between_corners() {
        assert_eq!(crossing_factor(0.0, 1.0, 0.25), 0.25);
        assert_eq!(crossing_factor(1.0, 0.0, 0.25), 0.75);
        assert_eq!(crossing_factor(-1.0, 1.0, 0.0), 0.5);
    }

    #[test]
    fn flat_edges_fall_back_to_the_midpoint() {
        assert_eq!(crossing_factor(0.5, 0.5, 0.5), 0.5);
        assert_eq!(crossing_factor(f32::INFINITY, 1.0, 0.0), 0.5);
        assert_eq!(crossing_factor(f32::NAN, 1.0, 0.0), 0.5);
        let p = crossing_point(
            Point::new(0.0, 0.0, 0.0),
            Point::new(2.0, 0.0, 0.0),
            1.0,
            1.0,
            1.0,
        );
        assert_eq!(p, Point::new(1.0, 0.0, 0.0));
    }

    #[test]
    fn crossing_lands_on_the_edge() {
        let p0 = Point::new(-1.0, -1.0, -1.0);
        let p1 = Point::new(1.0, -1.0, -1.0);
        let p = crossing_point(p0, p1, 1.0, -1.0, 0.0);
        assert_eq!(p, Point::new(0.0, -1.0, -1.0));

        // A threshold equal to one corner value pins the crossing to it.
        let exact = crossing_point(p0, p1, 0.0, 1.0, 0.0);
        assert_eq!(exact, p0);
    }
}
