// src/utils/geometry.rs
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WorldPoint {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl WorldPoint {
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    pub fn zero() -> Self {
        Self { x: 0.0, y: 0.0, z: 0.0 }
    }

    /// Planar distance, ignoring height. Streaming ranges are measured
    /// on the ground plane.
    pub fn distance_2d(&self, other: &WorldPoint) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        (dx * dx + dy * dy).sqrt()
    }

    pub fn distance_to(&self, other: &WorldPoint) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        let dz = self.z - other.z;
        (dx * dx + dy * dy + dz * dz).sqrt()
    }
}

/// Fractional offset inside a cell, each component in [0, 1].
pub type Anchor = (f32, f32);

pub fn clamp_anchor(anchor: Anchor) -> Anchor {
    (anchor.0.clamp(0.0, 1.0), anchor.1.clamp(0.0, 1.0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;

    #[test]
    fn test_distance_2d_ignores_height() {
        let a = WorldPoint::new(0.0, 0.0, 0.0);
        let b = WorldPoint::new(3.0, 4.0, 100.0);
        assert_approx_eq!(a.distance_2d(&b), 5.0);
    }

    #[test]
    fn test_clamp_anchor() {
        assert_eq!(clamp_anchor((-0.5, 1.5)), (0.0, 1.0));
        assert_eq!(clamp_anchor((0.25, 0.75)), (0.25, 0.75));
    }
}
