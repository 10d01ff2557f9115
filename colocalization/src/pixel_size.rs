use nalgebra::{Point3, Vector3};
use serde::{Deserialize, Serialize};

use crate::error::{ColocalizationError, Result};

/// Physical size of one voxel along each axis (e.g. micrometers).
///
/// Used twice downstream: to scale weighted centroids into physical units, and
/// as the per-axis weights of the distance metric in cross-channel matching.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PixelSize {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Default for PixelSize {
    fn default() -> Self {
        PixelSize::unit()
    }
}

impl PixelSize {
    /// Creates a calibrated pixel size.
    ///
    /// # Errors
    /// Every component must be finite and strictly positive.
    pub fn new(x: f64, y: f64, z: f64) -> Result<Self> {
        let size = PixelSize { x, y, z };
        size.validate()?;
        Ok(size)
    }

    /// One unit per axis: coordinates stay in voxel units.
    pub const fn unit() -> Self {
        PixelSize { x: 1.0, y: 1.0, z: 1.0 }
    }

    pub fn validate(&self) -> Result<()> {
        for (axis, value) in [("x", self.x), ("y", self.y), ("z", self.z)] {
            if !value.is_finite() || value <= 0.0 {
                return Err(ColocalizationError::invalid(format!(
                    "pixel size along {axis} must be positive and finite, got {value}"
                )));
            }
        }
        Ok(())
    }

    /// Per-axis factors as a vector laid out like [`Point3`] coordinates.
    pub fn as_vector(&self) -> Vector3<f64> {
        Vector3::new(self.x, self.y, self.z)
    }

    /// Converts a voxel-unit coordinate into physical units.
    pub fn scale(&self, point: &Point3<f64>) -> Point3<f64> {
        Point3::from(point.coords.component_mul(&self.as_vector()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_non_positive_components() {
        assert!(PixelSize::new(0.1, 0.1, 0.3).is_ok());
        assert!(PixelSize::new(0.0, 0.1, 0.3).is_err());
        assert!(PixelSize::new(0.1, -1.0, 0.3).is_err());
        assert!(PixelSize::new(0.1, 0.1, f64::NAN).is_err());
    }

    #[test]
    fn scales_each_axis() {
        let size = PixelSize::new(0.5, 2.0, 3.0).unwrap();
        let scaled = size.scale(&Point3::new(2.0, 1.0, 1.0));
        assert_eq!(scaled, Point3::new(1.0, 2.0, 3.0));
        assert_eq!(PixelSize::unit().scale(&scaled), scaled);
    }
}
