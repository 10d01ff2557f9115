use crate::error::{ColocalizationError, Result};
use crate::volume::IntensityVolume;

/// A multi-dimensional acquisition buffer in `Z, C, T, Y, X` order.
///
/// This is the layout an acquisition system typically hands over: every
/// `(z, c, t)` triple owns one `Y × X` plane. Analysis works on one channel at
/// one timepoint at a time, so the stack is sliced into 3D [`IntensityVolume`]s.
#[derive(Debug, Clone)]
pub struct Hyperstack {
    data: Vec<f32>,
    size_z: usize,
    size_c: usize,
    size_t: usize,
    size_y: usize,
    size_x: usize,
}

impl Hyperstack {
    /// Wraps flat `Z, C, T, Y, X` data.
    pub fn new(
        size_z: usize,
        size_c: usize,
        size_t: usize,
        size_y: usize,
        size_x: usize,
        data: Vec<f32>,
    ) -> Result<Self> {
        let expected = size_z * size_c * size_t * size_y * size_x;
        if data.len() != expected {
            return Err(ColocalizationError::invalid(format!(
                "hyperstack of shape ({size_z}, {size_c}, {size_t}, {size_y}, {size_x}) \
                 needs {expected} samples, got {}",
                data.len()
            )));
        }
        Ok(Hyperstack {
            data,
            size_z,
            size_c,
            size_t,
            size_y,
            size_x,
        })
    }

    /// Builds a stack from planes listed in `(z, c, t)` lexicographic order.
    pub fn from_planes(
        size_z: usize,
        size_c: usize,
        size_t: usize,
        size_y: usize,
        size_x: usize,
        planes: Vec<Vec<f32>>,
    ) -> Result<Self> {
        if planes.len() != size_z * size_c * size_t {
            return Err(ColocalizationError::invalid(format!(
                "expected {} planes, got {}",
                size_z * size_c * size_t,
                planes.len()
            )));
        }
        if let Some(bad) = planes.iter().find(|p| p.len() != size_y * size_x) {
            return Err(ColocalizationError::ShapeMismatch {
                expected: (1, size_y, size_x),
                found: (1, bad.len(), 1),
            });
        }
        Hyperstack::new(size_z, size_c, size_t, size_y, size_x, planes.concat())
    }

    /// Returns `(size_z, size_c, size_t, size_y, size_x)`.
    pub fn shape(&self) -> (usize, usize, usize, usize, usize) {
        (self.size_z, self.size_c, self.size_t, self.size_y, self.size_x)
    }

    pub fn channel_count(&self) -> usize {
        self.size_c
    }

    pub fn timepoint_count(&self) -> usize {
        self.size_t
    }

    /// Extracts channel `c` at timepoint `t` as a `Z × Y × X` volume.
    pub fn channel_volume(&self, c: usize, t: usize) -> Result<IntensityVolume> {
        if c >= self.size_c || t >= self.size_t {
            return Err(ColocalizationError::invalid(format!(
                "channel {c} / timepoint {t} outside of a stack with {} channels and {} timepoints",
                self.size_c, self.size_t
            )));
        }
        let plane = self.size_y * self.size_x;
        let mut data = Vec::with_capacity(self.size_z * plane);
        for z in 0..self.size_z {
            let start = ((z * self.size_c + c) * self.size_t + t) * plane;
            data.extend_from_slice(&self.data[start..start + plane]);
        }
        IntensityVolume::from_vec(self.size_z, self.size_y, self.size_x, data)
    }

    /// Extracts every channel at timepoint `t`, in channel order.
    pub fn channel_volumes(&self, t: usize) -> Result<Vec<IntensityVolume>> {
        (0..self.size_c).map(|c| self.channel_volume(c, t)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slices_channel_planes() {
        // z=2, c=2, t=1, 1x2 planes; plane value encodes (z, c).
        let planes = vec![
            vec![0.0, 0.0],
            vec![1.0, 1.0],
            vec![10.0, 10.0],
            vec![11.0, 11.0],
        ];
        let stack = Hyperstack::from_planes(2, 2, 1, 1, 2, planes).unwrap();
        let c1 = stack.channel_volume(1, 0).unwrap();
        assert_eq!(c1.shape(), (2, 1, 2));
        assert_eq!(c1.as_slice(), &[1.0, 1.0, 11.0, 11.0]);
        assert_eq!(stack.channel_volumes(0).unwrap().len(), 2);
    }

    #[test]
    fn rejects_out_of_range_channel() {
        let stack = Hyperstack::new(1, 1, 1, 1, 1, vec![0.0]).unwrap();
        assert!(stack.channel_volume(1, 0).is_err());
        assert!(stack.channel_volume(0, 1).is_err());
    }
}
