use crate::error::{ColocalizationError, Result};

/// A dense 3D buffer stored as a flat, row-major `Vec<T>`.
///
/// Voxels are addressed as `(z, y, x)`: `z` selects the plane, `y` the row
/// inside the plane and `x` the column. The element at `(z, y, x)` lives at
/// index `(z * size_y + y) * size_x + x`.
///
/// Intensity channels use `Volume<f32>`, labeled channels use `Volume<u32>`
/// where `0` is background.
#[derive(Debug, Clone, PartialEq)]
pub struct Volume<T> {
    /// Voxel data, plane after plane, row after row.
    data: Vec<T>,
    /// Number of planes.
    size_z: usize,
    /// Number of rows per plane.
    size_y: usize,
    /// Number of columns per row.
    size_x: usize,
}

/// Intensity volume of one channel.
pub type IntensityVolume = Volume<f32>;

/// Labeled volume: `0` is background, positive values identify objects.
pub type LabelVolume = Volume<u32>;

impl<T: Copy> Volume<T> {
    /// Creates a volume from raw row-major data.
    ///
    /// # Errors
    /// Returns [`ColocalizationError::ShapeMismatch`] when `data.len()` is not
    /// `size_z * size_y * size_x`.
    pub fn from_vec(size_z: usize, size_y: usize, size_x: usize, data: Vec<T>) -> Result<Self> {
        let expected = size_z * size_y * size_x;
        if data.len() != expected {
            return Err(ColocalizationError::ShapeMismatch {
                expected: (size_z, size_y, size_x),
                found: (data.len(), 1, 1),
            });
        }
        Ok(Volume {
            data,
            size_z,
            size_y,
            size_x,
        })
    }

    /// Creates a volume with every voxel set to `value`.
    pub fn filled(size_z: usize, size_y: usize, size_x: usize, value: T) -> Self {
        Volume {
            data: vec![value; size_z * size_y * size_x],
            size_z,
            size_y,
            size_x,
        }
    }

    /// Stacks equally sized 2D planes (each `size_y * size_x`, row-major)
    /// into a volume, first plane at `z = 0`.
    pub fn from_planes(size_y: usize, size_x: usize, planes: Vec<Vec<T>>) -> Result<Self> {
        let size_z = planes.len();
        let mut data = Vec::with_capacity(size_z * size_y * size_x);
        for plane in planes {
            if plane.len() != size_y * size_x {
                return Err(ColocalizationError::ShapeMismatch {
                    expected: (1, size_y, size_x),
                    found: (1, plane.len(), 1),
                });
            }
            data.extend(plane);
        }
        Volume::from_vec(size_z, size_y, size_x, data)
    }

    /// Returns `(size_z, size_y, size_x)`.
    pub fn shape(&self) -> (usize, usize, usize) {
        (self.size_z, self.size_y, self.size_x)
    }

    pub fn size_z(&self) -> usize {
        self.size_z
    }

    pub fn size_y(&self) -> usize {
        self.size_y
    }

    pub fn size_x(&self) -> usize {
        self.size_x
    }

    /// Total number of voxels.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Flat index of `(z, y, x)`. The coordinate must be in bounds.
    #[inline]
    pub fn index(&self, z: usize, y: usize, x: usize) -> usize {
        (z * self.size_y + y) * self.size_x + x
    }

    /// Inverse of [`Volume::index`].
    #[inline]
    pub fn coords(&self, index: usize) -> (usize, usize, usize) {
        let plane = self.size_y * self.size_x;
        let z = index / plane;
        let rem = index % plane;
        (z, rem / self.size_x, rem % self.size_x)
    }

    /// Returns the voxel at `(z, y, x)`, or `None` when out of bounds.
    pub fn get(&self, z: usize, y: usize, x: usize) -> Option<T> {
        if z >= self.size_z || y >= self.size_y || x >= self.size_x {
            None
        } else {
            Some(self.data[self.index(z, y, x)])
        }
    }

    /// Sets the voxel at `(z, y, x)`.
    ///
    /// # Panics
    /// Panics if the coordinate is out of bounds.
    pub fn set(&mut self, z: usize, y: usize, x: usize, value: T) {
        let index = self.index(z, y, x);
        self.data[index] = value;
    }

    /// True when `(z, y, x)` lies on any face of the volume.
    #[inline]
    pub fn is_border(&self, z: usize, y: usize, x: usize) -> bool {
        z == 0
            || y == 0
            || x == 0
            || z + 1 == self.size_z
            || y + 1 == self.size_y
            || x + 1 == self.size_x
    }

    pub fn as_slice(&self) -> &[T] {
        &self.data
    }

    pub fn as_mut_slice(&mut self) -> &mut [T] {
        &mut self.data
    }

    pub fn into_vec(self) -> Vec<T> {
        self.data
    }

    /// Borrows plane `z` as a row-major slice.
    pub fn plane(&self, z: usize) -> &[T] {
        let plane = self.size_y * self.size_x;
        &self.data[z * plane..(z + 1) * plane]
    }

    /// Applies `f` to every voxel, producing a volume of the same shape.
    pub fn map<U: Copy, F: Fn(T) -> U>(&self, f: F) -> Volume<U> {
        Volume {
            data: self.data.iter().map(|&v| f(v)).collect(),
            size_z: self.size_z,
            size_y: self.size_y,
            size_x: self.size_x,
        }
    }

    /// Wraps `data` in a volume with the same extent as `self`.
    pub(crate) fn with_data<U>(&self, data: Vec<U>) -> Volume<U> {
        debug_assert_eq!(data.len(), self.data.len());
        Volume {
            data,
            size_z: self.size_z,
            size_y: self.size_y,
            size_x: self.size_x,
        }
    }

    /// True when `other` has the same `(z, y, x)` extent.
    pub fn same_shape<U>(&self, other: &Volume<U>) -> bool {
        self.size_z == other.size_z && self.size_y == other.size_y && self.size_x == other.size_x
    }

    /// Fails with [`ColocalizationError::ShapeMismatch`] unless `other` has the same extent.
    pub fn ensure_same_shape<U>(&self, other: &Volume<U>) -> Result<()> {
        if self.same_shape(other) {
            Ok(())
        } else {
            Err(ColocalizationError::ShapeMismatch {
                expected: self.shape(),
                found: (other.size_z, other.size_y, other.size_x),
            })
        }
    }
}

impl Volume<f32> {
    /// Smallest and largest sample, ignoring NaN. `None` for an empty volume.
    pub fn min_max(&self) -> Option<(f32, f32)> {
        let mut iter = self.data.iter().copied().filter(|v| !v.is_nan());
        let first = iter.next()?;
        Some(iter.fold((first, first), |(lo, hi), v| (lo.min(v), hi.max(v))))
    }

    /// Builds an intensity volume from any numeric sample type.
    pub fn from_samples<S: Copy + Into<f64>>(
        size_z: usize,
        size_y: usize,
        size_x: usize,
        samples: &[S],
    ) -> Result<Self> {
        let data = samples.iter().map(|&s| s.into() as f32).collect();
        Volume::from_vec(size_z, size_y, size_x, data)
    }
}

impl Volume<bool> {
    /// Number of `true` voxels.
    pub fn count(&self) -> usize {
        self.data.iter().filter(|&&v| v).count()
    }
}

impl Volume<u32> {
    /// Largest label present, `0` when the volume is all background.
    pub fn max_label(&self) -> u32 {
        self.data.iter().copied().max().unwrap_or(0)
    }
}

/// Offsets of the 26 neighbors of a voxel (all voxels sharing a face, edge or corner).
pub(crate) const NEIGHBORS_26: [(isize, isize, isize); 26] = {
    let mut out = [(0isize, 0isize, 0isize); 26];
    let mut n = 0;
    let mut dz = -1;
    while dz <= 1 {
        let mut dy = -1;
        while dy <= 1 {
            let mut dx = -1;
            while dx <= 1 {
                if !(dz == 0 && dy == 0 && dx == 0) {
                    out[n] = (dz, dy, dx);
                    n += 1;
                }
                dx += 1;
            }
            dy += 1;
        }
        dz += 1;
    }
    out
};

/// Offsets of the 6 face neighbors of a voxel.
pub(crate) const NEIGHBORS_6: [(isize, isize, isize); 6] = [
    (-1, 0, 0),
    (1, 0, 0),
    (0, -1, 0),
    (0, 1, 0),
    (0, 0, -1),
    (0, 0, 1),
];

/// Shifts `(z, y, x)` by `offset`, returning `None` when the result leaves the volume.
#[inline]
pub(crate) fn offset_coords(
    shape: (usize, usize, usize),
    (z, y, x): (usize, usize, usize),
    (dz, dy, dx): (isize, isize, isize),
) -> Option<(usize, usize, usize)> {
    let nz = z.checked_add_signed(dz)?;
    let ny = y.checked_add_signed(dy)?;
    let nx = x.checked_add_signed(dx)?;
    if nz < shape.0 && ny < shape.1 && nx < shape.2 {
        Some((nz, ny, nx))
    } else {
        None
    }
}
