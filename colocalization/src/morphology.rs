//! Morphological operations on binary and intensity volumes.
//!
//! All structuring elements used here are axis-aligned cubes, which are
//! separable: a cube filter is three 1D window filters, one per axis.

use crate::labeling::{label_components, Connectivity};
use crate::volume::{IntensityVolume, Volume};

/// Applies a 1D window reduction along one axis.
///
/// For each sample at position `p` on the axis the window covers
/// `[p - before, p + after]`, clipped to the volume. `combine` folds the
/// in-bounds samples, starting from the first one.
fn window_axis<T: Copy>(
    src: &[T],
    dst: &mut [T],
    stride: usize,
    len: usize,
    before: usize,
    after: usize,
    combine: impl Fn(T, T) -> T,
) {
    for (index, out) in dst.iter_mut().enumerate() {
        let pos = (index / stride) % len;
        let base = index - pos * stride;
        let start = pos.saturating_sub(before);
        let end = (pos + after).min(len - 1);
        let mut acc = src[base + start * stride];
        for q in start + 1..=end {
            acc = combine(acc, src[base + q * stride]);
        }
        *out = acc;
    }
}

/// Runs [`window_axis`] along x, y and z in turn.
fn window_filter<T: Copy + Default>(
    volume: &Volume<T>,
    before: usize,
    after: usize,
    combine: impl Fn(T, T) -> T + Copy,
) -> Volume<T> {
    let (size_z, size_y, size_x) = volume.shape();
    if volume.is_empty() || (before == 0 && after == 0) {
        return volume.clone();
    }
    let mut current = volume.as_slice().to_vec();
    let mut scratch = vec![T::default(); current.len()];
    for (stride, len) in [(1, size_x), (size_x, size_y), (size_x * size_y, size_z)] {
        window_axis(&current, &mut scratch, stride, len, before, after, combine);
        std::mem::swap(&mut current, &mut scratch);
    }
    volume.with_data(current)
}

/// Window extents `(before, after)` of a cube of side `side` anchored at its center.
/// Even sides extend one voxel further before the anchor than after it.
fn cube_extent(side: usize) -> (usize, usize) {
    let before = side / 2;
    (before, side.saturating_sub(1) - before)
}

/// Binary dilation with a cube of side `side`.
pub fn dilate(mask: &Volume<bool>, side: usize) -> Volume<bool> {
    let (before, after) = cube_extent(side);
    window_filter(mask, before, after, |a, b| a || b)
}

/// Binary erosion with a cube of side `side`, using the reflected cube of
/// [`dilate`]. Voxels outside the volume never erode the mask.
pub fn erode(mask: &Volume<bool>, side: usize) -> Volume<bool> {
    let (before, after) = cube_extent(side);
    window_filter(mask, after, before, |a, b| a && b)
}

/// Binary closing (dilation then erosion) with a cube of side `side`.
///
/// Merges fragments closer than the cube and fills small gaps. A side of `1`
/// leaves the mask unchanged.
pub fn closing(mask: &Volume<bool>, side: usize) -> Volume<bool> {
    if side <= 1 {
        return mask.clone();
    }
    erode(&dilate(mask, side), side)
}

/// Grey-level maximum filter over a centered cube of side `2 * radius + 1`.
pub fn maximum_filter(volume: &IntensityVolume, radius: usize) -> IntensityVolume {
    window_filter(volume, radius, radius, f32::max)
}

/// Removes every 26-connected component of `mask` that touches a face of the volume.
pub fn clear_border(mask: &Volume<bool>) -> Volume<bool> {
    let labels = label_components(mask, Connectivity::Full);
    let mut touches = vec![false; labels.max_label() as usize + 1];
    for (index, &label) in labels.as_slice().iter().enumerate() {
        if label != 0 {
            let (z, y, x) = labels.coords(index);
            if labels.is_border(z, y, x) {
                touches[label as usize] = true;
            }
        }
    }
    labels.map(|label| label != 0 && !touches[label as usize])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(values: &[bool]) -> Volume<bool> {
        Volume::from_vec(1, 1, values.len(), values.to_vec()).unwrap()
    }

    #[test]
    fn closing_fills_gap_narrower_than_cube() {
        let mask = line(&[false, true, false, true, false, false]);
        let closed = closing(&mask, 2);
        assert_eq!(closed.as_slice(), &[false, true, true, true, false, false]);

        let wide_gap = line(&[false, true, false, false, true, false, false]);
        assert_eq!(closing(&wide_gap, 2).as_slice(), wide_gap.as_slice());
    }

    #[test]
    fn closing_with_unit_cube_is_identity() {
        let mask = line(&[true, false, true]);
        assert_eq!(closing(&mask, 1), mask);
    }

    #[test]
    fn closing_is_extensive_in_3d() {
        let mut mask = Volume::filled(7, 7, 7, false);
        mask.set(3, 3, 2, true);
        mask.set(3, 3, 4, true);
        mask.set(1, 1, 1, true);
        let closed = closing(&mask, 3);
        for (a, b) in mask.as_slice().iter().zip(closed.as_slice()) {
            assert!(!a || *b);
        }
        assert_eq!(closed.get(3, 3, 3), Some(true));
    }

    #[test]
    fn maximum_filter_spreads_peak() {
        let mut volume = IntensityVolume::filled(5, 5, 5, 0.0);
        volume.set(2, 2, 2, 9.0);
        let filtered = maximum_filter(&volume, 1);
        assert_eq!(filtered.get(1, 1, 1), Some(9.0));
        assert_eq!(filtered.get(3, 3, 3), Some(9.0));
        assert_eq!(filtered.get(0, 2, 2), Some(0.0));
    }

    #[test]
    fn clear_border_removes_touching_objects_only() {
        let mut mask = Volume::filled(5, 5, 5, false);
        mask.set(0, 2, 2, true);
        mask.set(1, 2, 2, true);
        mask.set(3, 3, 3, true);
        let cleared = clear_border(&mask);
        assert_eq!(cleared.count(), 1);
        assert_eq!(cleared.get(3, 3, 3), Some(true));
        assert_eq!(cleared.get(1, 2, 2), Some(false));
    }
}
