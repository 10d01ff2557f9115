use std::collections::HashMap;

use crate::morphology::maximum_filter;
use crate::volume::IntensityVolume;

/// A local intensity maximum at voxel `(z, y, x)`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Peak {
    pub z: usize,
    pub y: usize,
    pub x: usize,
    pub intensity: f32,
}

impl Peak {
    fn chebyshev_distance(&self, other: &Peak) -> usize {
        self.z
            .abs_diff(other.z)
            .max(self.y.abs_diff(other.y))
            .max(self.x.abs_diff(other.x))
    }
}

/// Finds local maxima separated by more than `min_distance` voxels.
///
/// A voxel is a candidate when it equals the maximum of the cube of side
/// `2 * min_distance + 1` centered on it, its intensity is strictly above
/// `threshold_abs`, and it is at least `min_distance` voxels away from every
/// face of the volume. Flat plateaus produce several equal candidates; these
/// are thinned greedily, brightest first (raster order among equals), so
/// that accepted peaks are more than `min_distance` apart in Chebyshev
/// distance.
///
/// Peaks are returned brightest first.
pub fn peak_local_max(volume: &IntensityVolume, min_distance: usize, threshold_abs: f32) -> Vec<Peak> {
    let (size_z, size_y, size_x) = volume.shape();
    let min_distance = min_distance.max(1);
    if size_z <= 2 * min_distance || size_y <= 2 * min_distance || size_x <= 2 * min_distance {
        return Vec::new();
    }

    let local_max = maximum_filter(volume, min_distance);
    let mut candidates = Vec::new();
    for z in min_distance..size_z - min_distance {
        for y in min_distance..size_y - min_distance {
            for x in min_distance..size_x - min_distance {
                let index = volume.index(z, y, x);
                let intensity = volume.as_slice()[index];
                if intensity > threshold_abs && intensity == local_max.as_slice()[index] {
                    candidates.push(Peak { z, y, x, intensity });
                }
            }
        }
    }

    // Stable sort keeps raster order among equal intensities.
    candidates.sort_by(|a, b| b.intensity.total_cmp(&a.intensity));

    let mut accepted = AcceptedPeaks::new(min_distance);
    for candidate in candidates {
        accepted.try_accept(candidate);
    }
    accepted.peaks
}

/// Accepted peaks bucketed on a grid of cubes with side `min_distance + 1`.
///
/// Two peaks within `min_distance` of each other (Chebyshev) always sit in the
/// same or adjacent cells, so a candidate is checked against at most 27 cells.
struct AcceptedPeaks {
    min_distance: usize,
    cell_side: usize,
    peaks: Vec<Peak>,
    cells: HashMap<(usize, usize, usize), Vec<usize>>,
}

impl AcceptedPeaks {
    fn new(min_distance: usize) -> Self {
        AcceptedPeaks {
            min_distance,
            cell_side: min_distance + 1,
            peaks: Vec::new(),
            cells: HashMap::new(),
        }
    }

    fn cell(&self, peak: &Peak) -> (usize, usize, usize) {
        (
            peak.z / self.cell_side,
            peak.y / self.cell_side,
            peak.x / self.cell_side,
        )
    }

    fn is_isolated(&self, candidate: &Peak) -> bool {
        let (cz, cy, cx) = self.cell(candidate);
        for z in cz.saturating_sub(1)..=cz + 1 {
            for y in cy.saturating_sub(1)..=cy + 1 {
                for x in cx.saturating_sub(1)..=cx + 1 {
                    let Some(members) = self.cells.get(&(z, y, x)) else {
                        continue;
                    };
                    if members
                        .iter()
                        .any(|&i| self.peaks[i].chebyshev_distance(candidate) <= self.min_distance)
                    {
                        return false;
                    }
                }
            }
        }
        true
    }

    /// Keeps `candidate` unless an accepted peak lies within `min_distance`.
    fn try_accept(&mut self, candidate: Peak) {
        if self.is_isolated(&candidate) {
            let cell = self.cell(&candidate);
            self.cells.entry(cell).or_default().push(self.peaks.len());
            self.peaks.push(candidate);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finds_separated_peaks_above_floor() {
        let mut volume = IntensityVolume::filled(9, 9, 9, 1.0);
        volume.set(2, 2, 2, 10.0);
        volume.set(6, 6, 6, 8.0);
        volume.set(4, 4, 6, 3.0);
        let peaks = peak_local_max(&volume, 1, 5.0);
        assert_eq!(peaks.len(), 2);
        assert_eq!((peaks[0].z, peaks[0].y, peaks[0].x), (2, 2, 2));
        assert_eq!((peaks[1].z, peaks[1].y, peaks[1].x), (6, 6, 6));
    }

    #[test]
    fn excludes_border_peaks() {
        let mut volume = IntensityVolume::filled(7, 7, 7, 0.0);
        volume.set(0, 3, 3, 10.0);
        volume.set(3, 3, 1, 10.0);
        assert!(peak_local_max(&volume, 2, 1.0).is_empty());
        assert_eq!(peak_local_max(&volume, 1, 1.0).len(), 1);
    }

    #[test]
    fn plateau_yields_single_peak() {
        let mut volume = IntensityVolume::filled(7, 7, 7, 0.0);
        volume.set(3, 3, 3, 5.0);
        volume.set(3, 3, 4, 5.0);
        let peaks = peak_local_max(&volume, 1, 1.0);
        assert_eq!(peaks.len(), 1);
        assert_eq!((peaks[0].z, peaks[0].y, peaks[0].x), (3, 3, 3));
    }

    /// Greedy thinning against every accepted peak, for comparison.
    fn thin_exhaustively(volume: &IntensityVolume, min_distance: usize, floor: f32) -> Vec<Peak> {
        let (size_z, size_y, size_x) = volume.shape();
        let local_max = maximum_filter(volume, min_distance);
        let mut candidates = Vec::new();
        for z in min_distance..size_z - min_distance {
            for y in min_distance..size_y - min_distance {
                for x in min_distance..size_x - min_distance {
                    let intensity = volume.get(z, y, x).unwrap();
                    if intensity > floor && Some(intensity) == local_max.get(z, y, x) {
                        candidates.push(Peak { z, y, x, intensity });
                    }
                }
            }
        }
        candidates.sort_by(|a, b| b.intensity.total_cmp(&a.intensity));
        let mut accepted: Vec<Peak> = Vec::new();
        for candidate in candidates {
            if accepted
                .iter()
                .all(|p| p.chebyshev_distance(&candidate) > min_distance)
            {
                accepted.push(candidate);
            }
        }
        accepted
    }

    /// Uniform noise in `[100, 120)`. Quantized noise takes integer levels
    /// only, so that plateaus of equal maxima occur.
    fn noise_volume(shape: (usize, usize, usize), seed: u64, quantized: bool) -> IntensityVolume {
        use rand::rngs::StdRng;
        use rand::{Rng, SeedableRng};

        let mut rng = StdRng::seed_from_u64(seed);
        let mut volume = IntensityVolume::filled(shape.0, shape.1, shape.2, 0.0);
        for v in volume.as_mut_slice() {
            let noise: f32 = rng.random_range(0.0..20.0);
            *v = 100.0 + if quantized { noise.floor() } else { noise };
        }
        volume
    }

    #[test]
    fn noisy_volume_thinning_matches_exhaustive_search() {
        let volume = noise_volume((10, 40, 40), 3, true);
        for min_distance in [1, 2, 3] {
            let fast = peak_local_max(&volume, min_distance, 50.0);
            let reference = thin_exhaustively(&volume, min_distance, 50.0);
            assert!(!fast.is_empty());
            assert_eq!(fast, reference, "min_distance {min_distance}");
        }
    }

    #[test]
    fn large_noisy_volume_yields_well_separated_peaks() {
        let volume = noise_volume((16, 256, 256), 11, false);
        let peaks = peak_local_max(&volume, 1, 50.0);
        // Tens of thousands of maxima survive on pure noise.
        assert!(peaks.len() > 10_000, "{} peaks", peaks.len());
        let mut occupied = std::collections::HashSet::new();
        for peak in &peaks {
            // Cells of side 2 hold at most one peak when peaks are more than 1 apart.
            assert!(occupied.insert((peak.z / 2, peak.y / 2, peak.x / 2)));
        }
    }

    #[test]
    fn small_volume_has_no_interior() {
        let volume = IntensityVolume::filled(2, 2, 2, 3.0);
        assert!(peak_local_max(&volume, 1, 0.0).is_empty());
    }
}
