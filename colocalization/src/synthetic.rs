//! Synthetic volumes for tests and demos.
//!
//! - `cube_volume`: a single bright cube on a flat background.
//! - `SpotField`: Gaussian spots on a noisy background, reproducible from a seed.
//! - `colocalized_spot_fields`: several channels sharing jittered spot positions.

use nalgebra::Point3;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::volume::IntensityVolume;

/// A volume of `shape` (`z, y, x`) filled with `background`, with a cube of
/// side `side` and value `foreground` whose lowest corner is `origin` (`z, y, x`).
pub fn cube_volume(
    shape: (usize, usize, usize),
    origin: (usize, usize, usize),
    side: usize,
    foreground: f32,
    background: f32,
) -> IntensityVolume {
    let mut volume = IntensityVolume::filled(shape.0, shape.1, shape.2, background);
    for z in origin.0..(origin.0 + side).min(shape.0) {
        for y in origin.1..(origin.1 + side).min(shape.1) {
            for x in origin.2..(origin.2 + side).min(shape.2) {
                volume.set(z, y, x, foreground);
            }
        }
    }
    volume
}

/// Gaussian spots rendered on a uniform background with additive uniform noise.
#[derive(Debug, Clone)]
pub struct SpotField {
    /// Spot centers in voxel units (`x` column, `y` row, `z` plane).
    pub centers: Vec<Point3<f64>>,
    /// Peak height of each spot above the background.
    pub amplitude: f32,
    /// Spot standard deviation in voxels.
    pub spot_sigma: f64,
    pub background: f32,
    /// Noise is drawn uniformly from `[0, noise)`.
    pub noise: f32,
}

impl SpotField {
    pub fn new(centers: Vec<Point3<f64>>) -> Self {
        SpotField {
            centers,
            amplitude: 1000.0,
            spot_sigma: 1.0,
            background: 100.0,
            noise: 20.0,
        }
    }

    /// Renders the field into a volume of `shape` (`z, y, x`).
    pub fn render(&self, shape: (usize, usize, usize), seed: u64) -> IntensityVolume {
        let mut rng = StdRng::seed_from_u64(seed);
        let mut volume = IntensityVolume::filled(shape.0, shape.1, shape.2, self.background);
        if self.noise > 0.0 {
            for v in volume.as_mut_slice() {
                *v += rng.random_range(0.0..self.noise);
            }
        }

        let reach = (4.0 * self.spot_sigma).ceil() as isize;
        let denom = 2.0 * self.spot_sigma * self.spot_sigma;
        for center in &self.centers {
            let (cz, cy, cx) = (
                center.z.round() as isize,
                center.y.round() as isize,
                center.x.round() as isize,
            );
            for z in (cz - reach).max(0)..=(cz + reach).min(shape.0 as isize - 1) {
                for y in (cy - reach).max(0)..=(cy + reach).min(shape.1 as isize - 1) {
                    for x in (cx - reach).max(0)..=(cx + reach).min(shape.2 as isize - 1) {
                        let d2 = (x as f64 - center.x).powi(2)
                            + (y as f64 - center.y).powi(2)
                            + (z as f64 - center.z).powi(2);
                        let value = self.amplitude as f64 * (-d2 / denom).exp();
                        let index = volume.index(z as usize, y as usize, x as usize);
                        volume.as_mut_slice()[index] += value as f32;
                    }
                }
            }
        }
        volume
    }
}

/// Draws `count` spot centers at least `margin` voxels away from every face.
pub fn random_centers(
    count: usize,
    shape: (usize, usize, usize),
    margin: f64,
    rng: &mut impl Rng,
) -> Vec<Point3<f64>> {
    let upper = |size: usize| (size as f64 - 1.0 - margin).max(margin);
    (0..count)
        .map(|_| {
            Point3::new(
                sample(rng, margin, upper(shape.2)),
                sample(rng, margin, upper(shape.1)),
                sample(rng, margin, upper(shape.0)),
            )
        })
        .collect()
}

fn sample(rng: &mut impl Rng, low: f64, high: f64) -> f64 {
    if high > low {
        rng.random_range(low..high)
    } else {
        low
    }
}

/// Builds `channels` spot fields that share the same spots, each channel's
/// copy displaced by up to `jitter` voxels per axis.
pub fn colocalized_spot_fields(
    channels: usize,
    spots: usize,
    shape: (usize, usize, usize),
    jitter: f64,
    seed: u64,
) -> Vec<SpotField> {
    let mut rng = StdRng::seed_from_u64(seed);
    let shared = random_centers(spots, shape, 4.0 + jitter, &mut rng);
    (0..channels)
        .map(|_| {
            let centers = shared
                .iter()
                .map(|c| {
                    let mut offset = || sample(&mut rng, -jitter, jitter);
                    Point3::new(c.x + offset(), c.y + offset(), c.z + offset())
                })
                .collect();
            SpotField::new(centers)
        })
        .collect()
}
