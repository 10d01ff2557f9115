use colocalization::synthetic::SpotField;
use colocalization::IntensityVolume;
use nalgebra::Point3;

pub const SHAPE: (usize, usize, usize) = (16, 48, 48);

/// Six well separated spot centers (x, y, z) on integer voxel positions.
pub fn grid_centers() -> Vec<Point3<f64>> {
    (0..6)
        .map(|i| {
            let i = i as f64;
            let z = if i % 2.0 == 0.0 { 6.0 } else { 10.0 };
            Point3::new(10.0 + 4.0 * i, 6.0 + 7.0 * i, z)
        })
        .collect()
}

/// Renders `centers` shifted by `shift` voxels into a noisy volume.
pub fn spot_channel(centers: &[Point3<f64>], shift: [f64; 3], seed: u64) -> IntensityVolume {
    let shifted = centers
        .iter()
        .map(|c| Point3::new(c.x + shift[0], c.y + shift[1], c.z + shift[2]))
        .collect();
    SpotField::new(shifted).render(SHAPE, seed)
}
