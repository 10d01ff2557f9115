use crate::error::{ColocalizationError, Result};
use crate::volume::IntensityVolume;

/// Kernel half-width in standard deviations.
const TRUNCATE: f64 = 4.0;

/// Builds a normalised 1D Gaussian kernel of radius `round(4 * sigma)`.
fn gaussian_kernel(sigma: f64) -> Vec<f32> {
    let radius = (TRUNCATE * sigma + 0.5) as isize;
    let denom = 2.0 * sigma * sigma;
    let taps: Vec<f64> = (-radius..=radius)
        .map(|i| (-((i * i) as f64) / denom).exp())
        .collect();
    let sum: f64 = taps.iter().sum();
    taps.into_iter().map(|t| (t / sum) as f32).collect()
}

/// Convolves `src` with `kernel` along one axis, replicating edge samples.
///
/// `stride` is the distance between consecutive samples along the axis and
/// `len` the number of samples on it.
fn convolve_axis(src: &[f32], dst: &mut [f32], kernel: &[f32], stride: usize, len: usize) {
    let radius = (kernel.len() / 2) as isize;
    let last = len as isize - 1;
    for (index, out) in dst.iter_mut().enumerate() {
        let pos = ((index / stride) % len) as isize;
        let base = index - pos as usize * stride;
        let mut acc = 0.0f32;
        for (k, &tap) in kernel.iter().enumerate() {
            let sample = (pos + k as isize - radius).clamp(0, last) as usize;
            acc += tap * src[base + sample * stride];
        }
        *out = acc;
    }
}

/// Isotropic Gaussian smoothing of a volume.
///
/// The filter is applied separably along x, y and z with a kernel truncated
/// at four standard deviations. Samples beyond the volume are taken from the
/// nearest edge voxel. Output values stay in the input's intensity units.
///
/// # Errors
/// `sigma` must be finite and strictly positive.
pub fn gaussian_smooth(volume: &IntensityVolume, sigma: f64) -> Result<IntensityVolume> {
    if !sigma.is_finite() || sigma <= 0.0 {
        return Err(ColocalizationError::invalid(format!(
            "smoothing sigma must be positive and finite, got {sigma}"
        )));
    }
    if volume.is_empty() {
        return Ok(volume.clone());
    }

    let kernel = gaussian_kernel(sigma);
    let (size_z, size_y, size_x) = volume.shape();
    let mut current = volume.as_slice().to_vec();
    let mut scratch = vec![0.0f32; current.len()];

    for (stride, len) in [(1, size_x), (size_x, size_y), (size_x * size_y, size_z)] {
        if len > 1 {
            convolve_axis(&current, &mut scratch, &kernel, stride, len);
            std::mem::swap(&mut current, &mut scratch);
        }
    }

    IntensityVolume::from_vec(size_z, size_y, size_x, current)
}
