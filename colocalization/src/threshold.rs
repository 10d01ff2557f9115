use crate::labeling::{label_components, Connectivity};
use crate::volume::{IntensityVolume, Volume};

/// Number of histogram bins used by [`otsu_threshold`].
pub const OTSU_BINS: usize = 256;

/// Computes a global threshold with Otsu's method.
///
/// The histogram spans `[min, max]` of the volume in [`OTSU_BINS`] bins and
/// candidate thresholds are bin centers; voxels strictly above the returned
/// value form the foreground class. When several splits reach the same maximal
/// inter-class variance (typical of sparse, strongly bimodal histograms where
/// the bins between the two modes are empty) the mean of the tied bin centers
/// in the first contiguous run of ties is returned, which places the threshold
/// in the middle of the first gap.
///
/// Returns `None` for an empty volume, or when every sample is equal (or NaN),
/// as no split exists.
pub fn otsu_threshold(volume: &IntensityVolume) -> Option<f32> {
    let (min, max) = volume.min_max()?;
    if min >= max {
        return None;
    }

    let range = (max - min) as f64;
    let bin_width = range / OTSU_BINS as f64;
    let mut histogram = [0f64; OTSU_BINS];
    for &v in volume.as_slice() {
        if v.is_nan() {
            continue;
        }
        let bin = (((v - min) as f64 / range) * OTSU_BINS as f64) as usize;
        histogram[bin.min(OTSU_BINS - 1)] += 1.0;
    }
    let center = |i: usize| min as f64 + (i as f64 + 0.5) * bin_width;

    let total: f64 = histogram.iter().sum();
    let total_sum: f64 = histogram
        .iter()
        .enumerate()
        .map(|(i, &count)| count * center(i))
        .sum();

    // Inter-class variance for a split right after bin i.
    let mut variances = Vec::with_capacity(OTSU_BINS - 1);
    let mut weight_low = 0.0;
    let mut sum_low = 0.0;
    for (i, &count) in histogram.iter().enumerate().take(OTSU_BINS - 1) {
        weight_low += count;
        sum_low += count * center(i);
        let weight_high = total - weight_low;
        if weight_low == 0.0 || weight_high == 0.0 {
            variances.push(f64::NEG_INFINITY);
            continue;
        }
        let mean_low = sum_low / weight_low;
        let mean_high = (total_sum - sum_low) / weight_high;
        variances.push(weight_low * weight_high * (mean_low - mean_high).powi(2));
    }

    let best = variances.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    if !best.is_finite() {
        return None;
    }
    let tolerance = best.abs() * 1e-9;
    let is_best = |v: f64| v >= best - tolerance;
    let first = variances.iter().position(|&v| is_best(v))?;
    let (sum, count) = variances[first..]
        .iter()
        .take_while(|&&v| is_best(v))
        .enumerate()
        .fold((0.0, 0usize), |(sum, count), (offset, _)| {
            (sum + center(first + offset), count + 1)
        });
    Some((sum / count as f64) as f32)
}

/// Two-level hysteresis binarization.
///
/// A voxel is foreground when it is above `high`, or above `low` and connected
/// through above-`low` face neighbors to a voxel above `high`.
pub fn hysteresis_threshold(volume: &IntensityVolume, low: f32, high: f32) -> Volume<bool> {
    let mask_low = volume.map(|v| v > low);
    let candidates = label_components(&mask_low, Connectivity::Face);

    let mut keep = vec![false; candidates.max_label() as usize + 1];
    for (&label, &v) in candidates.as_slice().iter().zip(volume.as_slice()) {
        if label != 0 && v > high {
            keep[label as usize] = true;
        }
    }
    candidates.map(|label| label != 0 && keep[label as usize])
}
