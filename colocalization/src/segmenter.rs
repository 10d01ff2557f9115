use std::fmt;
use std::str::FromStr;

use log::{debug, warn};
use serde::{Deserialize, Serialize};

use crate::error::{ColocalizationError, Result};
use crate::gaussian_filter::gaussian_smooth;
use crate::labeling::{label_components, Connectivity};
use crate::morphology::{clear_border, closing};
use crate::peak_detection::peak_local_max;
use crate::threshold::{hysteresis_threshold, otsu_threshold};
use crate::volume::{IntensityVolume, LabelVolume};

/// Fraction of the Otsu threshold used as the intensity floor for peak detection.
const PEAK_FLOOR_RATIO: f32 = 0.5;

/// How foreground voxels are selected before closing and labeling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SegmentationMethod {
    /// Hysteresis thresholding around the Otsu threshold.
    #[default]
    Hysteresis,
    /// Local maxima are promoted to the volume maximum before hysteresis
    /// thresholding, so that dim but well-formed spots survive.
    LocalMax,
}

impl FromStr for SegmentationMethod {
    type Err = ColocalizationError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "hysteresis" => Ok(SegmentationMethod::Hysteresis),
            "local_max" => Ok(SegmentationMethod::LocalMax),
            other => Err(ColocalizationError::invalid(format!(
                "unknown segmentation method '{other}', expected 'hysteresis' or 'local_max'"
            ))),
        }
    }
}

impl fmt::Display for SegmentationMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SegmentationMethod::Hysteresis => write!(f, "hysteresis"),
            SegmentationMethod::LocalMax => write!(f, "local_max"),
        }
    }
}

/// Low and high hysteresis levels as fractions of the Otsu threshold.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HysteresisLevels {
    pub low: f32,
    pub high: f32,
}

impl Default for HysteresisLevels {
    fn default() -> Self {
        HysteresisLevels { low: 0.5, high: 0.9 }
    }
}

impl HysteresisLevels {
    /// Both ratios must lie in `(0, 1]` and `low` may not exceed `high`.
    pub fn new(low: f32, high: f32) -> Result<Self> {
        let levels = HysteresisLevels { low, high };
        levels.validate()?;
        Ok(levels)
    }

    pub fn validate(&self) -> Result<()> {
        for (name, ratio) in [("low", self.low), ("high", self.high)] {
            if !ratio.is_finite() || ratio <= 0.0 || ratio > 1.0 {
                return Err(ColocalizationError::invalid(format!(
                    "{name} hysteresis level must be in (0, 1], got {ratio}"
                )));
            }
        }
        if self.low > self.high {
            return Err(ColocalizationError::invalid(format!(
                "low hysteresis level {} exceeds high level {}",
                self.low, self.high
            )));
        }
        Ok(())
    }
}

/// Validated segmentation parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SegmentationParams {
    min_distance: usize,
    smoothing_sigma: Option<f64>,
    method: SegmentationMethod,
    hysteresis_levels: HysteresisLevels,
}

impl SegmentationParams {
    /// Checks every parameter so that segmentation itself cannot fail on
    /// configuration.
    ///
    /// # Errors
    /// [`ColocalizationError::InvalidParameter`] when `min_distance` is zero,
    /// `smoothing_sigma` is present but not positive and finite, or the
    /// hysteresis levels are out of range.
    pub fn new(
        min_distance: usize,
        smoothing_sigma: Option<f64>,
        method: SegmentationMethod,
        hysteresis_levels: HysteresisLevels,
    ) -> Result<Self> {
        if min_distance == 0 {
            return Err(ColocalizationError::invalid(
                "min_distance must be a positive voxel count",
            ));
        }
        if let Some(sigma) = smoothing_sigma {
            if !sigma.is_finite() || sigma <= 0.0 {
                return Err(ColocalizationError::invalid(format!(
                    "smoothing sigma must be positive and finite, got {sigma}"
                )));
            }
        }
        hysteresis_levels.validate()?;
        Ok(SegmentationParams {
            min_distance,
            smoothing_sigma,
            method,
            hysteresis_levels,
        })
    }

    pub fn min_distance(&self) -> usize {
        self.min_distance
    }

    pub fn smoothing_sigma(&self) -> Option<f64> {
        self.smoothing_sigma
    }

    pub fn method(&self) -> SegmentationMethod {
        self.method
    }

    pub fn hysteresis_levels(&self) -> HysteresisLevels {
        self.hysteresis_levels
    }
}

impl Default for SegmentationParams {
    fn default() -> Self {
        SegmentationParams {
            min_distance: 1,
            smoothing_sigma: None,
            method: SegmentationMethod::default(),
            hysteresis_levels: HysteresisLevels::default(),
        }
    }
}

/// What happened while segmenting one channel.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct SegmentationSummary {
    /// Otsu threshold of the raw channel; `None` for a flat or empty channel.
    pub threshold: Option<f32>,
    /// Number of local maxima promoted before thresholding (`local_max` only).
    pub seeded_peaks: usize,
    /// Number of labeled objects in the result.
    pub object_count: usize,
}

/// Turns one channel's intensity volume into a labeled volume.
///
/// 1. Global Otsu threshold of the raw channel.
/// 2. Optional Gaussian smoothing.
/// 3. Hysteresis thresholding (after peak promotion for `local_max`).
/// 4. Closing with a cube of side `min_distance`.
/// 5. Removal of objects touching the volume border.
/// 6. 26-connected labeling.
#[derive(Debug, Clone, Default)]
pub struct Segmenter {
    params: SegmentationParams,
}

impl Segmenter {
    pub fn new(params: SegmentationParams) -> Self {
        Segmenter { params }
    }

    pub fn params(&self) -> &SegmentationParams {
        &self.params
    }

    /// Segments `channel`, returning its labeled volume.
    pub fn segment(&self, channel: &IntensityVolume) -> Result<LabelVolume> {
        self.segment_with_summary(channel).map(|(labels, _)| labels)
    }

    /// Segments `channel`, also reporting the threshold and object count.
    ///
    /// A flat channel has no meaningful threshold and yields an all-background
    /// volume; this is a valid, empty result.
    pub fn segment_with_summary(
        &self,
        channel: &IntensityVolume,
    ) -> Result<(LabelVolume, SegmentationSummary)> {
        let (size_z, size_y, size_x) = channel.shape();
        let Some(threshold) = otsu_threshold(channel) else {
            warn!("channel of shape {:?} is flat, no objects segmented", channel.shape());
            return Ok((
                LabelVolume::filled(size_z, size_y, size_x, 0),
                SegmentationSummary::default(),
            ));
        };

        let smoothed = match self.params.smoothing_sigma {
            Some(sigma) => gaussian_smooth(channel, sigma)?,
            None => channel.clone(),
        };

        let levels = self.params.hysteresis_levels;
        let low = threshold * levels.low;
        let high = threshold * levels.high;

        let mut seeded_peaks = 0;
        let thresholded = match self.params.method {
            SegmentationMethod::Hysteresis => hysteresis_threshold(&smoothed, low, high),
            SegmentationMethod::LocalMax => {
                let peaks = peak_local_max(
                    &smoothed,
                    self.params.min_distance,
                    threshold * PEAK_FLOOR_RATIO,
                );
                seeded_peaks = peaks.len();
                let mut promoted = smoothed;
                if let Some((_, max)) = promoted.min_max() {
                    for peak in &peaks {
                        promoted.set(peak.z, peak.y, peak.x, max);
                    }
                }
                hysteresis_threshold(&promoted, low, high)
            }
        };

        let closed = closing(&thresholded, self.params.min_distance);
        let cleared = clear_border(&closed);
        let labels = label_components(&cleared, Connectivity::Full);
        let object_count = labels.max_label() as usize;

        debug!(
            "segmented with {} method: threshold {:.3}, {} peaks seeded, {} objects",
            self.params.method, threshold, seeded_peaks, object_count
        );

        Ok((
            labels,
            SegmentationSummary {
                threshold: Some(threshold),
                seeded_peaks,
                object_count,
            },
        ))
    }
}

/// Convenience wrapper: validates the parameters and segments `channel`.
pub fn segment(
    channel: &IntensityVolume,
    min_distance: usize,
    smoothing_sigma: Option<f64>,
    method: SegmentationMethod,
    hysteresis_levels: HysteresisLevels,
) -> Result<LabelVolume> {
    let params = SegmentationParams::new(min_distance, smoothing_sigma, method, hysteresis_levels)?;
    Segmenter::new(params).segment(channel)
}
