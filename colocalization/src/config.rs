use serde::{Deserialize, Serialize};

use crate::cross_channel_matcher::NeighborSearch;
use crate::error::Result;
use crate::pixel_size::PixelSize;
use crate::segmenter::{HysteresisLevels, SegmentationMethod, SegmentationParams};

/// Configuration of the whole pipeline, as read from JSON.
///
/// The smoothing sigma used during segmentation and the physical distance
/// cutoff used during matching are separate fields; they have unrelated units.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub segmentation: SegmentationConfig,
    pub matching: MatchingConfig,
    /// Physical voxel size; `None` keeps everything in voxel units.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pixel_size: Option<PixelSize>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SegmentationConfig {
    /// Closing cube side and minimum peak separation, in voxels.
    pub min_distance: usize,
    /// Standard deviation of the Gaussian pre-filter in voxels; no smoothing when absent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub smoothing_sigma: Option<f64>,
    pub method: SegmentationMethod,
    pub hysteresis_levels: HysteresisLevels,
}

impl Default for SegmentationConfig {
    fn default() -> Self {
        SegmentationConfig {
            min_distance: 1,
            smoothing_sigma: None,
            method: SegmentationMethod::Hysteresis,
            hysteresis_levels: HysteresisLevels::default(),
        }
    }
}

impl SegmentationConfig {
    pub fn to_params(&self) -> Result<SegmentationParams> {
        SegmentationParams::new(
            self.min_distance,
            self.smoothing_sigma,
            self.method,
            self.hysteresis_levels,
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchingConfig {
    /// Spots farther than this (in physical units) from every spot of the
    /// other channel are left out of the report.
    pub distance_cutoff: f64,
    pub search: NeighborSearch,
}

impl Default for MatchingConfig {
    fn default() -> Self {
        MatchingConfig {
            distance_cutoff: 1.0,
            search: NeighborSearch::BruteForce,
        }
    }
}

impl PipelineConfig {
    /// Checks every field, returning the validated segmentation parameters.
    pub fn validate(&self) -> Result<SegmentationParams> {
        if let Some(size) = &self.pixel_size {
            size.validate()?;
        }
        self.segmentation.to_params()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_json_gives_defaults() {
        let config: PipelineConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config, PipelineConfig::default());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn parses_full_config() {
        let json = r#"{
            "segmentation": {
                "min_distance": 3,
                "smoothing_sigma": 1.5,
                "method": "local_max",
                "hysteresis_levels": { "low": 0.4, "high": 0.8 }
            },
            "matching": { "distance_cutoff": 0.5, "search": "kd_tree" },
            "pixel_size": { "x": 0.1, "y": 0.1, "z": 0.3 }
        }"#;
        let config: PipelineConfig = serde_json::from_str(json).unwrap();
        let params = config.validate().unwrap();
        assert_eq!(params.min_distance(), 3);
        assert_eq!(params.method(), SegmentationMethod::LocalMax);
        assert_eq!(config.matching.search, NeighborSearch::KdTree);
        assert_eq!(config.pixel_size.map(|p| p.z), Some(0.3));
    }

    #[test]
    fn unknown_method_is_rejected_while_parsing() {
        let json = r#"{ "segmentation": { "method": "watershed" } }"#;
        assert!(serde_json::from_str::<PipelineConfig>(json).is_err());
    }

    #[test]
    fn invalid_values_fail_validation() {
        let mut config = PipelineConfig::default();
        config.segmentation.min_distance = 0;
        assert!(config.validate().is_err());

        let mut config = PipelineConfig::default();
        config.pixel_size = Some(PixelSize { x: 0.1, y: 0.0, z: 0.3 });
        assert!(config.validate().is_err());
    }
}
