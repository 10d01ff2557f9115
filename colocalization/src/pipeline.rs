use log::{info, warn};
use rayon::prelude::*;
use serde::Serialize;

use crate::config::PipelineConfig;
use crate::cross_channel_matcher::{CrossChannelMatcher, PairwiseDistances};
use crate::error::{ColocalizationError, Result};
use crate::hyperstack::Hyperstack;
use crate::region_analyzer::{analyze, ChannelRegions};
use crate::segmenter::{SegmentationSummary, Segmenter};
use crate::volume::{IntensityVolume, LabelVolume};

/// Everything computed for one channel.
#[derive(Debug, Clone, Serialize)]
pub struct ChannelAnalysis {
    /// Index of the channel in the input.
    pub channel: usize,
    /// Labeled volume produced by segmentation.
    #[serde(skip)]
    pub labels: LabelVolume,
    /// Region records and their physical positions.
    #[serde(flatten)]
    pub regions: ChannelRegions,
    pub summary: SegmentationSummary,
}

/// Output of a full pipeline run.
#[derive(Debug, Clone, Serialize)]
pub struct ColocalizationResult {
    pub channels: Vec<ChannelAnalysis>,
    pub distances: Vec<PairwiseDistances>,
}

impl ColocalizationResult {
    /// The report for the ordered pair `(a, b)`, if both channels exist.
    pub fn pair(&self, a: usize, b: usize) -> Option<&PairwiseDistances> {
        self.distances.iter().find(|d| d.channels == (a, b))
    }
}

/// Runs segmentation, region analysis and cross-channel matching over a set
/// of channels.
///
/// The per-channel stages run in parallel across channels. Matching starts
/// only once every channel's positions are available, and its pair reports
/// are computed in parallel too.
pub struct ColocalizationPipeline {
    /// Validated configuration.
    config: PipelineConfig,

    /// Segmenter shared by all channels.
    segmenter: Segmenter,

    /// Matcher configured with the distance cutoff and the pixel-size weights.
    matcher: CrossChannelMatcher,
}

impl ColocalizationPipeline {
    /// Validates `config` and prepares the stages.
    ///
    /// # Errors
    /// [`ColocalizationError::InvalidParameter`] for any invalid setting, so
    /// that configuration problems surface before any data is processed.
    pub fn new(config: PipelineConfig) -> Result<Self> {
        let params = config.validate()?;
        let matcher = CrossChannelMatcher::new(
            config.matching.distance_cutoff,
            config.pixel_size.as_ref(),
            config.matching.search,
        );
        Ok(ColocalizationPipeline {
            config,
            segmenter: Segmenter::new(params),
            matcher,
        })
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Segments and measures a single channel.
    pub fn analyze_channel(&self, channel: usize, volume: &IntensityVolume) -> Result<ChannelAnalysis> {
        let (labels, summary) = self.segmenter.segment_with_summary(volume)?;
        let regions = analyze(volume, &labels, self.config.pixel_size.as_ref())?;
        if regions.is_empty() {
            warn!("channel {channel}: no objects detected");
        }
        Ok(ChannelAnalysis {
            channel,
            labels,
            regions,
            summary,
        })
    }

    /// Segments and measures every channel, in parallel. Results keep the
    /// input order.
    pub fn analyze_channels(&self, volumes: &[IntensityVolume]) -> Result<Vec<ChannelAnalysis>> {
        volumes
            .par_iter()
            .enumerate()
            .map(|(channel, volume)| self.analyze_channel(channel, volume))
            .collect()
    }

    /// Runs the whole pipeline.
    ///
    /// # Errors
    /// [`ColocalizationError::InsufficientChannels`] when fewer than two
    /// volumes are given; errors from the per-channel stages are propagated.
    pub fn run(&self, volumes: &[IntensityVolume]) -> Result<ColocalizationResult> {
        if volumes.len() < 2 {
            return Err(ColocalizationError::InsufficientChannels {
                found: volumes.len(),
            });
        }
        if let Some(first) = volumes.first() {
            for volume in &volumes[1..] {
                first.ensure_same_shape(volume)?;
            }
        }

        let channels = self.analyze_channels(volumes)?;

        let positions: Vec<_> = channels
            .iter()
            .map(|c| c.regions.positions.clone())
            .collect();
        let distances = self.matcher.match_channels(&positions)?;

        info!(
            "analyzed {} channels: {:?} objects, {} pair reports",
            channels.len(),
            channels.iter().map(|c| c.regions.len()).collect::<Vec<_>>(),
            distances.len()
        );
        Ok(ColocalizationResult { channels, distances })
    }

    /// Runs the pipeline on every channel of `stack` at timepoint `t`.
    pub fn run_hyperstack(&self, stack: &Hyperstack, t: usize) -> Result<ColocalizationResult> {
        let volumes = stack.channel_volumes(t)?;
        self.run(&volumes)
    }
}
