//! # Colocalization Library
//!
//! The `colocalization` library detects bright punctate objects ("spots") in
//! each channel of a 3D fluorescence-microscopy volume, measures them, and
//! quantifies how close the spots of every channel lie to the spots of every
//! other channel in calibrated physical space.
//!
//! ## Overview of Modules
//!
//! - **`segmenter`**: Turns one channel's intensity volume into a labeled volume
//!   (Otsu threshold, optional Gaussian smoothing, hysteresis or local-maximum
//!   seeded thresholding, closing, border clearing, 26-connected labeling).
//!
//! - **`region_analyzer`**: Measures every labeled object (area, centroid,
//!   intensity-weighted centroid, intensity statistics) and scales the weighted
//!   centroids into physical units.
//!
//! - **`cross_channel_matcher`**: For every ordered channel pair, finds each
//!   spot's nearest partner in the other channel under a pixel-size weighted
//!   Euclidean metric and keeps those closer than a cutoff.
//!
//! - **`pipeline`**: Orchestrates the three stages over all channels, running
//!   per-channel work and per-pair work in parallel.
//!
//! - **`volume`** / **`hyperstack`**: Flat 3D buffers and the 5D `Z, C, T, Y, X`
//!   acquisition layout they are sliced from.
//!
//! - **`config`**: Serde-backed pipeline configuration.
//!
//! - **`threshold`**, **`gaussian_filter`**, **`morphology`**, **`labeling`**,
//!   **`peak_detection`**: The image-processing building blocks.
//!
//! - **`synthetic`**: Reproducible synthetic volumes for tests and demos.

pub mod config;
pub mod cross_channel_matcher;
pub mod error;
pub mod gaussian_filter;
pub mod hyperstack;
pub mod labeling;
pub mod morphology;
pub mod peak_detection;
pub mod pipeline;
pub mod pixel_size;
pub mod region_analyzer;
pub mod segmenter;
pub mod synthetic;
pub mod threshold;
pub mod volume;

pub use config::PipelineConfig;
pub use cross_channel_matcher::{compute_distances, CrossChannelMatcher, NeighborSearch, PairwiseDistances};
pub use error::{ColocalizationError, Result};
pub use pipeline::{ChannelAnalysis, ColocalizationPipeline, ColocalizationResult};
pub use pixel_size::PixelSize;
pub use region_analyzer::{analyze, ChannelRegions, RegionProperties};
pub use segmenter::{segment, HysteresisLevels, SegmentationMethod, SegmentationParams, Segmenter};
pub use volume::{IntensityVolume, LabelVolume, Volume};

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
