use std::collections::BTreeMap;

use log::debug;
use nalgebra::Point3;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::pixel_size::PixelSize;
use crate::volume::{IntensityVolume, LabelVolume};

/// Properties of one labeled object.
///
/// Coordinates are in voxel units with `x` the column, `y` the row and `z` the
/// plane index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegionProperties {
    /// Label of the object in the labeled volume (never `0`).
    pub label: u32,
    /// Number of voxels carrying `label`.
    pub area: usize,
    /// Unweighted mean voxel coordinate.
    pub centroid: Point3<f64>,
    /// Mean voxel coordinate weighted by raw intensity.
    pub weighted_centroid: Point3<f64>,
    pub max_intensity: f64,
    pub mean_intensity: f64,
    pub min_intensity: f64,
    /// Sum of raw intensity over the object.
    pub integrated_intensity: f64,
    /// Inclusive lower corner of the object's bounding box.
    pub bbox_min: Point3<usize>,
    /// Inclusive upper corner of the object's bounding box.
    pub bbox_max: Point3<usize>,
}

/// Running sums for one label.
struct RegionAccumulator {
    area: usize,
    coord_sum: [f64; 3],
    weighted_sum: [f64; 3],
    intensity_sum: f64,
    max_intensity: f64,
    min_intensity: f64,
    bbox_min: [usize; 3],
    bbox_max: [usize; 3],
}

impl RegionAccumulator {
    fn new() -> Self {
        RegionAccumulator {
            area: 0,
            coord_sum: [0.0; 3],
            weighted_sum: [0.0; 3],
            intensity_sum: 0.0,
            max_intensity: f64::NEG_INFINITY,
            min_intensity: f64::INFINITY,
            bbox_min: [usize::MAX; 3],
            bbox_max: [0; 3],
        }
    }

    /// `coords` is `[x, y, z]`.
    fn add(&mut self, coords: [usize; 3], intensity: f64) {
        self.area += 1;
        for axis in 0..3 {
            let c = coords[axis] as f64;
            self.coord_sum[axis] += c;
            self.weighted_sum[axis] += c * intensity;
            self.bbox_min[axis] = self.bbox_min[axis].min(coords[axis]);
            self.bbox_max[axis] = self.bbox_max[axis].max(coords[axis]);
        }
        self.intensity_sum += intensity;
        self.max_intensity = self.max_intensity.max(intensity);
        self.min_intensity = self.min_intensity.min(intensity);
    }

    fn finish(&self, label: u32) -> RegionProperties {
        let n = self.area as f64;
        let centroid = Point3::new(
            self.coord_sum[0] / n,
            self.coord_sum[1] / n,
            self.coord_sum[2] / n,
        );
        // Zero total weight would divide by zero; the geometric center stands in.
        let weighted_centroid = if self.intensity_sum != 0.0 {
            Point3::new(
                self.weighted_sum[0] / self.intensity_sum,
                self.weighted_sum[1] / self.intensity_sum,
                self.weighted_sum[2] / self.intensity_sum,
            )
        } else {
            centroid
        };
        RegionProperties {
            label,
            area: self.area,
            centroid,
            weighted_centroid,
            max_intensity: self.max_intensity,
            mean_intensity: self.intensity_sum / n,
            min_intensity: self.min_intensity,
            integrated_intensity: self.intensity_sum,
            bbox_min: Point3::new(self.bbox_min[0], self.bbox_min[1], self.bbox_min[2]),
            bbox_max: Point3::new(self.bbox_max[0], self.bbox_max[1], self.bbox_max[2]),
        }
    }
}

/// Region records of one channel with their physical-unit positions.
///
/// `positions[i]` is the scaled weighted centroid of `regions[i]`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChannelRegions {
    pub regions: Vec<RegionProperties>,
    pub positions: Vec<Point3<f64>>,
}

impl ChannelRegions {
    pub fn len(&self) -> usize {
        self.regions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.regions.is_empty()
    }

    /// Looks a region up by its label.
    pub fn region(&self, label: u32) -> Option<&RegionProperties> {
        self.regions
            .binary_search_by_key(&label, |r| r.label)
            .ok()
            .map(|i| &self.regions[i])
    }
}

/// Measures every labeled object of a channel in one pass.
///
/// Records come out in ascending label order; positions are the weighted
/// centroids scaled by `pixel_size` (voxel units when `None`).
///
/// # Errors
/// [`crate::ColocalizationError::ShapeMismatch`] when `raw` and `labels`
/// differ in shape.
pub fn analyze(
    raw: &IntensityVolume,
    labels: &LabelVolume,
    pixel_size: Option<&PixelSize>,
) -> Result<ChannelRegions> {
    raw.ensure_same_shape(labels)?;

    // Keyed by label so that sparse or very large label ids cost nothing extra.
    let mut accumulators: BTreeMap<u32, RegionAccumulator> = BTreeMap::new();
    for (index, (&label, &intensity)) in labels.as_slice().iter().zip(raw.as_slice()).enumerate() {
        if label == 0 {
            continue;
        }
        let (z, y, x) = labels.coords(index);
        accumulators
            .entry(label)
            .or_insert_with(RegionAccumulator::new)
            .add([x, y, z], intensity as f64);
    }

    let regions: Vec<RegionProperties> = accumulators
        .iter()
        .map(|(&label, acc)| acc.finish(label))
        .collect();

    let positions = regions
        .iter()
        .map(|r| match pixel_size {
            Some(size) => size.scale(&r.weighted_centroid),
            None => r.weighted_centroid,
        })
        .collect();

    debug!("measured {} regions", regions.len());
    Ok(ChannelRegions { regions, positions })
}
