mod common;

use std::collections::BTreeSet;

use colocalization::synthetic::cube_volume;
use colocalization::{
    analyze, compute_distances, segment, HysteresisLevels, PixelSize, SegmentationMethod,
};
use common::synthetic_volume::{grid_centers, spot_channel};
use nalgebra::Point3;

#[test]
fn region_labels_match_labeled_volume() {
    let volume = spot_channel(&grid_centers(), [0.0; 3], 11);
    let labels = segment(
        &volume,
        1,
        None,
        SegmentationMethod::Hysteresis,
        HysteresisLevels::default(),
    )
    .unwrap();
    let regions = analyze(&volume, &labels, None).unwrap();

    let present: BTreeSet<u32> = labels.as_slice().iter().copied().filter(|&l| l != 0).collect();
    let recorded: BTreeSet<u32> = regions.regions.iter().map(|r| r.label).collect();
    assert_eq!(present, recorded);
    assert!(!recorded.contains(&0));
    assert_eq!(recorded.len(), 6);
    // Consecutive labels, ascending order.
    let ordered: Vec<u32> = regions.regions.iter().map(|r| r.label).collect();
    assert_eq!(ordered, (1..=6).collect::<Vec<u32>>());

    for region in &regions.regions {
        let count = labels.as_slice().iter().filter(|&&l| l == region.label).count();
        assert_eq!(region.area, count);

        let c = region.weighted_centroid;
        let (lo, hi) = (region.bbox_min, region.bbox_max);
        assert!(c.x >= lo.x as f64 && c.x <= hi.x as f64);
        assert!(c.y >= lo.y as f64 && c.y <= hi.y as f64);
        assert!(c.z >= lo.z as f64 && c.z <= hi.z as f64);
        assert!(region.min_intensity <= region.mean_intensity);
        assert!(region.mean_intensity <= region.max_intensity);
    }
}

#[test]
fn bright_cube_is_one_object_centered_on_the_cube() {
    let volume = cube_volume((15, 15, 15), (5, 5, 5), 5, 200.0, 10.0);
    let labels = segment(
        &volume,
        1,
        None,
        SegmentationMethod::Hysteresis,
        HysteresisLevels::new(0.5, 0.9).unwrap(),
    )
    .unwrap();
    let regions = analyze(&volume, &labels, None).unwrap();

    assert_eq!(regions.len(), 1);
    let region = &regions.regions[0];
    assert_eq!(region.area, 125);
    assert_eq!(region.weighted_centroid, Point3::new(7.0, 7.0, 7.0));
    assert_eq!(regions.positions[0], region.weighted_centroid);
}

#[test]
fn unit_pixel_size_keeps_voxel_coordinates() {
    let volume = spot_channel(&grid_centers(), [0.0; 3], 5);
    let labels = segment(
        &volume,
        1,
        None,
        SegmentationMethod::Hysteresis,
        HysteresisLevels::default(),
    )
    .unwrap();
    let plain = analyze(&volume, &labels, None).unwrap();
    let unit = analyze(&volume, &labels, Some(&PixelSize::unit())).unwrap();
    assert_eq!(plain.positions, unit.positions);
    for (region, position) in plain.regions.iter().zip(&plain.positions) {
        assert_eq!(region.weighted_centroid, *position);
    }
}

#[test]
fn report_sizes_are_asymmetric() {
    let a = vec![Point3::new(0.0, 0.0, 0.0), Point3::new(0.0, 0.0, 1.0)];
    let b = vec![Point3::new(0.0, 0.0, 0.5)];
    let reports = compute_distances(&[a, b], f64::INFINITY, None).unwrap();
    assert_eq!(reports[0].channels, (0, 1));
    assert_eq!(reports[0].len(), 2);
    assert_eq!(reports[1].channels, (1, 0));
    assert_eq!(reports[1].len(), 1);
}

#[test]
fn channel_count_gives_ordered_pair_count() {
    let positions = vec![vec![Point3::origin()]; 4];
    let reports = compute_distances(&positions, 1.0, None).unwrap();
    assert_eq!(reports.len(), 12);
    let expected: Vec<(usize, usize)> = (0..4)
        .flat_map(|a| (0..4).filter(move |&b| b != a).map(move |b| (a, b)))
        .collect();
    let found: Vec<(usize, usize)> = reports.iter().map(|r| r.channels).collect();
    assert_eq!(found, expected);
    assert!(reports.iter().all(|r| r.len() == 1 && r.distances[0] == 0.0));
}
