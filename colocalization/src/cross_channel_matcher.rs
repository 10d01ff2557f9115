use kd_tree::{KdPoint, KdTree};
use log::{debug, warn};
use nalgebra::{DMatrix, Point3, Vector3};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::error::{ColocalizationError, Result};
use crate::pixel_size::PixelSize;

/// Relative slack added to the kd-tree search radius so that candidates tied
/// with the nearest neighbor are not lost to rounding.
const RADIUS_SLACK: f64 = 1e-9;

/// Strategy used to find each spot's nearest partner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NeighborSearch {
    /// Full `|A| × |B|` distance matrix.
    #[default]
    BruteForce,
    /// kd-tree over channel B, for large spot counts.
    KdTree,
}

/// One spot of channel A that has a partner in channel B within the cutoff.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ColocalizationEvent {
    /// Physical position of the spot in channel A.
    pub coord: Point3<f64>,
    /// Weighted Euclidean distance to the nearest spot of channel B.
    pub distance: f64,
    /// Index of that spot in channel B's position list.
    pub index_of_b: usize,
}

/// Nearest-neighbor report for the ordered channel pair `(A, B)`.
///
/// The three vectors are parallel: entry `i` describes the `i`-th retained
/// spot of A, in A's order.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PairwiseDistances {
    pub channels: (usize, usize),
    pub coord_of_a: Vec<Point3<f64>>,
    pub distances: Vec<f64>,
    pub index_of_b: Vec<usize>,
}

impl PairwiseDistances {
    fn new(channels: (usize, usize)) -> Self {
        PairwiseDistances {
            channels,
            ..Default::default()
        }
    }

    fn push(&mut self, event: ColocalizationEvent) {
        self.coord_of_a.push(event.coord);
        self.distances.push(event.distance);
        self.index_of_b.push(event.index_of_b);
    }

    pub fn len(&self) -> usize {
        self.distances.len()
    }

    pub fn is_empty(&self) -> bool {
        self.distances.is_empty()
    }

    pub fn events(&self) -> impl Iterator<Item = ColocalizationEvent> + '_ {
        self.coord_of_a
            .iter()
            .zip(&self.distances)
            .zip(&self.index_of_b)
            .map(|((&coord, &distance), &index_of_b)| ColocalizationEvent {
                coord,
                distance,
                index_of_b,
            })
    }
}

/// `sqrt(sum_i w_i * (a_i - b_i)^2)`.
#[inline]
pub fn weighted_distance(a: &Point3<f64>, b: &Point3<f64>, weights: &Vector3<f64>) -> f64 {
    let d = a - b;
    d.component_mul(&d).dot(weights).sqrt()
}

/// A channel-B spot in the kd-tree, coordinates pre-scaled by `sqrt(w)` so that
/// plain Euclidean distance equals the weighted metric.
struct ScaledPoint {
    coords: [f64; 3],
    index: usize,
}

impl ScaledPoint {
    fn new(point: &Point3<f64>, sqrt_weights: &Vector3<f64>, index: usize) -> Self {
        let scaled = point.coords.component_mul(sqrt_weights);
        ScaledPoint {
            coords: [scaled.x, scaled.y, scaled.z],
            index,
        }
    }
}

impl KdPoint for ScaledPoint {
    type Scalar = f64;
    type Dim = typenum::U3;
    fn at(&self, k: usize) -> f64 {
        self.coords[k]
    }
}

/// Measures, for every ordered channel pair `(A, B)`, how far each spot of A
/// is from its nearest spot in B.
///
/// A spot is reported only when that distance is strictly below the cutoff.
/// Matching is directional and many-to-one: `(A, B)` and `(B, A)` are separate
/// reports, and one spot of B may be the nearest partner of several spots of A.
/// Ties are resolved to the first spot in B's order.
#[derive(Debug, Clone)]
pub struct CrossChannelMatcher {
    distance_cutoff: f64,
    weights: Vector3<f64>,
    search: NeighborSearch,
}

impl CrossChannelMatcher {
    /// `pixel_size` weights each axis of the distance metric; `None` weights
    /// every axis by `1.0`.
    pub fn new(distance_cutoff: f64, pixel_size: Option<&PixelSize>, search: NeighborSearch) -> Self {
        let weights = match pixel_size {
            Some(size) => size.as_vector(),
            None => {
                warn!("no pixel size supplied, distances are measured with unit axis weights");
                PixelSize::unit().as_vector()
            }
        };
        CrossChannelMatcher {
            distance_cutoff,
            weights,
            search,
        }
    }

    pub fn distance_cutoff(&self) -> f64 {
        self.distance_cutoff
    }

    pub fn search(&self) -> NeighborSearch {
        self.search
    }

    /// Computes the reports for all `N * (N - 1)` ordered pairs, ordered
    /// `(0, 1), (0, 2), …, (1, 0), (1, 2), …`.
    ///
    /// # Errors
    /// [`ColocalizationError::InsufficientChannels`] when fewer than two
    /// position lists are given.
    pub fn match_channels(&self, positions: &[Vec<Point3<f64>>]) -> Result<Vec<PairwiseDistances>> {
        if positions.len() < 2 {
            return Err(ColocalizationError::InsufficientChannels {
                found: positions.len(),
            });
        }

        let pairs: Vec<(usize, usize)> = (0..positions.len())
            .flat_map(|a| (0..positions.len()).filter(move |&b| b != a).map(move |b| (a, b)))
            .collect();

        let reports: Vec<PairwiseDistances> = pairs
            .par_iter()
            .map(|&(a, b)| self.match_pair((a, b), &positions[a], &positions[b]))
            .collect();

        for report in &reports {
            debug!(
                "channels {:?}: {} spots within {}",
                report.channels,
                report.len(),
                self.distance_cutoff
            );
        }
        Ok(reports)
    }

    /// Report for a single ordered pair.
    pub fn match_pair(
        &self,
        channels: (usize, usize),
        spots_a: &[Point3<f64>],
        spots_b: &[Point3<f64>],
    ) -> PairwiseDistances {
        let mut report = PairwiseDistances::new(channels);
        if spots_a.is_empty() || spots_b.is_empty() {
            return report;
        }
        let nearest = match self.search {
            NeighborSearch::BruteForce => self.nearest_brute_force(spots_a, spots_b),
            NeighborSearch::KdTree => self.nearest_kd_tree(spots_a, spots_b),
        };
        for (coord, found) in spots_a.iter().zip(nearest) {
            if let Some((index_of_b, distance)) = found {
                if distance < self.distance_cutoff {
                    report.push(ColocalizationEvent {
                        coord: *coord,
                        distance,
                        index_of_b,
                    });
                }
            }
        }
        report
    }

    /// Nearest B spot per A spot from the full distance matrix.
    fn nearest_brute_force(
        &self,
        spots_a: &[Point3<f64>],
        spots_b: &[Point3<f64>],
    ) -> Vec<Option<(usize, f64)>> {
        let matrix = DMatrix::from_fn(spots_a.len(), spots_b.len(), |i, j| {
            weighted_distance(&spots_a[i], &spots_b[j], &self.weights)
        });
        matrix
            .row_iter()
            .map(|row| {
                let mut best: Option<(usize, f64)> = None;
                for (j, &d) in row.iter().enumerate() {
                    // Strict comparison keeps the first occurrence on ties.
                    if best.map_or(!d.is_nan(), |(_, min)| d < min) {
                        best = Some((j, d));
                    }
                }
                best
            })
            .collect()
    }

    /// Nearest B spot per A spot through a kd-tree over B.
    ///
    /// The tree finds the nearest distance; every candidate within that radius
    /// is then re-measured with the exact metric so that the result, ties
    /// included, matches [`Self::nearest_brute_force`].
    fn nearest_kd_tree(
        &self,
        spots_a: &[Point3<f64>],
        spots_b: &[Point3<f64>],
    ) -> Vec<Option<(usize, f64)>> {
        let sqrt_weights = self.weights.map(f64::sqrt);
        let tree = KdTree::build_by_ordered_float(
            spots_b
                .iter()
                .enumerate()
                .map(|(index, p)| ScaledPoint::new(p, &sqrt_weights, index))
                .collect(),
        );

        spots_a
            .iter()
            .map(|a| {
                let query = ScaledPoint::new(a, &sqrt_weights, usize::MAX);
                let nearest = tree.nearest(&query)?;
                let radius = nearest.squared_distance.sqrt();
                let radius = radius * (1.0 + RADIUS_SLACK) + f64::EPSILON;
                tree.within_radius(&query, radius)
                    .into_iter()
                    .map(|candidate| {
                        let d = weighted_distance(a, &spots_b[candidate.index], &self.weights);
                        (candidate.index, d)
                    })
                    .filter(|(_, d)| !d.is_nan())
                    .min_by(|x, y| x.1.total_cmp(&y.1).then(x.0.cmp(&y.0)))
            })
            .collect()
    }
}

/// Computes the mutual nearest-neighbor distances between all channels.
///
/// Shorthand for [`CrossChannelMatcher::new`] with brute-force search followed
/// by [`CrossChannelMatcher::match_channels`].
pub fn compute_distances(
    positions: &[Vec<Point3<f64>>],
    distance_cutoff: f64,
    pixel_size: Option<&PixelSize>,
) -> Result<Vec<PairwiseDistances>> {
    CrossChannelMatcher::new(distance_cutoff, pixel_size, NeighborSearch::BruteForce)
        .match_channels(positions)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn p(x: f64, y: f64, z: f64) -> Point3<f64> {
        Point3::new(x, y, z)
    }

    #[test]
    fn single_spots_three_apart() {
        let positions = vec![vec![p(0.0, 0.0, 0.0)], vec![p(0.0, 0.0, 3.0)]];
        let unit = PixelSize::unit();

        let reports = compute_distances(&positions, 5.0, Some(&unit)).unwrap();
        assert_eq!(reports.len(), 2);
        assert_eq!(reports[0].channels, (0, 1));
        assert_eq!(reports[0].len(), 1);
        assert_relative_eq!(reports[0].distances[0], 3.0);
        assert_eq!(reports[0].index_of_b[0], 0);
        assert_eq!(reports[1].channels, (1, 0));

        let tight = compute_distances(&positions, 2.0, Some(&unit)).unwrap();
        assert!(tight.iter().all(PairwiseDistances::is_empty));
    }

    #[test]
    fn requires_two_channels() {
        let err = compute_distances(&[vec![p(0.0, 0.0, 0.0)]], 1.0, None).unwrap_err();
        assert_eq!(err, ColocalizationError::InsufficientChannels { found: 1 });
        assert!(compute_distances(&[], 1.0, None).is_err());
    }

    #[test]
    fn infinite_cutoff_keeps_every_spot() {
        let positions = vec![
            vec![p(0.0, 0.0, 0.0), p(100.0, 0.0, 0.0), p(5.0, 5.0, 5.0)],
            vec![p(1.0, 1.0, 1.0)],
        ];
        let reports = compute_distances(&positions, f64::INFINITY, None).unwrap();
        assert_eq!(reports[0].len(), 3);
        assert_eq!(reports[1].len(), 1);
    }

    #[test]
    fn non_positive_cutoff_keeps_nothing() {
        let positions = vec![vec![p(1.0, 1.0, 1.0)], vec![p(1.0, 1.0, 1.0)]];
        for cutoff in [0.0, -1.0] {
            let reports = compute_distances(&positions, cutoff, None).unwrap();
            assert!(reports.iter().all(PairwiseDistances::is_empty));
        }
    }

    #[test]
    fn matching_is_directional_and_many_to_one() {
        let positions = vec![vec![p(0.0, 0.0, 0.0), p(2.0, 0.0, 0.0)], vec![p(1.0, 0.0, 0.0)]];
        let reports = compute_distances(&positions, 10.0, None).unwrap();
        assert_eq!(reports[0].len(), 2);
        assert_eq!(reports[0].index_of_b, vec![0, 0]);
        assert_eq!(reports[1].len(), 1);
        // Both spots of A are equally close; the first one wins.
        assert_eq!(reports[1].index_of_b, vec![0]);
    }

    #[test]
    fn axis_weights_scale_distance() {
        let size = PixelSize::new(1.0, 1.0, 4.0).unwrap();
        let positions = vec![vec![p(0.0, 0.0, 0.0)], vec![p(0.0, 0.0, 1.0)]];
        let reports = compute_distances(&positions, 10.0, Some(&size)).unwrap();
        assert_relative_eq!(reports[0].distances[0], 2.0);
    }

    #[test]
    fn empty_channel_yields_empty_reports() {
        let positions = vec![vec![p(0.0, 0.0, 0.0)], vec![]];
        let reports = compute_distances(&positions, 10.0, None).unwrap();
        assert!(reports[0].is_empty());
        assert!(reports[1].is_empty());
    }

    #[test]
    fn events_follow_report_order() {
        let positions = vec![vec![p(0.0, 0.0, 0.0), p(9.0, 0.0, 0.0)], vec![p(8.0, 0.0, 0.0)]];
        let reports = compute_distances(&positions, 5.0, None).unwrap();
        let events: Vec<_> = reports[0].events().collect();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].coord, p(9.0, 0.0, 0.0));
        assert_relative_eq!(events[0].distance, 1.0);
    }

    #[test]
    fn kd_tree_agrees_with_brute_force() {
        use rand::rngs::StdRng;
        use rand::{Rng, SeedableRng};

        let mut rng = StdRng::seed_from_u64(7);
        let mut cloud = |n: usize| -> Vec<Point3<f64>> {
            (0..n)
                .map(|_| {
                    p(
                        rng.random_range(0.0..20.0),
                        rng.random_range(0.0..20.0),
                        rng.random_range(0.0..5.0),
                    )
                })
                .collect()
        };
        let mut positions = vec![cloud(60), cloud(45), cloud(30)];
        // Exact ties: a duplicated spot in B must resolve to its first copy.
        let duplicate = positions[1][3];
        positions[1].push(duplicate);

        let size = PixelSize::new(0.1, 0.1, 0.3).unwrap();
        let brute = CrossChannelMatcher::new(0.8, Some(&size), NeighborSearch::BruteForce)
            .match_channels(&positions)
            .unwrap();
        let tree = CrossChannelMatcher::new(0.8, Some(&size), NeighborSearch::KdTree)
            .match_channels(&positions)
            .unwrap();
        assert_eq!(brute, tree);
        assert_eq!(brute.len(), 6);
    }
}
