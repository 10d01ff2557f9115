//! Connected-component labeling of binary volumes.
//!
//! Two-pass labeling with a union-find table: the first pass hands out
//! provisional labels and records equivalences between touching provisional
//! labels, the second pass rewrites every voxel with its final, consecutive
//! label. Final labels are `1..=n` in raster order of each component's first
//! voxel, so there are never gaps.

use serde::{Deserialize, Serialize};

use crate::volume::{offset_coords, LabelVolume, Volume, NEIGHBORS_26, NEIGHBORS_6};

/// Which neighbors count as connected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Connectivity {
    /// 6 neighbors sharing a face.
    Face,
    /// 26 neighbors sharing a face, an edge or a corner.
    #[default]
    Full,
}

impl Connectivity {
    pub(crate) fn offsets(&self) -> &'static [(isize, isize, isize)] {
        match self {
            Connectivity::Face => &NEIGHBORS_6,
            Connectivity::Full => &NEIGHBORS_26,
        }
    }

    /// Neighbors already visited by a raster scan (lexicographically before the voxel).
    fn backward_offsets(&self) -> Vec<(isize, isize, isize)> {
        self.offsets()
            .iter()
            .copied()
            .filter(|&offset| offset < (0, 0, 0))
            .collect()
    }
}

fn find_root(parents: &mut [u32], label: u32) -> u32 {
    let mut current = label;
    while current != parents[current as usize] {
        // Path halving.
        let grandparent = parents[parents[current as usize] as usize];
        parents[current as usize] = grandparent;
        current = grandparent;
    }
    current
}

/// Merges the sets of `a` and `b`; the smaller root becomes the parent.
fn union_labels(parents: &mut [u32], a: u32, b: u32) {
    let root_a = find_root(parents, a);
    let root_b = find_root(parents, b);
    if root_a < root_b {
        parents[root_b as usize] = root_a;
    } else if root_b < root_a {
        parents[root_a as usize] = root_b;
    }
}

/// Labels the connected components of `mask`.
///
/// Background (`false`) voxels get label `0`; each component gets a distinct
/// positive label.
pub fn label_components(mask: &Volume<bool>, connectivity: Connectivity) -> LabelVolume {
    let shape = mask.shape();
    let mut labels = Volume::filled(shape.0, shape.1, shape.2, 0u32);
    let backward = connectivity.backward_offsets();

    // parents[0] is the background sentinel.
    let mut parents: Vec<u32> = vec![0];

    for (index, &foreground) in mask.as_slice().iter().enumerate() {
        if !foreground {
            continue;
        }
        let coords = mask.coords(index);
        let mut current = 0u32;
        for &offset in &backward {
            let Some((nz, ny, nx)) = offset_coords(shape, coords, offset) else {
                continue;
            };
            let neighbor = labels.as_slice()[labels.index(nz, ny, nx)];
            if neighbor == 0 {
                continue;
            }
            if current == 0 {
                current = neighbor;
            } else if neighbor != current {
                union_labels(&mut parents, current, neighbor);
            }
        }
        if current == 0 {
            current = parents.len() as u32;
            parents.push(current);
        }
        labels.as_mut_slice()[index] = current;
    }

    // Provisional labels were handed out in raster order, and roots are always
    // the smallest member, so walking them in order yields raster-ordered finals.
    let mut final_labels = vec![0u32; parents.len()];
    let mut next = 0u32;
    for provisional in 1..parents.len() as u32 {
        let root = find_root(&mut parents, provisional);
        if root == provisional {
            next += 1;
            final_labels[provisional as usize] = next;
        } else {
            final_labels[provisional as usize] = final_labels[root as usize];
        }
    }

    for label in labels.as_mut_slice() {
        *label = final_labels[*label as usize];
    }
    labels
}
