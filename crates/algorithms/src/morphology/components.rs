//! Connected-component labeling and small-object removal
//!
//! Two-pass union-find labeling with 4-connectivity (edge-sharing
//! neighbors only). Labels are numbered 1.. in row-major order of each
//! component's first pixel; 0 is background.

use minewatch_core::raster::Raster;
use minewatch_core::{Algorithm, Error, Result};
use ndarray::Array2;
use tracing::debug;

/// Disjoint-set forest over provisional labels
struct UnionFind {
    parent: Vec<usize>,
    rank: Vec<u8>,
}

impl UnionFind {
    fn new() -> Self {
        Self {
            parent: Vec::new(),
            rank: Vec::new(),
        }
    }

    fn make_set(&mut self) -> usize {
        let id = self.parent.len();
        self.parent.push(id);
        self.rank.push(0);
        id
    }

    fn find(&mut self, mut x: usize) -> usize {
        while self.parent[x] != x {
            self.parent[x] = self.parent[self.parent[x]]; // path halving
            x = self.parent[x];
        }
        x
    }

    fn union(&mut self, a: usize, b: usize) {
        let ra = self.find(a);
        let rb = self.find(b);
        if ra == rb {
            return;
        }
        let (root, child) = if self.rank[ra] >= self.rank[rb] {
            (ra, rb)
        } else {
            (rb, ra)
        };
        self.parent[child] = root;
        if self.rank[root] == self.rank[child] {
            self.rank[root] += 1;
        }
    }
}

/// Summary of one connected component
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Component {
    /// Label in the label grid (1-based)
    pub label: u32,
    /// Number of pixels
    pub size: usize,
    /// First pixel in row-major order, as (row, col)
    pub first_pixel: (usize, usize),
    /// Inclusive bounding box (min_row, min_col, max_row, max_col)
    pub bbox: (usize, usize, usize, usize),
}

/// Label grid plus per-component summaries, indexed by `label - 1`
#[derive(Debug, Clone)]
pub struct Labeling {
    pub labels: Array2<u32>,
    pub components: Vec<Component>,
}

/// Label 4-connected regions of non-zero cells.
pub fn label_components(mask: &Array2<u8>) -> Labeling {
    let (rows, cols) = mask.dim();
    let mut provisional = Array2::<usize>::from_elem((rows, cols), usize::MAX);
    let mut sets = UnionFind::new();

    for row in 0..rows {
        for col in 0..cols {
            if mask[(row, col)] == 0 {
                continue;
            }
            let up = (row > 0)
                .then(|| provisional[(row - 1, col)])
                .filter(|&l| l != usize::MAX);
            let left = (col > 0)
                .then(|| provisional[(row, col - 1)])
                .filter(|&l| l != usize::MAX);

            provisional[(row, col)] = match (up, left) {
                (Some(u), Some(l)) => {
                    sets.union(u, l);
                    u.min(l)
                }
                (Some(u), None) => u,
                (None, Some(l)) => l,
                (None, None) => sets.make_set(),
            };
        }
    }

    // Second pass: resolve roots and renumber in scan order
    let mut root_to_label = vec![0u32; sets.parent.len()];
    let mut components: Vec<Component> = Vec::new();
    let mut labels = Array2::<u32>::zeros((rows, cols));

    for row in 0..rows {
        for col in 0..cols {
            let p = provisional[(row, col)];
            if p == usize::MAX {
                continue;
            }
            let root = sets.find(p);
            if root_to_label[root] == 0 {
                components.push(Component {
                    label: components.len() as u32 + 1,
                    size: 0,
                    first_pixel: (row, col),
                    bbox: (row, col, row, col),
                });
                root_to_label[root] = components.len() as u32;
            }
            let label = root_to_label[root];
            labels[(row, col)] = label;

            let comp = &mut components[label as usize - 1];
            comp.size += 1;
            comp.bbox = (
                comp.bbox.0.min(row),
                comp.bbox.1.min(col),
                comp.bbox.2.max(row),
                comp.bbox.3.max(col),
            );
        }
    }

    Labeling { labels, components }
}

/// Parameters for small-object removal
#[derive(Debug, Clone)]
pub struct RemoveSmallObjectsParams {
    /// Components with fewer pixels than this are cleared. Default: 50
    pub min_size: usize,
}

impl Default for RemoveSmallObjectsParams {
    fn default() -> Self {
        Self { min_size: 50 }
    }
}

/// Small-object removal algorithm
#[derive(Debug, Clone, Default)]
pub struct RemoveSmallObjects;

impl Algorithm for RemoveSmallObjects {
    type Input = Raster<u8>;
    type Output = Raster<u8>;
    type Params = RemoveSmallObjectsParams;
    type Error = Error;

    fn name(&self) -> &'static str {
        "RemoveSmallObjects"
    }

    fn description(&self) -> &'static str {
        "Clear 4-connected components smaller than a pixel count"
    }

    fn execute(&self, input: Self::Input, params: Self::Params) -> Result<Self::Output> {
        remove_small_objects(&input, params.min_size)
    }
}

/// Clear every 4-connected component with fewer than `min_size` pixels.
pub fn remove_small_objects(mask: &Raster<u8>, min_size: usize) -> Result<Raster<u8>> {
    let Labeling { labels, components } = label_components(mask.data());

    let keep: Vec<bool> = components.iter().map(|c| c.size >= min_size).collect();
    let removed = keep.iter().filter(|&&k| !k).count();
    debug!(
        components = components.len(),
        removed,
        min_size,
        "removed small objects"
    );

    let cleaned = labels.mapv(|l| u8::from(l != 0 && keep[l as usize - 1]));
    mask.with_same_meta(cleaned)
}
