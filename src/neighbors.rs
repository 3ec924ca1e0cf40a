//! Exact k-nearest-neighbor search under Euclidean distance.
//!
//! Two interchangeable indexes implement [`NeighborIndex`]:
//! - [`BruteForceIndex`]: scores every point (in parallel) and sorts
//! - [`BallTree`]: hierarchical bounding spheres, pruned by the triangle
//!   inequality
//!
//! Both rank by `(distance, catalog position)`, so equidistant points come
//! back in insertion order and the two indexes agree exactly.

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BinaryHeap;

use crate::error::RecommendError;
use crate::features::FeatureVector;

/// Default maximum number of points in a ball tree leaf
pub const DEFAULT_LEAF_SIZE: usize = 40;

/// Relative slack on ball lower bounds so rounding never prunes a tie
const BOUND_SLACK: f64 = 1e-9;

/// One search result: distance to the query and the point's catalog position.
#[derive(Clone, Copy, Debug)]
pub struct Neighbor {
    pub distance: f64,
    pub position: usize,
}

impl PartialEq for Neighbor {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Neighbor {}

impl PartialOrd for Neighbor {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Neighbor {
    fn cmp(&self, other: &Self) -> Ordering {
        self.distance
            .total_cmp(&other.distance)
            .then(self.position.cmp(&other.position))
    }
}

pub trait NeighborIndex: Send + Sync {
    /// Number of indexed points
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Up to `k` nearest points, ascending by distance then position.
    /// `k` larger than the index is capped at its size.
    fn query(&self, point: &[f64], k: usize) -> Result<Vec<Neighbor>, RecommendError>;
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IndexKind {
    #[default]
    BallTree,
    BruteForce,
}

/// Build the configured index over normalized catalog vectors.
pub fn build_index(
    kind: IndexKind,
    points: Vec<FeatureVector>,
    leaf_size: usize,
) -> Box<dyn NeighborIndex> {
    match kind {
        IndexKind::BallTree => Box::new(BallTree::build(points, leaf_size)),
        IndexKind::BruteForce => Box::new(BruteForceIndex::new(points)),
    }
}

pub fn euclidean(a: &[f64], b: &[f64]) -> f64 {
    a.iter()
        .zip(b)
        .map(|(x, y)| (x - y) * (x - y))
        .sum::<f64>()
        .sqrt()
}

fn check_query(k: usize, size: usize) -> Result<usize, RecommendError> {
    if k == 0 || size == 0 {
        return Err(RecommendError::InvalidNeighborQuery { k, size });
    }
    Ok(k.min(size))
}

// ============================================================================
// Brute Force
// ============================================================================

pub struct BruteForceIndex {
    points: Vec<FeatureVector>,
}

impl BruteForceIndex {
    pub fn new(points: Vec<FeatureVector>) -> Self {
        Self { points }
    }
}

impl NeighborIndex for BruteForceIndex {
    fn len(&self) -> usize {
        self.points.len()
    }

    fn query(&self, point: &[f64], k: usize) -> Result<Vec<Neighbor>, RecommendError> {
        let k = check_query(k, self.points.len())?;
        let mut all: Vec<Neighbor> = self
            .points
            .par_iter()
            .enumerate()
            .map(|(position, p)| Neighbor {
                distance: euclidean(point, p),
                position,
            })
            .collect();
        all.par_sort_unstable();
        all.truncate(k);
        Ok(all)
    }
}

// ============================================================================
// Ball Tree
// ============================================================================

#[derive(Debug)]
struct Ball {
    centroid: Vec<f64>,
    radius: f64,
    start: usize,
    end: usize,
    children: Option<(usize, usize)>,
}

/// Ball tree over a fixed point set.
///
/// `order` holds catalog positions permuted so every node owns the
/// contiguous range `order[start..end]`.
pub struct BallTree {
    points: Vec<FeatureVector>,
    order: Vec<usize>,
    nodes: Vec<Ball>,
}

impl BallTree {
    pub fn build(points: Vec<FeatureVector>, leaf_size: usize) -> Self {
        let mut order: Vec<usize> = (0..points.len()).collect();
        let mut nodes = Vec::new();
        if !points.is_empty() {
            build_ball(&points, &mut order, 0, points.len(), leaf_size.max(1), &mut nodes);
        }
        Self {
            points,
            order,
            nodes,
        }
    }

    pub fn depth(&self) -> usize {
        fn walk(nodes: &[Ball], id: usize) -> usize {
            match nodes[id].children {
                None => 1,
                Some((l, r)) => 1 + walk(nodes, l).max(walk(nodes, r)),
            }
        }
        if self.nodes.is_empty() {
            0
        } else {
            walk(&self.nodes, 0)
        }
    }

    fn lower_bound(&self, node: usize, point: &[f64]) -> f64 {
        let ball = &self.nodes[node];
        let d = euclidean(point, &ball.centroid);
        (d - ball.radius - BOUND_SLACK * (1.0 + d)).max(0.0)
    }

    fn search(&self, node: usize, point: &[f64], k: usize, heap: &mut BinaryHeap<Neighbor>) {
        let ball = &self.nodes[node];
        match ball.children {
            None => {
                for &position in &self.order[ball.start..ball.end] {
                    offer(
                        heap,
                        k,
                        Neighbor {
                            distance: euclidean(point, &self.points[position]),
                            position,
                        },
                    );
                }
            }
            Some((left, right)) => {
                let lb_left = self.lower_bound(left, point);
                let lb_right = self.lower_bound(right, point);
                let visits = if lb_left <= lb_right {
                    [(left, lb_left), (right, lb_right)]
                } else {
                    [(right, lb_right), (left, lb_left)]
                };
                for (child, bound) in visits {
                    if !prunable(heap, k, bound) {
                        self.search(child, point, k, heap);
                    }
                }
            }
        }
    }
}

impl NeighborIndex for BallTree {
    fn len(&self) -> usize {
        self.points.len()
    }

    fn query(&self, point: &[f64], k: usize) -> Result<Vec<Neighbor>, RecommendError> {
        let k = check_query(k, self.points.len())?;
        let mut heap = BinaryHeap::with_capacity(k + 1);
        self.search(0, point, k, &mut heap);
        Ok(heap.into_sorted_vec())
    }
}

/// Keep the `k` smallest neighbors; the heap top is the current worst.
fn offer(heap: &mut BinaryHeap<Neighbor>, k: usize, candidate: Neighbor) {
    if heap.len() < k {
        heap.push(candidate);
    } else if heap.peek().is_some_and(|worst| candidate < *worst) {
        heap.pop();
        heap.push(candidate);
    }
}

/// A node can be skipped only if everything in it is strictly farther than
/// the current worst kept neighbor.
fn prunable(heap: &BinaryHeap<Neighbor>, k: usize, bound: f64) -> bool {
    heap.len() == k && heap.peek().is_some_and(|worst| bound > worst.distance)
}

fn build_ball(
    points: &[FeatureVector],
    order: &mut [usize],
    start: usize,
    end: usize,
    leaf_size: usize,
    nodes: &mut Vec<Ball>,
) -> usize {
    let members = &order[start..end];
    let dims = points[members[0]].len();

    let mut centroid = vec![0.0; dims];
    for &i in members {
        for (c, x) in centroid.iter_mut().zip(&points[i]) {
            *c += x;
        }
    }
    for c in centroid.iter_mut() {
        *c /= members.len() as f64;
    }
    let radius = members
        .iter()
        .map(|&i| euclidean(&centroid, &points[i]))
        .fold(0.0, f64::max);

    // Split along the dimension with the widest spread
    let (split_dim, spread) = (0..dims)
        .map(|d| {
            let (lo, hi) = members.iter().fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &i| {
                (lo.min(points[i][d]), hi.max(points[i][d]))
            });
            (d, hi - lo)
        })
        .max_by(|a, b| a.1.total_cmp(&b.1))
        .unwrap_or((0, 0.0));

    let id = nodes.len();
    nodes.push(Ball {
        centroid,
        radius,
        start,
        end,
        children: None,
    });

    // Identical points cannot be split; they stay in one (possibly large) leaf
    if end - start > leaf_size && spread > 0.0 {
        let mid = start + (end - start) / 2;
        order[start..end].select_nth_unstable_by(mid - start, |&a, &b| {
            points[a][split_dim]
                .total_cmp(&points[b][split_dim])
                .then(a.cmp(&b))
        });
        let left = build_ball(points, order, start, mid, leaf_size, nodes);
        let right = build_ball(points, order, mid, end, leaf_size, nodes);
        nodes[id].children = Some((left, right));
    }
    id
}
