//! Fixed pool of candidate idle-roam destinations.

use std::collections::HashSet;

use fleetor_core::Point;
use tracing::{debug, warn};

use crate::traits::Navigation;

/// Candidate idle-roam destinations, sampled once at startup.
///
/// Occupancy is not stored here: which agent claims which node is a per-tick
/// derived fact owned by the contention resolver.
#[derive(Debug, Clone)]
pub struct NodePool {
    nodes: Vec<Point>,
}

impl NodePool {
    /// Samples `count` roam points from the navigation collaborator.
    ///
    /// Falls back to the collaborator's single feasible point when no sample
    /// is valid, so the pool is never empty.
    pub fn build<N: Navigation>(nav: &mut N, count: usize) -> Self {
        let mut nodes = Vec::with_capacity(count);
        for _ in 0..count {
            if let Some(point) = nav.sample_roam_point() {
                nodes.push(point);
            }
        }
        if nodes.is_empty() {
            let fallback = nav.fallback_point();
            warn!(
                x = fallback.x,
                y = fallback.y,
                "no roam points sampled, falling back to a single node"
            );
            nodes.push(fallback);
        }
        debug!(count = nodes.len(), "roam node pool built");
        Self { nodes }
    }

    /// Builds a pool from explicit points.
    pub fn from_points(nodes: Vec<Point>) -> Self {
        Self { nodes }
    }

    /// Number of nodes in the pool.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether the pool holds no nodes.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Position of a node by index.
    pub fn get(&self, index: usize) -> Option<Point> {
        self.nodes.get(index).copied()
    }

    /// Index of the closest node to `from` that is neither occupied nor
    /// within `min_distance` of the requester.
    ///
    /// Returns `None` when no node qualifies.
    pub fn nearest_unoccupied(
        &self,
        from: Point,
        occupied: &HashSet<usize>,
        min_distance: f32,
    ) -> Option<usize> {
        let min_sq = min_distance * min_distance;
        let mut best: Option<(usize, f32)> = None;
        for (index, node) in self.nodes.iter().enumerate() {
            if occupied.contains(&index) {
                continue;
            }
            let dist_sq = from.distance_sq(*node);
            if dist_sq < min_sq {
                continue;
            }
            match best {
                Some((_, best_sq)) if dist_sq >= best_sq => {}
                _ => best = Some((index, dist_sq)),
            }
        }
        best.map(|(index, _)| index)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn pool() -> NodePool {
        NodePool::from_points(vec![
            Point::new(0.0, 0.0),
            Point::new(5.0, 0.0),
            Point::new(10.0, 0.0),
        ])
    }

    #[test]
    fn test_nearest_prefers_closest() {
        let found = pool().nearest_unoccupied(Point::new(4.0, 0.0), &HashSet::new(), 0.0);
        assert_eq!(found, Some(1));
    }

    #[test]
    fn test_nearest_skips_occupied() {
        let occupied: HashSet<usize> = [1].into_iter().collect();
        let found = pool().nearest_unoccupied(Point::new(4.0, 0.0), &occupied, 0.0);
        assert_eq!(found, Some(0));
    }

    #[test]
    fn test_nearest_respects_min_distance() {
        // Node 1 is 1.0 away; with min_distance 2.0 it must be skipped.
        let found = pool().nearest_unoccupied(Point::new(4.0, 0.0), &HashSet::new(), 2.0);
        assert_eq!(found, Some(0));
    }

    #[test]
    fn test_no_candidate_returns_none() {
        let occupied: HashSet<usize> = [0, 1, 2].into_iter().collect();
        assert!(pool()
            .nearest_unoccupied(Point::new(4.0, 0.0), &occupied, 0.0)
            .is_none());
    }

    #[test]
    fn test_build_falls_back_to_single_point() {
        struct NoSampleNav;
        impl Navigation for NoSampleNav {
            fn has_feasible_path(&self, _: Point, _: Point) -> bool {
                false
            }
            fn set_destination(&mut self, _: u64, _: Point) -> bool {
                false
            }
            fn remaining_distance(&self, _: u64) -> f32 {
                0.0
            }
            fn current_position(&self, _: u64) -> Point {
                Point::default()
            }
            fn retreat_point(&self, _: u64, _: f32) -> Option<Point> {
                None
            }
            fn sample_roam_point(&mut self) -> Option<Point> {
                None
            }
            fn fallback_point(&self) -> Point {
                Point::new(1.0, 2.0)
            }
            fn shelf_location(&self, _: u32) -> Option<Point> {
                None
            }
        }

        let pool = NodePool::build(&mut NoSampleNav, 8);
        assert_eq!(pool.len(), 1);
        assert_eq!(pool.get(0), Some(Point::new(1.0, 2.0)));
    }
}
