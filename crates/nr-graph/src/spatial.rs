//! Uniform grid for tolerance-based proximity queries.
//!
//! Points are bucketed into cubic cells of side `cell`. With `cell >= eps`
//! every point within `eps` of a query lies in the query cell or one of its
//! 26 neighbours, so a lookup touches at most 27 buckets instead of every
//! point in the network.

use std::collections::HashMap;

use nr_core::{Point3, Real, coincident};

type CellKey = (i64, i64, i64);

/// Smallest cell side; keeps a zero tolerance from producing infinite keys.
const MIN_CELL: Real = 1e-9;

#[derive(Debug, Clone)]
pub struct SpatialGrid<T> {
    cell: Real,
    buckets: HashMap<CellKey, Vec<(Point3, T)>>,
    len: usize,
}

impl<T> SpatialGrid<T> {
    /// Empty grid whose cells are `eps` wide.
    pub fn new(eps: Real) -> Self {
        Self {
            cell: eps.max(MIN_CELL),
            buckets: HashMap::new(),
            len: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Cell of a point. `as` saturates, so coordinates past the `i64` range
    /// share the outermost cell; the distance filter in `within` keeps
    /// results exact.
    fn key(&self, p: &Point3) -> CellKey {
        (
            (p.x / self.cell).floor() as i64,
            (p.y / self.cell).floor() as i64,
            (p.z / self.cell).floor() as i64,
        )
    }

    pub fn insert(&mut self, p: Point3, item: T) {
        let key = self.key(&p);
        self.buckets.entry(key).or_default().push((p, item));
        self.len += 1;
    }

    /// Items within `eps` (inclusive) of `p`.
    ///
    /// `eps` must not exceed the cell size the grid was built with.
    /// Neighbour cells are visited in a fixed order and items keep insertion
    /// order within a cell, so results are deterministic.
    pub fn within<'a>(&'a self, p: &'a Point3, eps: Real) -> impl Iterator<Item = &'a T> + 'a {
        debug_assert!(eps <= self.cell);
        let (cx, cy, cz) = self.key(p);
        NEIGHBOURS
            .iter()
            .filter_map(move |(dx, dy, dz)| {
                // Neighbours beyond the edge of the key space do not exist.
                let key = (cx.checked_add(*dx)?, cy.checked_add(*dy)?, cz.checked_add(*dz)?);
                self.buckets.get(&key)
            })
            .flatten()
            .filter(move |(q, _)| coincident(p, q, eps))
            .map(|(_, item)| item)
    }
}

const NEIGHBOURS: [(i64, i64, i64); 27] = {
    let mut out = [(0, 0, 0); 27];
    let mut i = 0;
    let mut dx = -1;
    while dx <= 1 {
        let mut dy = -1;
        while dy <= 1 {
            let mut dz = -1;
            while dz <= 1 {
                out[i] = (dx, dy, dz);
                i += 1;
                dz += 1;
            }
            dy += 1;
        }
        dx += 1;
    }
    out
};

#[cfg(test)]
mod tests {
    use super::*;
    use nr_core::point;

    #[test]
    fn finds_points_across_cell_boundaries() {
        let mut grid = SpatialGrid::new(0.01);
        grid.insert(point(0.0099, 0.0, 0.0), "a");
        grid.insert(point(0.0101, 0.0, 0.0), "b");
        grid.insert(point(0.5, 0.0, 0.0), "far");

        let q = point(0.01, 0.0, 0.0);
        let hits: Vec<_> = grid.within(&q, 0.01).collect();
        assert_eq!(hits, vec![&"a", &"b"]);
        assert_eq!(grid.len(), 3);
    }

    #[test]
    fn negative_coordinates_bucket_correctly() {
        let mut grid = SpatialGrid::new(0.01);
        grid.insert(point(-0.001, -0.001, -0.001), 1);
        let q = point(0.001, 0.001, 0.001);
        let hits: Vec<_> = grid.within(&q, 0.01).collect();
        assert_eq!(hits, vec![&1]);
    }

    #[test]
    fn zero_tolerance_matches_exact_points_only() {
        let mut grid = SpatialGrid::new(0.0);
        grid.insert(point(10.0, 0.0, -2.0), "s2");
        assert_eq!(grid.within(&point(10.0, 0.0, -2.0), 0.0).count(), 1);
        assert_eq!(grid.within(&point(10.0, 0.0, -2.000_001), 0.0).count(), 0);
    }

    #[test]
    fn far_coordinates_with_tiny_cells_do_not_overflow() {
        let mut grid = SpatialGrid::new(0.0);
        grid.insert(point(1e10, -1e10, 0.0), "far");
        grid.insert(point(1e10, -1e10, 1e-3), "near");
        let q = point(1e10, -1e10, 0.0);
        let hits: Vec<_> = grid.within(&q, 0.0).collect();
        assert_eq!(hits, vec![&"far"]);

        grid.insert(point(f64::MAX, f64::MIN, 0.0), "edge");
        assert_eq!(grid.within(&point(f64::MAX, f64::MIN, 0.0), 0.0).count(), 1);
    }

    #[test]
    fn matches_brute_force() {
        let pts: Vec<_> = (0..200)
            .map(|i| {
                let t = i as f64;
                point((t * 0.37).sin() * 0.2, (t * 0.11).cos() * 0.2, (t * 0.05).sin() * 0.05)
            })
            .collect();
        let eps = 0.03;
        let mut grid = SpatialGrid::new(eps);
        for (i, p) in pts.iter().enumerate() {
            grid.insert(*p, i);
        }
        for q in &pts {
            let mut fast: Vec<usize> = grid.within(q, eps).copied().collect();
            fast.sort_unstable();
            let slow: Vec<usize> = pts
                .iter()
                .enumerate()
                .filter(|(_, p)| coincident(q, p, eps))
                .map(|(i, _)| i)
                .collect();
            assert_eq!(fast, slow);
        }
    }
}
