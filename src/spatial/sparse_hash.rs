//! Sparse hash grid for nearby-count queries on the horizontal plane

use ahash::AHashMap;
use std::hash::Hash;

use crate::core::types::Position;

/// Sparse hash grid bucketing items by their (x, z) cell
pub struct SparseHashGrid<T> {
    cell_size: f32,
    cells: AHashMap<(i32, i32), Vec<(T, Position)>>,
}

impl<T: Copy + Eq + Hash> SparseHashGrid<T> {
    pub fn new(cell_size: f32) -> Self {
        Self {
            cell_size,
            cells: AHashMap::new(),
        }
    }

    #[inline]
    fn cell_coord(&self, pos: Position) -> (i32, i32) {
        (
            (pos.x / self.cell_size).floor() as i32,
            (pos.z / self.cell_size).floor() as i32,
        )
    }

    pub fn insert(&mut self, item: T, pos: Position) {
        let coord = self.cell_coord(pos);
        self.cells.entry(coord).or_default().push((item, pos));
    }

    pub fn remove(&mut self, item: T, pos: Position) {
        let coord = self.cell_coord(pos);
        if let Some(cell) = self.cells.get_mut(&coord) {
            cell.retain(|&(e, _)| e != item);
        }
    }

    /// Items within `radius` of `center`, measured on the horizontal plane
    pub fn query_radius(&self, center: Position, radius: f32) -> impl Iterator<Item = T> + '_ {
        let (cx, cz) = self.cell_coord(center);
        let reach = (radius / self.cell_size).ceil() as i32;
        let radius_sq = radius * radius;

        (-reach..=reach).flat_map(move |dx| {
            (-reach..=reach).flat_map(move |dz| {
                // Cells past the i32 range hold nothing
                cx.checked_add(dx)
                    .zip(cz.checked_add(dz))
                    .and_then(|cell| self.cells.get(&cell))
                    .into_iter()
                    .flatten()
                    .filter(move |(_, pos)| {
                        let ddx = pos.x - center.x;
                        let ddz = pos.z - center.z;
                        ddx * ddx + ddz * ddz <= radius_sq
                    })
                    .map(|&(item, _)| item)
            })
        })
    }

    pub fn count_within(&self, center: Position, radius: f32) -> usize {
        self.query_radius(center, radius).count()
    }
}
