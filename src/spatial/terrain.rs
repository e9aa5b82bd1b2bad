//! Block terrain and read-only terrain snapshots
//!
//! `Terrain` is the live block store owned by the world and only touched on
//! the simulation thread. `TerrainSnapshot` is an owned copy of the loaded
//! chunks around a point; it answers sight-line and standing-spot queries
//! from any thread without reaching back into the live store.

use ahash::AHashMap;

use crate::core::types::{block_of, Position};

/// Horizontal size of a chunk in blocks
pub const CHUNK_SIZE: i32 = 16;

/// Block coordinate (x, y, z)
pub type BlockPos = (i32, i32, i32);

/// Chunk coordinate (x, z)
pub type ChunkPos = (i32, i32);

type ChunkBlocks = AHashMap<BlockPos, BlockKind>;

/// Kind of a non-air block
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockKind {
    /// Opaque and walkable
    Solid,
    /// Walkable but see-through (glass, ice)
    Transparent,
}

impl BlockKind {
    /// Returns true if the block stops a sight line
    pub fn occludes(&self) -> bool {
        matches!(self, BlockKind::Solid)
    }
}

/// Chunk containing a block column
#[inline]
pub fn chunk_of(x: i32, z: i32) -> ChunkPos {
    (x.div_euclid(CHUNK_SIZE), z.div_euclid(CHUNK_SIZE))
}

/// Live block terrain for one region
#[derive(Debug, Clone)]
pub struct Terrain {
    chunks: AHashMap<ChunkPos, ChunkBlocks>,
    min_height: i32,
    max_height: i32,
}

impl Terrain {
    pub fn new(min_height: i32, max_height: i32) -> Self {
        Self {
            chunks: AHashMap::new(),
            min_height,
            max_height,
        }
    }

    /// Mark a chunk as loaded (empty if it was never populated)
    pub fn load_chunk(&mut self, chunk: ChunkPos) {
        self.chunks.entry(chunk).or_default();
    }

    /// Unload a chunk, dropping its blocks
    pub fn unload_chunk(&mut self, chunk: ChunkPos) {
        self.chunks.remove(&chunk);
    }

    pub fn is_chunk_loaded(&self, chunk: ChunkPos) -> bool {
        self.chunks.contains_key(&chunk)
    }

    pub fn is_position_loaded(&self, pos: Position) -> bool {
        let (x, _, z) = block_of(pos);
        self.is_chunk_loaded(chunk_of(x, z))
    }

    /// Set a block, loading its chunk if needed
    pub fn set_block(&mut self, pos: BlockPos, kind: BlockKind) {
        let chunk = chunk_of(pos.0, pos.2);
        self.chunks.entry(chunk).or_default().insert(pos, kind);
    }

    /// Remove a block (turn it into air)
    pub fn clear_block(&mut self, pos: BlockPos) {
        if let Some(blocks) = self.chunks.get_mut(&chunk_of(pos.0, pos.2)) {
            blocks.remove(&pos);
        }
    }

    pub fn block_at(&self, pos: BlockPos) -> Option<BlockKind> {
        self.chunks
            .get(&chunk_of(pos.0, pos.2))
            .and_then(|blocks| blocks.get(&pos).copied())
    }

    /// Fill an inclusive box of blocks
    pub fn fill(&mut self, min: BlockPos, max: BlockPos, kind: BlockKind) {
        for x in min.0..=max.0 {
            for y in min.1..=max.1 {
                for z in min.2..=max.2 {
                    self.set_block((x, y, z), kind);
                }
            }
        }
    }

    /// Copy every loaded chunk overlapping the square of `radius` around `center`
    pub fn capture(&self, center: Position, radius: f32) -> TerrainSnapshot {
        let (cx, _, cz) = block_of(center);
        let r = radius.ceil() as i32;
        let (min_chunk_x, min_chunk_z) = chunk_of(cx.saturating_sub(r), cz.saturating_sub(r));
        let (max_chunk_x, max_chunk_z) = chunk_of(cx.saturating_add(r), cz.saturating_add(r));

        let mut chunks = AHashMap::new();
        for chunk_x in min_chunk_x..=max_chunk_x {
            for chunk_z in min_chunk_z..=max_chunk_z {
                if let Some(blocks) = self.chunks.get(&(chunk_x, chunk_z)) {
                    chunks.insert((chunk_x, chunk_z), blocks.clone());
                }
            }
        }

        TerrainSnapshot {
            chunks,
            min_height: self.min_height,
            max_height: self.max_height,
        }
    }
}

impl Default for Terrain {
    fn default() -> Self {
        Self::new(-64, 320)
    }
}

/// Immutable terrain copy around a spawn target
#[derive(Debug, Clone)]
pub struct TerrainSnapshot {
    chunks: AHashMap<ChunkPos, ChunkBlocks>,
    min_height: i32,
    max_height: i32,
}

impl TerrainSnapshot {
    fn block_at(&self, pos: BlockPos) -> Option<BlockKind> {
        self.chunks
            .get(&chunk_of(pos.0, pos.2))
            .and_then(|blocks| blocks.get(&pos).copied())
    }

    fn is_loaded(&self, x: i32, z: i32) -> bool {
        self.chunks.contains_key(&chunk_of(x, z))
    }

    /// Does the block stop a sight line?
    ///
    /// Chunks that were not loaded at capture time count as blocked.
    pub fn is_opaque(&self, pos: BlockPos) -> bool {
        if pos.1 < self.min_height || pos.1 >= self.max_height {
            return false;
        }
        if !self.is_loaded(pos.0, pos.2) {
            return true;
        }
        self.block_at(pos).is_some_and(|kind| kind.occludes())
    }

    /// Air inside a loaded chunk and the height limits
    pub fn is_passable(&self, pos: BlockPos) -> bool {
        pos.1 >= self.min_height
            && pos.1 < self.max_height
            && self.is_loaded(pos.0, pos.2)
            && self.block_at(pos).is_none()
    }

    pub fn is_solid(&self, pos: BlockPos) -> bool {
        self.block_at(pos).is_some()
    }

    /// Sampled line traversal between two positions
    ///
    /// Walks `max(|dx|, |dy|, |dz|)` steps with integer interpolation and
    /// fails on the first opaque block, endpoints included.
    pub fn has_line_of_sight(&self, from: Position, to: Position) -> bool {
        let (x0, y0, z0) = block_of(from);
        let (x1, y1, z1) = block_of(to);

        let steps = (x1 - x0).abs().max((y1 - y0).abs()).max((z1 - z0).abs());
        if steps == 0 {
            return true;
        }

        (0..=steps).all(|i| {
            let x = x0 + (x1 - x0) * i / steps;
            let y = y0 + (y1 - y0) * i / steps;
            let z = z0 + (z1 - z0) * i / steps;
            !self.is_opaque((x, y, z))
        })
    }

    /// Find a spot where an entity can stand near a column
    ///
    /// Searches outward from `near_y`, trying above before below, for a
    /// passable two-block gap on top of a solid block.
    pub fn find_standing_spot(
        &self,
        x: f32,
        z: f32,
        near_y: i32,
        vertical_range: i32,
    ) -> Option<Position> {
        let bx = x.floor() as i32;
        let bz = z.floor() as i32;

        for offset in 0..=vertical_range {
            let above = near_y.saturating_add(offset);
            if self.can_stand((bx, above, bz)) {
                return Some(Position::new(x, above as f32, z));
            }
            let below = near_y.saturating_sub(offset);
            if offset > 0 && self.can_stand((bx, below, bz)) {
                return Some(Position::new(x, below as f32, z));
            }
        }
        None
    }

    fn can_stand(&self, feet: BlockPos) -> bool {
        let head = (feet.0, feet.1.saturating_add(1), feet.2);
        let ground = (feet.0, feet.1.saturating_sub(1), feet.2);
        self.is_passable(feet) && self.is_passable(head) && self.is_solid(ground)
    }

    /// Number of chunks captured
    pub fn chunk_count(&self) -> usize {
        self.chunks.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Flat stone floor at y = 63 over chunks -2..=1 in both axes
    fn flat_arena() -> Terrain {
        let mut terrain = Terrain::default();
        terrain.fill((-32, 63, -32), (31, 63, 31), BlockKind::Solid);
        terrain
    }

    #[test]
    fn test_chunk_of_negative_coordinates() {
        assert_eq!(chunk_of(0, 0), (0, 0));
        assert_eq!(chunk_of(15, 16), (0, 1));
        assert_eq!(chunk_of(-1, -16), (-1, -1));
        assert_eq!(chunk_of(-17, 3), (-2, 0));
    }

    #[test]
    fn test_set_and_clear_block() {
        let mut terrain = Terrain::default();
        terrain.set_block((5, 10, 5), BlockKind::Solid);
        assert_eq!(terrain.block_at((5, 10, 5)), Some(BlockKind::Solid));
        assert!(terrain.is_chunk_loaded((0, 0)));

        terrain.clear_block((5, 10, 5));
        assert_eq!(terrain.block_at((5, 10, 5)), None);
    }

    #[test]
    fn test_open_field_has_line_of_sight() {
        let snapshot = flat_arena().capture(Position::new(0.0, 64.0, 0.0), 25.0);
        assert!(snapshot.has_line_of_sight(
            Position::new(10.0, 64.0, 0.0),
            Position::new(0.0, 64.0, 0.0)
        ));
    }

    #[test]
    fn test_wall_blocks_line_of_sight() {
        let mut terrain = flat_arena();
        terrain.fill((5, 64, -5), (5, 66, 5), BlockKind::Solid);
        let snapshot = terrain.capture(Position::new(0.0, 64.0, 0.0), 25.0);

        assert!(!snapshot.has_line_of_sight(
            Position::new(10.0, 64.0, 0.0),
            Position::new(0.0, 64.0, 0.0)
        ));
    }

    #[test]
    fn test_transparent_wall_does_not_block() {
        let mut terrain = flat_arena();
        terrain.fill((5, 64, -5), (5, 66, 5), BlockKind::Transparent);
        let snapshot = terrain.capture(Position::new(0.0, 64.0, 0.0), 25.0);

        assert!(snapshot.has_line_of_sight(
            Position::new(10.0, 64.0, 0.0),
            Position::new(0.0, 64.0, 0.0)
        ));
    }

    #[test]
    fn test_unloaded_chunk_blocks_sight() {
        let mut terrain = flat_arena();
        terrain.unload_chunk((0, 0));
        let snapshot = terrain.capture(Position::new(-8.0, 64.0, -8.0), 25.0);

        assert!(!snapshot.has_line_of_sight(
            Position::new(-8.0, 64.0, 8.0),
            Position::new(8.0, 64.0, 8.0)
        ));
    }

    #[test]
    fn test_standing_spot_on_floor() {
        let snapshot = flat_arena().capture(Position::new(0.0, 64.0, 0.0), 25.0);
        let spot = snapshot.find_standing_spot(3.5, 4.5, 64, 4).unwrap();
        assert_eq!(spot, Position::new(3.5, 64.0, 4.5));
    }

    #[test]
    fn test_standing_spot_searches_vertically() {
        let mut terrain = flat_arena();
        // Step up: a platform at y = 66 means standing at 67
        terrain.fill((3, 64, 4), (3, 66, 4), BlockKind::Solid);
        let snapshot = terrain.capture(Position::new(0.0, 64.0, 0.0), 25.0);

        let spot = snapshot.find_standing_spot(3.5, 4.5, 64, 4).unwrap();
        assert_eq!(spot.y, 67.0);

        assert!(snapshot.find_standing_spot(3.5, 4.5, 64, 2).is_none());
    }

    #[test]
    fn test_no_standing_spot_in_unloaded_chunk() {
        let terrain = flat_arena();
        let snapshot = terrain.capture(Position::new(0.0, 64.0, 0.0), 25.0);
        assert!(snapshot.find_standing_spot(100.0, 100.0, 64, 4).is_none());
    }

    #[test]
    fn test_capture_only_copies_nearby_chunks() {
        let mut terrain = flat_arena();
        terrain.set_block((500, 63, 500), BlockKind::Solid);
        let snapshot = terrain.capture(Position::new(0.0, 64.0, 0.0), 10.0);
        // -10..10 spans chunks -1..=0 on both axes
        assert_eq!(snapshot.chunk_count(), 4);
    }

    #[test]
    fn test_snapshot_is_independent_of_live_terrain() {
        let mut terrain = flat_arena();
        let snapshot = terrain.capture(Position::new(0.0, 64.0, 0.0), 25.0);

        terrain.fill((5, 64, -5), (5, 66, 5), BlockKind::Solid);

        assert!(snapshot.has_line_of_sight(
            Position::new(10.0, 64.0, 0.0),
            Position::new(0.0, 64.0, 0.0)
        ));
    }

    #[test]
    fn test_capture_far_outside_the_world_is_empty() {
        let terrain = flat_arena();
        let snapshot = terrain.capture(Position::new(3.0e9, 64.0, -3.0e9), 25.0);
        assert_eq!(snapshot.chunk_count(), 0);
        assert!(snapshot.find_standing_spot(3.0e9, 0.0, i32::MAX, 4).is_none());
    }
}
