//! Generic `VoxelWorld` trait for read-only voxel queries.

use std::sync::Arc;

use voxnav_types::{Block, VoxelCoord};

/// Synchronous, side-effect-free access to the voxel grid around the agent.
///
/// `None` means the voxel is *unavailable* (chunk not loaded, out of the
/// client's view).  An empty voxel is reported as `Some` block whose
/// [`Block::is_air`] is `true`.  Callers must treat unavailable voxels as
/// unusable, never as empty.
pub trait VoxelWorld: Send + Sync {
    fn block_at(&self, coord: VoxelCoord) -> Option<Block>;

    /// `Some(true)` when the voxel is loaded and non-empty, `Some(false)` when
    /// loaded and empty, `None` when unavailable.
    fn is_solid(&self, coord: VoxelCoord) -> Option<bool> {
        self.block_at(coord).map(|b| !b.is_air())
    }
}

impl<W: VoxelWorld + ?Sized> VoxelWorld for &W {
    fn block_at(&self, coord: VoxelCoord) -> Option<Block> {
        (**self).block_at(coord)
    }
}

impl<W: VoxelWorld + ?Sized> VoxelWorld for Arc<W> {
    fn block_at(&self, coord: VoxelCoord) -> Option<Block> {
        (**self).block_at(coord)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    struct MapWorld(HashMap<VoxelCoord, Block>);

    impl VoxelWorld for MapWorld {
        fn block_at(&self, coord: VoxelCoord) -> Option<Block> {
            self.0.get(&coord).cloned()
        }
    }

    #[test]
    fn is_solid_distinguishes_three_states() {
        let mut map = HashMap::new();
        map.insert(VoxelCoord::new(0, 0, 0), Block::new("stone", 1));
        map.insert(VoxelCoord::new(0, 1, 0), Block::air());
        let world = MapWorld(map);

        assert_eq!(world.is_solid(VoxelCoord::new(0, 0, 0)), Some(true));
        assert_eq!(world.is_solid(VoxelCoord::new(0, 1, 0)), Some(false));
        assert_eq!(world.is_solid(VoxelCoord::new(0, 2, 0)), None);
    }

    #[test]
    fn arc_and_ref_forward_lookups() {
        let mut map = HashMap::new();
        map.insert(VoxelCoord::new(1, 2, 3), Block::new("dirt", 0));
        let world = Arc::new(MapWorld(map));
        let by_ref = &world;
        assert_eq!(
            by_ref.block_at(VoxelCoord::new(1, 2, 3)).map(|b| b.kind),
            Some("dirt".to_string())
        );
    }
}
