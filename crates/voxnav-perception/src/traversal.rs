//! Traversability predicate.
//!
//! Two pure functions over a [`VoxelWorld`] snapshot:
//!
//! - [`is_standable`] – solid footing, two voxels of headroom, no hazard.
//! - [`can_traverse`] – whether direct movement between two standable voxels
//!   is physically possible (adjacent, within climb/drop limits, no wall at
//!   head height).
//!
//! Neither function panics.  Unavailable voxel data is treated as not
//! standable.

use voxnav_hal::VoxelWorld;
use voxnav_types::VoxelCoord;

/// Materials an agent must never stand on.
pub const HAZARD_KINDS: &[&str] = &[
    "lava",
    "water",
    "fire",
    "soul_fire",
    "cactus",
    "magma_block",
    "campfire",
    "soul_campfire",
    "sweet_berry_bush",
    "powder_snow",
];

/// Highest step up a single move may take.
pub const MAX_CLIMB: i32 = 1;

/// Deepest controlled fall a single move may take.
pub const MAX_DROP: i32 = 5;

/// `true` when `coord` is non-empty, not a hazard, and both voxels directly
/// above it are empty.  Any unavailable sample yields `false`.
pub fn is_standable<W: VoxelWorld + ?Sized>(world: &W, coord: VoxelCoord) -> bool {
    let (Some(y1), Some(y2)) = (coord.y.checked_add(1), coord.y.checked_add(2)) else {
        return false;
    };

    let Some(block) = world.block_at(coord) else {
        return false;
    };
    if block.is_air() || HAZARD_KINDS.contains(&block.kind.as_str()) {
        return false;
    }

    let headroom = [
        VoxelCoord::new(coord.x, y1, coord.z),
        VoxelCoord::new(coord.x, y2, coord.z),
    ];
    headroom
        .into_iter()
        .all(|c| world.block_at(c).is_some_and(|b| b.is_air()))
}

/// `true` when the agent can move directly from `from` to `to`.
///
/// All of the following must hold:
///
/// 1. the two voxels are distinct and horizontally adjacent (Chebyshev
///    radius 1, diagonals included);
/// 2. the vertical delta lies in `[-MAX_DROP, MAX_CLIMB]`;
/// 3. both endpoints are [standable][is_standable];
/// 4. the voxel at head height above the midpoint of the horizontal segment
///    is empty.  An unavailable sample there does not block.
///
/// Each direction is evaluated independently.
pub fn can_traverse<W: VoxelWorld + ?Sized>(world: &W, from: VoxelCoord, to: VoxelCoord) -> bool {
    let dx = i64::from(to.x) - i64::from(from.x);
    let dz = i64::from(to.z) - i64::from(from.z);
    let dy = i64::from(to.y) - i64::from(from.y);

    if dx.abs() > 1 || dz.abs() > 1 {
        return false;
    }
    if dx == 0 && dz == 0 {
        return false;
    }
    if dy > i64::from(MAX_CLIMB) || dy < -i64::from(MAX_DROP) {
        return false;
    }

    if !is_standable(world, from) || !is_standable(world, to) {
        return false;
    }

    let mid_x = (f64::from(from.x) + dx as f64 * 0.5).floor() as i32;
    let mid_z = (f64::from(from.z) + dz as f64 * 0.5).floor() as i32;
    // Both endpoints are standable, so max(y) + 1 cannot overflow.
    let head_y = from.y.max(to.y) + 1;

    !world
        .is_solid(VoxelCoord::new(mid_x, head_y, mid_z))
        .unwrap_or(false)
}
