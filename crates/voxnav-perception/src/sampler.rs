//! World Sampler.
//!
//! Scans a chunk-aligned box around the agent and returns, for every
//! horizontal column, the topmost non-empty voxel.  The scan is a
//! synchronous, read-only query against a [`VoxelWorld`]; it never fails.
//! Unavailable voxels are skipped and counted so callers can decide whether
//! a partial scan is acceptable.
//!
//! # Example
//!
//! ```rust
//! use voxnav_hal::SimWorld;
//! use voxnav_perception::sampler::{SamplerConfig, WorldSampler};
//! use voxnav_types::{Vec3, VoxelCoord};
//!
//! let world = SimWorld::new().with_fill(
//!     VoxelCoord::new(0, 0, 0),
//!     VoxelCoord::new(15, 0, 15),
//!     "stone",
//! );
//! let sampler = WorldSampler::new(SamplerConfig {
//!     chunk_radius: 0,
//!     ceiling: 8,
//!     floor: -8,
//! });
//! let scan = sampler.sample(&world, Vec3::new(4.5, 1.0, 4.5));
//! assert_eq!(scan.blocks.len(), 16 * 16);
//! assert!(scan.completeness().is_ok());
//! ```

use std::fmt;

use tracing::{debug, warn};
use voxnav_hal::VoxelWorld;
use voxnav_types::{GroundBlock, NavError, Vec3, VoxelCoord};

/// Horizontal edge length of one chunk.
pub const CHUNK_SIZE: i32 = 16;

/// Scan parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SamplerConfig {
    /// Chunks to include on each side of the agent's chunk.
    pub chunk_radius: u32,
    /// Highest y scanned (inclusive).
    pub ceiling: i32,
    /// Lowest y scanned (inclusive).
    pub floor: i32,
}

impl Default for SamplerConfig {
    fn default() -> Self {
        Self {
            chunk_radius: 4,
            ceiling: 320,
            floor: -64,
        }
    }
}

/// The inclusive box a scan covered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScanRegion {
    pub chunk_x: i32,
    pub chunk_z: i32,
    pub chunk_radius: u32,
    pub min_x: i32,
    pub max_x: i32,
    pub min_z: i32,
    pub max_z: i32,
    pub ceiling: i32,
    pub floor: i32,
}

impl ScanRegion {
    /// The region centred on the chunk containing `position`.
    ///
    /// Bounds saturate at the `i32` limits instead of overflowing.
    pub fn around(position: Vec3, config: &SamplerConfig) -> Self {
        let feet = position.floor();
        let chunk_x = feet.x.div_euclid(CHUNK_SIZE);
        let chunk_z = feet.z.div_euclid(CHUNK_SIZE);
        let r = i64::from(config.chunk_radius);
        let size = i64::from(CHUNK_SIZE);

        let lo = |c: i32| clamp_i32((i64::from(c) - r) * size);
        let hi = |c: i32| clamp_i32((i64::from(c) + r + 1) * size - 1);

        Self {
            chunk_x,
            chunk_z,
            chunk_radius: config.chunk_radius,
            min_x: lo(chunk_x),
            max_x: hi(chunk_x),
            min_z: lo(chunk_z),
            max_z: hi(chunk_z),
            ceiling: config.ceiling,
            floor: config.floor,
        }
    }

    /// Number of horizontal columns in the region.
    pub fn column_count(&self) -> u64 {
        let w = (i64::from(self.max_x) - i64::from(self.min_x) + 1).max(0) as u64;
        let d = (i64::from(self.max_z) - i64::from(self.min_z) + 1).max(0) as u64;
        w * d
    }

    /// `true` when `coord` lies inside the scanned box.
    pub fn contains(&self, coord: VoxelCoord) -> bool {
        (self.min_x..=self.max_x).contains(&coord.x)
            && (self.min_z..=self.max_z).contains(&coord.z)
            && (self.floor..=self.ceiling).contains(&coord.y)
    }
}

impl fmt::Display for ScanRegion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "chunk ({}, {}) r={} x {}..={} z {}..={} y {}..={}",
            self.chunk_x,
            self.chunk_z,
            self.chunk_radius,
            self.min_x,
            self.max_x,
            self.min_z,
            self.max_z,
            self.floor,
            self.ceiling
        )
    }
}

fn clamp_i32(v: i64) -> i32 {
    v.clamp(i64::from(i32::MIN), i64::from(i32::MAX)) as i32
}

/// Result of one sampling pass.
#[derive(Debug, Clone, PartialEq)]
pub struct GroundScan {
    pub region: ScanRegion,
    /// Row-major over x, then z.  Columns with no non-empty voxel in range
    /// produce no entry.
    pub blocks: Vec<GroundBlock>,
    /// Lookups that returned "unavailable".
    pub missing_voxels: usize,
}

impl GroundScan {
    /// `Err(SamplingIncomplete)` when any voxel in the scanned range was
    /// unavailable.  The scan itself is still usable.
    pub fn completeness(&self) -> Result<(), NavError> {
        if self.missing_voxels == 0 {
            Ok(())
        } else {
            Err(NavError::SamplingIncomplete {
                missing_voxels: self.missing_voxels,
            })
        }
    }
}

/// Produces a [`GroundScan`] from a [`VoxelWorld`].
#[derive(Debug, Clone, Default)]
pub struct WorldSampler {
    config: SamplerConfig,
}

impl WorldSampler {
    pub fn new(config: SamplerConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &SamplerConfig {
        &self.config
    }

    /// Scan the region around `position`.
    ///
    /// For every `(x, z)` column, walks y from the ceiling down to the floor
    /// and records the first available non-empty voxel.
    pub fn sample<W: VoxelWorld + ?Sized>(&self, world: &W, position: Vec3) -> GroundScan {
        let region = ScanRegion::around(position, &self.config);
        let mut blocks = Vec::new();
        let mut missing_voxels = 0usize;

        for x in region.min_x..=region.max_x {
            for z in region.min_z..=region.max_z {
                for y in (region.floor..=region.ceiling).rev() {
                    let coord = VoxelCoord::new(x, y, z);
                    match world.block_at(coord) {
                        None => missing_voxels += 1,
                        Some(block) if block.is_air() => {}
                        Some(block) => {
                            blocks.push(GroundBlock {
                                coord,
                                kind: block.kind,
                                variant: block.variant,
                            });
                            break;
                        }
                    }
                }
            }
        }

        if missing_voxels > 0 {
            warn!(%region, missing_voxels, "voxel data unavailable for part of the scan");
        }
        debug!(%region, ground_blocks = blocks.len(), "scan complete");

        GroundScan {
            region,
            blocks,
            missing_voxels,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use voxnav_hal::SimWorld;

    fn small() -> SamplerConfig {
        SamplerConfig {
            chunk_radius: 0,
            ceiling: 10,
            floor: -4,
        }
    }

    #[test]
    fn default_config_matches_world_limits() {
        let cfg = SamplerConfig::default();
        assert_eq!(cfg.chunk_radius, 4);
        assert_eq!(cfg.ceiling, 320);
        assert_eq!(cfg.floor, -64);
    }

    #[test]
    fn region_spans_full_chunks() {
        let region = ScanRegion::around(Vec3::new(20.0, 64.0, -3.0), &SamplerConfig::default());
        assert_eq!((region.chunk_x, region.chunk_z), (1, -1));
        assert_eq!((region.min_x, region.max_x), (-48, 95));
        assert_eq!((region.min_z, region.max_z), (-80, 63));
        assert_eq!(region.column_count(), 144 * 144);
    }

    #[test]
    fn region_bounds_saturate() {
        let cfg = SamplerConfig {
            chunk_radius: u32::MAX,
            ..SamplerConfig::default()
        };
        let region = ScanRegion::around(Vec3::default(), &cfg);
        assert_eq!(region.min_x, i32::MIN);
        assert_eq!(region.max_z, i32::MAX);
    }

    #[test]
    fn records_topmost_block_per_column() {
        let world = SimWorld::new()
            .with_fill(VoxelCoord::new(0, 0, 0), VoxelCoord::new(15, 0, 15), "stone")
            .with_block(VoxelCoord::new(3, 4, 7), "oak_log");
        let scan = WorldSampler::new(small()).sample(&world, Vec3::new(1.0, 1.0, 1.0));

        assert_eq!(scan.blocks.len(), 256);
        let tree = scan
            .blocks
            .iter()
            .find(|b| b.coord.x == 3 && b.coord.z == 7)
            .unwrap();
        assert_eq!(tree.coord.y, 4);
        assert_eq!(tree.kind, "oak_log");
        assert!(scan.completeness().is_ok());
    }

    #[test]
    fn empty_columns_produce_no_entry() {
        let world = SimWorld::new().with_block(VoxelCoord::new(2, 0, 2), "dirt");
        let scan = WorldSampler::new(small()).sample(&world, Vec3::new(1.0, 1.0, 1.0));
        assert_eq!(scan.blocks.len(), 1);
        assert_eq!(scan.blocks[0].coord, VoxelCoord::new(2, 0, 2));
    }

    #[test]
    fn ordering_is_row_major_and_deterministic() {
        let world = SimWorld::new().with_fill(
            VoxelCoord::new(0, 0, 0),
            VoxelCoord::new(15, 0, 15),
            "stone",
        );
        let sampler = WorldSampler::new(small());
        let a = sampler.sample(&world, Vec3::new(1.0, 1.0, 1.0));
        let b = sampler.sample(&world, Vec3::new(1.0, 1.0, 1.0));
        assert_eq!(a, b);
        assert_eq!(a.blocks[0].coord, VoxelCoord::new(0, 0, 0));
        assert_eq!(a.blocks[1].coord, VoxelCoord::new(0, 0, 1));
        assert_eq!(a.blocks[16].coord, VoxelCoord::new(1, 0, 0));
    }

    #[test]
    fn unavailable_voxels_are_counted_not_fatal() {
        // Only x in 0..=7 is loaded; the other half of the chunk is missing.
        let world = SimWorld::new()
            .with_fill(VoxelCoord::new(0, 0, 0), VoxelCoord::new(15, 0, 15), "stone")
            .with_loaded_bounds(VoxelCoord::new(0, -4, 0), VoxelCoord::new(7, 10, 15));
        let scan = WorldSampler::new(small()).sample(&world, Vec3::new(1.0, 1.0, 1.0));

        assert_eq!(scan.blocks.len(), 8 * 16);
        assert_eq!(scan.missing_voxels, 8 * 16 * 15);
        assert_eq!(
            scan.completeness(),
            Err(NavError::SamplingIncomplete {
                missing_voxels: 8 * 16 * 15
            })
        );
    }
}
