//! One sampling cycle's immutable snapshot.

use chrono::{DateTime, Utc};
use uuid::Uuid;
use voxnav_hal::VoxelWorld;
use voxnav_types::{GroundBlock, Vec3, VoxelCoord};

use crate::graph::{GraphBuilder, TraversabilityGraph};
use crate::sampler::{ScanRegion, WorldSampler};

/// Ground blocks plus the traversability graph built from them, stamped with
/// a fresh id and capture time.  Never mutated after construction except to
/// attach a goal.
#[derive(Debug, Clone, PartialEq)]
pub struct Observation {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub agent_position: Vec3,
    pub region: ScanRegion,
    pub ground_blocks: Vec<GroundBlock>,
    pub graph: TraversabilityGraph,
    pub goal: Option<VoxelCoord>,
    /// Voxels the sampler could not read.
    pub missing_voxels: usize,
}

impl Observation {
    /// Sample around `agent_position` and build the graph.
    pub fn capture<W: VoxelWorld + ?Sized>(
        world: &W,
        sampler: &WorldSampler,
        agent_position: Vec3,
    ) -> Self {
        let scan = sampler.sample(world, agent_position);
        let graph = GraphBuilder::build(world, &scan.blocks);
        Self {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            agent_position,
            region: scan.region,
            ground_blocks: scan.blocks,
            graph,
            goal: None,
            missing_voxels: scan.missing_voxels,
        }
    }

    pub fn with_goal(mut self, goal: VoxelCoord) -> Self {
        self.goal = Some(goal);
        self
    }
}
