//! Nearest-Node Resolver.
//!
//! Snaps a continuous position onto a [`TraversabilityGraph`] node.  The
//! search is a linear scan per radius step, bounded by
//! [`MAX_SEARCH_RADIUS`]; the graph is bounded by the sampling window so
//! this stays cheap.

use tracing::trace;
use voxnav_types::{NavError, Vec3, VoxelCoord};

use crate::graph::TraversabilityGraph;

/// Default upper bound on the search radius, in voxels.
pub const MAX_SEARCH_RADIUS: u32 = 10;

/// Outcome of a successful resolution.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Resolution {
    pub coord: VoxelCoord,
    /// Euclidean distance from the query to `coord`; `0.0` on the exact-match
    /// fast path.
    pub distance: f64,
    /// Radius step at which the node was accepted; `0` on the fast path.
    pub radius: u32,
}

#[derive(Debug, Clone, Copy)]
pub struct NearestNodeResolver {
    max_radius: u32,
}

impl Default for NearestNodeResolver {
    fn default() -> Self {
        Self {
            max_radius: MAX_SEARCH_RADIUS,
        }
    }
}

impl NearestNodeResolver {
    pub fn new(max_radius: u32) -> Self {
        Self { max_radius }
    }

    pub fn max_radius(&self) -> u32 {
        self.max_radius
    }

    /// Map `position` to a graph node.
    ///
    /// 1. If the floored position is a node, return it immediately.
    /// 2. Otherwise find the closest node and report the first radius in
    ///    1..=max that covers its distance.
    ///
    /// Returns `None` when no node lies within the maximum radius.
    pub fn resolve(&self, position: Vec3, graph: &TraversabilityGraph) -> Option<Resolution> {
        let floored = position.floor();
        if graph.contains(floored) {
            return Some(Resolution {
                coord: floored,
                distance: 0.0,
                radius: 0,
            });
        }

        // The radius only gates acceptance of the single closest node.
        let (coord, distance) = graph
            .nodes()
            .iter()
            .map(|c| (*c, position.distance(c.as_vec3())))
            .min_by(|a, b| a.1.total_cmp(&b.1))?;

        let radius = (1..=self.max_radius).find(|&r| distance <= f64::from(r))?;
        trace!(%position, node = %coord, radius, distance, "resolved");
        Some(Resolution {
            coord,
            distance,
            radius,
        })
    }

    /// [`resolve`][Self::resolve], mapping "not found" to
    /// [`NavError::NoWalkableNodeNear`].
    ///
    /// # Errors
    ///
    /// Returns [`NavError::NoWalkableNodeNear`] when the search radius is
    /// exhausted.
    pub fn require(&self, position: Vec3, graph: &TraversabilityGraph) -> Result<Resolution, NavError> {
        self.resolve(position, graph)
            .ok_or(NavError::NoWalkableNodeNear {
                position,
                max_radius: self.max_radius,
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::GraphBuilder;
    use crate::sampler::{SamplerConfig, WorldSampler};
    use voxnav_hal::SimWorld;

    fn graph_of(coords: &[VoxelCoord]) -> TraversabilityGraph {
        let mut g = TraversabilityGraph::new();
        for c in coords {
            g.add_node(*c);
        }
        g
    }

    #[test]
    fn exact_floor_match_takes_fast_path() {
        // A world with a single standable block under the agent.
        let world = SimWorld::new().with_block(VoxelCoord::new(2, 63, -5), "stone");
        let agent = Vec3::new(2.7, 63.2, -4.1);
        let ground = WorldSampler::new(SamplerConfig {
            chunk_radius: 0,
            ceiling: 70,
            floor: 60,
        })
        .sample(&world, agent)
        .blocks;
        let graph = GraphBuilder::build(&world, &ground);
        assert_eq!(graph.node_count(), 1);

        let r = NearestNodeResolver::default().resolve(agent, &graph).unwrap();
        assert_eq!(r.coord, VoxelCoord::new(2, 63, -5));
        assert_eq!(r.radius, 0);
        assert_eq!(r.distance, 0.0);
    }

    #[test]
    fn returns_node_at_first_satisfying_radius() {
        let graph = graph_of(&[VoxelCoord::new(0, 7, 0), VoxelCoord::new(3, 0, 0)]);
        let r = NearestNodeResolver::default()
            .resolve(Vec3::new(0.0, 0.0, 0.0), &graph)
            .unwrap();
        assert_eq!(r.coord, VoxelCoord::new(3, 0, 0));
        assert_eq!(r.radius, 3);
        assert!((r.distance - 3.0).abs() < 1e-9);
    }

    #[test]
    fn fractional_distance_rounds_up_to_next_radius() {
        let graph = graph_of(&[VoxelCoord::new(2, 1, 0)]);
        let r = NearestNodeResolver::default()
            .resolve(Vec3::new(0.0, 0.0, 0.0), &graph)
            .unwrap();
        assert_eq!(r.radius, 3);
        assert!((r.distance - 5f64.sqrt()).abs() < 1e-9);
    }

    #[test]
    fn picks_closest_of_many_nodes_at_covering_radius() {
        // A 21x21 sheet at y=0 with a gap around the origin column.
        let coords: Vec<VoxelCoord> = (-10..=10)
            .flat_map(|x| (-10..=10).map(move |z| VoxelCoord::new(x, 0, z)))
            .filter(|c| c.x.abs() > 3 || c.z.abs() > 3)
            .collect();
        let graph = graph_of(&coords);

        let r = NearestNodeResolver::default()
            .resolve(Vec3::new(0.2, 0.0, 0.4), &graph)
            .unwrap();
        assert_eq!(r.coord, VoxelCoord::new(0, 0, 4));
        assert!((r.distance - (0.04f64 + 12.96).sqrt()).abs() < 1e-9);
        assert_eq!(r.radius, 4);

        assert!(NearestNodeResolver::new(3)
            .resolve(Vec3::new(0.2, 0.0, 0.4), &graph)
            .is_none());
    }

    #[test]
    fn nothing_within_max_radius_is_not_found() {
        let graph = graph_of(&[VoxelCoord::new(11, 0, 0)]);
        let resolver = NearestNodeResolver::default();
        assert!(resolver.resolve(Vec3::default(), &graph).is_none());
        assert_eq!(
            resolver.require(Vec3::default(), &graph),
            Err(NavError::NoWalkableNodeNear {
                position: Vec3::default(),
                max_radius: 10
            })
        );
    }

    #[test]
    fn empty_graph_is_not_found() {
        let graph = TraversabilityGraph::new();
        assert!(NearestNodeResolver::new(3).resolve(Vec3::default(), &graph).is_none());
    }
}
