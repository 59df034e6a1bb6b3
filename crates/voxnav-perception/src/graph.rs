//! Traversability graph.
//!
//! An arena of nodes addressed by [`NodeId`] handles with a
//! coordinate → handle index, rebuilt from scratch every sampling cycle by
//! [`GraphBuilder`].  Nodes are standable ground blocks; a directed edge
//! `u → v` exists only if [`can_traverse`] held for `(u, v)` at build time.
//!
//! # Example
//!
//! ```rust
//! use voxnav_hal::SimWorld;
//! use voxnav_perception::graph::GraphBuilder;
//! use voxnav_types::{GroundBlock, VoxelCoord};
//!
//! let world = SimWorld::new()
//!     .with_block(VoxelCoord::new(0, 0, 0), "stone")
//!     .with_block(VoxelCoord::new(1, 0, 0), "stone");
//! let ground: Vec<GroundBlock> = [(0, 0, 0), (1, 0, 0)]
//!     .into_iter()
//!     .map(|(x, y, z)| GroundBlock { coord: VoxelCoord::new(x, y, z), kind: "stone".into(), variant: 0 })
//!     .collect();
//!
//! let graph = GraphBuilder::build(&world, &ground);
//! assert_eq!(graph.node_count(), 2);
//! assert!(graph.has_edge(VoxelCoord::new(0, 0, 0), VoxelCoord::new(1, 0, 0)));
//! ```

use std::collections::HashMap;

use tracing::debug;
use voxnav_hal::VoxelWorld;
use voxnav_types::{GroundBlock, VoxelCoord};

use crate::traversal::{MAX_CLIMB, MAX_DROP, can_traverse, is_standable};

/// The 8 horizontal neighbour directions.
const HORIZONTAL_DIRECTIONS: [(i32, i32); 8] = [
    (1, 0),
    (-1, 0),
    (0, 1),
    (0, -1),
    (1, 1),
    (1, -1),
    (-1, 1),
    (-1, -1),
];

// ────────────────────────────────────────────────────────────────────────────
// TraversabilityGraph
// ────────────────────────────────────────────────────────────────────────────

/// Handle into a [`TraversabilityGraph`] arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

impl NodeId {
    pub fn index(self) -> usize {
        self.0
    }
}

/// Adjacency structure over standable voxel positions.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TraversabilityGraph {
    coords: Vec<VoxelCoord>,
    index: HashMap<VoxelCoord, NodeId>,
    adjacency: Vec<Vec<NodeId>>,
    edge_count: usize,
}

impl TraversabilityGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert `coord` as a node.  Inserting an existing coordinate returns its
    /// current handle.
    pub fn add_node(&mut self, coord: VoxelCoord) -> NodeId {
        if let Some(id) = self.index.get(&coord) {
            return *id;
        }
        let id = NodeId(self.coords.len());
        self.coords.push(coord);
        self.adjacency.push(Vec::new());
        self.index.insert(coord, id);
        id
    }

    /// Add the directed edge `from → to`.  Returns `false` if either endpoint
    /// is not a node or the edge already exists.
    pub fn add_edge(&mut self, from: VoxelCoord, to: VoxelCoord) -> bool {
        let (Some(&u), Some(&v)) = (self.index.get(&from), self.index.get(&to)) else {
            return false;
        };
        let out = &mut self.adjacency[u.0];
        if out.contains(&v) {
            return false;
        }
        out.push(v);
        self.edge_count += 1;
        true
    }

    pub fn contains(&self, coord: VoxelCoord) -> bool {
        self.index.contains_key(&coord)
    }

    pub fn node_id(&self, coord: VoxelCoord) -> Option<NodeId> {
        self.index.get(&coord).copied()
    }

    pub fn coord(&self, id: NodeId) -> Option<VoxelCoord> {
        self.coords.get(id.0).copied()
    }

    /// Outgoing neighbours of `coord`, in insertion order.  Empty when
    /// `coord` is not a node.
    pub fn neighbors(&self, coord: VoxelCoord) -> impl Iterator<Item = VoxelCoord> + '_ {
        self.index
            .get(&coord)
            .map(|id| self.adjacency[id.0].as_slice())
            .unwrap_or_default()
            .iter()
            .map(|n| self.coords[n.0])
    }

    pub fn has_edge(&self, from: VoxelCoord, to: VoxelCoord) -> bool {
        match (self.index.get(&from), self.index.get(&to)) {
            (Some(u), Some(v)) => self.adjacency[u.0].contains(v),
            _ => false,
        }
    }

    /// All nodes in insertion order.
    pub fn nodes(&self) -> &[VoxelCoord] {
        &self.coords
    }

    /// All directed edges, grouped by source in node order.
    pub fn edges(&self) -> impl Iterator<Item = (VoxelCoord, VoxelCoord)> + '_ {
        self.adjacency.iter().enumerate().flat_map(move |(u, out)| {
            let from = self.coords[u];
            out.iter().map(move |v| (from, self.coords[v.0]))
        })
    }

    pub fn node_count(&self) -> usize {
        self.coords.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edge_count
    }

    pub fn is_empty(&self) -> bool {
        self.coords.is_empty()
    }
}

// ────────────────────────────────────────────────────────────────────────────
// GraphBuilder
// ────────────────────────────────────────────────────────────────────────────

/// Builds a [`TraversabilityGraph`] from one scan's ground blocks.
pub struct GraphBuilder;

impl GraphBuilder {
    /// Every standable ground block becomes a node, including isolated ones.
    /// For each node, the 8 horizontal directions × dy ∈ `[-MAX_DROP,
    /// MAX_CLIMB]` are checked through a coordinate lookup built once per call;
    /// candidates present among the ground blocks get an edge when
    /// [`can_traverse`] holds.
    ///
    /// Never fails: no standable input yields an empty graph.
    pub fn build<W: VoxelWorld + ?Sized>(world: &W, ground: &[GroundBlock]) -> TraversabilityGraph {
        let mut graph = TraversabilityGraph::new();
        for block in ground {
            if is_standable(world, block.coord) {
                graph.add_node(block.coord);
            }
        }

        let nodes = graph.nodes().to_vec();
        for from in nodes {
            for (dx, dz) in HORIZONTAL_DIRECTIONS {
                for dy in -MAX_DROP..=MAX_CLIMB {
                    let Some(to) = checked_offset(from, dx, dy, dz) else {
                        continue;
                    };
                    if graph.contains(to) && can_traverse(world, from, to) {
                        graph.add_edge(from, to);
                    }
                }
            }
        }

        debug!(
            ground_blocks = ground.len(),
            nodes = graph.node_count(),
            edges = graph.edge_count(),
            "traversability graph built"
        );
        graph
    }
}

fn checked_offset(c: VoxelCoord, dx: i32, dy: i32, dz: i32) -> Option<VoxelCoord> {
    Some(VoxelCoord::new(
        c.x.checked_add(dx)?,
        c.y.checked_add(dy)?,
        c.z.checked_add(dz)?,
    ))
}
