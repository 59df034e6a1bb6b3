//! `voxnav-perception` – turns raw voxel samples into a traversability graph.
//!
//! # Modules
//!
//! - [`traversal`] – [`is_standable`][traversal::is_standable] and
//!   [`can_traverse`][traversal::can_traverse]: the pure physical-movement
//!   predicate every graph edge is gated by.
//! - [`sampler`] – [`WorldSampler`][sampler::WorldSampler]: scans a chunk-aligned
//!   region around the agent and returns the topmost non-empty voxel of every
//!   column.
//! - [`graph`] – [`TraversabilityGraph`][graph::TraversabilityGraph] (arena of
//!   nodes with a coordinate index) and [`GraphBuilder`][graph::GraphBuilder].
//! - [`resolver`] – [`NearestNodeResolver`][resolver::NearestNodeResolver]: snaps
//!   a continuous position onto the graph within a bounded radius.
//! - [`observation`] – [`Observation`][observation::Observation]: one sampling
//!   cycle's immutable snapshot.

pub mod graph;
pub mod observation;
pub mod resolver;
pub mod sampler;
pub mod traversal;

pub use graph::{GraphBuilder, NodeId, TraversabilityGraph};
pub use observation::Observation;
pub use resolver::{NearestNodeResolver, Resolution};
pub use sampler::{GroundScan, SamplerConfig, ScanRegion, WorldSampler};
pub use traversal::{can_traverse, is_standable};
