//! `voxnav-hal` – the voxel-world client boundary.
//!
//! The rest of the stack never talks to a concrete game client.  It reads
//! voxels through [`VoxelWorld`][world::VoxelWorld] and drives the agent
//! through [`Actuator`][actuator::Actuator], so a network client, a replay
//! or the in-process simulation can be swapped without touching perception
//! or control logic.
//!
//! # Modules
//!
//! - [`world`] – [`VoxelWorld`][world::VoxelWorld]: synchronous voxel lookup
//!   that distinguishes "empty" from "unavailable".
//! - [`actuator`] – [`Actuator`][actuator::Actuator]: agent pose plus the
//!   turn / move / jump primitives.
//! - [`sim`] – [`SimWorld`][sim::SimWorld], [`SimAgent`][sim::SimAgent] and
//!   [`Scene`][sim::Scene]: a headless backend for tests and the CLI.

pub mod actuator;
pub mod sim;
pub mod world;

pub use actuator::Actuator;
pub use sim::{ActuationCommand, Scene, SimAgent, SimWorld};
pub use world::VoxelWorld;
