//! In-process simulation backend for headless tests and the CLI.
//!
//! [`SimWorld`] is a hash-map voxel store and [`SimAgent`] is a body that
//! records every actuation command and integrates simple forward motion.
//! Together they let the full voxnav stack run without a game client.
//!
//! # Example
//!
//! ```rust
//! use std::time::Duration;
//! use voxnav_hal::sim::{SimAgent, SimWorld};
//! use voxnav_hal::{Actuator, VoxelWorld};
//! use voxnav_types::{Control, Vec3, VoxelCoord};
//!
//! let world = SimWorld::new().with_fill(
//!     VoxelCoord::new(-4, 0, -4),
//!     VoxelCoord::new(4, 0, 4),
//!     "stone",
//! );
//! assert!(world.is_solid(VoxelCoord::new(0, 0, 0)).unwrap());
//!
//! let mut agent = SimAgent::new("bot", Vec3::new(0.5, 1.0, 0.5));
//! agent.look(0.0, 0.0, true).unwrap();
//! agent.set_control(Control::Forward, true).unwrap();
//! agent.refresh(Duration::from_secs(1)).unwrap();
//! assert!(agent.position().z < 0.5);
//! ```

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::trace;
use voxnav_types::{Block, Control, NavError, Vec3, VoxelCoord};

use crate::actuator::Actuator;
use crate::world::VoxelWorld;

/// Default walking speed in voxels per second.
pub const WALK_SPEED: f64 = 4.317;

/// How far below its feet the simulated body looks for ground.
const FALL_SEARCH_DEPTH: i32 = 16;

// ────────────────────────────────────────────────────────────────────────────
// SimWorld
// ────────────────────────────────────────────────────────────────────────────

/// A voxel store backed by a `HashMap`.
///
/// Unset voxels read as air.  When loaded bounds are configured, voxels
/// outside them read as unavailable (`None`), mimicking unloaded chunks.
#[derive(Debug, Clone, Default)]
pub struct SimWorld {
    blocks: HashMap<VoxelCoord, Block>,
    loaded: Option<(VoxelCoord, VoxelCoord)>,
}

impl SimWorld {
    /// Create an empty, fully loaded world.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a world from a [`Scene`] description.
    pub fn from_scene(scene: &Scene) -> Self {
        let mut world = Self::new();
        for fill in &scene.fills {
            world.fill(
                VoxelCoord::new(fill.min[0], fill.min[1], fill.min[2]),
                VoxelCoord::new(fill.max[0], fill.max[1], fill.max[2]),
                Block::new(fill.kind.clone(), fill.variant),
            );
        }
        if let Some(bounds) = &scene.loaded {
            world.loaded = Some((
                VoxelCoord::new(bounds.min[0], bounds.min[1], bounds.min[2]),
                VoxelCoord::new(bounds.max[0], bounds.max[1], bounds.max[2]),
            ));
        }
        world
    }

    /// Restrict the loaded region to the inclusive box `[min, max]`.
    pub fn with_loaded_bounds(mut self, min: VoxelCoord, max: VoxelCoord) -> Self {
        self.loaded = Some((min, max));
        self
    }

    /// Builder form of [`fill`][Self::fill] with variant 0.
    pub fn with_fill(mut self, min: VoxelCoord, max: VoxelCoord, kind: &str) -> Self {
        self.fill(min, max, Block::new(kind, 0));
        self
    }

    /// Builder form of [`set`][Self::set] with variant 0.
    pub fn with_block(mut self, coord: VoxelCoord, kind: &str) -> Self {
        self.set(coord, Block::new(kind, 0));
        self
    }

    /// Place `block` at `coord`.  Placing air removes the entry.
    pub fn set(&mut self, coord: VoxelCoord, block: Block) {
        if block.is_air() {
            self.blocks.remove(&coord);
        } else {
            self.blocks.insert(coord, block);
        }
    }

    /// Fill the inclusive box spanned by `a` and `b` with `block`.
    pub fn fill(&mut self, a: VoxelCoord, b: VoxelCoord, block: Block) {
        for x in a.x.min(b.x)..=a.x.max(b.x) {
            for y in a.y.min(b.y)..=a.y.max(b.y) {
                for z in a.z.min(b.z)..=a.z.max(b.z) {
                    self.set(VoxelCoord::new(x, y, z), block.clone());
                }
            }
        }
    }

    /// Number of non-air voxels stored.
    pub fn solid_count(&self) -> usize {
        self.blocks.len()
    }

    fn is_loaded(&self, coord: VoxelCoord) -> bool {
        match self.loaded {
            None => true,
            Some((min, max)) => {
                (min.x..=max.x).contains(&coord.x)
                    && (min.y..=max.y).contains(&coord.y)
                    && (min.z..=max.z).contains(&coord.z)
            }
        }
    }
}

impl VoxelWorld for SimWorld {
    fn block_at(&self, coord: VoxelCoord) -> Option<Block> {
        if !self.is_loaded(coord) {
            return None;
        }
        Some(self.blocks.get(&coord).cloned().unwrap_or_else(Block::air))
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Scene
// ────────────────────────────────────────────────────────────────────────────

/// Serializable description of a simulated world, loaded by the CLI from TOML.
///
/// ```toml
/// spawn = [0.5, 64.0, 0.5]
///
/// [[fill]]
/// min = [-32, 60, -32]
/// max = [31, 63, 31]
/// kind = "stone"
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scene {
    /// Agent feet position at startup.
    #[serde(default = "default_spawn")]
    pub spawn: [f64; 3],
    /// Boxes applied in order; later fills overwrite earlier ones.
    #[serde(default, rename = "fill")]
    pub fills: Vec<FillBox>,
    /// Optional loaded region; everything outside reads as unavailable.
    #[serde(default)]
    pub loaded: Option<Bounds>,
}

/// One inclusive box of a single block kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FillBox {
    pub min: [i32; 3],
    pub max: [i32; 3],
    pub kind: String,
    #[serde(default)]
    pub variant: u32,
}

/// Inclusive integer bounds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    pub min: [i32; 3],
    pub max: [i32; 3],
}

fn default_spawn() -> [f64; 3] {
    [0.5, 64.0, 0.5]
}

impl Scene {
    pub fn spawn_point(&self) -> Vec3 {
        Vec3::new(self.spawn[0], self.spawn[1], self.spawn[2])
    }
}

/// A 64×64 stone platform with its top face at y = 63.
impl Default for Scene {
    fn default() -> Self {
        Self {
            spawn: default_spawn(),
            fills: vec![FillBox {
                min: [-32, 60, -32],
                max: [31, 63, 31],
                kind: "stone".to_string(),
                variant: 1,
            }],
            loaded: None,
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// SimAgent
// ────────────────────────────────────────────────────────────────────────────

/// One actuation call recorded by [`SimAgent`].
#[derive(Debug, Clone, PartialEq)]
pub enum ActuationCommand {
    Look { yaw: f64, pitch: f64, force: bool },
    SetControl { control: Control, active: bool },
    ClearControls,
}

/// A simulated agent body.
///
/// `look` applies immediately.  While `Forward` is latched, each
/// [`refresh`][Actuator::refresh] advances the body along its heading at
/// [`WALK_SPEED`].  Without terrain the motion is planar; with terrain
/// attached the body follows the ground, steps up one voxel only while
/// `Jump` is latched, and is stopped by walls at head height.
///
/// [`with_disconnect_after`][SimAgent::with_disconnect_after] simulates a
/// client that drops its link mid-traversal.
pub struct SimAgent {
    id: String,
    position: Vec3,
    yaw: f64,
    pitch: f64,
    forward: bool,
    jump: bool,
    walk_speed: f64,
    terrain: Option<Arc<SimWorld>>,
    commands: Vec<ActuationCommand>,
    refreshes: u32,
    disconnect_after: Option<u32>,
}

impl SimAgent {
    /// Create an agent standing at `position`, facing -Z.
    pub fn new(id: impl Into<String>, position: Vec3) -> Self {
        Self {
            id: id.into(),
            position,
            yaw: 0.0,
            pitch: 0.0,
            forward: false,
            jump: false,
            walk_speed: WALK_SPEED,
            terrain: None,
            commands: Vec::new(),
            refreshes: 0,
            disconnect_after: None,
        }
    }

    pub fn with_yaw(mut self, yaw: f64) -> Self {
        self.yaw = yaw;
        self
    }

    pub fn with_walk_speed(mut self, speed: f64) -> Self {
        self.walk_speed = speed;
        self
    }

    /// Follow the surface of `world` instead of moving in a plane.
    pub fn with_terrain(mut self, world: Arc<SimWorld>) -> Self {
        self.terrain = Some(world);
        self
    }

    /// Lose the link after `refreshes` successful refreshes.  From then on
    /// `refresh`, `look` and `set_control` fail with
    /// [`NavError::HardwareFault`]; `clear_controls` still releases the body.
    pub fn with_disconnect_after(mut self, refreshes: u32) -> Self {
        self.disconnect_after = Some(refreshes);
        self
    }

    pub fn is_connected(&self) -> bool {
        self.disconnect_after.is_none_or(|limit| self.refreshes < limit)
    }

    fn link(&self) -> Result<(), NavError> {
        if self.is_connected() {
            Ok(())
        } else {
            Err(NavError::HardwareFault {
                component: self.id.clone(),
                details: format!("link lost after {} refreshes", self.refreshes),
            })
        }
    }

    /// Every actuation call received so far, in order.
    pub fn commands(&self) -> &[ActuationCommand] {
        &self.commands
    }

    /// `true` when `control` is currently latched on.
    pub fn is_active(&self, control: Control) -> bool {
        match control {
            Control::Forward => self.forward,
            Control::Jump => self.jump,
        }
    }

    /// `true` if `control` was ever latched on.
    pub fn ever_engaged(&self, control: Control) -> bool {
        self.commands.iter().any(|c| {
            matches!(c, ActuationCommand::SetControl { control: c2, active: true } if *c2 == control)
        })
    }

    pub fn teleport(&mut self, position: Vec3) {
        self.position = position;
    }

    /// Resolve where the body ends up when it tries to move to `candidate`.
    /// Returns `None` when the move is blocked.
    fn settle(&self, world: &SimWorld, candidate: Vec3) -> Option<Vec3> {
        let feet = candidate.floor();
        let solid = |c: VoxelCoord| world.is_solid(c).unwrap_or(true);

        if solid(feet.above()) {
            return None;
        }
        if solid(feet) {
            if !self.jump || solid(feet.offset(0, 2, 0)) {
                return None;
            }
            return Some(Vec3::new(candidate.x, (feet.y + 1) as f64, candidate.z));
        }
        (1..=FALL_SEARCH_DEPTH)
            .map(|d| feet.offset(0, -d, 0))
            .find(|c| solid(*c))
            .map(|ground| Vec3::new(candidate.x, (ground.y + 1) as f64, candidate.z))
    }
}

impl Actuator for SimAgent {
    fn id(&self) -> &str {
        &self.id
    }

    fn refresh(&mut self, elapsed: Duration) -> Result<(), NavError> {
        self.link()?;
        self.refreshes += 1;
        if !self.forward {
            return Ok(());
        }
        let step = self.walk_speed * elapsed.as_secs_f64();
        let candidate = self
            .position
            .offset(-self.yaw.sin() * step, 0.0, -self.yaw.cos() * step);
        let next = match &self.terrain {
            None => Some(candidate),
            Some(world) => self.settle(world, candidate),
        };
        if let Some(next) = next {
            trace!(agent = %self.id, from = %self.position, to = %next, "sim step");
            self.position = next;
        }
        Ok(())
    }

    fn position(&self) -> Vec3 {
        self.position
    }

    fn yaw(&self) -> f64 {
        self.yaw
    }

    fn look(&mut self, yaw: f64, pitch: f64, force: bool) -> Result<(), NavError> {
        self.link()?;
        self.yaw = yaw;
        self.pitch = pitch;
        self.commands
            .push(ActuationCommand::Look { yaw, pitch, force });
        Ok(())
    }

    fn set_control(&mut self, control: Control, active: bool) -> Result<(), NavError> {
        self.link()?;
        match control {
            Control::Forward => self.forward = active,
            Control::Jump => self.jump = active,
        }
        self.commands
            .push(ActuationCommand::SetControl { control, active });
        Ok(())
    }

    fn clear_controls(&mut self) -> Result<(), NavError> {
        self.forward = false;
        self.jump = false;
        self.commands.push(ActuationCommand::ClearControls);
        Ok(())
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────
