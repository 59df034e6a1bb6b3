//! `voxnav-types` – shared value types for the voxnav stack.
//!
//! Everything that crosses a crate boundary lives here: integer voxel
//! coordinates, continuous positions, block samples, actuation controls and
//! the workspace-wide [`NavError`].

use std::fmt;
use std::ops::Sub;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Block kinds that count as empty space.
pub const AIR_KINDS: &[&str] = &["air", "cave_air", "void_air"];

// ─────────────────────────────────────────────────────────────────────────────
// Coordinates
// ─────────────────────────────────────────────────────────────────────────────

/// Integer voxel coordinate.  Identity key for traversability graph nodes.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, JsonSchema,
)]
pub struct VoxelCoord {
    pub x: i32,
    pub y: i32,
    pub z: i32,
}

impl VoxelCoord {
    pub const fn new(x: i32, y: i32, z: i32) -> Self {
        Self { x, y, z }
    }

    /// Return the coordinate displaced by `(dx, dy, dz)`.
    pub const fn offset(self, dx: i32, dy: i32, dz: i32) -> Self {
        Self::new(self.x + dx, self.y + dy, self.z + dz)
    }

    /// The voxel directly above this one.
    pub const fn above(self) -> Self {
        self.offset(0, 1, 0)
    }

    /// Horizontal Chebyshev distance (max of |dx|, |dz|).
    pub fn horizontal_chebyshev(self, other: Self) -> i32 {
        (other.x - self.x).abs().max((other.z - self.z).abs())
    }

    /// Continuous position of this voxel's minimum corner.
    pub fn as_vec3(self) -> Vec3 {
        Vec3::new(self.x as f64, self.y as f64, self.z as f64)
    }

    /// The point an agent occupies when standing on top of this voxel:
    /// horizontally centred, feet on the upper face.
    pub fn standing_point(self) -> Vec3 {
        Vec3::new(self.x as f64 + 0.5, self.y as f64 + 1.0, self.z as f64 + 0.5)
    }
}

/// Renders as `x,y,z`, the key format used on the planner wire.
impl fmt::Display for VoxelCoord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{},{}", self.x, self.y, self.z)
    }
}

/// Continuous 3-D position (agent position, waypoint targets).
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize, JsonSchema)]
pub struct Vec3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Vec3 {
    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    pub fn length(self) -> f64 {
        (self.x * self.x + self.y * self.y + self.z * self.z).sqrt()
    }

    /// Euclidean distance to `other`.
    pub fn distance(self, other: Self) -> f64 {
        (other - self).length()
    }

    /// Unit vector in the same direction, or the zero vector when the length
    /// is zero.
    pub fn normalize(self) -> Self {
        let len = self.length();
        if len <= f64::EPSILON {
            return Self::default();
        }
        Self::new(self.x / len, self.y / len, self.z / len)
    }

    pub fn offset(self, dx: f64, dy: f64, dz: f64) -> Self {
        Self::new(self.x + dx, self.y + dy, self.z + dz)
    }

    /// The voxel containing this point (component-wise floor).
    pub fn floor(self) -> VoxelCoord {
        VoxelCoord::new(
            self.x.floor() as i32,
            self.y.floor() as i32,
            self.z.floor() as i32,
        )
    }
}

impl Sub for Vec3 {
    type Output = Vec3;

    fn sub(self, rhs: Self) -> Self::Output {
        Vec3::new(self.x - rhs.x, self.y - rhs.y, self.z - rhs.z)
    }
}

impl fmt::Display for Vec3 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({:.2}, {:.2}, {:.2})", self.x, self.y, self.z)
    }
}

/// One intermediate target position in a planned route.  Consumed exactly
/// once by the waypoint control loop.
pub type Waypoint = Vec3;

// ─────────────────────────────────────────────────────────────────────────────
// Blocks
// ─────────────────────────────────────────────────────────────────────────────

/// A voxel sample as reported by the world client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    /// Material identifier, e.g. `"stone"` or `"grass_block"`.
    pub kind: String,
    /// Form / orientation id (the client's block-state id).
    pub variant: u32,
}

impl Block {
    pub fn new(kind: impl Into<String>, variant: u32) -> Self {
        Self {
            kind: kind.into(),
            variant,
        }
    }

    pub fn air() -> Self {
        Self::new("air", 0)
    }

    /// `true` for every kind in [`AIR_KINDS`].
    pub fn is_air(&self) -> bool {
        AIR_KINDS.contains(&self.kind.as_str())
    }
}

/// The topmost non-empty voxel of one horizontal column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroundBlock {
    pub coord: VoxelCoord,
    pub kind: String,
    pub variant: u32,
}

// ─────────────────────────────────────────────────────────────────────────────
// Actuation
// ─────────────────────────────────────────────────────────────────────────────

/// Latching movement controls exposed by the voxel-world client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Control {
    Forward,
    Jump,
}

impl fmt::Display for Control {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Control::Forward => write!(f, "forward"),
            Control::Jump => write!(f, "jump"),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Errors
// ─────────────────────────────────────────────────────────────────────────────

/// Global error type spanning sampling gaps, resolution and planner failures,
/// traversal timeouts and actuation faults.
#[derive(Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum NavError {
    #[error("Sampling incomplete: {missing_voxels} voxel(s) unavailable")]
    SamplingIncomplete { missing_voxels: usize },

    #[error("No walkable node within {max_radius} voxel(s) of {position}")]
    NoWalkableNodeNear { position: Vec3, max_radius: u32 },

    #[error("Planner spawn failed for `{program}`: {details}")]
    PlannerSpawnFailure { program: String, details: String },

    #[error("Planner exited abnormally (status {status:?}): {diagnostics}")]
    PlannerAbnormalExit {
        status: Option<i32>,
        diagnostics: String,
    },

    #[error("Planner output malformed: {0}")]
    PlannerMalformedOutput(String),

    #[error("Planner reported error: {0}")]
    PlannerReportedError(String),

    #[error("Planner timed out after {after_ms} ms: {diagnostics}")]
    PlannerTimeout { after_ms: u64, diagnostics: String },

    #[error("Waypoint {waypoint} not reached within {after_ms} ms")]
    WaypointTimeout { waypoint: Vec3, after_ms: u64 },

    #[error("Actuation authority held by {holder}")]
    ActuationBusy { holder: String },

    #[error("Hardware Fault on {component}: {details}")]
    HardwareFault { component: String, details: String },

    #[error("Serialization Error: {0}")]
    Serialization(String),
}
