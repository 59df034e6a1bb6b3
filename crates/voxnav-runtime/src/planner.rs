//! Planner Bridge.
//!
//! Global path search runs outside this process.  [`Planner`] is the seam:
//! hand it an [`Observation`] plus resolved start and goal nodes and get back
//! an ordered waypoint sequence or a typed [`NavError`].
//!
//! [`ProcessPlanner`] is the production implementation.  Per request it:
//!
//! 1. spawns the configured command with piped stdio;
//! 2. writes one JSON [`PlannerRequest`] to stdin and closes it;
//! 3. drains stdout and stderr concurrently (stderr lines go to `tracing`
//!    under the `voxnav::planner` target and are kept as diagnostics);
//! 4. maps the exit status and the parsed [`PlannerResponse`] onto a result.
//!
//! | Outcome | Result |
//! |---|---|
//! | spawn fails | [`NavError::PlannerSpawnFailure`] |
//! | non-zero exit | [`NavError::PlannerAbnormalExit`] with stderr text |
//! | exit 0, unparsable output | [`NavError::PlannerMalformedOutput`] |
//! | exit 0, `{"error": ...}` | [`NavError::PlannerReportedError`] |
//! | exit 0, `{"waypoints": [...]}` | `Ok(waypoints)`, possibly empty |
//! | no exit before the deadline | [`NavError::PlannerTimeout`], child killed |
//!
//! The child is owned for exactly one request and never reused.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use async_trait::async_trait;
use schemars::{JsonSchema, schema_for};
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, Command};
use tracing::{debug, info, warn};
use voxnav_perception::Observation;
use voxnav_types::{NavError, Vec3, VoxelCoord, Waypoint};

/// Version stamped into every request document.
pub const PROTOCOL_VERSION: u32 = 1;

// ─────────────────────────────────────────────────────────────────────────────
// Planner trait
// ─────────────────────────────────────────────────────────────────────────────

/// Converts a traversability graph plus start/goal into a route.
///
/// Implementations may be out-of-process ([`ProcessPlanner`]) or in-process;
/// the control loop and graph builder never know which.
#[async_trait]
pub trait Planner: Send + Sync {
    /// Plan a route from `start` to `goal` over `observation.graph`.
    ///
    /// # Errors
    ///
    /// Returns one of the `Planner*` variants of [`NavError`] when no route
    /// could be obtained.
    async fn submit_observation(
        &self,
        observation: &Observation,
        start: VoxelCoord,
        goal: VoxelCoord,
    ) -> Result<Vec<Waypoint>, NavError>;
}

// ─────────────────────────────────────────────────────────────────────────────
// Wire documents
// ─────────────────────────────────────────────────────────────────────────────

/// Inclusive bounds of the scan that produced the graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct WireRegion {
    pub chunk_x: i32,
    pub chunk_z: i32,
    pub chunk_radius: u32,
    pub min_x: i32,
    pub max_x: i32,
    pub min_z: i32,
    pub max_z: i32,
    pub min_y: i32,
    pub max_y: i32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct WireGroundBlock {
    pub x: i32,
    pub y: i32,
    pub z: i32,
    pub name: String,
    pub state_id: u32,
}

/// The document written to the planner's stdin.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct PlannerRequest {
    pub protocol_version: u32,
    /// UUID of the observation this request was built from.
    pub observation_id: String,
    /// RFC 3339 capture time.
    pub timestamp: String,
    pub agent_position: Vec3,
    pub region: WireRegion,
    /// Resolved start node.
    pub start: VoxelCoord,
    /// Resolved goal node.
    pub goal: VoxelCoord,
    /// Same as `start`; read by planners that predate `start`.
    pub bot_position: VoxelCoord,
    /// Same as `goal`; read by planners that predate `goal`.
    pub target: VoxelCoord,
    pub ground_blocks: Vec<WireGroundBlock>,
    /// Adjacency list keyed by `"x,y,z"`.
    pub graph: BTreeMap<String, Vec<String>>,
}

impl PlannerRequest {
    pub fn new(observation: &Observation, start: VoxelCoord, goal: VoxelCoord) -> Self {
        let region = &observation.region;
        let graph = observation
            .graph
            .nodes()
            .iter()
            .map(|node| {
                let neighbors = observation
                    .graph
                    .neighbors(*node)
                    .map(|n| n.to_string())
                    .collect();
                (node.to_string(), neighbors)
            })
            .collect();

        Self {
            protocol_version: PROTOCOL_VERSION,
            observation_id: observation.id.to_string(),
            timestamp: observation.timestamp.to_rfc3339(),
            agent_position: observation.agent_position,
            region: WireRegion {
                chunk_x: region.chunk_x,
                chunk_z: region.chunk_z,
                chunk_radius: region.chunk_radius,
                min_x: region.min_x,
                max_x: region.max_x,
                min_z: region.min_z,
                max_z: region.max_z,
                min_y: region.floor,
                max_y: region.ceiling,
            },
            start,
            goal,
            bot_position: start,
            target: goal,
            ground_blocks: observation
                .ground_blocks
                .iter()
                .map(|b| WireGroundBlock {
                    x: b.coord.x,
                    y: b.coord.y,
                    z: b.coord.z,
                    name: b.kind.clone(),
                    state_id: b.variant,
                })
                .collect(),
            graph,
        }
    }
}

/// The document read from the planner's stdout.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct PlannerResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub waypoints: Option<Vec<Vec3>>,
    /// Takes precedence over `waypoints` when both are present.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reasoning: Option<String>,
}

impl PlannerResponse {
    /// Collapse the document into the bridge's result.
    ///
    /// # Errors
    ///
    /// [`NavError::PlannerReportedError`] when `error` is set,
    /// [`NavError::PlannerMalformedOutput`] when neither field is set.
    pub fn into_result(self) -> Result<Vec<Waypoint>, NavError> {
        match (self.error, self.waypoints) {
            (Some(error), _) => Err(NavError::PlannerReportedError(error)),
            (None, Some(waypoints)) => Ok(waypoints),
            (None, None) => Err(NavError::PlannerMalformedOutput(
                "document has neither `waypoints` nor `error`".into(),
            )),
        }
    }
}

/// JSON Schema of [`PlannerRequest`].
pub fn request_schema() -> serde_json::Value {
    serde_json::to_value(schema_for!(PlannerRequest)).unwrap_or(serde_json::Value::Null)
}

/// JSON Schema of [`PlannerResponse`].
pub fn response_schema() -> serde_json::Value {
    serde_json::to_value(schema_for!(PlannerResponse)).unwrap_or(serde_json::Value::Null)
}

// ─────────────────────────────────────────────────────────────────────────────
// ProcessPlanner
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub struct ProcessPlannerConfig {
    pub program: String,
    pub args: Vec<String>,
    /// Kill the child and fail with [`NavError::PlannerTimeout`] after this
    /// long.  `None` waits indefinitely.
    pub timeout: Option<Duration>,
    pub working_dir: Option<PathBuf>,
}

impl Default for ProcessPlannerConfig {
    fn default() -> Self {
        Self {
            program: "python3".into(),
            args: vec!["brain/brain_cli.py".into()],
            timeout: Some(Duration::from_secs(60)),
            working_dir: None,
        }
    }
}

/// Runs one child process per planning request.
pub struct ProcessPlanner {
    config: ProcessPlannerConfig,
}

impl ProcessPlanner {
    pub fn new(config: ProcessPlannerConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ProcessPlannerConfig {
        &self.config
    }

    fn command_line(&self) -> String {
        std::iter::once(self.config.program.as_str())
            .chain(self.config.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Run the child to completion against a prepared request body.
    async fn run(&self, payload: &[u8]) -> Result<Vec<Waypoint>, NavError> {
        let mut command = Command::new(&self.config.program);
        command
            .args(&self.config.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(dir) = &self.config.working_dir {
            command.current_dir(dir);
        }

        let mut child = command.spawn().map_err(|e| NavError::PlannerSpawnFailure {
            program: self.command_line(),
            details: e.to_string(),
        })?;
        debug!(command = %self.command_line(), pid = ?child.id(), bytes = payload.len(), "planner spawned");

        let mut diagnostics = String::new();
        let outcome = {
            let exchange = exchange(&mut child, payload, &mut diagnostics);
            match self.config.timeout {
                Some(limit) => tokio::time::timeout(limit, exchange).await.ok(),
                None => Some(exchange.await),
            }
        };

        let Some(outcome) = outcome else {
            let _ = child.start_kill();
            let after_ms = self
                .config
                .timeout
                .map_or(0, |t| t.as_millis() as u64);
            return Err(NavError::PlannerTimeout {
                after_ms,
                diagnostics: diagnostics.trim_end().to_string(),
            });
        };

        let (stdout, status) = outcome.map_err(|e| NavError::PlannerAbnormalExit {
            status: None,
            diagnostics: format!("{diagnostics}{e}"),
        })?;

        if !status.success() {
            return Err(NavError::PlannerAbnormalExit {
                status: status.code(),
                diagnostics: diagnostics.trim_end().to_string(),
            });
        }

        let response: PlannerResponse = serde_json::from_slice(&stdout).map_err(|e| {
            let text = String::from_utf8_lossy(&stdout);
            let snippet: String = text.trim().chars().take(200).collect();
            NavError::PlannerMalformedOutput(format!("{e}: {snippet:?}"))
        })?;

        if response.confidence.is_some() || response.reasoning.is_some() {
            info!(
                confidence = ?response.confidence,
                reasoning = response.reasoning.as_deref().unwrap_or(""),
                "planner proposal"
            );
        }
        response.into_result()
    }
}

/// Feed `payload` to the child's stdin while draining stdout and stderr, then
/// reap the child.  Stderr lines are appended to `diagnostics` as they arrive.
async fn exchange(
    child: &mut Child,
    payload: &[u8],
    diagnostics: &mut String,
) -> std::io::Result<(Vec<u8>, ExitStatus)> {
    let missing = |stream: &str| std::io::Error::other(format!("child {stream} not piped"));
    let mut stdin = child.stdin.take().ok_or_else(|| missing("stdin"))?;
    let mut stdout = child.stdout.take().ok_or_else(|| missing("stdout"))?;
    let stderr = child.stderr.take().ok_or_else(|| missing("stderr"))?;

    let write = async move {
        // A child may exit without reading its input; the exit status decides.
        if let Err(e) = stdin.write_all(payload).await {
            debug!(error = %e, "planner stdin write failed");
        }
        let _ = stdin.shutdown().await;
    };
    let read_stdout = async move {
        let mut buf = Vec::new();
        stdout.read_to_end(&mut buf).await.map(|_| buf)
    };
    let read_stderr = async {
        let mut reader = BufReader::new(stderr);
        let mut buf = Vec::new();
        loop {
            buf.clear();
            match reader.read_until(b'\n', &mut buf).await {
                Ok(0) => break,
                Ok(_) => {
                    let line = String::from_utf8_lossy(&buf);
                    let line = line.trim_end_matches(['\n', '\r']);
                    debug!(target: "voxnav::planner", "{line}");
                    diagnostics.push_str(line);
                    diagnostics.push('\n');
                }
                Err(e) => {
                    // Keep the pipe open until EOF so the child never sees EPIPE.
                    warn!(target: "voxnav::planner", error = %e, "planner stderr unreadable; discarding the rest");
                    let _ = tokio::io::copy(&mut reader, &mut tokio::io::sink()).await;
                    break;
                }
            }
        }
    };

    let ((), stdout, ()) = tokio::join!(write, read_stdout, read_stderr);
    let status = child.wait().await?;
    Ok((stdout?, status))
}

#[async_trait]
impl Planner for ProcessPlanner {
    async fn submit_observation(
        &self,
        observation: &Observation,
        start: VoxelCoord,
        goal: VoxelCoord,
    ) -> Result<Vec<Waypoint>, NavError> {
        let request = PlannerRequest::new(observation, start, goal);
        let payload =
            serde_json::to_vec(&request).map_err(|e| NavError::Serialization(e.to_string()))?;

        let result = self.run(&payload).await;
        match &result {
            Ok(waypoints) => {
                info!(observation = %observation.id, waypoints = waypoints.len(), "planner returned route")
            }
            Err(e) => warn!(observation = %observation.id, error = %e, "planner failed"),
        }
        result
    }
}
