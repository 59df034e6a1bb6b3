//! [`Navigator`] – one navigate request, end to end.
//!
//! sample → build graph → resolve start and goal → plan → execute each
//! waypoint in order.  Resolution and planning failures abort the request
//! before any actuation.  A waypoint that times out is logged and skipped;
//! a cancelled traversal abandons the rest of the route.

use std::fmt;

use tracing::{info, warn};
use uuid::Uuid;
use voxnav_hal::{Actuator, VoxelWorld};
use voxnav_kernel::ActuationAuthority;
use voxnav_perception::resolver::MAX_SEARCH_RADIUS;
use voxnav_perception::{NearestNodeResolver, Observation, SamplerConfig, WorldSampler};
use voxnav_types::{NavError, Vec3, VoxelCoord, Waypoint};

use crate::control_loop::{ControlConfig, TraversalState, traverse_to_waypoint};
use crate::planner::Planner;

// ─────────────────────────────────────────────────────────────────────────────
// Configuration
// ─────────────────────────────────────────────────────────────────────────────

/// How planner waypoints map onto control-loop targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WaypointAnchor {
    /// Waypoints name ground blocks; drive to the centre of the block's top
    /// face.
    #[default]
    BlockTop,
    /// Drive to the returned coordinates verbatim.
    Raw,
}

impl WaypointAnchor {
    pub fn apply(self, waypoint: Waypoint) -> Waypoint {
        match self {
            WaypointAnchor::BlockTop => waypoint.floor().standing_point(),
            WaypointAnchor::Raw => waypoint,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct NavigatorConfig {
    pub sampler: SamplerConfig,
    pub control: ControlConfig,
    /// Upper bound for snapping the agent and the goal onto the graph.
    pub max_search_radius: u32,
    pub anchor: WaypointAnchor,
}

impl Default for NavigatorConfig {
    fn default() -> Self {
        Self {
            sampler: SamplerConfig::default(),
            control: ControlConfig::default(),
            max_search_radius: MAX_SEARCH_RADIUS,
            anchor: WaypointAnchor::default(),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Report
// ─────────────────────────────────────────────────────────────────────────────

/// Summary of one completed navigate request.
#[derive(Debug, Clone, PartialEq)]
pub struct NavigationReport {
    pub observation_id: Uuid,
    pub start: VoxelCoord,
    pub goal: VoxelCoord,
    /// Waypoints the planner returned.
    pub planned: usize,
    pub reached: usize,
    pub timed_out: usize,
    pub cancelled: bool,
}

impl NavigationReport {
    /// `true` when every planned waypoint was reached.
    pub fn is_complete(&self) -> bool {
        !self.cancelled && self.reached == self.planned
    }
}

impl fmt::Display for NavigationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} -> {}: {}/{} waypoints reached, {} timed out{}",
            self.start,
            self.goal,
            self.reached,
            self.planned,
            self.timed_out,
            if self.cancelled { ", cancelled" } else { "" }
        )
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Navigator
// ─────────────────────────────────────────────────────────────────────────────

/// Owns one agent and drives it through navigate requests.
pub struct Navigator<W, A> {
    world: W,
    actuator: A,
    planner: Box<dyn Planner>,
    authority: ActuationAuthority,
    sampler: WorldSampler,
    resolver: NearestNodeResolver,
    config: NavigatorConfig,
}

impl<W: VoxelWorld, A: Actuator> Navigator<W, A> {
    pub fn new(world: W, actuator: A, planner: Box<dyn Planner>, config: NavigatorConfig) -> Self {
        Self {
            world,
            actuator,
            planner,
            authority: ActuationAuthority::new(),
            sampler: WorldSampler::new(config.sampler),
            resolver: NearestNodeResolver::new(config.max_search_radius),
            config,
        }
    }

    /// Share an existing authority, e.g. one a signal handler already holds.
    pub fn with_authority(mut self, authority: ActuationAuthority) -> Self {
        self.authority = authority;
        self
    }

    /// A handle that can cancel the running traversal from elsewhere.
    pub fn authority(&self) -> ActuationAuthority {
        self.authority.clone()
    }

    pub fn world(&self) -> &W {
        &self.world
    }

    pub fn actuator(&self) -> &A {
        &self.actuator
    }

    pub fn actuator_mut(&mut self) -> &mut A {
        &mut self.actuator
    }

    pub fn config(&self) -> &NavigatorConfig {
        &self.config
    }

    /// Sample around the agent and build the graph.  Never fails; check
    /// [`Observation::missing_voxels`] for gaps.
    pub fn observe(&self, goal: Option<VoxelCoord>) -> Observation {
        let obs = Observation::capture(&self.world, &self.sampler, self.actuator.position());
        match goal {
            Some(goal) => obs.with_goal(goal),
            None => obs,
        }
    }

    /// The graph node the agent stands on, or the nearest one.
    fn resolve_start(&self, obs: &Observation) -> Result<VoxelCoord, NavError> {
        // Feet rest on the upper face of the supporting voxel.
        let support = self.actuator.position().offset(0.0, -0.5, 0.0);
        Ok(self.resolver.require(support, &obs.graph)?.coord)
    }

    /// Navigate to the ground block nearest `goal`.
    ///
    /// # Errors
    ///
    /// - [`NavError::ActuationBusy`] if another traversal holds the agent.
    /// - [`NavError::NoWalkableNodeNear`] if start or goal cannot be resolved.
    /// - Any `Planner*` error from the planner.
    /// - [`NavError::HardwareFault`] from the actuator.
    ///
    /// Waypoint timeouts and cancellation are reported in the
    /// [`NavigationReport`], not as errors.
    pub async fn navigate(&mut self, goal: Vec3) -> Result<NavigationReport, NavError> {
        let token = self.authority.acquire(&format!("navigate {goal}"))?;

        let obs = self.observe(None);
        let start = self.resolve_start(&obs)?;
        let goal_node = self.resolver.require(goal, &obs.graph)?.coord;
        let obs = obs.with_goal(goal_node);
        info!(
            observation = %obs.id,
            %start,
            goal = %goal_node,
            nodes = obs.graph.node_count(),
            edges = obs.graph.edge_count(),
            "requesting route"
        );

        let waypoints = self
            .planner
            .submit_observation(&obs, start, goal_node)
            .await?;

        let mut report = NavigationReport {
            observation_id: obs.id,
            start,
            goal: goal_node,
            planned: waypoints.len(),
            reached: 0,
            timed_out: 0,
            cancelled: false,
        };

        for (i, waypoint) in waypoints.into_iter().enumerate() {
            if token.is_cancelled() {
                report.cancelled = true;
                break;
            }
            let target = self.config.anchor.apply(waypoint);
            info!(index = i, waypoint = %target, "traversing");

            let state = traverse_to_waypoint(
                &self.world,
                &mut self.actuator,
                target,
                &token,
                &self.config.control,
            )
            .await?;

            match state.status {
                TraversalState::Arrived => report.reached += 1,
                _ if state.cancelled => {
                    report.cancelled = true;
                    break;
                }
                _ => report.timed_out += 1,
            }
        }

        if report.cancelled {
            warn!(%report, "navigation cancelled");
        } else {
            info!(%report, "navigation finished");
        }
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use async_trait::async_trait;
    use voxnav_hal::sim::{SimAgent, SimWorld};

    /// Returns a canned result and records every request.
    struct ScriptedPlanner {
        result: Result<Vec<Waypoint>, NavError>,
        calls: Arc<Mutex<Vec<(VoxelCoord, VoxelCoord, Option<VoxelCoord>)>>>,
    }

    #[async_trait]
    impl Planner for ScriptedPlanner {
        async fn submit_observation(
            &self,
            observation: &Observation,
            start: VoxelCoord,
            goal: VoxelCoord,
        ) -> Result<Vec<Waypoint>, NavError> {
            self.calls
                .lock()
                .unwrap()
                .push((start, goal, observation.goal));
            self.result.clone()
        }
    }

    type Calls = Arc<Mutex<Vec<(VoxelCoord, VoxelCoord, Option<VoxelCoord>)>>>;

    fn config() -> NavigatorConfig {
        NavigatorConfig {
            sampler: SamplerConfig {
                chunk_radius: 0,
                ceiling: 8,
                floor: -4,
            },
            ..NavigatorConfig::default()
        }
    }

    fn navigator(
        result: Result<Vec<Waypoint>, NavError>,
        walk_speed: f64,
    ) -> (Navigator<Arc<SimWorld>, SimAgent>, Calls) {
        let world = Arc::new(SimWorld::new().with_fill(
            VoxelCoord::new(0, 0, 0),
            VoxelCoord::new(7, 0, 7),
            "stone",
        ));
        let agent = SimAgent::new("bot", Vec3::new(0.5, 1.0, 0.5))
            .with_walk_speed(walk_speed)
            .with_terrain(Arc::clone(&world));
        let calls: Calls = Arc::default();
        let planner = ScriptedPlanner {
            result,
            calls: Arc::clone(&calls),
        };
        (Navigator::new(world, agent, Box::new(planner), config()), calls)
    }

    fn block(x: i32, y: i32, z: i32) -> Waypoint {
        VoxelCoord::new(x, y, z).as_vec3()
    }

    #[test]
    fn anchors_map_blocks_to_standing_points() {
        let wp = Vec3::new(3.0, 63.0, -2.0);
        assert_eq!(WaypointAnchor::BlockTop.apply(wp), Vec3::new(3.5, 64.0, -1.5));
        assert_eq!(WaypointAnchor::Raw.apply(wp), wp);
    }

    #[test]
    fn observe_attaches_goal() {
        let (nav, _) = navigator(Ok(vec![]), 0.0);
        let obs = nav.observe(Some(VoxelCoord::new(7, 0, 7)));
        assert_eq!(obs.graph.node_count(), 64);
        assert_eq!(obs.goal, Some(VoxelCoord::new(7, 0, 7)));
    }

    #[tokio::test(start_paused = true)]
    async fn follows_planned_route_to_goal() {
        let route = vec![block(1, 0, 1), block(2, 0, 2), block(3, 0, 3)];
        let (mut nav, calls) = navigator(Ok(route), voxnav_hal::sim::WALK_SPEED);

        let report = nav.navigate(Vec3::new(3.0, 0.0, 3.0)).await.unwrap();

        assert_eq!(report.start, VoxelCoord::new(0, 0, 0));
        assert_eq!(report.goal, VoxelCoord::new(3, 0, 3));
        assert_eq!((report.planned, report.reached, report.timed_out), (3, 3, 0));
        assert!(report.is_complete());
        assert!(nav.actuator().position().distance(Vec3::new(3.5, 1.0, 3.5)) < 0.5);
        assert_eq!(
            calls.lock().unwrap().as_slice(),
            &[(VoxelCoord::new(0, 0, 0), VoxelCoord::new(3, 0, 3), Some(VoxelCoord::new(3, 0, 3)))]
        );
        assert!(!nav.authority().is_held());
    }

    #[tokio::test(start_paused = true)]
    async fn planner_failure_aborts_without_actuation() {
        let (mut nav, _) = navigator(Err(NavError::PlannerReportedError("no path".into())), 4.0);
        let err = nav.navigate(Vec3::new(5.0, 0.0, 5.0)).await.unwrap_err();
        assert_eq!(err, NavError::PlannerReportedError("no path".into()));
        assert!(nav.actuator().commands().is_empty());
        assert!(!nav.authority().is_held());
    }

    #[tokio::test(start_paused = true)]
    async fn unresolvable_goal_never_reaches_planner() {
        let (mut nav, calls) = navigator(Ok(vec![]), 4.0);
        let err = nav.navigate(Vec3::new(40.0, 0.0, 40.0)).await.unwrap_err();
        assert!(matches!(err, NavError::NoWalkableNodeNear { max_radius: 10, .. }));
        assert!(calls.lock().unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn busy_authority_rejects_second_navigation() {
        let (mut nav, _) = navigator(Ok(vec![]), 4.0);
        let authority = nav.authority();
        let _held = authority.acquire("manual").unwrap();
        let err = nav.navigate(Vec3::new(3.0, 0.0, 3.0)).await.unwrap_err();
        assert_eq!(err, NavError::ActuationBusy { holder: "manual".into() });
    }

    #[tokio::test(start_paused = true)]
    async fn timed_out_waypoints_do_not_stop_the_route() {
        let (mut nav, _) = navigator(Ok(vec![block(3, 0, 0), block(5, 0, 0)]), 0.0);
        nav.config.control.timeout = Duration::from_millis(300);

        let report = nav.navigate(Vec3::new(5.0, 0.0, 0.0)).await.unwrap();
        assert_eq!((report.planned, report.reached, report.timed_out), (2, 0, 2));
        assert!(!report.cancelled);
        assert!(!report.is_complete());
    }

    #[tokio::test(start_paused = true)]
    async fn actuator_fault_aborts_route_and_releases_authority() {
        let world = Arc::new(SimWorld::new().with_fill(
            VoxelCoord::new(0, 0, 0),
            VoxelCoord::new(7, 0, 7),
            "stone",
        ));
        let agent = SimAgent::new("bot", Vec3::new(0.5, 1.0, 0.5))
            .with_walk_speed(0.0)
            .with_disconnect_after(2);
        let planner = ScriptedPlanner {
            result: Ok(vec![block(5, 0, 0), block(6, 0, 0)]),
            calls: Arc::default(),
        };
        let mut nav = Navigator::new(world, agent, Box::new(planner), config());

        let err = nav.navigate(Vec3::new(6.0, 0.0, 0.0)).await.unwrap_err();
        assert!(matches!(err, NavError::HardwareFault { .. }), "{err:?}");
        assert!(!nav.actuator().is_active(voxnav_types::Control::Forward));
        assert!(!nav.actuator().is_active(voxnav_types::Control::Jump));
        assert!(!nav.authority().is_held());
        assert!(nav.authority().acquire("next").is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_abandons_remaining_waypoints() {
        let (mut nav, _) = navigator(Ok(vec![block(5, 0, 0), block(6, 0, 0)]), 0.0);
        let authority = nav.authority();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(120)).await;
            authority.cancel_active();
        });

        let report = nav.navigate(Vec3::new(6.0, 0.0, 0.0)).await.unwrap();
        assert!(report.cancelled);
        assert_eq!((report.reached, report.timed_out), (0, 0));
        assert!(!nav.actuator().is_active(voxnav_types::Control::Forward));
    }
}
