//! Waypoint Control Loop.
//!
//! Drives the agent toward one [`Waypoint`] at a fixed tick rate until it
//! arrives, the per-waypoint timeout fires, or the traversal is cancelled
//! through its [`ActuationToken`].
//!
//! Each tick is one synchronous actuation decision ([`move_toward`]):
//!
//! 1. distance to the target below the arrival radius → **ARRIVED**;
//! 2. otherwise look toward `atan2(-dx, -dz)`;
//! 3. heading error below the turn threshold → move forward, jumping when a
//!    step-up lies one voxel ahead; otherwise stop and turn in place.
//!
//! [`traverse_to_waypoint`] wraps the decision in a tokio interval raced
//! against a hard deadline and the token's cancellation signal, so a cancel
//! lands mid-tick.  Every exit path clears the agent's controls, so no error
//! can leave `forward` or `jump` latched.

use std::f64::consts::{FRAC_PI_4, PI, TAU};
use std::time::Duration;

use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::{debug, warn};
use voxnav_hal::{Actuator, VoxelWorld};
use voxnav_kernel::ActuationToken;
use voxnav_types::{Control, NavError, Vec3, Waypoint};

// ─────────────────────────────────────────────────────────────────────────────
// Configuration
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ControlConfig {
    /// Period between actuation decisions (50 ms = 20 Hz).
    pub tick: Duration,
    /// Hard per-waypoint wall-clock limit.
    pub timeout: Duration,
    /// Distance below which the waypoint counts as reached.
    pub arrival_radius: f64,
    /// Heading error (radians) above which the agent turns in place.
    pub turn_threshold: f64,
}

impl Default for ControlConfig {
    fn default() -> Self {
        Self {
            tick: Duration::from_millis(50),
            timeout: Duration::from_secs(30),
            arrival_radius: 0.5,
            turn_threshold: FRAC_PI_4,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// State
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TraversalState {
    Approaching,
    Arrived,
    TimedOut,
}

/// Per-traversal mutable state.  Owned by exactly one running loop.
#[derive(Debug, Clone, PartialEq)]
pub struct ControlLoopState {
    pub target: Waypoint,
    /// Heading most recently commanded.
    pub heading: f64,
    pub elapsed: Duration,
    pub status: TraversalState,
    pub ticks: u32,
    /// Set when the loop ended because its token was cancelled.
    pub cancelled: bool,
}

impl ControlLoopState {
    pub fn new(target: Waypoint, heading: f64) -> Self {
        Self {
            target,
            heading,
            elapsed: Duration::ZERO,
            status: TraversalState::Approaching,
            ticks: 0,
            cancelled: false,
        }
    }

    pub fn arrived(&self) -> bool {
        self.status == TraversalState::Arrived
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Geometry helpers
// ─────────────────────────────────────────────────────────────────────────────

/// Wrap `angle` into `(-π, π]`.
pub fn normalize_angle(angle: f64) -> f64 {
    let wrapped = angle.rem_euclid(TAU);
    if wrapped > PI { wrapped - TAU } else { wrapped }
}

/// Heading that faces from `from` toward `to` in the horizontal plane.
pub fn heading_to(from: Vec3, to: Vec3) -> f64 {
    let dx = to.x - from.x;
    let dz = to.z - from.z;
    (-dx).atan2(-dz)
}

/// `true` when the voxel one step ahead (horizontally, along the direction
/// to `target`) at foot height is solid and the voxel above it is empty.
/// Unavailable data never triggers a jump.
pub fn should_jump<W: VoxelWorld + ?Sized>(world: &W, position: Vec3, target: Vec3) -> bool {
    let dir = (target - position).normalize();
    let ahead = position.offset(dir.x, 0.0, dir.z).floor();
    world.is_solid(ahead) == Some(true) && world.is_solid(ahead.above()) == Some(false)
}

// ─────────────────────────────────────────────────────────────────────────────
// One tick
// ─────────────────────────────────────────────────────────────────────────────

/// Make one actuation decision for the traversal in `state`.
///
/// Holding `token` is what entitles the caller to drive `actuator`.  A
/// cancelled token resolves the traversal to [`TraversalState::TimedOut`]
/// without issuing any command.
///
/// # Errors
///
/// Propagates [`NavError::HardwareFault`] from the actuator.
pub fn move_toward<W, A>(
    world: &W,
    actuator: &mut A,
    state: &mut ControlLoopState,
    token: &ActuationToken,
    config: &ControlConfig,
) -> Result<TraversalState, NavError>
where
    W: VoxelWorld + ?Sized,
    A: Actuator + ?Sized,
{
    state.ticks += 1;

    if token.is_cancelled() {
        state.cancelled = true;
        state.status = TraversalState::TimedOut;
        return Ok(state.status);
    }

    let position = actuator.position();
    if position.distance(state.target) < config.arrival_radius {
        actuator.clear_controls()?;
        state.status = TraversalState::Arrived;
        return Ok(state.status);
    }

    let desired = heading_to(position, state.target);
    let error = normalize_angle(desired - actuator.yaw());

    actuator.look(desired, 0.0, true)?;
    state.heading = desired;

    if error.abs() < config.turn_threshold {
        actuator.set_control(Control::Forward, true)?;
        let jump = should_jump(world, position, state.target);
        actuator.set_control(Control::Jump, jump)?;
    } else {
        actuator.set_control(Control::Forward, false)?;
        actuator.set_control(Control::Jump, false)?;
    }

    Ok(state.status)
}

// ─────────────────────────────────────────────────────────────────────────────
// Full traversal
// ─────────────────────────────────────────────────────────────────────────────

/// Drive `actuator` to `target`, one decision per tick, until arrival,
/// timeout or cancellation.
///
/// A timeout is not an error: the returned state is
/// [`TraversalState::TimedOut`] and a [`NavError::WaypointTimeout`] is logged
/// at warn level.  Controls are cleared before returning on every path.
///
/// # Errors
///
/// Propagates [`NavError::HardwareFault`] from the actuator.
pub async fn traverse_to_waypoint<W, A>(
    world: &W,
    actuator: &mut A,
    target: Waypoint,
    token: &ActuationToken,
    config: &ControlConfig,
) -> Result<ControlLoopState, NavError>
where
    W: VoxelWorld + ?Sized,
    A: Actuator + ?Sized,
{
    let mut state = ControlLoopState::new(target, actuator.yaw());
    let start = Instant::now();
    let deadline = time::sleep_until(start + config.timeout);
    tokio::pin!(deadline);
    let cancelled = token.cancelled();
    tokio::pin!(cancelled);

    // A zero period would panic inside tokio.
    let mut interval = time::interval(config.tick.max(Duration::from_millis(1)));
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut last = start;

    debug!(waypoint = %target, holder = token.holder(), "traversal started");

    let result = loop {
        tokio::select! {
            biased;
            _ = &mut deadline => {
                state.status = TraversalState::TimedOut;
                break Ok(());
            }
            _ = &mut cancelled => {
                state.cancelled = true;
                state.status = TraversalState::TimedOut;
                break Ok(());
            }
            _ = interval.tick() => {}
        }

        let now = Instant::now();
        state.elapsed = now - start;
        if let Err(e) = actuator.refresh(now - last) {
            break Err(e);
        }
        last = now;

        match move_toward(world, actuator, &mut state, token, config) {
            Ok(TraversalState::Approaching) => {}
            Ok(_) => break Ok(()),
            Err(e) => break Err(e),
        }
    };
    state.elapsed = start.elapsed();

    // Always release the controls, even when the loop failed.
    let cleared = actuator.clear_controls();
    result?;
    cleared?;

    match state.status {
        TraversalState::Arrived => {
            debug!(waypoint = %target, ticks = state.ticks, "waypoint reached");
        }
        _ if state.cancelled => {
            debug!(waypoint = %target, "traversal cancelled");
        }
        _ => {
            let err = NavError::WaypointTimeout {
                waypoint: target,
                after_ms: state.elapsed.as_millis() as u64,
            };
            warn!(error = %err, position = %actuator.position(), "giving up on waypoint");
        }
    }
    Ok(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use voxnav_hal::sim::{ActuationCommand, SimAgent, SimWorld};
    use voxnav_kernel::ActuationAuthority;
    use voxnav_types::VoxelCoord;

    fn flat_world() -> Arc<SimWorld> {
        Arc::new(SimWorld::new().with_fill(
            VoxelCoord::new(-8, 0, -8),
            VoxelCoord::new(8, 0, 8),
            "stone",
        ))
    }

    #[test]
    fn normalize_angle_wraps_into_half_open_range() {
        assert!((normalize_angle(3.0 * PI / 2.0) + PI / 2.0).abs() < 1e-12);
        assert_eq!(normalize_angle(-PI), PI);
        assert_eq!(normalize_angle(PI), PI);
        assert!((normalize_angle(0.1) - 0.1).abs() < 1e-12);
        assert!((normalize_angle(-5.0 * PI / 2.0) + PI / 2.0).abs() < 1e-12);
    }

    #[test]
    fn heading_points_along_minus_z_at_zero() {
        let origin = Vec3::default();
        assert!(heading_to(origin, Vec3::new(0.0, 0.0, -1.0)).abs() < 1e-12);
        assert!((heading_to(origin, Vec3::new(1.0, 0.0, 0.0)) + PI / 2.0).abs() < 1e-12);
        assert!((heading_to(origin, Vec3::new(-1.0, 0.0, 0.0)) - PI / 2.0).abs() < 1e-12);
    }

    #[test]
    fn jump_needs_obstacle_with_clear_top() {
        let world = SimWorld::new()
            .with_fill(VoxelCoord::new(0, 0, 0), VoxelCoord::new(4, 0, 0), "stone")
            .with_block(VoxelCoord::new(2, 1, 0), "stone");
        let target = Vec3::new(4.5, 1.0, 0.5);
        assert!(should_jump(&world, Vec3::new(1.5, 1.0, 0.5), target));
        assert!(!should_jump(&world, Vec3::new(0.2, 1.0, 0.5), target));

        let wall = world.with_block(VoxelCoord::new(2, 2, 0), "stone");
        assert!(!should_jump(&wall, Vec3::new(1.5, 1.0, 0.5), target));

        let unloaded = SimWorld::new()
            .with_loaded_bounds(VoxelCoord::new(0, 0, 0), VoxelCoord::new(0, 0, 0));
        assert!(!should_jump(&unloaded, Vec3::new(1.5, 1.0, 0.5), target));
    }

    #[test]
    fn large_heading_error_turns_in_place() {
        let world = flat_world();
        let mut agent = SimAgent::new("bot", Vec3::new(0.5, 1.0, 0.5));
        let token = ActuationToken::detached("test");
        // Facing -Z, target straight behind.
        let mut state = ControlLoopState::new(Vec3::new(0.5, 1.0, 5.5), agent.yaw());

        let status =
            move_toward(&*world, &mut agent, &mut state, &token, &ControlConfig::default()).unwrap();
        assert_eq!(status, TraversalState::Approaching);
        assert!(matches!(agent.commands()[0], ActuationCommand::Look { force: true, .. }));
        assert_eq!(
            &agent.commands()[1..],
            &[
                ActuationCommand::SetControl { control: Control::Forward, active: false },
                ActuationCommand::SetControl { control: Control::Jump, active: false },
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn already_there_arrives_on_first_tick() {
        let world = flat_world();
        let mut agent = SimAgent::new("bot", Vec3::new(0.5, 1.0, 0.5));
        let token = ActuationToken::detached("test");

        let state = traverse_to_waypoint(
            &*world,
            &mut agent,
            Vec3::new(0.7, 1.0, 0.6),
            &token,
            &ControlConfig::default(),
        )
        .await
        .unwrap();

        assert_eq!(state.status, TraversalState::Arrived);
        assert_eq!(state.ticks, 1);
        assert_eq!(state.elapsed, Duration::ZERO);
        assert!(!agent.ever_engaged(Control::Forward));
        assert!(!agent.ever_engaged(Control::Jump));
        assert_eq!(agent.commands().last(), Some(&ActuationCommand::ClearControls));
    }

    #[tokio::test(start_paused = true)]
    async fn unreachable_target_times_out_exactly_and_clears_controls() {
        let world = flat_world();
        let mut agent = SimAgent::new("bot", Vec3::new(0.5, 1.0, 0.5)).with_walk_speed(0.0);
        let token = ActuationToken::detached("test");
        let start = Instant::now();

        let state = traverse_to_waypoint(
            &*world,
            &mut agent,
            Vec3::new(6.5, 1.0, 0.5),
            &token,
            &ControlConfig::default(),
        )
        .await
        .unwrap();

        assert_eq!(state.status, TraversalState::TimedOut);
        assert!(!state.cancelled);
        assert_eq!(start.elapsed(), Duration::from_secs(30));
        assert_eq!(state.elapsed, Duration::from_secs(30));
        assert!(agent.ever_engaged(Control::Forward));
        assert!(!agent.is_active(Control::Forward));
        assert!(!agent.is_active(Control::Jump));
        assert_eq!(agent.commands().last(), Some(&ActuationCommand::ClearControls));
    }

    #[tokio::test(start_paused = true)]
    async fn custom_timeout_is_honoured() {
        let world = flat_world();
        let mut agent = SimAgent::new("bot", Vec3::new(0.5, 1.0, 0.5)).with_walk_speed(0.0);
        let token = ActuationToken::detached("test");
        let config = ControlConfig {
            timeout: Duration::from_millis(1_234),
            ..ControlConfig::default()
        };
        let start = Instant::now();

        let state = traverse_to_waypoint(&*world, &mut agent, Vec3::new(6.5, 1.0, 0.5), &token, &config)
            .await
            .unwrap();
        assert_eq!(state.status, TraversalState::TimedOut);
        assert_eq!(start.elapsed(), Duration::from_millis(1_234));
    }

    #[tokio::test(start_paused = true)]
    async fn walks_to_reachable_target() {
        let world = flat_world();
        let mut agent =
            SimAgent::new("bot", Vec3::new(0.5, 1.0, 0.5)).with_terrain(Arc::clone(&world));
        let token = ActuationToken::detached("test");
        let target = Vec3::new(5.5, 1.0, 3.5);

        let state = traverse_to_waypoint(&*world, &mut agent, target, &token, &ControlConfig::default())
            .await
            .unwrap();

        assert_eq!(state.status, TraversalState::Arrived);
        assert!(agent.position().distance(target) < 0.5);
        assert!(state.elapsed < Duration::from_secs(5));
        assert!(!agent.is_active(Control::Forward));
    }

    #[tokio::test(start_paused = true)]
    async fn jumps_onto_a_step() {
        let world = Arc::new(
            SimWorld::new()
                .with_fill(VoxelCoord::new(-2, 0, -2), VoxelCoord::new(6, 0, 2), "stone")
                .with_fill(VoxelCoord::new(3, 1, -2), VoxelCoord::new(6, 1, 2), "stone"),
        );
        let mut agent =
            SimAgent::new("bot", Vec3::new(0.5, 1.0, 0.5)).with_terrain(Arc::clone(&world));
        let token = ActuationToken::detached("test");
        let target = Vec3::new(4.5, 2.0, 0.5);

        let state = traverse_to_waypoint(&*world, &mut agent, target, &token, &ControlConfig::default())
            .await
            .unwrap();

        assert_eq!(state.status, TraversalState::Arrived);
        assert!(agent.ever_engaged(Control::Jump));
        assert!((agent.position().y - 2.0).abs() < 1e-9);
    }

    #[tokio::test(start_paused = true)]
    async fn actuator_fault_propagates_and_releases_controls() {
        let world = flat_world();
        let mut agent = SimAgent::new("bot", Vec3::new(0.5, 1.0, 0.5))
            .with_walk_speed(0.0)
            .with_disconnect_after(3);
        let token = ActuationToken::detached("test");

        let err = traverse_to_waypoint(
            &*world,
            &mut agent,
            Vec3::new(6.5, 1.0, 0.5),
            &token,
            &ControlConfig::default(),
        )
        .await
        .unwrap_err();

        assert!(matches!(err, NavError::HardwareFault { .. }), "{err:?}");
        assert!(agent.ever_engaged(Control::Forward));
        assert!(!agent.is_active(Control::Forward));
        assert!(!agent.is_active(Control::Jump));
        assert_eq!(agent.commands().last(), Some(&ActuationCommand::ClearControls));
    }

    #[tokio::test(start_paused = true)]
    async fn pre_cancelled_token_halts_immediately() {
        let world = flat_world();
        let mut agent = SimAgent::new("bot", Vec3::new(0.5, 1.0, 0.5));
        let token = ActuationToken::detached("test");
        token.cancel();

        let state = traverse_to_waypoint(
            &*world,
            &mut agent,
            Vec3::new(6.5, 1.0, 0.5),
            &token,
            &ControlConfig::default(),
        )
        .await
        .unwrap();

        assert_eq!(state.status, TraversalState::TimedOut);
        assert!(state.cancelled);
        assert_eq!(agent.commands(), &[ActuationCommand::ClearControls]);
    }

    #[tokio::test(start_paused = true)]
    async fn out_of_band_cancel_stops_traversal() {
        let world = flat_world();
        let mut agent = SimAgent::new("bot", Vec3::new(0.5, 1.0, 0.5)).with_walk_speed(0.0);
        let authority = ActuationAuthority::new();
        let token = authority.acquire("navigate").unwrap();

        let remote = authority.clone();
        // Between two ticks.
        tokio::spawn(async move {
            time::sleep(Duration::from_millis(220)).await;
            remote.cancel_active();
        });

        let state = traverse_to_waypoint(
            &*world,
            &mut agent,
            Vec3::new(6.5, 1.0, 0.5),
            &token,
            &ControlConfig::default(),
        )
        .await
        .unwrap();

        assert!(state.cancelled);
        assert_eq!(state.status, TraversalState::TimedOut);
        assert_eq!(state.elapsed, Duration::from_millis(220));
        assert!(!agent.is_active(Control::Forward));
        assert_eq!(agent.commands().last(), Some(&ActuationCommand::ClearControls));
    }
}
