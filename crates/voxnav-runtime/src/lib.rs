//! `voxnav-runtime` – planning and execution.
//!
//! Where a navigate request actually happens: the observation goes out to a
//! planner, waypoints come back, and a fixed-rate control loop drives the
//! agent through them.
//!
//! # Modules
//!
//! - [`control_loop`] – [`traverse_to_waypoint`][control_loop::traverse_to_waypoint]:
//!   the 20 Hz APPROACHING → ARRIVED / TIMED_OUT state machine, with
//!   [`move_toward`][control_loop::move_toward] as its single-tick decision.
//! - [`planner`] – [`Planner`][planner::Planner] and
//!   [`ProcessPlanner`][planner::ProcessPlanner]: hands the observation to an
//!   external process over stdin/stdout and maps every process-level failure
//!   onto a typed [`NavError`][voxnav_types::NavError].
//! - [`navigator`] – [`Navigator`][navigator::Navigator]: sample → resolve →
//!   plan → execute, under one [`ActuationToken`][voxnav_kernel::ActuationToken].
//! - [`telemetry`] – [`init_tracing`][telemetry::init_tracing]:
//!   initialises the global `tracing` subscriber with an optional OTLP span
//!   exporter.  Set `OTEL_EXPORTER_OTLP_ENDPOINT` to enable live trace export
//!   to Jaeger, Grafana Tempo, or any OTLP-compatible collector.

pub mod control_loop;
pub mod navigator;
pub mod planner;
pub mod telemetry;

pub use control_loop::{ControlConfig, ControlLoopState, TraversalState, traverse_to_waypoint};
pub use navigator::{NavigationReport, Navigator, NavigatorConfig, WaypointAnchor};
pub use planner::{Planner, PlannerRequest, PlannerResponse, ProcessPlanner, ProcessPlannerConfig};
pub use telemetry::{TracerProviderGuard, init_tracing};

// Re-exported so binaries can cancel traversals without a direct
// voxnav-kernel dependency.
pub use voxnav_kernel::ActuationAuthority;
