//! REPL – Read-Eval-Print Loop for the voxnav interactive shell.
//!
//! Supported commands (the leading `/` is optional):
//!   navigate <x> <y> <z> – plan and walk to the ground block nearest the goal
//!   observe              – sample around the agent and summarise the graph
//!   ground               – print the scan region and every ground block
//!   where                – agent position and heading
//!   schema               – JSON Schemas of the planner documents
//!   help                 – show this list
//!   quit | exit          – leave the CLI

use colored::Colorize;
use std::io::{self, BufRead, Write};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::runtime::Runtime;
use tracing::{error, warn};
use voxnav_hal::Actuator;
use voxnav_hal::sim::{SimAgent, SimWorld};
use voxnav_perception::Observation;
use voxnav_runtime::Navigator;
use voxnav_runtime::planner::{request_schema, response_schema};
use voxnav_types::{NavError, Vec3};

pub type SimNavigator = Navigator<Arc<SimWorld>, SimAgent>;

/// One parsed input line.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Navigate(Vec3),
    Observe,
    Ground,
    Where,
    Schema,
    Help,
    Quit,
    Empty,
}

impl Command {
    /// Parse one line of input.  The error is a user-facing message.
    pub fn parse(line: &str) -> Result<Self, String> {
        let mut words = line.split_whitespace();
        let Some(head) = words.next() else {
            return Ok(Command::Empty);
        };
        let args: Vec<&str> = words.collect();
        let name = head.strip_prefix('/').unwrap_or(head);

        let command = match name {
            "navigate" | "goto" => return parse_goal(&args).map(Command::Navigate),
            "observe" => Command::Observe,
            "ground" => Command::Ground,
            "where" => Command::Where,
            "schema" => Command::Schema,
            "help" => Command::Help,
            "quit" | "exit" => Command::Quit,
            _ => return Err(format!("Unknown command: '{}'", head)),
        };
        if !args.is_empty() {
            return Err(format!("'{}' takes no arguments", name));
        }
        Ok(command)
    }
}

fn parse_goal(args: &[&str]) -> Result<Vec3, String> {
    let &[x, y, z] = args else {
        return Err("usage: navigate <x> <y> <z>".to_string());
    };
    let coord = |s: &str| {
        s.parse::<f64>()
            .ok()
            .filter(|v| v.is_finite())
            .ok_or_else(|| format!("'{}' is not a number", s))
    };
    Ok(Vec3::new(coord(x)?, coord(y)?, coord(z)?))
}

/// Entry point for the interactive REPL.
///
/// `shutdown` is polled each iteration; when set the REPL exits cleanly.
/// Navigation blocks the prompt on `runtime` until the route finishes or
/// the traversal is cancelled.
pub fn run(shutdown: Arc<AtomicBool>, runtime: &Runtime, nav: &mut SimNavigator) {
    let stdin = io::stdin();
    let mut stdout = io::stdout();

    loop {
        if shutdown.load(Ordering::SeqCst) {
            break;
        }

        print!("{} ", "voxnav>".bold().cyan());
        stdout.flush().ok();

        let mut line = String::new();
        match stdin.lock().read_line(&mut line) {
            Ok(0) => break, // EOF
            Ok(_) => {}
            Err(e) => {
                eprintln!("{}: {}", "Read error".red(), e);
                break;
            }
        }

        match Command::parse(&line) {
            Ok(Command::Empty) => {}
            Ok(Command::Navigate(goal)) => cmd_navigate(runtime, nav, goal),
            Ok(Command::Observe) => cmd_observe(nav),
            Ok(Command::Ground) => cmd_ground(nav),
            Ok(Command::Where) => cmd_where(nav),
            Ok(Command::Schema) => cmd_schema(),
            Ok(Command::Help) => cmd_help(),
            Ok(Command::Quit) => {
                println!("{}", "Goodbye.".green());
                shutdown.store(true, Ordering::SeqCst);
                break;
            }
            Err(msg) => {
                println!(
                    "{} Type {} for available commands.",
                    msg.red(),
                    "help".bold()
                );
            }
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Command handlers
// ─────────────────────────────────────────────────────────────────────────────

fn cmd_help() {
    println!();
    println!("{}", "voxnav Commands".bold().underline());
    println!("  {}  – walk to the ground block nearest the goal", "navigate <x> <y> <z>".bold().cyan());
    println!("  {}               – sample the area and build the graph", "observe".bold().cyan());
    println!("  {}                – list every ground block in the scan", "ground".bold().cyan());
    println!("  {}                 – agent position and heading", "where".bold().cyan());
    println!("  {}                – planner input/output JSON Schemas", "schema".bold().cyan());
    println!("  {}           – exit the CLI", "quit  exit".bold().cyan());
    println!();
    println!("  Ctrl-C during navigation cancels the route; Ctrl-C at the prompt exits.");
    println!();
}

fn cmd_navigate(runtime: &Runtime, nav: &mut SimNavigator, goal: Vec3) {
    println!("  Navigating to {} …", goal.to_string().bold());
    match runtime.block_on(nav.navigate(goal)) {
        Ok(report) if report.is_complete() => {
            println!("  {} {}", "✓".green().bold(), report);
        }
        Ok(report) if report.cancelled => {
            println!("  {} {}", "■".yellow().bold(), report.to_string().yellow());
        }
        Ok(report) => {
            println!("  {} {}", "!".yellow().bold(), report);
        }
        Err(e) => {
            error!(error = %e, %goal, "navigation failed");
            println!("  {}: {}", failure_label(&e).red(), e);
        }
    }
}

fn failure_label(err: &NavError) -> &'static str {
    match err {
        NavError::NoWalkableNodeNear { .. } => "Cannot resolve position",
        NavError::ActuationBusy { .. } => "Agent busy",
        NavError::PlannerSpawnFailure { .. }
        | NavError::PlannerAbnormalExit { .. }
        | NavError::PlannerMalformedOutput(_)
        | NavError::PlannerReportedError(_)
        | NavError::PlannerTimeout { .. } => "Planning failed",
        _ => "Navigation failed",
    }
}

fn report_gaps(obs: &Observation) {
    if obs.missing_voxels > 0 {
        let err = NavError::SamplingIncomplete {
            missing_voxels: obs.missing_voxels,
        };
        warn!(error = %err, "observation has gaps");
        println!("  {} {}", "!".yellow().bold(), err.to_string().yellow());
    }
}

fn cmd_observe(nav: &SimNavigator) {
    let obs = nav.observe(None);
    println!("  Observation {}", obs.id.to_string().dimmed());
    println!("  Region       : {}", obs.region);
    println!("  Ground blocks: {}", obs.ground_blocks.len().to_string().bold());
    println!("  Graph        : {} nodes, {} edges",
        obs.graph.node_count().to_string().bold(),
        obs.graph.edge_count().to_string().bold()
    );
    report_gaps(&obs);
}

fn cmd_ground(nav: &SimNavigator) {
    let obs = nav.observe(None);
    println!("{}", "Ground map".bold().underline());
    println!("  Region: {}", obs.region);
    for block in &obs.ground_blocks {
        let walkable = if obs.graph.contains(block.coord) {
            "walkable".green()
        } else {
            "blocked".red()
        };
        println!("  {:>16}  {} ({})", block.coord.to_string(), block.kind, walkable);
    }
    println!("  {} ground block(s)", obs.ground_blocks.len());
    report_gaps(&obs);
}

fn cmd_where(nav: &SimNavigator) {
    let agent = nav.actuator();
    let position = agent.position();
    println!("  Agent   : {}", agent.id().bold());
    println!("  Position: {}", position);
    println!("  Standing: {}", position.offset(0.0, -0.5, 0.0).floor());
    println!("  Yaw     : {:.1}°", agent.yaw().to_degrees());
    if let Some(holder) = nav.authority().holder() {
        println!("  Busy    : {}", holder.yellow());
    }
}

fn cmd_schema() {
    for (title, schema) in [("Planner request", request_schema()), ("Planner response", response_schema())] {
        println!("{}", title.bold().underline());
        match serde_json::to_string_pretty(&schema) {
            Ok(json) => println!("{}", json),
            Err(e) => println!("{}: {}", "Schema error".red(), e),
        }
        println!();
    }
}
