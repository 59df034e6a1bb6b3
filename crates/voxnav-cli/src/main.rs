//! `voxnav-cli` – voxnav Command Line Interface
//!
//! This binary drives one simulated agent through a voxel scene.  It:
//!
//! 1. Checks for `~/.voxnav/config.toml`; runs a **First-Run Wizard** when the
//!    file is absent.
//! 2. Builds the simulated world from the configured scene and spawns the
//!    agent.
//! 3. Drops the user into an **interactive REPL** (`navigate`, `observe`,
//!    `ground`, `where`, `schema`, `help`).
//! 4. Intercepts **Ctrl-C**: a running traversal is cancelled and its
//!    controls released; at the prompt the CLI exits.

mod config;
mod repl;

use colored::Colorize;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{info, warn};

use voxnav_hal::sim::{SimAgent, SimWorld};
use voxnav_runtime::{ActuationAuthority, Navigator, ProcessPlanner};

fn main() {
    // ── Structured logging ────────────────────────────────────────────────
    // RUST_LOG filters (default "info"); VOXNAV_LOG_FORMAT=json switches to
    // JSON lines.  The REPL's own output still uses println!.
    let _tracing = voxnav_runtime::init_tracing("voxnav");

    print_banner();

    // ── Shared shutdown flag ──────────────────────────────────────────────
    let shutdown = Arc::new(AtomicBool::new(false));
    let shutdown_clone = shutdown.clone();

    // ── Ctrl-C handler ────────────────────────────────────────────────────
    let authority = ActuationAuthority::new();
    let authority_ctrlc = authority.clone();

    if let Err(e) = ctrlc::set_handler(move || {
        println!();
        if authority_ctrlc.cancel_active() {
            println!("{}", "⚠  Ctrl-C received – cancelling traversal …".yellow().bold());
            return;
        }
        println!("{}", "⚠  Ctrl-C received – exiting voxnav.".yellow().bold());
        shutdown_clone.store(true, Ordering::SeqCst);
        // The REPL is parked in a blocking stdin read.
        std::process::exit(0);
    }) {
        warn!(error = %e, "Failed to install Ctrl-C handler; traversals cannot be cancelled with Ctrl-C");
    }

    // ── First-Run Wizard ──────────────────────────────────────────────────
    let cfg = match config::load() {
        Ok(Some(cfg)) => {
            println!(
                "  Config loaded from {}",
                config::config_path().display().to_string().bold()
            );
            cfg
        }
        Ok(None) => run_first_run_wizard(),
        Err(e) => {
            println!("{}: {}", "Config error".red(), e);
            println!("  Using default configuration.");
            let mut cfg = config::Config::default();
            config::apply_env_overrides(&mut cfg);
            cfg
        }
    };

    // ── Scene ─────────────────────────────────────────────────────────────
    let scene = match cfg.scene() {
        Ok(scene) => scene,
        Err(e) => {
            println!("{}: {}", "Scene error".red(), e);
            println!("  Using the default platform.");
            Default::default()
        }
    };
    let world = Arc::new(SimWorld::from_scene(&scene));
    let agent = SimAgent::new("agent", scene.spawn_point()).with_terrain(Arc::clone(&world));
    info!(
        solid = world.solid_count(),
        spawn = %scene.spawn_point(),
        "scene loaded"
    );

    // ── Planner + navigator ───────────────────────────────────────────────
    let planner_cfg = cfg.planner_config();
    println!(
        "  Planner: {} {}",
        planner_cfg.program.bold(),
        planner_cfg.args.join(" ").dimmed()
    );
    let planner = ProcessPlanner::new(planner_cfg);
    let mut nav = Navigator::new(world, agent, Box::new(planner), cfg.navigator_config())
        .with_authority(authority);

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("{}: {}", "Failed to start async runtime".red(), e);
            std::process::exit(1);
        }
    };

    println!();
    println!("  Type {} for a list of commands.\n", "help".bold().cyan());

    // ── Interactive REPL ──────────────────────────────────────────────────
    repl::run(shutdown, &runtime, &mut nav);
}

// ─────────────────────────────────────────────────────────────────────────────
// First-Run Wizard
// ─────────────────────────────────────────────────────────────────────────────

fn run_first_run_wizard() -> config::Config {
    println!();
    println!("{}", "  ╔══════════════════════════════════════╗".bold().cyan());
    println!("{}", "  ║       voxnav First-Run Wizard        ║".bold().cyan());
    println!("{}", "  ╚══════════════════════════════════════╝".bold().cyan());
    println!();
    println!("  No configuration found.  Let's set up voxnav.\n");

    let mut cfg = config::Config::default();

    // Planner
    let command_line = format!("{} {}", cfg.planner_command, cfg.planner_args.join(" "));
    let answer = prompt_line(
        &format!("  Planner command [{}]: ", command_line.trim()),
        command_line.trim(),
    );
    let mut words = answer.split_whitespace().map(str::to_string);
    if let Some(program) = words.next() {
        cfg.planner_command = program;
        cfg.planner_args = words.collect();
    }

    // Sampling radius
    let radius = prompt_line(
        &format!("  Chunk radius to sample [{}]: ", cfg.chunk_radius),
        &cfg.chunk_radius.to_string(),
    );
    if let Ok(r) = radius.trim().parse::<u32>() {
        cfg.chunk_radius = r;
    }

    // Waypoint timeout
    let secs = prompt_line(
        &format!("  Seconds per waypoint [{}]: ", cfg.waypoint_timeout_secs),
        &cfg.waypoint_timeout_secs.to_string(),
    );
    if let Ok(s) = secs.trim().parse::<u64>() {
        cfg.waypoint_timeout_secs = s;
    }

    // Scene
    let scene = prompt_line("  Scene file (empty for the default platform): ", "");
    if !scene.is_empty() {
        cfg.scene_path = Some(scene);
    }

    match config::save(&cfg) {
        Ok(()) => println!(
            "\n  {} Config saved to {}\n",
            "✓".green().bold(),
            config::config_path().display().to_string().bold()
        ),
        Err(e) => println!("{}: {}", "Error saving config".red(), e),
    }

    config::apply_env_overrides(&mut cfg);
    cfg
}

// ─────────────────────────────────────────────────────────────────────────────
// Banner
// ─────────────────────────────────────────────────────────────────────────────

fn print_banner() {
    println!();
    println!("{}", r#" _   ______  __ _  ___ __   __"#.bold().cyan());
    println!("{}", r#"| | / / __ \/ /| |/ / |/ /  / /"#.bold().cyan());
    println!("{}", r#"| |/ / /_/ /   |   /    /  / / "#.bold().cyan());
    println!("{}", r#"|___/\____/_/|_/_/|_/_/|_/ /_/  "#.bold().cyan());
    println!();
    println!("  {} {}",
        "voxnav".bold(),
        format!("v{}", env!("CARGO_PKG_VERSION")).dimmed()
    );
    println!("  Voxel-world navigation agent");
    println!();
}

// ─────────────────────────────────────────────────────────────────────────────
// Helpers
// ─────────────────────────────────────────────────────────────────────────────

fn prompt_line(msg: &str, default: &str) -> String {
    use std::io::{BufRead, Write};
    print!("{}", msg);
    std::io::stdout().flush().ok();
    let mut line = String::new();
    match std::io::stdin().lock().read_line(&mut line) {
        Ok(_) => {
            let t = line.trim().to_string();
            if t.is_empty() { default.to_string() } else { t }
        }
        Err(_) => default.to_string(),
    }
}
