//! `espeleo-plan` – command line front end for the mesh planner.
//!
//! 1. Loads `~/.espeleo/config.toml` (or `--config`), falling back to the
//!    built-in defaults.
//! 2. Reads the STL terrain mesh and snaps the start and goal points to it.
//! 3. Plans one route per metric, sequentially or on the blocking pool with
//!    `--concurrent`.
//! 4. Prints a route summary, optional statistics tables and the frontier
//!    clusters, and writes the JSON report with `--output`.
//!
//! Ctrl-C cancels the running searches.

mod cli;
mod config;

use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use clap::Parser;
use colored::Colorize;
use serde::Serialize;
use tracing::{info, warn};

use espeleo_planner::{FrontierCluster, MeshPlanner, PathStatistics, PlanOutcome};
use espeleo_types::PlanReport;

use crate::cli::Args;

/// Everything `--output` writes.
#[derive(Serialize)]
struct ReportDocument<'a> {
    #[serde(flatten)]
    report: &'a PlanReport,
    statistics: &'a [PathStatistics],
    clusters: &'a [FrontierCluster],
}

fn main() -> ExitCode {
    let args = Args::parse();
    let _guard = espeleo_planner::init_tracing("espeleo-plan");

    print_banner();

    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{}: {}", "Error".red().bold(), e);
            ExitCode::FAILURE
        }
    }
}

fn run(args: Args) -> Result<(), String> {
    let config_path = args.config.clone().unwrap_or_else(config::config_path);

    if args.init_config {
        config::save_to(&config::Config::default(), &config_path)?;
        println!(
            "  {} Config saved to {}",
            "✓".green().bold(),
            config_path.display().to_string().bold()
        );
        return Ok(());
    }

    let cfg = config::load_or_default(&config_path)?;
    if config_path.exists() {
        println!(
            "  Config loaded from {}",
            config_path.display().to_string().bold()
        );
    } else {
        println!("  {}", "No config file found; using defaults.".dimmed());
    }

    // clap requires all three unless `--init-config` is given.
    let (Some(mesh_path), Some(source), Some(target)) =
        (args.mesh.as_deref(), args.source, args.target)
    else {
        return Err("--mesh, --source and --target are required".to_string());
    };

    // ── Shared cancel flag ────────────────────────────────────────────────
    let cancel = Arc::new(AtomicBool::new(false));
    let cancel_clone = Arc::clone(&cancel);
    if let Err(e) = ctrlc::set_handler(move || {
        println!();
        println!("{}", "⚠  Ctrl-C received – cancelling planning …".yellow().bold());
        cancel_clone.store(true, Ordering::SeqCst);
    }) {
        warn!(error = %e, "failed to install ctrl-c handler; planning cannot be cancelled");
    }

    let mesh = espeleo_mesh::load_stl(mesh_path).map_err(|e| e.to_string())?;
    println!(
        "  Mesh {} ({} vertices, {} triangles)",
        mesh_path.display().to_string().bold(),
        mesh.vertex_count(),
        mesh.triangle_count()
    );

    let metrics = if args.metrics.is_empty() {
        cfg.default_metrics.clone()
    } else {
        args.metrics.clone()
    };
    let planner = MeshPlanner::new(Arc::new(mesh), metrics, cfg.planner.clone())
        .map_err(|e| e.to_string())?
        .with_label(mesh_path.display().to_string())
        .with_cancel_flag(cancel);

    let source_node = planner.snap(source).map_err(|e| e.to_string())?;
    let target_node = planner.snap(target).map_err(|e| e.to_string())?;
    info!(source_node, target_node, "endpoints snapped to mesh");

    let outcome = if args.concurrent || cfg.concurrent {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .build()
            .map_err(|e| format!("Failed to start runtime: {}", e))?;
        runtime.block_on(Arc::new(planner).run_concurrent(source_node, target_node))
    } else {
        planner.run(source_node, target_node)
    }
    .map_err(|e| e.to_string())?;

    print_outcome(&outcome, args.show_stats);

    if let Some(path) = args.output.as_deref() {
        write_report(&outcome, path)?;
        println!(
            "\n  {} Report written to {}",
            "✓".green().bold(),
            path.display().to_string().bold()
        );
    }
    Ok(())
}

// ─────────────────────────────────────────────────────────────────────────────
// Output
// ─────────────────────────────────────────────────────────────────────────────

fn print_outcome(outcome: &PlanOutcome, show_stats: bool) {
    let report = &outcome.report;
    println!();
    println!(
        "  Plan {} from node {} to node {}",
        report.id.to_string().dimmed(),
        report.source_node.to_string().bold(),
        report.target_node.to_string().bold()
    );
    for route in &report.routes {
        println!(
            "    {} {:<30} cost {:>10.3}  {:>4} hops  {:.3}s",
            "•".green(),
            route.metric.name().bold(),
            route.cost,
            route.node_path.len().saturating_sub(1),
            route.elapsed_secs
        );
    }
    for metric in &report.failed {
        println!("    {} {:<30} {}", "✗".red(), metric.name().bold(), "no route".red());
    }

    if show_stats {
        for stats in &outcome.statistics {
            println!();
            print!("{}", stats.render_table());
        }
    }

    if !outcome.clusters.is_empty() {
        println!();
        println!("  Frontier clusters:");
        for (i, c) in outcome.clusters.iter().enumerate() {
            let [x, y, z] = c.centroid;
            println!(
                "    {:>2}. visit node {:<8} centroid ({:.2}, {:.2}, {:.2})  {} members",
                i + 1,
                c.visit_node,
                x,
                y,
                z,
                c.members.len()
            );
        }
    }
}

fn write_report(outcome: &PlanOutcome, path: &Path) -> Result<(), String> {
    let doc = ReportDocument {
        report: &outcome.report,
        statistics: &outcome.statistics,
        clusters: &outcome.clusters,
    };
    let json = serde_json::to_string_pretty(&doc)
        .map_err(|e| format!("Failed to serialize report: {}", e))?;
    std::fs::write(path, json)
        .map_err(|e| format!("Failed to write report at {}: {}", path.display(), e))
}

// ─────────────────────────────────────────────────────────────────────────────
// Banner
// ─────────────────────────────────────────────────────────────────────────────

fn print_banner() {
    println!();
    println!("{}", r#"   ____                 __"#.bold().cyan());
    println!("{}", r#"  / __/__ ___  ___ ___ / /__ ___"#.bold().cyan());
    println!("{}", r#" / _/(_-</ _ \/ -_) -_) / -_) _ \"#.bold().cyan());
    println!("{}", r#"/___/___/ .__/\__/\__/_/\__/\___/"#.bold().cyan());
    println!("{}", r#"       /_/"#.bold().cyan());
    println!();
    println!(
        "  {} {}",
        "Espeleo Planner".bold(),
        format!("v{}", env!("CARGO_PKG_VERSION")).dimmed()
    );
    println!("  Mesh-based path planning for ground robots");
    println!();
}
