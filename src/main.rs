//! stack-stitcher - Split, stitch and reassemble multi-tile TIFF stacks.
//!
//! This binary parses the command line and runs one subcommand.

use clap::Parser;
use std::process::ExitCode;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use stack_stitcher::{
    config::{default_stitch_params, CheckConfig, Cli, Command, RunConfig, SplitConfig},
    pipeline::{Pipeline, PipelineOptions, StackInfo},
};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    match cli.into_command() {
        Command::Run(config) => run_pipeline(config).await,
        Command::Split(config) => run_split(config).await,
        Command::Check(config) => run_check(config).await,
    }
}

// =============================================================================
// Run Command
// =============================================================================

async fn run_pipeline(config: RunConfig) -> ExitCode {
    init_logging(config.project.verbose);

    if let Err(e) = config.validate() {
        error!("Configuration error: {}", e);
        return ExitCode::FAILURE;
    }

    let options = match config.pipeline_options() {
        Ok(options) => options,
        Err(e) => {
            error!("Configuration error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    info!("Configuration:");
    info!("  Root: {}", options.layout.root().display());
    info!("  Tiles: {}", options.tiles.join(", "));
    info!(
        "  Grid: {}x{} {:?}, {:?}, overlap {}%",
        options.stitch.grid.columns,
        options.stitch.grid.rows,
        options.stitch.grid.grid_type,
        options.stitch.grid.order,
        options.stitch.overlap_percent
    );
    info!("  Fusion: {:?}", options.stitch.fusion);
    if options.stitch.compute_overlap {
        info!(
            "  Registration: r >= {:.2}, max/avg {:.2}, absolute {:.2}px",
            options.stitch.optimize.regression_threshold,
            options.stitch.optimize.max_avg_displacement,
            options.stitch.optimize.absolute_displacement
        );
    } else {
        warn!("  Registration: DISABLED - tiles placed at grid positions");
    }
    if let Some(max) = options.max_slices {
        info!("  Max slices: {}", max);
    }

    let pipeline = Pipeline::new(options);
    match pipeline.run().await {
        Ok(report) => {
            info!("Final stack: {}", report.final_stack);
            for line in report.timings.summary_lines() {
                println!("{}", line);
            }
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("Run failed: {}", e);
            ExitCode::FAILURE
        }
    }
}

// =============================================================================
// Split Command
// =============================================================================

async fn run_split(config: SplitConfig) -> ExitCode {
    init_logging(config.project.verbose);

    if let Err(e) = config.validate() {
        error!("Configuration error: {}", e);
        return ExitCode::FAILURE;
    }

    let pipeline = match project_pipeline(&config.project, config.max_slices) {
        Some(pipeline) => pipeline,
        None => return ExitCode::FAILURE,
    };

    match pipeline.split().await {
        Ok(summary) => {
            info!(
                "Split {} stack(s): {} of {} slice(s) into {}",
                summary.stacks.len(),
                summary.slices,
                summary.depth,
                pipeline.layout().split_dir().display()
            );
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("Split failed: {}", e);
            ExitCode::FAILURE
        }
    }
}

// =============================================================================
// Check Command
// =============================================================================

async fn run_check(config: CheckConfig) -> ExitCode {
    init_logging(config.project.verbose);

    if let Err(e) = config.validate() {
        eprintln!("Error: {}", e);
        return ExitCode::FAILURE;
    }

    let pipeline = match project_pipeline(&config.project, None) {
        Some(pipeline) => pipeline,
        None => return ExitCode::FAILURE,
    };

    if !config.json {
        println!("stack-stitcher Configuration Check");
        println!("═════════════════════════════════");
        println!();
        println!("Input: {}", pipeline.layout().input_dir().display());
        println!();
    }

    let stacks = match pipeline.inspect().await {
        Ok(stacks) => stacks,
        Err(e) => {
            if config.json {
                let json = serde_json::json!({ "ok": false, "error": e.to_string() });
                print_json(&json);
            } else {
                println!("✗ {}", e);
            }
            return ExitCode::FAILURE;
        }
    };

    if config.json {
        let json = serde_json::json!({ "ok": true, "stacks": stacks });
        print_json(&json);
        return ExitCode::SUCCESS;
    }

    for stack in &stacks {
        print_stack(stack);
    }
    println!();
    println!("═════════════════════════════════");
    println!("✓ All checks passed!");

    ExitCode::SUCCESS
}

fn print_stack(stack: &StackInfo) {
    println!(
        "  {}: {} slice(s), {}x{}, {}",
        stack.file,
        stack.depth,
        stack.width,
        stack.height,
        stack.pixel_type.name()
    );
}

fn print_json(value: &serde_json::Value) {
    match serde_json::to_string_pretty(value) {
        Ok(text) => println!("{}", text),
        Err(e) => eprintln!("Error: {}", e),
    }
}

/// Pipeline over a project with default stitching parameters.
fn project_pipeline(
    project: &stack_stitcher::config::ProjectArgs,
    max_slices: Option<usize>,
) -> Option<Pipeline> {
    let stitch = match default_stitch_params() {
        Ok(stitch) => stitch,
        Err(e) => {
            error!("Configuration error: {}", e);
            return None;
        }
    };
    let mut options = PipelineOptions::new(project.layout(), project.tiles.clone(), stitch);
    options.max_slices = max_slices;
    options.block_size = project.block_size;
    options.cache_blocks = project.cache_blocks;
    Some(Pipeline::new(options))
}

/// Initialize the tracing/logging subsystem.
fn init_logging(verbose: bool) {
    let env_filter = if verbose {
        "stack_stitcher=debug"
    } else {
        "stack_stitcher=info"
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| env_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}
