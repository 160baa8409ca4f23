//! lv-grid-sim entry point: topology checks and contingency alternatives for a grid file.

use std::path::Path;
use std::process;

use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use lv_grid_sim::config::AnalysisConfig;
use lv_grid_sim::grid::{Grid, Id, alternatives_for, downstream_nodes, loads_by_feeder};
use lv_grid_sim::io::export::export_alternatives;
use lv_grid_sim::io::input::{load_grid_json, load_metadata_json};

/// Parsed CLI arguments.
struct CliArgs {
    grid_path: Option<String>,
    meta_path: Option<String>,
    config_path: Option<String>,
    contingency: Vec<Id>,
    alternatives_out: Option<String>,
    log_filter: Option<String>,
}

fn print_help() {
    eprintln!("lv-grid-sim - radial LV grid topology and contingency analysis");
    eprintln!();
    eprintln!("Usage: lv-grid-sim --grid <path> [OPTIONS]");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  --grid <path>              Grid description (JSON, required)");
    eprintln!("  --meta <path>              LV feeder metadata (JSON)");
    eprintln!("  --config <path>            Analysis configuration (TOML)");
    eprintln!("  --contingency <line-id>    Line to open for N-1 analysis (repeatable)");
    eprintln!("  --alternatives-out <path>  Export contingency alternatives to CSV");
    eprintln!("  --log <filter>             Log filter, overrides RUST_LOG and the config");
    eprintln!("  --help                     Show this help message");
    eprintln!();
    eprintln!("Without --contingency, the lines from [contingency] in the config are used.");
}

fn required_value(args: &[String], i: usize, flag: &str, what: &str) -> String {
    match args.get(i) {
        Some(v) => v.clone(),
        None => {
            eprintln!("error: {flag} requires {what}");
            process::exit(1);
        }
    }
}

fn parse_args() -> CliArgs {
    let args: Vec<String> = std::env::args().collect();
    let mut cli = CliArgs {
        grid_path: None,
        meta_path: None,
        config_path: None,
        contingency: Vec::new(),
        alternatives_out: None,
        log_filter: None,
    };

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--help" | "-h" => {
                print_help();
                process::exit(0);
            }
            "--grid" => {
                i += 1;
                cli.grid_path = Some(required_value(&args, i, "--grid", "a path argument"));
            }
            "--meta" => {
                i += 1;
                cli.meta_path = Some(required_value(&args, i, "--meta", "a path argument"));
            }
            "--config" => {
                i += 1;
                cli.config_path = Some(required_value(&args, i, "--config", "a path argument"));
            }
            "--contingency" => {
                i += 1;
                let raw = required_value(&args, i, "--contingency", "a line id");
                if let Ok(id) = raw.parse::<Id>() {
                    cli.contingency.push(id);
                } else {
                    eprintln!("error: --contingency value \"{raw}\" is not a valid line id");
                    process::exit(1);
                }
            }
            "--alternatives-out" => {
                i += 1;
                cli.alternatives_out = Some(required_value(
                    &args,
                    i,
                    "--alternatives-out",
                    "a path argument",
                ));
            }
            "--log" => {
                i += 1;
                cli.log_filter = Some(required_value(&args, i, "--log", "a filter argument"));
            }
            other => {
                eprintln!("error: unknown argument \"{other}\"");
                print_help();
                process::exit(1);
            }
        }
        i += 1;
    }

    cli
}

/// Installs the global subscriber: `--log`, then `RUST_LOG`, then the config.
fn init_logging(cli: &CliArgs, config: &AnalysisConfig) {
    let filter = match &cli.log_filter {
        Some(directive) => EnvFilter::try_new(directive).unwrap_or_else(|e| {
            eprintln!("error: invalid --log filter \"{directive}\": {e}");
            process::exit(1);
        }),
        None => EnvFilter::try_from_default_env()
            .or_else(|_| EnvFilter::try_new(&config.logging.filter))
            .unwrap_or_else(|_| EnvFilter::new("info")),
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn print_topology(grid: &Grid) {
    let open = grid.lines().iter().filter(|l| !l.in_service).count();
    println!("--- Topology ---");
    println!("Nodes:        {}", grid.nodes().len());
    println!(
        "Lines:        {} ({} in service, {} open)",
        grid.lines().len(),
        grid.lines().len() - open,
        open
    );
    println!("Sym loads:    {}", grid.sym_loads().len());
    let t = grid.transformer();
    println!(
        "Transformer:  {} ({} -> {}), tap {} of {:?}",
        t.id,
        t.from_node,
        t.to_node,
        t.tap_pos,
        t.positions_ascending()
    );
    let depth = grid
        .nodes()
        .iter()
        .filter_map(|n| grid.depth_of(n.id))
        .max()
        .unwrap_or(0);
    println!("Max depth:    {depth}");
}

fn main() {
    let cli = parse_args();

    let config = match &cli.config_path {
        Some(path) => match AnalysisConfig::from_toml_file(Path::new(path)) {
            Ok(cfg) => cfg,
            Err(e) => {
                eprintln!("{e}");
                process::exit(1);
            }
        },
        None => AnalysisConfig::default(),
    };

    let errors = config.validate();
    if !errors.is_empty() {
        for e in &errors {
            eprintln!("{e}");
        }
        process::exit(1);
    }

    init_logging(&cli, &config);

    let Some(grid_path) = cli.grid_path.as_deref() else {
        eprintln!("error: --grid is required");
        print_help();
        process::exit(1);
    };

    let input = match load_grid_json(Path::new(grid_path)) {
        Ok(input) => input,
        Err(e) => {
            eprintln!("error: {e}");
            process::exit(1);
        }
    };
    let grid = match Grid::build(input) {
        Ok(grid) => grid,
        Err(e) => {
            eprintln!("error: invalid grid: {e}");
            process::exit(1);
        }
    };
    print_topology(&grid);

    if let Some(path) = cli.meta_path.as_deref() {
        let meta = match load_metadata_json(Path::new(path)) {
            Ok(meta) => meta,
            Err(e) => {
                eprintln!("error: {e}");
                process::exit(1);
            }
        };
        match loads_by_feeder(&grid, &meta) {
            Ok(feeders) => {
                println!("\n--- Feeders (busbar {}) ---", meta.lv_busbar);
                for (feeder, loads) in &feeders {
                    println!("Feeder {feeder}: {} loads {loads:?}", loads.len());
                }
            }
            Err(e) => {
                eprintln!("error: invalid metadata: {e}");
                process::exit(1);
            }
        }
    }

    let lines = if cli.contingency.is_empty() {
        config.contingency.lines.clone()
    } else {
        cli.contingency.clone()
    };

    let mut pairs: Vec<(Id, Vec<Id>)> = Vec::with_capacity(lines.len());
    if !lines.is_empty() {
        println!("\n--- Contingency ---");
    }
    for line in lines {
        let alternatives = match alternatives_for(&grid, line) {
            Ok(alternatives) => alternatives,
            Err(e) => {
                eprintln!("error: line {line}: {e}");
                process::exit(1);
            }
        };
        let downstream = downstream_nodes(&grid, line).unwrap_or_default();
        if alternatives.is_empty() {
            warn!(line, "no alternative restores supply");
            println!(
                "Line {line}: no alternative, {} nodes lose supply {downstream:?}",
                downstream.len()
            );
        } else {
            println!(
                "Line {line}: alternatives {alternatives:?}, downstream nodes {downstream:?}"
            );
        }
        pairs.push((line, alternatives));
    }

    if let Some(path) = cli.alternatives_out.as_deref() {
        if let Err(e) = export_alternatives(&pairs, Path::new(path)) {
            eprintln!("error: failed to write CSV: {e}");
            process::exit(1);
        }
        info!(path, "alternatives written");
    }
}
