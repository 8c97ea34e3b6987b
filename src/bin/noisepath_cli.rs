//! File-driven host for map generation and pathfinding.
//!
//! Examples:
//!   noisepath-cli default-config > run.json
//!   noisepath-cli --config run.json generate
//!   noisepath-cli --config run.json path --out report.json
//!   noisepath-cli --seed 7 compare
//!
//! Without `--config` the built-in defaults are used. Reports are JSON.

use std::path::PathBuf;
use std::process;

use noisepath::observer::{MapAdapter, MapSnapshot, PathfinderAdapter, PathfinderSnapshot};
use noisepath::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{error, info};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
enum Report {
    Map {
        map: MapSnapshot,
    },
    Path {
        outcome: PathOutcome,
        training: PathfinderSnapshot,
    },
    Walk {
        outcome: WalkOutcome,
    },
    Compare {
        qlearning: PathOutcome,
        random_walk: WalkOutcome,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ReportKind {
    Generate,
    Path,
    Walk,
    Compare,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    Report(ReportKind),
    DefaultConfig,
}

struct Options {
    config: Option<PathBuf>,
    seed: Option<u64>,
    out: Option<PathBuf>,
    command: Command,
}

fn usage() -> ! {
    eprintln!("noisepath-cli (tile map generation and pathfinding)");
    eprintln!("Usage: noisepath-cli [--config file.json] [--seed N] [--out file] <command>\n");
    eprintln!("Commands:");
    eprintln!("  generate          Generate the map and print a snapshot");
    eprintln!("  path              Train the q-learning agent and extract a path");
    eprintln!("  walk              Run the random-walk baseline");
    eprintln!("  compare           Run both pathfinders on the same map");
    eprintln!("  default-config    Print the default run config");
    process::exit(1);
}

fn parse_args() -> Options {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let mut config = None;
    let mut seed = None;
    let mut out = None;
    let mut command = None;

    let mut i = 0;
    while i < args.len() {
        let value = args.get(i + 1);
        match (args[i].as_str(), value) {
            ("--config", Some(v)) => {
                config = Some(PathBuf::from(v));
                i += 2;
            }
            ("--seed", Some(v)) => {
                seed = Some(v.parse::<u64>().unwrap_or_else(|_| {
                    eprintln!("--seed must be an unsigned integer");
                    process::exit(1);
                }));
                i += 2;
            }
            ("--out", Some(v)) => {
                out = Some(PathBuf::from(v));
                i += 2;
            }
            ("generate", _) => {
                command = Some(Command::Report(ReportKind::Generate));
                i += 1;
            }
            ("path", _) => {
                command = Some(Command::Report(ReportKind::Path));
                i += 1;
            }
            ("walk", _) => {
                command = Some(Command::Report(ReportKind::Walk));
                i += 1;
            }
            ("compare", _) => {
                command = Some(Command::Report(ReportKind::Compare));
                i += 1;
            }
            ("default-config", _) => {
                command = Some(Command::DefaultConfig);
                i += 1;
            }
            _ => usage(),
        }
    }

    match command {
        Some(command) => Options {
            config,
            seed,
            out,
            command,
        },
        None => usage(),
    }
}

fn load_config(opts: &Options) -> Result<RunConfig, ConfigFileError> {
    let config = match &opts.config {
        Some(path) => {
            info!("Loading config from {:?}", path);
            RunConfig::load_from_file(path)?
        }
        None => RunConfig::default(),
    };
    Ok(match opts.seed {
        Some(seed) => config.with_master_seed(seed),
        None => config,
    })
}

fn build_report(kind: ReportKind, session: &mut Session) -> Result<Report, RunError> {
    let c = session.config().clone();
    session.generate()?;

    Ok(match kind {
        ReportKind::Generate => {
            let map = MapAdapter::new(session.generated()?, &c.map).snapshot();
            Report::Map { map }
        }
        ReportKind::Path => {
            let mut finder = session.pathfinder(c.start, c.goal, &c.pathfinder)?;
            finder.train();
            let training = PathfinderAdapter::new(&finder).snapshot();
            let outcome = finder.extract_path();
            Report::Path { outcome, training }
        }
        ReportKind::Walk => Report::Walk {
            outcome: session.run_baseline()?,
        },
        ReportKind::Compare => Report::Compare {
            qlearning: session.run()?,
            random_walk: session.run_baseline()?,
        },
    })
}

fn write_output(opts: &Options, json: &str) -> std::io::Result<()> {
    match &opts.out {
        Some(path) => {
            std::fs::write(path, json)?;
            info!("Report written to {:?}", path);
            Ok(())
        }
        None => {
            println!("{json}");
            Ok(())
        }
    }
}

fn run(opts: &Options) -> Result<(), Box<dyn std::error::Error>> {
    let json = match opts.command {
        Command::DefaultConfig => serde_json::to_string_pretty(&RunConfig::default())?,
        Command::Report(kind) => {
            let config = load_config(opts)?;
            let mut session = Session::configure(config)?;
            let report = build_report(kind, &mut session)?;
            serde_json::to_string_pretty(&report)?
        }
    };
    write_output(opts, &json)?;
    Ok(())
}

fn main() {
    tracing_subscriber::fmt::init();
    let opts = parse_args();
    if let Err(e) = run(&opts) {
        error!("{e}");
        process::exit(1);
    }
}
