use noisepath::observer::PathfinderAdapter;
use noisepath::prelude::*;
use tracing::{error, info};

fn main() {
    tracing_subscriber::fmt::init();

    let args: Vec<String> = std::env::args().collect();
    if args.len() >= 2 && (args[1] == "--help" || args[1] == "-h" || args[1] == "help") {
        print_help();
        return;
    }

    let mut seed: u64 = 100;
    let mut size: usize = 40;
    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--seed" if i + 1 < args.len() => {
                seed = parse_or_exit(&args[i + 1], "--seed");
                i += 2;
            }
            "--size" if i + 1 < args.len() => {
                size = parse_or_exit(&args[i + 1], "--size");
                i += 2;
            }
            other => {
                eprintln!("Unknown argument: {other}");
                print_help();
                std::process::exit(2);
            }
        }
    }

    if let Err(e) = run_demo(seed, size) {
        error!("demo failed: {e}");
        std::process::exit(1);
    }
}

fn parse_or_exit<T: std::str::FromStr>(value: &str, flag: &str) -> T {
    match value.parse() {
        Ok(v) => v,
        Err(_) => {
            eprintln!("Invalid value for {flag}: {value}");
            std::process::exit(2);
        }
    }
}

fn print_help() {
    println!("noisepath (noise tile map + q-learning pathfinding demo)");
    println!("usage:");
    println!("  cargo run");
    println!("  cargo run -- --seed 7 --size 32");
    println!("  cargo run -- --help");
}

fn run_demo(seed: u64, size: usize) -> Result<(), Box<dyn std::error::Error>> {
    let last = size.saturating_sub(1) as i32;
    let config = RunConfig {
        map: MapConfig::new(size, size),
        ..RunConfig::default()
    }
    .with_master_seed(seed)
    .with_endpoints(Cell::new(0, 0), Cell::new(last, last));

    let mut session = Session::configure(config)?;
    let map = session.generate()?;
    println!("tile types:\n{}", map.render_tile_types());
    println!("rewards:\n{}", map.render_rewards());

    let c = session.config().clone();
    let mut finder = session.pathfinder(c.start, c.goal, &c.pathfinder)?;
    finder.train();
    let snapshot = PathfinderAdapter::new(&finder).snapshot();
    info!(
        episodes = snapshot.stats.episodes,
        goal_rate = snapshot.stats.goal_rate(),
        min_q = snapshot.min_q,
        max_q = snapshot.max_q,
        "training done"
    );
    let outcome = finder.extract_path();

    println!("path ({} cells):", outcome.path.len());
    println!("{}", overlay(session.tile_types()?, &outcome.path));
    for step in &outcome.path {
        println!("Step: {step}");
    }
    if outcome.succeeded {
        println!(
            "Pathfinding succeeded after {} attempt(s). Total reward: {:.3}",
            outcome.attempts, outcome.total_reward
        );
    } else {
        println!(
            "Pathfinding failed after {} attempt(s). Total reward of last attempt: {:.3}",
            outcome.attempts, outcome.total_reward
        );
    }

    let walk = session.run_baseline()?;
    println!(
        "Random walk: reached={} steps={} total reward={:.3}",
        walk.reached, walk.steps, walk.total_reward
    );
    Ok(())
}

/// Tile codes as base-36 digits with the path drawn as `*`.
fn overlay(types: &Grid<usize>, path: &[Cell]) -> String {
    let mut rows: Vec<Vec<char>> = types
        .rows()
        .map(|row| {
            row.iter()
                .map(|&t| char::from_digit((t % 36) as u32, 36).unwrap_or('?'))
                .collect()
        })
        .collect();
    for cell in path {
        if let Some(slot) = rows
            .get_mut(cell.row as usize)
            .and_then(|r| r.get_mut(cell.col as usize))
        {
            *slot = '*';
        }
    }
    rows.into_iter()
        .map(|r| r.into_iter().collect::<String>())
        .collect::<Vec<_>>()
        .join("\n")
}
