//! Tree Game Solver
//!
//! Builds strategy tables, stores them as checkpoints, and runs whole-table
//! checks and surveys over them.

mod analysis;
mod checkpoint;
mod stats;

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use anyhow::{bail, ensure, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use treegame_core::{StrategyCache, StrategyTable, HARD_MAX_CELLS, HARD_MIN_CELLS, MAX_CELLS};

use crate::analysis::SelfPlayOptions;
use crate::checkpoint::Checkpoint;
use crate::stats::{format_bytes, BuildStats};

/// Tree Game strategy tables: build, verify, export and survey
#[derive(Parser, Debug)]
#[command(name = "solver")]
#[command(version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Build tables for a range of board sizes
    Build {
        #[arg(long, default_value_t = HARD_MIN_CELLS)]
        min: usize,

        #[arg(long, default_value_t = HARD_MAX_CELLS)]
        max: usize,

        /// Directory to write `tree_<n>.tgs` checkpoints into
        #[arg(short, long)]
        out: Option<PathBuf>,
    },

    /// Check stored or freshly built tables
    Verify {
        /// Checkpoint to compare against a fresh build
        #[arg(short, long)]
        checkpoint: Option<PathBuf>,

        #[arg(long, default_value_t = HARD_MIN_CELLS)]
        min: usize,

        #[arg(long, default_value_t = 10)]
        max: usize,
    },

    /// Print a table best-first
    Export {
        /// Board size to build
        #[arg(long, conflicts_with = "checkpoint")]
        cells: Option<usize>,

        /// Checkpoint to read instead of building
        #[arg(short, long)]
        checkpoint: Option<PathBuf>,

        #[arg(short, long, value_enum, default_value_t = ExportFormat::Text)]
        format: ExportFormat,

        /// Output file (stdout if omitted)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Count trivial and playable starting boards per size
    Census {
        #[arg(long, default_value_t = HARD_MIN_CELLS)]
        min: usize,

        #[arg(long, default_value_t = HARD_MAX_CELLS)]
        max: usize,
    },

    /// Let the computer play itself on random boards
    SelfPlay {
        #[arg(long, default_value_t = 6)]
        cells: usize,

        #[arg(short, long, default_value_t = 1000)]
        games: usize,

        /// 10 plays perfectly, 0 plays at random
        #[arg(short, long, default_value_t = 10, allow_hyphen_values = true)]
        difficulty: i32,

        /// Pyromaniac wins on threefold repetition
        #[arg(short, long)]
        repetition: bool,

        #[arg(long, default_value_t = 10_000)]
        max_turns: u64,

        /// Seed for reproducible runs
        #[arg(long)]
        seed: Option<u64>,
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum ExportFormat {
    Text,
    Json,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.command {
        Command::Build { min, max, out } => build(min, max, out.as_deref()),
        Command::Verify {
            checkpoint,
            min,
            max,
        } => verify(checkpoint.as_deref(), min, max),
        Command::Export {
            cells,
            checkpoint,
            format,
            output,
        } => export(cells, checkpoint.as_deref(), format, output.as_deref()),
        Command::Census { min, max } => census(min, max),
        Command::SelfPlay {
            cells,
            games,
            difficulty,
            repetition,
            max_turns,
            seed,
        } => self_play(
            SelfPlayOptions {
                cells,
                games,
                difficulty,
                repetition_win: repetition,
                max_turns,
            },
            seed,
        ),
    }
}

fn check_range(min: usize, max: usize) -> Result<()> {
    ensure!(
        (1..=MAX_CELLS).contains(&min) && (1..=MAX_CELLS).contains(&max),
        "board sizes must be within 1..={}",
        MAX_CELLS
    );
    ensure!(min <= max, "--min {} exceeds --max {}", min, max);
    Ok(())
}

fn checkpoint_path(dir: &Path, cells: usize) -> PathBuf {
    dir.join(format!("tree_{}.tgs", cells))
}

fn build(min: usize, max: usize, out: Option<&Path>) -> Result<()> {
    check_range(min, max)?;
    if let Some(dir) = out {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("creating {}", dir.display()))?;
    }

    println!("Tree Game Solver");
    println!("================");
    println!("Building tables for {}..={} cells\n", min, max);

    let mut stats = BuildStats::new();
    for cells in min..=max {
        let start = Instant::now();
        let table = StrategyTable::build(cells)?;
        stats.record(cells, table.len(), start.elapsed());

        if let Some(dir) = out {
            let path = checkpoint_path(dir, cells);
            let count = Checkpoint::save(&path, &table)
                .with_context(|| format!("saving {}", path.display()))?;
            stats.bytes_written += Checkpoint::estimate_size(cells) as u64;
            info!(path = %path.display(), entries = count, "checkpoint saved");
        }
    }

    println!();
    stats.print_summary();
    Ok(())
}

fn verify(checkpoint: Option<&Path>, min: usize, max: usize) -> Result<()> {
    let tables: Vec<Arc<StrategyTable>> = match checkpoint {
        Some(path) => {
            let start = Instant::now();
            let stored = Checkpoint::load(path)
                .and_then(Checkpoint::into_table)
                .with_context(|| format!("loading {}", path.display()))?;
            println!(
                "Loaded {} entries for {} cells in {:.2}s",
                stored.len(),
                stored.cells(),
                start.elapsed().as_secs_f64()
            );
            let fresh = StrategyTable::build(stored.cells())?;
            ensure!(
                stored == fresh,
                "checkpoint order differs from a fresh build for {} cells",
                stored.cells()
            );
            println!("Checkpoint matches a fresh build");
            vec![Arc::new(stored)]
        }
        None => {
            check_range(min, max)?;
            (min..=max)
                .map(|cells| StrategyTable::build(cells).map(Arc::new))
                .collect::<Result<_, _>>()?
        }
    };

    let mut failed = 0;
    for table in tables {
        let cells = table.cells();
        let start = Instant::now();
        let report = analysis::verify_perfect_play(table)?;
        println!(
            "n={:>2}: {} positions, longest game {} turns, {} failures ({:.2}s)",
            cells,
            report.positions,
            report.longest,
            report.failures.len(),
            start.elapsed().as_secs_f64()
        );
        if !report.passed() {
            failed += 1;
        }
    }

    if failed > 0 {
        bail!("{} table(s) failed perfect-play verification", failed);
    }
    println!("\nPerfect play burns out from every position.");
    Ok(())
}

fn export(
    cells: Option<usize>,
    checkpoint: Option<&Path>,
    format: ExportFormat,
    output: Option<&Path>,
) -> Result<()> {
    let table = match (cells, checkpoint) {
        (_, Some(path)) => Checkpoint::load(path)
            .and_then(Checkpoint::into_table)
            .with_context(|| format!("loading {}", path.display()))?,
        (Some(cells), None) => StrategyTable::build(cells)?,
        (None, None) => bail!("pass --cells or --checkpoint"),
    };
    if table.cells() > 16 {
        warn!(entries = table.len(), "exporting a very large table");
    }

    let listing = analysis::listing(&table)?;
    let mut writer: Box<dyn Write> = match output {
        Some(path) => Box::new(BufWriter::new(
            File::create(path).with_context(|| format!("creating {}", path.display()))?,
        )),
        None => Box::new(BufWriter::new(io::stdout().lock())),
    };

    match format {
        ExportFormat::Json => {
            serde_json::to_writer_pretty(&mut writer, &listing)?;
            writeln!(writer)?;
        }
        ExportFormat::Text => {
            for board in &listing {
                writeln!(
                    writer,
                    "{:>8} {} {}",
                    board.rank,
                    board.notation,
                    if board.trivial { "trivial" } else { "" }
                )?;
            }
        }
    }
    writer.flush()?;
    Ok(())
}

fn census(min: usize, max: usize) -> Result<()> {
    check_range(min, max)?;
    println!(
        "{:>5} {:>10} {:>10} {:>10} {:>10} {:>10}",
        "cells", "boards", "immediate", "burnt", "trivial", "playable"
    );
    for cells in min..=max {
        let census = analysis::census(cells)?;
        println!(
            "{:>5} {:>10} {:>10} {:>10} {:>10} {:>10} ({:.1}% redrawn)",
            census.cells,
            census.boards,
            census.immediate,
            census.nearly_burnt,
            census.trivial,
            census.non_trivial(),
            100.0 * census.trivial_fraction()
        );
    }
    Ok(())
}

fn self_play(options: SelfPlayOptions, seed: Option<u64>) -> Result<()> {
    ensure!(
        (HARD_MIN_CELLS..=MAX_CELLS).contains(&options.cells),
        "--cells must be within {}..={}",
        HARD_MIN_CELLS,
        MAX_CELLS
    );
    let mut rng = match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_os_rng(),
    };

    let cache = StrategyCache::new();
    let start = Instant::now();
    let summary = analysis::self_play(options, &cache, &mut rng)?;

    println!(
        "{} games on {} cells, difficulty {}, repetition {}",
        summary.games,
        options.cells,
        options.difficulty,
        if options.repetition_win { "on" } else { "off" }
    );
    println!("Firefighter wins: {}", summary.suppressor_wins);
    println!("Pyromaniac wins:  {}", summary.igniter_wins);
    println!(
        "Unfinished after {} turns: {}",
        options.max_turns, summary.unfinished
    );
    println!(
        "Average turns: {:.1} (longest {})",
        summary.average_turns(),
        summary.longest
    );
    println!("Time: {:.2}s", start.elapsed().as_secs_f64());
    if let Some(mem) = stats::get_memory_usage() {
        println!("Memory: {}", format_bytes(mem));
    }
    Ok(())
}
