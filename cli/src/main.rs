use std::{
    fs::File,
    io::{BufWriter, Read},
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use clap::Parser;
use csim_core::{common::SimulationOption, config::CacheConfig, sim::Simulator};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
/// Replay a memory trace against a set-associative LRU cache
struct Cli {
    /// Number of set index bits (2^s sets)
    #[arg(short = 's', value_name = "NUM")]
    set_index_bits: u32,
    /// Number of lines per set
    #[arg(short = 'E', value_name = "NUM")]
    associativity: usize,
    /// Number of block offset bits (2^b-byte blocks)
    #[arg(short = 'b', value_name = "NUM")]
    block_offset_bits: u32,
    /// File path to the memory trace
    #[arg(short = 't', value_name = "FILE")]
    trace: PathBuf,
    /// Verbose output, tracing every record
    #[arg(short, long)]
    verbose: bool,
    /// File path to write the final report as JSON
    #[arg(long, value_name = "FILE")]
    json: Option<PathBuf>,
}

fn main() -> Result<()> {
    let args = Cli::parse();
    if args.verbose {
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    } else {
        env_logger::init();
    }
    let mut sim = build_simulator(&args)?;
    let trace = read_trace(&args.trace)?;

    let option = SimulationOption {
        do_trace: args.verbose,
    };
    let consumed = sim.run_trace(&trace, &option);
    log::info!("finished simulation. {consumed} records processed.");
    output_stat(&sim);

    if let Some(path) = args.json {
        write_report(&sim, &path)?;
    }
    println!("{}", sim.into_counters());
    Ok(())
}

fn build_simulator(args: &Cli) -> Result<Simulator> {
    let config = CacheConfig::new(
        args.set_index_bits,
        args.associativity,
        args.block_offset_bits,
    )
    .context("invalid cache configuration")?;
    let sim = Simulator::new(config).context("invalid cache configuration")?;
    log::info!("simulating {config}");
    Ok(sim)
}

#[cfg(not(feature = "stat"))]
fn output_stat(_: &Simulator) {}

#[cfg(feature = "stat")]
fn output_stat(sim: &Simulator) {
    log::info!("statistics:\n{}", sim.collect_stat().view());
}

fn read_trace(path: &Path) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    let mut file =
        File::open(path).with_context(|| format!("failed to open trace file {}", path.display()))?;
    file.read_to_end(&mut buf)
        .with_context(|| format!("failed to read trace file {}", path.display()))?;
    Ok(buf)
}

fn write_report(sim: &Simulator, path: &Path) -> Result<()> {
    let file =
        File::create(path).with_context(|| format!("failed to create {}", path.display()))?;
    sim.report().ser(BufWriter::new(file))?;
    log::info!("report written to {}.", path.display());
    Ok(())
}
