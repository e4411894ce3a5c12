use std::path::PathBuf;
use std::time::Instant;

use anyhow::Result;
use clap::Parser;
use psim::sim::engine::ExecutionMode;
use psim::{Model, ModelConfig};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Model file (JSON)
    model: PathBuf,

    /// Directory receiving results.json and the sensor CSV files
    #[arg(long, short, default_value = "output")]
    output: PathBuf,

    /// Overrides the seed of the model file
    #[arg(long)]
    seed: Option<u64>,

    /// Updates phonons and sensors on all cores
    #[arg(long)]
    parallel: bool,

    /// Report progress every N steps (0 disables)
    #[arg(long, default_value = "100")]
    progress: usize,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let mut config = ModelConfig::from_json_file(&args.model)?;
    if args.seed.is_some() {
        config.seed = args.seed;
    }
    if args.parallel {
        config.execution = ExecutionMode::Parallel;
    }

    let start = Instant::now();
    let model = Model::new(config)?;
    log::info!("Model built in {:.2?}", start.elapsed());

    let run_start = Instant::now();
    let result = model.run_with_progress(args.progress, |p| {
        log::info!(
            "Step {}/{} ({:.3e} s): {} phonons, max dT {:.3e} K",
            p.steps_done,
            p.num_steps,
            p.sim_time_s,
            p.num_phonons,
            p.max_temperature_change
        );
    })?;
    log::info!("Simulation finished in {:.2?}", run_start.elapsed());

    psim::io::write_results(&args.output, &result)?;
    for (id, t) in result.final_temperatures() {
        log::info!("Sensor {id}: {t:.3} K");
    }
    log::info!("Total wall time {:.2?}", start.elapsed());
    Ok(())
}
