//! Generate a photon stream from an emission model and print it as CSV

use clap::{Parser, ValueEnum};
use emission_sources::{
    Direction, EarthLimbConfig, GrbConfig, MicroquasarConfig, PulsarConfig, SourceConfig,
};
use log::{info, warn};
use photon_sampling::NO_MORE_EVENTS;
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Model {
    EarthLimb,
    Grb,
    Pulsar,
    Microquasar,
}

impl Model {
    fn default_config(self) -> SourceConfig {
        match self {
            Model::EarthLimb => SourceConfig::EarthLimb(EarthLimbConfig::default()),
            Model::Grb => SourceConfig::Grb(GrbConfig::default()),
            Model::Pulsar => SourceConfig::Pulsar(PulsarConfig::default()),
            Model::Microquasar => SourceConfig::Microquasar(MicroquasarConfig::default()),
        }
    }
}

#[derive(Parser, Debug)]
#[command(author, version, about = "Generate photons from an emission model")]
struct Args {
    /// JSON source configuration (overrides --model)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Built-in model with default parameters
    #[arg(long, value_enum, default_value_t = Model::EarthLimb)]
    model: Model,

    /// Number of photons to generate
    #[arg(long, default_value_t = 1000)]
    count: usize,

    /// Simulation start time in seconds
    #[arg(long, default_value_t = 0.0)]
    start: f64,

    /// Override the random seed of the configuration
    #[arg(long)]
    seed: Option<u64>,

    /// Write the selected configuration to this file and exit
    #[arg(long)]
    dump_config: Option<PathBuf>,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => {
            info!("Loading source configuration from {}", path.display());
            SourceConfig::load_from_file(path)?
        }
        None => args.model.default_config(),
    };
    if let Some(seed) = args.seed {
        config.set_seed(seed);
    }

    if let Some(path) = &args.dump_config {
        config.save_to_file(path)?;
        info!("Wrote {} configuration to {}", config.model(), path.display());
        return Ok(());
    }

    let mut source = config.build()?;
    info!(
        "Generating {} photons from {} starting at t = {} s",
        args.count,
        source.name(),
        args.start
    );

    println!("time_s,energy_mev,frame,coord1,coord2");

    let mut t = args.start;
    let mut generated = 0usize;
    let mut energy_sum = 0.0;

    while generated < args.count {
        let dt = source.interval(t)?;
        if dt >= NO_MORE_EVENTS {
            warn!("{} exhausted at t = {t} s after {generated} photons", source.name());
            break;
        }
        t += dt;
        let energy = source.energy(t)?;
        let direction = source.dir(energy)?;

        let (frame, c1, c2) = match direction {
            Direction::Local {
                cos_zenith,
                azimuth_rad,
            } => ("local", cos_zenith, azimuth_rad),
            Direction::Galactic { l_deg, b_deg } => ("galactic", l_deg, b_deg),
        };
        println!("{t:.9},{energy:.6},{frame},{c1:.6},{c2:.6}");

        generated += 1;
        energy_sum += energy;
    }

    if generated > 0 {
        let elapsed = t - args.start;
        info!(
            "{generated} photons in {elapsed:.3} s: mean rate {:.4} Hz, mean energy {:.4} MeV",
            generated as f64 / elapsed,
            energy_sum / generated as f64
        );
    }

    Ok(())
}
