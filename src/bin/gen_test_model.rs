use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use stylewave::model::net::random_parameters;
use stylewave::model::params::save_parameter_set;

/// Display names given to generated models, in slot order.
const NAMES: [&str; 10] = [
    "mosaic",
    "candy",
    "rain_princess",
    "udnie",
    "autumn_forest",
    "kuker_ritual",
    "cave_painting",
    "krampus",
    "storm_king",
    "purple_swirl",
];

#[derive(Parser, Debug)]
#[command(
    name = "gen_test_model",
    about = "Write random pointwise-network parameter sets for trying stylewave without trained models"
)]
struct Cli {
    #[arg(long, default_value = "models")]
    out: PathBuf,

    #[arg(long, default_value_t = 4)]
    count: usize,

    #[arg(long, default_value_t = 8)]
    hidden: usize,

    #[arg(long, default_value_t = 0x5717_1E00)]
    seed: u64,
}

fn main() -> Result<()> {
    let args = Cli::parse();
    fs::create_dir_all(&args.out)
        .with_context(|| format!("create dir {}", args.out.display()))?;

    let mut rng = fastrand::Rng::with_seed(args.seed);
    let count = args.count.clamp(1, NAMES.len());
    for (i, name) in NAMES.iter().take(count).enumerate() {
        let params = random_parameters(args.hidden, &mut rng);
        let path = args.out.join(format!("{:02}_{name}.json", i + 1));
        save_parameter_set(&params, &path)?;
        println!("generated: {}", path.display());
    }
    println!("hidden={} seed={:#x} models={count}", args.hidden.max(3), args.seed);
    Ok(())
}
