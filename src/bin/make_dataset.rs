use std::env;

use anyhow::{bail, Context, Result};
use fiberset::Dataset;

fn main() -> Result<()> {
    env_logger::init();

    let args: Vec<String> = env::args().skip(1).collect();
    if args.len() != 5 {
        bail!("usage: make_dataset <summary.csv> <images_dir> <fibers_dir> <profiles_dir> <output.zip>");
    }

    Dataset::create(&args[0], &args[1], &args[2], &args[3], &args[4])
        .with_context(|| format!("assembling {}", args[4]))?;

    println!("wrote {}", args[4]);
    Ok(())
}
