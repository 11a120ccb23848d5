use crate::cli::NormalizeArgs;
use crate::error::Result;
use cryomotif::core::density::normalize::normalized_output_path;
use cryomotif::workflows;
use tracing::{info, warn};

pub async fn run(args: NormalizeArgs) -> Result<()> {
    let output = args
        .output
        .clone()
        .unwrap_or_else(|| normalized_output_path(&args.input));
    info!("Normalizing {:?} into {:?}", &args.input, &output);

    let outcome = tokio::task::block_in_place(|| workflows::normalize::run(&args.input, &output))?;

    match outcome.percentile {
        Some(p) => println!("95th percentile: {:.6}", p),
        None => {
            warn!("Map has no positive density; output is all zeros.");
            println!("Warning: the map has no positive density, the output is all zeros.");
        }
    }
    println!("✓ Normalized map written to: {}", output.display());
    Ok(())
}
