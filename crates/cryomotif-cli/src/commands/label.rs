use crate::cli::LabelArgs;
use crate::error::{CliError, Result};
use crate::utils::progress::CliProgressHandler;
use cryomotif::engine::config::LabelConfigBuilder;
use cryomotif::engine::progress::ProgressReporter;
use cryomotif::workflows;
use std::path::PathBuf;
use tracing::info;

pub async fn run(args: LabelArgs, quiet: bool) -> Result<()> {
    let output_dir = args.output_dir.clone().unwrap_or_else(|| {
        args.map
            .parent()
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("."))
    });

    let mut builder = LabelConfigBuilder::new()
        .output_dir(output_dir)
        .normalize(!args.no_normalize);
    if !args.classes.is_empty() {
        builder = builder.classes(args.classes.clone());
    }
    let config = builder.build().map_err(|e| CliError::Config(e.to_string()))?;

    let progress_handler = CliProgressHandler::for_run(quiet);
    let reporter = ProgressReporter::with_callback(progress_handler.get_callback());

    info!("Invoking the labeling workflow...");
    let result = tokio::task::block_in_place(|| {
        workflows::label::run(&args.map, &args.structure, &config, &reporter)
    })?;

    if let Some(path) = &result.normalized_map {
        match result.percentile {
            Some(p) => println!("Normalized map (95th percentile {:.6}) written to: {}", p, path.display()),
            None => println!("Normalized map (no positive density) written to: {}", path.display()),
        }
    }
    println!(
        "Labeled {} atom(s); {} atom(s) matched no selected class.",
        result.atoms_labeled, result.atoms_ignored
    );
    if result.out_of_bounds > 0 {
        println!(
            "Warning: {} atom position(s) could not be placed on the map and were skipped.",
            result.out_of_bounds
        );
    }
    for path in &result.label_files {
        println!("  ✓ {}", path.display());
    }
    Ok(())
}
