use crate::cli::TrainArgs;
use crate::config::PartialRunConfig;
use crate::error::Result;
use crate::utils::progress::CliProgressHandler;
use cryomotif::core::density::resample::TrilinearResampler;
use cryomotif::engine::progress::ProgressReporter;
use cryomotif::workflows;
use tracing::{info, warn};

pub async fn run(args: TrainArgs, quiet: bool) -> Result<()> {
    let partial_config = PartialRunConfig::load(args.config.as_deref())?;
    info!("Merging configuration from file and CLI arguments...");
    let config = partial_config.merge_training(&args)?;

    let progress_handler = CliProgressHandler::for_run(quiet);
    let reporter = ProgressReporter::with_callback(progress_handler.get_callback());
    let resampler = TrilinearResampler::new();

    println!(
        "Training for {} epoch(s), batch size {}, {} sampling...",
        config.epochs,
        config.batch_size,
        if config.guided { "guided" } else { "centre-crop" }
    );
    let report = tokio::task::block_in_place(|| workflows::train::run(&config, &resampler, &reporter))?;

    println!(
        "Trained on {} example(s), validated on {}.",
        report.train_examples, report.val_examples
    );
    for epoch in &report.epochs {
        let note = if epoch.steps == 0 {
            " (no usable batch)".to_string()
        } else if epoch.skipped_examples > 0 {
            format!(" ({} example(s) skipped)", epoch.skipped_examples)
        } else {
            String::new()
        };
        println!(
            "  Epoch {:>3}: loss {:.4} over {} step(s), validation accuracy {:.2}% on {}{}",
            epoch.epoch,
            epoch.mean_loss,
            epoch.steps,
            epoch.val_accuracy * 100.0,
            epoch.val_samples,
            note
        );
    }

    match report.final_checkpoint() {
        Some(path) => println!("✓ Final checkpoint written to: {}", path.display()),
        None => {
            warn!("No epoch was run; no checkpoint was written.");
            println!("Warning: no epoch was run, no checkpoint was written.");
        }
    }
    Ok(())
}
