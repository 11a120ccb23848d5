use crate::cli::ClassifyArgs;
use crate::config::PartialRunConfig;
use crate::error::Result;
use crate::utils::progress::CliProgressHandler;
use cryomotif::core::density::resample::TrilinearResampler;
use cryomotif::core::taxonomy::motif::MotifLabel;
use cryomotif::engine::progress::ProgressReporter;
use cryomotif::workflows;
use tracing::info;

pub async fn run(args: ClassifyArgs, quiet: bool) -> Result<()> {
    let config = PartialRunConfig::load(args.config.as_deref())?.merge_classify(&args)?;
    info!("Classifying {} map(s) with {:?}", args.maps.len(), &config.checkpoint);

    let progress_handler = CliProgressHandler::for_run(quiet);
    let reporter = ProgressReporter::with_callback(progress_handler.get_callback());
    let resampler = TrilinearResampler::new();

    let results = tokio::task::block_in_place(|| {
        workflows::classify::run(&args.maps, &config, &resampler, &reporter)
    })?;

    for result in &results {
        println!(
            "{}: {} ({:.2}%)",
            result.path.display(),
            result.prediction.label,
            result.prediction.confidence() * 100.0
        );
        let probabilities = result
            .prediction
            .probabilities
            .iter()
            .zip(MotifLabel::ALL)
            .map(|(p, label)| format!("{}={:.4}", label, p))
            .collect::<Vec<_>>()
            .join(", ");
        println!("  {}", probabilities);
    }
    Ok(())
}
