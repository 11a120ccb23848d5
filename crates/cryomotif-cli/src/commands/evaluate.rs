use crate::cli::EvaluateArgs;
use crate::config::PartialRunConfig;
use crate::error::Result;
use crate::utils::progress::CliProgressHandler;
use cryomotif::core::density::resample::TrilinearResampler;
use cryomotif::core::taxonomy::motif::MotifLabel;
use cryomotif::engine::metrics::ConfusionMatrix;
use cryomotif::engine::progress::ProgressReporter;
use cryomotif::workflows;
use tracing::{info, warn};

pub async fn run(args: EvaluateArgs, quiet: bool) -> Result<()> {
    let config = PartialRunConfig::load(args.config.as_deref())?.merge_evaluation(&args)?;
    info!(
        "Evaluating {:?} against {:?} (up to {} map(s) per class)",
        &config.inference.checkpoint, &config.root, config.max_per_class
    );

    let progress_handler = CliProgressHandler::for_run(quiet);
    let reporter = ProgressReporter::with_callback(progress_handler.get_callback());
    let resampler = TrilinearResampler::new();

    let report = tokio::task::block_in_place(|| workflows::evaluate::run(&config, &resampler, &reporter))?;

    for label in &report.skipped_classes {
        println!("Warning: no maps found for class '{}'.", label);
    }
    println!("Evaluated {} map(s).", report.evaluated);
    println!();
    print!("{}", format_matrix(&report.matrix));
    println!();

    for metrics in report.matrix.class_metrics() {
        println!(
            "  {:<16} n={:<4} sensitivity {:.4}  specificity {:.4}",
            metrics.label.to_string(),
            metrics.support,
            metrics.sensitivity,
            metrics.specificity
        );
    }
    println!(
        "Macro sensitivity {:.4}, macro specificity {:.4}, accuracy {:.2}%",
        report.matrix.macro_sensitivity(),
        report.matrix.macro_specificity(),
        report.matrix.accuracy() * 100.0
    );

    if !report.failures.is_empty() {
        warn!("{} map(s) could not be evaluated.", report.failures.len());
        println!("{} map(s) could not be evaluated:", report.failures.len());
        for failure in &report.failures {
            println!("  {}: {}", failure.path.display(), failure.reason);
        }
    }
    Ok(())
}

/// Rows are true classes, columns predicted classes.
fn format_matrix(matrix: &ConfusionMatrix) -> String {
    let labels: Vec<String> = MotifLabel::ALL
        .iter()
        .take(matrix.num_classes())
        .map(|l| l.to_string())
        .collect();
    let width = labels.iter().map(String::len).max().unwrap_or(0).max(6);

    let mut out = format!("{:>width$}", "", width = width);
    for label in &labels {
        out.push_str(&format!(" {:>width$}", label, width = width));
    }
    out.push('\n');
    for (label, row) in labels.iter().zip(matrix.rows()) {
        out.push_str(&format!("{:>width$}", label, width = width));
        for count in row {
            out.push_str(&format!(" {:>width$}", count, width = width));
        }
        out.push('\n');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matrix_rows_follow_class_order() {
        let mut matrix = ConfusionMatrix::new(2);
        matrix.record(MotifLabel::ALL[0], MotifLabel::ALL[1]);
        matrix.record(MotifLabel::ALL[1], MotifLabel::ALL[1]);
        let text = format_matrix(&matrix);
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[1].trim_start().starts_with(&MotifLabel::ALL[0].to_string()));
        assert!(lines[1].trim_end().ends_with('1'));
        assert!(lines[2].split_whitespace().eq([MotifLabel::ALL[1].to_string().as_str(), "0", "1"]));
    }
}
