use anyhow::{Context, Result};
use clap::Parser;
use qc_outliers::cli::{Cli, OutputFormat};
use qc_outliers::pipeline::OutlierPipeline;
use qc_outliers::report::PreprocessSummary;
use qc_outliers::{input, preprocess};
use std::fs;
use tracing_subscriber::EnvFilter;

/// Initialize tracing subscriber for debug output
fn init_tracing(debug: bool) {
    if debug {
        tracing_subscriber::fmt()
            .with_env_filter(
                EnvFilter::from_default_env().add_directive(tracing::Level::TRACE.into()),
            )
            .with_writer(std::io::stderr)
            .init();
    }
}

fn main() -> Result<()> {
    let args = Cli::parse();
    init_tracing(args.debug);

    let config = args.run_config()?;

    let raw = if args.file_in.as_os_str() == "-" {
        input::read_metrics_from(std::io::stdin().lock())?
    } else {
        input::read_metrics(&args.file_in)?
    };

    let (matrix, summary) = if args.no_preprocess {
        (raw, None)
    } else {
        let pre = preprocess::preprocess(&raw, &config.preprocess)
            .context("Failed to preprocess QC metrics")?;
        let summary = PreprocessSummary {
            min_variance: config.preprocess.min_variance,
            min_correlation: config.preprocess.min_correlation,
            scaling: config.preprocess.scaling,
            variances: pre.variances,
            correlated: pre.correlated,
        };
        (pre.matrix, Some(summary))
    };

    let mut report = OutlierPipeline::new(config.engine)
        .analyze(&matrix)
        .context("Outlier analysis failed")?;
    report.preprocessing = summary;

    let rendered = match args.format {
        OutputFormat::Text => report.format(),
        OutputFormat::Json => {
            let mut json =
                serde_json::to_string_pretty(&report).context("Failed to serialize report")?;
            json.push('\n');
            json
        }
    };

    match &args.output {
        Some(path) => fs::write(path, rendered)
            .with_context(|| format!("Failed to write report: {}", path.display()))?,
        None => print!("{}", rendered),
    }

    Ok(())
}
