//! Run the full reshaping pipeline

use anyhow::Result;
use resheet_core::config::{InputConfig, OutputConfig};
use resheet_core::connectors::{CsvSink, CsvSource};

/// Run the run command
pub fn run(input_config: &str, output_config: &str, input_dir: &str, output_dir: &str) -> Result<()> {
    tracing::info!("Loading input config from {}", input_config);
    let input = InputConfig::load(input_config)?;

    tracing::info!("Loading output config from {}", output_config);
    let output = OutputConfig::load(output_config)?;

    // both configs are good before any data is touched
    let source = CsvSource::new(input_dir);
    let dataset = resheet_core::assemble(&input, &source)?;
    tracing::info!("Assembled {} rows across {} columns", dataset.rows(), dataset.width());

    let mut sink = CsvSink::new(output_dir);
    resheet_core::project(&output, &dataset, &mut sink)?;
    tracing::info!("Wrote {} output files under {}", output.files.len(), output_dir);
    Ok(())
}
