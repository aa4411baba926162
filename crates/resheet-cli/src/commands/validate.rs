//! Validate configuration command

use anyhow::Result;
use resheet_core::config::{InputConfig, OutputConfig};

/// Run the validate command
pub fn run(input_config: &str, output_config: &str) -> Result<()> {
    tracing::info!("Validating configuration: {}", input_config);
    let input = InputConfig::load(input_config)?;
    for file in &input.files {
        match &file.join_on {
            Some(key) => tracing::info!(
                "✓ {}: {} columns, joins on '{}'",
                file.filename,
                file.columns.len(),
                key
            ),
            None => tracing::info!("✓ {}: {} columns", file.filename, file.columns.len()),
        }
    }

    tracing::info!("Validating configuration: {}", output_config);
    let output = OutputConfig::load(output_config)?;
    for file in &output.files {
        tracing::info!("✓ {}: {} sheets", file.filename, file.sheets.len());
    }

    tracing::info!("✓ Configuration is valid");
    Ok(())
}
