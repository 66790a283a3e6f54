//! File output for reports and generated schemas.

use labsdb_auditor_core::{Result, error::AuditorError};
use serde::Serialize;
use std::path::Path;

/// Serialization format of an output file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Yaml,
    Json,
}

impl OutputFormat {
    /// JSON for `.json` paths, YAML otherwise.
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("json") => Self::Json,
            _ => Self::Yaml,
        }
    }
}

/// Serializes `value` in the given format.
pub fn serialize<T: Serialize>(value: &T, format: OutputFormat) -> Result<String> {
    match format {
        OutputFormat::Yaml => serde_yaml::to_string(value)
            .map_err(|e| AuditorError::serialization("YAML serialization", e)),
        OutputFormat::Json => serde_json::to_string_pretty(value)
            .map(|mut json| {
                json.push('\n');
                json
            })
            .map_err(|e| AuditorError::serialization("JSON serialization", e)),
    }
}

/// Writes `value` to `path`, picking the format from the extension.
pub async fn write_output<T: Serialize>(value: &T, path: &Path) -> Result<()> {
    let data = serialize(value, OutputFormat::from_path(path))?;
    tokio::fs::write(path, data)
        .await
        .map_err(|e| AuditorError::io(format!("Failed to write to {}", path.display()), e))?;
    tracing::debug!("Wrote {}", path.display());
    Ok(())
}
