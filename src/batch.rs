//! Generates a map for every district, one after another.

use crate::error::InputError;
use crate::jobs::{JobKey, JobStatus, MapGenerationManager};

#[derive(Debug, Default)]
pub struct BatchSummary {
    /// District codes whose map exists after the run.
    pub completed: Vec<String>,
    /// District code and the reason its map could not be generated.
    pub failed: Vec<(String, String)>,
}

/// Runs every district of the boundary provider through `manager` with the
/// same class count and palette.
///
/// A district that fails is logged and recorded, and the run moves on.
/// Invalid class counts or palettes abort before anything is generated.
pub async fn generate_all(
    manager: &MapGenerationManager,
    class_count: i64,
    palette: &str,
) -> Result<BatchSummary, InputError> {
    let districts = manager.generator().boundaries().districts();
    tracing::info!("Generating maps for {} districts", districts.len());

    let mut summary = BatchSummary::default();
    for district in districts {
        let key = match JobKey::new(&district.code, class_count, palette) {
            Ok(key) => key,
            Err(InputError::DistrictCode(code)) => {
                tracing::warn!("Skipping district {code}: unusable code");
                summary.failed.push((code.clone(), InputError::DistrictCode(code).to_string()));
                continue;
            }
            Err(err) => return Err(err),
        };

        tracing::info!("Processing district {} ({})", district.name, district.code);
        manager.generate(key.clone());
        match manager.wait(&key).await {
            JobStatus::Completed => summary.completed.push(district.code),
            JobStatus::Error(message) => summary.failed.push((district.code, message)),
            other => summary.failed.push((district.code, format!("unexpected status {other}"))),
        }
    }

    tracing::info!(
        "Batch finished: {} completed, {} failed",
        summary.completed.len(),
        summary.failed.len(),
    );
    Ok(summary)
}
