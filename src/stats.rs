use std::collections::BTreeMap;

use async_trait::async_trait;
use thiserror::Error;

pub mod datacube;

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("statistics request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("unexpected statistics response: {0}")]
    Schema(String),
}

/// Raw indicator values for one period, keyed by municipality code and then
/// by indicator code. `None` marks a value the provider reported as missing.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LandTable {
    pub year: String,
    pub rows: BTreeMap<String, BTreeMap<String, Option<f64>>>,
}

impl LandTable {
    pub fn value(&self, code: &str, indicator: &str) -> Option<f64> {
        self.rows.get(code)?.get(indicator).copied().flatten()
    }

    pub fn contains(&self, code: &str) -> bool {
        self.rows.contains_key(code)
    }
}

/// Source of per-municipality land-use statistics.
#[async_trait]
pub trait StatisticsProvider: Send + Sync {
    /// Most recent period with published data.
    async fn latest_year(&self) -> Result<String, ProviderError>;

    /// Indicator code to human-readable label.
    async fn indicators(&self) -> Result<BTreeMap<String, String>, ProviderError>;

    /// Resolves municipality names to codes. Names that match nothing are
    /// left out of the result.
    async fn municipality_codes(
        &self,
        names: &[String],
    ) -> Result<BTreeMap<String, String>, ProviderError>;

    /// Every indicator for the given municipalities in the latest period.
    async fn land_table(&self, codes: &[String]) -> Result<LandTable, ProviderError>;
}
