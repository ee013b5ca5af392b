//! Client for the land-use cube (`pl5001rr`) of the DataCube statistics API.
//!
//! Dimension lookups and land tables are memoized in [`CallCache`]s owned by
//! the client. Nothing expires on its own; call
//! [`DatacubeClient::invalidate_land_table`] or [`DatacubeClient::clear_cache`]
//! to force fresh queries.

use std::collections::BTreeMap;

use async_trait::async_trait;
use itertools::Itertools;

use crate::collections::{CallCache, CallKey};
use crate::stats::{LandTable, ProviderError, StatisticsProvider};

pub mod api;

use api::schema::Dimension;

const CUBE: &str = "pl5001rr";
const REGION_DIM: &str = "nuts15";
const YEAR_DIM: &str = "pl5001rr_rok";
const INDICATOR_DIM: &str = "pl5001rr_ukaz";

/// Municipality names are searched in Slovak, everything else is fetched in English.
const LANG: &str = "en";
const NAME_LANG: &str = "sk";

/// Maximum # of municipality codes per dataset query (bounded by URL length).
const REGION_BATCH: usize = 50;

pub struct DatacubeClient {
    http_client: reqwest::Client,
    base_url: String,
    dimensions: CallCache<Dimension>,
    tables: CallCache<LandTable>,
}

impl DatacubeClient {
    pub fn new(base_url: &str) -> Self {
        Self::with_client(reqwest::Client::new(), base_url)
    }

    pub fn with_client(http_client: reqwest::Client, base_url: &str) -> Self {
        let base_url = if base_url.ends_with('/') {
            base_url.to_owned()
        } else {
            format!("{base_url}/")
        };

        DatacubeClient {
            http_client,
            base_url,
            dimensions: CallCache::new(),
            tables: CallCache::new(),
        }
    }

    /// Forgets the cached land table for exactly this set of codes.
    pub fn invalidate_land_table(&self, codes: &[String]) -> bool {
        self.tables.invalidate(&land_table_key(codes))
    }

    pub fn clear_cache(&self) {
        self.dimensions.clear();
        self.tables.clear();
    }

    async fn dimension(&self, dim: &'static str, lang: &'static str) -> Result<Dimension, ProviderError> {
        let key = CallKey::new("dimension", [CUBE, dim, lang]);
        self.dimensions
            .get_or_try_insert_with(key, || {
                api::dimension(&self.http_client, &self.base_url, CUBE, dim, lang)
            })
            .await
    }

    async fn fetch_land_table(&self, codes: &[String]) -> Result<LandTable, ProviderError> {
        let year = self.latest_year().await?;
        let indicators: Vec<String> = self.indicators().await?.into_keys().collect();
        let regions: Vec<String> = codes.iter().unique().cloned().collect();

        let mut table = LandTable { year: year.clone(), rows: BTreeMap::new() };
        for batch in regions.chunks(REGION_BATCH) {
            let dataset = api::dataset(
                &self.http_client, &self.base_url, CUBE, batch, &year, &indicators, LANG,
            ).await?;

            let (Some(region_axis), Some(indicator_axis)) =
                (dataset.position(REGION_DIM), dataset.position(INDICATOR_DIM))
            else {
                return Err(ProviderError::Schema(format!(
                    "dataset lacks {REGION_DIM} or {INDICATOR_DIM} dimension"
                )));
            };

            for cell in dataset.cells()? {
                table.rows
                    .entry(cell.coords[region_axis].clone())
                    .or_default()
                    .insert(cell.coords[indicator_axis].clone(), cell.value);
            }
        }

        tracing::debug!("Fetched {} of {} municipalities for {year}", table.rows.len(), regions.len());
        Ok(table)
    }
}

fn land_table_key(codes: &[String]) -> CallKey {
    CallKey::new("land_table", codes.iter().sorted().dedup().cloned())
}

#[async_trait]
impl StatisticsProvider for DatacubeClient {
    async fn latest_year(&self) -> Result<String, ProviderError> {
        let years = self.dimension(YEAR_DIM, LANG).await?;
        years.category
            .codes()
            .into_iter()
            .filter_map(|code| code.parse::<i32>().ok().map(|year| (year, code)))
            .max_by_key(|(year, _)| *year)
            .map(|(_, code)| code)
            .ok_or_else(|| ProviderError::Schema(format!("dimension {YEAR_DIM} lists no years")))
    }

    async fn indicators(&self) -> Result<BTreeMap<String, String>, ProviderError> {
        let indicators = self.dimension(INDICATOR_DIM, LANG).await?;
        let codes = indicators.category.codes();
        let labels = indicators.category.label;
        Ok(codes
            .into_iter()
            .map(|code| {
                let label = labels.get(&code).cloned().unwrap_or_else(|| code.clone());
                (code, label)
            })
            .collect())
    }

    async fn municipality_codes(
        &self,
        names: &[String],
    ) -> Result<BTreeMap<String, String>, ProviderError> {
        let regions = self.dimension(REGION_DIM, NAME_LANG).await?;
        let ordered = regions.category.codes();

        let mut resolved = BTreeMap::new();
        for name in names {
            let needle = name.to_lowercase();
            let found = ordered.iter().find(|code| {
                regions.category.label
                    .get(*code)
                    .is_some_and(|label| label.to_lowercase().contains(&needle))
            });
            match found {
                Some(code) => {
                    resolved.insert(name.clone(), code.clone());
                }
                None => tracing::debug!("No municipality matches {name:?}"),
            }
        }
        Ok(resolved)
    }

    async fn land_table(&self, codes: &[String]) -> Result<LandTable, ProviderError> {
        self.tables
            .get_or_try_insert_with(land_table_key(codes), || self.fetch_land_table(codes))
            .await
    }
}
