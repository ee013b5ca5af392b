//! Fakes shared by unit tests.

use std::{
    collections::BTreeMap,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
};

use async_trait::async_trait;
use geo_types::{polygon, MultiPolygon};
use tokio::sync::Semaphore;

use crate::assemble::{AGRICULTURAL_AREA, TOTAL_AREA};
use crate::geography::{BoundaryIndex, Municipality};
use crate::stats::{LandTable, ProviderError, StatisticsProvider};

pub(crate) fn square_municipality(code: &str, district: &str, x0: f64, y0: f64) -> Municipality {
    Municipality {
        code: code.to_owned(),
        name: format!("Obec {code}"),
        district_code: district.to_owned(),
        geometry: MultiPolygon(vec![polygon![
            (x: x0, y: y0),
            (x: x0 + 1.0, y: y0),
            (x: x0 + 1.0, y: y0 + 1.0),
            (x: x0, y: y0 + 1.0),
        ]]),
    }
}

/// One district made of unit squares laid out left to right.
pub(crate) fn district_index(district: &str, name: &str, codes: &[&str]) -> BoundaryIndex {
    BoundaryIndex::from_municipalities(codes.iter().enumerate().map(|(i, code)| {
        (square_municipality(code, district, i as f64, 0.0), name.to_owned())
    }))
}

/// In-memory statistics provider counting `land_table` calls.
///
/// A gated fake holds every `land_table` call until [`FakeStatistics::release`].
#[derive(Clone, Default)]
pub(crate) struct FakeStatistics {
    rows: BTreeMap<String, BTreeMap<String, Option<f64>>>,
    fail: bool,
    gate: Option<Arc<Semaphore>>,
    calls: Arc<AtomicUsize>,
}

impl FakeStatistics {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn with_row(mut self, code: &str, agricultural: Option<f64>, total: Option<f64>) -> Self {
        let row = BTreeMap::from([
            (AGRICULTURAL_AREA.to_owned(), agricultural),
            (TOTAL_AREA.to_owned(), total),
        ]);
        self.rows.insert(code.to_owned(), row);
        self
    }

    pub(crate) fn failing(mut self) -> Self {
        self.fail = true;
        self
    }

    pub(crate) fn gated(mut self) -> Self {
        self.gate = Some(Arc::new(Semaphore::new(0)));
        self
    }

    pub(crate) fn release(&self) {
        if let Some(gate) = &self.gate {
            gate.add_permits(Semaphore::MAX_PERMITS / 2);
        }
    }

    pub(crate) fn land_table_calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl StatisticsProvider for FakeStatistics {
    async fn latest_year(&self) -> Result<String, ProviderError> {
        Ok("2023".to_owned())
    }

    async fn indicators(&self) -> Result<BTreeMap<String, String>, ProviderError> {
        Ok(BTreeMap::from([
            (TOTAL_AREA.to_owned(), "Total area of land of municipality-town in m2".to_owned()),
            (AGRICULTURAL_AREA.to_owned(), "Agricultural land in total in m2".to_owned()),
        ]))
    }

    async fn municipality_codes(
        &self,
        names: &[String],
    ) -> Result<BTreeMap<String, String>, ProviderError> {
        Ok(names
            .iter()
            .filter(|name| self.rows.contains_key(name.as_str()))
            .map(|name| (name.clone(), name.clone()))
            .collect())
    }

    async fn land_table(&self, codes: &[String]) -> Result<LandTable, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(gate) = &self.gate {
            let _permit = gate
                .acquire()
                .await
                .map_err(|_| ProviderError::Schema("gate closed".to_owned()))?;
        }
        if self.fail {
            return Err(ProviderError::Schema("statistics service unavailable".to_owned()));
        }
        let rows = codes
            .iter()
            .filter_map(|code| Some((code.clone(), self.rows.get(code)?.clone())))
            .collect();
        Ok(LandTable { year: "2023".to_owned(), rows })
    }
}
