//! Joins district boundaries with land-use statistics.

use std::collections::BTreeMap;

use crate::error::MapError;
use crate::geography::{BoundaryProvider, District, Municipality};
use crate::stats::{LandTable, StatisticsProvider};

/// Agricultural land in total, m².
pub const AGRICULTURAL_AREA: &str = "U14020";
/// Total area of land of the municipality, m².
pub const TOTAL_AREA: &str = "U14010";

pub const RATIO_CODE: &str = "ALRAT";
pub const RATIO_LABEL: &str = "Podiel poľnohosp. pôdy z celkovej plochy (%)";

#[derive(Debug, Clone)]
pub struct MergedRecord {
    pub municipality: Municipality,
    /// Raw indicator values as reported by the statistics provider.
    pub values: BTreeMap<String, Option<f64>>,
    /// Agricultural share of the total area, in percent.
    pub ratio: f64,
}

#[derive(Debug, Clone)]
pub struct MergedDataset {
    pub district: District,
    pub year: String,
    pub records: Vec<MergedRecord>,
}

impl MergedDataset {
    pub fn ratios(&self) -> Vec<f64> {
        self.records.iter().map(|record| record.ratio).collect()
    }
}

/// `None` unless both areas are present and the total is a positive number.
pub fn agricultural_ratio(agricultural: Option<f64>, total: Option<f64>) -> Option<f64> {
    let (agricultural, total) = (agricultural?, total?);
    if !agricultural.is_finite() || !total.is_finite() || total <= 0.0 {
        return None;
    }
    Some(agricultural / total * 100.0)
}

/// Builds the merged dataset for one district.
///
/// Every municipality in the district's boundary subset must have a
/// statistics row, a positive total area and an agricultural area;
/// otherwise the whole district fails and the error lists every offending
/// code.
pub async fn assemble(
    district_code: &str,
    boundaries: &dyn BoundaryProvider,
    statistics: &dyn StatisticsProvider,
) -> Result<MergedDataset, MapError> {
    let district = boundaries
        .district(district_code)
        .ok_or_else(|| MapError::UnknownDistrict(district_code.to_owned()))?;
    let municipalities = boundaries.municipalities(district_code);
    if municipalities.is_empty() {
        return Err(MapError::UnknownDistrict(district_code.to_owned()));
    }

    let codes: Vec<String> = municipalities.iter().map(|m| m.code.clone()).collect();
    let table = statistics.land_table(&codes).await?;

    let missing = sorted_codes(municipalities.iter().filter(|m| !table.contains(&m.code)));
    if !missing.is_empty() {
        return Err(MapError::MissingStatistics(missing));
    }

    let invalid_total = sorted_codes(municipalities.iter().filter(|m| {
        table.value(&m.code, TOTAL_AREA).map_or(true, |total| !total.is_finite() || total <= 0.0)
    }));
    if !invalid_total.is_empty() {
        return Err(MapError::InvalidTotalArea(invalid_total));
    }

    let missing_agricultural = sorted_codes(municipalities.iter().filter(|m| {
        table.value(&m.code, AGRICULTURAL_AREA).map_or(true, |area| !area.is_finite())
    }));
    if !missing_agricultural.is_empty() {
        return Err(MapError::MissingIndicator {
            indicator: AGRICULTURAL_AREA,
            codes: missing_agricultural,
        });
    }

    let records = municipalities
        .into_iter()
        .filter_map(|municipality| {
            let ratio = ratio_for(&table, &municipality.code)?;
            let values = table.rows.get(&municipality.code)?.clone();
            Some(MergedRecord { municipality, values, ratio })
        })
        .collect();

    Ok(MergedDataset { district, year: table.year, records })
}

fn ratio_for(table: &LandTable, code: &str) -> Option<f64> {
    agricultural_ratio(
        table.value(code, AGRICULTURAL_AREA),
        table.value(code, TOTAL_AREA),
    )
}

fn sorted_codes<'a>(municipalities: impl Iterator<Item = &'a Municipality>) -> Vec<String> {
    let mut codes: Vec<String> = municipalities.map(|m| m.code.clone()).collect();
    codes.sort();
    codes
}

/// Raw per-district statistics in tabular form, for display.
#[derive(Debug, Clone)]
pub struct LandDataTable {
    pub district: District,
    pub year: String,
    /// `(code, header)` per value column; the ratio column comes last.
    pub columns: Vec<(String, String)>,
    pub rows: Vec<LandDataRow>,
}

#[derive(Debug, Clone)]
pub struct LandDataRow {
    pub code: String,
    pub name: String,
    pub values: Vec<Option<f64>>,
}

/// Unlike [`assemble`], missing rows or values are shown as blanks rather
/// than rejected.
pub async fn land_data_table(
    district_code: &str,
    boundaries: &dyn BoundaryProvider,
    statistics: &dyn StatisticsProvider,
) -> Result<LandDataTable, MapError> {
    let district = boundaries
        .district(district_code)
        .ok_or_else(|| MapError::UnknownDistrict(district_code.to_owned()))?;
    let municipalities = boundaries.municipalities(district_code);
    let codes: Vec<String> = municipalities.iter().map(|m| m.code.clone()).collect();

    let indicators = statistics.indicators().await?;
    let table = statistics.land_table(&codes).await?;

    let mut columns: Vec<(String, String)> = indicators
        .into_iter()
        .map(|(code, label)| {
            let header = format!("{label} ({code})");
            (code, header)
        })
        .collect();
    columns.push((RATIO_CODE.to_owned(), format!("{RATIO_LABEL} ({RATIO_CODE})")));

    let rows = municipalities
        .into_iter()
        .map(|municipality| {
            let values = columns
                .iter()
                .map(|(code, _)| match code.as_str() {
                    RATIO_CODE => ratio_for(&table, &municipality.code),
                    _ => table.value(&municipality.code, code),
                })
                .collect();
            LandDataRow { code: municipality.code, name: municipality.name, values }
        })
        .collect();

    Ok(LandDataTable { district, year: table.year, columns, rows })
}
