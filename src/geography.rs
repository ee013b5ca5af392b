use std::{collections::BTreeMap, path::Path};

use anyhow::Result;
use geo_types::MultiPolygon;
use serde_derive::Serialize;

pub mod map_load;

/// Top-level administrative unit a map is generated for (LAU1).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct District {
    pub code: String,
    pub name: String,
}

/// Smallest administrative unit (LAU2) with its boundary.
#[derive(Debug, Clone, PartialEq)]
pub struct Municipality {
    pub code: String,
    pub name: String,
    pub district_code: String,
    pub geometry: MultiPolygon<f64>,
}

/// Source of district and municipality boundaries.
pub trait BoundaryProvider: Send + Sync {
    /// All known districts, ordered by code.
    fn districts(&self) -> Vec<District>;

    fn district(&self, code: &str) -> Option<District>;

    /// Municipalities of one district. Empty when the district is unknown.
    fn municipalities(&self, district_code: &str) -> Vec<Municipality>;
}

struct DistrictEntry {
    district: District,
    municipalities: Vec<Municipality>,
}

/// In-memory index of boundaries grouped by district code.
pub struct BoundaryIndex {
    districts: BTreeMap<String, DistrictEntry>,
}

impl BoundaryIndex {
    pub fn from_shapefile(path: &Path) -> Result<Self> {
        if !path.exists() {
            anyhow::bail!(
                "Shapefile {} not found. Download and unzip the municipality boundaries first.",
                path.display()
            );
        }
        let records = map_load::municipalities_from_shapefile(path)?;
        Ok(Self::from_municipalities(records))
    }

    /// Builds the index from `(municipality, district display name)` pairs.
    /// The first name seen for a district code wins.
    pub fn from_municipalities<I>(records: I) -> Self
    where
        I: IntoIterator<Item = (Municipality, String)>,
    {
        let mut districts = BTreeMap::<String, DistrictEntry>::new();
        for (municipality, district_name) in records {
            districts
                .entry(municipality.district_code.clone())
                .or_insert_with(|| DistrictEntry {
                    district: District {
                        code: municipality.district_code.clone(),
                        name: district_name,
                    },
                    municipalities: Vec::new(),
                })
                .municipalities
                .push(municipality);
        }
        BoundaryIndex { districts }
    }
}

impl BoundaryProvider for BoundaryIndex {
    fn districts(&self) -> Vec<District> {
        self.districts.values().map(|entry| entry.district.clone()).collect()
    }

    fn district(&self, code: &str) -> Option<District> {
        self.districts.get(code).map(|entry| entry.district.clone())
    }

    fn municipalities(&self, district_code: &str) -> Vec<Municipality> {
        self.districts
            .get(district_code)
            .map(|entry| entry.municipalities.clone())
            .unwrap_or_default()
    }
}
