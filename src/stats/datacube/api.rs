//! REST API endpoints for the DataCube statistics service (data.statistics.sk)
use itertools::Itertools;

use crate::stats::ProviderError;

/// Fetches the categories of one cube dimension.
pub async fn dimension(
    client: &reqwest::Client,
    base_url: &str,
    cube: &str,
    dim: &str,
    lang: &str,
) -> Result<schema::Dimension, ProviderError> {
    let url = format!("{base_url}dimension/{cube}/{dim}?lang={lang}");
    tracing::info!("Querying DataCube dimension {cube}/{dim} ({lang})");

    let response = client.get(&url)
        .send().await?
        .error_for_status()?
        .json::<schema::Dimension>().await?;

    Ok(response)
}

/// Fetches a JSON-stat dataset for the cartesian product of `regions` and
/// `indicators` in a single `year`.
pub async fn dataset(
    client: &reqwest::Client,
    base_url: &str,
    cube: &str,
    regions: &[String],
    year: &str,
    indicators: &[String],
    lang: &str,
) -> Result<schema::Dataset, ProviderError> {
    let url = format!(
        "{base_url}dataset/{cube}/{}/{year}/{}?lang={lang}&type=json",
        regions.iter().join(","),
        indicators.iter().join(","),
    );
    tracing::info!("({:13}): Querying DataCube dataset {cube}/{year}",
        format!("{} regions", regions.len()));

    let response = client.get(&url)
        .send().await?
        .error_for_status()?
        .json::<schema::Dataset>().await?;

    Ok(response)
}

/// Serde-compatible JSON-stat schema used by DataCube
pub mod schema {
    use std::collections::HashMap;

    use serde_derive::Deserialize;

    use crate::stats::ProviderError;

    #[derive(Deserialize, Debug, Clone)]
    pub struct Dimension {
        #[serde(default)]
        pub label: Option<String>,
        pub category: Category,
    }

    #[derive(Deserialize, Debug, Clone)]
    pub struct Category {
        #[serde(default)]
        pub index: Option<CategoryIndex>,
        #[serde(default)]
        pub label: HashMap<String, String>,
    }

    /// JSON-stat allows the category order as either `{"code": position}`
    /// or `["code", ...]`.
    #[derive(Deserialize, Debug, Clone)]
    #[serde(untagged)]
    pub enum CategoryIndex {
        Positions(HashMap<String, usize>),
        Ordered(Vec<String>),
    }

    impl Category {
        /// Category codes in dimension order.
        pub fn codes(&self) -> Vec<String> {
            match &self.index {
                Some(CategoryIndex::Ordered(codes)) => codes.clone(),
                Some(CategoryIndex::Positions(positions)) => {
                    let mut codes: Vec<(&String, &usize)> = positions.iter().collect();
                    codes.sort_by_key(|(_, position)| **position);
                    codes.into_iter().map(|(code, _)| code.clone()).collect()
                }
                None => {
                    let mut codes: Vec<String> = self.label.keys().cloned().collect();
                    codes.sort();
                    codes
                }
            }
        }
    }

    #[derive(Deserialize, Debug, Clone)]
    pub struct Dataset {
        pub id: Vec<String>,
        pub size: Vec<usize>,
        pub dimension: HashMap<String, Dimension>,
        pub value: Values,
    }

    #[derive(Deserialize, Debug, Clone)]
    #[serde(untagged)]
    pub enum Values {
        Dense(Vec<Option<f64>>),
        Sparse(HashMap<String, Option<f64>>),
    }

    /// One observation: a category code per dimension (in `Dataset::id`
    /// order) and its value.
    #[derive(Debug, Clone, PartialEq)]
    pub struct Cell {
        pub coords: Vec<String>,
        pub value: Option<f64>,
    }

    impl Dataset {
        pub fn position(&self, dim: &str) -> Option<usize> {
            self.id.iter().position(|id| id == dim)
        }

        /// Expands the row-major value array into addressed cells.
        pub fn cells(&self) -> Result<Vec<Cell>, ProviderError> {
            if self.id.len() != self.size.len() {
                return Err(ProviderError::Schema(format!(
                    "{} dimension ids but {} sizes", self.id.len(), self.size.len()
                )));
            }

            let mut axes = Vec::with_capacity(self.id.len());
            for (id, size) in self.id.iter().zip(&self.size) {
                let dimension = self.dimension.get(id).ok_or_else(|| {
                    ProviderError::Schema(format!("dimension {id} is not described"))
                })?;
                let codes = dimension.category.codes();
                if codes.len() != *size {
                    return Err(ProviderError::Schema(format!(
                        "dimension {id} has {} categories, size says {size}", codes.len()
                    )));
                }
                axes.push(codes);
            }

            let total: usize = self.size.iter().product();
            let mut cells = Vec::with_capacity(total);
            for flat in 0..total {
                let mut remainder = flat;
                let mut coords = vec![String::new(); axes.len()];
                for (axis, codes) in axes.iter().enumerate().rev() {
                    coords[axis] = codes[remainder % codes.len()].clone();
                    remainder /= codes.len();
                }
                let value = match &self.value {
                    Values::Dense(values) => values.get(flat).copied().flatten(),
                    Values::Sparse(values) => values.get(&flat.to_string()).copied().flatten(),
                };
                cells.push(Cell { coords, value });
            }
            Ok(cells)
        }
    }

}
