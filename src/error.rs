use std::path::PathBuf;

use itertools::Itertools;
use thiserror::Error;

use crate::render::RenderError;
use crate::stats::ProviderError;

/// Rejected request parameters. No job is created.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum InputError {
    #[error("missing required parameter `{0}`")]
    Missing(&'static str),

    #[error("district code {0:?} may only contain ASCII letters, digits, '-' and '_'")]
    DistrictCode(String),

    #[error("parameter `{param}` must be a whole number, got {value:?}")]
    NotANumber { param: &'static str, value: String },

    #[error("class count must be a positive 32-bit integer, got {0}")]
    ClassCount(i64),

    #[error("unknown color palette {0:?}")]
    Palette(String),
}

/// Failure of a map generation run.
#[derive(Debug, Error)]
pub enum MapError {
    #[error("unknown district {0}")]
    UnknownDistrict(String),

    #[error("missing statistics for municipalities: {}", .0.iter().join(", "))]
    MissingStatistics(Vec<String>),

    #[error("zero or missing total area for municipalities: {}", .0.iter().join(", "))]
    InvalidTotalArea(Vec<String>),

    #[error("missing indicator {indicator} for municipalities: {}", .codes.iter().join(", "))]
    MissingIndicator {
        indicator: &'static str,
        codes: Vec<String>,
    },

    #[error(transparent)]
    Statistics(#[from] ProviderError),

    #[error("rendering failed: {0}")]
    Render(#[from] RenderError),

    #[error("writing {}: {source}", .path.display())]
    Artifact {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("generation task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}
