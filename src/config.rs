use std::{
    net::SocketAddr,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use serde_derive::Deserialize;

use crate::jobs::ArtifactPolicy;

pub const DEFAULT_LISTEN: &str = "127.0.0.1:5000";
pub const DEFAULT_SHAPEFILE: &str = "shp/obec_0.shp";
pub const DEFAULT_OUTPUT_DIR: &str = "maps";
pub const DEFAULT_STATISTICS_URL: &str = "https://data.statistics.sk/api/v2/";
pub const DEFAULT_IMAGE_SIZE: u32 = 1200;

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
pub struct Config {
    #[clap(value_enum, short, long, ignore_case=true, default_value_t=LogLevel::Info)]
    pub log_level: LogLevel,

    /// TOML settings file. Flags given on the command line take precedence.
    #[clap(short, long)]
    pub config: Option<PathBuf>,

    #[clap(long)]
    pub listen: Option<SocketAddr>,

    /// Municipality boundary shapefile (obec_0.shp).
    #[clap(long)]
    pub shapefile: Option<PathBuf>,

    #[clap(long)]
    pub output_dir: Option<PathBuf>,

    #[clap(long)]
    pub statistics_url: Option<String>,

    /// Regenerate maps even when the image already exists.
    #[clap(long)]
    pub overwrite: bool,

    /// Generate a map for every district in the shapefile and exit instead
    /// of serving HTTP.
    #[clap(long)]
    pub all_districts: bool,

    /// Class count used with --all-districts.
    #[clap(long, default_value_t = 5)]
    pub classes: i64,

    /// Color palette used with --all-districts.
    #[clap(long, default_value = "viridis")]
    pub palette: String,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

/// Settings as they appear in the optional TOML file.
#[derive(Deserialize, Debug, Default)]
#[serde(rename_all = "snake_case")]
struct FileSettings {
    listen: Option<SocketAddr>,
    shapefile: Option<PathBuf>,
    output_dir: Option<PathBuf>,
    statistics_url: Option<String>,
    image_size: Option<u32>,
    artifact_policy: Option<ArtifactPolicy>,
}

/// Fully resolved runtime settings.
#[derive(Debug, Clone)]
pub struct Settings {
    pub listen: SocketAddr,
    pub shapefile: PathBuf,
    pub output_dir: PathBuf,
    pub statistics_url: String,
    pub image_size: u32,
    pub artifact_policy: ArtifactPolicy,
}

impl Settings {
    pub fn load(config: &Config) -> Result<Self> {
        let file = match &config.config {
            Some(path) => read_settings_file(path)?,
            None => FileSettings::default(),
        };
        Self::merge(config, file)
    }

    fn merge(config: &Config, file: FileSettings) -> Result<Self> {
        let listen = match config.listen.or(file.listen) {
            Some(addr) => addr,
            None => DEFAULT_LISTEN.parse().context("Parsing default listen address")?,
        };

        let artifact_policy = if config.overwrite {
            ArtifactPolicy::Overwrite
        } else {
            file.artifact_policy.unwrap_or_default()
        };

        let image_size = file.image_size.unwrap_or(DEFAULT_IMAGE_SIZE);
        if image_size < 64 {
            anyhow::bail!("image_size must be at least 64 pixels, got {image_size}");
        }

        Ok(Settings {
            listen,
            shapefile: config.shapefile.clone()
                .or(file.shapefile)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_SHAPEFILE)),
            output_dir: config.output_dir.clone()
                .or(file.output_dir)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_OUTPUT_DIR)),
            statistics_url: config.statistics_url.clone()
                .or(file.statistics_url)
                .unwrap_or_else(|| DEFAULT_STATISTICS_URL.to_owned()),
            image_size,
            artifact_policy,
        })
    }
}

fn read_settings_file(path: &Path) -> Result<FileSettings> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Reading settings file {}", path.display()))?;
    toml::from_str(&text)
        .with_context(|| format!("Parsing settings file {}", path.display()))
}
