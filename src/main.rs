use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::Parser;
use tokio::{net::TcpListener, runtime::Handle};

use agromap::batch;
use agromap::config::{Config, Settings};
use agromap::geography::BoundaryIndex;
use agromap::jobs::{MapGenerationManager, MapGenerator};
use agromap::log;
use agromap::render::PngRenderer;
use agromap::stats::datacube::DatacubeClient;
use agromap::web;

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::parse();
    log::setup_trace(&config)?;
    let settings = Settings::load(&config)?;
    tracing::debug!("Settings: {settings:?}");

    let boundaries = BoundaryIndex::from_shapefile(&settings.shapefile)?;
    let statistics = DatacubeClient::new(&settings.statistics_url);
    let renderer = PngRenderer::new(settings.image_size);

    let generator = MapGenerator::new(
        Arc::new(boundaries),
        Arc::new(statistics),
        Arc::new(renderer),
        settings.output_dir.clone(),
    );
    let manager = MapGenerationManager::new(
        Handle::current(),
        Arc::new(generator),
        settings.artifact_policy,
    );

    if config.all_districts {
        let summary = batch::generate_all(&manager, config.classes, &config.palette).await?;
        for (code, reason) in &summary.failed {
            tracing::error!("{code}: {reason}");
        }
        if !summary.failed.is_empty() {
            bail!("{} of {} districts failed", summary.failed.len(), summary.failed.len() + summary.completed.len());
        }
        return Ok(());
    }

    let listener = TcpListener::bind(settings.listen)
        .await
        .with_context(|| format!("Binding {}", settings.listen))?;
    tracing::info!("Listening on http://{}", settings.listen);
    axum::serve(listener, web::router(Arc::new(manager)))
        .await
        .context("Serving HTTP")?;

    Ok(())
}
