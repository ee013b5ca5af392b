//! Map generation jobs.
//!
//! [`MapGenerationManager::generate`] accepts a [`JobKey`] and *detaches* the
//! work onto the tokio runtime; callers poll [`MapGenerationManager::status`].
//! At most one generation per key runs at a time.
//!
//! Initially:      SK0101/5/viridis -- Not started
//! Accepted:       SK0101/5/viridis -- Processing
//! Finished:       SK0101/5/viridis -- Completed (maps/map_SK0101_5_viridis.png)

use std::{
    collections::HashMap,
    fmt,
    hash::{Hash, Hasher},
    io::Write,
    path::{Path, PathBuf},
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

use serde_derive::Deserialize;
use tokio::{runtime::Handle, sync::Notify};

use crate::assemble::assemble;
use crate::classify::classify;
use crate::error::{InputError, MapError};
use crate::geography::BoundaryProvider;
use crate::render::{palette::Palette, MapFrame, Renderer};
use crate::stats::StatisticsProvider;

/// Identity of one map: the same key always means the same artifact.
#[derive(Clone)]
pub struct JobKey {
    district_code: String,
    class_count: u32,
    palette: &'static Palette,
}

impl JobKey {
    pub fn new(district_code: &str, class_count: i64, palette_name: &str) -> Result<Self, InputError> {
        let district_code = district_code.trim();
        if district_code.is_empty() {
            return Err(InputError::Missing("district"));
        }
        let safe = |c: char| c.is_ascii_alphanumeric() || c == '-' || c == '_';
        if !district_code.chars().all(safe) {
            return Err(InputError::DistrictCode(district_code.to_owned()));
        }

        let class_count = u32::try_from(class_count)
            .ok()
            .filter(|count| *count >= 1)
            .ok_or(InputError::ClassCount(class_count))?;

        let palette_name = palette_name.trim();
        if palette_name.is_empty() {
            return Err(InputError::Missing("color_palette"));
        }
        let palette = Palette::by_name(palette_name)
            .ok_or_else(|| InputError::Palette(palette_name.to_owned()))?;

        Ok(JobKey { district_code: district_code.to_owned(), class_count, palette })
    }

    pub fn district_code(&self) -> &str {
        &self.district_code
    }

    pub fn class_count(&self) -> u32 {
        self.class_count
    }

    pub fn palette(&self) -> &'static Palette {
        self.palette
    }

    /// Artifact file name, a pure function of the key.
    pub fn file_name(&self) -> String {
        format!("map_{}_{}_{}.png", self.district_code, self.class_count, self.palette.name)
    }
}

impl PartialEq for JobKey {
    fn eq(&self, other: &Self) -> bool {
        self.district_code == other.district_code
            && self.class_count == other.class_count
            && self.palette.name == other.palette.name
    }
}

impl Eq for JobKey {}

impl Hash for JobKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.district_code.hash(state);
        self.class_count.hash(state);
        self.palette.name.hash(state);
    }
}

impl fmt::Debug for JobKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "JobKey({self})")
    }
}

impl fmt::Display for JobKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.district_code, self.class_count, self.palette.name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobStatus {
    NotStarted,
    Processing,
    Completed,
    Error(String),
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobStatus::NotStarted => f.write_str("Not started"),
            JobStatus::Processing => f.write_str("Processing"),
            JobStatus::Completed => f.write_str("Completed"),
            JobStatus::Error(message) => write!(f, "Error: {message}"),
        }
    }
}

/// What to do when the artifact for a key already exists.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ArtifactPolicy {
    /// Report the job as completed without regenerating.
    #[default]
    SkipExisting,
    /// Always regenerate and replace the file.
    Overwrite,
}

/// Runs the pipeline for one key: assemble, classify, render, persist.
pub struct MapGenerator {
    boundaries: Arc<dyn BoundaryProvider>,
    statistics: Arc<dyn StatisticsProvider>,
    renderer: Arc<dyn Renderer>,
    output_dir: PathBuf,
}

impl MapGenerator {
    pub fn new(
        boundaries: Arc<dyn BoundaryProvider>,
        statistics: Arc<dyn StatisticsProvider>,
        renderer: Arc<dyn Renderer>,
        output_dir: PathBuf,
    ) -> Self {
        MapGenerator { boundaries, statistics, renderer, output_dir }
    }

    pub fn boundaries(&self) -> &dyn BoundaryProvider {
        &*self.boundaries
    }

    pub fn statistics(&self) -> &dyn StatisticsProvider {
        &*self.statistics
    }

    pub fn artifact_path(&self, key: &JobKey) -> PathBuf {
        self.output_dir.join(key.file_name())
    }

    pub async fn generate(&self, key: &JobKey) -> Result<PathBuf, MapError> {
        tracing::info!("{key}: Assembling district data");
        let dataset = assemble(key.district_code(), self.boundaries(), self.statistics()).await?;
        let classification = classify(&dataset.ratios(), key.class_count() as usize);
        tracing::debug!("{key}: Breaks {:?}", classification.breaks);

        let frame = MapFrame::new(dataset, classification, key.palette());
        let renderer = Arc::clone(&self.renderer);
        let output_dir = self.output_dir.clone();
        let path = self.artifact_path(key);

        tokio::task::spawn_blocking(move || {
            let bytes = renderer.render(&frame)?;
            write_atomically(&output_dir, &path, &bytes)
                .map_err(|source| MapError::Artifact { path: path.clone(), source })?;
            Ok::<_, MapError>(path)
        })
        .await?
    }
}

/// Writes into a temporary file beside `path` and renames it into place, so
/// readers never observe a partially written image.
fn write_atomically(dir: &Path, path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    std::fs::create_dir_all(dir)?;
    let mut file = tempfile::NamedTempFile::new_in(dir)?;
    file.write_all(bytes)?;
    file.as_file().sync_all()?;
    file.persist(path).map_err(|err| err.error)?;
    Ok(())
}

type StatusTable = Arc<Mutex<HashMap<JobKey, JobStatus>>>;

/// Deduplicates map generation requests and tracks their status.
pub struct MapGenerationManager {
    runtime: Handle,
    generator: Arc<MapGenerator>,
    policy: ArtifactPolicy,
    /// Guards the check-then-mark of `Processing`.
    statuses: StatusTable,
    /// Signalled whenever a run leaves `Processing`.
    finished: Arc<Notify>,
}

impl MapGenerationManager {
    pub fn new(runtime: Handle, generator: Arc<MapGenerator>, policy: ArtifactPolicy) -> Self {
        MapGenerationManager {
            runtime,
            generator,
            policy,
            statuses: Arc::new(Mutex::new(HashMap::new())),
            finished: Arc::new(Notify::new()),
        }
    }

    pub fn generator(&self) -> &MapGenerator {
        &self.generator
    }

    /// Starts generation for `key` unless it is already running.
    ///
    /// Returns `false` only when a run for the same key is in flight. Never
    /// waits for the generation itself.
    pub fn generate(&self, key: JobKey) -> bool {
        let path = self.generator.artifact_path(&key);
        let mut statuses = lock(&self.statuses);
        if statuses.get(&key) == Some(&JobStatus::Processing) {
            tracing::debug!("{key}: Already processing, rejecting");
            return false;
        }

        // Blocking stat under the lock: a run finishing between the check
        // and the status update would otherwise be reported twice.
        if self.policy == ArtifactPolicy::SkipExisting && path.exists() {
            tracing::info!("{key}: {} already exists, skipping", path.display());
            statuses.insert(key, JobStatus::Completed);
            return true;
        }

        statuses.insert(key.clone(), JobStatus::Processing);
        drop(statuses);
        self.spawn(key);
        true
    }

    pub fn status(&self, key: &JobKey) -> JobStatus {
        lock(&self.statuses)
            .get(key)
            .cloned()
            .unwrap_or(JobStatus::NotStarted)
    }

    /// Resolves once `key` is no longer `Processing` and returns that status.
    pub async fn wait(&self, key: &JobKey) -> JobStatus {
        loop {
            let finished = self.finished.notified();
            tokio::pin!(finished);
            // registered before the check so a completion in between is not lost
            finished.as_mut().enable();

            let status = self.status(key);
            if status != JobStatus::Processing {
                return status;
            }
            finished.await;
        }
    }

    /// Runs the generator on its own task and a second task that records the
    /// outcome, so even a panicking generation ends up as `Error`.
    fn spawn(&self, key: JobKey) {
        let generator = Arc::clone(&self.generator);
        let worker_key = key.clone();
        let worker = self.runtime.spawn(async move {
            generator.generate(&worker_key).await
        });

        let statuses = Arc::clone(&self.statuses);
        let finished = Arc::clone(&self.finished);
        self.runtime.spawn(async move {
            let status = match worker.await {
                Ok(Ok(path)) => {
                    tracing::info!("{key}: Completed, wrote {}", path.display());
                    JobStatus::Completed
                }
                Ok(Err(err)) => {
                    tracing::error!("{key}: Generation failed: {err}");
                    JobStatus::Error(err.to_string())
                }
                Err(join_err) => {
                    let err = MapError::Task(join_err);
                    tracing::error!("{key}: {err}");
                    JobStatus::Error(err.to_string())
                }
            };
            lock(&statuses).insert(key, status);
            finished.notify_waiters();
        });
    }
}

fn lock(statuses: &StatusTable) -> MutexGuard<'_, HashMap<JobKey, JobStatus>> {
    statuses.lock().unwrap_or_else(PoisonError::into_inner)
}
