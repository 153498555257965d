//! Application state wiring the pipeline together.
//!
//! AppState holds the concrete collaborators used by the HTTP layer: the
//! request pipeline (admission, upstream generator, stream coordinator),
//! the identity resolver, and the transcript store when persistence is on.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use solace_core::admission::AdmissionController;
use solace_core::generator::BoxTextGenerator;
use solace_core::identity::IdentityResolver;
use solace_core::pipeline::RequestPipeline;
use solace_core::stream::StreamCoordinator;
use solace_core::transcript::{BoxTranscriptSink, InMemoryTranscriptSink};
use solace_infra::config::load_global_config;
use solace_infra::filesystem::{database_url, resolve_data_dir};
use solace_infra::sqlite::pool::DatabasePool;
use solace_infra::sqlite::transcript::SqliteTranscriptStore;
use solace_infra::upstream::HttpTextGenerator;
use solace_types::config::GlobalConfig;

use crate::http::identity::KeyedIdentityResolver;

/// Shared application state, cloned into every handler.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<GlobalConfig>,
    pub data_dir: PathBuf,
    pub pipeline: Arc<RequestPipeline>,
    pub resolver: Arc<dyn IdentityResolver>,
    /// `None` when serving with `--no-persist`.
    pub transcripts: Option<Arc<SqliteTranscriptStore>>,
    pub started_at: Instant,
}

impl AppState {
    /// Initialize the application state: load config, connect to the DB,
    /// build the upstream client.
    pub async fn init(persist: bool) -> anyhow::Result<Self> {
        let data_dir = resolve_data_dir();
        tokio::fs::create_dir_all(&data_dir).await?;

        let config = load_global_config(&data_dir).await;

        let (sink, transcripts) = if persist {
            let pool = DatabasePool::new(&database_url(&data_dir)).await?;
            let store = Arc::new(SqliteTranscriptStore::new(pool));
            (BoxTranscriptSink::from_arc(store.clone()), Some(store))
        } else {
            tracing::warn!("Transcript persistence disabled, responses are kept in memory only");
            (BoxTranscriptSink::new(InMemoryTranscriptSink::new()), None)
        };

        let generator = HttpTextGenerator::from_config(&config.upstream)?;

        Ok(Self::from_parts(
            config,
            data_dir,
            BoxTextGenerator::new(generator),
            sink,
            transcripts,
        ))
    }

    /// Assemble state from already-built collaborators.
    pub fn from_parts(
        config: GlobalConfig,
        data_dir: PathBuf,
        generator: BoxTextGenerator,
        sink: BoxTranscriptSink,
        transcripts: Option<Arc<SqliteTranscriptStore>>,
    ) -> Self {
        let admission = Arc::new(AdmissionController::new(config.admission.clone()));
        let coordinator = StreamCoordinator::new(sink, config.stream.capacity_bytes);
        let pipeline = RequestPipeline::new(
            admission,
            generator,
            coordinator,
            config.retry.clone(),
        );
        let resolver = KeyedIdentityResolver::from_config(&config.admission);

        Self {
            config: Arc::new(config),
            data_dir,
            pipeline: Arc::new(pipeline),
            resolver: Arc::new(resolver),
            transcripts,
            started_at: Instant::now(),
        }
    }

    pub fn admission(&self) -> &Arc<AdmissionController> {
        self.pipeline.admission()
    }

    /// Close the database pool, if one is open.
    pub async fn close(&self) {
        if let Some(store) = &self.transcripts {
            store.pool().close().await;
        }
    }
}
