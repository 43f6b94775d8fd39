//! Application state wiring storage, backend and the turn service together.
//!
//! `TurnService` is generic over the repository trait; AppState pins it to
//! the SQLite implementation.

use std::path::PathBuf;
use std::sync::Arc;

use koboldbot_core::generation::box_backend::BoxGenerationBackend;
use koboldbot_core::turn::registry::ActiveTurns;
use koboldbot_core::turn::service::TurnService;
use koboldbot_infra::config::{database_path, load_global_config, resolve_data_dir};
use koboldbot_infra::kobold::KoboldBackend;
use koboldbot_infra::sqlite::character::SqliteCharacterRepository;
use koboldbot_infra::sqlite::pool::{DatabasePool, database_url};
use koboldbot_types::config::GlobalConfig;

/// Turn service pinned to the infra implementations.
pub type ConcreteTurnService = TurnService<SqliteCharacterRepository>;

/// Shared application state used by every command handler.
#[derive(Clone)]
pub struct AppState {
    pub turn_service: Arc<ConcreteTurnService>,
    pub config: GlobalConfig,
    pub data_dir: PathBuf,
    pub db_path: PathBuf,
    pub db_pool: DatabasePool,
}

impl AppState {
    /// Initialize the application state: load config, open the database,
    /// wire the backend and turn service.
    pub async fn init() -> anyhow::Result<Self> {
        let data_dir = resolve_data_dir();
        tokio::fs::create_dir_all(&data_dir).await?;

        let config = load_global_config(&data_dir).await;

        let db_path = database_path(&config, &data_dir);
        if let Some(parent) = db_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        let db_pool = DatabasePool::new(&database_url(&db_path)).await?;

        let repo = SqliteCharacterRepository::new(db_pool.clone());
        let backend = BoxGenerationBackend::new(KoboldBackend::new(config.backend.base_url.clone()));
        let turn_service = TurnService::new(
            repo,
            backend,
            config.sampling.clone(),
            ActiveTurns::new(config.turns.busy_policy),
        );

        tracing::debug!(
            data_dir = %data_dir.display(),
            database = %db_path.display(),
            backend = %config.backend.base_url,
            busy_policy = %config.turns.busy_policy,
            "Application state ready"
        );

        Ok(Self {
            turn_service: Arc::new(turn_service),
            config,
            data_dir,
            db_path,
            db_pool,
        })
    }

    pub fn repo(&self) -> &SqliteCharacterRepository {
        self.turn_service.repo()
    }

    /// Close the database pool, waiting for in-flight queries.
    pub async fn shutdown(&self) {
        self.db_pool.close().await;
    }
}
