//! Application state wiring the reconciliation services together.
//!
//! The core services are generic over their ports; AppState pins them to the
//! SQLite store, the channel emitter, the environment secret provider, the
//! HTTP listing client and the cron-backed poll scheduler.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use conduit_core::reconcile::emitter::{ChannelEmitter, EmittedEvent};
use conduit_core::reconcile::engine::ReconcileEngine;
use conduit_core::reconcile::listing::ListError;
use conduit_core::reconcile::poll::PollRunner;
use conduit_core::reconcile::trigger::TriggerManager;
use conduit_core::reconcile::webhook::WebhookIngress;
use conduit_infra::config::{load_engine_config, resolve_data_dir};
use conduit_infra::listing::http::HttpExecutionLister;
use conduit_infra::scheduler::CronPollScheduler;
use conduit_infra::secret::env::EnvSecretProvider;
use conduit_infra::sqlite::checkpoint::SqliteCheckpointStore;
use conduit_infra::sqlite::pool::{DatabasePool, database_url};
use conduit_types::config::EngineConfig;
use secrecy::SecretString;
use tokio::sync::mpsc;

/// Environment variable holding the API key sent to the listing endpoint.
pub const LISTING_API_KEY_ENV: &str = "CONDUIT_LISTING_API_KEY";

/// Buffered completion events between the engine and the consumer task.
const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Concrete type aliases for the service generics pinned to infra implementations.
pub type ConcreteEngine = ReconcileEngine<SqliteCheckpointStore, ChannelEmitter>;

pub type ConcreteIngress =
    WebhookIngress<SqliteCheckpointStore, ChannelEmitter, EnvSecretProvider>;

pub type ConcreteRunner =
    PollRunner<SqliteCheckpointStore, ChannelEmitter, HttpExecutionLister, CronPollScheduler>;

pub type ConcreteTriggerManager =
    TriggerManager<SqliteCheckpointStore, ChannelEmitter, CronPollScheduler>;

/// Shared application state used by the CLI commands and the HTTP handlers.
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<ConcreteEngine>,
    pub ingress: Arc<ConcreteIngress>,
    pub runner: Arc<ConcreteRunner>,
    pub triggers: Arc<ConcreteTriggerManager>,
    pub scheduler: Arc<CronPollScheduler>,
    pub config: EngineConfig,
    pub data_dir: PathBuf,
}

impl AppState {
    /// Resolve the data directory, load `config.toml`, open the database and
    /// wire every service.
    ///
    /// Returns the receiving end of the emission channel; the caller owns
    /// draining it.
    pub async fn init() -> anyhow::Result<(Self, mpsc::Receiver<EmittedEvent>)> {
        let data_dir = resolve_data_dir();
        tokio::fs::create_dir_all(&data_dir).await?;

        let config = load_engine_config(&data_dir).await;
        let pool = open_database(&data_dir).await?;
        Ok(Self::new(pool, config, data_dir)?)
    }

    /// Wire the services over an already-open database.
    pub fn new(
        pool: DatabasePool,
        config: EngineConfig,
        data_dir: PathBuf,
    ) -> Result<(Self, mpsc::Receiver<EmittedEvent>), ListError> {
        let (emitter, events) = ChannelEmitter::new(EVENT_CHANNEL_CAPACITY);
        let engine = Arc::new(ReconcileEngine::new(
            SqliteCheckpointStore::new(pool),
            emitter,
            config.clone(),
        ));

        let scheduler = Arc::new(CronPollScheduler::new());
        let ingress = WebhookIngress::new(Arc::clone(&engine), EnvSecretProvider::new());
        let runner = PollRunner::new(
            Arc::clone(&engine),
            build_lister(&config)?,
            Arc::clone(&scheduler),
        );
        let triggers = TriggerManager::new(Arc::clone(&engine), Arc::clone(&scheduler));

        let state = Self {
            engine,
            ingress: Arc::new(ingress),
            runner: Arc::new(runner),
            triggers: Arc::new(triggers),
            scheduler,
            config,
            data_dir,
        };
        Ok((state, events))
    }
}

/// Open (creating if needed) `{data_dir}/conduit.db` and run migrations.
pub async fn open_database(data_dir: &Path) -> anyhow::Result<DatabasePool> {
    let pool = DatabasePool::new(&database_url(data_dir)).await?;
    Ok(pool)
}

/// Build the listing client, attaching the API key from the environment when set.
pub fn build_lister(config: &EngineConfig) -> Result<HttpExecutionLister, ListError> {
    let lister = HttpExecutionLister::new(config.http_timeout())?;
    Ok(match std::env::var(LISTING_API_KEY_ENV) {
        Ok(key) if !key.is_empty() => {
            lister.with_api_key(config.api_key_header.clone(), SecretString::from(key))
        }
        _ => lister,
    })
}
