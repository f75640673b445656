pub mod config;
pub mod controller;
pub mod db;
pub mod errors;
pub mod memory;
pub mod models;
pub mod preferences;
pub mod sharing;
pub mod store;
pub mod validation;
pub mod view;
pub mod write_queue;

pub use crate::config::AppConfig;
pub use crate::controller::{ContactListController, ContactListObserver, Intent, SaveOutcome};
pub use crate::errors::{AppError, AppResult};
pub use crate::models::{AppTheme, Contact, ContactListState, EditDraft, FieldErrors, SortOrder, ViewPreferences};
pub use crate::preferences::PreferenceStore;
pub use crate::store::RecordStore;

use crate::db::Database;
use anyhow::Context;
use std::sync::Arc;
use tracing_appender::non_blocking::WorkerGuard;

static LOG_GUARD: std::sync::OnceLock<WorkerGuard> = std::sync::OnceLock::new();

/// The wired application: one SQLite database backing both stores, and the
/// controller on top of them.
#[derive(Clone)]
pub struct ContactApp {
    pub controller: ContactListController,
    pub records: RecordStore,
    pub preferences: PreferenceStore,
    database: Arc<Database>,
}

impl ContactApp {
    /// Must be called from inside a tokio runtime.
    pub fn open(config: &AppConfig) -> AppResult<Self> {
        let database = Arc::new(Database::new(&config.database_path())?);
        let records = RecordStore::open(database.clone())?;
        let preferences = PreferenceStore::open(database.clone());
        let controller = ContactListController::spawn(records.clone(), preferences.clone(), config.subscription_grace);
        tracing::info!(
            path = %database.path().display(),
            grace_ms = config.subscription_grace.as_millis() as u64,
            "contact book opened"
        );

        Ok(Self {
            controller,
            records,
            preferences,
            database,
        })
    }

    pub fn database_path(&self) -> &std::path::Path {
        self.database.path()
    }

    pub fn shutdown(&self) {
        self.controller.shutdown();
    }
}

/// Installs logging, then opens the application.
pub fn start(config: &AppConfig) -> AppResult<ContactApp> {
    init_tracing(config)?;
    ContactApp::open(config)
}

pub fn init_tracing(config: &AppConfig) -> anyhow::Result<()> {
    let log_dir = config.log_dir();
    std::fs::create_dir_all(&log_dir)
        .with_context(|| format!("creating log directory {}", log_dir.display()))?;
    let file_appender = tracing_appender::rolling::daily(log_dir, "contact-book.log");
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
    let _ = LOG_GUARD.set(guard);

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.log_filter)),
        )
        .json()
        .with_writer(non_blocking)
        .try_init()
        .map_err(|error| anyhow::anyhow!(error))
        .context("installing tracing subscriber")
}
