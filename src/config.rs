use std::path::PathBuf;
use tokio::time::Duration;

pub const DEFAULT_DATA_DIR: &str = "contact-book-data";
pub const DEFAULT_DATABASE_FILE: &str = "contacts.sqlite";
pub const DEFAULT_SUBSCRIPTION_GRACE_MS: u64 = 5_000;
pub const DEFAULT_LOG_FILTER: &str = "info";

pub const ENV_DATA_DIR: &str = "CONTACT_BOOK_DATA_DIR";
pub const ENV_GRACE_MS: &str = "CONTACT_BOOK_GRACE_MS";
pub const ENV_LOG_FILTER: &str = "CONTACT_BOOK_LOG";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub data_dir: PathBuf,
    pub database_file: String,
    /// How long the live record subscription outlives its last observer.
    pub subscription_grace: Duration,
    pub log_filter: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from(".").join(DEFAULT_DATA_DIR),
            database_file: DEFAULT_DATABASE_FILE.to_string(),
            subscription_grace: Duration::from_millis(DEFAULT_SUBSCRIPTION_GRACE_MS),
            log_filter: DEFAULT_LOG_FILTER.to_string(),
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();
        if let Some(dir) = lookup(ENV_DATA_DIR).filter(|value| !value.trim().is_empty()) {
            config.data_dir = PathBuf::from(dir);
        }
        if let Some(raw) = lookup(ENV_GRACE_MS) {
            match raw.trim().parse::<u64>() {
                Ok(millis) => config.subscription_grace = Duration::from_millis(millis),
                Err(error) => tracing::warn!(
                    value = %raw,
                    error = %error,
                    "invalid {ENV_GRACE_MS}, using {DEFAULT_SUBSCRIPTION_GRACE_MS}ms"
                ),
            }
        }
        if let Some(filter) = lookup(ENV_LOG_FILTER).filter(|value| !value.trim().is_empty()) {
            config.log_filter = filter;
        }
        config
    }

    pub fn with_data_dir(mut self, data_dir: impl Into<PathBuf>) -> Self {
        self.data_dir = data_dir.into();
        self
    }

    pub fn database_path(&self) -> PathBuf {
        self.data_dir.join(&self.database_file)
    }

    pub fn log_dir(&self) -> PathBuf {
        self.data_dir.join("logs")
    }
}
