use crate::errors::AppResult;
use crate::models::{AppTheme, ViewPreferences};
use crate::write_queue::{PendingWrite, WriteQueue};
use std::sync::Arc;
use tokio::sync::watch;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PreferenceKey {
    AppTheme,
    IsGridView,
}

impl PreferenceKey {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::AppTheme => "app_theme",
            Self::IsGridView => "is_grid_view",
        }
    }
}

/// Raw key/value persistence; values are JSON text.
pub trait SettingsBackend: Send + Sync {
    fn read_setting(&self, key: &str) -> AppResult<Option<String>>;
    fn write_setting(&self, key: &str, value_json: &str) -> AppResult<()>;
}

#[derive(Clone)]
pub struct PreferenceStore {
    backend: Arc<dyn SettingsBackend>,
    queue: WriteQueue,
    live: Arc<watch::Sender<ViewPreferences>>,
}

impl PreferenceStore {
    /// Must be called from inside a tokio runtime.
    pub fn open(backend: Arc<dyn SettingsBackend>) -> Self {
        let initial = load_preferences(backend.as_ref());
        let (live, _) = watch::channel(initial);
        Self {
            backend,
            queue: WriteQueue::start("preferences"),
            live: Arc::new(live),
        }
    }

    /// Emits the current preferences immediately, then after every write.
    pub fn subscribe(&self) -> watch::Receiver<ViewPreferences> {
        let mut receiver = self.live.subscribe();
        receiver.mark_changed();
        receiver
    }

    pub fn current(&self) -> ViewPreferences {
        *self.live.borrow()
    }

    pub fn write_theme(&self, theme: AppTheme) -> PendingWrite<()> {
        self.write(PreferenceKey::AppTheme, serde_json::json!(theme.as_str()))
    }

    pub fn write_grid_layout(&self, is_grid_layout: bool) -> PendingWrite<()> {
        self.write(PreferenceKey::IsGridView, serde_json::json!(is_grid_layout))
    }

    fn write(&self, key: PreferenceKey, value: serde_json::Value) -> PendingWrite<()> {
        let backend = self.backend.clone();
        let live = self.live.clone();
        self.queue.submit(move || {
            backend.write_setting(key.as_str(), &serde_json::to_string(&value)?)?;
            live.send_replace(load_preferences(backend.as_ref()));
            Ok(())
        })
    }
}

fn load_preferences(backend: &dyn SettingsBackend) -> ViewPreferences {
    let theme = read_value::<String>(backend, PreferenceKey::AppTheme)
        .map(|name| AppTheme::from_name(&name))
        .unwrap_or_default();
    let is_grid_layout = read_value::<bool>(backend, PreferenceKey::IsGridView).unwrap_or(false);
    ViewPreferences {
        theme,
        is_grid_layout,
    }
}

fn read_value<T: serde::de::DeserializeOwned>(backend: &dyn SettingsBackend, key: PreferenceKey) -> Option<T> {
    let raw = match backend.read_setting(key.as_str()) {
        Ok(raw) => raw?,
        Err(error) => {
            tracing::warn!(key = key.as_str(), error = %error, "preference read failed, using default");
            return None;
        }
    };
    match serde_json::from_str::<T>(&raw) {
        Ok(value) => Some(value),
        Err(error) => {
            tracing::warn!(key = key.as_str(), error = %error, "unreadable preference value, using default");
            None
        }
    }
}
