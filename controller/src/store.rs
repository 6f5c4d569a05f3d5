use std::{
    io::ErrorKind,
    path::{Path, PathBuf},
    sync::Arc,
};

use fireplace_common::{PersistedState, RuntimeConfig, StateStore, StorageError};

#[derive(Clone)]
pub struct AppStore {
    config_path: Arc<PathBuf>,
    state_path: Arc<PathBuf>,
}

impl AppStore {
    pub fn new() -> Self {
        let data_dir = std::env::var("FIREPLACE_DATA_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("./.fireplace"));
        let config_path = std::env::var("FIREPLACE_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| data_dir.join("config.json"));

        Self::with_paths(config_path, data_dir.join("state.json"))
    }

    pub fn with_paths(config_path: PathBuf, state_path: PathBuf) -> Self {
        Self {
            config_path: Arc::new(config_path),
            state_path: Arc::new(state_path),
        }
    }

    pub async fn load_runtime_config(&self) -> anyhow::Result<RuntimeConfig> {
        match tokio::fs::read(self.config_path.as_ref()).await {
            Ok(raw) => Ok(serde_json::from_slice::<RuntimeConfig>(&raw)?),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(RuntimeConfig::default()),
            Err(err) => Err(err.into()),
        }
    }

    pub fn state_store(&self) -> FileStore {
        FileStore::new(self.state_path.as_ref().clone())
    }
}

/// Durable entity record kept as a small JSON file.
#[derive(Debug, Clone)]
pub struct FileStore {
    path: PathBuf,
}

impl FileStore {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl StateStore for FileStore {
    fn load(&mut self) -> Result<Option<PersistedState>, StorageError> {
        match std::fs::read(&self.path) {
            Ok(raw) => Ok(Some(serde_json::from_slice::<PersistedState>(&raw)?)),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    fn save(&mut self, state: &PersistedState) -> Result<(), StorageError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let payload = serde_json::to_vec_pretty(state)?;
        // Write then rename so a crash never leaves a half-written record.
        let staging = self.path.with_extension("json.tmp");
        std::fs::write(&staging, payload)?;
        std::fs::rename(&staging, &self.path)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use fireplace_common::{Component, FireplaceConfig, FireplaceEntity, RestoreMode};

    use super::*;

    #[test]
    fn missing_record_loads_as_none() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = FileStore::new(dir.path().join("state.json"));

        assert!(store.load().unwrap().is_none());
    }

    #[test]
    fn saved_record_loads_back() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = FileStore::new(dir.path().join("nested").join("state.json"));
        let state = PersistedState {
            is_on: true,
            power_level: 3,
            oscillating: true,
            preset: Some(2),
        };

        store.save(&state).unwrap();

        assert_eq!(store.load().unwrap(), Some(state));
        assert!(!store.path().with_extension("json.tmp").exists());
    }

    #[test]
    fn garbage_record_is_malformed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        std::fs::write(&path, b"{not json").unwrap();
        let mut store = FileStore::new(path);

        assert!(matches!(store.load(), Err(StorageError::Malformed(_))));
    }

    #[test]
    fn garbage_record_restores_like_missing_one() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        std::fs::write(&path, b"\x00\x01 not a record").unwrap();
        let mut store = FileStore::new(path);
        let config = FireplaceConfig {
            restore_mode: RestoreMode::RestoreDefaultOn,
            ..FireplaceConfig::default()
        };
        let mut fireplace = FireplaceEntity::new(&config).unwrap();

        fireplace.setup(&mut store);

        assert!(fireplace.is_on());
        assert_eq!(fireplace.power_level(), 1);
        assert!(!fireplace.is_oscillating());
        assert!(!fireplace.has_pending_save());
    }

    #[tokio::test]
    async fn missing_config_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let store = AppStore::with_paths(dir.path().join("config.json"), dir.path().join("state.json"));

        let runtime = store.load_runtime_config().await.unwrap();

        assert_eq!(runtime.fireplace.id, "fireplace");
        assert_eq!(runtime.http_port, 8080);
    }

    #[tokio::test]
    async fn config_file_is_parsed() {
        let dir = tempfile::tempdir().unwrap();
        let config_path = dir.path().join("config.json");
        std::fs::write(
            &config_path,
            r#"{
                "fireplace": { "id": "den", "name": "Den", "max_power_level": 3, "off_speed_cycle": true },
                "network": {
                    "mqtt_host": "localhost", "mqtt_port": 1883, "mqtt_user": "",
                    "mqtt_pass": "", "client_id": "den", "topic_prefix": "den/fireplace"
                },
                "http_port": 9090
            }"#,
        )
        .unwrap();
        let store = AppStore::with_paths(config_path, dir.path().join("state.json"));

        let runtime = store.load_runtime_config().await.unwrap();

        assert_eq!(runtime.fireplace.id, "den");
        assert!(runtime.fireplace.off_speed_cycle);
        assert_eq!(runtime.http_port, 9090);
    }
}
