use std::{io::ErrorKind, path::PathBuf, sync::Arc};

use tokio::sync::Mutex;

use vivarium_common::HabitatConfig;

/// On-disk configuration store. A missing file means defaults; validation
/// is the caller's job so an invalid file is rejected before anything runs.
#[derive(Clone)]
pub struct ConfigStore {
    path: Arc<PathBuf>,
    lock: Arc<Mutex<()>>,
}

impl ConfigStore {
    pub fn new() -> Self {
        let data_dir = std::env::var("VIVARIUM_DATA_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("./.vivarium"));

        Self {
            path: Arc::new(data_dir.join("config.json")),
            lock: Arc::new(Mutex::new(())),
        }
    }

    pub async fn load(&self) -> anyhow::Result<HabitatConfig> {
        let _guard = self.lock.lock().await;
        match tokio::fs::read(self.path.as_ref()).await {
            Ok(raw) => Ok(serde_json::from_slice::<HabitatConfig>(&raw)?),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(HabitatConfig::default()),
            Err(err) => Err(err.into()),
        }
    }

    pub async fn save(&self, config: &HabitatConfig) -> anyhow::Result<()> {
        let _guard = self.lock.lock().await;
        let path = self.path.as_ref().clone();
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let payload = serde_json::to_vec_pretty(config)?;
        tokio::fs::write(path, payload).await?;
        Ok(())
    }
}
