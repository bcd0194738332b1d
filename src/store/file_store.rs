use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

use crate::error::StoreError;
use crate::store::{PersistedState, TokenStore};

/// JSON document on local disk, replaced atomically via tmp file + rename.
#[derive(Debug, Clone)]
pub struct FileStore {
    path: PathBuf,
}

impl FileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Sibling of the target so the rename never crosses filesystems.
    fn tmp_path(&self) -> PathBuf {
        let file_name = self
            .path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| "tokens".to_owned());
        self.path.with_file_name(format!(".{}.tmp", file_name))
    }
}

impl TokenStore for FileStore {
    async fn load(&self) -> Result<Option<PersistedState>, StoreError> {
        match fs::read(&self.path).await {
            Ok(bytes) => {
                let state: PersistedState = serde_json::from_slice(&bytes)
                    .map_err(|e| StoreError::corrupt(&self.path, e))?;
                info!(
                    "token file '{}' loaded, company: {}, locations: {}",
                    self.path.display(),
                    state.company.is_some(),
                    state.locations.len()
                );
                Ok(Some(state))
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {
                info!("token file '{}' not found, starting empty", self.path.display());
                Ok(None)
            }
            Err(e) => Err(StoreError::io(&self.path, e)),
        }
    }

    async fn save(&self, state: &PersistedState) -> Result<(), StoreError> {
        let content = serde_json::to_vec_pretty(state).map_err(|e| StoreError::corrupt(&self.path, e))?;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| StoreError::io(parent, e))?;
        }

        let tmp = self.tmp_path();
        let mut file = fs::File::create(&tmp).await.map_err(|e| StoreError::io(&tmp, e))?;
        file.write_all(&content).await.map_err(|e| StoreError::io(&tmp, e))?;
        file.sync_all().await.map_err(|e| StoreError::io(&tmp, e))?;
        drop(file);

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&tmp, std::fs::Permissions::from_mode(0o600))
                .await
                .map_err(|e| StoreError::io(&tmp, e))?;
        }

        fs::rename(&tmp, &self.path).await.map_err(|e| StoreError::io(&self.path, e))?;
        debug!("token file '{}' written", self.path.display());
        Ok(())
    }
}
