// Filesystem object store: `<root>/<key>`, written to a temp file then hard-linked into place.
// The link fails when the key already exists, so stored objects are never replaced.

use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use bytes::Bytes;
use tracing::instrument;

use super::{ArchiveSink, SinkError};

pub struct FsArchive {
    root: PathBuf,
}

impl FsArchive {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Keys are relative paths without `..`; anything else is rejected.
    fn resolve(&self, key: &str) -> Result<PathBuf, SinkError> {
        let rel = Path::new(key);
        let ok = !key.is_empty()
            && rel
                .components()
                .all(|c| matches!(c, Component::Normal(_)));
        if !ok {
            return Err(SinkError::InvalidKey(key.to_string()));
        }
        Ok(self.root.join(rel))
    }
}

#[async_trait]
impl ArchiveSink for FsArchive {
    #[instrument(skip(self, payload), fields(sink = "archive", operation = "put", bytes = payload.len()))]
    async fn put(&self, key: &str, payload: Bytes) -> Result<(), SinkError> {
        let path = self.resolve(key)?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, &payload).await?;
        let linked = tokio::fs::hard_link(&tmp, &path).await;
        tokio::fs::remove_file(&tmp).await?;
        match linked {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                Err(SinkError::Exists(key.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    #[instrument(skip(self), fields(sink = "archive", operation = "get"))]
    async fn get(&self, key: &str) -> Result<Bytes, SinkError> {
        let path = self.resolve(key)?;
        Ok(Bytes::from(tokio::fs::read(&path).await?))
    }
}
