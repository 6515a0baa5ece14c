//! Local directory blob store.
//!
//! Stores objects as files under a base directory. Uses atomic write
//! (temp file → fsync → rename) to prevent partial objects. The server
//! serves the directory back under its public url.

use std::path::PathBuf;

use anyhow::{bail, Context};
use async_trait::async_trait;
use bytes::Bytes;
use tracing::debug;
use uuid::Uuid;

use filedeck_common::backend::{choose_pathname, encode_pathname, pathname_under, BlobStore, PutOptions};
use filedeck_common::naming;
use filedeck_common::record::FileRecord;

/// Temp files written during a put start with this and are never listed.
const TMP_PREFIX: &str = ".filedeck-tmp-";

pub struct DirectoryBlobStore {
    base_path: PathBuf,
    public_url: String,
}

impl DirectoryBlobStore {
    pub fn new(base_path: impl Into<PathBuf>, public_url: impl Into<String>) -> Self {
        Self {
            base_path: base_path.into(),
            public_url: public_url.into().trim_end_matches('/').to_string(),
        }
    }

    fn full_path(&self, pathname: &str) -> PathBuf {
        self.base_path.join(pathname)
    }

    /// Pathname of a url served by this store.
    fn resolve(&self, url: &str) -> anyhow::Result<String> {
        let pathname = pathname_under(&self.public_url, url)
            .with_context(|| format!("url is not served by this store: {}", url))?;
        naming::normalize_pathname(&pathname)
    }
}

#[async_trait]
impl BlobStore for DirectoryBlobStore {
    async fn put(&self, pathname: &str, content: Bytes, options: &PutOptions) -> anyhow::Result<FileRecord> {
        let pathname = choose_pathname(pathname, options, |candidate| self.full_path(candidate).exists())?;
        let dest = self.full_path(&pathname);

        let parent = dest.parent().unwrap_or(self.base_path.as_path()).to_path_buf();
        tokio::fs::create_dir_all(&parent)
            .await
            .context("Failed to create parent directory")?;

        // Write to temp file, then rename (atomic)
        let tmp_path = parent.join(format!("{}{}", TMP_PREFIX, Uuid::new_v4()));
        tokio::fs::write(&tmp_path, &content)
            .await
            .context("Failed to write temp file")?;

        let file = tokio::fs::OpenOptions::new()
            .write(true)
            .open(&tmp_path)
            .await
            .context("Failed to open temp file for fsync")?;
        file.sync_all().await.context("fsync failed")?;
        drop(file);

        if let Err(e) = tokio::fs::rename(&tmp_path, &dest).await {
            let _ = tokio::fs::remove_file(&tmp_path).await;
            return Err(e).context("Atomic rename failed");
        }

        let url = format!("{}/{}", self.public_url, encode_pathname(&pathname));
        debug!(url = %url, size = content.len(), "Directory put complete");
        Ok(FileRecord::new(url, pathname))
    }

    async fn fetch(&self, url: &str) -> anyhow::Result<Bytes> {
        let src = self.full_path(&self.resolve(url)?);
        if !src.is_file() {
            bail!("blob not found: {}", url);
        }
        let data = tokio::fs::read(&src)
            .await
            .with_context(|| format!("Failed to read {}", src.display()))?;
        Ok(Bytes::from(data))
    }

    async fn del(&self, url: &str) -> anyhow::Result<()> {
        let pathname = match self.resolve(url) {
            Ok(pathname) => pathname,
            Err(e) => {
                debug!(url = %url, error = %e, "Ignoring delete of url outside store");
                return Ok(());
            }
        };
        let path = self.full_path(&pathname);
        if path.is_file() {
            tokio::fs::remove_file(&path)
                .await
                .context("Failed to delete file")?;
        }
        debug!(url = %url, "Directory delete complete");
        Ok(())
    }

    async fn list(&self) -> anyhow::Result<Vec<FileRecord>> {
        let mut records = Vec::new();
        if !self.base_path.exists() {
            return Ok(records);
        }

        let mut stack = vec![self.base_path.clone()];
        while let Some(dir) = stack.pop() {
            let mut entries = tokio::fs::read_dir(&dir)
                .await
                .context("Failed to read directory")?;

            while let Some(entry) = entries.next_entry().await? {
                let path = entry.path();
                let meta = entry.metadata().await?;

                if meta.is_dir() {
                    stack.push(path);
                } else if meta.is_file() {
                    if entry.file_name().to_string_lossy().starts_with(TMP_PREFIX) {
                        continue;
                    }
                    if let Ok(relative) = path.strip_prefix(&self.base_path) {
                        let pathname = relative
                            .components()
                            .map(|c| c.as_os_str().to_string_lossy())
                            .collect::<Vec<_>>()
                            .join("/");
                        let url = format!("{}/{}", self.public_url, encode_pathname(&pathname));
                        records.push(FileRecord::new(url, pathname));
                    }
                }
            }
        }

        records.sort_by(|a, b| a.pathname.cmp(&b.pathname));
        Ok(records)
    }
}
