//! In-process blob store.
//!
//! Keeps objects in insertion order behind a mutex. Backs the `memory`
//! storage backend and the test suites.

use std::sync::{Mutex, MutexGuard};

use anyhow::{anyhow, bail};
use async_trait::async_trait;
use bytes::Bytes;
use tracing::debug;

use filedeck_common::backend::{choose_pathname, encode_pathname, BlobStore, PutOptions};
use filedeck_common::record::FileRecord;

const DEFAULT_BASE_URL: &str = "https://blob.local";

struct StoredObject {
    record: FileRecord,
    content: Bytes,
    cache_control: String,
}

pub struct MemoryBlobStore {
    base_url: String,
    objects: Mutex<Vec<StoredObject>>,
}

impl Default for MemoryBlobStore {
    fn default() -> Self {
        Self::new(DEFAULT_BASE_URL)
    }
}

impl MemoryBlobStore {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            objects: Mutex::new(Vec::new()),
        }
    }

    pub fn len(&self) -> usize {
        self.catalog().map(|o| o.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Cache-Control value the object at `url` was stored with.
    pub fn cache_control(&self, url: &str) -> Option<String> {
        let objects = self.catalog().ok()?;
        objects
            .iter()
            .find(|o| o.record.url == url)
            .map(|o| o.cache_control.clone())
    }

    fn catalog(&self) -> anyhow::Result<MutexGuard<'_, Vec<StoredObject>>> {
        self.objects
            .lock()
            .map_err(|_| anyhow!("memory store lock poisoned"))
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn put(&self, pathname: &str, content: Bytes, options: &PutOptions) -> anyhow::Result<FileRecord> {
        let mut objects = self.catalog()?;
        let pathname = choose_pathname(pathname, options, |candidate| {
            objects.iter().any(|o| o.record.pathname == candidate)
        })?;
        let url = format!("{}/{}", self.base_url, encode_pathname(&pathname));
        let record = FileRecord::new(url, pathname);

        debug!(url = %record.url, size = content.len(), "Memory put complete");
        objects.push(StoredObject {
            record: record.clone(),
            content,
            cache_control: options.cache_control(),
        });
        Ok(record)
    }

    async fn fetch(&self, url: &str) -> anyhow::Result<Bytes> {
        let objects = self.catalog()?;
        match objects.iter().find(|o| o.record.url == url) {
            Some(o) => Ok(o.content.clone()),
            None => bail!("blob not found: {}", url),
        }
    }

    async fn del(&self, url: &str) -> anyhow::Result<()> {
        self.catalog()?.retain(|o| o.record.url != url);
        Ok(())
    }

    async fn list(&self) -> anyhow::Result<Vec<FileRecord>> {
        Ok(self.catalog()?.iter().map(|o| o.record.clone()).collect())
    }
}
