//! File record lifecycle: upload, rename, delete and list against a blob store.

use std::sync::Arc;

use bytes::Bytes;
use tracing::{error, info, warn};

use filedeck_common::backend::{BlobStore, PutOptions};
use filedeck_common::naming;
use filedeck_common::record::{FileRecord, MAX_UPLOAD_BYTES};

use crate::events::{EventBus, UploadEvent};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FileError {
    #[error("No file uploaded")]
    NoFileProvided,
    #[error("File size exceeds 5MB limit")]
    FileTooLarge { size: u64 },
    #[error("Failed to upload file")]
    UploadFailed,
    #[error("Invalid file name: {0}")]
    InvalidName(String),
    #[error("Failed to fetch original file: {0}")]
    SourceFetchFailed(String),
    #[error("Failed to rename file: {0}")]
    RenameFailed(String),
    #[error("Failed to delete file: {0}")]
    DeleteFailed(String),
    #[error("Failed to list files")]
    ListFailed,
}

impl FileError {
    pub fn code(&self) -> &'static str {
        match self {
            FileError::NoFileProvided => "no_file_provided",
            FileError::FileTooLarge { .. } => "file_too_large",
            FileError::UploadFailed => "upload_failed",
            FileError::InvalidName(_) => "invalid_name",
            FileError::SourceFetchFailed(_) => "source_fetch_failed",
            FileError::RenameFailed(_) => "rename_failed",
            FileError::DeleteFailed(_) => "delete_failed",
            FileError::ListFailed => "list_failed",
        }
    }
}

/// An uploaded payload as received from the client.
#[derive(Debug, Clone)]
pub struct IncomingFile {
    pub file_name: String,
    pub content: Bytes,
}

impl IncomingFile {
    pub fn new(file_name: impl Into<String>, content: impl Into<Bytes>) -> Self {
        Self {
            file_name: file_name.into(),
            content: content.into(),
        }
    }

    pub fn size(&self) -> u64 {
        self.content.len() as u64
    }
}

/// Result of a rename. `orphaned_url` is set when the old object survived.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Renamed {
    pub record: FileRecord,
    pub orphaned_url: Option<String>,
}

#[derive(Clone)]
pub struct FileService {
    store: Arc<dyn BlobStore>,
    events: EventBus,
    cache_control_max_age: Option<u64>,
}

impl FileService {
    pub fn new(store: Arc<dyn BlobStore>) -> Self {
        Self {
            store,
            events: EventBus::new(),
            cache_control_max_age: None,
        }
    }

    pub fn with_events(mut self, events: EventBus) -> Self {
        self.events = events;
        self
    }

    pub fn with_cache_control_max_age(mut self, secs: Option<u64>) -> Self {
        self.cache_control_max_age = secs;
        self
    }

    pub fn store(&self) -> &Arc<dyn BlobStore> {
        &self.store
    }

    fn put_options(&self) -> PutOptions {
        PutOptions::public()
            .with_random_suffix()
            .with_cache_control_max_age(self.cache_control_max_age)
    }

    /// Store a new file. Size and presence are checked before the store is touched.
    pub async fn upload(&self, file: Option<IncomingFile>) -> Result<FileRecord, FileError> {
        let file = match file {
            Some(f) if !f.file_name.trim().is_empty() => f,
            _ => return Err(FileError::NoFileProvided),
        };
        let size = file.size();
        if size > MAX_UPLOAD_BYTES {
            info!(file_name = %file.file_name, size, "Rejected oversized upload");
            return Err(FileError::FileTooLarge { size });
        }

        self.events.emit(UploadEvent::Started {
            file_name: file.file_name.clone(),
        });

        match self.store.put(&file.file_name, file.content, &self.put_options()).await {
            Ok(record) => {
                info!(url = %record.url, pathname = %record.pathname, size, "File uploaded");
                self.events.emit(UploadEvent::Succeeded {
                    url: record.url.clone(),
                });
                Ok(record)
            }
            Err(e) => {
                error!(file_name = %file.file_name, error = %e, "Error uploading file");
                self.events.emit(UploadEvent::Failed {
                    message: e.to_string(),
                });
                Err(FileError::UploadFailed)
            }
        }
    }

    /// Copy the object at `existing_url` under `new_name`, then delete the original.
    ///
    /// The original is only removed once the copy is stored. A failed removal
    /// leaves the original in place and is reported through `orphaned_url`.
    pub async fn rename(&self, existing_url: &str, new_name: &str) -> Result<Renamed, FileError> {
        let new_name = new_name.trim();
        if new_name.is_empty() {
            return Err(FileError::InvalidName("new name must not be empty".to_string()));
        }

        let content = self.store.fetch(existing_url).await.map_err(|e| {
            warn!(url = %existing_url, error = %e, "Error fetching file to rename");
            FileError::SourceFetchFailed(e.to_string())
        })?;

        let old_pathname = naming::pathname_from_url(existing_url).unwrap_or_default();
        let target = naming::resolve_rename_target(&old_pathname, new_name);

        let record = self
            .store
            .put(&target, content, &self.put_options())
            .await
            .map_err(|e| {
                error!(url = %existing_url, target = %target, error = %e, "Error renaming file");
                FileError::RenameFailed(e.to_string())
            })?;

        let orphaned_url = match self.store.del(existing_url).await {
            Ok(()) => None,
            Err(e) => {
                warn!(
                    url = %existing_url,
                    new_url = %record.url,
                    error = %e,
                    "Renamed copy stored but original could not be deleted"
                );
                Some(existing_url.to_string())
            }
        };

        info!(from = %existing_url, to = %record.url, "File renamed");
        Ok(Renamed { record, orphaned_url })
    }

    /// Remove the object at `url`. Unknown urls are not an error.
    pub async fn delete(&self, url: &str) -> Result<(), FileError> {
        self.store.del(url).await.map_err(|e| {
            error!(url = %url, error = %e, "Error deleting file");
            FileError::DeleteFailed(e.to_string())
        })?;
        info!(url = %url, "File deleted");
        Ok(())
    }

    pub async fn list(&self) -> Result<Vec<FileRecord>, FileError> {
        self.store.list().await.map_err(|e| {
            error!(error = %e, "Error listing files");
            FileError::ListFailed
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    use anyhow::bail;
    use async_trait::async_trait;
    use tokio::sync::mpsc;

    use super::*;
    use crate::events::UploadObserver;
    use crate::store::memory::MemoryBlobStore;

    /// Memory store that counts mutations and can be told to fail.
    #[derive(Default)]
    struct SpyStore {
        inner: MemoryBlobStore,
        puts: AtomicUsize,
        dels: AtomicUsize,
        fail_put: AtomicBool,
        fail_del: AtomicBool,
    }

    impl SpyStore {
        fn mutations(&self) -> usize {
            self.puts.load(Ordering::SeqCst) + self.dels.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl BlobStore for SpyStore {
        async fn put(&self, pathname: &str, content: Bytes, options: &PutOptions) -> anyhow::Result<FileRecord> {
            self.puts.fetch_add(1, Ordering::SeqCst);
            if self.fail_put.load(Ordering::SeqCst) {
                bail!("store unavailable");
            }
            self.inner.put(pathname, content, options).await
        }

        async fn fetch(&self, url: &str) -> anyhow::Result<Bytes> {
            self.inner.fetch(url).await
        }

        async fn del(&self, url: &str) -> anyhow::Result<()> {
            self.dels.fetch_add(1, Ordering::SeqCst);
            if self.fail_del.load(Ordering::SeqCst) {
                bail!("store unavailable");
            }
            self.inner.del(url).await
        }

        async fn list(&self) -> anyhow::Result<Vec<FileRecord>> {
            self.inner.list().await
        }
    }

    fn service() -> (FileService, Arc<SpyStore>) {
        let store = Arc::new(SpyStore::default());
        (FileService::new(store.clone()), store)
    }

    #[tokio::test]
    async fn test_oversized_upload_never_reaches_store() {
        let (svc, store) = service();
        let file = IncomingFile::new("a.jpg", vec![0u8; 6_291_456]);
        let err = svc.upload(Some(file)).await.unwrap_err();
        assert_eq!(err, FileError::FileTooLarge { size: 6_291_456 });
        assert_eq!(store.mutations(), 0);
        assert!(svc.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_upload_at_limit_is_accepted() {
        let (svc, _store) = service();
        let file = IncomingFile::new("max.bin", vec![1u8; MAX_UPLOAD_BYTES as usize]);
        assert!(svc.upload(Some(file)).await.is_ok());
    }

    #[tokio::test]
    async fn test_missing_file_rejected() {
        let (svc, store) = service();
        assert_eq!(svc.upload(None).await.unwrap_err(), FileError::NoFileProvided);
        let unnamed = IncomingFile::new("  ", Bytes::new());
        assert_eq!(svc.upload(Some(unnamed)).await.unwrap_err(), FileError::NoFileProvided);
        assert_eq!(store.mutations(), 0);
    }

    #[tokio::test]
    async fn test_upload_urls_are_distinct() {
        let (svc, _store) = service();
        let a = svc.upload(Some(IncomingFile::new("same.txt", "one"))).await.unwrap();
        let b = svc.upload(Some(IncomingFile::new("same.txt", "two"))).await.unwrap();
        assert_ne!(a.url, b.url);
        assert_eq!(svc.list().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_store_fault_surfaces_as_upload_failed() {
        let (svc, store) = service();
        store.fail_put.store(true, Ordering::SeqCst);
        let err = svc
            .upload(Some(IncomingFile::new("a.txt", "x")))
            .await
            .unwrap_err();
        assert_eq!(err, FileError::UploadFailed);
        assert_eq!(err.to_string(), "Failed to upload file");
    }

    #[tokio::test]
    async fn test_upload_then_delete_leaves_store_empty() {
        let (svc, _store) = service();
        let record = svc
            .upload(Some(IncomingFile::new("notes.txt", vec![b'n'; 1024])))
            .await
            .unwrap();

        let listed = svc.list().await.unwrap();
        assert_eq!(listed.len(), 1);
        assert!(listed[0].pathname.contains("notes"));

        svc.delete(&record.url).await.unwrap();
        assert!(svc.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_delete_missing_url_is_not_an_error() {
        let (svc, _store) = service();
        svc.delete("https://blob.local/never-stored.txt").await.unwrap();
    }

    #[tokio::test]
    async fn test_delete_fault_surfaces_as_delete_failed() {
        let (svc, store) = service();
        store.fail_del.store(true, Ordering::SeqCst);
        let err = svc.delete("https://blob.local/a.txt").await.unwrap_err();
        assert!(matches!(err, FileError::DeleteFailed(_)));
    }

    #[tokio::test]
    async fn test_rename_keeps_extension_and_replaces_object() {
        let (svc, store) = service();
        let original = svc
            .upload(Some(IncomingFile::new("draft.md", "# Draft")))
            .await
            .unwrap();

        let renamed = svc.rename(&original.url, "final").await.unwrap();
        assert!(renamed.record.pathname.starts_with("final"));
        assert!(renamed.record.pathname.ends_with(".md"));
        assert_eq!(renamed.orphaned_url, None);

        let listed = svc.list().await.unwrap();
        assert_eq!(listed, vec![renamed.record.clone()]);
        assert_eq!(store.fetch(&renamed.record.url).await.unwrap(), Bytes::from("# Draft"));
        assert!(store.fetch(&original.url).await.is_err());
    }

    #[tokio::test]
    async fn test_rename_explicit_extension_wins() {
        let (svc, store) = service();
        let record = store
            .put("report.pdf", Bytes::from("%PDF"), &PutOptions::public())
            .await
            .unwrap();

        let as_pdf = svc.rename(&record.url, "summary").await.unwrap();
        assert!(as_pdf.record.pathname.ends_with(".pdf"));

        let as_txt = svc.rename(&as_pdf.record.url, "summary.txt").await.unwrap();
        assert!(as_txt.record.pathname.ends_with(".txt"));
        assert_eq!(svc.list().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_rename_to_same_base_name_keeps_one_copy() {
        let (svc, _store) = service();
        let original = svc
            .upload(Some(IncomingFile::new("photo.png", vec![7u8; 64])))
            .await
            .unwrap();
        let renamed = svc.rename(&original.url, "photo").await.unwrap();

        let listed = svc.list().await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_ne!(listed[0].url, original.url);
        assert_eq!(listed[0], renamed.record);
    }

    #[tokio::test]
    async fn test_rename_of_missing_source_mutates_nothing() {
        let (svc, store) = service();
        let err = svc
            .rename("https://blob.local/gone.txt", "new")
            .await
            .unwrap_err();
        assert!(matches!(err, FileError::SourceFetchFailed(_)));
        assert_eq!(store.mutations(), 0);
    }

    #[tokio::test]
    async fn test_rename_put_failure_keeps_original() {
        let (svc, store) = service();
        let original = svc.upload(Some(IncomingFile::new("a.txt", "x"))).await.unwrap();
        store.fail_put.store(true, Ordering::SeqCst);

        let err = svc.rename(&original.url, "b").await.unwrap_err();
        assert!(matches!(err, FileError::RenameFailed(_)));
        assert_eq!(store.dels.load(Ordering::SeqCst), 0);
        assert_eq!(svc.list().await.unwrap(), vec![original]);
    }

    #[tokio::test]
    async fn test_rename_tolerates_failed_cleanup() {
        let (svc, store) = service();
        let original = svc.upload(Some(IncomingFile::new("a.txt", "x"))).await.unwrap();
        store.fail_del.store(true, Ordering::SeqCst);

        let renamed = svc.rename(&original.url, "b").await.unwrap();
        assert_eq!(renamed.orphaned_url.as_deref(), Some(original.url.as_str()));
        assert_eq!(svc.list().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_blank_rename_rejected_before_store() {
        let (svc, store) = service();
        let err = svc.rename("https://blob.local/a.txt", "   ").await.unwrap_err();
        assert!(matches!(err, FileError::InvalidName(_)));
        assert_eq!(store.mutations(), 0);
    }

    struct RecordingObserver(mpsc::UnboundedSender<UploadEvent>);

    #[async_trait]
    impl UploadObserver for RecordingObserver {
        async fn notify(&self, event: &UploadEvent) -> anyhow::Result<()> {
            self.0.send(event.clone())?;
            bail!("notification endpoint down")
        }
    }

    #[tokio::test]
    async fn test_failing_observer_does_not_change_outcome() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut events = EventBus::new();
        events.subscribe(Arc::new(RecordingObserver(tx)));
        let svc = FileService::new(Arc::new(SpyStore::default())).with_events(events);

        let record = svc.upload(Some(IncomingFile::new("a.txt", "x"))).await.unwrap();

        assert_eq!(rx.recv().await.unwrap(), UploadEvent::Started { file_name: "a.txt".into() });
        assert_eq!(rx.recv().await.unwrap(), UploadEvent::Succeeded { url: record.url });
    }
}
