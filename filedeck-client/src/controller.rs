//! Client-side mirror of the server's file list.
//!
//! The local list is a cache. Every successful mutation is applied locally
//! and then reconciled against a fresh list from the server; a failed
//! reconcile keeps the optimistic list and marks it stale.
//!
//! Each mutation clears the previous error when it starts and raises an
//! in-flight flag that is lowered when the server call ends, even if the
//! caller drops the future part way through.

use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use bytes::Bytes;
use tracing::{debug, warn};

use filedeck_common::record::{FileRecord, MAX_UPLOAD_BYTES};

use crate::api::ClientError;

/// File operations the controller needs from a server.
#[async_trait]
pub trait FileApi: Send + Sync {
    async fn list(&self) -> Result<Vec<FileRecord>, ClientError>;
    async fn upload(&self, file_name: &str, content: Bytes) -> Result<FileRecord, ClientError>;
    async fn rename(&self, url: &str, new_name: &str) -> Result<FileRecord, ClientError>;
    async fn delete(&self, url: &str) -> Result<(), ClientError>;
}

#[derive(Debug, Default)]
struct ListState {
    files: Vec<FileRecord>,
    /// In-flight call counts. Uploads never exceed one.
    uploads: usize,
    renames: usize,
    deletes: usize,
    stale: bool,
    last_error: Option<String>,
}

type Counter = fn(&mut ListState) -> &mut usize;

/// Holds one in-flight count up until dropped.
struct InFlight<'a> {
    state: &'a Mutex<ListState>,
    counter: Counter,
}

impl<'a> InFlight<'a> {
    /// Start a mutation: bump `counter` and forget the previous error.
    fn start(lock: &'a Mutex<ListState>, state: &mut ListState, counter: Counter) -> Self {
        *counter(state) += 1;
        state.last_error = None;
        Self { state: lock, counter }
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        let mut state = lock(self.state);
        let count = (self.counter)(&mut state);
        *count = count.saturating_sub(1);
    }
}

pub struct FileListController<A> {
    api: A,
    state: Mutex<ListState>,
}

impl<A: FileApi> FileListController<A> {
    pub fn new(api: A) -> Self {
        Self {
            api,
            state: Mutex::new(ListState::default()),
        }
    }

    pub fn api(&self) -> &A {
        &self.api
    }

    pub fn files(&self) -> Vec<FileRecord> {
        self.state().files.clone()
    }

    pub fn is_uploading(&self) -> bool {
        self.state().uploads > 0
    }

    pub fn is_renaming(&self) -> bool {
        self.state().renames > 0
    }

    pub fn is_deleting(&self) -> bool {
        self.state().deletes > 0
    }

    /// True when the last reconcile with the server failed.
    pub fn is_stale(&self) -> bool {
        self.state().stale
    }

    pub fn last_error(&self) -> Option<String> {
        self.state().last_error.clone()
    }

    pub fn clear_error(&self) {
        self.state().last_error = None;
    }

    /// Replace the local list with the server's.
    pub async fn refresh(&self) -> Result<(), ClientError> {
        match self.api.list().await {
            Ok(files) => {
                let mut state = self.state();
                debug!(count = files.len(), "File list refreshed");
                state.files = files;
                state.stale = false;
                Ok(())
            }
            Err(e) => {
                let mut state = self.state();
                state.stale = true;
                Err(record_error(&mut state, e))
            }
        }
    }

    /// Upload one file. Oversized content is refused without contacting the server.
    pub async fn upload(&self, file_name: &str, content: Bytes) -> Result<FileRecord, ClientError> {
        let size = content.len() as u64;
        let in_flight = {
            let mut state = self.state();
            if size > MAX_UPLOAD_BYTES {
                return Err(record_error(&mut state, ClientError::FileTooLarge { size }));
            }
            if state.uploads > 0 {
                return Err(record_error(&mut state, ClientError::UploadInProgress));
            }
            InFlight::start(&self.state, &mut state, |s| &mut s.uploads)
        };

        let result = self.api.upload(file_name, content).await;
        drop(in_flight);

        let record = {
            let mut state = self.state();
            match result {
                Ok(record) => {
                    state.files.push(record.clone());
                    record
                }
                Err(e) => return Err(record_error(&mut state, e)),
            }
        };
        self.reconcile().await;
        Ok(record)
    }

    /// Rename the file at `url`. The old entry is replaced, never merged.
    pub async fn rename(&self, url: &str, new_name: &str) -> Result<FileRecord, ClientError> {
        let in_flight = InFlight::start(&self.state, &mut self.state(), |s| &mut s.renames);
        let result = self.api.rename(url, new_name).await;
        drop(in_flight);

        let record = match result {
            Ok(record) => record,
            Err(e) => return Err(record_error(&mut self.state(), e)),
        };
        {
            let mut state = self.state();
            match state.files.iter_mut().find(|f| f.url == url) {
                Some(entry) => *entry = record.clone(),
                None => state.files.push(record.clone()),
            }
        }
        self.reconcile().await;
        Ok(record)
    }

    pub async fn delete(&self, url: &str) -> Result<(), ClientError> {
        let in_flight = InFlight::start(&self.state, &mut self.state(), |s| &mut s.deletes);
        let result = self.api.delete(url).await;
        drop(in_flight);

        if let Err(e) = result {
            return Err(record_error(&mut self.state(), e));
        }
        self.state().files.retain(|f| f.url != url);
        self.reconcile().await;
        Ok(())
    }

    async fn reconcile(&self) {
        match self.api.list().await {
            Ok(files) => {
                let mut state = self.state();
                state.files = files;
                state.stale = false;
            }
            Err(e) => {
                warn!(error = %e, "File list reconcile failed, keeping local list");
                let mut state = self.state();
                state.stale = true;
                state.last_error = Some(format!("Could not refresh file list: {}", e));
            }
        }
    }

    fn state(&self) -> MutexGuard<'_, ListState> {
        lock(&self.state)
    }
}

fn lock(state: &Mutex<ListState>) -> MutexGuard<'_, ListState> {
    state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn record_error(state: &mut ListState, e: ClientError) -> ClientError {
    state.last_error = Some(e.to_string());
    e
}
