//! HTTP client for the filedeck server API.

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, Response};
use serde::de::DeserializeOwned;
use tracing::debug;

use filedeck_common::facts::FactKind;
use filedeck_common::record::{
    ErrorBody, FactResponse, FileListResponse, FileRecord, FileView, RenameRequest, RenameResponse,
};

use crate::controller::FileApi;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Errors surfaced to client callers.
///
/// `Display` is the message shown to a user.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("Could not reach the server: {0}")]
    Connection(String),

    /// Error body returned by the server.
    #[error("{message}")]
    Api {
        status: u16,
        code: Option<String>,
        message: String,
    },

    #[error("Unexpected response from the server: {0}")]
    Decode(String),

    #[error("File size exceeds 5MB limit")]
    FileTooLarge { size: u64 },

    #[error("An upload is already in progress")]
    UploadInProgress,

    #[error("configuration error: {0}")]
    Configuration(String),
}

impl ClientError {
    /// Server error code, when the server sent one.
    pub fn api_code(&self) -> Option<&str> {
        match self {
            Self::Api { code, .. } => code.as_deref(),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for ClientError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            ClientError::Decode(e.to_string())
        } else {
            ClientError::Connection(e.to_string())
        }
    }
}

#[derive(Debug, Clone)]
pub struct ApiClient {
    client: Client,
    base_url: String,
}

impl ApiClient {
    pub fn new(base_url: impl Into<String>) -> Result<Self, ClientError> {
        let client = Client::builder()
            .timeout(DEFAULT_TIMEOUT)
            .build()
            .map_err(|e| ClientError::Configuration(e.to_string()))?;
        Ok(Self::with_client(base_url, client))
    }

    /// Use a preconfigured reqwest client.
    pub fn with_client(base_url: impl Into<String>, client: Client) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// List files with their preview and download metadata.
    pub async fn list_views(&self) -> Result<Vec<FileView>, ClientError> {
        let resp = self.client.get(self.endpoint("/api/files")).send().await?;
        let body: FileListResponse = decode(resp).await?;
        Ok(body.items)
    }

    /// Upload through `POST /api/files`, which answers with the stored record.
    pub async fn upload_file(&self, file_name: &str, content: Bytes) -> Result<FileRecord, ClientError> {
        let mime = mime_guess::from_path(file_name).first_or_octet_stream();
        let part = Part::bytes(content.to_vec())
            .file_name(file_name.to_string())
            .mime_str(mime.essence_str())
            .map_err(|e| ClientError::Configuration(e.to_string()))?;
        let form = Form::new().part("file", part);

        let resp = self
            .client
            .post(self.endpoint("/api/files"))
            .multipart(form)
            .send()
            .await?;
        let record: FileRecord = decode(resp).await?;
        debug!(url = %record.url, pathname = %record.pathname, "Upload accepted");
        Ok(record)
    }

    pub async fn rename_file(&self, url: &str, new_name: &str) -> Result<RenameResponse, ClientError> {
        let resp = self
            .client
            .post(self.endpoint("/api/files/rename"))
            .json(&RenameRequest {
                url: url.to_string(),
                name: new_name.to_string(),
            })
            .send()
            .await?;
        decode(resp).await
    }

    pub async fn delete_file(&self, url: &str) -> Result<(), ClientError> {
        let resp = self
            .client
            .delete(self.endpoint(&format!("/api/files?url={}", urlencoding::encode(url))))
            .send()
            .await?;
        let _: serde_json::Value = decode(resp).await?;
        Ok(())
    }

    pub async fn fact(&self, kind: FactKind) -> Result<FactResponse, ClientError> {
        let resp = self
            .client
            .get(self.endpoint(&format!("/api/facts/{}", kind)))
            .send()
            .await?;
        decode(resp).await
    }
}

#[async_trait]
impl FileApi for ApiClient {
    async fn list(&self) -> Result<Vec<FileRecord>, ClientError> {
        Ok(self.list_views().await?.into_iter().map(FileRecord::from).collect())
    }

    async fn upload(&self, file_name: &str, content: Bytes) -> Result<FileRecord, ClientError> {
        self.upload_file(file_name, content).await
    }

    async fn rename(&self, url: &str, new_name: &str) -> Result<FileRecord, ClientError> {
        let renamed = self.rename_file(url, new_name).await?;
        if let Some(orphan) = &renamed.orphaned_url {
            tracing::warn!(url = %orphan, "Server kept the original after rename");
        }
        Ok(renamed.record)
    }

    async fn delete(&self, url: &str) -> Result<(), ClientError> {
        self.delete_file(url).await
    }
}

/// Decode a success body, or turn the server's error body into [`ClientError::Api`].
async fn decode<T: DeserializeOwned>(resp: Response) -> Result<T, ClientError> {
    let status = resp.status();
    if !status.is_success() {
        let text = resp.text().await.unwrap_or_default();
        return Err(match serde_json::from_str::<ErrorBody>(&text) {
            Ok(body) => ClientError::Api {
                status: status.as_u16(),
                code: body.code,
                message: body.error,
            },
            Err(_) => ClientError::Api {
                status: status.as_u16(),
                code: None,
                message: if text.is_empty() { status.to_string() } else { text },
            },
        });
    }
    resp.json::<T>()
        .await
        .map_err(|e| ClientError::Decode(e.to_string()))
}
