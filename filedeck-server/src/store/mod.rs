pub mod directory;
pub mod memory;
pub mod s3;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::bail;
use filedeck_common::backend::BlobStore;
use tracing::info;

use crate::config::{ServerConfig, StorageConfig};

use self::directory::DirectoryBlobStore;
use self::memory::MemoryBlobStore;
use self::s3::{S3BlobStore, S3Config};

/// Objects the server itself serves under `/blobs`.
#[derive(Clone)]
pub enum HostedBlobs {
    Directory(PathBuf),
    Memory { base_url: String },
}

/// Construct the configured blob store.
///
/// S3 credentials are read from `AWS_ACCESS_KEY_ID` / `AWS_SECRET_ACCESS_KEY`.
pub fn from_config(config: &ServerConfig) -> anyhow::Result<(Arc<dyn BlobStore>, Option<HostedBlobs>)> {
    match &config.storage {
        StorageConfig::Memory { base_url } => {
            let base_url = base_url.clone().unwrap_or_else(|| config.default_blob_url());
            info!(base_url = %base_url, "Using in-memory blob store");
            Ok((
                Arc::new(MemoryBlobStore::new(base_url.clone())),
                Some(HostedBlobs::Memory { base_url }),
            ))
        }
        StorageConfig::Directory { path, public_url } => {
            let public_url = public_url.clone().unwrap_or_else(|| config.default_blob_url());
            std::fs::create_dir_all(path)?;
            info!(path = %path.display(), public_url = %public_url, "Using directory blob store");
            Ok((
                Arc::new(DirectoryBlobStore::new(path.clone(), public_url)),
                Some(HostedBlobs::Directory(path.clone())),
            ))
        }
        StorageConfig::S3 { bucket, prefix, region, endpoint, public_url } => {
            let access_key_id = std::env::var("AWS_ACCESS_KEY_ID").unwrap_or_default();
            let secret_access_key = std::env::var("AWS_SECRET_ACCESS_KEY").unwrap_or_default();
            if access_key_id.is_empty() || secret_access_key.is_empty() {
                bail!("S3 credentials not found for bucket '{}'", bucket);
            }

            info!(bucket = %bucket, region = %region, "Using S3 blob store");
            let store = S3BlobStore::new(S3Config {
                bucket: bucket.clone(),
                prefix: prefix.clone(),
                region: region.clone(),
                endpoint: endpoint.clone(),
                public_url: public_url.clone(),
                access_key_id,
                secret_access_key,
            })?;
            Ok((Arc::new(store), None))
        }
    }
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;
    use filedeck_common::backend::PutOptions;

    use super::*;

    #[tokio::test]
    async fn test_memory_urls_use_listen_port() {
        let config: ServerConfig = toml::from_str(r#"listen_addr = "127.0.0.1:8080""#).unwrap();
        let (store, hosted) = from_config(&config).unwrap();

        let record = store
            .put("notes.txt", Bytes::from("hi"), &PutOptions::public())
            .await
            .unwrap();
        assert_eq!(record.url, "http://localhost:8080/blobs/notes.txt");
        match hosted {
            Some(HostedBlobs::Memory { base_url }) => assert_eq!(base_url, "http://localhost:8080/blobs"),
            _ => panic!("expected hosted memory blobs"),
        }
    }

    #[tokio::test]
    async fn test_memory_explicit_base_url_wins() {
        let toml_str = r#"
listen_addr = "127.0.0.1:8080"

[storage]
backend = "memory"
base_url = "https://files.example.com/blobs"
"#;
        let config: ServerConfig = toml::from_str(toml_str).unwrap();
        let (store, _) = from_config(&config).unwrap();
        let record = store
            .put("a.txt", Bytes::new(), &PutOptions::public())
            .await
            .unwrap();
        assert_eq!(record.url, "https://files.example.com/blobs/a.txt");
    }
}
