use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use serde::Deserialize;

const DEFAULT_LISTEN_ADDR: &str = "0.0.0.0:3000";

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_listen_addr")]
    pub listen_addr: SocketAddr,
    #[serde(default)]
    pub storage: StorageConfig,
    /// Endpoint receiving upload start/success/fail notifications.
    #[serde(default)]
    pub notify_url: Option<String>,
    #[serde(default)]
    pub cache_control_max_age: Option<u64>,
    #[serde(default = "default_true")]
    pub facts_enabled: bool,
    #[serde(default)]
    pub cors_origins: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "backend", rename_all = "lowercase")]
pub enum StorageConfig {
    Memory {
        /// Url prefix the server's `/blobs` route is reachable under.
        #[serde(default)]
        base_url: Option<String>,
    },
    Directory {
        path: PathBuf,
        /// Url prefix the server's `/blobs` route is reachable under.
        #[serde(default)]
        public_url: Option<String>,
    },
    S3 {
        bucket: String,
        #[serde(default)]
        prefix: String,
        #[serde(default = "default_region")]
        region: String,
        #[serde(default)]
        endpoint: Option<String>,
        #[serde(default)]
        public_url: Option<String>,
    },
}

impl Default for StorageConfig {
    fn default() -> Self {
        StorageConfig::Memory { base_url: None }
    }
}

fn default_listen_addr() -> SocketAddr {
    DEFAULT_LISTEN_ADDR
        .parse()
        .unwrap_or_else(|_| SocketAddr::from(([0, 0, 0, 0], 3000)))
}

fn default_region() -> String {
    "us-east-1".to_string()
}

fn default_true() -> bool {
    true
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: default_listen_addr(),
            storage: StorageConfig::default(),
            notify_url: None,
            cache_control_max_age: None,
            facts_enabled: true,
            cors_origins: Vec::new(),
        }
    }
}

impl ServerConfig {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("Failed to read {}: {}", path.display(), e))?;
        let config: ServerConfig = toml::from_str(&content)
            .map_err(|e| anyhow::anyhow!("Failed to parse {}: {}", path.display(), e))?;
        config.validate()?;
        Ok(config)
    }

    /// Build a config from `FILEDECK_*` environment variables.
    pub fn from_env() -> anyhow::Result<Self> {
        let mut config = ServerConfig::default();

        if let Ok(addr) = std::env::var("FILEDECK_LISTEN_ADDR") {
            config.listen_addr = addr
                .parse()
                .map_err(|e| anyhow::anyhow!("Invalid FILEDECK_LISTEN_ADDR {:?}: {}", addr, e))?;
        }
        if let Ok(dir) = std::env::var("FILEDECK_STORAGE_DIR") {
            config.storage = StorageConfig::Directory {
                path: PathBuf::from(dir),
                public_url: std::env::var("FILEDECK_PUBLIC_URL").ok(),
            };
        } else if let Ok(bucket) = std::env::var("FILEDECK_S3_BUCKET") {
            config.storage = StorageConfig::S3 {
                bucket,
                prefix: std::env::var("FILEDECK_S3_PREFIX").unwrap_or_default(),
                region: std::env::var("AWS_REGION").unwrap_or_else(|_| default_region()),
                endpoint: std::env::var("FILEDECK_S3_ENDPOINT").ok(),
                public_url: std::env::var("FILEDECK_PUBLIC_URL").ok(),
            };
        } else {
            config.storage = StorageConfig::Memory {
                base_url: std::env::var("FILEDECK_PUBLIC_URL").ok(),
            };
        }
        config.notify_url = std::env::var("FILEDECK_NOTIFY_URL").ok();
        if let Ok(v) = std::env::var("FILEDECK_FACTS_ENABLED") {
            config.facts_enabled = v != "0" && !v.eq_ignore_ascii_case("false");
        }

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> anyhow::Result<()> {
        match &self.storage {
            StorageConfig::Memory { base_url } => {
                if let Some(url) = base_url {
                    require_http("storage.base_url", url)?;
                }
            }
            StorageConfig::Directory { path, public_url } => {
                if path.as_os_str().is_empty() {
                    anyhow::bail!("storage.path must not be empty");
                }
                if let Some(url) = public_url {
                    require_http("storage.public_url", url)?;
                }
            }
            StorageConfig::S3 { bucket, endpoint, public_url, .. } => {
                if bucket.is_empty() {
                    anyhow::bail!("storage.bucket must not be empty");
                }
                if let Some(url) = endpoint {
                    require_http("storage.endpoint", url)?;
                }
                if let Some(url) = public_url {
                    require_http("storage.public_url", url)?;
                }
            }
        }
        if let Some(url) = &self.notify_url {
            require_http("notify_url", url)?;
        }
        for origin in self.cors_origins.iter().filter(|o| o.as_str() != "*") {
            require_http("cors_origins", origin)?;
        }
        Ok(())
    }

    /// Public url of the `/blobs` route when the server hosts the objects.
    pub fn default_blob_url(&self) -> String {
        format!("http://localhost:{}/blobs", self.listen_addr.port())
    }
}

fn require_http(field: &str, url: &str) -> anyhow::Result<()> {
    if !(url.starts_with("http://") || url.starts_with("https://")) {
        anyhow::bail!("{} must be an http(s) url: {}", field, url);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_to_memory_store() {
        let config: ServerConfig = toml::from_str("").unwrap();
        config.validate().unwrap();
        assert_eq!(config.listen_addr.port(), 3000);
        assert!(config.facts_enabled);
        assert!(matches!(config.storage, StorageConfig::Memory { .. }));
    }

    #[test]
    fn test_memory_base_url_follows_listen_addr() {
        let config: ServerConfig = toml::from_str(r#"listen_addr = "127.0.0.1:8080""#).unwrap();
        config.validate().unwrap();
        assert_eq!(config.storage, StorageConfig::Memory { base_url: None });
        assert_eq!(config.default_blob_url(), "http://localhost:8080/blobs");

        let toml_str = r#"
[storage]
backend = "memory"
base_url = "ftp://files.example.com"
"#;
        let config: ServerConfig = toml::from_str(toml_str).unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_parse_directory_backend() {
        let toml_str = r#"
listen_addr = "127.0.0.1:8080"
notify_url = "https://jsonplaceholder.typicode.com/posts"
cache_control_max_age = 3600

[storage]
backend = "directory"
path = "/var/lib/filedeck/blobs"
public_url = "https://files.example.com/blobs"
"#;
        let config: ServerConfig = toml::from_str(toml_str).unwrap();
        config.validate().unwrap();
        assert_eq!(config.cache_control_max_age, Some(3600));
        assert_eq!(
            config.storage,
            StorageConfig::Directory {
                path: PathBuf::from("/var/lib/filedeck/blobs"),
                public_url: Some("https://files.example.com/blobs".to_string()),
            }
        );
        assert_eq!(config.default_blob_url(), "http://localhost:8080/blobs");
    }

    #[test]
    fn test_parse_s3_backend() {
        let toml_str = r#"
[storage]
backend = "s3"
bucket = "uploads"
endpoint = "http://localhost:9000/uploads"
"#;
        let config: ServerConfig = toml::from_str(toml_str).unwrap();
        config.validate().unwrap();
        match config.storage {
            StorageConfig::S3 { bucket, region, prefix, .. } => {
                assert_eq!(bucket, "uploads");
                assert_eq!(region, "us-east-1");
                assert!(prefix.is_empty());
            }
            other => panic!("unexpected storage: {:?}", other),
        }
    }

    #[test]
    fn test_empty_bucket_rejected() {
        let toml_str = r#"
[storage]
backend = "s3"
bucket = ""
"#;
        let config: ServerConfig = toml::from_str(toml_str).unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_non_http_notify_url_rejected() {
        let config: ServerConfig = toml::from_str(r#"notify_url = "ftp://example.com""#).unwrap();
        assert!(config.validate().is_err());
    }
}
