use anyhow::bail;
use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::naming;
use crate::record::FileRecord;

/// Cache lifetime applied when a put does not ask for one: 30 days.
pub const DEFAULT_CACHE_MAX_AGE_SECS: u64 = 30 * 24 * 60 * 60;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Access {
    #[default]
    Public,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PutOptions {
    pub access: Access,
    /// Insert a random token before the extension so the pathname is unique.
    pub add_random_suffix: bool,
    pub cache_control_max_age: Option<u64>,
}

impl PutOptions {
    pub fn public() -> Self {
        Self::default()
    }

    pub fn with_random_suffix(mut self) -> Self {
        self.add_random_suffix = true;
        self
    }

    pub fn with_cache_control_max_age(mut self, secs: Option<u64>) -> Self {
        self.cache_control_max_age = secs;
        self
    }

    pub fn cache_control(&self) -> String {
        format!(
            "public, max-age={}",
            self.cache_control_max_age.unwrap_or(DEFAULT_CACHE_MAX_AGE_SECS)
        )
    }
}

/// Trait implemented by all blob store adapters.
///
/// A store is an opaque key-addressed object store: it assigns the url and
/// final pathname of every object it accepts. Deleting an object that does
/// not exist is not an error.
#[async_trait::async_trait]
pub trait BlobStore: Send + Sync {
    /// Store `content` under `pathname` and describe the new object.
    async fn put(&self, pathname: &str, content: Bytes, options: &PutOptions) -> anyhow::Result<FileRecord>;

    /// Retrieve the full content of the object at `url`.
    async fn fetch(&self, url: &str) -> anyhow::Result<Bytes>;

    /// Remove the object at `url`.
    async fn del(&self, url: &str) -> anyhow::Result<()>;

    /// Every object currently held, in store order.
    async fn list(&self) -> anyhow::Result<Vec<FileRecord>>;
}

/// Pick the final pathname for a put.
///
/// With a random suffix the name is always decorated; without one a taken
/// name is refused rather than overwritten.
pub fn choose_pathname(
    requested: &str,
    options: &PutOptions,
    exists: impl Fn(&str) -> bool,
) -> anyhow::Result<String> {
    let name = naming::normalize_pathname(requested)?;
    if options.add_random_suffix {
        loop {
            let candidate = naming::with_random_suffix(&name);
            if !exists(&candidate) {
                return Ok(candidate);
            }
        }
    }
    if exists(&name) {
        bail!("blob already exists: {}", name);
    }
    Ok(name)
}

/// Percent-encode each segment of a pathname, keeping the separators.
pub fn encode_pathname(pathname: &str) -> String {
    pathname
        .split('/')
        .map(|s| urlencoding::encode(s).into_owned())
        .collect::<Vec<_>>()
        .join("/")
}

/// Inverse of [`encode_pathname`] for a url under `base_url`.
pub fn pathname_under(base_url: &str, url: &str) -> Option<String> {
    let base = base_url.trim_end_matches('/');
    let rest = url.strip_prefix(base)?.strip_prefix('/')?;
    let rest = rest.split(['?', '#']).next().unwrap_or(rest);
    if rest.is_empty() {
        return None;
    }
    let decoded: Result<Vec<String>, _> = rest
        .split('/')
        .map(|s| urlencoding::decode(s).map(|c| c.into_owned()))
        .collect();
    decoded.ok().map(|parts| parts.join("/"))
}
