//! S3-compatible blob store.
//!
//! Handles AWS S3 and S3-compatible services (MinIO, B2, R2). Uses reqwest
//! with manual AWS Signature V4 signing so no SDK dependency is needed.
//! Objects are written `public-read`; their url is the public base url
//! (or the endpoint) followed by the encoded key.

use std::collections::BTreeMap;

use anyhow::{bail, Context};
use async_trait::async_trait;
use bytes::Bytes;
use chrono::Utc;
use hmac::{Hmac, Mac};
use reqwest::{Client, Method, Response, Url};
use sha2::{Digest, Sha256};
use tracing::debug;

use filedeck_common::backend::{choose_pathname, encode_pathname, pathname_under, BlobStore, PutOptions};
use filedeck_common::naming;
use filedeck_common::record::FileRecord;

type HmacSha256 = Hmac<Sha256>;

#[derive(Clone)]
pub struct S3Config {
    pub bucket: String,
    pub prefix: String,
    pub region: String,
    pub endpoint: Option<String>, // Custom endpoint for S3-compatible APIs
    /// Base url objects are publicly served from (CDN or bucket website).
    pub public_url: Option<String>,
    pub access_key_id: String,
    pub secret_access_key: String,
}

pub struct S3BlobStore {
    config: S3Config,
    client: Client,
}

impl S3BlobStore {
    pub fn new(config: S3Config) -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(300))
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self { config, client })
    }

    fn endpoint(&self) -> String {
        match &self.config.endpoint {
            Some(ep) => ep.trim_end_matches('/').to_string(),
            None => format!(
                "https://s3.{}.amazonaws.com/{}",
                self.config.region, self.config.bucket
            ),
        }
    }

    fn public_base(&self) -> String {
        self.config
            .public_url
            .as_deref()
            .map(|u| u.trim_end_matches('/').to_string())
            .unwrap_or_else(|| self.endpoint())
    }

    fn object_key(&self, pathname: &str) -> String {
        let prefix = self.config.prefix.trim_matches('/');
        if prefix.is_empty() {
            pathname.to_string()
        } else {
            format!("{}/{}", prefix, pathname)
        }
    }

    fn pathname_of(&self, key: &str) -> String {
        let prefix = self.config.prefix.trim_matches('/');
        if prefix.is_empty() {
            return key.to_string();
        }
        key.strip_prefix(prefix)
            .and_then(|rest| rest.strip_prefix('/'))
            .unwrap_or(key)
            .to_string()
    }

    fn public_url_for(&self, key: &str) -> String {
        format!("{}/{}", self.public_base(), encode_pathname(key))
    }

    /// Object key for a url handed out by this store.
    fn key_from_url(&self, url: &str) -> anyhow::Result<String> {
        let key = pathname_under(&self.public_base(), url)
            .or_else(|| pathname_under(&self.endpoint(), url))
            .with_context(|| format!("url is not served by this store: {}", url))?;
        naming::normalize_pathname(&key)
    }

    /// Path of the bucket root on the endpoint ("" for virtual-hosted style).
    fn bucket_path(&self) -> anyhow::Result<(String, String)> {
        let endpoint = self.endpoint();
        let parsed = Url::parse(&endpoint).with_context(|| format!("Invalid S3 endpoint {}", endpoint))?;
        let origin = parsed.origin().ascii_serialization();
        let path = parsed.path().trim_end_matches('/').to_string();
        Ok((origin, path))
    }

    /// Compute AWS Signature V4 for a request.
    fn sign(
        &self,
        method: &str,
        canonical_uri: &str,
        query: &str,
        headers: &BTreeMap<String, String>,
        body_hash: &str,
        date_time: &str,
        date: &str,
    ) -> String {
        let canonical_headers: String = headers
            .iter()
            .map(|(k, v)| format!("{}:{}\n", k, v.trim()))
            .collect();
        let signed_headers: String = headers.keys().cloned().collect::<Vec<_>>().join(";");

        let canonical_request = format!(
            "{}\n{}\n{}\n{}\n{}\n{}",
            method, canonical_uri, query, canonical_headers, signed_headers, body_hash
        );

        let cr_hash = hex::encode(Sha256::digest(canonical_request.as_bytes()));
        let credential_scope = format!("{}/{}/s3/aws4_request", date, self.config.region);
        let string_to_sign = format!(
            "AWS4-HMAC-SHA256\n{}\n{}\n{}",
            date_time, credential_scope, cr_hash
        );

        let signing_key = derive_signing_key(&self.config.secret_access_key, date, &self.config.region);
        let signature = hex::encode(hmac_sha256(&signing_key, string_to_sign.as_bytes()));

        format!(
            "AWS4-HMAC-SHA256 Credential={}/{},SignedHeaders={},Signature={}",
            self.config.access_key_id, credential_scope, signed_headers, signature
        )
    }

    /// Sign and send a request against `key` (or the bucket root when `None`).
    async fn send(
        &self,
        method: Method,
        key: Option<&str>,
        query: &str,
        mut headers: BTreeMap<String, String>,
        body: Bytes,
    ) -> anyhow::Result<Response> {
        let now = Utc::now();
        let date_time = now.format("%Y%m%dT%H%M%SZ").to_string();
        let date = now.format("%Y%m%d").to_string();

        let (origin, bucket_path) = self.bucket_path()?;
        let canonical_uri = match key {
            Some(key) => format!("{}/{}", bucket_path, encode_pathname(key)),
            None if bucket_path.is_empty() => "/".to_string(),
            None => bucket_path,
        };

        let payload_hash = body_hash(&body);
        headers.insert("host".to_string(), url_host(&origin));
        headers.insert("x-amz-content-sha256".to_string(), payload_hash.clone());
        headers.insert("x-amz-date".to_string(), date_time.clone());

        let auth = self.sign(method.as_str(), &canonical_uri, query, &headers, &payload_hash, &date_time, &date);

        let mut url = format!("{}{}", origin, canonical_uri);
        if !query.is_empty() {
            url.push('?');
            url.push_str(query);
        }

        let mut req = self.client.request(method, &url).header("Authorization", auth);
        for (name, value) in headers.iter().filter(|(name, _)| name.as_str() != "host") {
            req = req.header(name.as_str(), value.as_str());
        }
        Ok(req.body(body).send().await?)
    }

    async fn exists(&self, key: &str) -> anyhow::Result<bool> {
        let resp = self
            .send(Method::HEAD, Some(key), "", BTreeMap::new(), Bytes::new())
            .await
            .context("S3 HEAD request failed")?;
        match resp.status().as_u16() {
            200 => Ok(true),
            404 => Ok(false),
            status => bail!("S3 HEAD failed: HTTP {}", status),
        }
    }
}

fn derive_signing_key(secret: &str, date: &str, region: &str) -> Vec<u8> {
    let key = format!("AWS4{}", secret);
    let k_date = hmac_sha256(key.as_bytes(), date.as_bytes());
    let k_region = hmac_sha256(&k_date, region.as_bytes());
    let k_service = hmac_sha256(&k_region, b"s3");
    hmac_sha256(&k_service, b"aws4_request")
}

fn hmac_sha256(key: &[u8], data: &[u8]) -> Vec<u8> {
    let mut mac = HmacSha256::new_from_slice(key).expect("HMAC key length ok");
    mac.update(data);
    mac.finalize().into_bytes().to_vec()
}

fn body_hash(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}

async fn check_status(resp: Response, op: &str) -> anyhow::Result<Response> {
    if resp.status().is_success() {
        return Ok(resp);
    }
    let status = resp.status();
    let body = resp.text().await.unwrap_or_default();
    bail!("S3 {} failed: HTTP {} - {}", op, status, body)
}

#[async_trait]
impl BlobStore for S3BlobStore {
    async fn put(&self, pathname: &str, content: Bytes, options: &PutOptions) -> anyhow::Result<FileRecord> {
        let pathname = if options.add_random_suffix {
            choose_pathname(pathname, options, |_| false)?
        } else {
            let name = naming::normalize_pathname(pathname)?;
            if self.exists(&self.object_key(&name)).await? {
                bail!("blob already exists: {}", name);
            }
            name
        };
        let key = self.object_key(&pathname);
        let content_type = mime_guess::from_path(&pathname)
            .first_or_octet_stream()
            .essence_str()
            .to_string();

        let mut headers = BTreeMap::new();
        headers.insert("cache-control".to_string(), options.cache_control());
        headers.insert("content-type".to_string(), content_type);
        headers.insert("x-amz-acl".to_string(), "public-read".to_string());

        let size = content.len();
        let resp = self
            .send(Method::PUT, Some(&key), "", headers, content)
            .await
            .context("S3 PUT request failed")?;
        check_status(resp, "PUT").await?;

        debug!(key = %key, size, "S3 put complete");
        Ok(FileRecord::new(self.public_url_for(&key), pathname))
    }

    async fn fetch(&self, url: &str) -> anyhow::Result<Bytes> {
        let key = self.key_from_url(url)?;
        let resp = self
            .send(Method::GET, Some(&key), "", BTreeMap::new(), Bytes::new())
            .await
            .context("S3 GET request failed")?;
        let resp = check_status(resp, "GET").await?;
        resp.bytes().await.context("Failed to read S3 response body")
    }

    async fn del(&self, url: &str) -> anyhow::Result<()> {
        // Nothing this bucket owns lives at a foreign url.
        let key = match self.key_from_url(url) {
            Ok(key) => key,
            Err(e) => {
                debug!(url = %url, error = %e, "Ignoring delete of url outside bucket");
                return Ok(());
            }
        };
        let resp = self
            .send(Method::DELETE, Some(&key), "", BTreeMap::new(), Bytes::new())
            .await
            .context("S3 DELETE request failed")?;

        if resp.status().as_u16() != 404 {
            check_status(resp, "DELETE").await?;
        }

        debug!(key = %key, "S3 delete complete");
        Ok(())
    }

    async fn list(&self) -> anyhow::Result<Vec<FileRecord>> {
        let prefix = self.config.prefix.trim_matches('/');
        let prefix = if prefix.is_empty() { String::new() } else { format!("{}/", prefix) };

        let mut records = Vec::new();
        let mut continuation: Option<String> = None;
        loop {
            // Query parameters must be in sorted order for signing.
            let mut query = String::new();
            if let Some(token) = &continuation {
                query.push_str(&format!("continuation-token={}&", urlencoding::encode(token)));
            }
            query.push_str(&format!("list-type=2&prefix={}", urlencoding::encode(&prefix)));

            let resp = self
                .send(Method::GET, None, &query, BTreeMap::new(), Bytes::new())
                .await
                .context("S3 LIST request failed")?;
            let resp = check_status(resp, "LIST").await?;
            let body = resp.text().await.context("Failed to read S3 list response")?;

            for key in parse_list_keys(&body) {
                records.push(FileRecord::new(self.public_url_for(&key), self.pathname_of(&key)));
            }

            let truncated = xml_tag(&body, "IsTruncated").as_deref() == Some("true");
            continuation = xml_tag(&body, "NextContinuationToken");
            if !truncated || continuation.is_none() {
                break;
            }
        }

        Ok(records)
    }
}

/// Extract <Key>…</Key> values from S3 ListObjectsV2 XML response.
fn parse_list_keys(xml: &str) -> Vec<String> {
    let mut keys = Vec::new();
    let mut remaining = xml;
    while let Some(start) = remaining.find("<Key>") {
        remaining = &remaining[start + 5..];
        if let Some(end) = remaining.find("</Key>") {
            keys.push(unescape_xml(&remaining[..end]));
            remaining = &remaining[end + 6..];
        }
    }
    keys
}

/// Text of the first `<tag>` element.
fn xml_tag(xml: &str, tag: &str) -> Option<String> {
    let open = format!("<{}>", tag);
    let close = format!("</{}>", tag);
    let start = xml.find(&open)? + open.len();
    let end = xml[start..].find(&close)? + start;
    Some(unescape_xml(&xml[start..end]))
}

fn unescape_xml(text: &str) -> String {
    text.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}

/// Extract the host part from a URL for use in signing.
fn url_host(url: &str) -> String {
    let without_scheme = url
        .strip_prefix("https://")
        .or_else(|| url.strip_prefix("http://"))
        .unwrap_or(url);
    without_scheme.split('/').next().unwrap_or(without_scheme).to_string()
}
