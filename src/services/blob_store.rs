use async_trait::async_trait;
use bytes::Bytes;
use percent_encoding::percent_decode_str;
use reqwest::header::CONTENT_DISPOSITION;
use reqwest::multipart::{Form, Part};
use std::time::Duration;
use thiserror::Error;
use url::Url;

use crate::services::staging::StagedUpload;

pub const PARAMETER_BLOB_KEY: &str = "blob_key";
pub const PARAMETER_BLOBSTORE: &str = "blobstore";

#[derive(Debug, Error)]
pub enum BlobStoreError {
    #[error("Invalid URL '{0}'")]
    InvalidUrl(String),

    #[error("URL '{0}' does not reference a blob")]
    NotABlobUrl(String),

    #[error("Request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Remote returned status {0}")]
    Status(u16),
}

/// A file downloaded from the blob store.
#[derive(Debug, Clone)]
pub struct RemoteFile {
    pub name: String,
    pub content: Bytes,
}

/// Remote storage behind external-reference fields. Committed files are
/// uploaded there and the record only keeps their download URL.
#[async_trait]
pub trait BlobStoreClient: Send + Sync {
    /// Stores the bytes and returns the download URL of the new blob.
    async fn upload(&self, upload: &StagedUpload) -> Result<String, BlobStoreError>;

    async fn delete(&self, url: &str) -> Result<(), BlobStoreError>;

    async fn fetch(&self, url: &str) -> Result<RemoteFile, BlobStoreError>;
}

/// Client of a blob store web service exposing
/// `POST {base}/blobs/{store}` (multipart `blob`, answers the blob key),
/// `GET {base}/download?blob_key=..&blobstore=..` and
/// `DELETE {base}/blobs/{store}/{key}`.
pub struct HttpBlobStoreClient {
    client: reqwest::Client,
    base_url: Url,
    blob_store: String,
}

impl HttpBlobStoreClient {
    pub fn new(base_url: &str, blob_store: &str, timeout: Duration) -> Result<Self, BlobStoreError> {
        let mut base_url =
            Url::parse(base_url).map_err(|_| BlobStoreError::InvalidUrl(base_url.to_string()))?;
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url,
            blob_store: blob_store.to_string(),
        })
    }

    fn endpoint(&self, path: &str) -> Result<Url, BlobStoreError> {
        self.base_url
            .join(path)
            .map_err(|_| BlobStoreError::InvalidUrl(format!("{}{}", self.base_url, path)))
    }

    /// Download URL of a blob, carrying its key and store as query parameters.
    pub fn file_url(&self, blob_key: &str) -> Result<String, BlobStoreError> {
        let mut url = self.endpoint("download")?;
        url.query_pairs_mut()
            .append_pair(PARAMETER_BLOB_KEY, blob_key)
            .append_pair(PARAMETER_BLOBSTORE, &self.blob_store);
        Ok(url.to_string())
    }
}

#[async_trait]
impl BlobStoreClient for HttpBlobStoreClient {
    async fn upload(&self, upload: &StagedUpload) -> Result<String, BlobStoreError> {
        let part = Part::bytes(upload.content().to_vec())
            .file_name(upload.name().to_string())
            .mime_str(upload.content_type())?;
        let form = Form::new().part("blob", part);

        let url = self.endpoint(&format!("blobs/{}", self.blob_store))?;
        let response = self.client.post(url).multipart(form).send().await?;
        if !response.status().is_success() {
            return Err(BlobStoreError::Status(response.status().as_u16()));
        }

        let blob_key = response.text().await?.trim().to_string();
        tracing::debug!("Uploaded '{}' to blob store as {}", upload.name(), blob_key);
        self.file_url(&blob_key)
    }

    async fn delete(&self, url: &str) -> Result<(), BlobStoreError> {
        let (blob_store, blob_key) =
            blob_reference(url).ok_or_else(|| BlobStoreError::NotABlobUrl(url.to_string()))?;

        let endpoint = self.endpoint(&format!("blobs/{}/{}", blob_store, blob_key))?;
        let response = self.client.delete(endpoint).send().await?;
        if !response.status().is_success() {
            return Err(BlobStoreError::Status(response.status().as_u16()));
        }

        tracing::debug!("Deleted blob {} from store {}", blob_key, blob_store);
        Ok(())
    }

    async fn fetch(&self, url: &str) -> Result<RemoteFile, BlobStoreError> {
        let parsed = Url::parse(url).map_err(|_| BlobStoreError::InvalidUrl(url.to_string()))?;

        let response = self.client.get(parsed.clone()).send().await?;
        if !response.status().is_success() {
            return Err(BlobStoreError::Status(response.status().as_u16()));
        }

        let disposition_name = response
            .headers()
            .get(CONTENT_DISPOSITION)
            .and_then(|v| v.to_str().ok())
            .and_then(file_name_from_disposition);

        let name = disposition_name.unwrap_or_else(|| file_name_from_url(&parsed));
        let content = response.bytes().await?;

        tracing::debug!("Fetched '{}' ({} bytes) from {}", name, content.len(), url);
        Ok(RemoteFile { name, content })
    }
}

/// Store name and blob key carried by a download URL.
pub fn blob_reference(url: &str) -> Option<(String, String)> {
    let parsed = Url::parse(url).ok()?;
    let mut blob_key = None;
    let mut blob_store = None;
    for (name, value) in parsed.query_pairs() {
        match name.as_ref() {
            PARAMETER_BLOB_KEY if !value.is_empty() => blob_key = Some(value.into_owned()),
            PARAMETER_BLOBSTORE if !value.is_empty() => blob_store = Some(value.into_owned()),
            _ => {}
        }
    }
    Some((blob_store?, blob_key?))
}

/// Extracts `filename` from a `Content-Disposition` header value.
pub fn file_name_from_disposition(header: &str) -> Option<String> {
    header
        .split(';')
        .map(str::trim)
        .find_map(|part| part.strip_prefix("filename="))
        .map(|name| name.trim_matches('"').to_string())
        .filter(|name| !name.is_empty())
}

/// Last non-empty path segment, percent-decoded. Falls back to the host.
pub fn file_name_from_url(url: &Url) -> String {
    url.path_segments()
        .and_then(|segments| segments.filter(|s| !s.is_empty()).last())
        .map(|s| percent_decode_str(s).decode_utf8_lossy().into_owned())
        .unwrap_or_else(|| url.host_str().unwrap_or("download").to_string())
}
