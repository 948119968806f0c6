use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;

use crate::error::SyncError;

/// Where manifest bytes come from.
#[async_trait]
pub trait ManifestSource: Send + Sync {
    async fn fetch(&self) -> Result<String, SyncError>;

    /// Human-readable origin for logs.
    fn describe(&self) -> String;
}

/// Fetches the manifest over HTTP(S).
pub struct HttpManifestSource {
    client: reqwest::Client,
    url: String,
    timeout: Duration,
    max_bytes: usize,
}

impl HttpManifestSource {
    pub fn new(url: impl Into<String>, timeout: Duration, max_bytes: usize) -> Result<Self, SyncError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("hakcer/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| SyncError::Network(e.to_string()))?;
        Ok(Self {
            client,
            url: url.into(),
            timeout,
            max_bytes,
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    fn classify(&self, e: reqwest::Error) -> SyncError {
        if e.is_timeout() {
            SyncError::Timeout(self.timeout)
        } else {
            SyncError::Network(e.to_string())
        }
    }
}

#[async_trait]
impl ManifestSource for HttpManifestSource {
    async fn fetch(&self) -> Result<String, SyncError> {
        let mut response = self
            .client
            .get(&self.url)
            .header("Accept", "application/json")
            .send()
            .await
            .map_err(|e| self.classify(e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(SyncError::Http {
                status: status.as_u16(),
            });
        }

        let too_large = SyncError::TooLarge {
            limit: self.max_bytes,
        };
        if response
            .content_length()
            .is_some_and(|len| len > self.max_bytes as u64)
        {
            return Err(too_large);
        }

        // Content-Length may be absent or wrong; count what actually arrives.
        let mut body = Vec::new();
        while let Some(chunk) = response.chunk().await.map_err(|e| self.classify(e))? {
            if body.len() + chunk.len() > self.max_bytes {
                return Err(too_large);
            }
            body.extend_from_slice(&chunk);
        }

        String::from_utf8(body).map_err(|e| SyncError::Network(format!("body is not UTF-8: {e}")))
    }

    fn describe(&self) -> String {
        self.url.clone()
    }
}

/// Reads the manifest from a local file.
pub struct FileManifestSource {
    path: PathBuf,
    max_bytes: usize,
}

impl FileManifestSource {
    pub fn new(path: impl Into<PathBuf>, max_bytes: usize) -> Self {
        Self {
            path: path.into(),
            max_bytes,
        }
    }
}

#[async_trait]
impl ManifestSource for FileManifestSource {
    async fn fetch(&self) -> Result<String, SyncError> {
        let body = tokio::fs::read_to_string(&self.path)
            .await
            .map_err(|e| SyncError::Network(format!("{}: {e}", self.path.display())))?;
        if body.len() > self.max_bytes {
            return Err(SyncError::TooLarge {
                limit: self.max_bytes,
            });
        }
        Ok(body)
    }

    fn describe(&self) -> String {
        self.path.display().to_string()
    }
}
