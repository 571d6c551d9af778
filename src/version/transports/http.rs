//! HTTP transport backed by reqwest

use std::path::Path;
use std::time::Duration;

use futures::StreamExt;
use tokio::fs::File;
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

use crate::version::error::TransportError;
use crate::version::transport::{IndexEntry, Transport};

/// Timeout for establishing connections (downloads themselves may take long)
const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// Transport implementation over HTTP(S)
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    /// Creates a transport, routing every request through `proxy` when given
    pub fn new(proxy: Option<&str>) -> Result<Self, TransportError> {
        let mut builder = reqwest::Client::builder()
            .user_agent(concat!("runvm/", env!("CARGO_PKG_VERSION")))
            .connect_timeout(CONNECT_TIMEOUT);

        if let Some(proxy) = proxy.filter(|p| !p.is_empty()) {
            debug!("Using proxy {}", proxy);
            builder = builder.proxy(reqwest::Proxy::all(proxy)?);
        }

        Ok(Self {
            client: builder.build()?,
        })
    }

    fn write_error(dest: &Path, source: std::io::Error) -> TransportError {
        TransportError::Write {
            path: dest.to_path_buf(),
            source,
        }
    }
}

#[async_trait::async_trait]
impl Transport for HttpTransport {
    async fn fetch_index(&self, url: &str) -> Result<Vec<IndexEntry>, TransportError> {
        let response = self.client.get(url).send().await?;

        let status = response.status();
        if !status.is_success() {
            warn!("Index server returned status {}: {}", status, url);
            return Err(TransportError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        response.json().await.map_err(|e| {
            warn!("Failed to parse version index: {}", e);
            TransportError::InvalidResponse(e.to_string())
        })
    }

    async fn download(&self, url: &str, dest: &Path) -> Result<u64, TransportError> {
        debug!("Downloading {} to {}", url, dest.display());
        let response = self.client.get(url).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(TransportError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let mut file = File::create(dest)
            .await
            .map_err(|e| Self::write_error(dest, e))?;

        let mut stream = response.bytes_stream();
        let mut written: u64 = 0;

        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            file.write_all(&chunk)
                .await
                .map_err(|e| Self::write_error(dest, e))?;
            written += chunk.len() as u64;
        }

        file.flush().await.map_err(|e| Self::write_error(dest, e))?;
        debug!("Downloaded {} bytes from {}", written, url);

        Ok(written)
    }
}
