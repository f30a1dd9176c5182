//! Byte transports for asset downloads.
//!
//! A transport streams the bytes behind a URI into a sink, reporting
//! progress after every chunk and stopping as soon as the cancellation
//! token fires. Policy (size ceilings) lives in the caller's progress
//! callback, not in the transport.

use std::time::Duration;

use futures_util::StreamExt;
use reqwest::Url;
use thiserror::Error;
use tokio::io::AsyncReadExt;
use tokio_util::sync::CancellationToken;

use crate::content::BoxFuture;

/// Buffer size for reading local files (64KB).
const BUFFER_SIZE: usize = 64 * 1024;

/// Errors that can occur during a transfer.
#[derive(Debug, Error)]
pub enum DownloadError {
    /// The URI could not be parsed.
    #[error("Invalid URI '{uri}': {reason}")]
    InvalidUri { uri: String, reason: String },

    /// No transport handles the URI scheme.
    #[error("Unsupported URI scheme '{0}'")]
    UnsupportedScheme(String),

    /// The remote end failed the request.
    #[error("Transfer from {uri} failed: {reason}")]
    Transport { uri: String, reason: String },

    /// Local I/O failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The transfer was cancelled after `received` bytes.
    #[error("Transfer cancelled after {received} bytes")]
    Cancelled { received: u64 },
}

/// Snapshot of a transfer in progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransferProgress {
    /// Bytes received so far.
    pub received: u64,
    /// Declared total size, when the source reports one.
    pub total: Option<u64>,
}

/// Progress callback invoked by transports.
pub type ProgressFn<'a> = &'a (dyn Fn(TransferProgress) + Send + Sync);

/// Fetches the bytes behind a URI.
///
/// Implementations must call `progress` once before the first byte is
/// appended (with `received == 0`), then after every chunk, and return
/// [`DownloadError::Cancelled`] once `cancel` has fired.
pub trait Transport: Send + Sync {
    fn fetch<'a>(
        &'a self,
        uri: &'a Url,
        sink: &'a mut Vec<u8>,
        progress: ProgressFn<'a>,
        cancel: &'a CancellationToken,
    ) -> BoxFuture<'a, Result<(), DownloadError>>;
}

fn check_cancelled(cancel: &CancellationToken, sink: &[u8]) -> Result<(), DownloadError> {
    if cancel.is_cancelled() {
        Err(DownloadError::Cancelled {
            received: sink.len() as u64,
        })
    } else {
        Ok(())
    }
}

/// Transport for `file://` URIs.
#[derive(Debug, Clone, Copy, Default)]
pub struct FileTransport;

impl Transport for FileTransport {
    fn fetch<'a>(
        &'a self,
        uri: &'a Url,
        sink: &'a mut Vec<u8>,
        progress: ProgressFn<'a>,
        cancel: &'a CancellationToken,
    ) -> BoxFuture<'a, Result<(), DownloadError>> {
        Box::pin(async move {
            let path = uri.to_file_path().map_err(|_| DownloadError::InvalidUri {
                uri: uri.to_string(),
                reason: "not a local file path".to_string(),
            })?;

            let mut file = tokio::fs::File::open(&path).await?;
            let total = file.metadata().await?.len();
            progress(TransferProgress {
                received: 0,
                total: Some(total),
            });
            check_cancelled(cancel, sink)?;

            let mut buffer = vec![0u8; BUFFER_SIZE];
            loop {
                let read = file.read(&mut buffer).await?;
                if read == 0 {
                    break;
                }
                sink.extend_from_slice(&buffer[..read]);
                progress(TransferProgress {
                    received: sink.len() as u64,
                    total: Some(total),
                });
                check_cancelled(cancel, sink)?;
            }
            Ok(())
        })
    }
}

/// Transport for `http://` and `https://` URIs.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    /// Create a transport with a request timeout.
    pub fn with_timeout(timeout: Duration) -> Result<Self, DownloadError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| DownloadError::Transport {
                uri: String::new(),
                reason: format!("failed to create HTTP client: {}", e),
            })?;
        Ok(Self { client })
    }
}

impl Transport for HttpTransport {
    fn fetch<'a>(
        &'a self,
        uri: &'a Url,
        sink: &'a mut Vec<u8>,
        progress: ProgressFn<'a>,
        cancel: &'a CancellationToken,
    ) -> BoxFuture<'a, Result<(), DownloadError>> {
        Box::pin(async move {
            let transport_error = |e: reqwest::Error| DownloadError::Transport {
                uri: uri.to_string(),
                reason: e.to_string(),
            };

            let response = self
                .client
                .get(uri.clone())
                .send()
                .await
                .and_then(|r| r.error_for_status())
                .map_err(transport_error)?;

            let total = response.content_length();
            progress(TransferProgress { received: 0, total });
            check_cancelled(cancel, sink)?;

            let mut stream = response.bytes_stream();
            while let Some(chunk) = stream.next().await {
                let chunk = chunk.map_err(transport_error)?;
                sink.extend_from_slice(&chunk);
                progress(TransferProgress {
                    received: sink.len() as u64,
                    total,
                });
                check_cancelled(cancel, sink)?;
            }
            Ok(())
        })
    }
}

/// Dispatches to a transport by URI scheme.
#[derive(Debug, Clone)]
pub struct RoutingTransport {
    file: FileTransport,
    http: Option<HttpTransport>,
}

impl RoutingTransport {
    /// Route `file://` locally and `http(s)://` through an HTTP client.
    ///
    /// If the HTTP client cannot be built, network URIs are reported as
    /// unsupported.
    pub fn new(timeout: Duration) -> Self {
        let http = match HttpTransport::with_timeout(timeout) {
            Ok(http) => Some(http),
            Err(e) => {
                tracing::warn!(error = %e, "HTTP downloads disabled");
                None
            }
        };
        Self {
            file: FileTransport,
            http,
        }
    }

    /// Route `file://` only.
    pub fn local_only() -> Self {
        Self {
            file: FileTransport,
            http: None,
        }
    }
}

impl Transport for RoutingTransport {
    fn fetch<'a>(
        &'a self,
        uri: &'a Url,
        sink: &'a mut Vec<u8>,
        progress: ProgressFn<'a>,
        cancel: &'a CancellationToken,
    ) -> BoxFuture<'a, Result<(), DownloadError>> {
        match (uri.scheme(), &self.http) {
            ("file", _) => self.file.fetch(uri, sink, progress, cancel),
            ("http" | "https", Some(http)) => http.fetch(uri, sink, progress, cancel),
            (scheme, _) => {
                let scheme = scheme.to_string();
                Box::pin(async move { Err(DownloadError::UnsupportedScheme(scheme)) })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use tempfile::TempDir;

    fn file_url(path: &std::path::Path) -> Url {
        Url::from_file_path(path).unwrap()
    }

    #[tokio::test]
    async fn test_file_transport_reads_whole_file() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("blob.bin");
        std::fs::write(&path, vec![7u8; BUFFER_SIZE + 10]).unwrap();

        let seen = Mutex::new(Vec::new());
        let progress = |p: TransferProgress| seen.lock().unwrap().push(p);
        let mut sink = Vec::new();

        FileTransport
            .fetch(&file_url(&path), &mut sink, &progress, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(sink.len(), BUFFER_SIZE + 10);
        let seen = seen.into_inner().unwrap();
        assert_eq!(seen[0].received, 0);
        assert_eq!(seen[0].total, Some((BUFFER_SIZE + 10) as u64));
        assert_eq!(seen.last().unwrap().received, (BUFFER_SIZE + 10) as u64);
    }

    #[tokio::test]
    async fn test_file_transport_stops_when_cancelled() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("blob.bin");
        std::fs::write(&path, vec![1u8; 100]).unwrap();

        let cancel = CancellationToken::new();
        let progress = |_: TransferProgress| cancel.cancel();
        let mut sink = Vec::new();

        let result = FileTransport
            .fetch(&file_url(&path), &mut sink, &progress, &cancel)
            .await;

        assert!(matches!(result, Err(DownloadError::Cancelled { received: 0 })));
        assert!(sink.is_empty());
    }

    #[tokio::test]
    async fn test_file_transport_missing_file() {
        let temp = TempDir::new().unwrap();
        let mut sink = Vec::new();
        let result = FileTransport
            .fetch(
                &file_url(&temp.path().join("missing")),
                &mut sink,
                &|_| {},
                &CancellationToken::new(),
            )
            .await;
        assert!(matches!(result, Err(DownloadError::Io(_))));
    }

    #[tokio::test]
    async fn test_routing_rejects_unknown_scheme() {
        let transport = RoutingTransport::local_only();
        let mut sink = Vec::new();
        let uri = Url::parse("ftp://example.com/a.png").unwrap();

        let result = transport
            .fetch(&uri, &mut sink, &|_| {}, &CancellationToken::new())
            .await;
        assert!(matches!(result, Err(DownloadError::UnsupportedScheme(s)) if s == "ftp"));

        let uri = Url::parse("https://example.com/a.png").unwrap();
        let result = transport
            .fetch(&uri, &mut sink, &|_| {}, &CancellationToken::new())
            .await;
        assert!(matches!(result, Err(DownloadError::UnsupportedScheme(_))));
    }
}
