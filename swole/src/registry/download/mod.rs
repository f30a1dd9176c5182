//! Size-bounded asset downloads.
//!
//! The [`Downloader`] applies a [`DownloadPolicy`] on top of any
//! [`Transport`]: `file://` URIs and network URIs each have a byte ceiling.
//! A transfer is cancelled as soon as the declared total or the received
//! byte count crosses the ceiling, and the partial bytes are discarded.
//!
//! # Example
//!
//! ```ignore
//! let downloader = Downloader::new(Arc::new(RoutingTransport::new(timeout)), policy);
//! let bytes = downloader.download("https://example.com/sky.png").await;
//! if bytes.is_empty() {
//!     // Failed, cancelled, or genuinely empty; already logged
//! }
//! ```

mod transport;

pub use transport::{
    DownloadError, FileTransport, HttpTransport, ProgressFn, RoutingTransport, TransferProgress,
    Transport,
};

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use reqwest::Url;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::config::{DEFAULT_LOCAL_DOWNLOAD_LIMIT, DEFAULT_NETWORK_DOWNLOAD_LIMIT};

/// Byte ceilings per URI class.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DownloadPolicy {
    pub local_limit: u64,
    pub network_limit: u64,
}

impl Default for DownloadPolicy {
    fn default() -> Self {
        Self {
            local_limit: DEFAULT_LOCAL_DOWNLOAD_LIMIT,
            network_limit: DEFAULT_NETWORK_DOWNLOAD_LIMIT,
        }
    }
}

impl DownloadPolicy {
    pub fn new(local_limit: u64, network_limit: u64) -> Self {
        Self {
            local_limit,
            network_limit,
        }
    }

    /// Ceiling that applies to `uri`.
    pub fn limit_for(&self, uri: &Url) -> u64 {
        if uri.scheme() == "file" {
            self.local_limit
        } else {
            self.network_limit
        }
    }
}

/// How a bounded transfer ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DownloadOutcome {
    /// Everything arrived within the ceiling.
    Complete,
    /// Stopped because the ceiling was crossed. Bytes are partial.
    Cancelled { limit: u64 },
    /// The transport failed. Bytes are partial.
    Failed(String),
}

/// Bytes from a bounded transfer, with how it ended.
///
/// Only [`DownloadOutcome::Complete`] bytes are valid.
#[derive(Debug, Clone)]
pub struct BoundedDownload {
    pub bytes: Vec<u8>,
    pub outcome: DownloadOutcome,
}

impl BoundedDownload {
    pub fn is_complete(&self) -> bool {
        self.outcome == DownloadOutcome::Complete
    }

    /// The bytes if complete, otherwise nothing.
    pub fn into_valid_bytes(self) -> Vec<u8> {
        if self.is_complete() {
            self.bytes
        } else {
            Vec::new()
        }
    }
}

/// Fetches asset bytes under a size policy.
#[derive(Clone)]
pub struct Downloader {
    transport: Arc<dyn Transport>,
    policy: DownloadPolicy,
}

impl std::fmt::Debug for Downloader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Downloader")
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}

impl Downloader {
    pub fn new(transport: Arc<dyn Transport>, policy: DownloadPolicy) -> Self {
        Self { transport, policy }
    }

    pub fn policy(&self) -> DownloadPolicy {
        self.policy
    }

    /// Fetch `uri`, cancelling once the ceiling for its URI class is crossed.
    pub async fn fetch_bounded(&self, uri: &str) -> BoundedDownload {
        let url = match Url::parse(uri) {
            Ok(url) => url,
            Err(e) => {
                return BoundedDownload {
                    bytes: Vec::new(),
                    outcome: DownloadOutcome::Failed(format!("invalid URI: {}", e)),
                }
            }
        };

        let limit = self.policy.limit_for(&url);
        let cancel = CancellationToken::new();
        let exceeded = AtomicBool::new(false);
        let progress = |p: TransferProgress| {
            let over = p.received > limit || p.total.is_some_and(|total| total > limit);
            if over && !exceeded.swap(true, Ordering::AcqRel) {
                debug!(
                    received = p.received,
                    total = ?p.total,
                    limit,
                    "Download ceiling crossed, cancelling"
                );
                cancel.cancel();
            }
        };

        let mut bytes = Vec::new();
        let result = self
            .transport
            .fetch(&url, &mut bytes, &progress, &cancel)
            .await;

        let outcome = match result {
            _ if exceeded.load(Ordering::Acquire) => DownloadOutcome::Cancelled { limit },
            Ok(()) => DownloadOutcome::Complete,
            Err(DownloadError::Cancelled { .. }) => DownloadOutcome::Cancelled { limit },
            Err(e) => DownloadOutcome::Failed(e.to_string()),
        };
        BoundedDownload { bytes, outcome }
    }

    /// Fetch `uri`, returning empty bytes when cancelled or failed.
    pub async fn download(&self, uri: &str) -> Vec<u8> {
        let download = self.fetch_bounded(uri).await;
        match &download.outcome {
            DownloadOutcome::Complete => {}
            DownloadOutcome::Cancelled { limit } => {
                warn!(
                    uri,
                    limit,
                    received = download.bytes.len(),
                    "Download exceeded size limit and was cancelled"
                );
            }
            DownloadOutcome::Failed(reason) => {
                warn!(uri, reason = %reason, "Download failed");
            }
        }
        download.into_valid_bytes()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::BoxFuture;

    /// Serves a fixed number of chunks, optionally declaring a total.
    struct SimulatedTransport {
        declared_total: Option<u64>,
        chunk: usize,
        chunks: usize,
    }

    impl Transport for SimulatedTransport {
        fn fetch<'a>(
            &'a self,
            _uri: &'a Url,
            sink: &'a mut Vec<u8>,
            progress: ProgressFn<'a>,
            cancel: &'a CancellationToken,
        ) -> BoxFuture<'a, Result<(), DownloadError>> {
            Box::pin(async move {
                progress(TransferProgress {
                    received: 0,
                    total: self.declared_total,
                });
                for _ in 0..self.chunks {
                    if cancel.is_cancelled() {
                        return Err(DownloadError::Cancelled {
                            received: sink.len() as u64,
                        });
                    }
                    sink.extend(std::iter::repeat(0xAB).take(self.chunk));
                    progress(TransferProgress {
                        received: sink.len() as u64,
                        total: self.declared_total,
                    });
                }
                if cancel.is_cancelled() {
                    return Err(DownloadError::Cancelled {
                        received: sink.len() as u64,
                    });
                }
                Ok(())
            })
        }
    }

    fn downloader(transport: SimulatedTransport, policy: DownloadPolicy) -> Downloader {
        Downloader::new(Arc::new(transport), policy)
    }

    #[test]
    fn test_policy_limits_by_scheme() {
        let policy = DownloadPolicy::default();
        assert_eq!(
            policy.limit_for(&Url::parse("file:///tmp/a.png").unwrap()),
            50_000_000
        );
        assert_eq!(
            policy.limit_for(&Url::parse("https://example.com/a.png").unwrap()),
            25_000_000
        );
    }

    #[tokio::test]
    async fn test_small_download_completes() {
        let downloader = downloader(
            SimulatedTransport {
                declared_total: Some(30),
                chunk: 10,
                chunks: 3,
            },
            DownloadPolicy::default(),
        );

        let download = downloader.fetch_bounded("file:///tmp/sky.png").await;
        assert!(download.is_complete());
        assert_eq!(download.bytes.len(), 30);
    }

    #[tokio::test]
    async fn test_declared_total_over_ceiling_is_rejected_before_any_byte() {
        let downloader = downloader(
            SimulatedTransport {
                declared_total: Some(60_000_000),
                chunk: 1024,
                chunks: 4,
            },
            DownloadPolicy::default(),
        );

        let download = downloader.fetch_bounded("file:///tmp/huge.bin").await;
        assert_eq!(
            download.outcome,
            DownloadOutcome::Cancelled { limit: 50_000_000 }
        );
        assert!(download.bytes.is_empty());
    }

    #[tokio::test]
    async fn test_undeclared_stream_is_cancelled_after_crossing_ceiling() {
        let downloader = downloader(
            SimulatedTransport {
                declared_total: None,
                chunk: 300,
                chunks: 10,
            },
            DownloadPolicy::new(1_000, 1_000),
        );

        let download = downloader.fetch_bounded("https://example.com/stream").await;
        assert_eq!(download.outcome, DownloadOutcome::Cancelled { limit: 1_000 });
        // The fourth chunk crosses the ceiling and nothing after it is read
        assert_eq!(download.bytes.len(), 1_200);

        let bytes = downloader.download("https://example.com/stream").await;
        assert!(bytes.is_empty());
    }

    #[tokio::test]
    async fn test_invalid_uri_fails() {
        let downloader = downloader(
            SimulatedTransport {
                declared_total: None,
                chunk: 1,
                chunks: 1,
            },
            DownloadPolicy::default(),
        );

        let download = downloader.fetch_bounded("not a uri").await;
        assert!(matches!(download.outcome, DownloadOutcome::Failed(_)));
        assert!(downloader.download("not a uri").await.is_empty());
    }
}
