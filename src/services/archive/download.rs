use super::ArchiveError;
use crate::env_config::models::app_config::ArchiveConfig;
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use std::future::Future;
use std::path::PathBuf;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Working directory used when `archive.temp_dir` is not configured.
const DEFAULT_WORK_DIR: &str = "market-loader-archives";

/// Source of yearly candle archives.
#[async_trait]
pub trait ArchiveSource {
    /// Path of the downloaded zip for one instrument and year; `None` when the
    /// year has no data. The caller owns the file and removes it after import.
    async fn fetch_year(&self, figi: &str, year: i32) -> Result<Option<PathBuf>, ArchiveError>;
}

/// Downloads archives over HTTP into the working directory.
pub struct ArchiveDownloader {
    client: Client,
    base_url: String,
    token: String,
    temp_dir: PathBuf,
    max_attempts: u32,
    retry_delay: Duration,
    cancel: CancellationToken,
}

/// Outcome of a single HTTP request.
#[derive(Debug)]
pub enum Attempt {
    Done(Vec<u8>),
    NotFound,
    Retry(String),
}

impl ArchiveDownloader {
    pub fn new(
        config: &ArchiveConfig,
        token: &str,
        cancel: CancellationToken,
    ) -> Result<Self, ArchiveError> {
        let client = Client::builder()
            .timeout(config.request_timeout())
            .build()?;
        let temp_dir = config
            .temp_dir
            .as_ref()
            .map(PathBuf::from)
            .unwrap_or_else(|| std::env::temp_dir().join(DEFAULT_WORK_DIR));

        Ok(Self {
            client,
            base_url: config.base_url.clone(),
            token: token.to_string(),
            temp_dir,
            max_attempts: config.max_attempts.max(1),
            retry_delay: config.retry_delay(),
            cancel,
        })
    }

    pub fn archive_path(&self, figi: &str, year: i32) -> PathBuf {
        self.temp_dir.join(format!("{}_{}.zip", figi, year))
    }

    async fn attempt(&self, figi: &str, year: i32) -> Attempt {
        let response = self
            .client
            .get(&self.base_url)
            .query(&[("figi", figi.to_string()), ("year", year.to_string())])
            .bearer_auth(&self.token)
            .send()
            .await;

        let response = match response {
            Ok(response) => response,
            Err(e) => return Attempt::Retry(e.to_string()),
        };

        match response.status() {
            StatusCode::OK => match response.bytes().await {
                Ok(body) => Attempt::Done(body.to_vec()),
                Err(e) => Attempt::Retry(e.to_string()),
            },
            StatusCode::NOT_FOUND => Attempt::NotFound,
            status => Attempt::Retry(format!("HTTP {}", status)),
        }
    }
}

/// Pause before each retry: `initial`, then doubling.
pub fn retry_delays(initial: Duration, max_attempts: u32) -> impl Iterator<Item = Duration> {
    (0..max_attempts.saturating_sub(1)).map(move |n| initial.saturating_mul(1 << n.min(16)))
}

/// Runs `attempt` until it yields a body or a 404, at most `max_attempts` times.
///
/// Backoff sleeps end early when `cancel` fires.
pub async fn fetch_with_retry<F, Fut>(
    figi: &str,
    year: i32,
    max_attempts: u32,
    retry_delay: Duration,
    cancel: &CancellationToken,
    mut attempt: F,
) -> Result<Option<Vec<u8>>, ArchiveError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Attempt>,
{
    let max_attempts = max_attempts.max(1);
    let mut delays = retry_delays(retry_delay, max_attempts);
    let mut number = 1;

    loop {
        match attempt().await {
            Attempt::Done(body) => return Ok(Some(body)),
            Attempt::NotFound => {
                info!("No archive for {} in {}", figi, year);
                return Ok(None);
            }
            Attempt::Retry(reason) => {
                let Some(delay) = delays.next() else {
                    return Err(ArchiveError::Download {
                        figi: figi.to_string(),
                        year,
                        attempts: max_attempts,
                        reason,
                    });
                };
                warn!(
                    "Archive {} {} attempt {}/{} failed: {}, retrying in {:?}",
                    figi, year, number, max_attempts, reason, delay
                );
                tokio::select! {
                    _ = cancel.cancelled() => return Err(ArchiveError::Cancelled),
                    _ = tokio::time::sleep(delay) => {}
                }
                number += 1;
            }
        }
    }
}

#[async_trait]
impl ArchiveSource for ArchiveDownloader {
    async fn fetch_year(&self, figi: &str, year: i32) -> Result<Option<PathBuf>, ArchiveError> {
        let body = fetch_with_retry(
            figi,
            year,
            self.max_attempts,
            self.retry_delay,
            &self.cancel,
            || self.attempt(figi, year),
        )
        .await?;
        let Some(body) = body else {
            return Ok(None);
        };

        let path = self.archive_path(figi, year);
        tokio::fs::create_dir_all(&self.temp_dir).await?;
        tokio::fs::write(&path, &body).await?;
        debug!("Saved {} bytes to {}", body.len(), path.display());

        Ok(Some(path))
    }
}
