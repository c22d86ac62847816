use crate::error::CrawlerError;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Instant;
use tokio::{sync::Mutex, time::Duration};
use tracing::{debug, warn};

/// Consecutive failed fetches before the operator gets warned that the crawl
/// may be stalled rather than just unlucky.
const STALL_WARN_THRESHOLD: u32 = 25;

#[async_trait::async_trait]
pub trait Fetch: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<String, CrawlerError>;
}

/// HTTP fetcher with a minimum delay between requests, a per-request timeout
/// and a bounded retry count for transient failures.
pub struct HttpFetcher {
    client: reqwest::Client,
    delay: Duration,
    retries: u32,
    last_request: Mutex<Option<Instant>>,
    consecutive_failures: AtomicU32,
}

impl HttpFetcher {
    pub fn new(delay: Duration, timeout: Duration, retries: u32) -> Result<Self, CrawlerError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|source| CrawlerError::Fetch {
                url: String::new(),
                source,
            })?;
        Ok(HttpFetcher {
            client,
            delay,
            retries,
            last_request: Mutex::new(None),
            consecutive_failures: AtomicU32::new(0),
        })
    }

    /// Fetches since the last success, i.e. how stalled the crawl looks.
    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures.load(Ordering::Relaxed)
    }

    async fn throttle(&self) {
        let mut last_request = self.last_request.lock().await;
        if let Some(last) = last_request.take() {
            let elapsed = last.elapsed();
            if elapsed < self.delay {
                tokio::time::sleep(self.delay - elapsed).await;
            }
        }
        last_request.replace(Instant::now());
    }

    async fn get(&self, url: &str) -> Result<String, reqwest::Error> {
        self.throttle().await;
        debug!("Visit {}", url);
        self.client
            .get(url)
            .send()
            .await?
            .error_for_status()?
            .text()
            .await
    }
}

#[async_trait::async_trait]
impl Fetch for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<String, CrawlerError> {
        let mut attempt = 0;
        loop {
            match self.get(url).await {
                Ok(body) => {
                    self.consecutive_failures.store(0, Ordering::Relaxed);
                    return Ok(body);
                }
                Err(source) if attempt < self.retries => {
                    attempt += 1;
                    warn!("Retry {}/{} for {}: {}", attempt, self.retries, url, source);
                }
                Err(source) => {
                    let failures = self.consecutive_failures.fetch_add(1, Ordering::Relaxed) + 1;
                    if failures % STALL_WARN_THRESHOLD == 0 {
                        warn!("{} consecutive fetch failures, crawl may be stalled", failures);
                    }
                    return Err(CrawlerError::Fetch {
                        url: url.to_string(),
                        source,
                    });
                }
            }
        }
    }
}

#[async_trait::async_trait]
impl<F: Fetch + ?Sized> Fetch for std::sync::Arc<F> {
    async fn fetch(&self, url: &str) -> Result<String, CrawlerError> {
        (**self).fetch(url).await
    }
}
