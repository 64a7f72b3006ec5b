//! Rate-limit-aware batch dispatch.
//!
//! [`Dispatcher`] sends a list of [`SendRequest`]s in bounded batches. Every
//! request in a batch is started before any result is awaited, and the batch
//! is joined with "settle all" semantics: one failure never cancels its
//! siblings. Rate-limited results pause the whole dispatch before it carries
//! on, and a fixed delay separates consecutive batches.
//!
//! Failed requests are reported, never retried here. Re-queuing is left to
//! the caller, who gets exactly one [`DispatchOutcome`] per request, in input
//! order.

use std::future::Future;
use std::time::Duration;

use futures::future::join_all;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::models::{SendRequest, SentEmail};
use crate::{Error, ErrorKind, Result};

/// Something that can send one email.
///
/// [`Client`](crate::Client) is the production implementation. Tests and
/// callers with their own transport can provide another.
pub trait EmailService {
    /// Send one email, failing with a classified [`Error`].
    ///
    /// Rate limiting must be reported as [`Error::RateLimited`] so the
    /// dispatcher can back off.
    fn send(&self, request: &SendRequest) -> impl Future<Output = Result<SentEmail>> + Send;
}

/// Batching and backoff settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DispatchConfig {
    /// Maximum number of requests in flight at once. Must be at least 1.
    pub batch_size: usize,
    /// Pause between the end of one batch and the start of the next.
    pub inter_batch_delay: Duration,
    /// Pause after a rate-limited result that carries no retry-after hint.
    pub default_retry_delay: Duration,
    /// Upper bound on any single rate-limit pause, whatever the service asks for.
    pub max_retry_delay: Duration,
}

impl Default for DispatchConfig {
    /// 3 requests per batch, 1 second between batches, 30 seconds of backoff
    /// capped at 5 minutes.
    fn default() -> Self {
        Self {
            batch_size: 3,
            inter_batch_delay: Duration::from_secs(1),
            default_retry_delay: Duration::from_secs(30),
            max_retry_delay: Duration::from_secs(300),
        }
    }
}

impl DispatchConfig {
    /// Set the maximum number of requests per batch.
    pub fn batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    /// Set the pause between consecutive batches.
    pub fn inter_batch_delay(mut self, delay: Duration) -> Self {
        self.inter_batch_delay = delay;
        self
    }

    /// Set the backoff used when a rate limit carries no hint.
    pub fn default_retry_delay(mut self, delay: Duration) -> Self {
        self.default_retry_delay = delay;
        self
    }

    /// Set the upper bound on a single rate-limit pause.
    pub fn max_retry_delay(mut self, delay: Duration) -> Self {
        self.max_retry_delay = delay;
        self
    }

    /// The pause owed for one rate-limited result.
    fn backoff(&self, retry_after: Option<Duration>) -> Duration {
        retry_after
            .unwrap_or(self.default_retry_delay)
            .min(self.max_retry_delay)
    }
}

/// Why a single request failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorInfo {
    pub kind: ErrorKind,
    pub message: String,
    /// Retry hint from the service; only set for [`ErrorKind::RateLimited`].
    pub retry_after: Option<Duration>,
}

impl ErrorInfo {
    fn cancelled() -> Self {
        Self {
            kind: ErrorKind::Cancelled,
            message: "dispatch cancelled before the request was sent".to_string(),
            retry_after: None,
        }
    }
}

impl From<&Error> for ErrorInfo {
    fn from(err: &Error) -> Self {
        Self {
            kind: err.kind(),
            message: err.to_string(),
            retry_after: err.retry_after(),
        }
    }
}

/// The fate of one request.
#[derive(Debug, Clone, PartialEq)]
pub enum DispatchOutcome {
    Success(SentEmail),
    Failure(ErrorInfo),
}

impl DispatchOutcome {
    /// Returns `true` if the request was accepted.
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }

    /// The accepted email, if the request succeeded.
    pub fn sent(&self) -> Option<&SentEmail> {
        match self {
            Self::Success(sent) => Some(sent),
            Self::Failure(_) => None,
        }
    }

    /// The failure details, if the request failed.
    pub fn error(&self) -> Option<&ErrorInfo> {
        match self {
            Self::Success(_) => None,
            Self::Failure(info) => Some(info),
        }
    }
}

/// Sends requests in bounded, concurrently executed batches.
///
/// # Examples
/// ```no_run
/// # use maylng::{Client, DispatchConfig, Dispatcher, SendRequest};
/// # #[tokio::main]
/// # async fn main() -> Result<(), maylng::Error> {
/// let client = Client::from_env()?;
/// let requests: Vec<SendRequest> = (1..=5)
///     .map(|i| {
///         SendRequest::new("addr_123", format!("Welcome User {i}!"))
///             .to(format!("user{i}@example.com").as_str())
///             .text("Welcome to our service!")
///     })
///     .collect();
///
/// let dispatcher = Dispatcher::new(DispatchConfig::default().batch_size(3));
/// let outcomes = dispatcher.dispatch(&client, &requests).await?;
/// let sent = outcomes.iter().filter(|o| o.is_success()).count();
/// println!("{sent}/{} sent", requests.len());
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone, Default)]
pub struct Dispatcher {
    config: DispatchConfig,
}

impl Dispatcher {
    /// Create a dispatcher with `config`.
    pub fn new(config: DispatchConfig) -> Self {
        Self { config }
    }

    /// The batching and backoff settings in use.
    pub fn config(&self) -> &DispatchConfig {
        &self.config
    }

    /// Send every request through `service` and report one outcome per
    /// request, in input order.
    ///
    /// # Errors
    /// Only [`Error::InvalidBatchSize`], raised before any request is sent.
    /// Per-request failures are returned as [`DispatchOutcome::Failure`].
    pub async fn dispatch<S: EmailService>(
        &self,
        service: &S,
        requests: &[SendRequest],
    ) -> Result<Vec<DispatchOutcome>> {
        self.dispatch_until_cancelled(service, requests, &CancellationToken::new())
            .await
    }

    /// Like [`dispatch`](Self::dispatch), but stops early once `cancel` fires.
    ///
    /// The token is checked before every batch and every pause, and a pause
    /// in progress ends as soon as it is cancelled. Results already collected
    /// are kept; requests that were never sent are reported with
    /// [`ErrorKind::Cancelled`].
    pub async fn dispatch_until_cancelled<S: EmailService>(
        &self,
        service: &S,
        requests: &[SendRequest],
        cancel: &CancellationToken,
    ) -> Result<Vec<DispatchOutcome>> {
        let batch_size = self.config.batch_size;
        if batch_size == 0 {
            return Err(Error::InvalidBatchSize(batch_size));
        }

        let batch_count = requests.len().div_ceil(batch_size);
        let mut outcomes = Vec::with_capacity(requests.len());

        for (index, batch) in requests.chunks(batch_size).enumerate() {
            if cancel.is_cancelled() {
                debug!(batch = index, "dispatch cancelled");
                break;
            }

            debug!(batch = index, size = batch.len(), "dispatching batch");
            let results = join_all(batch.iter().map(|request| service.send(request))).await;

            for result in results {
                match result {
                    Ok(sent) => outcomes.push(DispatchOutcome::Success(sent)),
                    Err(err) => {
                        let info = ErrorInfo::from(&err);
                        let backoff = (info.kind == ErrorKind::RateLimited)
                            .then(|| self.config.backoff(info.retry_after));
                        outcomes.push(DispatchOutcome::Failure(info));

                        match backoff {
                            Some(delay) => {
                                warn!(?delay, "rate limited, pausing dispatch");
                                pause(delay, cancel).await;
                            }
                            None => debug!(error = %err, "send failed"),
                        }
                    }
                }
            }

            if index + 1 < batch_count {
                pause(self.config.inter_batch_delay, cancel).await;
            }
        }

        let unsent = requests.len() - outcomes.len();
        outcomes.extend((0..unsent).map(|_| DispatchOutcome::Failure(ErrorInfo::cancelled())));
        Ok(outcomes)
    }
}

/// Sleep for `delay` unless `cancel` fires first (or already has).
async fn pause(delay: Duration, cancel: &CancellationToken) {
    if cancel.is_cancelled() {
        return;
    }
    tokio::select! {
        _ = cancel.cancelled() => {}
        _ = tokio::time::sleep(delay) => {}
    }
}
