//! Rate-limited HTTP client

use pacer_config::{HttpConfig, PacerConfig, QueueConfig, RetryConfig, Validatable};
use pacer_resilience::{AttemptOutcome, ExecutionError, Pacer};
use reqwest::{Client, RequestBuilder, Response};
use tracing::debug;

use crate::classify::ResponseClassifier;
use crate::errors::HttpError;

/// HTTP client whose requests go through a [`Pacer`].
///
/// Requests are admitted under the queue's rate and concurrency caps,
/// retried per the retry policy, and a 429 from the service pauses every
/// request sharing this client (or its pacer) until the reset time.
#[derive(Debug, Clone)]
pub struct RateLimitedClient {
    client: Client,
    pacer: Pacer,
    classifier: ResponseClassifier,
}

impl RateLimitedClient {
    /// Create a client with the given HTTP settings around an existing pacer
    pub fn new(config: &HttpConfig, pacer: Pacer) -> Result<Self, HttpError> {
        config.validate()?;

        debug!(
            "Creating RateLimitedClient with timeout: {}s",
            config.timeout.as_secs()
        );
        let client = Client::builder()
            .timeout(config.timeout)
            .user_agent(&config.user_agent)
            .build()?;

        Ok(Self {
            client,
            pacer,
            classifier: ResponseClassifier::from_config(config)?,
        })
    }

    /// Create a client and its own pacer from a full configuration
    pub fn from_config(config: &PacerConfig) -> Result<Self, HttpError> {
        let pacer = Pacer::new(config.queue.clone(), config.retry.clone())?;
        Self::new(&config.http, pacer)
    }

    /// Replace the predicate deciding which failures are not retried
    pub fn with_fatal_predicate<P>(mut self, predicate: P) -> Self
    where
        P: Fn(&HttpError) -> bool + Send + Sync + 'static,
    {
        self.classifier = self.classifier.with_fatal_predicate(predicate);
        self
    }

    pub fn pacer(&self) -> &Pacer {
        &self.pacer
    }

    /// Underlying reqwest client
    pub fn client(&self) -> &Client {
        &self.client
    }

    /// Send a request built by `request_factory`.
    ///
    /// The factory is called once per attempt and must build a fresh,
    /// equivalent request each time.
    pub async fn execute<F>(&self, mut request_factory: F) -> Result<Response, ExecutionError<HttpError>>
    where
        F: FnMut(&Client) -> RequestBuilder,
    {
        let client = &self.client;
        let classifier = &self.classifier;

        self.pacer
            .execute(|attempt| {
                let request = request_factory(client).build();
                async move {
                    let request = match request {
                        Ok(request) => request,
                        Err(error) => {
                            return classifier.failure::<Response>(HttpError::NetworkError(error))
                        }
                    };

                    debug!(
                        "Sending {} {} (attempt {})",
                        request.method(),
                        request.url(),
                        attempt
                    );
                    classifier.classify(client.execute(request).await).await
                }
            })
            .await
    }
}

/// One-shot form: build a pacer and client for a single logical request.
///
/// Rate limits and pauses are not shared with other calls; keep a
/// [`RateLimitedClient`] around for that. Invalid configuration is reported
/// as a fatal error on attempt 0.
pub async fn execute<F>(
    request_factory: F,
    queue: &QueueConfig,
    retry: &RetryConfig,
) -> Result<Response, ExecutionError<HttpError>>
where
    F: FnMut(&Client) -> RequestBuilder,
{
    let client = Pacer::new(queue.clone(), retry.clone())
        .map_err(HttpError::from)
        .and_then(|pacer| RateLimitedClient::new(&HttpConfig::default(), pacer))
        .map_err(|cause| ExecutionError::Fatal { attempt: 0, cause })?;

    client.execute(request_factory).await
}

/// Wrap a plain attempt result for callers driving a [`Pacer`] directly
pub async fn classify_response(
    result: Result<Response, reqwest::Error>,
) -> AttemptOutcome<Response, HttpError> {
    ResponseClassifier::default().classify(result).await
}
