//! Mapping of HTTP responses onto attempt outcomes

use chrono::{DateTime, Utc};
use pacer_config::{HttpConfig, Validatable};
use pacer_resilience::AttemptOutcome;
use reqwest::{Response, StatusCode};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::errors::{is_fatal_by_default, HttpError};
use crate::hint::ResumeHintParser;

/// Longest response body kept in a status error
const MAX_ERROR_BODY: usize = 512;

/// Decides which failures must not be retried
pub type FatalPredicate = Arc<dyn Fn(&HttpError) -> bool + Send + Sync>;

/// Classifies the result of one HTTP attempt.
///
/// - 2xx and 3xx: success
/// - the configured rate-limit status (429 by default): rate limited, with a
///   resume hint read from the response headers
/// - other statuses and transport errors: transient, unless the fatal
///   predicate says otherwise
#[derive(Clone)]
pub struct ResponseClassifier {
    rate_limit_status: StatusCode,
    hints: ResumeHintParser,
    is_fatal: FatalPredicate,
}

impl fmt::Debug for ResponseClassifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResponseClassifier")
            .field("rate_limit_status", &self.rate_limit_status)
            .field("hints", &self.hints)
            .finish_non_exhaustive()
    }
}

impl Default for ResponseClassifier {
    fn default() -> Self {
        Self {
            rate_limit_status: StatusCode::TOO_MANY_REQUESTS,
            hints: ResumeHintParser::default(),
            is_fatal: Arc::new(is_fatal_by_default),
        }
    }
}

impl ResponseClassifier {
    pub fn from_config(config: &HttpConfig) -> Result<Self, HttpError> {
        config.validate()?;

        let rate_limit_status = StatusCode::from_u16(config.rate_limit_status).map_err(|_| {
            config.validation_error(format!(
                "invalid rate_limit_status {}",
                config.rate_limit_status
            ))
        })?;

        Ok(Self {
            rate_limit_status,
            hints: ResumeHintParser::from_config(config),
            is_fatal: Arc::new(is_fatal_by_default),
        })
    }

    /// Replace the predicate deciding which failures are fatal
    pub fn with_fatal_predicate<P>(mut self, predicate: P) -> Self
    where
        P: Fn(&HttpError) -> bool + Send + Sync + 'static,
    {
        self.is_fatal = Arc::new(predicate);
        self
    }

    pub fn hints(&self) -> &ResumeHintParser {
        &self.hints
    }

    pub async fn classify(
        &self,
        result: Result<Response, reqwest::Error>,
    ) -> AttemptOutcome<Response, HttpError> {
        self.classify_at(result, Utc::now()).await
    }

    /// Classify with an explicit wall-clock time for date-based hints
    pub async fn classify_at(
        &self,
        result: Result<Response, reqwest::Error>,
        now: DateTime<Utc>,
    ) -> AttemptOutcome<Response, HttpError> {
        let response = match result {
            Ok(response) => response,
            Err(error) => return self.failure(HttpError::NetworkError(error)),
        };

        let status = response.status();
        if status.is_success() || status.is_redirection() {
            debug!("HTTP {} from {}", status, response.url());
            return AttemptOutcome::Success(response);
        }

        if status == self.rate_limit_status {
            let resume_hint = self.hints.parse_at(response.headers(), now);
            warn!(
                "Rate limited by {} (HTTP {}), resuming in {:?}",
                response.url(),
                status,
                resume_hint
            );
            return AttemptOutcome::rate_limited(
                HttpError::RateLimited {
                    status,
                    resume_hint: Some(resume_hint),
                },
                Some(resume_hint),
            );
        }

        let body = read_error_body(response).await;
        self.failure(HttpError::Status { status, body })
    }

    /// Classify an error that never produced a response
    pub fn failure<T>(&self, error: HttpError) -> AttemptOutcome<T, HttpError> {
        if (self.is_fatal)(&error) {
            AttemptOutcome::Fatal(error)
        } else {
            AttemptOutcome::Transient(error)
        }
    }
}

async fn read_error_body(response: Response) -> String {
    match response.text().await {
        Ok(mut body) => {
            if body.len() > MAX_ERROR_BODY {
                let mut cut = MAX_ERROR_BODY;
                while !body.is_char_boundary(cut) {
                    cut -= 1;
                }
                body.truncate(cut);
            }
            body
        }
        Err(error) => format!("<unreadable body: {error}>"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use pacer_resilience::OutcomeKind;
    use std::time::Duration;

    fn response(status: u16, headers: &[(&str, &str)], body: &str) -> Response {
        let mut builder = http::Response::builder().status(status);
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }
        Response::from(builder.body(body.to_string()).unwrap())
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
    }

    #[tokio::test]
    async fn test_success_and_redirect() {
        let classifier = ResponseClassifier::default();

        let ok = classifier.classify_at(Ok(response(200, &[], "{}")), now()).await;
        assert_eq!(ok.kind(), OutcomeKind::Success);

        let moved = classifier.classify_at(Ok(response(304, &[], "")), now()).await;
        assert_eq!(moved.kind(), OutcomeKind::Success);
    }

    #[tokio::test]
    async fn test_rate_limited_with_reset_header() {
        let classifier = ResponseClassifier::default();

        let outcome = classifier
            .classify_at(Ok(response(429, &[("x-ratelimit-reset", "3")], "")), now())
            .await;

        assert_eq!(outcome.kind(), OutcomeKind::RateLimited);
        assert_eq!(outcome.resume_hint(), Some(Duration::from_secs(3)));
    }

    #[tokio::test]
    async fn test_rate_limited_without_hint_uses_fallback() {
        let classifier = ResponseClassifier::default();

        let outcome = classifier.classify_at(Ok(response(429, &[], "")), now()).await;

        assert_eq!(outcome.resume_hint(), Some(Duration::from_secs(3)));
    }

    #[tokio::test]
    async fn test_custom_rate_limit_status() {
        let config = HttpConfig {
            rate_limit_status: 503,
            ..HttpConfig::default()
        };
        let classifier = ResponseClassifier::from_config(&config).unwrap();

        let outcome = classifier
            .classify_at(Ok(response(503, &[("retry-after", "10")], "")), now())
            .await;
        assert_eq!(outcome.kind(), OutcomeKind::RateLimited);
        assert_eq!(outcome.resume_hint(), Some(Duration::from_secs(10)));
    }

    #[tokio::test]
    async fn test_status_errors() {
        let classifier = ResponseClassifier::default();

        let server = classifier
            .classify_at(Ok(response(502, &[], "bad gateway")), now())
            .await;
        assert_eq!(server.kind(), OutcomeKind::Transient);

        let client = classifier
            .classify_at(Ok(response(400, &[], "missing field")), now())
            .await;
        assert_eq!(client.kind(), OutcomeKind::Fatal);
        match client.into_result() {
            Err(HttpError::Status { status, body }) => {
                assert_eq!(status, StatusCode::BAD_REQUEST);
                assert_eq!(body, "missing field");
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_custom_fatal_predicate() {
        let classifier = ResponseClassifier::default().with_fatal_predicate(|error| {
            error.status() == Some(StatusCode::SERVICE_UNAVAILABLE)
        });

        let unavailable = classifier.classify_at(Ok(response(503, &[], "")), now()).await;
        assert_eq!(unavailable.kind(), OutcomeKind::Fatal);

        // Everything else becomes retryable under this predicate
        let not_found = classifier.classify_at(Ok(response(404, &[], "")), now()).await;
        assert_eq!(not_found.kind(), OutcomeKind::Transient);
    }

    #[tokio::test]
    async fn test_long_error_body_is_truncated() {
        let classifier = ResponseClassifier::default();
        let long = "é".repeat(400);

        let outcome = classifier.classify_at(Ok(response(500, &[], &long)), now()).await;
        match outcome.into_result() {
            Err(HttpError::Status { body, .. }) => assert!(body.len() <= MAX_ERROR_BODY),
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_oversized_reset_header_is_clamped_end_to_end() {
        use pacer_config::{QueueConfig, RetryConfig};
        use pacer_resilience::{Pacer, Retryable};

        let classifier = ResponseClassifier::default();
        let pacer = Pacer::new(QueueConfig::default(), RetryConfig::no_retry()).unwrap();

        let result = pacer
            .execute(|_| {
                classifier.classify_at(
                    Ok(response(429, &[("retry-after", "18446744073709551615")], "")),
                    now(),
                )
            })
            .await;

        let error = result.unwrap_err();
        assert_eq!(error.attempts(), 1);
        assert!(error.cause().is_some_and(HttpError::is_rate_limited));
        let remaining = pacer.pause().remaining().unwrap();
        assert!(remaining <= Duration::from_secs(3600));
        assert!(remaining > Duration::from_secs(3500));
    }

    #[test]
    fn test_invalid_config_rejected() {
        let config = HttpConfig {
            rate_limit_status: 200,
            ..HttpConfig::default()
        };
        assert!(ResponseClassifier::from_config(&config).is_err());
    }
}
