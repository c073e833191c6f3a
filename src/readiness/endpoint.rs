//! HTTP endpoint checks
//!
//! A workload exposed through a load balancer keeps answering with errors
//! for a while after the nodes behind it are ready. [`EndpointCheck`] GETs a
//! URL until it answers `200 OK` or its deadline passes, then hands the body
//! to a predicate. The attempt budget is derived from the deadline and the
//! pacing, so a slow pacing policy makes fewer attempts within the same wait.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, info};

use super::retry::{Backoff, Convergence, PollOutcome, RetryPolicy, poll_until};
use crate::error::{Error, Result};
use crate::report::{CheckKind, CheckResult};

/// Deadline for an endpoint to start answering
pub const DEFAULT_ENDPOINT_MAX_WAIT: Duration = Duration::from_secs(600);

/// Timeout of a single GET
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

const HTTP_OK: u16 = 200;

/// Status and body of one GET
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
}

/// One-shot HTTP GET used by endpoint checks
#[async_trait]
pub trait HttpFetch: Send + Sync {
    /// GET `url` with `headers` added; a `Host` entry overrides the request host
    async fn get(&self, url: &str, headers: &[(String, String)]) -> Result<HttpResponse>;
}

#[async_trait]
impl<T> HttpFetch for &T
where
    T: HttpFetch + ?Sized,
{
    async fn get(&self, url: &str, headers: &[(String, String)]) -> Result<HttpResponse> {
        (**self).get(url, headers).await
    }
}

/// [`HttpFetch`] backed by a `reqwest` client
#[derive(Clone, Debug)]
pub struct ReqwestFetch {
    client: reqwest::Client,
}

impl ReqwestFetch {
    /// Client whose requests give up after `timeout`
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl HttpFetch for ReqwestFetch {
    async fn get(&self, url: &str, headers: &[(String, String)]) -> Result<HttpResponse> {
        let mut request = self.client.get(url);
        for (name, value) in headers {
            request = request.header(name.as_str(), value.as_str());
        }

        let response = request.send().await?;
        let status = response.status().as_u16();
        let body = response.text().await?;
        Ok(HttpResponse { status, body })
    }
}

type BodyPredicate = Arc<dyn Fn(&str) -> bool + Send + Sync>;

/// Bounded-retry assertion on an HTTP endpoint
#[derive(Clone)]
pub struct EndpointCheck {
    url: String,
    headers: Vec<(String, String)>,
    max_wait: Duration,
    pacing: RetryPolicy,
    predicate: BodyPredicate,
}

impl EndpointCheck {
    /// Check `endpoint`, assuming `http://` when it carries no scheme
    ///
    /// By default the body must be non-empty, and retries wait 10s, 20s,
    /// then 30s between attempts for up to ten minutes.
    pub fn new(endpoint: impl Into<String>) -> Self {
        let endpoint = endpoint.into();
        let url = if endpoint.starts_with("http://") || endpoint.starts_with("https://") {
            endpoint
        } else {
            format!("http://{}", endpoint)
        };

        let backoff = Backoff::Linear {
            step: Duration::from_secs(10),
            max_interval: Duration::from_secs(30),
        };
        let pacing = RetryPolicy::fixed(1, Duration::from_secs(10)).with_backoff(backoff);

        Self {
            url,
            headers: Vec::new(),
            max_wait: DEFAULT_ENDPOINT_MAX_WAIT,
            pacing,
            predicate: Arc::new(|body| !body.is_empty()),
        }
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn with_max_wait(mut self, max_wait: Duration) -> Self {
        self.max_wait = max_wait;
        self
    }

    /// Interval and backoff between attempts; the attempt count is ignored
    pub fn with_pacing(mut self, pacing: RetryPolicy) -> Self {
        self.pacing = pacing;
        self
    }

    /// Replace the body assertion
    pub fn with_predicate<P>(mut self, predicate: P) -> Self
    where
        P: Fn(&str) -> bool + Send + Sync + 'static,
    {
        self.predicate = Arc::new(predicate);
        self
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn headers(&self) -> &[(String, String)] {
        &self.headers
    }

    /// Retry budget derived from the deadline
    pub fn policy(&self) -> RetryPolicy {
        self.pacing.within(self.max_wait)
    }

    /// Poll the endpoint until it answers `200 OK`, then assert on its body
    pub async fn run<F>(&self, fetch: &F) -> CheckResult
    where
        F: HttpFetch + ?Sized,
    {
        let url = self.url.as_str();
        let headers = self.headers.as_slice();
        let what = format!("endpoint {:?}", url);

        let outcome = poll_until(&self.policy(), &what, "200 OK", move |state| async move {
            match fetch.get(url, headers).await {
                Ok(response) if response.status == HTTP_OK => PollOutcome::Ready(response),
                Ok(response) => {
                    debug!(
                        url,
                        status = response.status,
                        attempt = state.attempt(),
                        "Endpoint answered with an error status"
                    );
                    PollOutcome::NotReady(Some(response))
                }
                Err(e) => {
                    debug!(url, error = %e, attempt = state.attempt(), "Endpoint request failed");
                    PollOutcome::NotReady(None)
                }
            }
        })
        .await;

        let mut result = CheckResult::new(CheckKind::Endpoint);
        match outcome {
            Convergence::Converged { value, attempts } => {
                info!("Endpoint {} answered after {} attempt(s)", url, attempts);
                result.ensure((self.predicate)(&value.body), || {
                    format!("Endpoint {:?} answered with an unexpected body", url)
                });
            }
            Convergence::Exhausted {
                last: Some(response),
                attempts,
            } => {
                result.fail(format!(
                    "Endpoint {:?} answered {} instead of 200 ({})",
                    url,
                    response.status,
                    exhausted(&what, attempts)
                ));
            }
            Convergence::Exhausted {
                last: None,
                attempts,
            } => {
                result.fail(format!(
                    "Endpoint {:?} never answered ({})",
                    url,
                    exhausted(&what, attempts)
                ));
            }
        }
        result
    }
}

impl fmt::Debug for EndpointCheck {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EndpointCheck")
            .field("url", &self.url)
            .field("headers", &self.headers)
            .field("max_wait", &self.max_wait)
            .field("pacing", &self.pacing)
            .finish_non_exhaustive()
    }
}

fn exhausted(what: &str, attempts: u32) -> Error {
    Error::ConvergenceExhausted {
        what: what.to_string(),
        attempts,
    }
}
