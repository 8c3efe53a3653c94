use std::time::Duration;

use ureq::Agent;

/// What came back from one POST, whatever the status.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawResponse {
    pub status: u16,
    pub body: String,
    /// Parsed `Retry-After` header, seconds form only.
    pub retry_after: Option<Duration>,
}

impl RawResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        RawResponse {
            status,
            body: body.into(),
            retry_after: None,
        }
    }
}

/// A request that never produced a full response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportFailure {
    pub reason: String,
    /// False when trying again cannot help (e.g. an oversized body).
    pub retryable: bool,
}

impl TransportFailure {
    pub fn retryable(reason: impl Into<String>) -> Self {
        TransportFailure {
            reason: reason.into(),
            retryable: true,
        }
    }

    pub fn fatal(reason: impl Into<String>) -> Self {
        TransportFailure {
            reason: reason.into(),
            retryable: false,
        }
    }
}

impl From<ureq::Error> for TransportFailure {
    fn from(error: ureq::Error) -> Self {
        match error {
            ureq::Error::BodyExceedsLimit(limit) => {
                TransportFailure::fatal(format!("response body exceeds {limit} bytes"))
            }
            ureq::Error::Timeout(_) => TransportFailure::retryable("request timed out"),
            ureq::Error::HostNotFound => TransportFailure::retryable("host not found"),
            ureq::Error::ConnectionFailed => TransportFailure::retryable("connection failed"),
            ureq::Error::BadUri(uri) => TransportFailure::fatal(format!("bad endpoint url: {uri}")),
            other => TransportFailure::retryable(other.to_string()),
        }
    }
}

/// One POST to the interpreter. Split out so the retry policy can be driven
/// without a network.
pub trait Transport: Send + Sync {
    fn post(&self, url: &str, body: &str, timeout: Duration)
    -> Result<RawResponse, TransportFailure>;
}

#[derive(Clone)]
pub struct UreqTransport {
    agent: Agent,
    user_agent: String,
    max_body_bytes: u64,
}

impl UreqTransport {
    pub fn new(user_agent: &str, max_body_bytes: u64) -> Self {
        // Statuses are classified by the client, so ureq must hand them back as data.
        let config = Agent::config_builder().http_status_as_error(false).build();
        let agent: Agent = config.into();
        UreqTransport {
            agent,
            user_agent: user_agent.to_string(),
            max_body_bytes,
        }
    }
}

impl Transport for UreqTransport {
    fn post(
        &self,
        url: &str,
        body: &str,
        timeout: Duration,
    ) -> Result<RawResponse, TransportFailure> {
        let mut response = self
            .agent
            .post(url)
            .header("User-Agent", self.user_agent.as_str())
            .config()
            .timeout_global(Some(timeout))
            .build()
            .send(body)?;

        let status = response.status().as_u16();
        let retry_after = response
            .headers()
            .get("Retry-After")
            .and_then(|value| value.to_str().ok())
            .and_then(parse_retry_after);
        let body = response
            .body_mut()
            .with_config()
            .limit(self.max_body_bytes)
            .read_to_string()?;

        Ok(RawResponse {
            status,
            body,
            retry_after,
        })
    }
}

fn parse_retry_after(value: &str) -> Option<Duration> {
    value.trim().parse::<u64>().ok().map(Duration::from_secs)
}
