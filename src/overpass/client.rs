use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use super::{OverpassClient, PlaceQuery};
use crate::types::{FetchError, FetchResult};

const MAX_MESSAGE_CHARS: usize = 300;

impl OverpassClient {
    /// Fetches the building footprints for `query`.
    ///
    /// Blocks the calling thread for the duration of every attempt and
    /// backoff; async callers should run it on a blocking pool.
    pub fn fetch(&self, query: &PlaceQuery) -> FetchResult {
        let body = query.to_overpass_ql(Some(self.config.server_timeout()));
        self.fetch_ql(&body)
    }

    /// Sends an already rendered query with the same retry policy as [`fetch`](Self::fetch).
    pub fn fetch_ql(&self, body: &str) -> FetchResult {
        let config = &self.config;
        let started = Instant::now();
        // `None` only when the deadline lies beyond what `Instant` can represent.
        let deadline = started.checked_add(config.deadline());
        let time_left = || -> Duration {
            deadline.map_or(Duration::MAX, |d| d.saturating_duration_since(Instant::now()))
        };
        let mut attempt: u32 = 0;

        loop {
            let remaining = time_left();
            attempt += 1;
            debug!(attempt, ?remaining, "Sending Overpass query to {}", config.endpoint_url);

            let (error, retry_after) =
                match self.transport.post(&config.endpoint_url, body, config.timeout().min(remaining)) {
                    Ok(response) if response.status == 200 => {
                        info!(attempt, bytes = response.body.len(), elapsed = ?started.elapsed(), "Got Overpass response");
                        return parse_payload(&response.body);
                    }
                    Ok(response) => {
                        let error = FetchError::upstream(
                            response.status,
                            upstream_message(response.status, &response.body),
                        );
                        if !is_transient(response.status) {
                            warn!(attempt, status = response.status, "Overpass rejected the query");
                            return Err(error);
                        }
                        (error, response.retry_after)
                    }
                    Err(failure) => {
                        let error = FetchError::transport(failure.reason);
                        if !failure.retryable {
                            warn!(attempt, "{error}");
                            return Err(error);
                        }
                        (error, None)
                    }
                };

            if attempt > config.max_retries {
                warn!(attempt, "Giving up on Overpass: {error}");
                return Err(error);
            }

            let delay = config.backoff(attempt).max(retry_after.unwrap_or_default());
            if delay >= time_left() {
                warn!(attempt, ?delay, "Deadline leaves no room for another attempt: {error}");
                return Err(error);
            }
            info!(attempt, ?delay, "Overpass attempt failed ({error}), retrying");
            std::thread::sleep(delay);
        }
    }
}

/// 429 and 5xx are worth another try; other statuses mean the query itself is wrong.
pub fn is_transient(status: u16) -> bool {
    status == 429 || (500..600).contains(&status)
}

fn parse_payload(body: &str) -> FetchResult {
    let payload: serde_json::Value = match serde_json::from_str(body) {
        Ok(payload) => payload,
        Err(e) => {
            warn!("Error parsing Overpass response: {e}");
            return Err(FetchError::transport("malformed response body"));
        }
    };
    if let Some(remark) = payload.get("remark").and_then(|r| r.as_str()) {
        warn!("Overpass remark: {remark}");
    }
    Ok(payload)
}

/// Overpass reports failures as an HTML page. Pull out the lines that
/// mention an error, drop the markup, and fall back to the reason phrase.
pub fn upstream_message(status: u16, body: &str) -> String {
    let text = strip_tags(body);
    let errors: Vec<&str> = text
        .lines()
        .map(str::trim)
        .filter(|line| line.to_ascii_lowercase().contains("error"))
        .collect();

    let message = if !errors.is_empty() {
        collapse_whitespace(&errors.join(" "))
    } else {
        collapse_whitespace(&text)
    };

    if message.is_empty() {
        return reason_phrase(status).to_string();
    }
    truncate_chars(&message, MAX_MESSAGE_CHARS)
}

fn strip_tags(body: &str) -> String {
    let mut text = String::with_capacity(body.len());
    let mut in_tag = false;
    for c in body.chars() {
        match c {
            '<' => in_tag = true,
            '>' if in_tag => in_tag = false,
            _ if !in_tag => text.push(c),
            _ => {}
        }
    }
    text.replace("&quot;", "\"")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&amp;", "&")
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn truncate_chars(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((idx, _)) => format!("{}...", &text[..idx]),
        None => text.to_string(),
    }
}

fn reason_phrase(status: u16) -> &'static str {
    match status {
        400 => "Bad Request",
        403 => "Forbidden",
        404 => "Not Found",
        429 => "Too Many Requests",
        500 => "Internal Server Error",
        502 => "Bad Gateway",
        503 => "Service Unavailable",
        504 => "Gateway Timeout",
        _ => "Unexpected status",
    }
}
