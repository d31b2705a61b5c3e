//! Outbound HTTP hygiene: credential redaction in error text and response size limits.

use reqwest::StatusCode;
use thiserror::Error;
use url::Url;

use crate::transport::TransportError;

/// Strip credentials, query and fragment from a URL before it is shown to a tool caller.
///
/// Query auth puts the API key in the query string, so the query is always dropped.
#[must_use]
pub fn redact_url(url: &Url) -> String {
    let mut u = url.clone();
    let _ = u.set_username("");
    let _ = u.set_password(None);
    u.set_query(None);
    u.set_fragment(None);
    u.to_string()
}

#[must_use]
pub fn sanitize_reqwest_error(e: &reqwest::Error) -> String {
    let mut msg = e.to_string();
    if let Some(u) = e.url() {
        msg = msg.replace(u.as_str(), &redact_url(u));
    }
    msg
}

/// Why a body could not be read in full.
#[derive(Debug, Error)]
pub(crate) enum BodyReadError {
    /// `seen` is the announced `Content-Length`, or the byte count at which reading stopped.
    #[error("body of at least {seen} bytes exceeds the {limit} byte limit")]
    TooLarge { seen: u64, limit: usize },
    #[error("{}", sanitize_reqwest_error(.0))]
    Read(#[from] reqwest::Error),
}

impl BodyReadError {
    /// Transport error for a body that belonged to a response with `status`.
    pub(crate) fn into_transport_error(self, status: StatusCode) -> TransportError {
        match self {
            Self::TooLarge { seen, limit } => TransportError::ResponseTooLarge(format!(
                "{} response: {}",
                status.as_u16(),
                Self::TooLarge { seen, limit }
            )),
            Self::Read(e) => TransportError::from_reqwest(&e),
        }
    }
}

/// Read a response body, stopping as soon as it grows past `max_bytes`.
pub(crate) async fn read_body_limited(
    mut response: reqwest::Response,
    max_bytes: Option<usize>,
) -> Result<Vec<u8>, BodyReadError> {
    let Some(limit) = max_bytes else {
        return Ok(response.bytes().await?.to_vec());
    };

    match response.content_length() {
        Some(announced) if announced > limit as u64 => {
            return Err(BodyReadError::TooLarge {
                seen: announced,
                limit,
            });
        }
        _ => {}
    }

    let mut body: Vec<u8> = Vec::new();
    while let Some(chunk) = response.chunk().await? {
        let seen = body.len().saturating_add(chunk.len());
        if seen > limit {
            return Err(BodyReadError::TooLarge {
                seen: seen as u64,
                limit,
            });
        }
        body.extend_from_slice(&chunk);
    }
    Ok(body)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn redact_url_drops_credentials_and_query() {
        let url = Url::parse("https://user:pw@api.example.com/v1/tasks?api_key=s3cret#frag")
            .expect("url");
        let redacted = redact_url(&url);
        assert_eq!(redacted, "https://api.example.com/v1/tasks");
        assert!(!redacted.contains("s3cret"));
    }

    #[test]
    fn oversized_body_error_names_the_response_status() {
        let err = BodyReadError::TooLarge {
            seen: 5_006,
            limit: 1_024,
        }
        .into_transport_error(StatusCode::OK);
        let TransportError::ResponseTooLarge(msg) = err else {
            panic!("expected ResponseTooLarge, got {err:?}");
        };
        assert_eq!(
            msg,
            "200 response: body of at least 5006 bytes exceeds the 1024 byte limit"
        );
    }
}
