// SPDX-FileCopyrightText: 2025 Alexandre Gomes Gaigalas <alganet@gmail.com>
//
// SPDX-License-Identifier: ISC

//! Traffic record: one observed request and its (eventually) correlated response.

use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Placeholder body text for messages that carried no body.
pub const NO_BODY: &str = "[no body]";

/// Opaque record identifier, unique per store.
pub type RecordId = Uuid;

/// Scheme of the observed URL.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "UPPERCASE")]
pub enum Protocol {
    Http,
    Https,
}

impl Protocol {
    /// Derive the protocol from a URL's scheme; anything that is not
    /// `https:` counts as plain HTTP.
    pub fn from_url(url: &str) -> Self {
        match url.get(..6) {
            Some(prefix) if prefix.eq_ignore_ascii_case("https:") => Protocol::Https,
            _ => Protocol::Http,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Protocol::Http => "HTTP",
            Protocol::Https => "HTTPS",
        }
    }
}

impl std::fmt::Display for Protocol {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Body of an observed message, as materialized by the proxy engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BodyCapture {
    Empty,
    Bytes(Bytes),
    /// Reading the body failed; the cause is kept for diagnostics.
    Failed(String),
}

impl BodyCapture {
    /// Render the body as display text, applying the JSON formatter when
    /// `prettify` is set.
    pub fn into_text(self, content_type: Option<&str>, prettify: bool) -> String {
        match self {
            BodyCapture::Empty => NO_BODY.to_string(),
            BodyCapture::Bytes(b) if b.is_empty() => NO_BODY.to_string(),
            BodyCapture::Bytes(b) => {
                let text = String::from_utf8_lossy(&b);
                if prettify {
                    crate::json_format::format(&text, content_type)
                } else {
                    text.into_owned()
                }
            }
            BodyCapture::Failed(cause) => format!("[error reading body: {}]", cause),
        }
    }
}

impl From<Option<Bytes>> for BodyCapture {
    fn from(body: Option<Bytes>) -> Self {
        body.map(BodyCapture::Bytes).unwrap_or(BodyCapture::Empty)
    }
}

/// Response half of a record, set exactly once on correlation.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct ResponseInfo {
    pub status: u16,
    pub headers_text: String,
    pub body_text: String,
    pub completed_at: DateTime<Utc>,
    pub duration_ms: u64,
}

/// One observed exchange.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct TrafficRecord {
    pub id: RecordId,
    pub observed_at: DateTime<Utc>,
    pub method: String,
    pub url: String,
    pub protocol: Protocol,
    pub request_headers_text: String,
    pub request_body_text: String,
    /// `None` while the record is pending.
    pub response: Option<ResponseInfo>,
}

impl TrafficRecord {
    /// Create a pending record. Body text should already be materialized.
    pub fn new(
        method: String,
        url: String,
        request_headers_text: String,
        request_body_text: Option<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            observed_at: Utc::now(),
            protocol: Protocol::from_url(&url),
            method,
            url,
            request_headers_text,
            request_body_text: request_body_text.unwrap_or_else(|| NO_BODY.to_string()),
            response: None,
        }
    }

    pub fn status(&self) -> Option<u16> {
        self.response.as_ref().map(|r| r.status)
    }

    pub fn is_pending(&self) -> bool {
        self.response.is_none()
    }

    pub fn response_headers_text(&self) -> &str {
        self.response.as_ref().map(|r| r.headers_text.as_str()).unwrap_or("")
    }

    pub fn response_body_text(&self) -> &str {
        self.response.as_ref().map(|r| r.body_text.as_str()).unwrap_or("")
    }
}
