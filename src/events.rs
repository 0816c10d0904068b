// SPDX-FileCopyrightText: 2025 Alexandre Gomes Gaigalas <alganet@gmail.com>
//
// SPDX-License-Identifier: ISC

//! Events delivered by the proxy engine, and the channel that carries them
//! to the pipeline.

use crate::record::BodyCapture;
use hyper::HeaderMap;
use tokio::sync::mpsc;

/// A request was seen by the proxy, before being forwarded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestObserved {
    pub method: String,
    pub url: String,
    pub headers_text: String,
    pub content_type: Option<String>,
    pub body: BodyCapture,
}

/// A response was received for a previously observed request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseObserved {
    pub url: String,
    pub status: u16,
    pub headers_text: String,
    pub content_type: Option<String>,
    pub body: BodyCapture,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProxyEvent {
    Request(RequestObserved),
    Response(ResponseObserved),
}

/// Sending half handed to the proxy engine. Sends never block and never fail
/// the caller.
#[derive(Debug, Clone)]
pub struct EventSender {
    tx: mpsc::UnboundedSender<ProxyEvent>,
}

pub type EventReceiver = mpsc::UnboundedReceiver<ProxyEvent>;

pub fn channel() -> (EventSender, EventReceiver) {
    let (tx, rx) = mpsc::unbounded_channel();
    (EventSender { tx }, rx)
}

impl EventSender {
    pub fn send(&self, event: ProxyEvent) {
        if self.tx.send(event).is_err() {
            tracing::trace!("event receiver closed, dropping event");
        }
    }

    pub fn request(&self, event: RequestObserved) {
        self.send(ProxyEvent::Request(event));
    }

    pub fn response(&self, event: ResponseObserved) {
        self.send(ProxyEvent::Response(event));
    }
}

/// Render headers as `Name: value` lines. Non UTF-8 values are decoded lossily.
pub fn header_lines(headers: &HeaderMap) -> String {
    let mut out = String::new();
    for (name, value) in headers.iter() {
        out.push_str(name.as_str());
        out.push_str(": ");
        out.push_str(&String::from_utf8_lossy(value.as_bytes()));
        out.push('\n');
    }
    out
}

/// Header text for a request: the request line followed by the header lines.
pub fn request_headers_text(
    method: &str,
    path_and_query: &str,
    version: &str,
    headers: &HeaderMap,
) -> String {
    format!("{} {} {}\n{}", method, path_and_query, version, header_lines(headers))
}

/// Header text for a response: the status line followed by the header lines.
pub fn response_headers_text(version: &str, status: hyper::StatusCode, headers: &HeaderMap) -> String {
    let status_line = match status.canonical_reason() {
        Some(reason) => format!("{} {} {}", version, status.as_u16(), reason),
        None => format!("{} {}", version, status.as_u16()),
    };
    format!("{}\n{}", status_line, header_lines(headers))
}

/// The `Content-Type` header value, if present and readable.
pub fn content_type(headers: &HeaderMap) -> Option<String> {
    headers
        .get(hyper::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}
