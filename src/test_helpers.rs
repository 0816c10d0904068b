// SPDX-FileCopyrightText: 2025 Alexandre Gomes Gaigalas <alganet@gmail.com>
//
// SPDX-License-Identifier: ISC

//! Shared test utilities to reduce duplication across test modules.

use crate::events::{RequestObserved, ResponseObserved};
use crate::record::{BodyCapture, RecordId, TrafficRecord};
use crate::state::CaptureStore;
use hyper::header::{HeaderMap, HeaderName, HeaderValue};

fn request_line(method: &str, url: &str) -> String {
    format!("{} {} HTTP/1.1\nhost: test\n", method, url)
}

/// Pending GET record for `url`, not attached to any store.
pub fn make_test_record(url: &str) -> TrafficRecord {
    TrafficRecord::new("GET".into(), url.into(), request_line("GET", url), None)
}

/// Append a pending GET record for `url` to `store`.
pub fn begin_test_record(store: &CaptureStore, url: &str) -> RecordId {
    store.begin_record("GET".into(), url.into(), request_line("GET", url), None)
}

/// Request event without a body
pub fn make_request(method: &str, url: &str) -> RequestObserved {
    RequestObserved {
        method: method.into(),
        url: url.into(),
        headers_text: request_line(method, url),
        content_type: None,
        body: BodyCapture::Empty,
    }
}

/// Response event without a body
pub fn make_response(url: &str, status: u16) -> ResponseObserved {
    ResponseObserved {
        url: url.into(),
        status,
        headers_text: format!("HTTP/1.1 {}\n", status),
        content_type: None,
        body: BodyCapture::Empty,
    }
}

pub fn make_headers_from_pairs(pairs: &[(&str, &str)]) -> HeaderMap {
    let mut h = HeaderMap::new();
    for (k, v) in pairs {
        h.append(
            HeaderName::from_bytes(k.as_bytes()).expect("valid header name"),
            HeaderValue::from_str(v).expect("valid header value"),
        );
    }
    h
}
