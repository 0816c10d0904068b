// SPDX-FileCopyrightText: 2025 Alexandre Gomes Gaigalas <alganet@gmail.com>
//
// SPDX-License-Identifier: ISC

//! JSON body detection and pretty-printing.
//!
//! Every failure path degrades to returning the body unchanged; nothing in
//! here can fail the caller.

use serde::de::IgnoredAny;
use serde_json::Value;

/// Whether a body should be treated as JSON, judged by the declared content
/// type first and by its leading character otherwise.
pub fn looks_like_json(body: &str, content_type: Option<&str>) -> bool {
    if content_type.is_some_and(|ct| ct.to_ascii_lowercase().contains("json")) {
        return true;
    }
    let trimmed = body.trim_start();
    trimmed.starts_with('{') || trimmed.starts_with('[')
}

/// Whether `text` parses as a JSON document.
pub fn is_json(text: &str) -> bool {
    !text.trim().is_empty() && serde_json::from_str::<IgnoredAny>(text).is_ok()
}

/// Pretty-print `body` when it is JSON, returning `None` otherwise.
///
/// Object keys keep their original order and numbers keep their precision.
/// Exponents are normalized, so `1E3` comes back as `1e+3`.
pub fn try_format(body: &str, content_type: Option<&str>) -> Option<String> {
    if body.trim().is_empty() || !looks_like_json(body, content_type) {
        return None;
    }
    let value: Value = match serde_json::from_str(body) {
        Ok(v) => v,
        Err(e) => {
            tracing::trace!(error = %e, "body looked like JSON but did not parse");
            return None;
        }
    };
    serde_json::to_string_pretty(&value).ok()
}

/// Pretty-print `body` when it is JSON, otherwise return it as-is.
pub fn format(body: &str, content_type: Option<&str>) -> String {
    try_format(body, content_type).unwrap_or_else(|| body.to_string())
}
