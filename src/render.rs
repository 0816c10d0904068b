// SPDX-FileCopyrightText: 2025 Alexandre Gomes Gaigalas <alganet@gmail.com>
//
// SPDX-License-Identifier: ISC

//! Text blocks for the console stream and the log file.

use crate::json_format;
use crate::record::TrafficRecord;
use crate::token::{self, TokenClass};
use chrono::Local;
use console::{Color, Style};

const RULE: &str = "==================================================================";
const SUBRULE: &str = "------------------------------------------------------------------";
const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Fixed console colour for each token class.
pub fn token_color(class: TokenClass) -> Color {
    match class {
        TokenClass::Punctuation => Color::White,
        TokenClass::Key => Color::Cyan,
        TokenClass::String => Color::Green,
        TokenClass::Number => Color::Yellow,
        TokenClass::Boolean => Color::Magenta,
        TokenClass::Null => Color::Color256(8),
        TokenClass::Other => Color::Color256(7),
    }
}

#[derive(Clone, Copy)]
enum Painter {
    Plain,
    Ansi,
}

impl Painter {
    fn paint(self, text: &str, color: Color) -> String {
        match self {
            Painter::Plain => text.to_string(),
            Painter::Ansi => Style::new()
                .fg(color)
                .force_styling(true)
                .apply_to(text)
                .to_string(),
        }
    }

    fn body(self, text: &str, section: Color) -> String {
        match self {
            Painter::Ansi if json_format::is_json(text) => token::scan(text)
                .map(|t| self.paint(t.text, token_color(t.class)))
                .collect(),
            _ => self.paint(text, section),
        }
    }
}

/// Header text without its request/status line.
fn header_lines(text: &str) -> &str {
    text.split_once('\n').map(|(_, rest)| rest).unwrap_or("")
}

fn push_line(out: &mut String, painter: Painter, color: Color, line: &str) {
    out.push_str(&painter.paint(line, color));
    out.push('\n');
}

fn block(record: &TrafficRecord, painter: Painter) -> String {
    let req = Color::Cyan;
    let resp = Color::Green;
    let mut out = String::new();

    let stamp = record
        .observed_at
        .with_timezone(&Local)
        .format(TIMESTAMP_FORMAT);
    push_line(&mut out, painter, req, RULE);
    push_line(&mut out, painter, req, &format!("Timestamp: {}", stamp));
    push_line(&mut out, painter, req, RULE);
    push_line(&mut out, painter, req, "REQUEST");
    push_line(&mut out, painter, req, SUBRULE);
    push_line(
        &mut out,
        painter,
        req,
        &format!("{} {}", record.method, record.url),
    );
    push_line(&mut out, painter, req, "Headers:");
    out.push_str(&painter.paint(header_lines(&record.request_headers_text), req));
    push_line(&mut out, painter, req, "Body:");
    out.push_str(&painter.body(&record.request_body_text, req));
    out.push('\n');

    push_line(&mut out, painter, resp, "RESPONSE");
    push_line(&mut out, painter, resp, SUBRULE);
    match &record.response {
        None => push_line(&mut out, painter, resp, "Status: pending"),
        Some(r) => {
            push_line(&mut out, painter, resp, &format!("Status: {}", r.status));
            push_line(&mut out, painter, resp, &format!("Duration: {} ms", r.duration_ms));
            push_line(&mut out, painter, resp, "Headers:");
            out.push_str(&painter.paint(header_lines(&r.headers_text), resp));
            push_line(&mut out, painter, resp, "Body:");
            out.push_str(&painter.body(&r.body_text, resp));
            out.push('\n');
        }
    }
    push_line(&mut out, painter, resp, RULE);
    out
}

/// Uncoloured block, as written to the log file.
pub fn plain_block(record: &TrafficRecord) -> String {
    block(record, Painter::Plain)
}

/// Block with ANSI colours: request cyan, response green, JSON bodies
/// coloured per token.
pub fn colored_block(record: &TrafficRecord) -> String {
    block(record, Painter::Ansi)
}
