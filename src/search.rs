// SPDX-FileCopyrightText: 2025 Alexandre Gomes Gaigalas <alganet@gmail.com>
//
// SPDX-License-Identifier: ISC

//! Per-region incremental text search with wraparound navigation.
//!
//! Offsets are character (not byte) offsets. Matching is case-insensitive
//! and non-overlapping: after a match the scan resumes past its last
//! character.

use crate::record::TrafficRecord;
use std::collections::HashMap;

/// An independently searchable text pane of a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Region {
    RequestHeaders,
    RequestBody,
    ResponseHeaders,
    ResponseBody,
}

impl Region {
    pub const ALL: [Region; 4] = [
        Region::RequestHeaders,
        Region::RequestBody,
        Region::ResponseHeaders,
        Region::ResponseBody,
    ];

    /// The region's current text in `record`. Response regions are empty
    /// while the record is pending.
    pub fn text<'a>(&self, record: &'a TrafficRecord) -> &'a str {
        match self {
            Region::RequestHeaders => &record.request_headers_text,
            Region::RequestBody => &record.request_body_text,
            Region::ResponseHeaders => record.response_headers_text(),
            Region::ResponseBody => record.response_body_text(),
        }
    }
}

fn chars_eq_ignore_case(a: char, b: char) -> bool {
    a == b || a.to_lowercase().eq(b.to_lowercase())
}

/// Character offsets of every non-overlapping, case-insensitive occurrence
/// of `query` in `text`, ascending.
pub fn find_matches(text: &str, query: &str) -> Vec<usize> {
    let needle: Vec<char> = query.chars().collect();
    if needle.is_empty() {
        return Vec::new();
    }
    let hay: Vec<char> = text.chars().collect();

    let mut out = Vec::new();
    let mut i = 0;
    while i + needle.len() <= hay.len() {
        let hit = hay[i..i + needle.len()]
            .iter()
            .zip(&needle)
            .all(|(a, b)| chars_eq_ignore_case(*a, *b));
        if hit {
            out.push(i);
            i += needle.len();
        } else {
            i += 1;
        }
    }
    out
}

/// Search state of one region.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchState {
    query: String,
    matches: Vec<usize>,
    cursor: Option<usize>,
    has_text: bool,
}

impl SearchState {
    /// Recompute matches for `query` against `text` from scratch.
    pub fn evaluate(&mut self, query: &str, text: &str) {
        self.query = query.to_string();
        self.has_text = !text.is_empty();
        self.matches = find_matches(text, query);
        self.cursor = if self.matches.is_empty() { None } else { Some(0) };
    }

    /// Advance to the next match, wrapping after the last one.
    pub fn next(&mut self) -> Option<usize> {
        if self.matches.is_empty() {
            return None;
        }
        let next = self.cursor.map(|c| (c + 1) % self.matches.len()).unwrap_or(0);
        self.cursor = Some(next);
        Some(self.matches[next])
    }

    pub fn query(&self) -> &str {
        &self.query
    }

    pub fn matches(&self) -> &[usize] {
        &self.matches
    }

    pub fn cursor(&self) -> Option<usize> {
        self.cursor
    }

    /// Offset of the match under the cursor.
    pub fn current(&self) -> Option<usize> {
        self.cursor.map(|c| self.matches[c])
    }

    /// Result label for the search box.
    pub fn status(&self) -> String {
        if self.query.is_empty() {
            String::new()
        } else if !self.has_text {
            "No content".to_string()
        } else if let Some(c) = self.cursor {
            format!("{}/{} matches", c + 1, self.matches.len())
        } else {
            "No matches found".to_string()
        }
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }
}

/// Search states keyed by region.
#[derive(Debug, Clone, Default)]
pub struct SearchEngine {
    states: HashMap<Region, SearchState>,
}

impl SearchEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_query(&mut self, region: Region, query: &str, text: &str) {
        self.states.entry(region).or_default().evaluate(query, text);
    }

    pub fn next(&mut self, region: Region) -> Option<usize> {
        self.states.get_mut(&region).and_then(SearchState::next)
    }

    pub fn state(&self, region: Region) -> Option<&SearchState> {
        self.states.get(&region)
    }

    /// Re-run every non-empty query against fresh region text.
    pub fn reevaluate<'a>(&mut self, text_of: impl Fn(Region) -> &'a str) {
        for (region, state) in self.states.iter_mut() {
            if !state.query.is_empty() {
                let query = std::mem::take(&mut state.query);
                state.evaluate(&query, text_of(*region));
            }
        }
    }

    pub fn reset(&mut self) {
        self.states.clear();
    }
}

/// A run of text that is or is not a match.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Segment<'a> {
    pub text: &'a str,
    pub is_match: bool,
}

/// Split `text` into alternating plain and matched segments.
///
/// `offsets` are ascending character offsets as produced by [`find_matches`];
/// offsets that overlap a previous match or run past the end are ignored.
pub fn highlight<'a>(text: &'a str, offsets: &[usize], query_len: usize) -> Vec<Segment<'a>> {
    // Byte position of every char boundary, including the end.
    let bounds: Vec<usize> = text
        .char_indices()
        .map(|(b, _)| b)
        .chain(std::iter::once(text.len()))
        .collect();
    let char_count = bounds.len() - 1;

    let mut segments = Vec::new();
    let mut last = 0;
    if query_len > 0 {
        for &start in offsets {
            let end = match start.checked_add(query_len) {
                Some(end) if start >= last && end <= char_count => end,
                _ => continue,
            };
            if start > last {
                segments.push(Segment {
                    text: &text[bounds[last]..bounds[start]],
                    is_match: false,
                });
            }
            segments.push(Segment {
                text: &text[bounds[start]..bounds[end]],
                is_match: true,
            });
            last = end;
        }
    }
    if last < char_count {
        segments.push(Segment {
            text: &text[bounds[last]..],
            is_match: false,
        });
    }
    segments
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rstest::rstest;

    #[test]
    fn finds_case_insensitive_matches_and_wraps() {
        let mut s = SearchState::default();
        s.evaluate("abc", "abcABCabc");
        assert_eq!(s.matches(), &[0, 3, 6]);
        assert_eq!(s.cursor(), Some(0));
        assert_eq!(s.next(), Some(3));
        assert_eq!(s.next(), Some(6));
        assert_eq!(s.next(), Some(0));
    }

    #[rstest]
    #[case("aaaa", "aa", vec![0, 2])]
    #[case("aaa", "aa", vec![0])]
    #[case("Hello hello HELLO", "hello", vec![0, 6, 12])]
    #[case("short", "longer query", vec![])]
    #[case("ÉCOLE école", "école", vec![0, 6])]
    #[case("日本語の日本", "日本", vec![0, 4])]
    fn match_offsets(#[case] text: &str, #[case] query: &str, #[case] expected: Vec<usize>) {
        assert_eq!(find_matches(text, query), expected);
    }

    #[test]
    fn empty_query_clears_state() {
        let mut s = SearchState::default();
        s.evaluate("a", "aaa");
        s.evaluate("", "aaa");
        assert!(s.matches().is_empty());
        assert_eq!(s.cursor(), None);
        assert_eq!(s.next(), None);
        assert_eq!(s.status(), "");
    }

    #[test]
    fn no_matches_makes_next_a_noop() {
        let mut s = SearchState::default();
        s.evaluate("zzz", "abc");
        assert!(s.matches().is_empty());
        assert_eq!(s.next(), None);
        assert_eq!(s.cursor(), None);
        assert_eq!(s.status(), "No matches found");
    }

    #[rstest]
    #[case("x", "", "No content")]
    #[case("b", "abcb", "1/2 matches")]
    fn status_labels(#[case] query: &str, #[case] text: &str, #[case] expected: &str) {
        let mut s = SearchState::default();
        s.evaluate(query, text);
        assert_eq!(s.status(), expected);
    }

    #[test]
    fn status_tracks_cursor() {
        let mut s = SearchState::default();
        s.evaluate("b", "abcb");
        s.next();
        assert_eq!(s.status(), "2/2 matches");
        assert_eq!(s.current(), Some(3));
    }

    #[test]
    fn engine_keeps_regions_independent() {
        let mut e = SearchEngine::new();
        e.set_query(Region::RequestBody, "a", "a a a");
        e.set_query(Region::ResponseBody, "b", "b");

        assert_eq!(e.next(Region::RequestBody), Some(2));
        assert_eq!(e.state(Region::ResponseBody).and_then(|s| s.cursor()), Some(0));
        assert_eq!(e.next(Region::RequestHeaders), None);
        assert!(e.state(Region::RequestHeaders).is_none());
    }

    #[test]
    fn reevaluate_recomputes_active_queries() {
        let mut e = SearchEngine::new();
        e.set_query(Region::ResponseBody, "ok", "");
        e.set_query(Region::RequestBody, "", "ok");
        e.reevaluate(|r| match r {
            Region::ResponseBody => "ok ok",
            _ => "ok",
        });
        assert_eq!(e.state(Region::ResponseBody).map(|s| s.matches().to_vec()), Some(vec![0, 3]));
        assert_eq!(e.state(Region::RequestBody).map(|s| s.matches().len()), Some(0));
    }

    #[test]
    fn highlight_splits_segments() {
        let text = "abcABCx";
        let segs = highlight(text, &find_matches(text, "bc"), 2);
        let got: Vec<_> = segs.iter().map(|s| (s.text, s.is_match)).collect();
        assert_eq!(
            got,
            vec![("a", false), ("bc", true), ("A", false), ("BC", true), ("x", false)]
        );
    }

    #[test]
    fn highlight_handles_multibyte_and_bad_offsets() {
        let text = "ünï ünï";
        let segs = highlight(text, &[0, 1, 4, 40], 3);
        let got: Vec<_> = segs.iter().map(|s| (s.text, s.is_match)).collect();
        assert_eq!(got, vec![("ünï", true), (" ", false), ("ünï", true)]);
    }

    #[test]
    fn highlight_ignores_offsets_near_usize_max() {
        assert_eq!(
            highlight("abc", &[usize::MAX], 2),
            vec![Segment { text: "abc", is_match: false }]
        );
        let segs = highlight("abcabc", &[0, usize::MAX - 1], 3);
        let got: Vec<_> = segs.iter().map(|s| (s.text, s.is_match)).collect();
        assert_eq!(got, vec![("abc", true), ("abc", false)]);
    }

    #[test]
    fn highlight_without_matches_is_one_plain_segment() {
        assert_eq!(
            highlight("plain", &[], 3),
            vec![Segment { text: "plain", is_match: false }]
        );
        assert!(highlight("", &[], 0).is_empty());
    }

    proptest! {
        #[test]
        fn next_visits_every_match_then_wraps(
            text in "[abAB ]{0,40}",
            query in "[abAB]{1,3}",
        ) {
            let mut s = SearchState::default();
            s.evaluate(&query, &text);
            let k = s.matches().len();
            prop_assume!(k >= 1);

            let first = s.matches()[0];
            let mut seen = Vec::new();
            for _ in 0..k {
                seen.push(s.next().unwrap());
            }
            // Starting from cursor 0, k advances visit 1..k-1 then 0.
            let mut expected: Vec<usize> = s.matches()[1..].to_vec();
            expected.push(first);
            prop_assert_eq!(seen, expected);
            prop_assert_eq!(s.next(), s.matches().get(1).copied().or(Some(first)));
        }

        #[test]
        fn offsets_are_strictly_increasing_and_non_overlapping(
            text in "[aA]{0,30}",
            query in "[aA]{1,4}",
        ) {
            let offs = find_matches(&text, &query);
            let qlen = query.chars().count();
            for w in offs.windows(2) {
                prop_assert!(w[0] + qlen <= w[1]);
            }
        }

        #[test]
        fn highlight_is_lossless(text in ".{0,30}", query in ".{1,3}") {
            let offs = find_matches(&text, &query);
            let joined: String = highlight(&text, &offs, query.chars().count())
                .iter()
                .map(|s| s.text)
                .collect();
            prop_assert_eq!(joined, text);
        }
    }
}
