// SPDX-FileCopyrightText: 2025 Alexandre Gomes Gaigalas <alganet@gmail.com>
//
// SPDX-License-Identifier: ISC

//! Lossless single-pass tokenizer for JSON text, used for colorized rendering.
//!
//! The scanner never fails: anything it does not recognize is emitted as
//! [`TokenClass::Other`], so concatenating every token reproduces the input.

/// Syntactic category of a token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenClass {
    /// One of `{ } [ ] , :`.
    Punctuation,
    /// Quoted string followed (ignoring whitespace) by `:`.
    Key,
    /// Any other quoted string.
    String,
    Number,
    /// `true` or `false`.
    Boolean,
    Null,
    /// Whitespace and anything unrecognized.
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Token<'a> {
    pub class: TokenClass,
    pub text: &'a str,
}

/// Iterator over the tokens of a JSON text.
#[derive(Debug, Clone)]
pub struct Scanner<'a> {
    src: &'a str,
    pos: usize,
}

/// Tokenize `src`.
pub fn scan(src: &str) -> Scanner<'_> {
    Scanner { src, pos: 0 }
}

fn is_punctuation(b: u8) -> bool {
    matches!(b, b'{' | b'}' | b'[' | b']' | b',' | b':')
}

fn is_number_start(b: u8) -> bool {
    b.is_ascii_digit() || matches!(b, b'-' | b'+' | b'.')
}

fn is_number_part(b: u8) -> bool {
    is_number_start(b) || matches!(b, b'e' | b'E')
}

impl<'a> Scanner<'a> {
    fn bytes(&self) -> &'a [u8] {
        self.src.as_bytes()
    }

    /// Class of the token starting at `at`, without consuming it.
    fn class_at(&self, at: usize) -> TokenClass {
        let rest = &self.bytes()[at..];
        match rest[0] {
            b if is_punctuation(b) => TokenClass::Punctuation,
            b'"' => TokenClass::String,
            b if is_number_start(b) => TokenClass::Number,
            _ if rest.starts_with(b"true") || rest.starts_with(b"false") => TokenClass::Boolean,
            _ if rest.starts_with(b"null") => TokenClass::Null,
            _ => TokenClass::Other,
        }
    }

    /// End offset of the string starting at `start` (one past the closing
    /// quote, or end of input when unterminated).
    fn string_end(&self, start: usize) -> usize {
        let bytes = self.bytes();
        let mut i = start + 1;
        while i < bytes.len() {
            match bytes[i] {
                b'\\' => i += 2,
                b'"' => return i + 1,
                _ => i += 1,
            }
        }
        bytes.len()
    }

    fn followed_by_colon(&self, from: usize) -> bool {
        self.bytes()[from..]
            .iter()
            .find(|b| !b.is_ascii_whitespace())
            .is_some_and(|&b| b == b':')
    }
}

impl<'a> Iterator for Scanner<'a> {
    type Item = Token<'a>;

    fn next(&mut self) -> Option<Token<'a>> {
        let bytes = self.bytes();
        let start = self.pos;
        if start >= bytes.len() {
            return None;
        }

        let mut class = self.class_at(start);
        let end = match class {
            TokenClass::Punctuation => start + 1,
            TokenClass::String => {
                let end = self.string_end(start);
                if self.followed_by_colon(end) {
                    class = TokenClass::Key;
                }
                end
            }
            TokenClass::Number => {
                let mut i = start + 1;
                while i < bytes.len() && is_number_part(bytes[i]) {
                    i += 1;
                }
                i
            }
            TokenClass::Boolean if bytes[start] == b't' => start + 4,
            TokenClass::Boolean => start + 5,
            TokenClass::Null => start + 4,
            TokenClass::Other | TokenClass::Key => {
                // Only ASCII bytes can begin another token, so the run always
                // ends on a char boundary.
                let mut i = start + 1;
                while i < bytes.len() && self.class_at(i) == TokenClass::Other {
                    i += 1;
                }
                i
            }
        };

        // A backslash escape at the very end can step past the input.
        let end = end.min(bytes.len());
        self.pos = end;
        Some(Token {
            class,
            text: &self.src[start..end],
        })
    }
}

impl std::iter::FusedIterator for Scanner<'_> {}
