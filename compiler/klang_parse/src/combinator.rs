//! Backtracking parser combinators with explicit offsets.
//!
//! Every parser is a plain function taking `(source, offset)` and returning
//! either `(value, next_offset)` or a [`Failure`]. There is no shared
//! cursor: offsets are threaded explicitly, so backtracking is just reusing
//! an earlier offset, and positions can be reconstructed from any offset by
//! scanning the consumed input.
//!
//! Failures carry the offset they occurred at plus the token descriptions
//! that were expected there. [`Failure::merge`] keeps the failure that got
//! furthest, which is what makes `alt` error messages point at the real
//! problem instead of the first alternative's.

use klang_ir::Span;

/// Result of running one parser at one offset.
pub type PResult<T> = Result<(T, usize), Failure>;

/// A parse failure: where, and what was expected there.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct Failure {
    pub offset: usize,
    pub expected: Vec<&'static str>,
}

impl Failure {
    pub fn new(offset: usize, expected: &'static str) -> Self {
        Failure {
            offset,
            expected: vec![expected],
        }
    }

    /// Combine two failures, preferring the one that consumed more input.
    /// Failures at the same offset merge their expectations.
    #[must_use]
    pub fn merge(mut self, other: Failure) -> Failure {
        match self.offset.cmp(&other.offset) {
            std::cmp::Ordering::Less => other,
            std::cmp::Ordering::Greater => self,
            std::cmp::Ordering::Equal => {
                for e in other.expected {
                    if !self.expected.contains(&e) {
                        self.expected.push(e);
                    }
                }
                self
            }
        }
    }
}

fn is_ident_start(b: u8) -> bool {
    b.is_ascii_alphabetic()
}

fn is_ident_continue(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_' || b == b'-'
}

/// Skip whitespace (spaces, tabs, newlines) and return the new offset.
/// Comments are statements in Klang, not whitespace, so they are not
/// skipped here.
pub fn skip_ws(src: &str, at: usize) -> usize {
    let bytes = src.as_bytes();
    let mut i = at;
    while i < bytes.len() && matches!(bytes[i], b' ' | b'\t' | b'\r' | b'\n') {
        i += 1;
    }
    i
}

/// Match an exact byte sequence at the offset, without skipping whitespace.
pub fn tag(src: &str, at: usize, expected: &'static str) -> PResult<Span> {
    if src.as_bytes()[at.min(src.len())..].starts_with(expected.as_bytes()) {
        let end = at + expected.len();
        Ok((Span::new(at as u32, end as u32), end))
    } else {
        Err(Failure::new(at, expected))
    }
}

/// Match an exact token after skipping leading whitespace.
pub fn token(src: &str, at: usize, expected: &'static str) -> PResult<Span> {
    tag(src, skip_ws(src, at), expected)
}

/// Match a keyword: the exact word, not followed by an identifier
/// character (so `var` does not match the start of `variance`).
pub fn keyword(src: &str, at: usize, word: &'static str) -> PResult<Span> {
    let (span, next) = token(src, at, word)?;
    match src.as_bytes().get(next) {
        Some(&b) if is_ident_continue(b) => Err(Failure::new(span.start as usize, word)),
        _ => Ok((span, next)),
    }
}

/// Match an identifier: `[a-zA-Z][a-zA-Z0-9_-]*`.
pub fn ident(src: &str, at: usize) -> PResult<(String, Span)> {
    let at = skip_ws(src, at);
    let bytes = src.as_bytes();
    if at >= bytes.len() || !is_ident_start(bytes[at]) {
        return Err(Failure::new(at, "identifier"));
    }
    let mut end = at + 1;
    while end < bytes.len() && is_ident_continue(bytes[end]) {
        end += 1;
    }
    Ok((
        (src[at..end].to_string(), Span::new(at as u32, end as u32)),
        end,
    ))
}

/// Consume `0 | [1-9][0-9]*` starting exactly at `at`; returns the end
/// offset.
fn decimal_digits(src: &str, at: usize) -> Option<usize> {
    let bytes = src.as_bytes();
    match bytes.get(at)? {
        b'0' => Some(at + 1),
        b'1'..=b'9' => {
            let mut end = at + 1;
            while end < bytes.len() && bytes[end].is_ascii_digit() {
                end += 1;
            }
            Some(end)
        }
        _ => None,
    }
}

/// Match an integer literal: `-?(0|[1-9][0-9]*)`.
pub fn integer(src: &str, at: usize) -> PResult<(i32, Span)> {
    let at = skip_ws(src, at);
    let digits_at = if src.as_bytes().get(at) == Some(&b'-') {
        at + 1
    } else {
        at
    };
    let Some(end) = decimal_digits(src, digits_at) else {
        return Err(Failure::new(at, "integer"));
    };
    let value = src[at..end]
        .parse::<i32>()
        .map_err(|_| Failure::new(at, "integer"))?;
    Ok(((value, Span::new(at as u32, end as u32)), end))
}

/// Match a float literal: the integer rule, then a mandatory decimal point
/// and at least one fractional digit.
pub fn float(src: &str, at: usize) -> PResult<(f32, Span)> {
    let at = skip_ws(src, at);
    let digits_at = if src.as_bytes().get(at) == Some(&b'-') {
        at + 1
    } else {
        at
    };
    let Some(int_end) = decimal_digits(src, digits_at) else {
        return Err(Failure::new(at, "float"));
    };
    let bytes = src.as_bytes();
    if bytes.get(int_end) != Some(&b'.') {
        return Err(Failure::new(at, "float"));
    }
    let mut end = int_end + 1;
    if !bytes.get(end).is_some_and(u8::is_ascii_digit) {
        return Err(Failure::new(at, "float"));
    }
    while end < bytes.len() && bytes[end].is_ascii_digit() {
        end += 1;
    }
    let value = src[at..end]
        .parse::<f32>()
        .map_err(|_| Failure::new(at, "float"))?;
    Ok(((value, Span::new(at as u32, end as u32)), end))
}

/// Match a string literal with `\" \\ \/ \b \f \n \r \t` escapes.
pub fn string_literal(src: &str, at: usize) -> PResult<(String, Span)> {
    let at = skip_ws(src, at);
    if src.as_bytes().get(at) != Some(&b'"') {
        return Err(Failure::new(at, "string"));
    }
    let mut value = String::new();
    let mut chars = src[at + 1..].char_indices();
    while let Some((i, c)) = chars.next() {
        match c {
            '"' => {
                let end = at + 1 + i + 1;
                return Ok(((value, Span::new(at as u32, end as u32)), end));
            }
            '\\' => {
                let Some((j, escaped)) = chars.next() else {
                    return Err(Failure::new(at + 1 + i + 1, "escape sequence"));
                };
                let resolved = match escaped {
                    '"' => '"',
                    '\\' => '\\',
                    '/' => '/',
                    'b' => '\u{8}',
                    'f' => '\u{c}',
                    'n' => '\n',
                    'r' => '\r',
                    't' => '\t',
                    _ => return Err(Failure::new(at + 1 + j, "escape sequence")),
                };
                value.push(resolved);
            }
            _ => value.push(c),
        }
    }
    Err(Failure::new(src.len(), "\""))
}

/// Try a parser; on failure, back up and return `None`.
pub fn opt<T>(src: &str, at: usize, p: impl FnOnce(&str, usize) -> PResult<T>) -> (Option<T>, usize) {
    match p(src, at) {
        Ok((value, next)) => (Some(value), next),
        Err(_) => (None, at),
    }
}

/// Apply a parser zero or more times. Returns the items, the offset after
/// the last success, and the failure that ended the repetition (useful for
/// reporting what a following parser actually expected).
pub fn many0<T>(
    src: &str,
    at: usize,
    p: fn(&str, usize) -> PResult<T>,
) -> (Vec<T>, usize, Failure) {
    let mut items = Vec::new();
    let mut at = at;
    loop {
        match p(src, at) {
            Ok((value, next)) if next > at => {
                items.push(value);
                at = next;
            }
            // Zero-progress success would loop forever; treat as done.
            Ok(_) => return (items, at, Failure::new(at, "input")),
            Err(failure) => return (items, at, failure),
        }
    }
}

/// Try each parser in order at the same offset; first success wins.
/// Failures are merged so the error names the furthest expectation.
pub fn alt<T>(src: &str, at: usize, parsers: &[fn(&str, usize) -> PResult<T>]) -> PResult<T> {
    let mut failure: Option<Failure> = None;
    for p in parsers {
        match p(src, at) {
            ok @ Ok(_) => return ok,
            Err(f) => {
                failure = Some(match failure {
                    Some(prev) => prev.merge(f),
                    None => f,
                });
            }
        }
    }
    Err(failure.unwrap_or_else(|| Failure::new(at, "input")))
}

/// A possibly-empty comma-separated list. After a comma, an element is
/// mandatory.
pub fn comma_separated<T>(
    src: &str,
    at: usize,
    p: fn(&str, usize) -> PResult<T>,
) -> PResult<Vec<T>> {
    let mut items = Vec::new();
    let Ok((first, mut at)) = p(src, at) else {
        return Ok((items, at));
    };
    items.push(first);
    loop {
        let Ok((_, after_comma)) = token(src, at, ",") else {
            return Ok((items, at));
        };
        let (value, next) = p(src, after_comma)?;
        items.push(value);
        at = next;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tag_and_token() {
        let Ok((span, next)) = token("  foo", 0, "foo") else {
            panic!("expected match");
        };
        assert_eq!(span, Span::new(2, 5));
        assert_eq!(next, 5);
        assert!(tag("foo", 0, "bar").is_err());
    }

    #[test]
    fn test_keyword_boundary() {
        assert!(keyword("var x", 0, "var").is_ok());
        assert!(keyword("variance", 0, "var").is_err());
        assert!(keyword("var-x", 0, "var").is_err());
    }

    #[test]
    fn test_ident() {
        let Ok(((name, span), next)) = ident(" osc_1-a ", 0) else {
            panic!("expected identifier");
        };
        assert_eq!(name, "osc_1-a");
        assert_eq!(span, Span::new(1, 8));
        assert_eq!(next, 8);
        assert!(ident("1abc", 0).is_err());
        assert!(ident("_abc", 0).is_err());
    }

    #[test]
    fn test_integer() {
        let Ok(((v, _), _)) = integer("-42", 0) else {
            panic!("expected integer");
        };
        assert_eq!(v, -42);
        let Ok(((v, _), next)) = integer("0", 0) else {
            panic!("expected integer");
        };
        assert_eq!((v, next), (0, 1));
        // No leading zeros: only the first digit matches.
        let Ok(((v, _), next)) = integer("0123", 0) else {
            panic!("expected integer");
        };
        assert_eq!((v, next), (0, 1));
        assert!(integer("abc", 0).is_err());
    }

    #[test]
    fn test_float_requires_fraction() {
        let Ok(((v, _), next)) = float("1.5", 0) else {
            panic!("expected float");
        };
        assert!((v - 1.5).abs() < f32::EPSILON);
        assert_eq!(next, 3);
        assert!(float("1.", 0).is_err());
        assert!(float("1", 0).is_err());
        assert!(float(".5", 0).is_err());
    }

    #[test]
    fn test_string_escapes() {
        let Ok(((v, span), _)) = string_literal(r#""a\n\"b\\" "#, 0) else {
            panic!("expected string");
        };
        assert_eq!(v, "a\n\"b\\");
        assert_eq!(span.start, 0);
        assert!(string_literal(r#""unterminated"#, 0).is_err());
        assert!(string_literal(r#""bad \q escape""#, 0).is_err());
    }

    #[test]
    fn test_failure_merge_prefers_furthest() {
        let near = Failure::new(3, "a");
        let far = Failure::new(7, "b");
        assert_eq!(near.clone().merge(far.clone()), far.clone());
        assert_eq!(far.clone().merge(near), far);
    }

    #[test]
    fn test_failure_merge_same_offset_collects() {
        let a = Failure::new(3, "a");
        let b = Failure::new(3, "b");
        let merged = a.merge(b);
        assert_eq!(merged.expected, vec!["a", "b"]);
    }

    #[test]
    fn test_comma_separated() {
        fn item(src: &str, at: usize) -> PResult<(i32, Span)> {
            integer(src, at)
        }
        let Ok((items, next)) = comma_separated("1, 2,3", 0, item) else {
            panic!("expected list");
        };
        assert_eq!(items.iter().map(|(v, _)| *v).collect::<Vec<_>>(), vec![1, 2, 3]);
        assert_eq!(next, 6);

        let Ok((items, next)) = comma_separated(")", 0, item) else {
            panic!("expected empty list");
        };
        assert!(items.is_empty());
        assert_eq!(next, 0);

        // Trailing comma demands an element.
        assert!(comma_separated::<(i32, Span)>("1,)", 0, item).is_err());
    }

    #[test]
    fn test_many0_reports_trailing_failure() {
        fn item(src: &str, at: usize) -> PResult<(i32, Span)> {
            integer(src, at)
        }
        let (items, at, failure) = many0("1 2 x", 0, item);
        assert_eq!(items.len(), 2);
        assert_eq!(at, 3);
        assert_eq!(failure.offset, 4);
    }
}
