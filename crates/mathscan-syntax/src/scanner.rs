use crate::delimiter::DelimiterKind;
use crate::heuristic::MathHeuristic;
use crate::segment::{MathSpan, Segment};
use once_cell::sync::Lazy;
use once_cell::unsync::OnceCell;
use std::collections::HashMap;

static DEFAULT_OPTIONS: Lazy<ScanOptions> = Lazy::new(ScanOptions::default);

/// Knobs for the [`Scanner`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanOptions {
    /// Promote bare `[...]` and `(...)` spans whose content looks like math.
    pub heuristic_brackets: bool,
    /// The predicate used for bare spans.
    pub heuristic: MathHeuristic,
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self {
            heuristic_brackets: true,
            heuristic: MathHeuristic::default(),
        }
    }
}

impl ScanOptions {
    /// Cheap pre-check: false means no delimiter can possibly match in `text`.
    pub fn might_match(&self, text: &str) -> bool {
        if self.heuristic_brackets {
            text.contains(['$', '[', '('])
        } else {
            text.contains('$') || text.contains("\\[") || text.contains("\\(")
        }
    }
}

/// A single-pass delimiter scanner.
///
/// ## Overview
///
/// The scanner walks the input left to right and splits it into
/// [`Segment`]s: runs of plain text and math expressions with their
/// delimiters. The segments are gap-free and non-overlapping, so
/// concatenating their raw text gives back the input exactly.
///
/// At each position the delimiters are tried in a fixed order:
///
/// 1. `$$ ... $$` (display)
/// 2. `$ ... $` (inline)
/// 3. `\[ ... \]` and `\( ... \)`, with nesting depth
/// 4. bare `[ ... ]` and `( ... )`, only if the content passes the heuristic
///
/// A delimiter preceded by an unescaped backslash (`\$`) never opens or
/// closes a match. An open delimiter without a close is not a match; its
/// first character is kept as text and scanning resumes one character later.
///
/// ## Examples
///
/// ```
/// use mathscan_syntax::{Scanner, ScanOptions, Segment, DelimiterKind};
///
/// let options = ScanOptions::default();
/// let segments: Vec<_> = Scanner::new("Let $x$ be real", &options).collect();
///
/// assert_eq!(segments.len(), 3);
/// assert_eq!(segments[0], Segment::Text("Let ".into()));
/// match &segments[1] {
///     Segment::Math(span) => {
///         assert_eq!(span.raw, "$x$");
///         assert_eq!(span.kind, DelimiterKind::InlineDollars);
///     }
///     other => panic!("expected math, got {:?}", other),
/// }
/// ```
pub struct Scanner<'a> {
    /// The buffer being scanned.
    input: &'a str,
    options: &'a ScanOptions,
    /// Current byte position.
    position: usize,
    /// Whether the byte at `position` follows an odd run of backslashes.
    escaped: bool,
    /// Open position to match end for every `\[`, `\(`, `[` and `(` that
    /// has a partner, built on first use.
    pairs: OnceCell<HashMap<usize, usize>>,
    /// Start of the plain text run not yet emitted.
    last_emit: usize,
    /// A math segment found right after a text run, emitted on the next call.
    pending: Option<Segment>,
}

impl<'a> Scanner<'a> {
    pub fn new(input: &'a str, options: &'a ScanOptions) -> Self {
        Self {
            input,
            options,
            position: 0,
            escaped: false,
            pairs: OnceCell::new(),
            last_emit: 0,
            pending: None,
        }
    }

    /// Scans the whole input.
    pub fn scan(self) -> Vec<Segment> {
        self.collect()
    }

    /// Tries every delimiter at the current position, returning the end of the match.
    fn match_at(&self) -> Option<(usize, DelimiterKind)> {
        let pos = self.position;
        let rest = &self.input[pos..];
        let first = *rest.as_bytes().first()?;
        if !matches!(first, b'$' | b'\\' | b'[' | b'(') || self.escaped {
            return None;
        }

        if rest.starts_with("$$") {
            // No fallback to inline dollars at the same position.
            return self
                .match_dollars(pos, "$$")
                .map(|end| (end, DelimiterKind::DisplayDollars));
        }
        if first == b'$' {
            return self
                .match_dollars(pos, "$")
                .map(|end| (end, DelimiterKind::InlineDollars));
        }
        if first == b'\\' {
            return [DelimiterKind::DisplayBrackets, DelimiterKind::InlineParens]
                .into_iter()
                .find(|kind| rest.starts_with(kind.open()))
                .and_then(|kind| self.pair_end(pos).map(|end| (end, kind)));
        }
        if !self.options.heuristic_brackets {
            return None;
        }
        let kind = if first == b'[' {
            DelimiterKind::BareBrackets
        } else {
            DelimiterKind::BareParens
        };
        self.match_bare(pos).map(|end| (end, kind))
    }

    /// Finds the next unescaped `delim` after the opening one at `pos`.
    fn match_dollars(&self, pos: usize, delim: &str) -> Option<usize> {
        let bytes = self.input.as_bytes();
        let mut escaped = false;
        for (i, &b) in bytes.iter().enumerate().skip(pos + delim.len()) {
            if b == b'$' && !escaped && self.input[i..].starts_with(delim) {
                return Some(i + delim.len());
            }
            escaped = b == b'\\' && !escaped;
        }
        None
    }

    /// Matches a bare `[ ... ]` or `( ... )` and asks the heuristic.
    fn match_bare(&self, pos: usize) -> Option<usize> {
        let end = self.pair_end(pos)?;
        let content = &self.input[pos + 1..end - 1];
        self.options.heuristic.is_likely_math(content).then_some(end)
    }

    fn pair_end(&self, pos: usize) -> Option<usize> {
        self.pairs.get_or_init(|| pair_delimiters(self.input)).get(&pos).copied()
    }

    fn advance(&mut self) {
        let c = self.input[self.position..].chars().next();
        self.escaped = c == Some('\\') && !self.escaped;
        self.position += c.map_or(1, char::len_utf8);
    }
}

/// Pairs every bracket delimiter in `input` with its close in one pass.
///
/// `\[ ... \]` and `\( ... \)` nest across lines, each kind counted on its
/// own. Bare `[ ... ]` and `( ... )` pair up within a line only, and a
/// backslash before a line break ends the line early. Any other backslash
/// pair is an escape and is skipped whole. An open's partner is the close
/// that brings its depth back to zero, so looking it up here gives the same
/// answer as counting forward from the open.
fn pair_delimiters(input: &str) -> HashMap<usize, usize> {
    let bytes = input.as_bytes();
    let mut ends = HashMap::new();
    // Index 0 holds brackets, 1 holds parens.
    let mut nested: [Vec<usize>; 2] = Default::default();
    let mut bare: [Vec<usize>; 2] = Default::default();

    // Only ASCII bytes are inspected, so stepping byte-wise never
    // misreads a multi-byte character.
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'\\' => {
                match bytes.get(i + 1).copied() {
                    Some(b'[') => nested[0].push(i),
                    Some(b'(') => nested[1].push(i),
                    Some(b']') => close(&mut nested[0], i + 2, &mut ends),
                    Some(b')') => close(&mut nested[1], i + 2, &mut ends),
                    Some(b'\n') => bare.iter_mut().for_each(Vec::clear),
                    _ => {}
                }
                i += 2;
                continue;
            }
            b'\n' => bare.iter_mut().for_each(Vec::clear),
            b'[' => bare[0].push(i),
            b'(' => bare[1].push(i),
            b']' => close(&mut bare[0], i + 1, &mut ends),
            b')' => close(&mut bare[1], i + 1, &mut ends),
            _ => {}
        }
        i += 1;
    }
    ends
}

fn close(opens: &mut Vec<usize>, end: usize, ends: &mut HashMap<usize, usize>) {
    if let Some(open) = opens.pop() {
        ends.insert(open, end);
    }
}

impl Iterator for Scanner<'_> {
    type Item = Segment;

    fn next(&mut self) -> Option<Self::Item> {
        if let Some(segment) = self.pending.take() {
            return Some(segment);
        }

        while self.position < self.input.len() {
            let Some((end, kind)) = self.match_at() else {
                self.advance();
                continue;
            };

            let start = self.position;
            let text_start = self.last_emit;
            let math = Segment::Math(MathSpan::new(&self.input[start..end], kind));
            self.position = end;
            self.escaped = false;
            self.last_emit = end;

            if start > text_start {
                self.pending = Some(math);
                return Some(Segment::Text(self.input[text_start..start].to_string()));
            }
            return Some(math);
        }

        if self.last_emit < self.input.len() {
            let text = self.input[self.last_emit..].to_string();
            self.last_emit = self.input.len();
            return Some(Segment::Text(text));
        }
        None
    }
}

/// Scans `input` with the default options.
pub fn scan(input: &str) -> Vec<Segment> {
    Scanner::new(input, &DEFAULT_OPTIONS).scan()
}

/// Scans `input` with explicit options.
pub fn scan_with(input: &str, options: &ScanOptions) -> Vec<Segment> {
    Scanner::new(input, options).scan()
}

/// [`ScanOptions::might_match`] with the default options.
pub fn might_contain_math(text: &str) -> bool {
    DEFAULT_OPTIONS.might_match(text)
}
