//! Best-effort rewriting of math bodies before rendering.
//!
//! ## Rules
//!
//! Applied in order to the body of a math segment (delimiters stripped):
//!
//! 1. **Whitespace**: every run of whitespace, line breaks included, becomes
//!    one space. `\\` before a line break stays a row break (`\\ `), a lone
//!    `\` before a line break becomes a control space (`\ `).
//! 2. **Protection**: `\widetilde`, `\widehat`, `\tilde`, `\hat` and `\bar`
//!    together with their argument are swapped for placeholder tokens so the
//!    rules below cannot touch them. A body that already contains the
//!    private-use placeholder characters is not protected at all.
//! 3. **`\left`/`\right`**: rewritten according to [`LeftRightMode`], but
//!    only when every `\left` and `\right` in the body has a rewrite.
//!    `\left. x \right|` is left as written, since dropping `\left.` alone
//!    would leave `\right|` unpaired.
//! 4. **Fractions**: `\frac`, `\dfrac` and `\tfrac` arguments written without
//!    braces (`\frac12`, `\frac(a+b)(c)`) are braced in one left-to-right
//!    sweep. The sweep resumes right after each rewritten command name, so
//!    fractions nested in a rewritten argument are reached too.
//! 5. Placeholders are restored.
//!
//! Normalization never has the last word: if the renderer rejects the
//! result, the pipeline retries with the original body.
//!
//! ```
//! use mathscan_core::normalize::normalize;
//!
//! assert_eq!(normalize("\\left( a\n+ b \\right)"), r"\lparen a + b \rparen");
//! assert_eq!(normalize(r"\frac12"), r"\frac{1}{2}");
//! assert_eq!(normalize(r"\hat{\left(x\right)}"), r"\hat{\left(x\right)}");
//! ```

use crate::render::count_command;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

static WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());

/// `\left`/`\right` followed by a delimiter, with the replacement in each mode.
static LEFT_RIGHT: Lazy<Vec<(Regex, &'static str, &'static str)>> = Lazy::new(|| {
    [
        (r"\\left\s*\(", r"\lparen ", "("),
        (r"\\right\s*\)", r"\rparen ", ")"),
        (r"\\left\s*\[", r"\lbrack ", "["),
        (r"\\right\s*\]", r"\rbrack ", "]"),
        (r"\\left\s*\\\{", r"\lbrace ", r"\{"),
        (r"\\right\s*\\\}", r"\rbrace ", r"\}"),
        (r"\\left\s*\.", "", ""),
        (r"\\right\s*\.", "", ""),
    ]
    .into_iter()
    .map(|(pattern, command, bare)| (Regex::new(pattern).unwrap(), command, bare))
    .collect()
});

const PROTECTED: [&str; 5] = ["widetilde", "widehat", "tilde", "hat", "bar"];
const FRACTIONS: [&str; 3] = ["frac", "dfrac", "tfrac"];

const PLACEHOLDER_OPEN: char = '\u{E000}';
const PLACEHOLDER_CLOSE: char = '\u{E001}';

/// What to do with `\left(`, `\right]` and friends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LeftRightMode {
    /// `\left(` → `\lparen`, `\right]` → `\rbrack`, ...; `\left.` is dropped.
    #[default]
    Commands,
    /// `\left(` → `(`, `\right\}` → `\}`, ...; `\left.` is dropped.
    Bare,
    /// Leave `\left`/`\right` alone.
    Keep,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Normalizer {
    pub left_right: LeftRightMode,
}

impl Normalizer {
    pub fn new(left_right: LeftRightMode) -> Self {
        Self { left_right }
    }

    pub fn normalize(&self, body: &str) -> String {
        let collapsed = collapse_whitespace(body);
        let (text, protected) = if collapsed.contains([PLACEHOLDER_OPEN, PLACEHOLDER_CLOSE]) {
            (collapsed, Vec::new())
        } else {
            protect(&collapsed)
        };
        let text = self.rewrite_left_right(&text);
        let text = brace_fractions(&text);
        collapse_whitespace(&restore(&text, &protected))
    }

    fn rewrite_left_right(&self, text: &str) -> String {
        if self.left_right == LeftRightMode::Keep {
            return text.to_string();
        }
        let rewritable: usize = LEFT_RIGHT
            .iter()
            .map(|(pattern, _, _)| pattern.find_iter(text).count())
            .sum();
        if rewritable != count_command(text, "left") + count_command(text, "right") {
            return text.to_string();
        }
        LEFT_RIGHT
            .iter()
            .fold(text.to_string(), |acc, (pattern, command, bare)| {
                let replacement = match self.left_right {
                    LeftRightMode::Commands => *command,
                    _ => *bare,
                };
                pattern
                    .replace_all(&acc, regex::NoExpand(replacement))
                    .into_owned()
            })
    }
}

/// [`Normalizer::normalize`] with the default `\left`/`\right` handling.
pub fn normalize(body: &str) -> String {
    Normalizer::default().normalize(body)
}

fn collapse_whitespace(text: &str) -> String {
    WHITESPACE.replace_all(text.trim(), " ").into_owned()
}

/// Replaces protected commands and their argument with placeholders.
fn protect(text: &str) -> (String, Vec<String>) {
    let mut out = String::with_capacity(text.len());
    let mut saved = Vec::new();
    let mut rest = text;

    while let Some((start, name_len)) = find_command(rest, &PROTECTED) {
        let after_name = &rest[start + name_len..];
        let arg_start = after_name.len() - after_name.trim_start().len();
        let Some(arg) = take_argument(&after_name[arg_start..]) else {
            out.push_str(&rest[..start + name_len]);
            rest = after_name;
            continue;
        };
        let end = start + name_len + arg_start + arg.len;
        out.push_str(&rest[..start]);
        out.push(PLACEHOLDER_OPEN);
        out.push_str(&saved.len().to_string());
        out.push(PLACEHOLDER_CLOSE);
        saved.push(rest[start..end].to_string());
        rest = &rest[end..];
    }
    out.push_str(rest);
    (out, saved)
}

fn restore(text: &str, saved: &[String]) -> String {
    let mut out = text.to_string();
    // Later placeholders never nest inside earlier ones, so order is irrelevant.
    for (idx, original) in saved.iter().enumerate() {
        let token = format!("{}{}{}", PLACEHOLDER_OPEN, idx, PLACEHOLDER_CLOSE);
        out = out.replace(&token, original);
    }
    out
}

/// Braces fraction arguments until a fixed point is reached.
fn brace_fractions(text: &str) -> String {
    let mut current = text.to_string();
    let mut from = 0;
    while let Some((next, resume)) = brace_next_fraction(&current, from) {
        current = next;
        from = resume;
    }
    current
}

/// Rewrites the first fraction at or after `from` that has an unbraced
/// argument, returning the new text and the end of its command name.
fn brace_next_fraction(text: &str, from: usize) -> Option<(String, usize)> {
    let mut offset = from;
    while let Some((start, name_len)) = find_command(&text[offset..], &FRACTIONS) {
        let name_end = offset + start + name_len;
        let mut cursor = name_end;
        let mut rewritten = String::new();
        let mut changed = false;

        for _ in 0..2 {
            let rest = &text[cursor..];
            let skip = rest.len() - rest.trim_start().len();
            let Some(arg) = take_argument(&rest[skip..]) else {
                break;
            };
            let arg_text = &rest[skip..skip + arg.len];
            if arg.kind == ArgKind::Braced {
                rewritten.push_str(arg_text);
            } else {
                rewritten.push('{');
                rewritten.push_str(arg_text);
                rewritten.push('}');
                changed = true;
            }
            cursor += skip + arg.len;
        }

        if changed {
            let text = format!("{}{}{}", &text[..name_end], rewritten, &text[cursor..]);
            return Some((text, name_end));
        }
        offset = name_end;
    }
    None
}

/// Finds the first `\name` for one of `names` that is a whole command.
///
/// Returns the byte offset of the backslash and the length of `\name`.
fn find_command(text: &str, names: &[&str]) -> Option<(usize, usize)> {
    let bytes = text.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] != b'\\' {
            i += 1;
            continue;
        }
        let letters = text[i + 1..]
            .bytes()
            .take_while(u8::is_ascii_alphabetic)
            .count();
        if letters == 0 {
            // `\\`, `\{` and the like: skip the escaped character too.
            i += 2;
            continue;
        }
        let name = &text[i + 1..i + 1 + letters];
        if names.contains(&name) {
            return Some((i, letters + 1));
        }
        i += letters + 1;
    }
    None
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ArgKind {
    Braced,
    Parenthesized,
    Token,
}

#[derive(Debug, Clone, Copy)]
struct Argument {
    kind: ArgKind,
    len: usize,
}

/// Reads one macro argument at the start of `text`.
fn take_argument(text: &str) -> Option<Argument> {
    let first = text.chars().next()?;
    match first {
        '{' => balanced(text, '{', '}').map(|len| Argument {
            kind: ArgKind::Braced,
            len,
        }),
        '(' => balanced(text, '(', ')').map(|len| Argument {
            kind: ArgKind::Parenthesized,
            len,
        }),
        '}' | ')' | ']' | '&' | '^' | '_' => None,
        '\\' => {
            let letters = text[1..]
                .bytes()
                .take_while(u8::is_ascii_alphabetic)
                .count();
            let len = if letters > 0 {
                1 + letters
            } else {
                1 + text[1..].chars().next()?.len_utf8()
            };
            Some(Argument {
                kind: ArgKind::Token,
                len,
            })
        }
        PLACEHOLDER_OPEN => text.find(PLACEHOLDER_CLOSE).map(|end| Argument {
            kind: ArgKind::Token,
            len: end + PLACEHOLDER_CLOSE.len_utf8(),
        }),
        c => Some(Argument {
            kind: ArgKind::Token,
            len: c.len_utf8(),
        }),
    }
}

/// Length of the balanced group opening at the start of `text`, skipping escapes.
fn balanced(text: &str, open: char, close: char) -> Option<usize> {
    let mut depth = 0usize;
    let mut escaped = false;
    for (idx, c) in text.char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        if c == '\\' {
            escaped = true;
        } else if c == open {
            depth += 1;
        } else if c == close {
            depth -= 1;
            if depth == 0 {
                return Some(idx + c.len_utf8());
            }
        }
    }
    None
}
