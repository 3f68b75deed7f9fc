//! Decides whether the content of a bare `[...]` or `(...)` span is math.
//!
//! Backslash and dollar delimiters are unambiguous. Bare brackets and
//! parentheses are everywhere in prose, so they are only promoted to math
//! when their content carries at least one [`Signal`] and no [`Rejection`]
//! applies. This is a best-effort precision/recall trade-off: it will miss
//! some expressions and capture the occasional parenthetical that happens to
//! contain an underscore.
//!
//! ```
//! use mathscan_syntax::heuristic::{MathHeuristic, Signal};
//!
//! let heuristic = MathHeuristic::default();
//! assert!(heuristic.is_likely_math(r"\alpha + \beta"));
//! assert!(!heuristic.is_likely_math("3"));
//! assert!(!heuristic.is_likely_math("see above"));
//!
//! // Only look for real commands, ignore stray underscores.
//! let strict = MathHeuristic::with_signals(vec![Signal::Command]);
//! assert!(!strict.is_likely_math("file_name"));
//! ```

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

static COMMAND: Lazy<Regex> = Lazy::new(|| Regex::new(r"\\[a-zA-Z]+").unwrap());

static FUNCTION_NAME: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"\b(?:sin|cos|tan|cot|sec|csc|arcsin|arccos|arctan|sinh|cosh|tanh|log|ln|exp|lim|det|gcd)\s*(?:[(\[{]|[a-zA-Z0-9]\b)",
    )
    .unwrap()
});

static SCRIPT: Lazy<Regex> = Lazy::new(|| Regex::new(r"[\^_][^A-Za-z0-9]").unwrap());

static NUMERIC: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*[+-]?\d+(?:[.,]\d+)*\s*$").unwrap());

static DEFAULT: Lazy<MathHeuristic> = Lazy::new(MathHeuristic::default);

/// A single piece of evidence that content is mathematical.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Signal {
    /// Any of `_ ^ { } \`.
    ControlCharacter,
    /// A backslash command such as `\alpha` or `\frac`.
    Command,
    /// Operators and relations from the Unicode math blocks (∫∑∏√∞±≤≥≠ ...).
    MathSymbol,
    GreekLetter,
    /// `sin x`, `log(n)` and friends.
    FunctionName,
    /// `^` or `_` followed by a non-alphanumeric, e.g. `x^{2}`.
    Script,
}

impl Signal {
    pub const ALL: [Signal; 6] = [
        Signal::ControlCharacter,
        Signal::Command,
        Signal::MathSymbol,
        Signal::GreekLetter,
        Signal::FunctionName,
        Signal::Script,
    ];

    pub fn fires(self, content: &str) -> bool {
        match self {
            Signal::ControlCharacter => content
                .chars()
                .any(|c| matches!(c, '_' | '^' | '{' | '}' | '\\')),
            Signal::Command => COMMAND.is_match(content),
            Signal::MathSymbol => content.chars().any(is_math_symbol),
            Signal::GreekLetter => content.chars().any(is_greek),
            Signal::FunctionName => FUNCTION_NAME.is_match(content),
            Signal::Script => SCRIPT.is_match(content),
        }
    }
}

/// Content that is never math, whatever signals it carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Rejection {
    /// Citations and list markers: `(3)`, `[42]`, `( 1.5 )`.
    Numeric,
    /// Link targets such as `(https://example.com/a_b)`.
    Link,
}

impl Rejection {
    pub const ALL: [Rejection; 2] = [Rejection::Numeric, Rejection::Link];

    pub fn applies(self, content: &str) -> bool {
        match self {
            Rejection::Numeric => NUMERIC.is_match(content),
            Rejection::Link => {
                let trimmed = content.trim_start();
                content.contains("://") || trimmed.starts_with("www.")
            }
        }
    }
}

/// A configurable predicate over bare bracket/paren content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MathHeuristic {
    pub signals: Vec<Signal>,
    pub rejections: Vec<Rejection>,
}

impl Default for MathHeuristic {
    fn default() -> Self {
        Self {
            signals: Signal::ALL.to_vec(),
            rejections: Rejection::ALL.to_vec(),
        }
    }
}

impl MathHeuristic {
    /// A heuristic that only listens to `signals`, keeping every rejection.
    pub fn with_signals(signals: Vec<Signal>) -> Self {
        Self {
            signals,
            rejections: Rejection::ALL.to_vec(),
        }
    }

    pub fn is_likely_math(&self, content: &str) -> bool {
        if self.rejections.iter().any(|r| r.applies(content)) {
            return false;
        }
        self.signals.iter().any(|s| s.fires(content))
    }

    /// The first signal that fires, for diagnostics.
    pub fn matching_signal(&self, content: &str) -> Option<Signal> {
        if self.rejections.iter().any(|r| r.applies(content)) {
            return None;
        }
        self.signals.iter().copied().find(|s| s.fires(content))
    }
}

/// [`MathHeuristic::is_likely_math`] with the default rule set.
pub fn is_likely_math(content: &str) -> bool {
    DEFAULT.is_likely_math(content)
}

fn is_math_symbol(c: char) -> bool {
    matches!(c, '±' | '×' | '÷' | '¬' | '′' | '″')
        || ('\u{2200}'..='\u{22FF}').contains(&c) // Mathematical Operators
        || ('\u{27C0}'..='\u{27EF}').contains(&c) // Misc Mathematical Symbols-A
        || ('\u{2980}'..='\u{29FF}').contains(&c) // Misc Mathematical Symbols-B
        || ('\u{2A00}'..='\u{2AFF}').contains(&c) // Supplemental Operators
}

fn is_greek(c: char) -> bool {
    ('\u{0391}'..='\u{03A9}').contains(&c) || ('\u{03B1}'..='\u{03C9}').contains(&c)
}
