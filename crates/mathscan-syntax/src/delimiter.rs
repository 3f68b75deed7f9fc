use serde::{Deserialize, Serialize};

/// An immutable open/close pair marking the boundary of a math expression.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Delimiter {
    pub open: &'static str,
    pub close: &'static str,
    /// Whether the expression is laid out as a block rather than inline.
    pub display: bool,
}

impl Delimiter {
    pub const DISPLAY_DOLLARS: Delimiter = Delimiter {
        open: "$$",
        close: "$$",
        display: true,
    };
    pub const INLINE_DOLLARS: Delimiter = Delimiter {
        open: "$",
        close: "$",
        display: false,
    };
    pub const DISPLAY_BRACKETS: Delimiter = Delimiter {
        open: "\\[",
        close: "\\]",
        display: true,
    };
    pub const INLINE_PARENS: Delimiter = Delimiter {
        open: "\\(",
        close: "\\)",
        display: false,
    };
    /// `[...]` without a backslash. Only valid when the content looks like math.
    pub const BARE_BRACKETS: Delimiter = Delimiter {
        open: "[",
        close: "]",
        display: true,
    };
    /// `(...)` without a backslash. Only valid when the content looks like math.
    pub const BARE_PARENS: Delimiter = Delimiter {
        open: "(",
        close: ")",
        display: false,
    };
}

/// Which delimiter matched a math segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DelimiterKind {
    /// `$$ ... $$`
    DisplayDollars,
    /// `$ ... $`
    InlineDollars,
    /// `\[ ... \]`
    DisplayBrackets,
    /// `\( ... \)`
    InlineParens,
    /// `[ ... ]`
    BareBrackets,
    /// `( ... )`
    BareParens,
}

impl DelimiterKind {
    /// All kinds, in the order the scanner tries them at a given position.
    pub const PRIORITY: [DelimiterKind; 6] = [
        DelimiterKind::DisplayDollars,
        DelimiterKind::InlineDollars,
        DelimiterKind::DisplayBrackets,
        DelimiterKind::InlineParens,
        DelimiterKind::BareBrackets,
        DelimiterKind::BareParens,
    ];

    pub fn delimiter(self) -> Delimiter {
        match self {
            DelimiterKind::DisplayDollars => Delimiter::DISPLAY_DOLLARS,
            DelimiterKind::InlineDollars => Delimiter::INLINE_DOLLARS,
            DelimiterKind::DisplayBrackets => Delimiter::DISPLAY_BRACKETS,
            DelimiterKind::InlineParens => Delimiter::INLINE_PARENS,
            DelimiterKind::BareBrackets => Delimiter::BARE_BRACKETS,
            DelimiterKind::BareParens => Delimiter::BARE_PARENS,
        }
    }

    pub fn open(self) -> &'static str {
        self.delimiter().open
    }

    pub fn close(self) -> &'static str {
        self.delimiter().close
    }

    pub fn is_display(self) -> bool {
        self.delimiter().display
    }

    /// True for the bracket/paren kinds that need the heuristic to accept them.
    pub fn is_heuristic(self) -> bool {
        matches!(self, DelimiterKind::BareBrackets | DelimiterKind::BareParens)
    }

    /// Identifies the delimiter a raw math span was written with.
    ///
    /// Longer open sequences are checked first so `$$x$$` is not read as
    /// inline dollars around `$x$`.
    pub fn detect(raw: &str) -> Option<DelimiterKind> {
        Self::PRIORITY.into_iter().find(|kind| {
            let delim = kind.delimiter();
            raw.len() >= delim.open.len() + delim.close.len()
                && raw.starts_with(delim.open)
                && raw.ends_with(delim.close)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_flags() {
        assert!(DelimiterKind::DisplayDollars.is_display());
        assert!(!DelimiterKind::InlineDollars.is_display());
        assert!(DelimiterKind::DisplayBrackets.is_display());
        assert!(!DelimiterKind::InlineParens.is_display());
        assert!(DelimiterKind::BareBrackets.is_display());
        assert!(!DelimiterKind::BareParens.is_display());
    }

    #[test]
    fn test_only_bare_kinds_are_heuristic() {
        let heuristic: Vec<_> = DelimiterKind::PRIORITY
            .into_iter()
            .filter(|k| k.is_heuristic())
            .collect();
        assert_eq!(
            heuristic,
            vec![DelimiterKind::BareBrackets, DelimiterKind::BareParens]
        );
    }

    #[test]
    fn test_detect() {
        assert_eq!(
            DelimiterKind::detect("$$x$$"),
            Some(DelimiterKind::DisplayDollars)
        );
        assert_eq!(
            DelimiterKind::detect("$x$"),
            Some(DelimiterKind::InlineDollars)
        );
        assert_eq!(
            DelimiterKind::detect(r"\[x\]"),
            Some(DelimiterKind::DisplayBrackets)
        );
        assert_eq!(
            DelimiterKind::detect(r"\(x\)"),
            Some(DelimiterKind::InlineParens)
        );
        assert_eq!(
            DelimiterKind::detect("(x)"),
            Some(DelimiterKind::BareParens)
        );
        assert_eq!(DelimiterKind::detect("$"), None);
        assert_eq!(DelimiterKind::detect("plain"), None);
    }
}
