use crate::delimiter::DelimiterKind;
use serde::{Deserialize, Serialize};

/// A math expression found by the scanner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MathSpan {
    /// The matched text, delimiters included.
    pub raw: String,
    pub display: bool,
    pub kind: DelimiterKind,
}

impl MathSpan {
    pub fn new(raw: impl Into<String>, kind: DelimiterKind) -> Self {
        Self {
            raw: raw.into(),
            display: kind.is_display(),
            kind,
        }
    }

    /// The expression with its delimiters stripped and surrounding whitespace trimmed.
    pub fn body(&self) -> &str {
        let open = self.kind.open().len();
        let close = self.kind.close().len();
        if self.raw.len() < open + close {
            return "";
        }
        self.raw[open..self.raw.len() - close].trim()
    }
}

/// A contiguous span of a scanned buffer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum Segment {
    Text(String),
    Math(MathSpan),
}

impl Segment {
    /// The exact buffer text this segment covers.
    pub fn raw(&self) -> &str {
        match self {
            Segment::Text(text) => text,
            Segment::Math(span) => &span.raw,
        }
    }

    pub fn is_math(&self) -> bool {
        matches!(self, Segment::Math(_))
    }
}

/// Returns true if at least one segment is math.
///
/// A scan that yields no math means there is nothing to do for the buffer.
pub fn has_math(segments: &[Segment]) -> bool {
    segments.iter().any(Segment::is_math)
}
