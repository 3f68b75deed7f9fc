//! # mathscan syntax
//!
//! Finds LaTeX-style math expressions in free-form text.
//!
//! The [`Scanner`] splits a text buffer into an ordered list of
//! [`Segment`]s, each either plain text or a math expression carrying its
//! raw delimited text, a display flag and the [`DelimiterKind`] that
//! matched. Recognised delimiters:
//!
//! | Delimiter      | Display | Notes                                   |
//! |----------------|---------|-----------------------------------------|
//! | `$$ ... $$`    | yes     |                                         |
//! | `$ ... $`      | no      | `\$` never opens or closes              |
//! | `\[ ... \]`    | yes     | nests                                   |
//! | `\( ... \)`    | no      | nests                                   |
//! | `[ ... ]`      | yes     | only if [`heuristic`] accepts the body  |
//! | `( ... )`      | no      | only if [`heuristic`] accepts the body  |
//!
//! This is not a LaTeX parser: the content of an expression is never
//! validated.
//!
//! ```
//! use mathscan_syntax::{scan, Segment};
//!
//! let input = "Euler: $e^{i\\pi} + 1 = 0$.";
//! let segments = scan(input);
//!
//! let rebuilt: String = segments.iter().map(Segment::raw).collect();
//! assert_eq!(rebuilt, input);
//! assert!(segments[1].is_math());
//! ```

pub mod delimiter;
pub mod heuristic;
pub mod scanner;
pub mod segment;

pub use delimiter::{Delimiter, DelimiterKind};
pub use heuristic::{MathHeuristic, Rejection, Signal, is_likely_math};
pub use scanner::{ScanOptions, Scanner, might_contain_math, scan, scan_with};
pub use segment::{MathSpan, Segment, has_math};
