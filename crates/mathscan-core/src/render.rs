//! The math renderer seam.
//!
//! The pipeline hands every normalized expression to a [`MathRenderer`].
//! Real hosts plug in a LaTeX-to-MathML engine; [`MathMlRenderer`] is the
//! built-in one used by the CLI, which wraps the TeX source in a MathML
//! `<math>` element with an `application/x-tex` annotation so a downstream
//! engine (or a MathML-aware browser extension) can pick it up.
//!
//! Closures implement the trait too, which keeps tests short:
//!
//! ```
//! use mathscan_core::render::{MathMarkup, MathRenderer};
//! use mathscan_core::error::RenderError;
//!
//! let renderer = |latex: &str, _display: bool| -> Result<MathMarkup, RenderError> {
//!     Ok(MathMarkup(format!("<m>{}</m>", latex)))
//! };
//! assert_eq!(renderer.render("x", false).unwrap().0, "<m>x</m>");
//! ```

use crate::error::RenderError;

/// Markup produced by a renderer, inserted into the document as-is.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MathMarkup(pub String);

/// Turns a LaTeX expression into display markup.
///
/// Implementations must be side-effect free: the pipeline may call
/// `render` twice for one expression (normalized, then original).
pub trait MathRenderer {
    fn render(&self, latex: &str, display: bool) -> Result<MathMarkup, RenderError>;

    /// False while the renderer is still loading; the pipeline holds off until then.
    fn is_ready(&self) -> bool {
        true
    }
}

impl<F> MathRenderer for F
where
    F: Fn(&str, bool) -> Result<MathMarkup, RenderError>,
{
    fn render(&self, latex: &str, display: bool) -> Result<MathMarkup, RenderError> {
        self(latex, display)
    }
}

/// Wraps TeX source in a MathML element carrying it as an annotation.
///
/// Rejects empty input, unbalanced braces and unpaired `\left`/`\right`.
#[derive(Debug, Clone, Copy, Default)]
pub struct MathMlRenderer;

impl MathRenderer for MathMlRenderer {
    fn render(&self, latex: &str, display: bool) -> Result<MathMarkup, RenderError> {
        let latex = latex.trim();
        if latex.is_empty() {
            return Err(RenderError::Empty);
        }
        check_braces(latex)?;
        check_left_right(latex)?;

        let escaped = escape_html(latex);
        let mode = if display { "block" } else { "inline" };
        Ok(MathMarkup(format!(
            concat!(
                r#"<math xmlns="http://www.w3.org/1998/Math/MathML" display="{}">"#,
                "<semantics><mtext>{}</mtext>",
                r#"<annotation encoding="application/x-tex">{}</annotation>"#,
                "</semantics></math>"
            ),
            mode, escaped, escaped
        )))
    }
}

fn check_braces(latex: &str) -> Result<(), RenderError> {
    let mut depth = 0usize;
    let mut escaped = false;
    for (idx, c) in latex.char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match c {
            '\\' => escaped = true,
            '{' => depth += 1,
            '}' => {
                depth = depth
                    .checked_sub(1)
                    .ok_or(RenderError::UnbalancedBraces(idx))?;
            }
            _ => {}
        }
    }
    if depth > 0 {
        return Err(RenderError::UnbalancedBraces(latex.len()));
    }
    Ok(())
}

fn check_left_right(latex: &str) -> Result<(), RenderError> {
    let lefts = count_command(latex, "left");
    let rights = count_command(latex, "right");
    if lefts != rights {
        return Err(RenderError::UnbalancedLeftRight { lefts, rights });
    }
    Ok(())
}

/// Counts `\name` occurrences that are whole command names.
pub(crate) fn count_command(latex: &str, name: &str) -> usize {
    let needle = format!("\\{}", name);
    latex
        .match_indices(&needle)
        .filter(|(idx, _)| {
            !latex[idx + needle.len()..]
                .chars()
                .next()
                .is_some_and(|c| c.is_ascii_alphabetic())
        })
        .count()
}

/// Escapes text for HTML element content and attribute values.
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mathml_renderer_output() {
        let markup = MathMlRenderer.render("a < b", true).unwrap();
        assert!(
            markup
                .0
                .starts_with(r#"<math xmlns="http://www.w3.org/1998/Math/MathML" display="block">"#)
        );
        assert!(
            markup
                .0
                .contains(r#"<annotation encoding="application/x-tex">a &lt; b</annotation>"#)
        );

        let inline = MathMlRenderer.render("x", false).unwrap();
        assert!(inline.0.contains(r#"display="inline""#));
    }

    #[test]
    fn test_mathml_renderer_rejects_empty() {
        assert_eq!(MathMlRenderer.render("  ", false), Err(RenderError::Empty));
    }

    #[test]
    fn test_mathml_renderer_rejects_unbalanced_braces() {
        assert!(matches!(
            MathMlRenderer.render(r"\frac{a}{b", false),
            Err(RenderError::UnbalancedBraces(_))
        ));
        assert!(matches!(
            MathMlRenderer.render("a}", false),
            Err(RenderError::UnbalancedBraces(1))
        ));
        assert!(MathMlRenderer.render(r"\{ a \}", false).is_ok());
    }

    #[test]
    fn test_mathml_renderer_checks_left_right() {
        assert!(MathMlRenderer.render(r"\left( x \right)", false).is_ok());
        assert_eq!(
            MathMlRenderer.render(r"\left( x", false),
            Err(RenderError::UnbalancedLeftRight { lefts: 1, rights: 0 })
        );
        // \leftarrow is not \left
        assert!(MathMlRenderer.render(r"a \leftarrow b", false).is_ok());
    }

    #[test]
    fn test_count_command() {
        assert_eq!(count_command(r"\left( \left[ \leftarrow", "left"), 2);
        assert_eq!(count_command(r"\right", "right"), 1);
    }

    #[test]
    fn test_escape_html() {
        assert_eq!(
            escape_html(r#"<a href="x">&</a>"#),
            "&lt;a href=&quot;x&quot;&gt;&amp;&lt;/a&gt;"
        );
    }
}
