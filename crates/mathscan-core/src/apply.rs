//! Replaces an aggregated sibling run with its segmented output.
//!
//! Plain segments come back as text nodes (a `\n` inside one becomes a
//! break node), math segments as rendered math nodes tagged processed.
//! The output goes in front of the first consumed unit, then every
//! consumed unit is removed.
//!
//! Rendering never fails the apply. A rejected expression is retried with
//! its original body, and if that fails too, the math node carries no
//! markup and shows the expression exactly as written.

use crate::aggregate::{BufferUnit, TextBuffer};
use crate::document::{Document, NewNode, RenderedMath, UnitKind};
use crate::error::{DocumentError, RenderError};
use crate::normalize::Normalizer;
use crate::render::MathRenderer;
use mathscan_syntax::{MathSpan, Segment};

/// What an [`apply`] call inserted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Applied<N> {
    /// New nodes in document order.
    pub inserted: Vec<N>,
    /// Math nodes among them.
    pub math: usize,
    /// Math nodes that show raw text because rendering failed.
    pub fallbacks: usize,
}

/// Swaps the units of `buffer` for the nodes built from `segments`.
///
/// Every unit must still be attached; if one is not, the document is left
/// untouched. If an insertion or a removal fails half-way, the nodes
/// inserted so far are removed again and any unit already removed is put
/// back from the buffer, so the run reads as it did before the call.
pub fn apply<D, R>(
    doc: &mut D,
    buffer: &TextBuffer<D::Node>,
    segments: &[Segment],
    renderer: &R,
    normalizer: Option<&Normalizer>,
) -> Result<Applied<D::Node>, DocumentError>
where
    D: Document,
    R: MathRenderer + ?Sized,
{
    let mut applied = Applied {
        inserted: Vec::new(),
        math: 0,
        fallbacks: 0,
    };
    let Some(first) = buffer.units().first().map(|u| u.node) else {
        return Ok(applied);
    };
    if let Some(node) = buffer.nodes().find(|&n| !doc.is_attached(n)) {
        return Err(DocumentError::detached(node));
    }

    let outputs = build_nodes(segments, renderer, normalizer);

    for output in outputs {
        let is_math = matches!(output, NewNode::Math(_));
        let fallback = matches!(&output, NewNode::Math(m) if m.markup.is_none());
        let result = doc.insert_before(first, output).and_then(|node| {
            applied.inserted.push(node);
            if is_math {
                doc.mark_processed(node)?;
            }
            Ok(node)
        });
        if let Err(e) = result {
            rollback(doc, &applied.inserted);
            return Err(e);
        }
        if is_math {
            applied.math += 1;
            if fallback {
                applied.fallbacks += 1;
            }
        }
    }

    let units = buffer.units();
    for (idx, unit) in units.iter().enumerate() {
        if let Err(e) = doc.remove(unit.node) {
            restore(doc, buffer, &units[..idx], unit.node);
            rollback(doc, &applied.inserted);
            return Err(e);
        }
    }
    Ok(applied)
}

/// Re-creates `removed` units in front of `reference`, in order.
fn restore<D: Document>(
    doc: &mut D,
    buffer: &TextBuffer<D::Node>,
    removed: &[BufferUnit<D::Node>],
    reference: D::Node,
) {
    for unit in removed {
        let node = match unit.kind {
            UnitKind::Break => NewNode::Break,
            _ => NewNode::Text(buffer.as_str()[unit.range.clone()].to_string()),
        };
        if let Err(e) = doc.insert_before(reference, node) {
            log::warn!("Could not restore {:?}: {}", unit.node, e);
        }
    }
}

fn rollback<D: Document>(doc: &mut D, inserted: &[D::Node]) {
    for &node in inserted {
        if let Err(e) = doc.remove(node) {
            log::warn!("Rollback could not remove {:?}: {}", node, e);
        }
    }
}

/// Turns segments into the nodes to insert, rendering math on the way.
pub fn build_nodes<R>(
    segments: &[Segment],
    renderer: &R,
    normalizer: Option<&Normalizer>,
) -> Vec<NewNode>
where
    R: MathRenderer + ?Sized,
{
    let mut nodes = Vec::new();
    for segment in segments {
        match segment {
            Segment::Text(text) => {
                for (idx, line) in text.split('\n').enumerate() {
                    if idx > 0 {
                        nodes.push(NewNode::Break);
                    }
                    if !line.is_empty() {
                        nodes.push(NewNode::Text(line.to_string()));
                    }
                }
            }
            Segment::Math(span) => {
                nodes.push(NewNode::Math(render_span(span, renderer, normalizer)))
            }
        }
    }
    nodes
}

/// Renders one span: normalized body first, then the body as written.
pub fn render_span<R>(
    span: &MathSpan,
    renderer: &R,
    normalizer: Option<&Normalizer>,
) -> RenderedMath
where
    R: MathRenderer + ?Sized,
{
    let markup = match render_body(span, renderer, normalizer) {
        Ok(markup) => Some(markup),
        Err(e) => {
            log::debug!("Could not render {:?} ({}); showing it as written", span.raw, e);
            None
        }
    };
    RenderedMath {
        raw: span.raw.clone(),
        display: span.display,
        markup,
    }
}

fn render_body<R>(
    span: &MathSpan,
    renderer: &R,
    normalizer: Option<&Normalizer>,
) -> Result<String, RenderError>
where
    R: MathRenderer + ?Sized,
{
    let body = span.body();
    if body.is_empty() {
        return Err(RenderError::Empty);
    }

    if let Some(normalizer) = normalizer {
        let normalized = normalizer.normalize(body);
        match renderer.render(&normalized, span.display) {
            Ok(markup) => return Ok(markup.0),
            Err(e) if normalized != body => {
                log::debug!(
                    "Normalized {:?} was rejected ({}), retrying as written",
                    normalized,
                    e
                );
            }
            Err(e) => return Err(e),
        }
    }
    renderer.render(body, span.display).map(|markup| markup.0)
}
