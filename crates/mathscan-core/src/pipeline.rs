//! The per-unit pipeline: aggregate → scan → normalize → render → apply.
//!
//! A [`Pipeline`] is configured once and then run over text units handed
//! to it by the scheduler. Each unit is processed atomically: by the time
//! [`Pipeline::process_unit`] returns, the document either holds the full
//! replacement for the unit's sibling run or is unchanged.

use crate::aggregate::aggregate;
use crate::apply::apply;
use crate::config::Config;
use crate::document::Document;
use crate::error::DocumentError;
use crate::normalize::Normalizer;
use crate::render::MathRenderer;
use mathscan_syntax::{ScanOptions, Segment, has_math, scan_with};
use serde::Serialize;

/// A snapshot of the settings a pipeline run uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PipelineContext {
    pub renderer_ready: bool,
    pub debug: bool,
}

/// What happened to one text unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnitOutcome {
    /// Not a candidate any more (removed, processed, verbatim) or the
    /// renderer is not ready yet.
    Skipped,
    /// Scanned, nothing to replace. The document is untouched.
    NoMath,
    /// The sibling run was replaced.
    Applied { math: usize, fallbacks: usize },
}

/// Totals over a batch of units.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BatchReport {
    pub visited: usize,
    pub skipped: usize,
    pub unchanged: usize,
    pub applied: usize,
    pub math: usize,
    pub fallbacks: usize,
    /// Units that hit a structural error and were left alone.
    pub failed: usize,
}

impl BatchReport {
    pub fn record(&mut self, outcome: UnitOutcome) {
        self.visited += 1;
        match outcome {
            UnitOutcome::Skipped => self.skipped += 1,
            UnitOutcome::NoMath => self.unchanged += 1,
            UnitOutcome::Applied { math, fallbacks } => {
                self.applied += 1;
                self.math += math;
                self.fallbacks += fallbacks;
            }
        }
    }

    pub fn record_failure(&mut self) {
        self.visited += 1;
        self.failed += 1;
    }

    pub fn merge(&mut self, other: BatchReport) {
        self.visited += other.visited;
        self.skipped += other.skipped;
        self.unchanged += other.unchanged;
        self.applied += other.applied;
        self.math += other.math;
        self.fallbacks += other.fallbacks;
        self.failed += other.failed;
    }
}

pub struct Pipeline<R> {
    renderer: R,
    options: ScanOptions,
    normalizer: Option<Normalizer>,
    debug: bool,
}

impl<R: MathRenderer> Pipeline<R> {
    pub fn new(renderer: R, config: &Config) -> Self {
        Self {
            renderer,
            options: config.scan_options(),
            normalizer: config.normalize.then(|| Normalizer::new(config.left_right)),
            debug: config.debug,
        }
    }

    pub fn renderer(&self) -> &R {
        &self.renderer
    }

    pub fn is_ready(&self) -> bool {
        self.renderer.is_ready()
    }

    pub fn context(&self) -> PipelineContext {
        PipelineContext {
            renderer_ready: self.is_ready(),
            debug: self.debug,
        }
    }

    pub fn set_debug(&mut self, debug: bool) {
        self.debug = debug;
    }

    /// Runs the whole pipeline for the sibling run around `node`.
    pub fn process_unit<D>(&self, doc: &mut D, node: D::Node) -> Result<UnitOutcome, DocumentError>
    where
        D: Document,
    {
        if !doc.is_candidate(node) || !self.renderer.is_ready() {
            return Ok(UnitOutcome::Skipped);
        }
        let Some(buffer) = aggregate(doc, node) else {
            return Ok(UnitOutcome::Skipped);
        };
        if !self.options.might_match(buffer.as_str()) {
            return Ok(UnitOutcome::NoMath);
        }

        let segments = scan_with(buffer.as_str(), &self.options);
        if self.debug {
            trace_segments(&segments);
        }
        if !has_math(&segments) {
            return Ok(UnitOutcome::NoMath);
        }

        let applied = apply(doc, &buffer, &segments, &self.renderer, self.normalizer.as_ref())?;
        Ok(UnitOutcome::Applied {
            math: applied.math,
            fallbacks: applied.fallbacks,
        })
    }

    /// Processes `nodes` in order. A failing unit is logged and skipped.
    pub fn process_units<D>(&self, doc: &mut D, nodes: &[D::Node]) -> BatchReport
    where
        D: Document,
    {
        let mut report = BatchReport::default();
        for &node in nodes {
            match self.process_unit(doc, node) {
                Ok(outcome) => report.record(outcome),
                Err(e) => {
                    log::warn!("Skipping text unit {:?}: {}", node, e);
                    report.record_failure();
                }
            }
        }
        report
    }

    /// Discovers and processes every candidate under `root`.
    pub fn process_subtree<D>(&self, doc: &mut D, root: D::Node) -> BatchReport
    where
        D: Document,
    {
        let nodes = doc.discover(root);
        self.process_units(doc, &nodes)
    }
}

fn trace_segments(segments: &[Segment]) {
    for segment in segments {
        match segment {
            Segment::Text(text) => log::debug!("text {:?}", text),
            Segment::Math(span) => log::debug!("math {:?} {:?}", span.kind, span.raw),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::{ElementKind, Tree};
    use crate::error::RenderError;
    use crate::render::{MathMarkup, MathMlRenderer};

    fn echo(latex: &str, _display: bool) -> Result<MathMarkup, RenderError> {
        Ok(MathMarkup(format!("<m>{}</m>", latex)))
    }

    struct Loading;

    impl MathRenderer for Loading {
        fn render(&self, _latex: &str, _display: bool) -> Result<MathMarkup, RenderError> {
            Err(RenderError::NotReady)
        }

        fn is_ready(&self) -> bool {
            false
        }
    }

    #[test]
    fn test_process_unit_outcomes() {
        let pipeline = Pipeline::new(echo, &Config::default());
        let mut tree = Tree::from_text("plain words\n\nsee $x$ and $y$");
        let units = tree.discover(tree.root());

        assert_eq!(pipeline.process_unit(&mut tree, units[0]), Ok(UnitOutcome::NoMath));
        assert_eq!(
            pipeline.process_unit(&mut tree, units[1]),
            Ok(UnitOutcome::Applied { math: 2, fallbacks: 0 })
        );
        // Already replaced.
        assert_eq!(pipeline.process_unit(&mut tree, units[1]), Ok(UnitOutcome::Skipped));
    }

    #[test]
    fn test_normalize_can_be_disabled() {
        let config = Config {
            normalize: false,
            ..Config::default()
        };
        let pipeline = Pipeline::new(echo, &config);
        let mut tree = Tree::from_text(r"$\frac12$");
        let root = tree.root();
        let report = pipeline.process_subtree(&mut tree, root);
        assert_eq!(report.math, 1);

        let math = tree.math_nodes(tree.root());
        assert_eq!(
            tree.math(math[0]).and_then(|m| m.markup.as_deref()),
            Some(r"<m>\frac12</m>")
        );
    }

    #[test]
    fn test_brackets_follow_config() {
        let config = Config {
            heuristic_brackets: false,
            ..Config::default()
        };
        let pipeline = Pipeline::new(echo, &config);
        let mut tree = Tree::from_text(r"where (\alpha) holds");
        let root = tree.root();
        let report = pipeline.process_subtree(&mut tree, root);
        assert_eq!(report.unchanged, 1);
        assert!(tree.math_nodes(tree.root()).is_empty());
    }

    #[test]
    fn test_not_ready_renderer_skips() {
        let pipeline = Pipeline::new(Loading, &Config::default());
        let mut tree = Tree::from_text("$x$");
        let root = tree.root();
        let report = pipeline.process_subtree(&mut tree, root);
        assert_eq!(report.skipped, 1);
        assert_eq!(tree.text_content(tree.root()), "$x$");
        assert!(!pipeline.context().renderer_ready);
    }

    #[test]
    fn test_consumed_siblings_are_skipped() {
        let mut tree = Tree::new();
        let para = tree.append_element(tree.root(), ElementKind::Paragraph).unwrap();
        tree.append_text(para, "$a").unwrap();
        tree.append_text(para, "+b$").unwrap();

        let pipeline = Pipeline::new(MathMlRenderer, &Config::default());
        let root = tree.root();
        let report = pipeline.process_subtree(&mut tree, root);
        assert_eq!(report.visited, 2);
        assert_eq!(report.applied, 1);
        assert_eq!(report.skipped, 1);
        assert_eq!(report.math, 1);
    }

    #[test]
    fn test_report_merge() {
        let mut total = BatchReport::default();
        let mut batch = BatchReport::default();
        batch.record(UnitOutcome::Applied { math: 2, fallbacks: 1 });
        batch.record_failure();
        total.merge(batch);
        total.merge(batch);
        assert_eq!(total.visited, 4);
        assert_eq!(total.math, 4);
        assert_eq!(total.fallbacks, 2);
        assert_eq!(total.failed, 2);
    }
}
