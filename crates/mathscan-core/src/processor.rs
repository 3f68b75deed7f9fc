//! The control surface.
//!
//! [`MathProcessor`] owns a document, a [`Pipeline`] and a [`Scheduler`],
//! and exposes what a host needs: start up once the renderer is ready,
//! rescan everything, scan one subtree on demand, forward change events,
//! flip debug tracing, and report its state.
//!
//! ```
//! use mathscan_core::config::Config;
//! use mathscan_core::document::Tree;
//! use mathscan_core::processor::MathProcessor;
//! use mathscan_core::render::MathMlRenderer;
//!
//! let tree = Tree::from_text("Euler: $e^{i\\pi} + 1 = 0$");
//! let mut processor = MathProcessor::new(tree, MathMlRenderer, &Config::default());
//! processor.initialize();
//!
//! assert!(processor.state().initialized);
//! assert!(processor.document().to_html().contains("math-container"));
//! ```

use crate::config::Config;
use crate::document::Document;
use crate::pipeline::{BatchReport, Pipeline};
use crate::render::MathRenderer;
use crate::scheduler::{ChangeEvent, Scheduler};
use serde::Serialize;

/// What [`MathProcessor::state`] reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ProcessorState {
    pub renderer_ready: bool,
    pub debug: bool,
    pub initialized: bool,
    /// Units waiting in the queue.
    pub queued: usize,
}

pub struct MathProcessor<D: Document, R> {
    document: D,
    pipeline: Pipeline<R>,
    scheduler: Scheduler<D::Node>,
    debug: bool,
    initialized: bool,
}

impl<D: Document, R: MathRenderer> MathProcessor<D, R> {
    pub fn new(document: D, renderer: R, config: &Config) -> Self {
        Self {
            document,
            pipeline: Pipeline::new(renderer, config),
            scheduler: Scheduler::new(config.effective_batch_size()),
            debug: config.debug,
            initialized: false,
        }
    }

    /// Processes the whole document once the renderer is ready.
    ///
    /// Returns false (and does nothing) while the renderer is still
    /// loading; call it again later. Calling it after a successful start
    /// is a no-op.
    pub fn initialize(&mut self) -> bool {
        if self.initialized {
            return true;
        }
        if !self.pipeline.is_ready() {
            log::info!("Renderer not ready, deferring initial scan");
            return false;
        }
        self.initialized = true;
        let report = self.reprocess();
        log::info!(
            "Initial scan: {} units, {} expressions ({} shown as written)",
            report.visited,
            report.math,
            report.fallbacks
        );
        true
    }

    /// Rescans the whole document. Processed output is skipped.
    pub fn reprocess(&mut self) -> BatchReport {
        let root = self.document.root();
        self.process_subtree(root)
    }

    /// Scans the subtree at `root` now, along with anything already queued.
    pub fn process_subtree(&mut self, root: D::Node) -> BatchReport {
        self.scheduler.enqueue_subtree(&self.document, root);
        self.run()
    }

    /// Queues a change; it is handled on the next [`run`](Self::run).
    pub fn notify(&mut self, event: ChangeEvent<D::Node>) {
        if self.debug {
            log::debug!("Change queued: {:?}", event);
        }
        self.scheduler.notify(event);
    }

    /// Works through all queued units and pending events.
    pub fn run(&mut self) -> BatchReport {
        self.scheduler.run_to_completion(&mut self.document, &self.pipeline);
        self.scheduler.take_report()
    }

    /// Like [`run`](Self::run), yielding to the runtime between batches.
    pub async fn run_async(&mut self) -> BatchReport {
        self.scheduler
            .run_until_idle(&mut self.document, &self.pipeline)
            .await;
        self.scheduler.take_report()
    }

    /// Drops queued work without processing it.
    pub fn cancel(&mut self) {
        self.scheduler.cancel();
    }

    pub fn set_debug(&mut self, debug: bool) {
        self.debug = debug;
        self.pipeline.set_debug(debug);
        log::info!("Debug tracing {}", if debug { "enabled" } else { "disabled" });
    }

    /// Flips debug tracing and returns the new setting.
    pub fn toggle_debug(&mut self) -> bool {
        self.set_debug(!self.debug);
        self.debug
    }

    pub fn state(&self) -> ProcessorState {
        ProcessorState {
            renderer_ready: self.pipeline.is_ready(),
            debug: self.debug,
            initialized: self.initialized,
            queued: self.scheduler.queued(),
        }
    }

    pub fn document(&self) -> &D {
        &self.document
    }

    /// Mutable access for hosts that edit the document directly.
    ///
    /// Report edits through [`notify`](Self::notify) so they get scanned.
    pub fn document_mut(&mut self) -> &mut D {
        &mut self.document
    }

    pub fn into_document(self) -> D {
        self.document
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::{ElementKind, Tree};
    use crate::error::RenderError;
    use crate::render::{MathMarkup, MathMlRenderer};
    use std::cell::Cell;

    struct Gate<'a> {
        ready: &'a Cell<bool>,
    }

    impl MathRenderer for Gate<'_> {
        fn render(&self, latex: &str, display: bool) -> Result<MathMarkup, RenderError> {
            MathMlRenderer.render(latex, display)
        }

        fn is_ready(&self) -> bool {
            self.ready.get()
        }
    }

    #[test]
    fn test_initialize_waits_for_renderer() {
        let ready = Cell::new(false);
        let tree = Tree::from_text("$a$ and $b$");
        let mut processor = MathProcessor::new(tree, Gate { ready: &ready }, &Config::default());

        assert!(!processor.initialize());
        let state = processor.state();
        assert!(!state.initialized);
        assert!(!state.renderer_ready);
        assert!(processor.document().math_nodes(processor.document().root()).is_empty());

        ready.set(true);
        assert!(processor.initialize());
        assert!(processor.state().initialized);
        assert_eq!(processor.document().math_nodes(processor.document().root()).len(), 2);
    }

    #[test]
    fn test_reprocess_is_idempotent() {
        let tree = Tree::from_text("$x$ then \\(y\\)");
        let mut processor = MathProcessor::new(tree, MathMlRenderer, &Config::default());
        processor.initialize();
        let html = processor.document().to_html();

        let report = processor.reprocess();
        assert_eq!(report.applied, 0);
        assert_eq!(processor.document().to_html(), html);
    }

    #[test]
    fn test_notify_and_run() {
        let mut processor = MathProcessor::new(Tree::new(), MathMlRenderer, &Config::default());
        processor.initialize();

        let root = processor.document().root();
        let para = processor
            .document_mut()
            .append_element(root, ElementKind::Paragraph)
            .unwrap();
        processor.document_mut().append_text(para, "$$z$$").unwrap();
        processor.notify(ChangeEvent::SubtreeChanged(para));

        let report = processor.run();
        assert_eq!(report.math, 1);
        assert!(processor.document().to_html().contains(r#"data-display="block""#));
    }

    #[test]
    fn test_process_subtree_only_touches_subtree() {
        let mut tree = Tree::new();
        let root = tree.root();
        let first = tree.append_element(root, ElementKind::Paragraph).unwrap();
        tree.append_text(first, "$a$").unwrap();
        let second = tree.append_element(root, ElementKind::Paragraph).unwrap();
        tree.append_text(second, "$b$").unwrap();

        let mut processor = MathProcessor::new(tree, MathMlRenderer, &Config::default());
        let report = processor.process_subtree(second);
        assert_eq!(report.math, 1);
        assert_eq!(processor.document().text_content(first), "$a$");
        assert!(processor.document().math_nodes(first).is_empty());
    }

    #[test]
    fn test_toggle_debug() {
        let mut processor = MathProcessor::new(Tree::new(), MathMlRenderer, &Config::default());
        assert!(!processor.state().debug);
        assert!(processor.toggle_debug());
        assert!(processor.state().debug);
        assert!(!processor.toggle_debug());
    }

    #[test]
    fn test_state_serializes() {
        let processor = MathProcessor::new(Tree::new(), MathMlRenderer, &Config::default());
        let json = serde_json::to_value(processor.state()).unwrap();
        assert_eq!(json["renderer_ready"], true);
        assert_eq!(json["initialized"], false);
        assert_eq!(json["queued"], 0);
    }

    #[tokio::test]
    async fn test_run_async() {
        let config = Config {
            batch_size: 1,
            ..Config::default()
        };
        let tree = Tree::from_text("$a$\n\n$b$\n\n$c$");
        let mut processor = MathProcessor::new(tree, MathMlRenderer, &config);
        let root = processor.document().root();
        processor.notify(ChangeEvent::SubtreeChanged(root));

        let report = processor.run_async().await;
        assert_eq!(report.math, 3);
        assert_eq!(processor.state().queued, 0);
    }
}
