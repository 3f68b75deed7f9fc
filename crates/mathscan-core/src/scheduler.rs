//! Cooperative batching of text units.
//!
//! ## Model
//!
//! Work is a FIFO of discovered text units. Each [`Scheduler::step`]
//! processes at most `batch_size` of them and then returns, so the caller
//! can yield to other work between batches. No state crosses a step
//! boundary except the queue itself, so cancelling is just clearing it.
//!
//! Change notifications never interleave with a batch: [`Scheduler::notify`]
//! only records the event, and pending events are turned into queued units
//! at the start of the next step.
//!
//! ```text
//! notify ──► pending ──(next step)──► discover ──► queue ──► Pipeline
//! ```

use crate::document::Document;
use crate::pipeline::{BatchReport, Pipeline};
use crate::render::MathRenderer;
use std::collections::{HashSet, VecDeque};
use std::hash::Hash;

/// A change reported by the host document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeEvent<N> {
    /// The content of a text node changed.
    TextChanged(N),
    /// Nodes were added somewhere under this node.
    SubtreeChanged(N),
}

/// Result of one scheduling step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// More work is queued; yield, then call `step` again.
    Yield,
    /// Nothing left to do.
    Idle,
}

#[derive(Debug)]
pub struct Scheduler<N> {
    queue: VecDeque<N>,
    queued: HashSet<N>,
    pending: Vec<ChangeEvent<N>>,
    batch_size: usize,
    report: BatchReport,
}

impl<N: Copy + Eq + Hash> Scheduler<N> {
    pub fn new(batch_size: usize) -> Self {
        Self {
            queue: VecDeque::new(),
            queued: HashSet::new(),
            pending: Vec::new(),
            batch_size: batch_size.max(1),
            report: BatchReport::default(),
        }
    }

    /// Number of units waiting to be processed.
    pub fn queued(&self) -> usize {
        self.queue.len()
    }

    pub fn has_pending(&self) -> bool {
        !self.pending.is_empty()
    }

    pub fn is_idle(&self) -> bool {
        self.queue.is_empty() && self.pending.is_empty()
    }

    /// Totals since the last [`Scheduler::take_report`].
    pub fn report(&self) -> BatchReport {
        self.report
    }

    pub fn take_report(&mut self) -> BatchReport {
        std::mem::take(&mut self.report)
    }

    /// Queues every candidate under `root` that is not queued already.
    pub fn enqueue_subtree<D>(&mut self, doc: &D, root: N) -> usize
    where
        D: Document<Node = N>,
    {
        doc.discover(root)
            .into_iter()
            .filter(|&node| self.push(node))
            .count()
    }

    fn push(&mut self, node: N) -> bool {
        if !self.queued.insert(node) {
            return false;
        }
        self.queue.push_back(node);
        true
    }

    /// Records a change; it is picked up at the start of the next step.
    pub fn notify(&mut self, event: ChangeEvent<N>) {
        self.pending.push(event);
    }

    /// Drops all queued work and pending events.
    pub fn cancel(&mut self) {
        self.queue.clear();
        self.queued.clear();
        self.pending.clear();
    }

    fn merge_pending<D>(&mut self, doc: &D)
    where
        D: Document<Node = N>,
    {
        for event in std::mem::take(&mut self.pending) {
            match event {
                ChangeEvent::TextChanged(node) => {
                    if doc.is_candidate(node) {
                        self.push(node);
                    }
                }
                ChangeEvent::SubtreeChanged(node) => {
                    self.enqueue_subtree(doc, node);
                }
            }
        }
    }

    /// Processes the next batch.
    ///
    /// While the renderer is not ready, queued work is kept and the step
    /// reports [`Step::Idle`].
    pub fn step<D, R>(&mut self, doc: &mut D, pipeline: &Pipeline<R>) -> Step
    where
        D: Document<Node = N>,
        R: MathRenderer,
    {
        if !pipeline.is_ready() {
            return Step::Idle;
        }
        self.merge_pending(doc);

        let take = self.batch_size.min(self.queue.len());
        let batch: Vec<N> = self.queue.drain(..take).collect();
        for node in &batch {
            self.queued.remove(node);
        }
        if !batch.is_empty() {
            let report = pipeline.process_units(doc, &batch);
            log::debug!(
                "Batch of {} units: {} applied, {} math, {} left",
                batch.len(),
                report.applied,
                report.math,
                self.queue.len()
            );
            self.report.merge(report);
        }

        if self.is_idle() {
            Step::Idle
        } else {
            Step::Yield
        }
    }

    /// Steps until idle without yielding.
    pub fn run_to_completion<D, R>(&mut self, doc: &mut D, pipeline: &Pipeline<R>)
    where
        D: Document<Node = N>,
        R: MathRenderer,
    {
        while self.step(doc, pipeline) == Step::Yield {}
    }

    /// Steps until idle, yielding to the runtime between batches.
    pub async fn run_until_idle<D, R>(&mut self, doc: &mut D, pipeline: &Pipeline<R>)
    where
        D: Document<Node = N>,
        R: MathRenderer,
    {
        while self.step(doc, pipeline) == Step::Yield {
            tokio::task::yield_now().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::document::{ElementKind, NodeId, Tree};
    use crate::render::MathMlRenderer;

    fn document(paragraphs: usize) -> Tree {
        let text: Vec<String> = (0..paragraphs)
            .map(|i| format!("line {} has $x_{}$", i, i))
            .collect();
        Tree::from_text(&text.join("\n\n"))
    }

    fn pipeline() -> Pipeline<MathMlRenderer> {
        Pipeline::new(MathMlRenderer, &Config::default())
    }

    #[test]
    fn test_steps_in_batches() {
        let mut tree = document(5);
        let pipeline = pipeline();
        let mut scheduler = Scheduler::new(2);
        assert_eq!(scheduler.enqueue_subtree(&tree, tree.root()), 5);

        assert_eq!(scheduler.step(&mut tree, &pipeline), Step::Yield);
        assert_eq!(scheduler.queued(), 3);
        assert_eq!(scheduler.step(&mut tree, &pipeline), Step::Yield);
        assert_eq!(scheduler.step(&mut tree, &pipeline), Step::Idle);
        assert_eq!(scheduler.report().math, 5);
        assert_eq!(tree.math_nodes(tree.root()).len(), 5);
    }

    #[test]
    fn test_enqueue_deduplicates() {
        let tree = document(3);
        let mut scheduler: Scheduler<NodeId> = Scheduler::new(8);
        assert_eq!(scheduler.enqueue_subtree(&tree, tree.root()), 3);
        assert_eq!(scheduler.enqueue_subtree(&tree, tree.root()), 0);
        assert_eq!(scheduler.queued(), 3);
    }

    #[test]
    fn test_notifications_wait_for_next_step() {
        let mut tree = Tree::new();
        let para = tree.append_element(tree.root(), ElementKind::Paragraph).unwrap();
        let pipeline = pipeline();
        let mut scheduler = Scheduler::new(4);

        let added = tree.append_text(para, "now $y$").unwrap();
        scheduler.notify(ChangeEvent::SubtreeChanged(para));
        assert!(scheduler.has_pending());
        assert_eq!(scheduler.queued(), 0);
        assert!(!scheduler.is_idle());

        assert_eq!(scheduler.step(&mut tree, &pipeline), Step::Idle);
        assert!(!tree.is_attached(added));
        assert_eq!(tree.math_nodes(tree.root()).len(), 1);
    }

    #[test]
    fn test_text_change_is_requeued() {
        let mut tree = Tree::from_text("nothing yet");
        let pipeline = pipeline();
        let mut scheduler = Scheduler::new(4);
        scheduler.enqueue_subtree(&tree, tree.root());
        scheduler.run_to_completion(&mut tree, &pipeline);
        assert_eq!(scheduler.take_report().unchanged, 1);

        let unit = tree.discover(tree.root())[0];
        tree.set_text(unit, "now $z$").unwrap();
        scheduler.notify(ChangeEvent::TextChanged(unit));
        scheduler.run_to_completion(&mut tree, &pipeline);
        assert_eq!(scheduler.report().math, 1);
    }

    #[test]
    fn test_events_inside_processed_output_are_ignored() {
        let mut tree = Tree::from_text("$a$");
        let pipeline = pipeline();
        let mut scheduler = Scheduler::new(4);
        scheduler.enqueue_subtree(&tree, tree.root());
        scheduler.run_to_completion(&mut tree, &pipeline);

        let math = tree.math_nodes(tree.root())[0];
        scheduler.notify(ChangeEvent::SubtreeChanged(math));
        scheduler.notify(ChangeEvent::TextChanged(math));
        assert_eq!(scheduler.step(&mut tree, &pipeline), Step::Idle);
        assert_eq!(scheduler.report().visited, 1);
    }

    #[test]
    fn test_cancel_clears_work() {
        let tree = document(4);
        let mut scheduler = Scheduler::new(1);
        scheduler.enqueue_subtree(&tree, tree.root());
        scheduler.notify(ChangeEvent::SubtreeChanged(tree.root()));
        scheduler.cancel();
        assert!(scheduler.is_idle());
        assert_eq!(scheduler.queued(), 0);
    }

    #[tokio::test]
    async fn test_run_until_idle_yields_between_batches() {
        let mut tree = document(10);
        let pipeline = pipeline();
        let mut scheduler = Scheduler::new(3);
        scheduler.enqueue_subtree(&tree, tree.root());

        scheduler.run_until_idle(&mut tree, &pipeline).await;
        assert!(scheduler.is_idle());
        assert_eq!(scheduler.report().applied, 10);
        assert!(tree.discover(tree.root()).iter().all(|&n| {
            tree.text(n).is_some_and(|t| !t.contains('$'))
        }));
    }
}
