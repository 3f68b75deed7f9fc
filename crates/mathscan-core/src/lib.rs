//! # mathscan core
//!
//! Finds math in a live document and swaps it for rendered markup.
//!
//! ## Overview
//!
//! [`mathscan_syntax`] splits a string into text and math segments. This
//! crate wraps that scanner in everything needed to run it over a
//! document tree: merging split text fragments, normalizing expressions,
//! rendering them, replacing the original nodes, and doing all of it in
//! small batches driven by change notifications.
//!
//! ```text
//! text units ─► aggregate ─► scan ─► normalize ─► render ─► apply
//!                  ▲                                          │
//!                  └────── scheduler (batches, change events) ◄┘
//! ```
//!
//! ## Modules
//!
//! - [`document`] - The [`Document`](document::Document) trait and the in-memory [`Tree`](document::Tree)
//! - [`aggregate`] - Merges a text node with its text and break siblings
//! - [`normalize`] - Best-effort rewrites before rendering
//! - [`render`] - The renderer seam and the built-in MathML renderer
//! - [`apply`] - Replaces consumed nodes with text and math output
//! - [`pipeline`] - Runs the stages for one unit or a batch
//! - [`scheduler`] - Cooperative batching and change handling
//! - [`processor`] - The control surface hosts talk to
//! - [`config`] - JSON configuration
//!
//! ## Guarantees
//!
//! - **Idempotent**: rendered math is tagged processed and never rescanned
//! - **Verbatim-safe**: code blocks and code spans are never touched
//! - **Never lossy**: an expression that cannot be rendered is shown
//!   exactly as written, delimiters included
//! - **Unit-atomic**: a structural failure skips one unit and leaves its
//!   nodes as they were
//!
//! ## Example
//!
//! ```
//! use mathscan_core::config::Config;
//! use mathscan_core::document::Tree;
//! use mathscan_core::pipeline::Pipeline;
//! use mathscan_core::render::MathMlRenderer;
//!
//! let mut tree = Tree::from_text("Area is $\\pi r^2$.\nNot `$code$`.");
//! let pipeline = Pipeline::new(MathMlRenderer, &Config::default());
//!
//! let root = tree.root();
//! let report = pipeline.process_subtree(&mut tree, root);
//! assert_eq!(report.math, 1);
//!
//! // A second pass finds nothing new.
//! let again = pipeline.process_subtree(&mut tree, root);
//! assert_eq!(again.applied, 0);
//! assert!(tree.to_html().contains("<code>$code$</code>"));
//! ```

pub mod aggregate;
pub mod apply;
pub mod config;
pub mod document;
pub mod error;
pub mod normalize;
pub mod pipeline;
pub mod processor;
pub mod render;
pub mod scheduler;

pub use config::Config;
pub use error::{ConfigError, DocumentError, RenderError};
pub use processor::{MathProcessor, ProcessorState};
