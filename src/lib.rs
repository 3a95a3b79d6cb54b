//! Numbered-marker templating for slide decks.
//!
//! A template slide carries `[n]` markers in its text boxes and table cells.
//! [`TemplateEngine::extract_template_inputs`] reports where they are, sorted by marker number;
//! [`TemplateEngine::fill_template`] swaps them for caller-supplied text and writes a new deck.

pub mod config;
pub mod engine;
pub mod error;
pub mod generate;
pub mod ir;
pub mod jobs;
pub mod pptx;
pub mod workflow;

pub use engine::{fill_sequence, FillStep, TemplateEngine};
pub use error::{EngineError, Result};
pub use ir::{ExtractionResult, MarkerValueMap, TableLocation, TemplateInput};
