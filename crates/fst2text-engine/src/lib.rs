//! Fst2 grammar application engine.
//!
//! Applies a compiled grammar transducer (the textual `.fst2` graph format)
//! to a text stream: at every position the longest input prefix recognized
//! by the grammar is matched, the associated tag outputs are rendered
//! (with `$name$` variable substitution), and the engine produces both the
//! rewritten text and an offset table aligning input spans with output
//! spans for downstream tooling.
//!
//! # Architecture
//!
//! - [`grammar`] -- automaton model and `.fst2` text-format loading
//! - [`token_index`] -- per-state index of letter-sequence literal tags
//! - [`buffer`] -- reloadable sliding window over the input stream
//! - [`variables`] -- named capture registers
//! - [`output`] -- rollback-able output stack and output rendering
//! - [`scanner`] -- the recursive backtracking matcher
//! - [`driver`] -- the run loop tying everything together

pub mod buffer;
pub mod driver;
pub mod grammar;
pub mod output;
pub mod scanner;
pub mod token_index;
pub mod variables;

pub use driver::{OutputMode, ParsingMode, RewriteOutcome, RewriteSettings, Rewriter, RunStats};
pub use grammar::{Automaton, GrammarError, State, Tag, TagKind, Transition};

/// Error type for engine setup and runs.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error(transparent)]
    Grammar(#[from] GrammarError),
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}

/// Maximum recursion depth of the scanner. Exceeding it aborts the current
/// match attempt; the driver then copies one character and goes on.
pub const MAX_DEPTH: u32 = 300;

/// Maximum number of characters on the output stack. Further pushes are
/// dropped with a diagnostic rather than aborting the run.
pub const MAX_OUTPUT_LENGTH: usize = 10_000;
