// Rollback-able output stack and output-pattern rendering.
//
// During a match attempt, tag outputs are pushed onto a character stack.
// Backtracking truncates the stack to a mark taken before each transition
// was tried; committing a match copies the stack contents out.

use log::warn;

use crate::MAX_OUTPUT_LENGTH;
use crate::variables::VariableSet;

/// The pending output of a match attempt.
#[derive(Debug, Default)]
pub struct OutputStack {
    chars: Vec<char>,
    overflow_warned: bool,
}

/// A rollback point; see [`OutputStack::mark`].
pub type Mark = usize;

impl OutputStack {
    pub fn new() -> Self {
        OutputStack::default()
    }

    /// Current height, to be restored with [`Self::truncate`] when the
    /// transition being tried fails.
    pub fn mark(&self) -> Mark {
        self.chars.len()
    }

    pub fn truncate(&mut self, mark: Mark) {
        self.chars.truncate(mark);
    }

    pub fn push(&mut self, c: char) {
        if self.chars.len() >= MAX_OUTPUT_LENGTH {
            if !self.overflow_warned {
                warn!("output longer than {MAX_OUTPUT_LENGTH} characters, truncating");
                self.overflow_warned = true;
            }
            return;
        }
        self.chars.push(c);
    }

    pub fn len(&self) -> usize {
        self.chars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chars.is_empty()
    }

    /// The stack contents as a string, for committing a match.
    pub fn contents(&self) -> String {
        self.chars.iter().collect()
    }

    pub fn clear(&mut self) {
        self.chars.clear();
    }

    /// Replace the whole stack, for resuming from a saved snapshot.
    pub fn set_contents(&mut self, contents: &str) {
        self.chars.clear();
        self.chars.extend(contents.chars());
    }
}

/// Error type for output-pattern rendering.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum RenderError {
    #[error("'$' without a closing '$' in output pattern")]
    UnterminatedVariable,
    #[error("output references undeclared variable '{0}'")]
    UnknownVariable(String),
    #[error("variable '{0}' has no captured span")]
    UnboundVariable(String),
    #[error("variable '{0}' ends before it starts")]
    InvertedVariable(String),
}

/// Render an output pattern onto the stack. `$name$` substitutes the text
/// captured for `name`, `$$` a literal dollar sign; `text` resolves
/// window-relative character positions. On error the stack is left as it
/// was and nothing is rendered.
pub fn render_template(
    stack: &mut OutputStack,
    template: &str,
    vars: &VariableSet,
    text: impl Fn(usize) -> Option<char>,
) -> Result<(), RenderError> {
    let mark = stack.mark();
    let mut chars = template.chars();
    while let Some(c) = chars.next() {
        if c != '$' {
            stack.push(c);
            continue;
        }
        let mut name = String::new();
        loop {
            match chars.next() {
                Some('$') => break,
                Some(c) => name.push(c),
                None => {
                    stack.truncate(mark);
                    return Err(RenderError::UnterminatedVariable);
                }
            }
        }
        if name.is_empty() {
            stack.push('$');
            continue;
        }
        let Some(slot) = vars.index_of(&name) else {
            stack.truncate(mark);
            return Err(RenderError::UnknownVariable(name));
        };
        let capture = vars.get(slot);
        let (Some(start), Some(end)) = (capture.start, capture.end) else {
            stack.truncate(mark);
            return Err(RenderError::UnboundVariable(name));
        };
        if end < start {
            stack.truncate(mark);
            return Err(RenderError::InvertedVariable(name));
        }
        for k in start..=end {
            if let Some(c) = text(k) {
                stack.push(c);
            }
        }
    }
    Ok(())
}
