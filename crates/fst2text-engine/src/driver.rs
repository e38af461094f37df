// The run loop: drives window, scanner and offset emitter over a text.
//
// For every position up to one past the logical end (zero-width
// end-of-text rules must get their chance), the driver reloads the window
// when the look-ahead margin runs short, asks the scanner for the best
// match, and either emits the rendered output and advances by the
// consumed length, or copies one character. Text between `{` and `}` is
// copied through untouched.

use std::io::{self, Read, Write};

use fst2text_core::{Alphabet, OffsetRecord, OffsetTable};

use crate::EngineError;
use crate::buffer::Window;
use crate::grammar::Automaton;
use crate::scanner::{ScanInput, Scanner};
use crate::token_index::TokenIndex;

pub const DEFAULT_BUFFER_CAPACITY: usize = 64 * 1024;

/// How matches are folded into the output; see the offset-record policy
/// in [`Rewriter::rewrite`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputMode {
    #[default]
    Merge,
    Replace,
}

/// How the text is tokenized for matching.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ParsingMode {
    /// Letter-sequence matches must cover whole words; match attempts
    /// never start on a space.
    #[default]
    WordByWord,
    /// No word-boundary constraint; match attempts never start on a space.
    CharByChar,
    /// No word-boundary constraint; spaces are ordinary positions.
    CharByCharWithSpace,
}

#[derive(Debug, Clone)]
pub struct RewriteSettings {
    pub mode: OutputMode,
    pub parsing: ParsingMode,
    /// Window capacity in characters. Also bounds how far one match may
    /// look ahead.
    pub buffer_capacity: usize,
}

impl Default for RewriteSettings {
    fn default() -> Self {
        RewriteSettings {
            mode: OutputMode::default(),
            parsing: ParsingMode::default(),
            buffer_capacity: DEFAULT_BUFFER_CAPACITY,
        }
    }
}

/// Counters accumulated over one run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunStats {
    /// Committed matches that produced output or consumed input.
    pub matches: u64,
    /// Newlines seen while advancing, for line-oriented consumers.
    pub newlines: u64,
    /// Match attempts dropped by the recursion depth limit.
    pub depth_aborts: u64,
}

#[derive(Debug)]
pub struct RewriteOutcome {
    pub offsets: OffsetTable,
    pub stats: RunStats,
}

/// Applies a grammar to texts. The automaton and alphabet are borrowed
/// read-only; one `Rewriter` may run over any number of texts.
pub struct Rewriter<'a> {
    automaton: &'a Automaton,
    alphabet: &'a Alphabet,
    settings: RewriteSettings,
}

impl<'a> Rewriter<'a> {
    pub fn new(automaton: &'a Automaton, alphabet: &'a Alphabet) -> Self {
        Self::with_settings(automaton, alphabet, RewriteSettings::default())
    }

    pub fn with_settings(
        automaton: &'a Automaton,
        alphabet: &'a Alphabet,
        settings: RewriteSettings,
    ) -> Self {
        Rewriter { automaton, alphabet, settings }
    }

    /// Rewrite a whole text stream.
    ///
    /// Offset records map input spans to output spans, in character
    /// offsets. In Merge mode every committed match is recorded; in
    /// Replace mode a record is kept only when the rendered output
    /// differs from the matched input, so canonicalizing a span to
    /// itself leaves no trace.
    pub fn rewrite<R: Read, W: Write>(
        &self,
        reader: R,
        writer: &mut W,
    ) -> Result<RewriteOutcome, EngineError> {
        let index = TokenIndex::build(self.automaton, self.alphabet);
        let word_boundaries = self.settings.parsing == ParsingMode::WordByWord;
        let mut scanner = Scanner::new(self.automaton, self.alphabet, &index, word_boundaries);
        let mut window = Window::new(reader, self.settings.buffer_capacity)?;
        let mut offsets = OffsetTable::new();
        let mut stats = RunStats::default();
        let mut pos = 0usize;
        let mut written = 0usize;
        let mut in_braces = false;

        loop {
            if window.needs_reload(pos) {
                window.reload(pos)?;
                scanner.shift_variables(pos);
                pos = 0;
            }
            let current = window.get(pos);

            if in_braces {
                let Some(c) = current else { break };
                if c == '}' {
                    in_braces = false;
                }
                written += copy_char(writer, c, &mut stats)?;
                pos += 1;
                continue;
            }
            if current == Some('{') {
                in_braces = true;
                written += copy_char(writer, '{', &mut stats)?;
                pos += 1;
                continue;
            }

            let skip_attempt = current == Some(' ')
                && self.settings.parsing != ParsingMode::CharByCharWithSpace;
            let found = if skip_attempt {
                None
            } else {
                let input = ScanInput {
                    text: window.chars(),
                    base_offset: window.absolute_offset(),
                    at_text_end: window.at_source_end(),
                };
                let m = scanner.find_match(&input, pos);
                if scanner.attempt_aborted() {
                    stats.depth_aborts += 1;
                }
                m
            };

            let Some(m) = found else {
                match current {
                    Some(c) => {
                        written += copy_char(writer, c, &mut stats)?;
                        pos += 1;
                    }
                    None => break,
                }
                continue;
            };

            let output_len = m.output.chars().count();
            let matched = &window.chars()[pos..pos + m.length];
            let trivial = m.length == 0 && output_len == 0;
            let keep = match self.settings.mode {
                OutputMode::Merge => !trivial,
                OutputMode::Replace => !m.output.chars().eq(matched.iter().copied()),
            };
            if keep {
                let old_start = window.absolute_offset() + pos;
                offsets.push(OffsetRecord::new(
                    old_start,
                    old_start + m.length,
                    written,
                    written + output_len,
                ));
            }
            if !trivial {
                stats.matches += 1;
            }
            stats.newlines += matched.iter().filter(|&&c| c == '\n').count() as u64;
            for c in m.output.chars() {
                write_char(writer, c)?;
            }
            written += output_len;
            if m.length > 0 {
                pos += m.length;
            } else {
                // A zero-width match does not advance by itself
                match current {
                    Some(c) => {
                        written += copy_char(writer, c, &mut stats)?;
                        pos += 1;
                    }
                    None => break,
                }
            }
        }
        Ok(RewriteOutcome { offsets, stats })
    }

    /// Rewrite an in-memory string; convenient for tests and small texts.
    pub fn rewrite_str(&self, text: &str) -> Result<(String, RewriteOutcome), EngineError> {
        let mut out = Vec::new();
        let outcome = self.rewrite(text.as_bytes(), &mut out)?;
        let text = String::from_utf8(out)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        Ok((text, outcome))
    }
}

fn copy_char<W: Write>(writer: &mut W, c: char, stats: &mut RunStats) -> io::Result<usize> {
    if c == '\n' {
        stats.newlines += 1;
    }
    write_char(writer, c)?;
    Ok(1)
}

fn write_char<W: Write>(writer: &mut W, c: char) -> io::Result<()> {
    let mut buf = [0u8; 4];
    writer.write_all(c.encode_utf8(&mut buf).as_bytes())
}
