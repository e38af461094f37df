// The recursive backtracking matcher.
//
// One `Scanner` lives for the whole run and is re-aimed at each start
// position. An attempt explores the grammar depth-first from the main
// graph's initial state: every transition tried pushes its rendered
// output onto the stack, recurses, then rolls the stack back. For the
// main graph only the best match is retained (strictly longest; a length
// tie keeps the earlier one, so the first transition tried wins).
// Subgraphs instead collect every reachable exit position, and the caller
// resumes once per exit with that exit's stack and register snapshot.
//
// Capture registers are not rolled back on ordinary backtracking and
// persist from one attempt to the next; only the subgraph exit machinery
// snapshots and restores them.

use fst2text_core::Alphabet;
use log::warn;

use crate::MAX_DEPTH;
use crate::grammar::{Automaton, Tag, TagKind, Transition};
use crate::output::{OutputStack, render_template};
use crate::token_index::TokenIndex;
use crate::variables::{Snapshot, VariableSet};

/// The text being scanned, as the driver's window exposes it.
pub struct ScanInput<'a> {
    pub text: &'a [char],
    /// Absolute character offset of `text[0]`.
    pub base_offset: usize,
    /// The slice ends at the true end of the text.
    pub at_text_end: bool,
}

impl ScanInput<'_> {
    fn at(&self, pos: usize) -> Option<char> {
        self.text.get(pos).copied()
    }
}

/// A committed match: characters consumed from the start position and the
/// rendered output.
#[derive(Debug, PartialEq, Eq)]
pub struct Match {
    pub length: usize,
    pub output: String,
}

/// One admissible subgraph exit.
struct Candidate {
    pos: usize,
    stack: String,
    vars: Snapshot,
}

pub struct Scanner<'a> {
    automaton: &'a Automaton,
    alphabet: &'a Alphabet,
    index: &'a TokenIndex,
    /// Letter-sequence matches must end at a letter-run boundary
    /// (word-by-word parsing).
    word_boundaries: bool,
    vars: VariableSet,
    stack: OutputStack,
    origin: usize,
    best: Option<(usize, String)>,
    aborted: bool,
    output_var_warned: bool,
}

impl<'a> Scanner<'a> {
    pub fn new(
        automaton: &'a Automaton,
        alphabet: &'a Alphabet,
        index: &'a TokenIndex,
        word_boundaries: bool,
    ) -> Self {
        Scanner {
            automaton,
            alphabet,
            index,
            word_boundaries,
            vars: VariableSet::new(automaton.variables()),
            stack: OutputStack::new(),
            origin: 0,
            best: None,
            aborted: false,
            output_var_warned: false,
        }
    }

    /// Find the best match of the main graph starting at `origin`.
    /// Returns `None` when nothing matches or the attempt was aborted by
    /// the depth limit (see [`Self::attempt_aborted`]).
    pub fn find_match(&mut self, input: &ScanInput, origin: usize) -> Option<Match> {
        self.stack.clear();
        self.best = None;
        self.aborted = false;
        self.origin = origin;
        self.scan_graph(input, self.automaton.initial_state(1), origin, 0, None);
        if self.aborted {
            return None;
        }
        self.best
            .take()
            .map(|(length, output)| Match { length, output })
    }

    /// Whether the last attempt hit the recursion depth limit.
    pub fn attempt_aborted(&self) -> bool {
        self.aborted
    }

    /// Account for a window reload; see `VariableSet::shift`.
    pub fn shift_variables(&mut self, consumed: usize) {
        self.vars.shift(consumed);
    }

    fn scan_graph(
        &mut self,
        input: &ScanInput,
        state: u32,
        pos: usize,
        depth: u32,
        mut candidates: Option<&mut Vec<Candidate>>,
    ) {
        if self.aborted {
            return;
        }
        if depth > MAX_DEPTH {
            let excerpt: String = input.text[pos.min(input.text.len())..]
                .iter()
                .take(60)
                .collect();
            warn!(
                "matching depth limit ({MAX_DEPTH}) exceeded at position {}, \
                 dropping this attempt: \"{excerpt}\"",
                input.base_offset + pos
            );
            self.aborted = true;
            return;
        }
        let automaton = self.automaton;
        let alphabet = self.alphabet;

        if automaton.states[state as usize].is_final {
            match candidates.as_deref_mut() {
                Some(exits) => {
                    if !exits.iter().any(|c| c.pos == pos) {
                        exits.push(Candidate {
                            pos,
                            stack: self.stack.contents(),
                            vars: self.vars.snapshot(),
                        });
                    }
                }
                None => {
                    let length = pos - self.origin;
                    if self.best.as_ref().is_none_or(|(best, _)| length > *best) {
                        self.best = Some((length, self.stack.contents()));
                    }
                }
            }
        }

        let state_index = self.index.state(state);

        // Indexed letter-sequence literals first, after the one-space fold
        // every consuming token gets. The trie yields every literal
        // matching in full; in word-by-word parsing a hit ending in the
        // middle of a letter run, or starting inside one, is discarded.
        let start = skip_one_space(input, pos);
        let mut hits: Vec<(usize, Transition)> = Vec::new();
        if !self.starts_mid_word(input, start) {
            state_index.walk(
                alphabet,
                |i| input.at(start + i),
                |len, transitions| {
                    if self.word_boundaries
                        && input.at(start + len).is_some_and(|c| alphabet.is_letter(c))
                    {
                        return;
                    }
                    hits.extend(transitions.iter().map(|&t| (len, t)));
                },
            );
        }
        for (len, t) in hits {
            if self.aborted {
                return;
            }
            self.follow(input, t, start + len, depth, candidates.as_deref_mut());
        }

        for &t in state_index.residual() {
            if self.aborted {
                return;
            }
            if t.tag < 0 {
                self.call_subgraph(input, t, pos, depth, candidates.as_deref_mut());
                continue;
            }
            let tag = &automaton.tags[t.tag as usize];
            match &tag.kind {
                TagKind::BeginVar(name) => {
                    // A leading space belongs to the match, not the span
                    let next = skip_one_space(input, pos);
                    if let Some(slot) = self.vars.index_of(name) {
                        self.vars.set_start(slot, next);
                    }
                    self.scan_graph(input, t.dest, next, depth + 1, candidates.as_deref_mut());
                }
                TagKind::EndVar(name) => {
                    if let Some(slot) = self.vars.index_of(name) {
                        self.vars.set_end(slot, pos.saturating_sub(1));
                    }
                    self.scan_graph(input, t.dest, pos, depth + 1, candidates.as_deref_mut());
                }
                TagKind::OutputVar(name) => {
                    if !self.output_var_warned {
                        warn!("output variable '${name}' is not supported, its transitions never match");
                        self.output_var_warned = true;
                    }
                }
                kind => {
                    let start = if folds_space(kind) { skip_one_space(input, pos) } else { pos };
                    if let Some(next) = self.match_tag(input, kind, tag, start) {
                        self.follow(input, t, next, depth, candidates.as_deref_mut());
                    }
                }
            }
        }
    }

    /// Where `kind` matches at `pos`, the position right after the
    /// consumed text (equal to `pos` for zero-width kinds).
    fn match_tag(&self, input: &ScanInput, kind: &TagKind, tag: &Tag, pos: usize) -> Option<usize> {
        let alphabet = self.alphabet;
        match kind {
            TagKind::Literal => self.match_literal(input, tag, pos),
            TagKind::Word => {
                if self.starts_mid_word(input, pos) {
                    return None;
                }
                let end = letter_run(input, alphabet, pos);
                (end > pos).then_some(end)
            }
            TagKind::Digits => {
                let mut p = pos;
                while input.at(p).is_some_and(|c| c.is_ascii_digit()) {
                    p += 1;
                }
                (p > pos).then_some(p)
            }
            TagKind::Upper => {
                if self.starts_mid_word(input, pos) {
                    return None;
                }
                cased_run(input, alphabet, pos, Alphabet::is_upper)
            }
            TagKind::Lower => {
                if self.starts_mid_word(input, pos) {
                    return None;
                }
                cased_run(input, alphabet, pos, Alphabet::is_lower)
            }
            TagKind::FirstUpper => {
                if self.starts_mid_word(input, pos) {
                    return None;
                }
                let first = input.at(pos)?;
                if !alphabet.is_upper(first) {
                    return None;
                }
                Some(letter_run(input, alphabet, pos + 1))
            }
            TagKind::Punct => match_punct(input, pos),
            TagKind::Letter => input
                .at(pos)
                .is_some_and(|c| alphabet.is_letter(c))
                .then(|| pos + 1),
            TagKind::Epsilon => Some(pos),
            TagKind::Newline => (input.at(pos) == Some('\n')).then(|| pos + 1),
            TagKind::NoSpace => (input.at(pos) != Some(' ')).then_some(pos),
            TagKind::Space => (input.at(pos) == Some(' ')).then(|| pos + 1),
            TagKind::TextStart => (input.base_offset == 0 && pos == 0).then_some(pos),
            TagKind::TextEnd => (input.at_text_end && pos == input.text.len()).then_some(pos),
            TagKind::BeginVar(_) | TagKind::EndVar(_) | TagKind::OutputVar(_) => None,
        }
    }

    fn match_literal(&self, input: &ScanInput, tag: &Tag, pos: usize) -> Option<usize> {
        if self.starts_mid_word(input, pos) {
            return None;
        }
        let mut p = pos;
        for grammar_c in tag.input.chars() {
            let text_c = input.at(p)?;
            let ok = if tag.case_exact {
                grammar_c == text_c
            } else {
                self.alphabet.is_equal_or_case_equal(grammar_c, text_c)
            };
            if !ok {
                return None;
            }
            p += 1;
        }
        // Never stop in the middle of a letter run
        if self.word_boundaries
            && p > pos
            && self.alphabet.is_letter(input.text[p - 1])
            && input.at(p).is_some_and(|c| self.alphabet.is_letter(c))
        {
            return None;
        }
        Some(p)
    }

    /// In word-by-word parsing a letter-initial match must start at a
    /// letter-run boundary, never right after another letter.
    fn starts_mid_word(&self, input: &ScanInput, pos: usize) -> bool {
        self.word_boundaries
            && pos > 0
            && self.alphabet.is_letter(input.text[pos - 1])
            && input.at(pos).is_some_and(|c| self.alphabet.is_letter(c))
    }

    /// Render the transition's output, recurse into its destination, roll
    /// the stack back.
    fn follow(
        &mut self,
        input: &ScanInput,
        t: Transition,
        next: usize,
        depth: u32,
        candidates: Option<&mut Vec<Candidate>>,
    ) {
        let mark = self.stack.mark();
        if let Some(template) = &self.automaton.tags[t.tag as usize].output
            && let Err(e) = render_template(&mut self.stack, template, &self.vars, |i| input.at(i))
        {
            warn!(
                "skipping output near position {}: {e}",
                input.base_offset + next
            );
        }
        self.scan_graph(input, t.dest, next, depth + 1, candidates);
        self.stack.truncate(mark);
    }

    /// Scan a called graph, collecting every exit, then resume the caller
    /// once per exit with that exit's stack and registers.
    fn call_subgraph(
        &mut self,
        input: &ScanInput,
        t: Transition,
        pos: usize,
        depth: u32,
        mut candidates: Option<&mut Vec<Candidate>>,
    ) {
        let graph = (-t.tag) as usize;
        let saved_stack = self.stack.contents();
        let saved_vars = self.vars.snapshot();
        let mut exits: Vec<Candidate> = Vec::new();
        self.scan_graph(
            input,
            self.automaton.initial_state(graph),
            pos,
            depth + 1,
            Some(&mut exits),
        );
        for exit in exits {
            if self.aborted {
                return;
            }
            self.stack.set_contents(&exit.stack);
            self.vars.restore(&exit.vars);
            self.scan_graph(input, t.dest, exit.pos, depth + 1, candidates.as_deref_mut());
        }
        if self.aborted {
            return;
        }
        self.stack.set_contents(&saved_stack);
        self.vars.restore(&saved_vars);
    }
}

fn skip_one_space(input: &ScanInput, pos: usize) -> usize {
    if input.at(pos) == Some(' ') { pos + 1 } else { pos }
}

/// Tokens are separated by implicit spaces: one leading space is folded
/// into the match before every consuming tag kind. Zero-width kinds and
/// the explicit space/newline tags see the text as-is.
fn folds_space(kind: &TagKind) -> bool {
    matches!(
        kind,
        TagKind::Literal
            | TagKind::Word
            | TagKind::Digits
            | TagKind::Upper
            | TagKind::Lower
            | TagKind::FirstUpper
            | TagKind::Punct
            | TagKind::Letter
    )
}

/// End of the letter run starting at `pos` (equal to `pos` if none).
fn letter_run(input: &ScanInput, alphabet: &Alphabet, pos: usize) -> usize {
    let mut p = pos;
    while input.at(p).is_some_and(|c| alphabet.is_letter(c)) {
        p += 1;
    }
    p
}

/// A run of letters of one case, not followed by any letter.
fn cased_run(
    input: &ScanInput,
    alphabet: &Alphabet,
    pos: usize,
    has_case: impl Fn(&Alphabet, char) -> bool,
) -> Option<usize> {
    let mut p = pos;
    while input.at(p).is_some_and(|c| alphabet.is_letter(c) && has_case(alphabet, c)) {
        p += 1;
    }
    if p == pos || input.at(p).is_some_and(|c| alphabet.is_letter(c)) {
        return None;
    }
    Some(p)
}

const PUNCT_SIGNS: &[char] = &[
    ';', '!', '?', ':', '¿', '¡', '\u{0E4F}', '\u{0E5A}', '\u{0E5B}', '、', '。', '・',
];

fn match_punct(input: &ScanInput, pos: usize) -> Option<usize> {
    let c = input.at(pos)?;
    if c == '.' {
        // `...` is one three-character token
        if input.at(pos + 1) == Some('.') && input.at(pos + 2) == Some('.') {
            return Some(pos + 3);
        }
        return Some(pos + 1);
    }
    PUNCT_SIGNS.contains(&c).then(|| pos + 1)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scan_mode(
        grammar: &str,
        text: &str,
        origin: usize,
        word_boundaries: bool,
    ) -> Option<Match> {
        let automaton = Automaton::parse(grammar).unwrap();
        let alphabet = Alphabet::ascii();
        let index = TokenIndex::build(&automaton, &alphabet);
        let mut scanner = Scanner::new(&automaton, &alphabet, &index, word_boundaries);
        let chars: Vec<char> = text.chars().collect();
        let input = ScanInput { text: &chars, base_offset: 0, at_text_end: true };
        scanner.find_match(&input, origin)
    }

    fn scan_at(grammar: &str, text: &str, origin: usize) -> Option<Match> {
        scan_mode(grammar, text, origin, true)
    }

    fn scan(grammar: &str, text: &str) -> Option<Match> {
        scan_at(grammar, text, 0)
    }

    fn one_tag(tag: &str) -> String {
        format!("0000000001\n-1 g\n: 0 1\nt \nf\n%{tag}\nf\n")
    }

    #[test]
    fn literal_match_renders_output() {
        let m = scan(&one_tag("cat/dog"), "cat sat").unwrap();
        assert_eq!(m, Match { length: 3, output: "dog".to_string() });
    }

    #[test]
    fn literal_must_end_at_word_boundary() {
        assert_eq!(scan(&one_tag("cat/dog"), "category"), None);
    }

    #[test]
    fn case_folding_literal() {
        let m = scan(&one_tag("cat/dog"), "CAT").unwrap();
        assert_eq!(m.length, 3);
        assert_eq!(scan(&one_tag("CAT/dog"), "cat"), None);
    }

    #[test]
    fn case_exact_literal() {
        let g = "0000000001\n-1 g\n: 0 1\nt \nf\n@Cat/dog\nf\n";
        assert_eq!(scan(g, "CAT"), None);
        assert_eq!(scan(g, "Cat").unwrap().length, 3);
    }

    #[test]
    fn longest_match_wins() {
        // Both "ab" and "abab" reach a final state; character-by-character
        // parsing so the shorter path is admissible too
        let g = "\
0000000001
-1 g
: 0 1
t 0 2
t \n\
f
%ab/X
f
";
        let m = scan_mode(g, "abab", 0, false).unwrap();
        assert_eq!(m.length, 4);
        assert_eq!(m.output, "XX");
    }

    #[test]
    fn tie_keeps_first_transition_tried() {
        // Line order (a/1, a/2) means runtime order (a/2, a/1): the
        // second line's tag is tried first and a length tie keeps it
        let g = "\
0000000001
-1 g
: 0 1 1 1
t \n\
f
%a/one
%a/two
f
";
        let m = scan(g, "a").unwrap();
        assert_eq!(m.output, "two");
    }

    #[test]
    fn one_space_folds_before_each_token() {
        // Two word transitions in a row, no explicit space transition
        let g = "\
0000000001
-1 g
: 0 1
: 1 2
t \n\
f
%the/T
%cat/C
f
";
        let m = scan(g, "the cat").unwrap();
        assert_eq!(m, Match { length: 7, output: "TC".to_string() });
        // Only one space folds per transition
        assert_eq!(scan(g, "the  cat"), None);
    }

    #[test]
    fn space_folds_before_meta_tokens_too() {
        let g = "\
0000000001
-1 g
: 0 1
: 1 2
t \n\
f
%a/A
%<NB>/N
f
";
        let m = scan(g, "a 12").unwrap();
        assert_eq!(m, Match { length: 4, output: "AN".to_string() });
    }

    #[test]
    fn letter_initial_match_cannot_start_mid_word() {
        let g = one_tag("cat/dog");
        assert_eq!(scan_at(&g, "scat", 1), None);
        // Fine right after a non-letter
        assert_eq!(scan_at(&g, "s.cat", 2).unwrap().length, 3);
        // Character-by-character parsing drops the constraint
        assert_eq!(scan_mode(&g, "scat", 1, false).unwrap().length, 3);
        assert_eq!(scan_at(&one_tag("<MOT>/W"), "xab", 1), None);
    }

    #[test]
    fn meta_word_matches_letter_run() {
        let m = scan(&one_tag("<MOT>/W"), "hello, x").unwrap();
        assert_eq!(m, Match { length: 5, output: "W".to_string() });
        assert_eq!(scan(&one_tag("<MOT>/W"), "123"), None);
    }

    #[test]
    fn meta_digits() {
        let m = scan(&one_tag("<NB>/N"), "2024x").unwrap();
        assert_eq!(m.length, 4);
        assert_eq!(scan(&one_tag("<NB>/N"), "abc"), None);
    }

    #[test]
    fn meta_case_constrained_runs() {
        assert_eq!(scan(&one_tag("<MAJ>/U"), "ABC def").unwrap().length, 3);
        assert_eq!(scan(&one_tag("<MAJ>/U"), "ABc"), None);
        assert_eq!(scan(&one_tag("<MIN>/l"), "abc DEF").unwrap().length, 3);
        assert_eq!(scan(&one_tag("<MIN>/l"), "abC"), None);
        assert_eq!(scan(&one_tag("<PRE>/P"), "Abc def").unwrap().length, 3);
        assert_eq!(scan(&one_tag("<PRE>/P"), "abc"), None);
    }

    #[test]
    fn meta_letter_and_newline() {
        assert_eq!(scan(&one_tag("<L>/x"), "ab").unwrap().length, 1);
        assert_eq!(scan(&one_tag("<^>/n"), "\nrest").unwrap().length, 1);
        assert_eq!(scan(&one_tag("<^>/n"), "rest"), None);
    }

    #[test]
    fn punctuation_with_ellipsis() {
        assert!(scan(&one_tag("<PNC>/p"), "wait").is_none());
        assert_eq!(scan(&one_tag("<PNC>/p"), "!x").unwrap().length, 1);
        assert_eq!(scan(&one_tag("<PNC>/p"), "...x").unwrap().length, 3);
        assert_eq!(scan(&one_tag("<PNC>/p"), ".x").unwrap().length, 1);
        // Two dots are one dot token, not an ellipsis
        assert_eq!(scan(&one_tag("<PNC>/p"), "..x").unwrap().length, 1);
    }

    #[test]
    fn no_space_assertion_is_zero_width() {
        // '#' then 'a': the assertion consumes nothing, it only rejects
        // positions sitting on a space
        let g = "0000000001\n-1 g\n: 1 1\n: 0 2\nt \nf\n%a\n%#\nf\n";
        assert_eq!(scan(g, "a.").unwrap().length, 1);
        assert_eq!(scan(g, "a b").unwrap().length, 1);
        assert_eq!(scan(g, " a"), None);
    }

    #[test]
    fn anchors_fire_only_at_true_ends() {
        let start = one_tag("{^}/S");
        let m = scan(&start, "abc").unwrap();
        assert_eq!(m, Match { length: 0, output: "S".to_string() });
        assert_eq!(scan_at(&start, "abc", 1), None);

        let end = one_tag("{$}/E");
        assert_eq!(scan(&end, "abc"), None);
        let m = scan_at(&end, "abc", 3).unwrap();
        assert_eq!(m, Match { length: 0, output: "E".to_string() });
    }

    #[test]
    fn variable_capture_and_substitution() {
        // $a( <MOT> $a) then <E>/$a$-$a$
        let g = "\
0000000001
-1 g
: 0 1
: 1 2
: 2 3
: 3 4
t \n\
f
%$a(
%<MOT>
%$a)
%<E>/$a$-$a$
f
";
        let m = scan(g, "hi.").unwrap();
        assert_eq!(m.length, 2);
        assert_eq!(m.output, "hi-hi");
    }

    #[test]
    fn variable_leading_space_folded_into_match() {
        // ok $a( <MOT> $a) <E>/[$a$]
        let g = "\
0000000001
-1 g
: 0 1
: 1 2
: 2 3
: 3 4
: 4 5
t \n\
f
%ok
%$a(
%<MOT>
%$a)
%<E>/[$a$]
f
";
        // The space before the capture is folded into the match by the
        // begin mark but stays out of the captured span; the end mark
        // resumes in place
        let m = scan(g, "ok go now").unwrap();
        assert_eq!(m.length, 5);
        assert_eq!(m.output, "[go]");
    }

    #[test]
    fn subgraph_exits_resumed_independently() {
        // Main: call graph 2, then require literal "b". Graph 2 matches
        // "a" or "ab"; only the "a" exit lets the caller consume "b".
        let g = "\
0000000002
-1 main
: -2 1
: 0 2
t \n\
f
-2 sub
: 1 1 2 2
t \n\
t \n\
f
%b/B
%a/A
%ab/ALL
f
";
        let m = scan_mode(g, "ab.", 0, false).unwrap();
        assert_eq!(m.length, 2);
        assert_eq!(m.output, "AB");
    }

    #[test]
    fn subgraph_exit_positions_deduped() {
        // Two paths through the subgraph reach the same exit position;
        // the caller must be resumed only once, giving one best match
        let g = "\
0000000002
-1 main
: -2 1
t \n\
f
-2 sub
: 0 1 1 1
t \n\
f
%x/one
%x/two
f
";
        let m = scan(g, "x").unwrap();
        assert_eq!(m.length, 1);
    }

    #[test]
    fn depth_limit_aborts_attempt() {
        // An epsilon self-loop recurses forever without consuming
        let g = "0000000001\n-1 g\n: 0 0 1 1\nt \nf\n%<E>\n%a/A\nf\n";
        let automaton = Automaton::parse(g).unwrap();
        let alphabet = Alphabet::ascii();
        let index = TokenIndex::build(&automaton, &alphabet);
        let mut scanner = Scanner::new(&automaton, &alphabet, &index, true);
        let chars: Vec<char> = "a".chars().collect();
        let input = ScanInput { text: &chars, base_offset: 0, at_text_end: true };
        assert_eq!(scanner.find_match(&input, 0), None);
        assert!(scanner.attempt_aborted());
    }

    #[test]
    fn zero_length_match_with_output() {
        let m = scan(&one_tag("<E>/ins"), "xyz").unwrap();
        assert_eq!(m, Match { length: 0, output: "ins".to_string() });
    }

    #[test]
    fn no_match_returns_none() {
        assert_eq!(scan(&one_tag("cat/dog"), "dog"), None);
    }
}
