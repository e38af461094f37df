// Per-state index of letter-sequence literal tags.
//
// States in lexical grammars often carry hundreds of word literals.
// Instead of comparing each one against the text, the literals made only
// of letters are put in a per-state character trie built once per run;
// the scanner walks the trie along the text and gets every literal that
// matches in full, with its length. Case folding is handled by also
// following, for each text character, the lowercase letters it is a
// declared uppercase form of. Tags that do not qualify (non-letter
// characters, case-exact comparison, metacategories) stay on a residual
// list in runtime order.

use fst2text_core::Alphabet;
use hashbrown::HashMap;

use crate::grammar::{Automaton, TagKind, Transition};

#[derive(Debug, Default)]
struct Node {
    children: HashMap<char, u32>,
    /// Transitions whose whole pattern ends at this node, runtime order.
    matches: Vec<Transition>,
}

/// The index of one state.
#[derive(Debug)]
pub struct StateIndex {
    nodes: Vec<Node>,
    residual: Vec<Transition>,
}

/// Literal indexes for every state of an automaton, tied to the alphabet
/// the run uses.
#[derive(Debug)]
pub struct TokenIndex {
    states: Vec<StateIndex>,
}

impl TokenIndex {
    pub fn build(automaton: &Automaton, alphabet: &Alphabet) -> Self {
        let states = automaton
            .states
            .iter()
            .map(|state| {
                let mut index = StateIndex { nodes: vec![Node::default()], residual: Vec::new() };
                for &t in &state.transitions {
                    if t.tag >= 0 && is_indexable(&automaton.tags[t.tag as usize], alphabet) {
                        index.insert(&automaton.tags[t.tag as usize].input, t);
                    } else {
                        index.residual.push(t);
                    }
                }
                index
            })
            .collect();
        TokenIndex { states }
    }

    pub fn state(&self, state: u32) -> &StateIndex {
        &self.states[state as usize]
    }
}

/// Only case-folding literals made entirely of letters go in the trie.
fn is_indexable(tag: &crate::grammar::Tag, alphabet: &Alphabet) -> bool {
    tag.kind == TagKind::Literal
        && !tag.case_exact
        && !tag.input.is_empty()
        && tag.input.chars().all(|c| alphabet.is_letter(c))
}

impl StateIndex {
    fn insert(&mut self, pattern: &str, transition: Transition) {
        let mut node = 0u32;
        for c in pattern.chars() {
            node = match self.nodes[node as usize].children.get(&c) {
                Some(&n) => n,
                None => {
                    let n = self.nodes.len() as u32;
                    self.nodes.push(Node::default());
                    self.nodes[node as usize].children.insert(c, n);
                    n
                }
            };
        }
        self.nodes[node as usize].matches.push(transition);
    }

    /// Transitions not covered by the trie, in runtime order.
    pub fn residual(&self) -> &[Transition] {
        &self.residual
    }

    /// Walk the trie along the text starting at some position; `text`
    /// resolves relative character positions. `visit` is called once per
    /// fully matched literal group with the number of characters it
    /// consumed and its transitions in runtime order.
    pub fn walk(
        &self,
        alphabet: &Alphabet,
        text: impl Fn(usize) -> Option<char>,
        mut visit: impl FnMut(usize, &[Transition]),
    ) {
        if self.nodes.len() > 1 {
            self.walk_from(0, 0, alphabet, &text, &mut visit);
        }
    }

    fn walk_from(
        &self,
        node: u32,
        depth: usize,
        alphabet: &Alphabet,
        text: &impl Fn(usize) -> Option<char>,
        visit: &mut impl FnMut(usize, &[Transition]),
    ) {
        let node = &self.nodes[node as usize];
        if depth > 0 && !node.matches.is_empty() {
            visit(depth, &node.matches);
        }
        let Some(c) = text(depth) else { return };
        if let Some(&n) = node.children.get(&c) {
            self.walk_from(n, depth + 1, alphabet, text, visit);
        }
        for &lower in alphabet.lower_variants(c) {
            if lower != c
                && let Some(&n) = node.children.get(&lower)
            {
                self.walk_from(n, depth + 1, alphabet, text, visit);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grammar::Automaton;

    fn text_of(s: &'static str) -> impl Fn(usize) -> Option<char> {
        move |i| s.chars().nth(i)
    }

    fn grammar(tags: &[&str], pairs: &[(i32, u32)]) -> Automaton {
        let mut src = String::from("0000000001\n-1 g\n: ");
        for (t, d) in pairs {
            src.push_str(&format!("{t} {d} "));
        }
        src.push_str("\nt \nf\n");
        for t in tags {
            src.push_str(&format!("%{t}\n"));
        }
        src.push_str("f\n");
        Automaton::parse(&src).unwrap()
    }

    #[test]
    fn letter_literals_are_indexed() {
        let a = grammar(&["cat", "category", "<MOT>"], &[(0, 1), (1, 1), (2, 1)]);
        let alphabet = Alphabet::ascii();
        let index = TokenIndex::build(&a, &alphabet);
        let state = index.state(0);
        // Only the metacategory stays on the residual list
        assert_eq!(state.residual().len(), 1);
        assert_eq!(state.residual()[0].tag, 2);

        let mut seen: Vec<(usize, i32)> = Vec::new();
        state.walk(&alphabet, text_of("category"), |len, ts| {
            for t in ts {
                seen.push((len, t.tag));
            }
        });
        assert_eq!(seen, vec![(3, 0), (8, 1)]);
    }

    #[test]
    fn partial_match_does_not_fire() {
        let a = grammar(&["category"], &[(0, 1)]);
        let alphabet = Alphabet::ascii();
        let index = TokenIndex::build(&a, &alphabet);
        let mut seen = 0;
        index.state(0).walk(&alphabet, text_of("cater"), |_, _| seen += 1);
        assert_eq!(seen, 0);
    }

    #[test]
    fn case_folding_walk() {
        let a = grammar(&["cat"], &[(0, 1)]);
        let alphabet = Alphabet::ascii();
        let index = TokenIndex::build(&a, &alphabet);
        let mut seen: Vec<usize> = Vec::new();
        index.state(0).walk(&alphabet, text_of("CAT"), |len, _| seen.push(len));
        assert_eq!(seen, vec![3]);
    }

    #[test]
    fn case_exact_literal_stays_residual() {
        let text = "0000000001\n-1 g\n: 0 1\nt \nf\n@cat\nf\n";
        let a = Automaton::parse(text).unwrap();
        let alphabet = Alphabet::ascii();
        let index = TokenIndex::build(&a, &alphabet);
        assert_eq!(index.state(0).residual().len(), 1);
    }

    #[test]
    fn non_letter_literal_stays_residual() {
        let a = grammar(&["a1b"], &[(0, 1)]);
        let alphabet = Alphabet::ascii();
        let index = TokenIndex::build(&a, &alphabet);
        assert_eq!(index.state(0).residual().len(), 1);
    }

    #[test]
    fn same_literal_twice_keeps_runtime_order() {
        // Two transitions labeled with the same word: the line order is
        // (tag 0, tag 1), so runtime order is (1, 0)
        let a = grammar(&["cat", "cat"], &[(0, 1), (1, 1)]);
        let alphabet = Alphabet::ascii();
        let index = TokenIndex::build(&a, &alphabet);
        let mut seen: Vec<i32> = Vec::new();
        index.state(0).walk(&alphabet, text_of("cat"), |_, ts| {
            seen.extend(ts.iter().map(|t| t.tag));
        });
        assert_eq!(seen, vec![1, 0]);
    }
}
