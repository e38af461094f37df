// Automaton model and .fst2 text-format loading.
//
// The .fst2 format is line-oriented:
//   - first line: number of graphs;
//   - per graph: a `-N name` header, then one line per state starting with
//     `t` (final) or `:` followed by (tag, destination) integer pairs, the
//     graph being terminated by a line `f`;
//   - then one line per tag, starting with `%` (case-folding) or `@`
//     (case-exact), terminated by a final line `f`.
// Destination states are numbered relative to their graph; a negative tag
// number -N denotes a call of graph N.

use std::path::Path;

/// Error type for grammar loading.
#[derive(Debug, thiserror::Error)]
pub enum GrammarError {
    #[error("cannot read grammar file: {0}")]
    Io(#[from] std::io::Error),
    #[error("missing or invalid graph count on first line")]
    BadGraphCount,
    #[error("grammar declares no graphs")]
    NoGraphs,
    #[error("line {line}: expected graph header '-{graph} <name>'")]
    BadGraphHeader { line: usize, graph: usize },
    #[error("line {line}: malformed state line: {reason}")]
    BadStateLine { line: usize, reason: String },
    #[error("graph {graph} has no states")]
    EmptyGraph { graph: usize },
    #[error("line {line}: malformed tag '{text}': {reason}")]
    BadTag { line: usize, text: String, reason: String },
    #[error("state {state} references unknown tag {tag}")]
    UnknownTag { state: usize, tag: i32 },
    #[error("state {state} calls unknown graph {graph}")]
    UnknownGraph { state: usize, graph: usize },
    #[error("unexpected end of file")]
    UnexpectedEof,
}

/// What a tag matches, decoded from its input pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TagKind {
    /// Literal text, compared case-exactly or with case folding.
    Literal,
    /// `<MOT>`: a sequence of letters.
    Word,
    /// `<NB>`: a sequence of digits.
    Digits,
    /// `<MAJ>`: a sequence of uppercase letters not followed by a letter.
    Upper,
    /// `<MIN>`: a sequence of lowercase letters not followed by a letter.
    Lower,
    /// `<PRE>`: a letter sequence starting uppercase, not followed by a letter.
    FirstUpper,
    /// `<PNC>`: one punctuation sign, with `...` consumed as a single token.
    Punct,
    /// `<L>`: a single letter.
    Letter,
    /// `<E>`: the empty sequence.
    Epsilon,
    /// `<^>`: a newline.
    Newline,
    /// `#`: zero-width assertion that the next character is not a space.
    NoSpace,
    /// A mandatory space.
    Space,
    /// `{^}`: zero-width, fires only at the very start of the text.
    TextStart,
    /// `{$}`: zero-width, fires only at the very end of the text.
    TextEnd,
    /// `$name(`: start mark of a named capture.
    BeginVar(String),
    /// `$name)`: end mark of a named capture.
    EndVar(String),
    /// `$|name(` / `$|name)`: output-variable mark, not supported by this
    /// engine; diagnosed at run time, never matches.
    OutputVar(String),
}

/// One edge label: an input pattern and an optional output pattern.
#[derive(Debug, Clone)]
pub struct Tag {
    pub kind: TagKind,
    /// The raw input pattern (unescaped).
    pub input: String,
    /// The output pattern, rendered on match (`$name$` substitutes a
    /// capture, `$$` a literal dollar).
    pub output: Option<String>,
    /// `@` tags require an exact-case comparison.
    pub case_exact: bool,
}

/// One outgoing edge. `tag >= 0` indexes [`Automaton::tags`]; `tag < 0`
/// calls graph `-tag`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub tag: i32,
    pub dest: u32,
}

/// One automaton state.
///
/// `transitions` is in runtime order, which is the *reverse* of the order
/// on the state line: the grammar compiler populated transition lists by
/// list-prepend, and length ties between matches favor the first
/// transition tried, so this ordering is a semantic contract.
#[derive(Debug, Clone)]
pub struct State {
    pub is_final: bool,
    pub transitions: Vec<Transition>,
}

/// A loaded grammar transducer: a flat state table shared by all graphs,
/// the tag table, and the initial state of each graph. Read-only during
/// runs.
#[derive(Debug)]
pub struct Automaton {
    pub states: Vec<State>,
    pub tags: Vec<Tag>,
    graph_first: Vec<u32>,
    graph_names: Vec<String>,
    variables: Vec<String>,
}

impl Automaton {
    /// Load a grammar from a `.fst2` file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, GrammarError> {
        let text = std::fs::read_to_string(path)?;
        Self::parse(&text)
    }

    /// Parse the `.fst2` text format.
    pub fn parse(text: &str) -> Result<Self, GrammarError> {
        Parser::new(text).parse()
    }

    /// Number of graphs. Graphs are numbered starting at 1; graph 1 is the
    /// main graph.
    pub fn graph_count(&self) -> usize {
        self.graph_first.len()
    }

    /// Initial state of the given graph (1-based graph number).
    pub fn initial_state(&self, graph: usize) -> u32 {
        self.graph_first[graph - 1]
    }

    pub fn graph_name(&self, graph: usize) -> &str {
        &self.graph_names[graph - 1]
    }

    /// Names of the variables referenced by begin/end marks, in first-use
    /// order.
    pub fn variables(&self) -> &[String] {
        &self.variables
    }
}

impl Tag {
    /// Decode one tag body (the line without its `%`/`@` sigil).
    fn decode(body: &str, case_exact: bool) -> Result<Tag, String> {
        let (raw_input, output) = split_output(body);
        let input = unescape(raw_input);
        let kind = classify(&input, case_exact)?;
        Ok(Tag {
            kind,
            input,
            output: output.map(str::to_string),
            case_exact,
        })
    }

}

/// Split a tag body into input pattern and optional output pattern at the
/// first unescaped `/`.
fn split_output(body: &str) -> (&str, Option<&str>) {
    let mut escaped = false;
    for (i, c) in body.char_indices() {
        match c {
            '\\' if !escaped => escaped = true,
            '/' if !escaped => return (&body[..i], Some(&body[i + 1..])),
            _ => escaped = false,
        }
    }
    (body, None)
}

fn unescape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut escaped = false;
    for c in s.chars() {
        if escaped || c != '\\' {
            out.push(c);
            escaped = false;
        } else {
            escaped = true;
        }
    }
    out
}

fn is_variable_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

fn parse_variable_name(s: &str) -> Result<(String, char), String> {
    let mut name = String::new();
    let mut chars = s.chars();
    for c in chars.by_ref() {
        if is_variable_char(c) {
            name.push(c);
        } else if (c == '(' || c == ')') && chars.next().is_none() {
            if name.is_empty() {
                return Err("empty variable name".to_string());
            }
            return Ok((name, c));
        } else {
            return Err(format!("invalid character '{c}' in variable mark"));
        }
    }
    Err("variable mark must end with '(' or ')'".to_string())
}

fn classify(input: &str, case_exact: bool) -> Result<TagKind, String> {
    match input {
        "<E>" => return Ok(TagKind::Epsilon),
        "<MOT>" => return Ok(TagKind::Word),
        "<NB>" => return Ok(TagKind::Digits),
        "<MAJ>" => return Ok(TagKind::Upper),
        "<MIN>" => return Ok(TagKind::Lower),
        "<PRE>" => return Ok(TagKind::FirstUpper),
        "<PNC>" => return Ok(TagKind::Punct),
        "<L>" => return Ok(TagKind::Letter),
        "<^>" => return Ok(TagKind::Newline),
        "{^}" => return Ok(TagKind::TextStart),
        "{$}" => return Ok(TagKind::TextEnd),
        " " => return Ok(TagKind::Space),
        // An exact-case `@#` is a literal hash sign
        "#" if !case_exact => return Ok(TagKind::NoSpace),
        "" => return Err("empty input pattern".to_string()),
        _ => {}
    }
    if let Some(rest) = input.strip_prefix("$|") {
        let (name, _) = parse_variable_name(rest)?;
        return Ok(TagKind::OutputVar(name));
    }
    if let Some(rest) = input.strip_prefix('$') {
        let (name, mark) = parse_variable_name(rest)?;
        return Ok(match mark {
            '(' => TagKind::BeginVar(name),
            _ => TagKind::EndVar(name),
        });
    }
    Ok(TagKind::Literal)
}

struct Parser<'a> {
    lines: std::iter::Enumerate<std::str::Lines<'a>>,
}

impl<'a> Parser<'a> {
    fn new(text: &'a str) -> Self {
        let text = text.strip_prefix('\u{feff}').unwrap_or(text);
        Parser { lines: text.lines().enumerate() }
    }

    /// Next line with its 1-based number, trailing `\r` stripped.
    fn next_line(&mut self) -> Result<(usize, &'a str), GrammarError> {
        self.lines
            .next()
            .map(|(i, l)| (i + 1, l.trim_end_matches('\r')))
            .ok_or(GrammarError::UnexpectedEof)
    }

    fn parse(mut self) -> Result<Automaton, GrammarError> {
        let (_, first) = self.next_line().map_err(|_| GrammarError::BadGraphCount)?;
        let graph_count: usize = first.trim().parse().map_err(|_| GrammarError::BadGraphCount)?;
        if graph_count == 0 {
            return Err(GrammarError::NoGraphs);
        }

        let mut states: Vec<State> = Vec::new();
        let mut graph_first = Vec::with_capacity(graph_count);
        let mut graph_names = Vec::with_capacity(graph_count);
        for graph in 1..=graph_count {
            let (name, graph_states) = self.parse_graph(graph, states.len() as u32)?;
            if graph_states.is_empty() {
                return Err(GrammarError::EmptyGraph { graph });
            }
            graph_first.push(states.len() as u32);
            graph_names.push(name);
            states.extend(graph_states);
        }

        let tags = self.parse_tags()?;

        // Validate edge targets now so the scanner can index freely.
        for (i, state) in states.iter().enumerate() {
            for t in &state.transitions {
                if t.tag < 0 {
                    let g = (-t.tag) as usize;
                    if g == 0 || g > graph_count {
                        return Err(GrammarError::UnknownGraph { state: i, graph: g });
                    }
                } else if t.tag as usize >= tags.len() {
                    return Err(GrammarError::UnknownTag { state: i, tag: t.tag });
                }
            }
        }

        let variables = collect_variables(&tags);
        Ok(Automaton { states, tags, graph_first, graph_names, variables })
    }

    fn parse_graph(
        &mut self,
        graph: usize,
        base: u32,
    ) -> Result<(String, Vec<State>), GrammarError> {
        let (line_no, header) = self.next_line()?;
        let name = header
            .strip_prefix('-')
            .and_then(|h| {
                let (num, name) = h.split_once(' ').unwrap_or((h, ""));
                (num.parse::<usize>() == Ok(graph)).then(|| name.to_string())
            })
            .ok_or(GrammarError::BadGraphHeader { line: line_no, graph })?;

        let mut graph_states = Vec::new();
        loop {
            let (line_no, line) = self.next_line()?;
            if line.trim() == "f" {
                return Ok((name, graph_states));
            }
            let (marker, rest) = line.split_at(line.chars().next().map_or(0, char::len_utf8));
            let is_final = match marker {
                "t" => true,
                ":" => false,
                _ => {
                    return Err(GrammarError::BadStateLine {
                        line: line_no,
                        reason: format!("state must start with 't' or ':', got '{marker}'"),
                    });
                }
            };
            let numbers: Vec<i64> = rest
                .split_whitespace()
                .map(|n| n.parse::<i64>())
                .collect::<Result<_, _>>()
                .map_err(|e| GrammarError::BadStateLine {
                    line: line_no,
                    reason: e.to_string(),
                })?;
            if numbers.len() % 2 != 0 {
                return Err(GrammarError::BadStateLine {
                    line: line_no,
                    reason: "odd number of integers, expected (tag, dest) pairs".to_string(),
                });
            }
            let mut transitions: Vec<Transition> = numbers
                .chunks_exact(2)
                .map(|pair| {
                    let dest = u32::try_from(pair[1]).map_err(|_| GrammarError::BadStateLine {
                        line: line_no,
                        reason: format!("negative destination state {}", pair[1]),
                    })?;
                    Ok(Transition { tag: pair[0] as i32, dest: base + dest })
                })
                .collect::<Result<_, GrammarError>>()?;
            // Runtime order is the reverse of the line order (historical
            // list-prepend in the grammar compiler); length ties between
            // matches depend on it.
            transitions.reverse();
            graph_states.push(State { is_final, transitions });
        }
    }

    fn parse_tags(&mut self) -> Result<Vec<Tag>, GrammarError> {
        let mut tags = Vec::new();
        loop {
            let (line_no, line) = self.next_line()?;
            if line == "f" {
                return Ok(tags);
            }
            let case_exact = match line.chars().next() {
                Some('%') => false,
                Some('@') => true,
                _ => {
                    return Err(GrammarError::BadTag {
                        line: line_no,
                        text: line.to_string(),
                        reason: "tag must start with '%' or '@'".to_string(),
                    });
                }
            };
            let tag = Tag::decode(&line[1..], case_exact).map_err(|reason| {
                GrammarError::BadTag { line: line_no, text: line.to_string(), reason }
            })?;
            tags.push(tag);
        }
    }
}

fn collect_variables(tags: &[Tag]) -> Vec<String> {
    let mut names: Vec<String> = Vec::new();
    for tag in tags {
        if let TagKind::BeginVar(n) | TagKind::EndVar(n) = &tag.kind
            && !names.iter().any(|x| x == n)
        {
            names.push(n.clone());
        }
    }
    names
}
