// Alphabet capability: letter classification and case correspondence.

use std::path::Path;

use hashbrown::HashMap;

const UPPER_BIT: u8 = 1;
const LOWER_BIT: u8 = 2;

/// Error type for alphabet file loading.
#[derive(Debug, thiserror::Error)]
pub enum AlphabetError {
    #[error("cannot read alphabet file: {0}")]
    Io(#[from] std::io::Error),
    #[error("line {line}: invalid interval '{text}': first letter must not be greater than the second")]
    InvalidInterval { line: usize, text: String },
    #[error("line {line}: expected an 'Upper lower' pair, a single letter or a #XY interval, got '{text}'")]
    MalformedLine { line: usize, text: String },
}

/// A language alphabet.
///
/// Declares which characters are letters, which of them are uppercase or
/// lowercase, and which uppercase forms correspond to a given lowercase
/// letter. Grammars are written in lowercase by convention; the
/// correspondence is what lets a lowercase grammar letter match its
/// uppercase text forms during case-folding comparison.
///
/// The file format is line-oriented:
/// - `Aa` declares the pair (uppercase `A`, lowercase `a`);
/// - a single letter declares a caseless letter mapped to itself
///   (scripts without case distinction);
/// - `#AZ` declares every code point from `A` to `Z` as a caseless letter.
#[derive(Debug)]
pub struct Alphabet {
    /// Per-character classification bits.
    flags: HashMap<char, u8>,
    /// Uppercase forms of a given lowercase letter.
    uppers_of: HashMap<char, Vec<char>>,
    /// Lowercase letters a given uppercase form corresponds to.
    /// Derived from `uppers_of`; used for reverse lookups when walking a
    /// character-keyed index built over lowercase grammar text.
    lowers_of: HashMap<char, Vec<char>>,
}

impl Alphabet {
    pub fn new() -> Self {
        Alphabet {
            flags: HashMap::new(),
            uppers_of: HashMap::new(),
            lowers_of: HashMap::new(),
        }
    }

    /// An ASCII Latin alphabet (`A`..`Z` paired with `a`..`z`).
    ///
    /// Convenient default for tools run without an alphabet file.
    pub fn ascii() -> Self {
        let mut a = Alphabet::new();
        for (upper, lower) in ('A'..='Z').zip('a'..='z') {
            a.add_pair(upper, lower);
        }
        a
    }

    /// Load an alphabet from a file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, AlphabetError> {
        let text = std::fs::read_to_string(path)?;
        Self::parse(&text)
    }

    /// Parse the alphabet file format.
    pub fn parse(text: &str) -> Result<Self, AlphabetError> {
        let mut a = Alphabet::new();
        for (i, raw) in text.lines().enumerate() {
            let line = raw.trim_end_matches('\r');
            if line.is_empty() {
                continue;
            }
            let chars: Vec<char> = line.chars().collect();
            match chars.as_slice() {
                ['#', first, last] => {
                    if first > last {
                        return Err(AlphabetError::InvalidInterval {
                            line: i + 1,
                            text: line.to_string(),
                        });
                    }
                    for c in *first..=*last {
                        a.add_caseless(c);
                    }
                }
                [upper, lower] => a.add_pair(*upper, *lower),
                [single] => a.add_caseless(*single),
                _ => {
                    return Err(AlphabetError::MalformedLine {
                        line: i + 1,
                        text: line.to_string(),
                    });
                }
            }
        }
        Ok(a)
    }

    /// Declare `upper` as an uppercase form of `lower`.
    pub fn add_pair(&mut self, upper: char, lower: char) {
        *self.flags.entry(upper).or_default() |= UPPER_BIT;
        *self.flags.entry(lower).or_default() |= LOWER_BIT;
        self.uppers_of.entry(lower).or_default().push(upper);
        self.lowers_of.entry(upper).or_default().push(lower);
    }

    /// Declare a letter with no case distinction, mapped to itself.
    pub fn add_caseless(&mut self, c: char) {
        *self.flags.entry(c).or_default() |= UPPER_BIT | LOWER_BIT;
        self.uppers_of.entry(c).or_default().push(c);
        self.lowers_of.entry(c).or_default().push(c);
    }

    pub fn is_letter(&self, c: char) -> bool {
        self.flags.contains_key(&c)
    }

    pub fn is_upper(&self, c: char) -> bool {
        self.flags.get(&c).is_some_and(|f| f & UPPER_BIT != 0)
    }

    pub fn is_lower(&self, c: char) -> bool {
        self.flags.get(&c).is_some_and(|f| f & LOWER_BIT != 0)
    }

    /// Whether `upper` is a declared uppercase form of `lower`.
    pub fn is_upper_of(&self, lower: char, upper: char) -> bool {
        self.uppers_of
            .get(&lower)
            .is_some_and(|ups| ups.contains(&upper))
    }

    /// Case-folding comparison used when matching grammar text against
    /// input text: the grammar character matches itself and, if it is a
    /// lowercase letter, every declared uppercase form of it.
    pub fn is_equal_or_case_equal(&self, grammar_c: char, text_c: char) -> bool {
        grammar_c == text_c || self.is_upper_of(grammar_c, text_c)
    }

    /// The lowercase letters a text character may stand for, not counting
    /// the character itself. Empty for anything that is not a declared
    /// uppercase form.
    pub fn lower_variants(&self, text_c: char) -> &[char] {
        self.lowers_of.get(&text_c).map_or(&[], Vec::as_slice)
    }
}

impl Default for Alphabet {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pair_classification() {
        let a = Alphabet::parse("Aa\nBb\n").unwrap();
        assert!(a.is_letter('A'));
        assert!(a.is_letter('a'));
        assert!(a.is_upper('A'));
        assert!(!a.is_upper('a'));
        assert!(a.is_lower('b'));
        assert!(!a.is_lower('B'));
        assert!(!a.is_letter('0'));
        assert!(!a.is_letter(' '));
    }

    #[test]
    fn caseless_single_letter() {
        // Caseless scripts declare one letter per line, upper and lower at once
        let a = Alphabet::parse("\u{0E01}\n").unwrap();
        assert!(a.is_letter('\u{0E01}'));
        assert!(a.is_upper('\u{0E01}'));
        assert!(a.is_lower('\u{0E01}'));
        assert!(a.is_equal_or_case_equal('\u{0E01}', '\u{0E01}'));
    }

    #[test]
    fn interval() {
        let a = Alphabet::parse("#AC\n").unwrap();
        assert!(a.is_letter('A'));
        assert!(a.is_letter('B'));
        assert!(a.is_letter('C'));
        assert!(!a.is_letter('D'));
        assert!(a.is_equal_or_case_equal('B', 'B'));
    }

    #[test]
    fn reject_descending_interval() {
        let err = Alphabet::parse("#ZA\n").unwrap_err();
        assert!(matches!(err, AlphabetError::InvalidInterval { line: 1, .. }));
    }

    #[test]
    fn reject_long_line() {
        let err = Alphabet::parse("ABC\n").unwrap_err();
        assert!(matches!(err, AlphabetError::MalformedLine { line: 1, .. }));
    }

    #[test]
    fn case_folding() {
        let a = Alphabet::parse("Aa\n\u{00C9}e\n").unwrap();
        // A lowercase grammar letter matches its uppercase forms
        assert!(a.is_equal_or_case_equal('a', 'A'));
        assert!(a.is_equal_or_case_equal('a', 'a'));
        // but not the other way around
        assert!(!a.is_equal_or_case_equal('A', 'a'));
        // 'e' has two uppercase forms here
        assert!(a.is_upper_of('e', '\u{00C9}'));
        assert!(!a.is_upper_of('e', 'E'));
    }

    #[test]
    fn multiple_uppers_for_one_lower() {
        let a = Alphabet::parse("Ee\n\u{00C9}e\n").unwrap();
        assert!(a.is_equal_or_case_equal('e', 'E'));
        assert!(a.is_equal_or_case_equal('e', '\u{00C9}'));
    }

    #[test]
    fn lower_variants_reverse_lookup() {
        let a = Alphabet::ascii();
        assert_eq!(a.lower_variants('A'), &['a']);
        assert!(a.lower_variants('a').is_empty());
        assert!(a.lower_variants('!').is_empty());
    }

    #[test]
    fn empty_and_blank_lines_skipped() {
        let a = Alphabet::parse("Aa\n\n\nBb\n").unwrap();
        assert!(a.is_letter('b'));
    }
}
