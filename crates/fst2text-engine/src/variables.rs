// Named capture registers.
//
// `$name(` and `$name)` marks in a grammar delimit a span of the input
// text; `$name$` in a tag output renders the captured span. Registers
// persist across match attempts within one run, so a capture set by an
// earlier attempt remains visible until overwritten.

use hashbrown::HashMap;

/// One capture register. Bounds are window-relative character positions;
/// `end` is inclusive.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Capture {
    pub start: Option<usize>,
    pub end: Option<usize>,
}

/// The capture registers of a run, one per variable name declared in the
/// grammar.
#[derive(Debug)]
pub struct VariableSet {
    index: HashMap<String, usize>,
    slots: Vec<Capture>,
}

/// A saved copy of every register, for backtracking.
pub type Snapshot = Vec<Capture>;

impl VariableSet {
    pub fn new(names: &[String]) -> Self {
        let index = names
            .iter()
            .enumerate()
            .map(|(i, n)| (n.clone(), i))
            .collect();
        VariableSet { index, slots: vec![Capture::default(); names.len()] }
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.index.get(name).copied()
    }

    pub fn get(&self, slot: usize) -> Capture {
        self.slots[slot]
    }

    pub fn set_start(&mut self, slot: usize, pos: usize) {
        self.slots[slot].start = Some(pos);
    }

    pub fn set_end(&mut self, slot: usize, pos: usize) {
        self.slots[slot].end = Some(pos);
    }

    pub fn snapshot(&self) -> Snapshot {
        self.slots.clone()
    }

    pub fn restore(&mut self, snapshot: &Snapshot) {
        self.slots.copy_from_slice(snapshot);
    }

    /// Account for a window reload that dropped `consumed` characters:
    /// register bounds shift down with the window; a bound that falls
    /// before the new window start is lost.
    pub fn shift(&mut self, consumed: usize) {
        for slot in &mut self.slots {
            slot.start = slot.start.and_then(|p| p.checked_sub(consumed));
            slot.end = slot.end.and_then(|p| p.checked_sub(consumed));
            if slot.start.is_none() || slot.end.is_none() {
                *slot = Capture::default();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(v: &[&str]) -> Vec<String> {
        v.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn set_and_get() {
        let mut vars = VariableSet::new(&names(&["a", "b"]));
        let a = vars.index_of("a").unwrap();
        vars.set_start(a, 2);
        vars.set_end(a, 5);
        assert_eq!(vars.get(a), Capture { start: Some(2), end: Some(5) });
        let b = vars.index_of("b").unwrap();
        assert_eq!(vars.get(b), Capture::default());
        assert_eq!(vars.index_of("zz"), None);
    }

    #[test]
    fn snapshot_restore() {
        let mut vars = VariableSet::new(&names(&["a"]));
        vars.set_start(0, 1);
        let snap = vars.snapshot();
        vars.set_start(0, 9);
        vars.set_end(0, 9);
        vars.restore(&snap);
        assert_eq!(vars.get(0), Capture { start: Some(1), end: None });
    }

    #[test]
    fn shift_drops_out_of_window_captures() {
        let mut vars = VariableSet::new(&names(&["a", "b"]));
        vars.set_start(0, 10);
        vars.set_end(0, 12);
        vars.set_start(1, 3);
        vars.set_end(1, 4);
        vars.shift(5);
        assert_eq!(vars.get(0), Capture { start: Some(5), end: Some(7) });
        assert_eq!(vars.get(1), Capture::default());
    }
}
