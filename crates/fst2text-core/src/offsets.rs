// Offset alignment tables.
//
// A rewriting pass maps spans of the original text to spans of the
// rewritten text. The table lets downstream tools translate positions in
// the rewritten text back to positions in the original one. The on-disk
// format is one record per line, four integers separated by spaces.

use std::io::{self, Write};

use serde::Serialize;

/// One correction: `[old_start;old_end[` in the input text corresponds to
/// `[new_start;new_end[` in the output text. All values are character
/// offsets. An empty input span records a pure insertion; an empty output
/// span records a deletion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct OffsetRecord {
    pub old_start: usize,
    pub old_end: usize,
    pub new_start: usize,
    pub new_end: usize,
}

impl OffsetRecord {
    pub fn new(old_start: usize, old_end: usize, new_start: usize, new_end: usize) -> Self {
        OffsetRecord { old_start, old_end, new_start, new_end }
    }
}

/// Offset records in production order.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct OffsetTable {
    records: Vec<OffsetRecord>,
}

impl OffsetTable {
    pub fn new() -> Self {
        OffsetTable::default()
    }

    pub fn push(&mut self, record: OffsetRecord) {
        self.records.push(record);
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn records(&self) -> &[OffsetRecord] {
        &self.records
    }

    pub fn iter(&self) -> impl Iterator<Item = &OffsetRecord> {
        self.records.iter()
    }

    /// Write the table in the 4-integers-per-line text format.
    pub fn write_text<W: Write>(&self, mut w: W) -> io::Result<()> {
        for r in &self.records {
            writeln!(w, "{} {} {} {}", r.old_start, r.old_end, r.new_start, r.new_end)?;
        }
        Ok(())
    }
}

impl<'a> IntoIterator for &'a OffsetTable {
    type Item = &'a OffsetRecord;
    type IntoIter = std::slice::Iter<'a, OffsetRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.iter()
    }
}

impl FromIterator<OffsetRecord> for OffsetTable {
    fn from_iter<T: IntoIterator<Item = OffsetRecord>>(iter: T) -> Self {
        OffsetTable { records: iter.into_iter().collect() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_format() {
        let mut t = OffsetTable::new();
        t.push(OffsetRecord::new(1, 4, 1, 2));
        t.push(OffsetRecord::new(10, 10, 8, 11));
        let mut buf = Vec::new();
        t.write_text(&mut buf).unwrap();
        assert_eq!(String::from_utf8(buf).unwrap(), "1 4 1 2\n10 10 8 11\n");
    }

    #[test]
    fn empty_table_writes_nothing() {
        let t = OffsetTable::new();
        let mut buf = Vec::new();
        t.write_text(&mut buf).unwrap();
        assert!(buf.is_empty());
    }

    #[test]
    fn json_format() {
        let mut t = OffsetTable::new();
        t.push(OffsetRecord::new(2, 5, 2, 5));
        assert_eq!(
            serde_json::to_string(&t).unwrap(),
            r#"[{"old_start":2,"old_end":5,"new_start":2,"new_end":5}]"#
        );
    }

    #[test]
    fn production_order_preserved() {
        let records = [
            OffsetRecord::new(5, 6, 5, 5),
            OffsetRecord::new(0, 3, 0, 3),
        ];
        let t: OffsetTable = records.into_iter().collect();
        assert_eq!(t.records(), &records);
    }
}
