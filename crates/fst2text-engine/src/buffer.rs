// Reloadable sliding window over an input stream.
//
// The engine matches over characters, not bytes, and must be able to look
// arbitrarily far ahead within one match attempt while still streaming
// texts larger than memory. The window holds a bounded run of decoded
// characters; when the scan position gets close to its end, the consumed
// prefix is dropped and more input is decoded in its place.

use std::io::{self, Read};

const READ_CHUNK: usize = 8 * 1024;

/// A sliding window of decoded characters over a byte stream.
#[derive(Debug)]
pub struct Window<R: Read> {
    reader: R,
    /// Undecoded bytes carried over between reads (an incomplete UTF-8
    /// sequence at a chunk boundary).
    pending: Vec<u8>,
    chars: Vec<char>,
    capacity: usize,
    /// Characters dropped before the current window start.
    absolute_offset: usize,
    /// The reader is exhausted; `chars` holds everything left.
    source_done: bool,
}

impl<R: Read> Window<R> {
    /// Create a window and fill it. `capacity` is in characters.
    pub fn new(reader: R, capacity: usize) -> io::Result<Self> {
        let mut w = Window {
            reader,
            pending: Vec::new(),
            chars: Vec::new(),
            capacity: capacity.max(4),
            absolute_offset: 0,
            source_done: false,
        };
        w.top_up()?;
        Ok(w)
    }

    /// Character at window-relative position `i`, if within the window.
    pub fn get(&self, i: usize) -> Option<char> {
        self.chars.get(i).copied()
    }

    /// Number of characters currently in the window.
    pub fn len(&self) -> usize {
        self.chars.len()
    }

    /// The decoded characters of the window.
    pub fn chars(&self) -> &[char] {
        &self.chars
    }

    pub fn is_empty(&self) -> bool {
        self.chars.is_empty()
    }

    /// Absolute character offset of window position 0.
    pub fn absolute_offset(&self) -> usize {
        self.absolute_offset
    }

    /// Whether the window end is the true end of the text.
    pub fn at_source_end(&self) -> bool {
        self.source_done
    }

    /// Whether scanning at window position `pos` should trigger a reload
    /// first: there is more input and less than half the window remains
    /// ahead.
    pub fn needs_reload(&self, pos: usize) -> bool {
        !self.source_done && self.chars.len() - pos.min(self.chars.len()) < self.capacity / 2
    }

    /// Drop the `consumed` characters before the scan position and decode
    /// more input into the freed space. Window positions shift down by
    /// `consumed`; [`Self::absolute_offset`] grows by the same amount.
    pub fn reload(&mut self, consumed: usize) -> io::Result<()> {
        self.chars.drain(..consumed.min(self.chars.len()));
        self.absolute_offset += consumed;
        self.top_up()
    }

    fn top_up(&mut self) -> io::Result<()> {
        let mut chunk = [0u8; READ_CHUNK];
        loop {
            self.decode_pending()?;
            if self.source_done || self.chars.len() >= self.capacity {
                return Ok(());
            }
            let n = self.reader.read(&mut chunk)?;
            if n == 0 {
                self.source_done = true;
                // decode_pending drained every complete sequence, so
                // leftover bytes are a truncated sequence at eof
                if !self.pending.is_empty() {
                    return Err(invalid_utf8());
                }
                return Ok(());
            }
            self.pending.extend_from_slice(&chunk[..n]);
        }
    }

    /// Decode complete UTF-8 sequences from `pending` until the window is
    /// full. Undecoded bytes, including at most one incomplete trailing
    /// sequence, stay in `pending` for a later reload.
    fn decode_pending(&mut self) -> io::Result<()> {
        let valid_len = match std::str::from_utf8(&self.pending) {
            Ok(s) => s.len(),
            Err(e) if e.error_len().is_none() => e.valid_up_to(),
            Err(_) => return Err(invalid_utf8()),
        };
        // Just validated up to valid_len; safe to re-slice.
        let valid = std::str::from_utf8(&self.pending[..valid_len]).map_err(|_| invalid_utf8())?;
        let mut consumed = 0;
        for c in valid.chars() {
            if self.chars.len() >= self.capacity {
                break;
            }
            self.chars.push(c);
            consumed += c.len_utf8();
        }
        self.pending.copy_within(consumed.., 0);
        self.pending.truncate(self.pending.len() - consumed);
        Ok(())
    }
}

fn invalid_utf8() -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, "input text is not valid UTF-8")
}
