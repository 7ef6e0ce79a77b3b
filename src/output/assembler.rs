// src/output/assembler.rs

//! Line reconstruction from arbitrary output chunks.
//!
//! Processes write whatever they like whenever they like: a read from a pipe
//! or an SSH channel may end in the middle of a line, in the middle of a
//! multi-byte character, or between the `\r` and `\n` of a CRLF pair. The
//! assembler turns that byte soup back into lines without losing, merging,
//! duplicating or reordering anything.
//!
//! Line rule:
//! - `\n` ends a line,
//! - `\r\n` ends a line (the pair stays together),
//! - a lone `\r` ends a line too, so carriage-return redraws (progress bars,
//!   live console captures) show up as separate lines with their `\r` kept.
//!
//! Terminators stay attached to their line. Concatenating every emitted line
//! gives back the exact input text (unless `end_in_newlines` added some).

/// Split `text` into terminated lines and an unterminated remainder.
///
/// A `\r` at the very end of `text` is left in the remainder, because the
/// next chunk may start with the `\n` that completes it.
pub fn split_lines(text: &str) -> (Vec<&str>, &str) {
    let bytes = text.as_bytes();
    let mut lines = Vec::new();
    let mut start = 0;
    let mut i = 0;

    // `\r` and `\n` are ASCII, so they never occur inside a multi-byte
    // sequence and every index below is a char boundary.
    while i < bytes.len() {
        match bytes[i] {
            b'\n' => {
                lines.push(&text[start..=i]);
                i += 1;
                start = i;
            }
            b'\r' => {
                if i + 1 == bytes.len() {
                    break;
                }
                let end = if bytes[i + 1] == b'\n' { i + 2 } else { i + 1 };
                lines.push(&text[start..end]);
                i = end;
                start = end;
            }
            _ => i += 1,
        }
    }

    (lines, &text[start..])
}

/// Per-stream assembler state.
///
/// Holds the bytes of an incomplete UTF-8 sequence and the unterminated tail
/// of the current line between chunks.
#[derive(Debug, Default)]
pub struct LineAssembler {
    undecoded: Vec<u8>,
    partial: String,
    end_in_newlines: bool,
}

impl LineAssembler {
    pub fn new(end_in_newlines: bool) -> Self {
        Self {
            undecoded: Vec::new(),
            partial: String::new(),
            end_in_newlines,
        }
    }

    /// Feed one raw chunk and return every line it completed.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.undecoded.extend_from_slice(chunk);
        let decoded = decode_available(&mut self.undecoded);
        self.partial.push_str(&decoded);

        let end_in_newlines = self.end_in_newlines;
        let (lines, rest) = split_lines(&self.partial);
        let rest_len = rest.len();
        let out: Vec<String> = lines
            .into_iter()
            .map(|line| terminate(line.to_string(), end_in_newlines))
            .collect();

        let consumed = self.partial.len() - rest_len;
        self.partial.drain(..consumed);
        out
    }

    /// Flush whatever is left at end of stream.
    ///
    /// Bytes that never formed a valid UTF-8 sequence come out as U+FFFD.
    pub fn finish(&mut self) -> Option<String> {
        if !self.undecoded.is_empty() {
            let tail = String::from_utf8_lossy(&self.undecoded).into_owned();
            self.partial.push_str(&tail);
            self.undecoded.clear();
        }
        if self.partial.is_empty() {
            return None;
        }
        let line = std::mem::take(&mut self.partial);
        Some(terminate(line, self.end_in_newlines))
    }

    /// True if a partial line or partial character is buffered.
    pub fn has_pending(&self) -> bool {
        !self.partial.is_empty() || !self.undecoded.is_empty()
    }
}

fn terminate(mut line: String, end_in_newlines: bool) -> String {
    if end_in_newlines && !line.ends_with('\n') {
        line.push('\n');
    }
    line
}

/// Decode as much of `buf` as possible, leaving an incomplete trailing
/// sequence in place for the next chunk.
fn decode_available(buf: &mut Vec<u8>) -> String {
    let mut out = String::new();
    let mut consumed = 0;

    loop {
        match std::str::from_utf8(&buf[consumed..]) {
            Ok(text) => {
                out.push_str(text);
                consumed = buf.len();
                break;
            }
            Err(err) => {
                let valid = err.valid_up_to();
                out.push_str(&String::from_utf8_lossy(&buf[consumed..consumed + valid]));
                consumed += valid;
                match err.error_len() {
                    Some(len) => {
                        out.push(char::REPLACEMENT_CHARACTER);
                        consumed += len;
                    }
                    None => break,
                }
            }
        }
    }

    buf.drain(..consumed);
    out
}
