//! Indentation-aware text output.
//!
//! Every emission routine in this crate writes through a [`Formatter`]
//! rather than a raw string, so indentation stays correct across deeply
//! nested generation without any caller tracking depth itself. The sink is
//! a plain `String` retrieved once with [`Formatter::finish`].

const INDENT: &str = "    ";

/// Line-oriented text sink with indent/unindent bookkeeping.
///
/// Indentation is applied lazily, at the first non-empty write on each
/// line, so blank lines never carry trailing spaces.
#[derive(Debug)]
pub struct Formatter {
    buf: String,
    depth: usize,
    at_line_start: bool,
}

impl Default for Formatter {
    fn default() -> Self {
        Self::new()
    }
}

impl Formatter {
    pub fn new() -> Self {
        Self {
            buf: String::new(),
            depth: 0,
            at_line_start: true,
        }
    }

    /// Increase the indentation level for subsequent lines.
    pub fn indent(&mut self) {
        self.depth += 1;
    }

    /// Decrease the indentation level.
    pub fn unindent(&mut self) {
        debug_assert!(self.depth > 0, "unbalanced unindent");
        self.depth = self.depth.saturating_sub(1);
    }

    /// Write a fragment without a trailing newline.
    pub fn write(&mut self, text: &str) {
        for (i, part) in text.split('\n').enumerate() {
            if i > 0 {
                self.buf.push('\n');
                self.at_line_start = true;
            }
            if part.is_empty() {
                continue;
            }
            if self.at_line_start {
                for _ in 0..self.depth {
                    self.buf.push_str(INDENT);
                }
                self.at_line_start = false;
            }
            self.buf.push_str(part);
        }
    }

    /// Write one full line at the current indentation.
    pub fn line(&mut self, text: &str) {
        self.write(text);
        self.buf.push('\n');
        self.at_line_start = true;
    }

    /// Emit an empty line.
    pub fn blank(&mut self) {
        self.buf.push('\n');
        self.at_line_start = true;
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Consume the formatter and return everything written so far.
    pub fn finish(self) -> String {
        self.buf
    }
}

impl std::fmt::Write for Formatter {
    fn write_str(&mut self, s: &str) -> std::fmt::Result {
        self.write(s);
        Ok(())
    }
}
