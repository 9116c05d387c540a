//! Indentation-aware string builder for emitted JavaScript.

/// Builds JS source line by line, tracking block depth.
pub struct CodeWriter {
    buf: String,
    depth: usize,
}

impl Default for CodeWriter {
    fn default() -> Self {
        Self::new()
    }
}

impl CodeWriter {
    #[must_use]
    pub fn new() -> Self {
        Self {
            buf: String::new(),
            depth: 0,
        }
    }

    /// Write a line at the current indentation level.
    pub fn line(&mut self, text: &str) {
        self.write_indent();
        self.buf.push_str(text);
        self.buf.push('\n');
    }

    /// Write an empty line.
    pub fn blank(&mut self) {
        self.buf.push('\n');
    }

    /// Open a block: write `text {` and increase indent.
    pub fn open(&mut self, text: &str) {
        self.write_indent();
        self.buf.push_str(text);
        self.buf.push_str(" {\n");
        self.depth += 1;
    }

    /// Close a block: decrease indent and write `}`.
    pub fn close(&mut self) {
        self.depth = self.depth.saturating_sub(1);
        self.write_indent();
        self.buf.push_str("}\n");
    }

    /// Close with a continuation: `} else {`, `} else if (...) {`.
    pub fn close_open(&mut self, text: &str) {
        self.depth = self.depth.saturating_sub(1);
        self.write_indent();
        self.buf.push_str("} ");
        self.buf.push_str(text);
        self.buf.push_str(" {\n");
        self.depth += 1;
    }

    /// Consume and return the built source.
    #[must_use]
    pub fn finish(self) -> String {
        self.buf
    }

    fn write_indent(&mut self) {
        for _ in 0..self.depth {
            self.buf.push_str("  ");
        }
    }
}

/// Escape a string for embedding in a JS double-quoted string literal.
#[must_use]
pub fn escape_js(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            _ => out.push(c),
        }
    }
    out
}

/// Escape a JSON-pointer segment per RFC 6901 (`~` → `~0`, `/` → `~1`).
#[must_use]
pub fn escape_pointer(segment: &str) -> String {
    segment.replace('~', "~0").replace('/', "~1")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn open_close_produces_braced_block() {
        let mut w = CodeWriter::new();
        w.open("if (x)");
        w.line("f();");
        w.close();
        assert_eq!(w.finish(), "if (x) {\n  f();\n}\n");
    }

    #[test]
    fn close_open_chains_else() {
        let mut w = CodeWriter::new();
        w.open("if (a)");
        w.line("x();");
        w.close_open("else");
        w.line("y();");
        w.close();
        assert_eq!(w.finish(), "if (a) {\n  x();\n} else {\n  y();\n}\n");
    }

    #[test]
    fn escape_js_handles_quotes_and_backslashes() {
        assert_eq!(escape_js("a\"b\\c"), "a\\\"b\\\\c");
        assert_eq!(escape_js("line\nbreak"), "line\\nbreak");
    }

    #[test]
    fn pointer_segments_follow_rfc_6901() {
        assert_eq!(escape_pointer("a/b"), "a~1b");
        assert_eq!(escape_pointer("a~b"), "a~0b");
        assert_eq!(escape_pointer("plain"), "plain");
    }
}
