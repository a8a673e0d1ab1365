//! Low-level text scanning for ABI descriptor files: a line splitter that
//! accepts LF, CRLF, and bare-CR endings, and a comma-separated field
//! tokenizer with optional quoting.
//!
//! Grammar per line:
//!
//! ```text
//! line    := field (',' field)*
//! field   := quoted | unquoted
//! quoted  := '"' [^"]* '"'        (closing quote then skip to next ',')
//! unquoted:= [^,]*
//! ```

/// Split on any line-ending flavor. Descriptor files may be generated on a
/// system with different line-ending conventions than the consumer's.
pub(crate) fn split_lines(text: &str) -> impl Iterator<Item = &str> {
    let mut rest = text;
    std::iter::from_fn(move || {
        if rest.is_empty() {
            return None;
        }
        match rest.find(['\n', '\r']) {
            Some(i) => {
                let line = &rest[..i];
                let after = &rest[i..];
                rest = if after.starts_with("\r\n") {
                    &after[2..]
                } else {
                    &after[1..]
                };
                Some(line)
            }
            None => {
                // Last line without a terminator.
                let line = rest;
                rest = "";
                Some(line)
            }
        }
    })
}

/// Sequential field reader over one line. Stops cleanly at end of input:
/// `next_field` returns `None` once the line is exhausted.
pub(crate) struct FieldReader<'a> {
    rest: &'a str,
    done: bool,
}

impl<'a> FieldReader<'a> {
    pub(crate) fn new(line: &'a str) -> Self {
        FieldReader { rest: line, done: false }
    }

    pub(crate) fn next_field(&mut self) -> Option<&'a str> {
        if self.done {
            return None;
        }

        if let Some(quoted) = self.rest.strip_prefix('"') {
            let field = match quoted.find('"') {
                Some(end) => {
                    let after = &quoted[end + 1..];
                    // Skip through the separator following the close quote.
                    match after.find(',') {
                        Some(i) => self.rest = &after[i + 1..],
                        None => {
                            self.rest = "";
                            self.done = true;
                        }
                    }
                    &quoted[..end]
                }
                None => {
                    // Unterminated quote: take the remainder.
                    self.done = true;
                    self.rest = "";
                    quoted
                }
            };
            return Some(field);
        }

        match self.rest.find(',') {
            Some(i) => {
                let field = &self.rest[..i];
                self.rest = &self.rest[i + 1..];
                Some(field)
            }
            None => {
                let field = self.rest;
                self.rest = "";
                self.done = true;
                Some(field)
            }
        }
    }

    /// Read two consecutive fields as a key/value pair. The value is empty
    /// when the line ends after the key.
    pub(crate) fn next_pair(&mut self) -> Option<(&'a str, &'a str)> {
        let key = self.next_field()?;
        let value = self.next_field().unwrap_or("");
        Some((key, value))
    }
}
