//! Wire framing for `text/event-stream` bodies.
//!
//! [`Frame`] turns one outgoing message into the records the browser's
//! `EventSource` expects: every line of the payload becomes its own
//! `data:` record and a blank line dispatches the event.
//!
//! ```text
//! data: f
//! data: g
//! data: h
//!
//! ```

use std::fmt;

const DATA_PREFIX: &str = "data: ";

/// Encode a payload into a complete frame.
pub fn encode(payload: &str) -> Vec<u8> {
    Frame::new(payload).into_bytes()
}

/// One outgoing message, split into the lines it is sent as.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    lines: Vec<String>,
}

impl Frame {
    /// Any text is encodable; an empty payload still yields one (empty)
    /// `data:` record so the client dispatches an event.
    pub fn new(payload: &str) -> Self {
        Self {
            lines: Lines::new(payload).map(str::to_string).collect(),
        }
    }

    /// The payload lines, free of any `\r` or `\n`.
    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    /// The payload as the client will see it: lines joined with `\n`.
    pub fn data(&self) -> String {
        self.lines.join("\n")
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.to_string().into_bytes()
    }
}

impl fmt::Display for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for line in &self.lines {
            writeln!(f, "{DATA_PREFIX}{line}")?;
        }
        writeln!(f)
    }
}

/// Splits on `\r\n`, `\n` and `\r`, keeping empty lines.
///
/// Unlike `str::lines` an empty input yields one empty line and a trailing
/// line break yields a trailing empty line, so decoding recovers the payload
/// exactly.
struct Lines<'a> {
    rest: Option<&'a str>,
}

impl<'a> Lines<'a> {
    fn new(text: &'a str) -> Self {
        Self { rest: Some(text) }
    }
}

impl<'a> Iterator for Lines<'a> {
    type Item = &'a str;

    fn next(&mut self) -> Option<&'a str> {
        let rest = self.rest?;
        match rest.find(['\r', '\n']) {
            None => {
                self.rest = None;
                Some(rest)
            }
            Some(pos) => {
                let skip = if rest[pos..].starts_with("\r\n") { 2 } else { 1 };
                self.rest = Some(&rest[pos + skip..]);
                Some(&rest[..pos])
            }
        }
    }
}
