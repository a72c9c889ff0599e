//! Line scanner with single-line pushback
//!
//! The stack grammar never needs more than one line of lookahead, so the
//! scanner keeps exactly one line and a flag saying whether that line has
//! been pushed back.

use std::borrow::Cow;
use std::io::BufRead;

use crate::domain::ScanError;

/// Splits a dump into lines.
///
/// Lines are returned without their `\n` (and without a `\r` directly before
/// it). The final line does not need a terminator, and there is no limit on
/// line length.
pub struct DumpScanner<R> {
    reader: R,
    line: Vec<u8>,
    unscanned: bool,
}

impl<R: BufRead> DumpScanner<R> {
    pub fn new(reader: R) -> Self {
        Self { reader, line: Vec::new(), unscanned: false }
    }

    /// Advance to the next line.
    ///
    /// Returns `Ok(false)` at end of input. A pushed-back line is returned
    /// again before anything new is read.
    ///
    /// # Errors
    /// Propagates read failures of the underlying stream.
    pub fn scan(&mut self) -> Result<bool, ScanError> {
        if self.unscanned {
            self.unscanned = false;
            return Ok(true);
        }

        self.line.clear();
        let n = self.reader.read_until(b'\n', &mut self.line)?;
        if n == 0 {
            return Ok(false);
        }
        if self.line.last() == Some(&b'\n') {
            self.line.pop();
            if self.line.last() == Some(&b'\r') {
                self.line.pop();
            }
        }
        Ok(true)
    }

    /// Push the current line back so the next [`scan`](Self::scan) yields it
    /// again. Only one line can be pushed back.
    pub fn unscan(&mut self) {
        debug_assert!(!self.unscanned, "only one line of pushback is supported");
        self.unscanned = true;
    }

    /// Current line as text. Invalid UTF-8 is replaced, never rejected.
    pub fn text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.line)
    }

    /// Current line as raw bytes.
    pub fn bytes(&self) -> &[u8] {
        &self.line
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{self, Read};

    fn lines(input: &str) -> Vec<String> {
        let mut scanner = DumpScanner::new(input.as_bytes());
        let mut out = Vec::new();
        while scanner.scan().unwrap() {
            out.push(scanner.text().into_owned());
        }
        out
    }

    #[test]
    fn test_missing_trailing_newline() {
        assert_eq!(lines("a\nb"), vec!["a", "b"]);
        assert_eq!(lines("a\nb\n"), vec!["a", "b"]);
    }

    #[test]
    fn test_crlf_is_stripped() {
        assert_eq!(lines("a\r\nb\r\n"), vec!["a", "b"]);
    }

    #[test]
    fn test_blank_lines_are_kept() {
        assert_eq!(lines("a\n\nb\n"), vec!["a", "", "b"]);
    }

    #[test]
    fn test_long_line() {
        let long = "x".repeat(1 << 20);
        let input = format!("{long}\nshort\n");
        let got = lines(&input);
        assert_eq!(got[0].len(), 1 << 20);
        assert_eq!(got[1], "short");
    }

    #[test]
    fn test_unscan_repeats_line() {
        let mut scanner = DumpScanner::new("first\nsecond\n".as_bytes());
        assert!(scanner.scan().unwrap());
        assert_eq!(scanner.text(), "first");
        scanner.unscan();
        assert!(scanner.scan().unwrap());
        assert_eq!(scanner.text(), "first");
        assert!(scanner.scan().unwrap());
        assert_eq!(scanner.bytes(), b"second");
        assert!(!scanner.scan().unwrap());
    }

    struct FailingReader;

    impl Read for FailingReader {
        fn read(&mut self, _buf: &mut [u8]) -> io::Result<usize> {
            Err(io::Error::new(io::ErrorKind::Other, "device gone"))
        }
    }

    #[test]
    fn test_read_failure_propagates() {
        let mut scanner = DumpScanner::new(io::BufReader::new(FailingReader));
        let err = scanner.scan().unwrap_err();
        assert!(err.to_string().contains("device gone"));
    }
}
