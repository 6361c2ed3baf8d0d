use memchr::memmem::Finder;

const CRLF: &[u8] = b"\r\n";

/// An incremental line tokenizer.
///
/// Bytes are accumulated across [`feed`](LineParser::feed) calls
/// until the end-of-line sequence appears, at which point the
/// completed line (without its terminator) is returned along with the
/// number of bytes of the current chunk that were consumed. The
/// terminator is configurable: CRLF by default, but a bare LF or a
/// multipart boundary are equally valid.
///
/// A single chunk may hold several lines; callers retrieve them by
/// calling `feed` again with `start` advanced by the consumed count.
#[derive(Debug)]
pub struct LineParser {
    buffer: Vec<u8>,
    eol: Vec<u8>,
    searched: usize,
}

impl Default for LineParser {
    fn default() -> Self {
        Self::new()
    }
}

impl LineParser {
    /// construct a tokenizer with the default CRLF terminator
    pub fn new() -> Self {
        Self::with_eol(CRLF)
    }

    /// construct a tokenizer with the provided terminator
    pub fn with_eol(eol: &[u8]) -> Self {
        Self {
            buffer: Vec::new(),
            eol: eol.to_vec(),
            searched: 0,
        }
    }

    /// discard accumulated bytes and set a new terminator
    pub fn reset(&mut self, eol: &[u8]) {
        self.buffer.clear();
        self.searched = 0;
        if self.eol != eol {
            self.eol = eol.to_vec();
        }
    }

    /// bytes accumulated so far without a completed line
    pub fn pending(&self) -> &[u8] {
        &self.buffer
    }

    /// Feed `chunk[start..]` to the tokenizer.
    ///
    /// Returns the first completed line, if any, and how many bytes
    /// of `chunk` were consumed. When a line completes, the internal
    /// buffer is cleared and unconsumed chunk bytes remain the
    /// caller's; when no terminator is found the whole remainder is
    /// consumed into the buffer, and the search offset is advanced so
    /// the next feed rescans only the bytes that could complete a
    /// split terminator.
    pub fn feed(&mut self, chunk: &[u8], start: usize) -> (Option<Vec<u8>>, usize) {
        let chunk = &chunk[start..];
        let previous_len = self.buffer.len();
        self.buffer.extend_from_slice(chunk);

        let search_start = self.searched.saturating_sub(self.eol.len() - 1);
        match Finder::new(&self.eol).find(&self.buffer[search_start..]) {
            Some(index) => {
                let line_end = search_start + index;
                let consumed = line_end + self.eol.len() - previous_len;
                let mut line = std::mem::take(&mut self.buffer);
                line.truncate(line_end);
                self.searched = 0;
                (Some(line), consumed)
            }

            None => {
                self.searched = self.buffer.len();
                (None, chunk.len())
            }
        }
    }
}

#[cfg(test)]
mod test {
    use super::LineParser;

    #[test]
    fn single_line() {
        let mut parser = LineParser::new();
        let (line, consumed) = parser.feed(b"GET / HTTP/1.1\r\nrest", 0);
        assert_eq!(line.unwrap(), b"GET / HTTP/1.1");
        assert_eq!(consumed, 16);
    }

    #[test]
    fn accumulates_across_feeds() {
        let mut parser = LineParser::new();
        let (line, consumed) = parser.feed(b"Host: exa", 0);
        assert!(line.is_none());
        assert_eq!(consumed, 9);

        let (line, consumed) = parser.feed(b"mple.com\r\n", 0);
        assert_eq!(line.unwrap(), b"Host: example.com");
        assert_eq!(consumed, 10);
    }

    #[test]
    fn split_terminator() {
        let mut parser = LineParser::new();
        let (line, _) = parser.feed(b"hello\r", 0);
        assert!(line.is_none());
        let (line, consumed) = parser.feed(b"\nworld", 0);
        assert_eq!(line.unwrap(), b"hello");
        assert_eq!(consumed, 1);
    }

    #[test]
    fn multiple_lines_via_start_offset() {
        let mut parser = LineParser::new();
        let chunk = b"one\r\ntwo\r\nthree\r\n";
        let mut start = 0;
        let mut lines = vec![];
        while start < chunk.len() {
            let (line, consumed) = parser.feed(chunk, start);
            start += consumed;
            if let Some(line) = line {
                lines.push(line);
            }
        }
        assert_eq!(lines, vec![b"one".to_vec(), b"two".to_vec(), b"three".to_vec()]);
    }

    #[test]
    fn custom_terminator() {
        let mut parser = LineParser::with_eol(b"\n");
        let (line, consumed) = parser.feed(b"data: 1\ndata: 2\n", 0);
        assert_eq!(line.unwrap(), b"data: 1");
        assert_eq!(consumed, 8);

        parser.reset(b"--boundary");
        let (line, _) = parser.feed(b"part bytes--boundary", 0);
        assert_eq!(line.unwrap(), b"part bytes");
    }

    #[test]
    fn empty_line() {
        let mut parser = LineParser::new();
        let (line, consumed) = parser.feed(b"\r\nbody", 0);
        assert_eq!(line.unwrap(), b"");
        assert_eq!(consumed, 2);
    }
}
