//! Response frame and positional field extraction
//!
//! Modem replies are free text. Fields are located by a literal anchor and
//! then read at a fixed offset from it, so everything here works on raw
//! bytes and reports positions rather than allocating substrings.

use std::fmt;

/// Literal substrings the driver looks for in replies
pub mod anchor {
    /// Final result of a successful command
    pub const OK: &[u8] = b"OK";
    /// Prompt before a POST payload
    pub const DOWNLOAD: &[u8] = b"DOWNLOAD";
    /// Device-reported failure
    pub const ERROR: &[u8] = b"ERROR";
    /// Start of an HTTP body
    pub const HTTP_READ: &[u8] = b"+HTTPREAD: ";
    /// Completion of a GET
    pub const HTTP_ACTION_GET: &[u8] = b"+HTTPACTION: 0,";
    /// Completion of a POST
    pub const HTTP_ACTION_POST: &[u8] = b"+HTTPACTION: 1,";
    /// Power mode report
    pub const CFUN: &[u8] = b"+CFUN: ";
    /// Registration report
    pub const CREG: &[u8] = b"+CREG: ";
    /// Signal quality report
    pub const CSQ: &[u8] = b"+CSQ: ";
    /// GNSS power report
    pub const CGNSPWR: &[u8] = b"+CGNSPWR: ";
    /// GNSS navigation information (polled)
    pub const CGNSINF: &[u8] = b"+CGNSINF: ";
    /// GNSS navigation information (unsolicited)
    pub const UGNSINF: &[u8] = b"+UGNSINF: ";
}

/// Find `needle` in `haystack` at or after `start`.
///
/// Returns the index of the first byte of the first match.
pub fn find_anchor(haystack: &[u8], needle: &[u8], start: usize) -> Option<usize> {
    if needle.is_empty() || start >= haystack.len() || needle.len() > haystack.len() - start {
        return None;
    }
    haystack[start..]
        .windows(needle.len())
        .position(|w| w == needle)
        .map(|pos| pos + start)
}

/// Read up to `max_digits` decimal digits starting at `index`.
///
/// A non-digit or the end of data stops the scan. Returns `None` when no
/// digit was read at all.
pub fn extract_digits_at(data: &[u8], index: usize, max_digits: usize) -> Option<u32> {
    let mut value: u32 = 0;
    let mut seen = 0;
    for &b in data.iter().skip(index).take(max_digits) {
        if !b.is_ascii_digit() {
            break;
        }
        value = value.saturating_mul(10).saturating_add(u32::from(b - b'0'));
        seen += 1;
    }
    (seen > 0).then_some(value)
}

/// The last raw reply read from the modem.
///
/// Fixed capacity, zero-filled before each transaction. Only the engine
/// writes into it; everyone else gets a shared borrow.
pub struct ResponseFrame {
    buf: Vec<u8>,
    len: usize,
}

impl ResponseFrame {
    /// Create an empty frame that can hold `capacity` bytes
    pub fn new(capacity: usize) -> Self {
        Self {
            buf: vec![0; capacity.max(1)],
            len: 0,
        }
    }

    /// Zero the storage and forget the previous reply
    pub(crate) fn clear(&mut self) {
        self.buf.fill(0);
        self.len = 0;
    }

    /// Append one byte; returns `false` once the frame is full
    pub(crate) fn push(&mut self, byte: u8) -> bool {
        if self.len >= self.buf.len() {
            return false;
        }
        self.buf[self.len] = byte;
        self.len += 1;
        true
    }

    /// Build a frame holding `data` (test and parser helper)
    pub fn from_bytes(data: &[u8]) -> Self {
        let mut frame = Self::new(data.len());
        for &b in data {
            frame.push(b);
        }
        frame
    }

    /// Bytes read so far
    pub fn as_bytes(&self) -> &[u8] {
        &self.buf[..self.len]
    }

    /// Number of bytes read
    pub fn len(&self) -> usize {
        self.len
    }

    /// True when nothing was read
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Maximum number of bytes the frame can hold
    pub fn capacity(&self) -> usize {
        self.buf.len()
    }

    /// True when the read stopped because the frame filled up
    pub fn is_full(&self) -> bool {
        self.len == self.buf.len()
    }

    /// Index of the first occurrence of `needle`
    pub fn find(&self, needle: &[u8]) -> Option<usize> {
        find_anchor(self.as_bytes(), needle, 0)
    }

    /// True when `needle` occurs anywhere
    pub fn contains(&self, needle: &[u8]) -> bool {
        self.find(needle).is_some()
    }

    /// True when the device reported `ERROR`
    pub fn is_error(&self) -> bool {
        self.contains(anchor::ERROR)
    }

    /// Cursor positioned right after the first occurrence of `needle`
    pub fn cursor_after(&self, needle: &[u8]) -> Option<Cursor<'_>> {
        Cursor::new(self.as_bytes()).seek_past(needle)
    }

    /// First non-empty line that is neither the command echo nor `OK`
    pub fn info_line(&self, echo: &str) -> Option<String> {
        self.as_bytes()
            .split(|&b| b == b'\r' || b == b'\n')
            .filter(|line| !line.is_empty())
            .find(|line| !line.starts_with(echo.as_bytes()) && *line != anchor::OK)
            .map(|line| String::from_utf8_lossy(line).into_owned())
    }
}

impl fmt::Debug for ResponseFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ResponseFrame({:?})", escape(self.as_bytes()))
    }
}

/// Printable rendering of raw modem bytes for logs
pub fn escape(data: &[u8]) -> String {
    data.escape_ascii().to_string()
}

/// Forward-only reader over a reply, used for offset arithmetic
#[derive(Debug, Clone, Copy)]
pub struct Cursor<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    /// Cursor at the start of `data`
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    /// Move just past the next occurrence of `needle`
    #[must_use]
    pub fn seek_past(self, needle: &[u8]) -> Option<Self> {
        let idx = find_anchor(self.data, needle, self.pos)?;
        Some(Self {
            data: self.data,
            pos: idx + needle.len(),
        })
    }

    /// Skip `n` bytes unconditionally
    #[must_use]
    pub fn skip(self, n: usize) -> Self {
        Self {
            data: self.data,
            pos: (self.pos + n).min(self.data.len()),
        }
    }

    /// Byte under the cursor
    pub fn peek(&self) -> Option<u8> {
        self.data.get(self.pos).copied()
    }

    /// Consume `expected` if it is the next byte
    pub fn expect(&mut self, expected: u8) -> bool {
        if self.peek() == Some(expected) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    /// Consume up to `max_digits` digits; `(value, digits read)`
    pub fn digits(&mut self, max_digits: usize) -> Option<(u32, usize)> {
        let value = extract_digits_at(self.data, self.pos, max_digits)?;
        let count = self.data[self.pos..]
            .iter()
            .take(max_digits)
            .take_while(|b| b.is_ascii_digit())
            .count();
        self.pos += count;
        Some((value, count))
    }

    /// Consume bytes until `stop` (exclusive) or end of data
    pub fn take_until(&mut self, stop: u8) -> &'a [u8] {
        let rest = &self.data[self.pos..];
        let end = rest.iter().position(|&b| b == stop).unwrap_or(rest.len());
        self.pos += end;
        &rest[..end]
    }

    /// Everything not consumed yet
    pub fn rest(&self) -> &'a [u8] {
        &self.data[self.pos..]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_find_anchor() {
        let data = b"AT+CSQ\r\n+CSQ: 31,0\r\n";
        assert_eq!(find_anchor(data, b"+CSQ: ", 0), Some(8));
        assert_eq!(find_anchor(data, b"AT", 0), Some(0));
        assert_eq!(find_anchor(data, b"+CSQ", 1), Some(8));
        assert_eq!(find_anchor(data, b"OK", 0), None);
        assert_eq!(find_anchor(data, b"", 0), None);
        assert_eq!(find_anchor(data, b"\n", 100), None);
    }

    #[test]
    fn test_find_anchor_restarts_after_partial_match() {
        assert_eq!(find_anchor(b"OOK", b"OK", 0), Some(1));
        assert_eq!(find_anchor(b"+HTTP+HTTPREAD: 5", b"+HTTPREAD: ", 0), Some(5));
    }

    #[test]
    fn test_extract_http_action_fields() {
        let data = b"\r\n+HTTPACTION: 1,200,1534\r\n";
        let idx = find_anchor(data, anchor::HTTP_ACTION_POST, 0).unwrap();
        let base = idx + anchor::HTTP_ACTION_POST.len();
        assert_eq!(extract_digits_at(data, base, 3), Some(200));
        assert_eq!(extract_digits_at(data, base + 4, 10), Some(1534));
    }

    #[test]
    fn test_extract_digits_stops_at_non_digit() {
        assert_eq!(extract_digits_at(b"12a4", 0, 4), Some(12));
        assert_eq!(extract_digits_at(b"x12", 0, 4), None);
        assert_eq!(extract_digits_at(b"98765", 1, 2), Some(87));
        assert_eq!(extract_digits_at(b"1", 5, 2), None);
    }

    #[test]
    fn test_frame_capacity_and_clear() {
        let mut frame = ResponseFrame::new(4);
        assert!(frame.push(b'a'));
        assert!(frame.push(b'b'));
        assert!(frame.push(b'c'));
        assert!(frame.push(b'd'));
        assert!(!frame.push(b'e'));
        assert!(frame.is_full());
        assert_eq!(frame.as_bytes(), b"abcd");

        frame.clear();
        assert!(frame.is_empty());
        assert_eq!(frame.capacity(), 4);
    }

    #[test]
    fn test_error_anywhere_is_detected() {
        let frame = ResponseFrame::from_bytes(b"+CFUN: 1\r\n\r\nERROR\r\n");
        assert!(frame.is_error());
        assert!(!ResponseFrame::from_bytes(b"\r\nOK\r\n").is_error());
    }

    #[test]
    fn test_cursor_walk() {
        let frame = ResponseFrame::from_bytes(b"\r\n+CREG: 0,5\r\n");
        let mut cursor = frame.cursor_after(anchor::CREG).unwrap();
        assert_eq!(cursor.digits(1), Some((0, 1)));
        assert!(cursor.expect(b','));
        assert_eq!(cursor.peek(), Some(b'5'));
        assert_eq!(cursor.take_until(b'\r'), b"5");
        assert_eq!(cursor.rest(), b"\r\n");
    }

    #[test]
    fn test_info_line_skips_echo_and_ok() {
        let frame =
            ResponseFrame::from_bytes(b"AT+GMR\r\r\nRevision:1418B05SIM808M32\r\n\r\nOK\r\n");
        assert_eq!(frame.info_line("AT+GMR").as_deref(), Some("Revision:1418B05SIM808M32"));
        let bare = ResponseFrame::from_bytes(b"\r\n89014103211118510720\r\n");
        assert_eq!(bare.info_line("AT+CCID").as_deref(), Some("89014103211118510720"));
    }

    #[test]
    fn test_escape_for_logs() {
        assert_eq!(escape(b"OK\r\n"), "OK\\r\\n");
    }
}
