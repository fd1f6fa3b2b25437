//! Chunked, encoding-aware line reading.
//!
//! Input is decoded to UTF-8 on the fly: a byte order mark selects UTF-8 or
//! UTF-16, an explicit encoding label selects anything `encoding_rs`
//! supports, and everything else is read as UTF-8 with malformed sequences
//! replaced by U+FFFD.

use std::fs::File;
use std::io::{BufRead, BufReader, Read};
use std::path::{Path, PathBuf};

use encoding_rs::Encoding;
use encoding_rs_io::{DecodeReaderBytes, DecodeReaderBytesBuilder};

use crate::engine::Line;
use crate::error::DedupError;

/// Default number of lines per chunk.
pub const DEFAULT_CHUNK_SIZE: usize = 10_000;

const READ_BUFFER: usize = 64 * 1024;

/// Resolve an encoding label such as `utf-8`, `utf-16le` or `latin1`.
///
/// # Errors
///
/// Returns [`DedupError::InvalidConfiguration`] for unknown labels.
pub fn resolve_encoding(label: &str) -> Result<&'static Encoding, DedupError> {
    Encoding::for_label(label.trim().as_bytes()).ok_or_else(|| {
        DedupError::InvalidConfiguration(format!("unknown encoding '{label}'"))
    })
}

/// Name of the encoding announced by a byte order mark at the start of
/// `bytes`, or `UTF-8` when there is none.
#[must_use]
pub fn sniff_encoding(bytes: &[u8]) -> &'static str {
    Encoding::for_bom(bytes).map_or("UTF-8", |(enc, _)| enc.name())
}

/// Detect the encoding of a file from its byte order mark.
///
/// # Errors
///
/// Returns [`DedupError::InputNotFound`] or [`DedupError::InputUnreadable`]
/// when the file cannot be opened.
pub fn detect_encoding(path: &Path) -> Result<&'static str, DedupError> {
    let mut head = [0u8; 3];
    let mut file = File::open(path).map_err(|e| DedupError::from_read(path, e))?;
    let mut filled = 0;
    while filled < head.len() {
        let n = file
            .read(&mut head[filled..])
            .map_err(|e| DedupError::from_read(path, e))?;
        if n == 0 {
            break;
        }
        filled += n;
    }
    Ok(sniff_encoding(&head[..filled]))
}

/// Reads decoded lines from a source, keeping their terminators.
pub struct LineReader<R: Read> {
    path: PathBuf,
    reader: BufReader<DecodeReaderBytes<R, Vec<u8>>>,
    buf: Vec<u8>,
    bytes_read: u64,
}

impl LineReader<File> {
    /// Open a file for reading.
    ///
    /// # Errors
    ///
    /// Returns [`DedupError::InputNotFound`] or [`DedupError::InputUnreadable`].
    pub fn open(path: &Path, encoding: Option<&'static Encoding>) -> Result<Self, DedupError> {
        let file = File::open(path).map_err(|e| DedupError::from_read(path, e))?;
        Ok(Self::new(file, path, encoding))
    }
}

impl<R: Read> LineReader<R> {
    /// Wrap an arbitrary reader. `path` is only used in error messages.
    pub fn new(source: R, path: impl Into<PathBuf>, encoding: Option<&'static Encoding>) -> Self {
        let decoder = DecodeReaderBytesBuilder::new()
            .encoding(encoding)
            .bom_override(true)
            .strip_bom(true)
            .utf8_passthru(true)
            .build(source);

        Self {
            path: path.into(),
            reader: BufReader::with_capacity(READ_BUFFER, decoder),
            buf: Vec::new(),
            bytes_read: 0,
        }
    }

    /// Decoded bytes consumed so far.
    #[must_use]
    pub fn bytes_read(&self) -> u64 {
        self.bytes_read
    }

    /// Read the next line, or `None` at end of input.
    ///
    /// # Errors
    ///
    /// Returns [`DedupError::InputUnreadable`] on I/O failure.
    pub fn next_line(&mut self) -> Result<Option<Line>, DedupError> {
        self.buf.clear();
        let n = self
            .reader
            .read_until(b'\n', &mut self.buf)
            .map_err(|source| DedupError::InputUnreadable {
                path: self.path.clone(),
                source,
            })?;
        if n == 0 {
            return Ok(None);
        }
        self.bytes_read += n as u64;
        Ok(Some(Line::from_raw(&String::from_utf8_lossy(&self.buf))))
    }

    /// Read up to `size` lines. An empty chunk means end of input.
    ///
    /// # Errors
    ///
    /// Returns [`DedupError::InputUnreadable`] on I/O failure.
    pub fn next_chunk(&mut self, size: usize) -> Result<Vec<Line>, DedupError> {
        let mut chunk = Vec::with_capacity(size.min(DEFAULT_CHUNK_SIZE));
        while chunk.len() < size.max(1) {
            match self.next_line()? {
                Some(line) => chunk.push(line),
                None => break,
            }
        }
        Ok(chunk)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::LineEnding;

    fn reader(bytes: &[u8]) -> LineReader<&[u8]> {
        LineReader::new(bytes, "test", None)
    }

    fn utf_16le(source: &str) -> Vec<u8> {
        let mut result = b"\xff\xfe".to_vec();
        for unit in source.encode_utf16() {
            result.extend_from_slice(&unit.to_le_bytes());
        }
        result
    }

    #[test]
    fn test_reads_lines_with_endings() {
        let mut r = reader(b"a\r\nb\nc");
        assert_eq!(r.next_line().unwrap(), Some(Line::new("a", Some(LineEnding::CrLf))));
        assert_eq!(r.next_line().unwrap(), Some(Line::new("b", Some(LineEnding::Lf))));
        assert_eq!(r.next_line().unwrap(), Some(Line::new("c", None)));
        assert_eq!(r.next_line().unwrap(), None);
        assert_eq!(r.bytes_read(), 7);
    }

    #[test]
    fn test_chunks() {
        let mut r = reader(b"1\n2\n3\n4\n5\n");
        assert_eq!(r.next_chunk(2).unwrap().len(), 2);
        assert_eq!(r.next_chunk(2).unwrap().len(), 2);
        assert_eq!(r.next_chunk(2).unwrap().len(), 1);
        assert!(r.next_chunk(2).unwrap().is_empty());
    }

    #[test]
    fn test_strips_utf8_bom() {
        let mut r = reader(b"\xEF\xBB\xBFhello\n");
        assert_eq!(r.next_line().unwrap().unwrap().text, "hello");
    }

    #[test]
    fn test_decodes_utf16_with_bom() {
        let bytes = utf_16le("héllo\nwörld\n");
        let mut r = reader(&bytes);
        assert_eq!(r.next_line().unwrap().unwrap().text, "héllo");
        assert_eq!(r.next_line().unwrap().unwrap().text, "wörld");
    }

    #[test]
    fn test_invalid_utf8_is_replaced() {
        let mut r = reader(b"ok\xFF\n");
        assert_eq!(r.next_line().unwrap().unwrap().text, "ok\u{FFFD}");
    }

    #[test]
    fn test_explicit_encoding() {
        let latin1 = resolve_encoding("latin1").unwrap();
        let mut r = LineReader::new(&b"caf\xE9\n"[..], "test", Some(latin1));
        assert_eq!(r.next_line().unwrap().unwrap().text, "café");
    }

    #[test]
    fn test_resolve_unknown_encoding() {
        assert!(matches!(
            resolve_encoding("klingon"),
            Err(DedupError::InvalidConfiguration(_))
        ));
    }

    #[test]
    fn test_sniff_encoding() {
        assert_eq!(sniff_encoding(b"\xEF\xBB\xBFabc"), "UTF-8");
        assert_eq!(sniff_encoding(b"\xFF\xFEa\0"), "UTF-16LE");
        assert_eq!(sniff_encoding(b"\xFE\xFF\0a"), "UTF-16BE");
        assert_eq!(sniff_encoding(b"plain"), "UTF-8");
    }

    #[test]
    fn test_detect_encoding_missing_file() {
        let err = detect_encoding(Path::new("/definitely/not/here.txt")).unwrap_err();
        assert!(matches!(err, DedupError::InputNotFound(_)));
    }
}
