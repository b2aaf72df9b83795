//! ASCII ↔ binary line-ending translation wrapper around a [`MappedFile`].

use super::MappedFile;
use std::io;

/// Wraps a binary [`MappedFile`], translating between the wire's CRLF
/// convention and the local platform's line endings.
///
/// `read` expands every lone `\n` to `\r\n` and strips stray `\r`; `write`
/// does the inverse. Used only when the session's current `TYPE` is ASCII.
pub struct AsciiFile {
    inner: MappedFile,
    read_buf: Vec<u8>,
    write_buf: Vec<u8>,
    pending_write_len: usize,
}

impl AsciiFile {
    /// Wraps `inner` for ASCII-mode transfer.
    pub fn new(inner: MappedFile) -> Self {
        AsciiFile { inner, read_buf: Vec::new(), write_buf: Vec::new(), pending_write_len: 0 }
    }

    /// Reads up to `bytes` bytes of underlying binary data and returns them
    /// with every lone `\n` expanded to `\r\n` (stray `\r` bytes dropped).
    ///
    /// A chunk consisting entirely of `\r` bytes filters down to nothing
    /// even though the underlying file hasn't hit EOF; an empty return here
    /// must mean the real thing, so a filtered-away chunk is retried against
    /// the underlying file rather than reported as end of stream.
    pub fn read(&mut self, bytes: usize) -> io::Result<&[u8]> {
        self.read_buf.clear();
        loop {
            let raw = self.inner.read(bytes)?;
            if raw.is_empty() {
                // The underlying file itself is exhausted.
                break;
            }
            self.read_buf.reserve(raw.len() * 2);
            for &b in raw {
                match b {
                    b'\r' => {}
                    b'\n' => {
                        self.read_buf.push(b'\r');
                        self.read_buf.push(b'\n');
                    }
                    other => self.read_buf.push(other),
                }
            }
            if !self.read_buf.is_empty() {
                break;
            }
        }
        Ok(&self.read_buf)
    }

    /// Returns a buffer for the caller to fill with up to `bytes` bytes of
    /// CRLF-encoded wire data (at most `segment/2`, so the worst-case 2x
    /// expansion still fits the underlying mapped window).
    pub fn write(&mut self, bytes: usize) -> io::Result<&mut [u8]> {
        let segment_half = 32 * 1024; // half of a typical 8-segment region; ample for line buffering
        let want = if bytes == 0 { segment_half } else { bytes.min(segment_half) };
        self.write_buf.clear();
        self.write_buf.resize(want, 0);
        Ok(&mut self.write_buf)
    }

    /// Translates the first `n` bytes written into [`AsciiFile::write`]'s
    /// buffer from CRLF to the local convention, then forwards them to the
    /// underlying file.
    pub fn set_bytes_written(&mut self, n: usize) -> io::Result<()> {
        debug_assert!(n <= self.write_buf.len());
        self.pending_write_len = n;
        let mut translated = Vec::with_capacity(n);
        let mut i = 0;
        while i < n {
            if self.write_buf[i] == b'\r' && i + 1 < n && self.write_buf[i + 1] == b'\n' {
                translated.push(b'\n');
                i += 2;
            } else {
                translated.push(self.write_buf[i]);
                i += 1;
            }
        }

        let underlying = self.inner.write(translated.len().max(1))?;
        let len = translated.len().min(underlying.len());
        underlying[..len].copy_from_slice(&translated[..len]);
        self.inner.set_bytes_written(len);
        Ok(())
    }

    /// Closes the underlying file.
    pub fn close(&mut self) -> io::Result<()> {
        self.inner.close()
    }
}
