use embedded_io::{Read, ReadReady};
use heapless::{String, Vec};

use crate::error::Error;

/// Longest line kept. Longer lines are dropped.
pub const MAX_LINE_LEN: usize = 256;

pub type Line = String<MAX_LINE_LEN>;

/// Splits the byte stream from the module into lines.
///
/// `\r` and NUL bytes are dropped, `\n` terminates a line and empty lines are
/// skipped. Bytes are pulled one at a time so nothing past the end of the
/// current line is consumed, which lets the caller switch to
/// [`LineReader::read_raw`] right after a data header.
pub struct LineReader {
    buf: Vec<u8, MAX_LINE_LEN>,
    overflowed: bool,
}

impl Default for LineReader {
    fn default() -> Self {
        Self::new()
    }
}

impl LineReader {
    pub const fn new() -> Self {
        Self {
            buf: Vec::new(),
            overflowed: false,
        }
    }

    /// Drop any partial line
    pub fn clear(&mut self) {
        self.buf.clear();
        self.overflowed = false;
    }

    /// Feed a single byte, returning the line it completes.
    pub fn push(&mut self, byte: u8) -> Option<Line> {
        match byte {
            b'\r' | b'\0' => None,
            b'\n' => {
                let overflowed = core::mem::replace(&mut self.overflowed, false);
                let raw = core::mem::take(&mut self.buf);
                if overflowed || raw.is_empty() {
                    return None;
                }
                match String::from_utf8(raw) {
                    Ok(line) => Some(line),
                    Err(_) => {
                        warn!("Dropping line that is not valid UTF-8");
                        None
                    }
                }
            }
            b => {
                if self.overflowed {
                    return None;
                }
                if self.buf.push(b).is_err() {
                    warn!("Line exceeds {} bytes, purging", MAX_LINE_LEN);
                    self.buf.clear();
                    self.overflowed = true;
                }
                None
            }
        }
    }

    /// Read from `io` until a complete line is available or no more bytes are
    /// ready.
    pub fn read_line<T: Read + ReadReady>(&mut self, io: &mut T) -> Result<Option<Line>, Error> {
        let mut byte = [0u8; 1];
        while io.read_ready().map_err(|_| Error::Io)? {
            if io.read(&mut byte).map_err(|_| Error::Io)? == 0 {
                break;
            }
            if let Some(line) = self.push(byte[0]) {
                trace!("--> {}", line.as_str());
                return Ok(Some(line));
            }
        }
        Ok(None)
    }

    /// Read up to `remaining` raw bytes from `io`, handing each to `sink`.
    /// `remaining` is decremented by the number of bytes consumed.
    pub fn read_raw<T: Read + ReadReady>(
        &mut self,
        io: &mut T,
        remaining: &mut usize,
        mut sink: impl FnMut(u8),
    ) -> Result<(), Error> {
        let mut chunk = [0u8; 64];
        while *remaining > 0 && io.read_ready().map_err(|_| Error::Io)? {
            let want = (*remaining).min(chunk.len());
            let n = io.read(&mut chunk[..want]).map_err(|_| Error::Io)?;
            if n == 0 {
                break;
            }
            chunk[..n].iter().for_each(|&b| sink(b));
            *remaining -= n;
        }
        Ok(())
    }

    /// Throw away everything `io` has buffered, along with any partial line.
    pub fn discard<T: Read + ReadReady>(&mut self, io: &mut T) -> Result<usize, Error> {
        self.clear();
        let mut chunk = [0u8; 64];
        let mut dropped = 0;
        while io.read_ready().map_err(|_| Error::Io)? {
            let n = io.read(&mut chunk).map_err(|_| Error::Io)?;
            if n == 0 {
                break;
            }
            dropped += n;
        }
        Ok(dropped)
    }
}
