use crate::error::{Error, Result};
use byteorder::{BigEndian, ByteOrder, LittleEndian};
use std::fs::File;
use std::io::{ErrorKind, Read, Seek, SeekFrom};
use std::path::Path;

/// Size of the lookahead window kept in memory.
const WINDOW_SIZE: usize = 1024 * 1024;

/// Buffered random-access reader over any `Read + Seek` source.
///
/// Sequential box parsing mostly hits a 1 MB window that is refreshed only
/// when the requested range falls outside it; sample extraction goes through
/// [`DataReader::read_exact_at`], which leaves the main cursor alone.
pub struct DataReader<R> {
    inner: R,
    len: u64,
    pos: u64,
    window: Vec<u8>,
    window_start: u64,
}

impl DataReader<File> {
    /// Open a regular file for parsing.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let meta = std::fs::metadata(path)?;
        if !meta.is_file() {
            return Err(Error::NotRegularFile(path.display().to_string()));
        }
        let file = File::open(path)?;
        Ok(Self::with_len(file, meta.len()))
    }
}

impl<R: Read + Seek> DataReader<R> {
    /// Wrap an in-memory or already-open source; measures its length.
    pub fn from_inner(mut inner: R) -> Result<Self> {
        let len = inner.seek(SeekFrom::End(0))?;
        inner.seek(SeekFrom::Start(0))?;
        Ok(Self::with_len(inner, len))
    }

    fn with_len(inner: R, len: u64) -> Self {
        Self {
            inner,
            len,
            pos: 0,
            window: Vec::new(),
            window_start: 0,
        }
    }

    pub fn len(&self) -> u64 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn pos(&self) -> u64 {
        self.pos
    }

    pub fn set_pos(&mut self, pos: u64) {
        self.pos = pos;
    }

    pub fn skip(&mut self, n: u64) {
        self.pos += n;
    }

    fn window_has(&self, pos: u64, len: usize) -> bool {
        pos >= self.window_start && pos + len as u64 <= self.window_start + self.window.len() as u64
    }

    fn refresh_window(&mut self, pos: u64) -> Result<()> {
        let avail = self.len.saturating_sub(pos);
        let take = avail.min(WINDOW_SIZE as u64) as usize;
        self.inner.seek(SeekFrom::Start(pos))?;
        self.window.resize(take, 0);
        self.inner.read_exact(&mut self.window)?;
        self.window_start = pos;
        Ok(())
    }

    /// Copy `buf.len()` bytes from the cursor position, advancing it.
    /// A range past EOF fails with `UnexpectedEof`.
    pub fn read(&mut self, buf: &mut [u8]) -> Result<()> {
        let pos = self.pos;
        if pos + buf.len() as u64 > self.len {
            return Err(Error::Io(std::io::Error::new(
                ErrorKind::UnexpectedEof,
                "read past end of file",
            )));
        }
        if buf.len() > WINDOW_SIZE {
            // Oversized request bypasses the window.
            self.inner.seek(SeekFrom::Start(pos))?;
            self.inner.read_exact(buf)?;
        } else {
            if !self.window_has(pos, buf.len()) {
                self.refresh_window(pos)?;
            }
            let off = (pos - self.window_start) as usize;
            buf.copy_from_slice(&self.window[off..off + buf.len()]);
        }
        self.pos = pos + buf.len() as u64;
        Ok(())
    }

    /// Absolute read that does not move the main cursor or the window.
    pub fn read_exact_at(&mut self, pos: u64, buf: &mut [u8]) -> Result<()> {
        if pos + buf.len() as u64 > self.len {
            return Err(Error::Io(std::io::Error::new(
                ErrorKind::UnexpectedEof,
                "read past end of file",
            )));
        }
        self.inner.seek(SeekFrom::Start(pos))?;
        self.inner.read_exact(buf)?;
        Ok(())
    }

    pub fn read_u8(&mut self) -> Result<u8> {
        let mut b = [0u8; 1];
        self.read(&mut b)?;
        Ok(b[0])
    }

    /// 1–8 byte unsigned field; `be` selects big-endian byte order.
    pub fn read_unsigned(&mut self, n: usize, be: bool) -> Result<u64> {
        debug_assert!((1..=8).contains(&n));
        let mut b = [0u8; 8];
        self.read(&mut b[..n])?;
        Ok(if be {
            BigEndian::read_uint(&b[..n], n)
        } else {
            LittleEndian::read_uint(&b[..n], n)
        })
    }

    /// 1–8 byte signed field, sign-extended.
    pub fn read_signed(&mut self, n: usize, be: bool) -> Result<i64> {
        debug_assert!((1..=8).contains(&n));
        let mut b = [0u8; 8];
        self.read(&mut b[..n])?;
        Ok(if be {
            BigEndian::read_int(&b[..n], n)
        } else {
            LittleEndian::read_int(&b[..n], n)
        })
    }

    pub fn read_u16(&mut self, be: bool) -> Result<u16> {
        Ok(self.read_unsigned(2, be)? as u16)
    }

    pub fn read_u24(&mut self, be: bool) -> Result<u32> {
        Ok(self.read_unsigned(3, be)? as u32)
    }

    pub fn read_u32(&mut self, be: bool) -> Result<u32> {
        Ok(self.read_unsigned(4, be)? as u32)
    }

    pub fn read_u64(&mut self, be: bool) -> Result<u64> {
        self.read_unsigned(8, be)
    }

    /// Read exactly `len` bytes and return the text up to the first NUL.
    pub fn read_string(&mut self, len: usize) -> Result<String> {
        let mut buf = vec![0u8; len];
        self.read(&mut buf)?;
        let end = buf.iter().position(|&b| b == 0).unwrap_or(buf.len());
        Ok(String::from_utf8_lossy(&buf[..end]).into_owned())
    }

    pub fn read_vec(&mut self, len: usize) -> Result<Vec<u8>> {
        let mut buf = vec![0u8; len];
        self.read(&mut buf)?;
        Ok(buf)
    }
}
