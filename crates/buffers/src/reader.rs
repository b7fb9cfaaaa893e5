//! Forward-only byte cursor with checked reads.

use crate::BufferError;

/// A forward-only reader over an immutable byte slice.
///
/// Every read either consumes exactly the bytes it needs and advances the
/// cursor, or fails with [`BufferError::UnexpectedEndOfStream`] and leaves
/// the cursor where it was. Borrowed reads ([`Reader::buf`],
/// [`Reader::line`]) return slices into the original buffer.
///
/// # Example
///
/// ```
/// use sklearn_pickle_buffers::Reader;
///
/// let data = [0x80, 0x02, 0x4b, 0x05, 0x2e];
/// let mut reader = Reader::new(&data);
///
/// assert_eq!(reader.u8().unwrap(), 0x80);
/// assert_eq!(reader.u8().unwrap(), 0x02);
/// assert_eq!(reader.buf(2).unwrap(), &[0x4b, 0x05]);
/// assert_eq!(reader.size(), 1);
/// ```
#[derive(Debug, Clone)]
pub struct Reader<'a> {
    uint8: &'a [u8],
    x: usize,
}

impl<'a> Reader<'a> {
    /// Creates a new reader positioned at the start of `uint8`.
    pub fn new(uint8: &'a [u8]) -> Self {
        Self { uint8, x: 0 }
    }

    /// Current cursor position.
    pub fn position(&self) -> usize {
        self.x
    }

    /// Returns the number of remaining bytes.
    pub fn size(&self) -> usize {
        self.uint8.len() - self.x
    }

    pub fn is_eof(&self) -> bool {
        self.x >= self.uint8.len()
    }

    /// Peeks at the current byte without advancing the cursor.
    pub fn peek(&self) -> Option<u8> {
        self.uint8.get(self.x).copied()
    }

    /// Returns up to `max` bytes at the cursor without advancing.
    pub fn lookahead(&self, max: usize) -> &'a [u8] {
        let end = self.uint8.len().min(self.x + max);
        &self.uint8[self.x..end]
    }

    fn take(&mut self, size: usize) -> Result<&'a [u8], BufferError> {
        let available = self.size();
        if size > available {
            return Err(BufferError::UnexpectedEndOfStream {
                offset: self.x,
                needed: size,
                available,
            });
        }
        let start = self.x;
        self.x += size;
        Ok(&self.uint8[start..self.x])
    }

    fn array<const N: usize>(&mut self) -> Result<[u8; N], BufferError> {
        let bytes = self.take(N)?;
        let mut out = [0u8; N];
        out.copy_from_slice(bytes);
        Ok(out)
    }

    /// Advances the cursor by the given number of bytes.
    pub fn skip(&mut self, length: usize) -> Result<(), BufferError> {
        self.take(length).map(|_| ())
    }

    /// Returns a subarray of the given size and advances the cursor.
    pub fn buf(&mut self, size: usize) -> Result<&'a [u8], BufferError> {
        self.take(size)
    }

    /// Reads bytes up to (not including) the next `\n` and consumes the
    /// newline. Fails when the stream ends before a newline.
    pub fn line(&mut self) -> Result<&'a [u8], BufferError> {
        let uint8 = self.uint8;
        let rest = &uint8[self.x..];
        match rest.iter().position(|&b| b == b'\n') {
            Some(n) => {
                let line = self.take(n)?;
                self.x += 1;
                Ok(line)
            }
            None => Err(BufferError::UnexpectedEndOfStream {
                offset: self.x,
                needed: rest.len() + 1,
                available: rest.len(),
            }),
        }
    }

    /// Reads an unsigned 8-bit integer.
    #[inline]
    pub fn u8(&mut self) -> Result<u8, BufferError> {
        Ok(self.array::<1>()?[0])
    }

    /// Reads an unsigned 16-bit integer (little-endian).
    #[inline]
    pub fn u16_le(&mut self) -> Result<u16, BufferError> {
        self.array().map(u16::from_le_bytes)
    }

    /// Reads an unsigned 32-bit integer (little-endian).
    #[inline]
    pub fn u32_le(&mut self) -> Result<u32, BufferError> {
        self.array().map(u32::from_le_bytes)
    }

    /// Reads a signed 32-bit integer (little-endian).
    #[inline]
    pub fn i32_le(&mut self) -> Result<i32, BufferError> {
        self.array().map(i32::from_le_bytes)
    }

    /// Reads an unsigned 64-bit integer (little-endian).
    #[inline]
    pub fn u64_le(&mut self) -> Result<u64, BufferError> {
        self.array().map(u64::from_le_bytes)
    }

    /// Reads a signed 64-bit integer (little-endian).
    #[inline]
    pub fn i64_le(&mut self) -> Result<i64, BufferError> {
        self.array().map(i64::from_le_bytes)
    }

    /// Reads a 32-bit floating point number (little-endian).
    #[inline]
    pub fn f32_le(&mut self) -> Result<f32, BufferError> {
        self.array().map(f32::from_le_bytes)
    }

    /// Reads a 64-bit floating point number (little-endian).
    #[inline]
    pub fn f64_le(&mut self) -> Result<f64, BufferError> {
        self.array().map(f64::from_le_bytes)
    }

    /// Reads a 64-bit floating point number (big-endian).
    #[inline]
    pub fn f64_be(&mut self) -> Result<f64, BufferError> {
        self.array().map(f64::from_be_bytes)
    }

    /// Reads a byte run prefixed by a 1-byte length.
    pub fn bin_u8(&mut self) -> Result<&'a [u8], BufferError> {
        let start = self.x;
        let size = self.u8()? as usize;
        self.take(size).inspect_err(|_| self.x = start)
    }

    /// Reads a byte run prefixed by a little-endian 4-byte length.
    pub fn bin_u32_le(&mut self) -> Result<&'a [u8], BufferError> {
        let start = self.x;
        let size = self.u32_le()? as usize;
        self.take(size).inspect_err(|_| self.x = start)
    }

    /// Reads a byte run prefixed by a little-endian 8-byte length.
    pub fn bin_u64_le(&mut self) -> Result<&'a [u8], BufferError> {
        let start = self.x;
        let size = self.u64_le()?;
        match usize::try_from(size) {
            Ok(size) => self.take(size).inspect_err(|_| self.x = start),
            Err(_) => {
                let available = self.size();
                self.x = start;
                Err(BufferError::UnexpectedEndOfStream {
                    offset: start + 8,
                    needed: usize::MAX,
                    available,
                })
            }
        }
    }
}
