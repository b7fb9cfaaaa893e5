//! Byte cursor utilities for the scikit-learn pickle decoder.
//!
//! # Overview
//!
//! - [`Reader`] - Forward-only reader over a byte slice with checked,
//!   typed primitive reads
//! - [`print_octets`] - Hex rendering of short byte runs for diagnostics
//!
//! # Example
//!
//! ```
//! use sklearn_pickle_buffers::{BufferError, Reader};
//!
//! let data = [0x4a, 0x05, 0x00, 0x00, 0x00];
//! let mut reader = Reader::new(&data);
//! assert_eq!(reader.u8(), Ok(0x4a));
//! assert_eq!(reader.i32_le(), Ok(5));
//! assert!(matches!(reader.u8(), Err(BufferError::UnexpectedEndOfStream { .. })));
//! ```

mod print_octets;
mod reader;

pub use print_octets::print_octets;
pub use reader::Reader;

use thiserror::Error;

/// Error type for buffer operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BufferError {
    /// Attempted to read past the end of the buffer.
    #[error("unexpected end of stream at offset {offset}: needed {needed} bytes, {available} available")]
    UnexpectedEndOfStream {
        offset: usize,
        needed: usize,
        available: usize,
    },
}
