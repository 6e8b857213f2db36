//! Bounds-checked random access over raw sound-driver blobs.
//!
//! Every reader in the crate goes through [`ByteSource`], so an offset past
//! the end of a dump surfaces as a [`ReadError`] instead of a panic.

use thiserror::Error;

/// Errors produced by [`ByteSource`] reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ReadError {
    /// The requested range does not fit inside the source.
    #[error("read of {len} byte(s) at 0x{offset:06x} exceeds source size 0x{size:06x}")]
    OutOfBounds {
        /// Offset of the first requested byte.
        offset: u32,
        /// Number of bytes requested.
        len: u32,
        /// Total size of the source.
        size: u32,
    },
}

/// Random-access reader over a blob with explicit bounds.
///
/// Only [`ByteSource::len`] and [`ByteSource::bytes`] need implementing; the
/// typed readers are derived from them.
pub trait ByteSource {
    /// Display name of the blob (usually the file name).
    fn name(&self) -> &str;

    /// Total size in bytes.
    fn len(&self) -> u32;

    /// Borrow `len` bytes starting at `offset`.
    fn bytes(&self, offset: u32, len: u32) -> Result<&[u8], ReadError>;

    /// Returns `true` if the source holds no bytes.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns `true` if `[offset, offset + len)` lies inside the source.
    fn contains(&self, offset: u32, len: u32) -> bool {
        offset
            .checked_add(len)
            .map_or(false, |end| end <= self.len())
    }

    /// Read one unsigned byte.
    fn read_u8(&self, offset: u32) -> Result<u8, ReadError> {
        Ok(self.bytes(offset, 1)?[0])
    }

    /// Read one signed byte.
    fn read_i8(&self, offset: u32) -> Result<i8, ReadError> {
        Ok(self.read_u8(offset)? as i8)
    }

    /// Read a little-endian `u16`.
    fn read_u16_le(&self, offset: u32) -> Result<u16, ReadError> {
        let b = self.bytes(offset, 2)?;
        Ok(u16::from_le_bytes([b[0], b[1]]))
    }

    /// Read a big-endian `u16`.
    fn read_u16_be(&self, offset: u32) -> Result<u16, ReadError> {
        let b = self.bytes(offset, 2)?;
        Ok(u16::from_be_bytes([b[0], b[1]]))
    }

    /// Read a little-endian `i16`.
    fn read_i16_le(&self, offset: u32) -> Result<i16, ReadError> {
        Ok(self.read_u16_le(offset)? as i16)
    }

    /// Read a little-endian `u32`.
    fn read_u32_le(&self, offset: u32) -> Result<u32, ReadError> {
        let b = self.bytes(offset, 4)?;
        Ok(u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }

    /// Read a big-endian `u32`.
    fn read_u32_be(&self, offset: u32) -> Result<u32, ReadError> {
        let b = self.bytes(offset, 4)?;
        Ok(u32::from_be_bytes([b[0], b[1], b[2], b[3]]))
    }
}

/// In-memory [`ByteSource`] owning its bytes.
#[derive(Debug, Clone)]
pub struct MemorySource {
    name: String,
    data: Vec<u8>,
}

impl MemorySource {
    /// Wrap a byte vector under the given display name.
    pub fn new(name: impl Into<String>, data: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            data,
        }
    }

    /// Borrow the whole blob.
    pub fn as_slice(&self) -> &[u8] {
        &self.data
    }
}

impl ByteSource for MemorySource {
    fn name(&self) -> &str {
        &self.name
    }

    fn len(&self) -> u32 {
        u32::try_from(self.data.len()).unwrap_or(u32::MAX)
    }

    fn bytes(&self, offset: u32, len: u32) -> Result<&[u8], ReadError> {
        let err = ReadError::OutOfBounds {
            offset,
            len,
            size: self.len(),
        };
        let start = offset as usize;
        let end = start.checked_add(len as usize).ok_or(err)?;
        self.data.get(start..end).ok_or(err)
    }
}

/// A window into another source, rebased so that offset 0 is `base`.
///
/// Used for SPC files, where the driver addresses the 64 KiB RAM image
/// stored after the file header.
pub struct SubSource<'a> {
    inner: &'a dyn ByteSource,
    base: u32,
    len: u32,
}

impl<'a> SubSource<'a> {
    /// Create a window of `len` bytes starting at `base`.
    pub fn new(inner: &'a dyn ByteSource, base: u32, len: u32) -> Result<Self, ReadError> {
        if !inner.contains(base, len) {
            return Err(ReadError::OutOfBounds {
                offset: base,
                len,
                size: inner.len(),
            });
        }
        Ok(Self { inner, base, len })
    }
}

impl ByteSource for SubSource<'_> {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn len(&self) -> u32 {
        self.len
    }

    fn bytes(&self, offset: u32, len: u32) -> Result<&[u8], ReadError> {
        if !self.contains(offset, len) {
            return Err(ReadError::OutOfBounds {
                offset,
                len,
                size: self.len,
            });
        }
        self.inner.bytes(self.base + offset, len)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn typed_reads_follow_endianness() {
        let src = MemorySource::new("t", vec![0x34, 0x12, 0x78, 0x56, 0xFF]);
        assert_eq!(src.read_u16_le(0).unwrap(), 0x1234);
        assert_eq!(src.read_u16_be(0).unwrap(), 0x3412);
        assert_eq!(src.read_u32_le(0).unwrap(), 0x5678_1234);
        assert_eq!(src.read_i8(4).unwrap(), -1);
    }

    #[test]
    fn out_of_bounds_is_an_error() {
        let src = MemorySource::new("t", vec![0; 4]);
        assert!(src.read_u32_le(0).is_ok());
        assert_eq!(
            src.read_u16_le(3),
            Err(ReadError::OutOfBounds {
                offset: 3,
                len: 2,
                size: 4
            })
        );
        assert!(src.read_u8(u32::MAX).is_err());
    }

    #[test]
    fn sub_source_rebases_offsets() {
        let src = MemorySource::new("t", (0u8..16).collect());
        let sub = SubSource::new(&src, 4, 8).unwrap();
        assert_eq!(sub.read_u8(0).unwrap(), 4);
        assert_eq!(sub.len(), 8);
        assert!(sub.read_u8(8).is_err());
        assert!(SubSource::new(&src, 12, 8).is_err());
    }
}
