//! Binary container for persisted evolution history.
//!
//! Layout: magic `NFHS`, version (u16), flags (u16), payload length (u64),
//! then the JSON payload, optionally LZ4-compressed. All integers are
//! little-endian.

use std::io::{self, Read, Write};

/// Magic bytes identifying a history blob.
pub const HISTORY_MAGIC: &[u8; 4] = b"NFHS";

/// Current format version.
pub const HISTORY_VERSION: u16 = 1;

/// Errors raised while encoding or decoding a history blob.
#[derive(Debug, thiserror::Error)]
pub enum HistoryFormatError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("Malformed history payload: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Invalid history magic bytes: {0:?}")]
    BadMagic([u8; 4]),
    #[error("Unsupported history version: {0}")]
    UnsupportedVersion(u16),
    #[error("Unknown compression type: {0}")]
    UnknownCompression(u8),
    #[error("History is LZ4-compressed but LZ4 support is not compiled in")]
    CompressionUnavailable,
    #[error("History payload truncated: expected {expected} bytes, found {found}")]
    Truncated { expected: u64, found: u64 },
}

/// Compression type for the payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum CompressionType {
    /// Plain JSON.
    #[default]
    None = 0,
    /// LZ4 fast compression.
    Lz4 = 1,
}

impl CompressionType {
    pub fn from_u8(v: u8) -> Option<Self> {
        match v {
            0 => Some(CompressionType::None),
            1 => Some(CompressionType::Lz4),
            _ => None,
        }
    }

    /// LZ4 when compiled in, otherwise none.
    pub fn preferred() -> Self {
        if cfg!(feature = "lz4") {
            CompressionType::Lz4
        } else {
            CompressionType::None
        }
    }
}

/// Fixed-size header preceding the payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HistoryHeader {
    /// Compression type (lower 4 bits of the flags word).
    pub compression: CompressionType,
    /// Stored payload length in bytes (after compression).
    pub payload_len: u64,
}

impl HistoryHeader {
    /// Magic(4) + Version(2) + Flags(2) + PayloadLen(8) = 16
    pub const SIZE: usize = 16;

    pub fn write_to<W: Write>(&self, w: &mut W) -> io::Result<()> {
        let flags = self.compression as u16;
        w.write_all(HISTORY_MAGIC)?;
        w.write_all(&HISTORY_VERSION.to_le_bytes())?;
        w.write_all(&flags.to_le_bytes())?;
        w.write_all(&self.payload_len.to_le_bytes())?;
        Ok(())
    }

    pub fn read_from<R: Read>(r: &mut R) -> Result<Self, HistoryFormatError> {
        let mut magic = [0u8; 4];
        r.read_exact(&mut magic)?;
        if &magic != HISTORY_MAGIC {
            return Err(HistoryFormatError::BadMagic(magic));
        }

        let mut buf2 = [0u8; 2];
        let mut buf8 = [0u8; 8];

        r.read_exact(&mut buf2)?;
        let version = u16::from_le_bytes(buf2);
        if version != HISTORY_VERSION {
            return Err(HistoryFormatError::UnsupportedVersion(version));
        }

        r.read_exact(&mut buf2)?;
        let code = (u16::from_le_bytes(buf2) & 0x0F) as u8;
        let compression =
            CompressionType::from_u8(code).ok_or(HistoryFormatError::UnknownCompression(code))?;

        r.read_exact(&mut buf8)?;
        let payload_len = u64::from_le_bytes(buf8);

        Ok(Self {
            compression,
            payload_len,
        })
    }
}

/// Write a header plus `json`, compressing it as requested.
pub fn write_blob<W: Write>(
    w: &mut W,
    json: &[u8],
    compression: CompressionType,
) -> Result<(), HistoryFormatError> {
    let payload = match compression {
        CompressionType::None => json.to_vec(),
        CompressionType::Lz4 => compress_lz4(json)?,
    };
    let header = HistoryHeader {
        compression,
        payload_len: payload.len() as u64,
    };
    header.write_to(w)?;
    w.write_all(&payload)?;
    Ok(())
}

/// Read a header and return the decompressed JSON payload.
pub fn read_blob<R: Read>(r: &mut R) -> Result<Vec<u8>, HistoryFormatError> {
    let header = HistoryHeader::read_from(r)?;

    // Bounded read so a corrupt length cannot force a huge allocation.
    let mut payload = Vec::new();
    r.take(header.payload_len).read_to_end(&mut payload)?;
    if payload.len() as u64 != header.payload_len {
        return Err(HistoryFormatError::Truncated {
            expected: header.payload_len,
            found: payload.len() as u64,
        });
    }

    match header.compression {
        CompressionType::None => Ok(payload),
        CompressionType::Lz4 => decompress_lz4(&payload),
    }
}

/// Compress data using LZ4.
#[cfg(feature = "lz4")]
pub fn compress_lz4(data: &[u8]) -> Result<Vec<u8>, HistoryFormatError> {
    Ok(lz4_flex::compress_prepend_size(data))
}

/// Decompress LZ4 data.
#[cfg(feature = "lz4")]
pub fn decompress_lz4(data: &[u8]) -> Result<Vec<u8>, HistoryFormatError> {
    lz4_flex::decompress_size_prepended(data)
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e).into())
}

#[cfg(not(feature = "lz4"))]
pub fn compress_lz4(_data: &[u8]) -> Result<Vec<u8>, HistoryFormatError> {
    Err(HistoryFormatError::CompressionUnavailable)
}

#[cfg(not(feature = "lz4"))]
pub fn decompress_lz4(_data: &[u8]) -> Result<Vec<u8>, HistoryFormatError> {
    Err(HistoryFormatError::CompressionUnavailable)
}
