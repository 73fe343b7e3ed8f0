//! Persisted image of a tree: header, packed body, CRC32 trailer.
//!
//! # Binary Format
//!
//! ```text
//! offset 0       u32 BE magic = 0x951fc3f5
//! offset 4       u16 BE file type = 1
//! offset 6       u16 BE version = 1
//! offset 8       u64 BE total size (header + body + trailer)
//! offset 16      u32 BE flags (bit 0: CRC32 trailer present)
//! offset 20      packed tree body
//! offset size-4  u32 BE CRC32 of bytes [0, size-4)
//! ```

use std::io::Cursor;

use byteorder::{BigEndian, ByteOrder, ReadBytesExt, WriteBytesExt};
use kvtree_core::Tree;
use tracing::error;

use crate::codec;
use crate::error::CodecError;

/// Magic number at the start of every persisted image
pub const MAGIC: u32 = 0x951f_c3f5;

/// File type for a persisted tree
pub const FILE_TYPE_TREE: u16 = 1;

/// Current image version
pub const VERSION: u16 = 1;

/// Flag bit indicating a CRC32 trailer
pub const FLAG_CRC32: u32 = 0x1;

/// Size of the fixed header
pub const HEADER_SIZE: usize = 20;

/// Size of the CRC32 trailer
pub const TRAILER_SIZE: usize = 4;

/// Fixed header of a persisted image
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileHeader {
    /// Magic number
    pub magic: u32,
    /// File type
    pub file_type: u16,
    /// Format version
    pub version: u16,
    /// Total image size in bytes
    pub file_size: u64,
    /// Flag bits
    pub flags: u32,
}

impl FileHeader {
    /// Header for a CRC-protected image of `file_size` bytes.
    pub fn new(file_size: u64) -> Self {
        FileHeader {
            magic: MAGIC,
            file_type: FILE_TYPE_TREE,
            version: VERSION,
            file_size,
            flags: FLAG_CRC32,
        }
    }

    /// Whether the image carries a CRC32 trailer.
    pub fn has_crc(&self) -> bool {
        self.flags & FLAG_CRC32 != 0
    }

    /// Serialize to bytes.
    pub fn to_bytes(&self) -> [u8; HEADER_SIZE] {
        let mut bytes = [0u8; HEADER_SIZE];
        let mut cursor = Cursor::new(&mut bytes[..]);
        // writes into a fixed array of the right size cannot fail
        let _ = cursor.write_u32::<BigEndian>(self.magic);
        let _ = cursor.write_u16::<BigEndian>(self.file_type);
        let _ = cursor.write_u16::<BigEndian>(self.version);
        let _ = cursor.write_u64::<BigEndian>(self.file_size);
        let _ = cursor.write_u32::<BigEndian>(self.flags);
        bytes
    }

    /// Parse from the first [`HEADER_SIZE`] bytes of `bytes`.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CodecError> {
        if bytes.len() < HEADER_SIZE {
            return Err(CodecError::ShortHeader { len: bytes.len() });
        }
        let mut cursor = Cursor::new(&bytes[..HEADER_SIZE]);
        let short = |_| CodecError::ShortHeader { len: bytes.len() };
        Ok(FileHeader {
            magic: cursor.read_u32::<BigEndian>().map_err(short)?,
            file_type: cursor.read_u16::<BigEndian>().map_err(short)?,
            version: cursor.read_u16::<BigEndian>().map_err(short)?,
            file_size: cursor.read_u64::<BigEndian>().map_err(short)?,
            flags: cursor.read_u32::<BigEndian>().map_err(short)?,
        })
    }

    /// Check magic, type, version and declared size.
    pub fn validate(&self) -> Result<(), CodecError> {
        if self.magic != MAGIC || self.file_type != FILE_TYPE_TREE || self.version != VERSION {
            return Err(CodecError::HeaderMismatch {
                magic: self.magic,
                file_type: self.file_type,
                version: self.version,
            });
        }
        let min_size = if self.has_crc() {
            HEADER_SIZE + TRAILER_SIZE
        } else {
            HEADER_SIZE
        };
        if self.file_size < min_size as u64 {
            return Err(CodecError::InvalidSize {
                size: self.file_size,
            });
        }
        Ok(())
    }
}

/// Size of the persisted image of `tree`.
pub fn persist_size(tree: &Tree) -> usize {
    HEADER_SIZE + codec::pack_size(tree) + TRAILER_SIZE
}

/// Build the persisted image of `tree`.
///
/// # Panics
///
/// Panics if the packed body does not fill exactly the computed size.
pub fn write_persist(tree: &Tree) -> Vec<u8> {
    let size = persist_size(tree);
    let mut buf = vec![0u8; size];
    buf[..HEADER_SIZE].copy_from_slice(&FileHeader::new(size as u64).to_bytes());

    let body_end = HEADER_SIZE + codec::pack_into(tree, &mut buf[HEADER_SIZE..]);
    assert_eq!(
        body_end + TRAILER_SIZE,
        size,
        "persisted image size mismatch"
    );

    let crc = crc32fast::hash(&buf[..body_end]);
    BigEndian::write_u32(&mut buf[body_end..], crc);
    buf
}

/// Validate a complete image whose header has been parsed and merge its
/// tree into `tree`.
///
/// `image` must be exactly `header.file_size` bytes.
pub(crate) fn decode_image(
    header: &FileHeader,
    image: &[u8],
    tree: &mut Tree,
) -> Result<(), CodecError> {
    let mut body_end = image.len();
    if header.has_crc() {
        body_end -= TRAILER_SIZE;
        let stored = BigEndian::read_u32(&image[body_end..]);
        let computed = crc32fast::hash(&image[..body_end]);
        if stored != computed {
            error!(target: "kvtree::codec", stored, computed, "CRC32 mismatch");
            return Err(CodecError::CrcMismatch { stored, computed });
        }
    }

    let mut decoded = Tree::new();
    codec::unpack(&image[HEADER_SIZE..body_end], &mut decoded)?;
    tree.merge(&decoded);
    Ok(())
}

/// Parse a persisted image from the start of `buf` and merge its tree into
/// `tree`.
///
/// Returns the number of bytes the image occupies.
pub fn read_persist(buf: &[u8], tree: &mut Tree) -> Result<usize, CodecError> {
    let header = FileHeader::from_bytes(buf)?;
    if let Err(e) = header.validate() {
        error!(target: "kvtree::codec", error = %e, "Header does not match expected values");
        return Err(e);
    }
    if header.file_size > buf.len() as u64 {
        return Err(CodecError::ImageTruncated {
            expected: header.file_size,
            actual: buf.len() as u64,
        });
    }
    let size = header.file_size as usize;
    decode_image(&header, &buf[..size], tree)?;
    Ok(size)
}
