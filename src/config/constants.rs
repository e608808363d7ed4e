//! # QuillDB Configuration Constants
//!
//! Centralizes path conventions and the on-disk image format identity.
//! Constants that must agree with each other are co-located here so a
//! format change cannot silently desynchronize the reader and the writer.
//!
//! ## Layout Relationships
//!
//! ```text
//! DEFAULT_DATA_ROOT ("data")
//!       │
//!       └─> <root>/<db>/<db>.DB_FILE_EXT        whole-image database file
//!             <root>/<db>/<db>.SNAPSHOT_FILE_EXT transaction snapshot
//!
//! IMAGE_MAGIC (16 bytes)
//!       │
//!       └─> IMAGE_HEADER_SIZE = magic + version (u32) + crc64 (u64) + payload length (u64)
//! ```

/// Default directory under which database directories are created.
pub const DEFAULT_DATA_ROOT: &str = "data";

/// Extension of the whole-image database file.
pub const DB_FILE_EXT: &str = "qdb";

/// Extension of the transaction snapshot written at BEGIN.
pub const SNAPSHOT_FILE_EXT: &str = "txsnap";

/// Fallback path for `print(OutputKind::File, None)`.
pub const DEFAULT_OUTPUT_FILE: &str = "query_output.txt";

/// Magic bytes at offset 0 of every database image.
pub const IMAGE_MAGIC: &[u8; 16] = b"quilldb image v1";

/// Image format version. Bump on any change to the payload encoding.
pub const IMAGE_FORMAT_VERSION: u32 = 1;

/// Fixed size of the image header preceding the payload.
pub const IMAGE_HEADER_SIZE: usize = 16 + 4 + 8 + 8;

const _: () = assert!(
    IMAGE_HEADER_SIZE == IMAGE_MAGIC.len() + 4 + 8 + 8,
    "IMAGE_HEADER_SIZE derivation mismatch"
);
