//! A single-volume, block-structured file system emulated over a host file.
//!
//! The on-disk layout, allocator, and file engine are described module by
//! module below; [`TinyFs`] is the single entry point tying them together.

mod block_device;
mod diskmap;
mod engine;
mod error;
mod layout;
mod maintenance;
mod oft;
mod util;
mod volume;

pub use engine::FileInfo;
pub use error::{Result, TfsError};
pub use layout::{BLOCK_SIZE, CONTEXT_DATA_SIZE, DMAP_SIZE, MAX_FILENAME_LEN};
pub use oft::FileDescriptor;
pub use volume::TinyFs;
