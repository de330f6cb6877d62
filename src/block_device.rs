//! Fixed-size block I/O over a host file standing in for a raw disk.
//!
//! Every operation seeks to an absolute block offset, then transfers a
//! whole `BLOCK_SIZE`-byte record with `read_exact`/`write_all`.

use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;

use crate::error::{Result, TfsError};
use crate::layout::BLOCK_SIZE;

/// A host file treated as a sequence of fixed-size blocks.
pub struct BlockDevice {
	file: File,
}

impl BlockDevice {
	/// Creates (or truncates) a new disk file of exactly `n_bytes` zero bytes.
	///
	/// `n_bytes` must be at least one block; anything smaller is a malformed
	/// call, matching `openDisk`'s rejection of `nBytes < BLOCKSIZE`.
	pub fn create(path: &Path, n_bytes: u64) -> Result<Self> {
		if n_bytes < BLOCK_SIZE as u64 {
			return Err(TfsError::OpenDisk);
		}
		let mut file = OpenOptions::new()
			.read(true)
			.write(true)
			.create(true)
			.truncate(true)
			.open(path)
			.map_err(|_| TfsError::OpenDisk)?;
		file.set_len(n_bytes).map_err(|_| TfsError::OpenDisk)?;
		Ok(Self { file })
	}

	/// Opens an existing disk file for read/write.
	pub fn open(path: &Path) -> Result<Self> {
		let file = OpenOptions::new()
			.read(true)
			.write(true)
			.open(path)
			.map_err(|_| TfsError::OpenDisk)?;
		Ok(Self { file })
	}

	/// Reads block `b_num` into `buf`.
	pub fn read_block(&mut self, b_num: u8, buf: &mut [u8; BLOCK_SIZE]) -> Result<()> {
		self.file
			.seek(SeekFrom::Start(b_num as u64 * BLOCK_SIZE as u64))
			.map_err(|_| TfsError::ReadBlock)?;
		self.file.read_exact(buf).map_err(|_| TfsError::ReadBlock)
	}

	/// Writes `buf` to block `b_num`.
	pub fn write_block(&mut self, b_num: u8, buf: &[u8; BLOCK_SIZE]) -> Result<()> {
		self.file
			.seek(SeekFrom::Start(b_num as u64 * BLOCK_SIZE as u64))
			.map_err(|_| TfsError::WriteBlock)?;
		self.file.write_all(buf).map_err(|_| TfsError::WriteBlock)
	}
}
