//! mkfs / mount / unmount: volume lifecycle and the mounted-volume handle.
//!
//! The mounted volume and the open-file table are not global state; they
//! live in this explicit [`TinyFs`] value, owned by the caller and threaded
//! through every call. A `TinyFs` holds at most one mounted volume at a
//! time.

use std::path::{Path, PathBuf};

use crate::block_device::BlockDevice;
use crate::error::{Result, TfsError};
use crate::layout::{Superblock, DMAP_SIZE, MAGIC};
use crate::oft::OpenFileTable;

/// A TinyFS session: the mounted-volume handle plus the open-file table.
///
/// Construct one per independent "process"; nothing here is shared between
/// instances, so tests can mount unrelated volumes concurrently within the
/// same test binary.
pub struct TinyFs {
	pub(crate) mounted_path: Option<PathBuf>,
	pub(crate) oft: OpenFileTable,
}

impl Default for TinyFs {
	fn default() -> Self {
		Self::new()
	}
}

impl TinyFs {
	pub fn new() -> Self {
		Self {
			mounted_path: None,
			oft: OpenFileTable::new(),
		}
	}

	/// Creates a fresh volume at `path` of `n_bytes`, formatted with an
	/// empty disk map (every block but the superblock marked free).
	///
	/// Does not mount the new volume; call [`TinyFs::mount`] afterwards.
	pub fn mkfs(&self, path: &Path, n_bytes: u64) -> Result<()> {
		let num_blocks = n_bytes / crate::layout::BLOCK_SIZE as u64;
		if num_blocks == 0 || num_blocks > DMAP_SIZE as u64 {
			return Err(TfsError::OpenDisk);
		}
		let mut dev = BlockDevice::create(path, n_bytes)?;
		let superblock = Superblock::new(num_blocks as u8);
		dev.write_block(0, &superblock.encode())?;
		let free_block = crate::layout::encode_free_block();
		for b in 1..num_blocks as u8 {
			dev.write_block(b, &free_block)?;
		}
		Ok(())
	}

	/// Mounts the volume at `path`, unmounting any currently mounted volume
	/// first. Rejects a volume whose superblock magic byte is wrong.
	pub fn mount(&mut self, path: &Path) -> Result<()> {
		if self.mounted_path.is_some() {
			self.unmount()?;
		}
		let mut dev = BlockDevice::open(path)?;
		let mut block = [0u8; crate::layout::BLOCK_SIZE];
		dev.read_block(0, &mut block)?;
		if block[1] != MAGIC {
			return Err(TfsError::InvalidMagic);
		}
		self.mounted_path = Some(path.to_path_buf());
		Ok(())
	}

	/// Releases the active mounted volume. Subsequent operations fail until
	/// a fresh `mount` succeeds.
	pub fn unmount(&mut self) -> Result<()> {
		if self.mounted_path.take().is_none() {
			return Err(TfsError::NoDiskMounted);
		}
		Ok(())
	}

	pub(crate) fn require_mounted(&self) -> Result<&Path> {
		self.mounted_path
			.as_deref()
			.ok_or(TfsError::NoDiskMounted)
	}

	pub(crate) fn open_device(&self) -> Result<BlockDevice> {
		BlockDevice::open(self.require_mounted()?)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use tempfile::NamedTempFile;

	#[test]
	fn mkfs_then_mount_succeeds() {
		let tmp = NamedTempFile::new().unwrap();
		let tfs = TinyFs::new();
		tfs.mkfs(tmp.path(), 10240).unwrap();

		let mut tfs = TinyFs::new();
		tfs.mount(tmp.path()).unwrap();
		assert!(tfs.mounted_path.is_some());
	}

	#[test]
	fn mount_rejects_bad_magic() {
		let tmp = NamedTempFile::new().unwrap();
		std::fs::write(tmp.path(), vec![0u8; 10240]).unwrap();

		let mut tfs = TinyFs::new();
		assert_eq!(tfs.mount(tmp.path()).unwrap_err(), TfsError::InvalidMagic);
	}

	#[test]
	fn mount_replaces_previous_mount() {
		let tmp1 = NamedTempFile::new().unwrap();
		let tmp2 = NamedTempFile::new().unwrap();
		let tfs = TinyFs::new();
		tfs.mkfs(tmp1.path(), 10240).unwrap();
		tfs.mkfs(tmp2.path(), 10240).unwrap();

		let mut tfs = TinyFs::new();
		tfs.mount(tmp1.path()).unwrap();
		tfs.mount(tmp2.path()).unwrap();
		assert_eq!(tfs.mounted_path.as_deref(), Some(tmp2.path()));
	}

	#[test]
	fn unmount_without_mount_fails() {
		let mut tfs = TinyFs::new();
		assert_eq!(tfs.unmount().unwrap_err(), TfsError::NoDiskMounted);
	}

	#[test]
	fn mkfs_default_volume_is_forty_blocks() {
		let tmp = NamedTempFile::new().unwrap();
		let tfs = TinyFs::new();
		tfs.mkfs(tmp.path(), 10240).unwrap();

		let mut dev = BlockDevice::open(tmp.path()).unwrap();
		let mut block = [0u8; crate::layout::BLOCK_SIZE];
		dev.read_block(0, &mut block).unwrap();
		let sb = Superblock::decode(&block);
		assert_eq!({ sb.num_blocks }, 40);
		assert_eq!(sb.dmap()[0], b'S');
		assert!(sb.dmap()[1..].iter().all(|&c| c == b'F'));
	}
}
