//! The file engine: every per-file operation TinyFS exposes.
//!
//! Every operation here begins by requiring a mounted volume and resolving
//! the caller's handle in the open-file table, then reads the superblock
//! fresh off disk. Each call opens its own [`BlockDevice`] and lets it
//! drop at the end.

use crate::block_device::BlockDevice;
use crate::diskmap::find_run;
use crate::error::{Result, TfsError};
use crate::layout::{
	encode_filename, encode_free_block, BlockBuf, FileContext, Inode, Superblock,
	BLOCK_SIZE, CONTEXT_DATA_SIZE, MAX_FILENAME_LEN, RDONLY_READONLY, RDONLY_WRITABLE,
};
use crate::oft::FileDescriptor;
use crate::util::{ceil_div, now_secs};
use crate::volume::TinyFs;

/// The three timestamps carried by an inode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileInfo {
	pub ctime: i64,
	pub mtime: i64,
	pub atime: i64,
}

fn read_superblock(dev: &mut BlockDevice) -> Result<Superblock> {
	let mut block = [0u8; BLOCK_SIZE];
	dev.read_block(0, &mut block)?;
	Ok(Superblock::decode(&block))
}

/// Scans the disk map for an `'I'` block whose filename matches `name`.
fn find_inode_by_name(
	dev: &mut BlockDevice,
	sb: &Superblock,
	name: &str,
) -> Result<Option<(u8, Inode)>> {
	for (i, &slot) in sb.dmap().iter().enumerate() {
		if slot == b'I' {
			let mut block = [0u8; BLOCK_SIZE];
			dev.read_block(i as u8, &mut block)?;
			let inode = Inode::decode(&block);
			if inode.filename_str() == name {
				return Ok(Some((i as u8, inode)));
			}
		}
	}
	Ok(None)
}

/// Reads the full context run of a file into one contiguous buffer.
fn read_context_run(dev: &mut BlockDevice, start: u8, fcb_len: u8) -> Result<Vec<u8>> {
	let mut data = Vec::with_capacity(fcb_len as usize * CONTEXT_DATA_SIZE);
	for i in 0..fcb_len {
		let mut block = [0u8; BLOCK_SIZE];
		dev.read_block(start + 1 + i, &mut block)?;
		data.extend_from_slice(&FileContext::decode(&block).data);
	}
	Ok(data)
}

/// Rewrites the full context run from a contiguous buffer, zero-padding the
/// final block if `data` doesn't fill it exactly.
fn write_context_run(dev: &mut BlockDevice, start: u8, fcb_len: u8, data: &[u8]) -> Result<()> {
	for i in 0..fcb_len {
		let off = i as usize * CONTEXT_DATA_SIZE;
		let end = (off + CONTEXT_DATA_SIZE).min(data.len());
		let mut chunk = [0u8; CONTEXT_DATA_SIZE];
		if off < end {
			chunk[..end - off].copy_from_slice(&data[off..end]);
		}
		dev.write_block(start + 1 + i, &FileContext::new(chunk).encode())?;
	}
	Ok(())
}

impl TinyFs {
	/// Opens `name`, creating an open-file-table entry if none exists yet.
	/// Does not touch on-disk state (Invariant 4: an OFT entry does not
	/// imply an on-disk inode).
	pub fn open_file(&mut self, name: &str) -> Result<FileDescriptor> {
		self.require_mounted()?;
		self.oft.open(name, now_secs())
	}

	/// Removes `fd` from the open-file table. Does not touch on-disk state.
	pub fn close_file(&mut self, fd: FileDescriptor) -> Result<()> {
		self.require_mounted()?;
		self.oft.close(fd, TfsError::CloseFile)
	}

	/// The rewrite-with-rollback protocol: atomically replaces the file
	/// bound to `fd` with `buffer`'s contents, or leaves the volume
	/// byte-identical to its pre-call state if there isn't room.
	pub fn write_file(&mut self, fd: FileDescriptor, buffer: &[u8]) -> Result<()> {
		let entry = self.oft.get(fd).ok_or(TfsError::WriteFile)?;
		let filename = entry.filename.clone();
		let created = entry.created;

		if buffer.len() > u16::MAX as usize {
			return Err(TfsError::NoSpace);
		}
		let new_fcb_len_usize = ceil_div(buffer.len(), CONTEXT_DATA_SIZE);
		if new_fcb_len_usize > u8::MAX as usize {
			return Err(TfsError::NoSpace);
		}
		let new_fcb_len = new_fcb_len_usize as u8;

		let mut dev = self.open_device()?;
		let mut sb = read_superblock(&mut dev)?;

		// Step 2: locate any existing file of the same name, honour read-only.
		let existing = find_inode_by_name(&mut dev, &sb, &filename)?;
		if let Some((_, inode)) = &existing {
			if inode.is_read_only() {
				return Err(TfsError::ReadOnly);
			}
		}

		// Step 3: back up and free the old run, if any.
		let backup: Option<(u8, Vec<BlockBuf>, u8)> = if let Some((start, _)) = existing {
			let mut inode_block = [0u8; BLOCK_SIZE];
			dev.read_block(start, &mut inode_block)?;
			let old_fcb_len = Inode::decode(&inode_block).fcb_len;

			let mut blocks = Vec::with_capacity(old_fcb_len as usize + 1);
			blocks.push(inode_block);
			for off in 1..=old_fcb_len {
				let mut block = [0u8; BLOCK_SIZE];
				dev.read_block(start + off, &mut block)?;
				blocks.push(block);
			}

			let free_block = encode_free_block();
			for off in 0..=old_fcb_len {
				let idx = start + off;
				dev.write_block(idx, &free_block)?;
				sb.dmap_mut()[idx as usize] = b'F';
			}
			dev.write_block(0, &sb.encode())?;

			Some((start, blocks, old_fcb_len))
		} else {
			None
		};

		// Step 4: find space for the new run.
		let run_len = new_fcb_len as usize + 1;
		let start = match find_run(sb.dmap(), run_len) {
			Some(s) => s as u8,
			None => {
				// Rollback: restore the backed-up run exactly.
				if let Some((orig_start, blocks, old_fcb_len)) = backup {
					for (i, block) in blocks.iter().enumerate() {
						dev.write_block(orig_start + i as u8, block)?;
					}
					sb.dmap_mut()[orig_start as usize] = b'I';
					for off in 1..=old_fcb_len {
						sb.dmap_mut()[(orig_start + off) as usize] = b'C';
					}
					dev.write_block(0, &sb.encode())?;
				}
				return Err(TfsError::NoSpace);
			}
		};

		// Step 5: construct the new inode. Create time is preserved across
		// rewrites; on a file's first-ever write it is the OFT entry's
		// creation time.
		let now = now_secs();
		let ctime = match &backup {
			Some((_, blocks, _)) => Inode::decode(&blocks[0]).ctime,
			None => created,
		};
		let (mtime, atime) = match backup {
			Some(_) => (now, now),
			None => (created, created),
		};
		let mut inode = Inode::new(&filename, start, new_fcb_len, buffer.len() as u16, now);
		inode.ctime = ctime;
		inode.mtime = mtime;
		inode.atime = atime;
		dev.write_block(start, &inode.encode())?;
		sb.dmap_mut()[start as usize] = b'I';

		// Step 6: stream the new data into consecutive context blocks.
		for i in 0..new_fcb_len {
			let off = i as usize * CONTEXT_DATA_SIZE;
			let end = (off + CONTEXT_DATA_SIZE).min(buffer.len());
			let mut chunk = [0u8; CONTEXT_DATA_SIZE];
			if off < end {
				chunk[..end - off].copy_from_slice(&buffer[off..end]);
			}
			dev.write_block(start + 1 + i, &FileContext::new(chunk).encode())?;
			sb.dmap_mut()[(start + 1 + i) as usize] = b'C';
		}

		// Step 7.
		dev.write_block(0, &sb.encode())?;
		Ok(())
	}

	/// Deletes the file bound to `fd`, freeing its run if one exists.
	pub fn delete_file(&mut self, fd: FileDescriptor) -> Result<()> {
		let filename = self
			.oft
			.get(fd)
			.ok_or(TfsError::DeleteFile)?
			.filename
			.clone();

		let mut dev = self.open_device()?;
		let mut sb = read_superblock(&mut dev)?;
		if let Some((start, inode)) = find_inode_by_name(&mut dev, &sb, &filename)? {
			if inode.is_read_only() {
				return Err(TfsError::ReadOnly);
			}
			let free_block = encode_free_block();
			for off in 0..=inode.fcb_len {
				let idx = start + off;
				dev.write_block(idx, &free_block)?;
				sb.dmap_mut()[idx as usize] = b'F';
			}
			dev.write_block(0, &sb.encode())?;
		}
		self.oft.close(fd, TfsError::DeleteFile)
	}

	/// Reads the byte at the file's current position, advancing it by one.
	pub fn read_byte(&mut self, fd: FileDescriptor) -> Result<u8> {
		let filename = self
			.oft
			.get(fd)
			.ok_or(TfsError::ReadByte)?
			.filename
			.clone();

		let mut dev = self.open_device()?;
		let sb = read_superblock(&mut dev)?;
		let Some((start, mut inode)) = find_inode_by_name(&mut dev, &sb, &filename)? else {
			return Err(TfsError::ReadByte);
		};
		if inode.fp >= inode.f_size {
			return Err(TfsError::ReadByte);
		}
		let data = read_context_run(&mut dev, start, inode.fcb_len)?;
		let byte = data[inode.fp as usize];
		inode.fp += 1;
		inode.atime = now_secs();
		dev.write_block(start, &inode.encode())?;
		Ok(byte)
	}

	/// Overwrites the byte at the file's current position, advancing it by one.
	pub fn write_byte(&mut self, fd: FileDescriptor, byte: u8) -> Result<()> {
		let filename = self
			.oft
			.get(fd)
			.ok_or(TfsError::WriteByte)?
			.filename
			.clone();

		let mut dev = self.open_device()?;
		let sb = read_superblock(&mut dev)?;
		let Some((start, mut inode)) = find_inode_by_name(&mut dev, &sb, &filename)? else {
			return Err(TfsError::WriteByte);
		};
		// Writing a single byte still counts as a write: honour `rdOnly`.
		if inode.is_read_only() {
			return Err(TfsError::ReadOnly);
		}
		if inode.fp >= inode.f_size {
			return Err(TfsError::WriteByte);
		}
		let mut data = read_context_run(&mut dev, start, inode.fcb_len)?;
		data[inode.fp as usize] = byte;
		inode.fp += 1;
		let now = now_secs();
		inode.mtime = now;
		inode.atime = now;
		dev.write_block(start, &inode.encode())?;
		write_context_run(&mut dev, start, inode.fcb_len, &data)?;
		Ok(())
	}

	/// Moves the file position to `offset`, which must not exceed the
	/// file's size.
	pub fn seek(&mut self, fd: FileDescriptor, offset: u16) -> Result<()> {
		let filename = self
			.oft
			.get(fd)
			.ok_or(TfsError::InvalidSeek)?
			.filename
			.clone();

		let mut dev = self.open_device()?;
		let sb = read_superblock(&mut dev)?;
		match find_inode_by_name(&mut dev, &sb, &filename)? {
			Some((start, mut inode)) => {
				if offset > inode.f_size {
					return Err(TfsError::InvalidSeek);
				}
				inode.fp = offset;
				dev.write_block(start, &inode.encode())?;
				Ok(())
			}
			None => {
				if offset > 0 {
					return Err(TfsError::InvalidSeek);
				}
				Ok(())
			}
		}
	}

	/// Renames the file bound to `fd`. Rejects names over 8 characters
	/// before touching the open-file table or the disk.
	pub fn rename(&mut self, fd: FileDescriptor, new_name: &str) -> Result<()> {
		if new_name.len() > MAX_FILENAME_LEN {
			return Err(TfsError::FilenameTooLong);
		}
		let old_filename = self.oft.get(fd).ok_or(TfsError::OpenFile)?.filename.clone();
		self.oft.rename(fd, new_name)?;

		let mut dev = self.open_device()?;
		let sb = read_superblock(&mut dev)?;
		if let Some((start, mut inode)) = find_inode_by_name(&mut dev, &sb, &old_filename)? {
			inode.filename = encode_filename(new_name);
			dev.write_block(start, &inode.encode())?;
		}
		Ok(())
	}

	/// Marks the on-disk file `name` read-only.
	pub fn make_ro(&self, name: &str) -> Result<()> {
		self.set_read_only(name, RDONLY_READONLY)
	}

	/// Marks the on-disk file `name` writable.
	pub fn make_rw(&self, name: &str) -> Result<()> {
		self.set_read_only(name, RDONLY_WRITABLE)
	}

	fn set_read_only(&self, name: &str, value: u8) -> Result<()> {
		let mut dev = self.open_device()?;
		let sb = read_superblock(&mut dev)?;
		match find_inode_by_name(&mut dev, &sb, name)? {
			Some((start, mut inode)) => {
				inode.rd_only = value;
				dev.write_block(start, &inode.encode())?;
				Ok(())
			}
			None => Err(TfsError::OpenFile),
		}
	}

	/// Returns the three timestamps stored in `fd`'s on-disk inode.
	pub fn read_file_info(&self, fd: FileDescriptor) -> Result<FileInfo> {
		let filename = self.oft.get(fd).ok_or(TfsError::OpenFile)?.filename.clone();

		let mut dev = self.open_device()?;
		let sb = read_superblock(&mut dev)?;
		match find_inode_by_name(&mut dev, &sb, &filename)? {
			Some((_, inode)) => Ok(FileInfo {
				ctime: inode.ctime,
				mtime: inode.mtime,
				atime: inode.atime,
			}),
			None => Err(TfsError::OpenFile),
		}
	}

	/// Lists the filenames currently open in this session's open-file
	/// table. A file that exists on disk but has never been opened in this
	/// session is not listed.
	pub fn readdir(&self) -> Result<Vec<String>> {
		self.require_mounted()?;
		Ok(self.oft.list_names())
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use tempfile::NamedTempFile;

	fn mounted() -> (TinyFs, NamedTempFile) {
		let tmp = NamedTempFile::new().unwrap();
		let tfs = TinyFs::new();
		tfs.mkfs(tmp.path(), 10240).unwrap();
		let mut tfs = TinyFs::new();
		tfs.mount(tmp.path()).unwrap();
		(tfs, tmp)
	}

	/// R1: write/read round trip.
	#[test]
	fn write_then_read_round_trip() {
		let (mut tfs, _tmp) = mounted();
		let fd = tfs.open_file("x").unwrap();
		let payload: Vec<u8> = (0..300).map(|i| (i % 251) as u8).collect();
		tfs.write_file(fd, &payload).unwrap();

		for &expected in &payload {
			assert_eq!(tfs.read_byte(fd).unwrap(), expected);
		}
		assert_eq!(tfs.read_byte(fd).unwrap_err(), TfsError::ReadByte);
	}

	/// R2: delete, then rewrite of the same size must succeed (space is recovered).
	#[test]
	fn delete_then_rewrite_same_size_succeeds() {
		let (mut tfs, _tmp) = mounted();
		let fd = tfs.open_file("x").unwrap();
		tfs.write_file(fd, &[b'A'; 300]).unwrap();
		tfs.delete_file(fd).unwrap();

		let fd = tfs.open_file("x").unwrap();
		tfs.write_file(fd, &[b'A'; 300]).unwrap();
	}

	/// S3: rewriting a file with new contents of the same size round-trips.
	#[test]
	fn rewrite_with_new_contents() {
		let (mut tfs, _tmp) = mounted();
		let fd = tfs.open_file("a").unwrap();
		tfs.write_file(fd, &[b'A'; 300]).unwrap();
		tfs.write_file(fd, &[b'B'; 300]).unwrap();

		tfs.seek(fd, 0).unwrap();
		for _ in 0..300 {
			assert_eq!(tfs.read_byte(fd).unwrap(), b'B');
		}
	}

	/// B1: filename length boundary.
	#[test]
	fn filename_length_boundary() {
		let (mut tfs, _tmp) = mounted();
		tfs.open_file("exactly8").unwrap();
		assert_eq!(
			tfs.open_file("toolong89").unwrap_err(),
			TfsError::FilenameTooLong
		);
	}

	/// B2/B3: seek and read boundaries.
	#[test]
	fn seek_and_read_boundaries() {
		let (mut tfs, _tmp) = mounted();
		let fd = tfs.open_file("x").unwrap();
		tfs.write_file(fd, &[1, 2, 3]).unwrap();

		tfs.seek(fd, 3).unwrap();
		assert_eq!(tfs.read_byte(fd).unwrap_err(), TfsError::ReadByte);
		assert_eq!(tfs.seek(fd, 4).unwrap_err(), TfsError::InvalidSeek);
	}

	/// B4: zero-size write creates a one-block file.
	#[test]
	fn zero_size_write_consumes_one_block() {
		let (mut tfs, _tmp) = mounted();
		let fd = tfs.open_file("x").unwrap();
		tfs.write_file(fd, &[]).unwrap();
		assert_eq!(tfs.read_byte(fd).unwrap_err(), TfsError::ReadByte);

		let frags = tfs.display_fragments().unwrap();
		assert_eq!(frags.chars().filter(|&c| c == 'I').count(), 1);
		assert_eq!(frags.chars().filter(|&c| c == 'C').count(), 0);
	}

	#[test]
	fn read_only_blocks_write_and_delete() {
		let (mut tfs, _tmp) = mounted();
		let fd = tfs.open_file("x").unwrap();
		tfs.write_file(fd, &[1, 2, 3]).unwrap();
		tfs.make_ro("x").unwrap();

		assert_eq!(tfs.write_file(fd, &[4, 5, 6]).unwrap_err(), TfsError::ReadOnly);
		assert_eq!(tfs.delete_file(fd).unwrap_err(), TfsError::ReadOnly);

		tfs.make_rw("x").unwrap();
		tfs.write_file(fd, &[4, 5, 6]).unwrap();
	}

	#[test]
	fn write_byte_honors_read_only() {
		let (mut tfs, _tmp) = mounted();
		let fd = tfs.open_file("x").unwrap();
		tfs.write_file(fd, &[1, 2, 3]).unwrap();
		tfs.make_ro("x").unwrap();
		tfs.seek(fd, 0).unwrap();
		assert_eq!(tfs.write_byte(fd, 9).unwrap_err(), TfsError::ReadOnly);
	}

	#[test]
	fn write_byte_updates_in_place() {
		let (mut tfs, _tmp) = mounted();
		let fd = tfs.open_file("x").unwrap();
		tfs.write_file(fd, &[1, 2, 3]).unwrap();
		tfs.seek(fd, 1).unwrap();
		tfs.write_byte(fd, 42).unwrap();

		tfs.seek(fd, 0).unwrap();
		assert_eq!(tfs.read_byte(fd).unwrap(), 1);
		assert_eq!(tfs.read_byte(fd).unwrap(), 42);
		assert_eq!(tfs.read_byte(fd).unwrap(), 3);
	}

	#[test]
	fn rename_updates_oft_and_inode() {
		let (mut tfs, _tmp) = mounted();
		let fd = tfs.open_file("old").unwrap();
		tfs.write_file(fd, &[1, 2, 3]).unwrap();
		tfs.rename(fd, "new").unwrap();

		assert_eq!(tfs.readdir().unwrap(), vec!["new".to_string()]);
		let info = tfs.read_file_info(fd).unwrap();
		assert!(info.ctime > 0);

		// The old name no longer resolves to an on-disk file.
		let fd2 = tfs.open_file("old").unwrap();
		assert_eq!(tfs.read_byte(fd2).unwrap_err(), TfsError::ReadByte);
	}

	#[test]
	fn readdir_requires_mounted_volume() {
		let mut tfs = TinyFs::new();
		assert_eq!(tfs.readdir().unwrap_err(), TfsError::NoDiskMounted);
	}

	/// S4/R4: rewrite requiring more space than is free is a no-op.
	#[test]
	fn no_space_rewrite_is_a_no_op() {
		let tmp = NamedTempFile::new().unwrap();
		// A tiny volume: superblock + 2 blocks total.
		let tfs = TinyFs::new();
		tfs.mkfs(tmp.path(), 256 * 3).unwrap();
		let mut tfs = TinyFs::new();
		tfs.mount(tmp.path()).unwrap();

		let fd = tfs.open_file("x").unwrap();
		// One block's worth of payload: fits (1 inode + 1 context == 2 blocks).
		tfs.write_file(fd, &[b'A'; 200]).unwrap();

		let before = std::fs::read(tmp.path()).unwrap();
		// Requesting 3 context blocks needs 4 blocks total; only 3 exist.
		let big = vec![b'B'; 3 * CONTEXT_DATA_SIZE];
		assert_eq!(tfs.write_file(fd, &big).unwrap_err(), TfsError::NoSpace);

		let after = std::fs::read(tmp.path()).unwrap();
		assert_eq!(before, after);
	}
}
