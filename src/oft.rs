//! The open-file table: handle allocation and filename binding.
//!
//! Backed by a contiguous, indexable container with free-slot reuse
//! (handle = slot index) rather than a linked list.

use crate::error::{Result, TfsError};
use crate::layout::MAX_FILENAME_LEN;

/// A file handle, as returned by `openFile`.
pub type FileDescriptor = u32;

/// One live entry in the open-file table.
#[derive(Debug, Clone)]
pub struct OftEntry {
	pub filename: String,
	pub created: i64,
}

/// The volume-wide table of open files.
#[derive(Default)]
pub struct OpenFileTable {
	slots: Vec<Option<OftEntry>>,
}

impl OpenFileTable {
	pub fn new() -> Self {
		Self::default()
	}

	/// Returns the handle bound to `name`, if any.
	pub fn find_by_name(&self, name: &str) -> Option<FileDescriptor> {
		self.slots.iter().position(|entry| {
			entry.as_ref().is_some_and(|e| e.filename == name)
		}).map(|i| i as FileDescriptor)
	}

	pub fn get(&self, fd: FileDescriptor) -> Option<&OftEntry> {
		self.slots.get(fd as usize).and_then(|slot| slot.as_ref())
	}

	/// Opens `name`, reusing an existing entry if one is already open.
	pub fn open(&mut self, name: &str, now: i64) -> Result<FileDescriptor> {
		if name.len() > MAX_FILENAME_LEN {
			return Err(TfsError::FilenameTooLong);
		}
		if let Some(fd) = self.find_by_name(name) {
			return Ok(fd);
		}
		let entry = OftEntry {
			filename: name.to_string(),
			created: now,
		};
		if let Some(free_slot) = self.slots.iter().position(|s| s.is_none()) {
			self.slots[free_slot] = Some(entry);
			Ok(free_slot as FileDescriptor)
		} else {
			self.slots.push(Some(entry));
			Ok((self.slots.len() - 1) as FileDescriptor)
		}
	}

	/// Removes the entry for `fd`. Fails if no such entry exists.
	pub fn close(&mut self, fd: FileDescriptor, err: TfsError) -> Result<()> {
		match self.slots.get_mut(fd as usize) {
			Some(slot @ Some(_)) => {
				*slot = None;
				Ok(())
			}
			_ => Err(err),
		}
	}

	/// Renames the entry for `fd` in place.
	pub fn rename(&mut self, fd: FileDescriptor, new_name: &str) -> Result<()> {
		if new_name.len() > MAX_FILENAME_LEN {
			return Err(TfsError::FilenameTooLong);
		}
		match self.slots.get_mut(fd as usize) {
			Some(Some(entry)) => {
				entry.filename = new_name.to_string();
				Ok(())
			}
			_ => Err(TfsError::OpenFile),
		}
	}

	/// Lists the filenames of every currently open entry, in handle order.
	pub fn list_names(&self) -> Vec<String> {
		self.slots
			.iter()
			.filter_map(|s| s.as_ref().map(|e| e.filename.clone()))
			.collect()
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn open_same_name_returns_same_handle() {
		let mut oft = OpenFileTable::new();
		let fd1 = oft.open("a", 1).unwrap();
		let fd2 = oft.open("a", 2).unwrap();
		assert_eq!(fd1, fd2);
		assert_eq!(oft.get(fd1).unwrap().created, 1);
	}

	#[test]
	fn open_rejects_long_names() {
		let mut oft = OpenFileTable::new();
		assert_eq!(
			oft.open("toolongname", 0).unwrap_err(),
			TfsError::FilenameTooLong
		);
		oft.open("exactly8", 0).unwrap();
	}

	#[test]
	fn close_frees_slot_for_reuse() {
		let mut oft = OpenFileTable::new();
		let fd1 = oft.open("a", 0).unwrap();
		oft.close(fd1, TfsError::CloseFile).unwrap();
		assert!(oft.get(fd1).is_none());

		let fd2 = oft.open("b", 0).unwrap();
		assert_eq!(fd1, fd2);
	}

	#[test]
	fn close_unknown_handle_fails() {
		let mut oft = OpenFileTable::new();
		assert_eq!(
			oft.close(42, TfsError::CloseFile).unwrap_err(),
			TfsError::CloseFile
		);
	}

	#[test]
	fn readdir_lists_open_names_only() {
		let mut oft = OpenFileTable::new();
		oft.open("a", 0).unwrap();
		oft.open("b", 0).unwrap();
		assert_eq!(oft.list_names(), vec!["a".to_string(), "b".to_string()]);
	}
}
