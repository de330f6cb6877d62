//! The error taxonomy returned by every TinyFS operation.

use std::fmt;

/// A TinyFS failure kind.
///
/// Each variant carries a stable numeric code, obtainable through
/// [`TfsError::code`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TfsError {
	/// The emulated disk file could not be opened or created.
	OpenDisk,
	/// A block write failed.
	WriteBlock,
	/// A block read failed.
	ReadBlock,
	/// Block 0's magic byte is not `0x44`.
	InvalidMagic,
	/// No volume is currently mounted.
	NoDiskMounted,
	/// A filename longer than 8 characters was used.
	FilenameTooLong,
	/// No open-file-table entry matches the given handle.
	OpenFile,
	/// `closeFile` was called with an unknown handle.
	CloseFile,
	/// `writeFile` could not complete (bad handle; see also `NoSpace`/`ReadOnly`).
	WriteFile,
	/// `deleteFile` could not complete.
	DeleteFile,
	/// No contiguous run of free blocks was large enough.
	NoSpace,
	/// `readByte` was attempted past the end of the file (or on a bad handle).
	ReadByte,
	/// `writeByte` was attempted past the end of the file (or on a bad handle).
	WriteByte,
	/// `seek` offset is greater than the file's size.
	InvalidSeek,
	/// The target file is marked read-only.
	ReadOnly,
}

impl TfsError {
	/// Returns the stable negative error code for this failure kind.
	pub const fn code(self) -> i32 {
		match self {
			Self::OpenDisk => -400,
			Self::WriteBlock => -401,
			Self::ReadBlock => -402,
			Self::InvalidMagic => -403,
			Self::NoDiskMounted => -404,
			Self::FilenameTooLong => -405,
			Self::OpenFile => -406,
			Self::CloseFile => -407,
			Self::WriteFile => -408,
			Self::DeleteFile => -409,
			Self::NoSpace => -410,
			Self::ReadByte => -411,
			Self::InvalidSeek => -412,
			// Not present in the original enum; assigned the next free slots.
			Self::ReadOnly => -413,
			Self::WriteByte => -414,
		}
	}
}

impl fmt::Display for TfsError {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let msg = match self {
			Self::OpenDisk => "failed to open or create the disk file",
			Self::WriteBlock => "failed to write a block",
			Self::ReadBlock => "failed to read a block",
			Self::InvalidMagic => "invalid magic number: not a TinyFS volume",
			Self::NoDiskMounted => "no disk is mounted",
			Self::FilenameTooLong => "filename longer than 8 characters",
			Self::OpenFile => "no such open file",
			Self::CloseFile => "cannot close: no such open file",
			Self::WriteFile => "cannot write: no such open file",
			Self::DeleteFile => "cannot delete: no such open file",
			Self::NoSpace => "not enough contiguous free space",
			Self::ReadByte => "read past end of file",
			Self::WriteByte => "write past end of file",
			Self::InvalidSeek => "seek offset past end of file",
			Self::ReadOnly => "file is read-only",
		};
		write!(f, "{msg}")
	}
}

impl std::error::Error for TfsError {}

impl From<std::io::Error> for TfsError {
	/// Any unexpected host I/O failure on an already-open device surfaces as a block error.
	fn from(_: std::io::Error) -> Self {
		Self::ReadBlock
	}
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, TfsError>;
