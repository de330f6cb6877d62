//! Volume maintenance: fragment inspection and defragmentation.

use crate::block_device::BlockDevice;
use crate::error::Result;
use crate::layout::{BlockBuf, Inode, Superblock, BLOCK_SIZE};
use crate::volume::TinyFs;

fn read_superblock(dev: &mut BlockDevice) -> Result<Superblock> {
	let mut block = [0u8; BLOCK_SIZE];
	dev.read_block(0, &mut block)?;
	Ok(Superblock::decode(&block))
}

impl TinyFs {
	/// Returns the disk map as a string of slot letters, one per block.
	pub fn display_fragments(&self) -> Result<String> {
		let mut dev = self.open_device()?;
		let sb = read_superblock(&mut dev)?;
		Ok(String::from_utf8_lossy(sb.dmap()).into_owned())
	}

	/// Compacts every live run to the left, in block-index order, leaving a
	/// single free run at the tail. Rewrites each moved inode's `posInDsk`
	/// to match its new location.
	pub fn defrag(&mut self) -> Result<()> {
		let mut dev = self.open_device()?;
		let mut sb = read_superblock(&mut dev)?;
		let num_blocks = sb.dmap().len();

		// Read every live block (anything but 'F') up front, in its
		// original left-to-right order, before any block is overwritten.
		let mut live_blocks: Vec<(u8, BlockBuf)> = Vec::new();
		for i in 1..num_blocks {
			if sb.dmap()[i] != b'F' {
				let mut block = [0u8; BLOCK_SIZE];
				dev.read_block(i as u8, &mut block)?;
				live_blocks.push((i as u8, block));
			}
		}

		// Two-pointer left-compaction: write each live block to the next
		// free slot starting right after the superblock.
		let mut write_cursor: usize = 1;
		let mut moved: Vec<(u8, u8)> = Vec::new(); // (old_index, new_index)
		for (old_index, mut block) in live_blocks {
			let new_index = write_cursor as u8;
			if new_index != old_index {
				// An inode carries its own location; fix it up before writing.
				if block[0] == crate::layout::Slot::Inode.type_tag() {
					let mut inode = Inode::decode(&block);
					inode.pos_in_dsk = new_index;
					block = inode.encode();
				}
				moved.push((old_index, new_index));
			}
			dev.write_block(new_index, &block)?;
			sb.dmap_mut()[new_index as usize] = dmap_letter(&block);
			write_cursor += 1;
		}

		// Everything from the write cursor onward is now free.
		let free_block = crate::layout::encode_free_block();
		for i in write_cursor..num_blocks {
			dev.write_block(i as u8, &free_block)?;
			sb.dmap_mut()[i] = b'F';
		}

		dev.write_block(0, &sb.encode())?;
		Ok(())
	}
}

fn dmap_letter(block: &BlockBuf) -> u8 {
	use crate::layout::Slot;
	match block[0] {
		t if t == Slot::Inode.type_tag() => b'I',
		t if t == Slot::Context.type_tag() => b'C',
		_ => b'F',
	}
}
