//! Payload store: the `.dict` (plain) or `.dict.dz` (dictzip) file backing
//! a dictionary's entry payloads.

use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::Path;
use std::sync::Mutex;

use crate::dictzip::DictzipReader;
use crate::error::{Error, Result};

enum Backing {
	Plain(Mutex<File>, u64),
	DictZip(DictzipReader),
}

/// A dictionary's payload store, hiding whether it backs onto a raw `.dict`
/// file or a dictzip-compressed `.dict.dz` file behind one `read_at`.
pub struct Dict {
	backing: Backing,
}

impl Dict {
	pub fn open(path: &Path, compressed: bool) -> Result<Dict> {
		let backing = if compressed {
			Backing::DictZip(DictzipReader::open(path)?)
		} else {
			let file = File::open(path).map_err(|e| Error::FailedOpenFile("dict", e))?;
			let len = file
				.metadata()
				.map_err(|e| Error::FailedOpenFile("dict", e))?
				.len();
			Backing::Plain(Mutex::new(file), len)
		};
		Ok(Dict { backing })
	}

	/// Reads exactly `buf.len()` bytes of the entry payload at `offset`,
	/// unless the read runs past the end of the store, in which case fewer
	/// bytes (possibly zero) are returned.
	pub fn read_at(&self, buf: &mut [u8], offset: u64) -> Result<usize> {
		if buf.is_empty() {
			return Ok(0);
		}
		match &self.backing {
			Backing::Plain(file, len) => {
				if offset >= *len {
					return Ok(0);
				}
				let mut file = file.lock().expect("dict mutex poisoned");
				file.seek(SeekFrom::Start(offset))?;
				Ok(file.read(buf)?)
			}
			Backing::DictZip(dz) => dz.read_at(buf, offset),
		}
	}

	/// Reads the entry payload described by `offset`/`size` in full,
	/// looping over partial reads until the buffer is filled or the store
	/// runs dry.
	pub fn read_entry(&self, offset: u64, size: u64) -> Result<Vec<u8>> {
		let mut buf = vec![0u8; size as usize];
		let mut filled = 0usize;
		while filled < buf.len() {
			let n = self.read_at(&mut buf[filled..], offset + filled as u64)?;
			if n == 0 {
				buf.truncate(filled);
				break;
			}
			filled += n;
		}
		Ok(buf)
	}
}
