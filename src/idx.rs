//! The `.idx`/`.syn` parser and the in-memory index over the resulting
//! entry table: an ordered entry vector plus a first-rune bucketing
//! structure (`WordPrefixMap`) that narrows candidates before scoring.

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader, Read};
use std::path::Path;

use byteorder::{ByteOrder, BigEndian};

use crate::error::{Error, Result};
use crate::ifo::Info;

/// One headword group: synonyms sharing a single payload range.
#[derive(Clone, Debug)]
pub struct IdxEntry {
	/// Primary headword first, synonyms (if any) appended afterwards.
	pub terms: Vec<String>,
	pub offset: u64,
	pub size: u64,
	pub index: usize,
}

/// The in-memory index: the entry table plus a first-rune → candidate-index
/// bucket map used to narrow every search before scoring.
#[derive(Debug)]
pub struct Index {
	pub entries: Vec<IdxEntry>,
	buckets: HashMap<char, Vec<usize>>,
}

impl Index {
	pub fn load(idx_path: &Path, syn_path: Option<&Path>, info: &Info) -> Result<Index> {
		let mut entries = read_idx(idx_path, info)?;

		if let Some(syn_path) = syn_path {
			apply_syn(syn_path, &mut entries)?;
		}

		let mut buckets: HashMap<char, Vec<usize>> = HashMap::new();
		for entry in &entries {
			for term in &entry.terms {
				add_to_buckets(&mut buckets, term, entry.index);
			}
		}

		Ok(Index { entries, buckets })
	}

	pub fn bucket(&self, first_rune: char) -> &[usize] {
		self.buckets.get(&first_rune).map(Vec::as_slice).unwrap_or(&[])
	}

	pub fn len(&self) -> usize {
		self.entries.len()
	}

	pub fn is_empty(&self) -> bool {
		self.entries.is_empty()
	}
}

fn add_to_buckets(buckets: &mut HashMap<char, Vec<usize>>, term: &str, entry_index: usize) {
	for word in term.to_lowercase().split(' ') {
		if word.is_empty() {
			continue;
		}
		let prefix = match word.chars().next() {
			Some(c) => c,
			None => continue,
		};
		if prefix == char::REPLACEMENT_CHARACTER {
			log::warn!("rejecting replacement-character bucket key for word {word:?} in term {term:?}");
			continue;
		}
		let list = buckets.entry(prefix).or_default();
		if list.last() != Some(&entry_index) {
			list.push(entry_index);
		}
	}
}

fn read_idx(path: &Path, info: &Info) -> Result<Vec<IdxEntry>> {
	let file = File::open(path).map_err(|e| Error::FailedOpenFile("idx", e))?;
	let mut reader = BufReader::new(file);
	let width = if info.is64 { 8 } else { 4 };

	let mut entries = Vec::new();
	let mut bytes_read: u64 = 0;
	let mut word_buf = Vec::new();
	loop {
		word_buf.clear();
		let n = reader
			.read_until(0, &mut word_buf)
			.map_err(|e| Error::FailedOpenFile("idx", e))?;
		if n == 0 {
			break;
		}
		bytes_read += n as u64;
		if word_buf.last() == Some(&0) {
			word_buf.pop();
		}
		let word = String::from_utf8_lossy(&word_buf).into_owned();

		let mut int_buf = [0u8; 8];
		reader
			.read_exact(&mut int_buf[..width])
			.map_err(|_| Error::Truncated("idx offset"))?;
		bytes_read += width as u64;
		let offset = BigEndian::read_uint(&int_buf[..width], width);

		reader
			.read_exact(&mut int_buf[..width])
			.map_err(|_| Error::Truncated("idx size"))?;
		bytes_read += width as u64;
		let size = BigEndian::read_uint(&int_buf[..width], width);

		if word.is_empty() {
			continue;
		}
		let index = entries.len();
		entries.push(IdxEntry { terms: vec![word], offset, size, index });
	}

	if let Some(declared) = info.idxfilesize() {
		if declared != bytes_read {
			log::warn!(
				"idx file size mismatch: declared {declared}, read {bytes_read}"
			);
		}
	}

	Ok(entries)
}

fn apply_syn(path: &Path, entries: &mut [IdxEntry]) -> Result<()> {
	let file = File::open(path).map_err(|e| Error::FailedOpenFile("syn", e))?;
	let mut reader = BufReader::new(file);

	let mut word_buf = Vec::new();
	loop {
		word_buf.clear();
		let n = reader
			.read_until(0, &mut word_buf)
			.map_err(|e| Error::FailedOpenFile("syn", e))?;
		if n == 0 {
			break;
		}
		if word_buf.last() == Some(&0) {
			word_buf.pop();
		}
		let word = String::from_utf8_lossy(&word_buf).into_owned();

		let mut index_buf = [0u8; 4];
		reader
			.read_exact(&mut index_buf)
			.map_err(|_| Error::Truncated("syn index"))?;
		let primary_index = u32::from_be_bytes(index_buf) as usize;

		if word.is_empty() {
			continue;
		}
		match entries.get_mut(primary_index) {
			Some(entry) => entry.terms.push(word),
			None => log::warn!("synonym {word:?} points past entry table (index {primary_index})"),
		}
	}
	Ok(())
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::ifo::Info;

	fn write_idx_entry(buf: &mut Vec<u8>, word: &str, offset: u32, size: u32) {
		buf.extend_from_slice(word.as_bytes());
		buf.push(0);
		buf.extend_from_slice(&offset.to_be_bytes());
		buf.extend_from_slice(&size.to_be_bytes());
	}

	fn write_ifo(dir: &Path, idxfilesize: usize) -> std::path::PathBuf {
		let path = dir.join("test.ifo");
		let content = format!(
			"StarDict's dict ifo file\nversion=2.4.2\nbookname=Test Dict\nwordcount=3\nidxfilesize={idxfilesize}\n"
		);
		std::fs::write(&path, content).expect("write ifo fixture");
		path
	}

	#[test]
	fn loads_entries_applies_synonyms_and_buckets_by_first_rune() {
		let dir = tempfile::tempdir().expect("create temp dir");

		let mut idx_bytes = Vec::new();
		write_idx_entry(&mut idx_bytes, "apple", 0, 5);
		write_idx_entry(&mut idx_bytes, "banana", 5, 6);
		write_idx_entry(&mut idx_bytes, "cherry", 11, 6);
		let idx_path = dir.path().join("test.idx");
		std::fs::write(&idx_path, &idx_bytes).expect("write idx fixture");

		let mut syn_bytes = Vec::new();
		syn_bytes.extend_from_slice(b"fruit\0");
		syn_bytes.extend_from_slice(&0u32.to_be_bytes());
		let syn_path = dir.path().join("test.syn");
		std::fs::write(&syn_path, &syn_bytes).expect("write syn fixture");

		let ifo_path = write_ifo(dir.path(), idx_bytes.len());
		let info = Info::load(&ifo_path).expect("load ifo fixture");

		let index = Index::load(&idx_path, Some(&syn_path), &info).expect("load index fixture");

		assert_eq!(index.len(), 3);
		assert_eq!(index.entries[0].terms, vec!["apple", "fruit"]);
		assert_eq!(index.entries[1].terms, vec!["banana"]);
		assert_eq!(index.entries[2].terms, vec!["cherry"]);

		assert_eq!(index.bucket('a'), &[0]);
		assert_eq!(index.bucket('b'), &[1]);
		assert_eq!(index.bucket('c'), &[2]);
		assert_eq!(index.bucket('f'), &[0]);
		assert!(index.bucket('z').is_empty());
	}

	#[test]
	fn loads_without_synonym_file() {
		let dir = tempfile::tempdir().expect("create temp dir");

		let mut idx_bytes = Vec::new();
		write_idx_entry(&mut idx_bytes, "apple", 0, 5);
		let idx_path = dir.path().join("test.idx");
		std::fs::write(&idx_path, &idx_bytes).expect("write idx fixture");

		let ifo_path = write_ifo(dir.path(), idx_bytes.len());
		let info = Info::load(&ifo_path).expect("load ifo fixture");

		let index = Index::load(&idx_path, None, &info).expect("load index fixture");
		assert_eq!(index.len(), 1);
		assert_eq!(index.entries[0].terms, vec!["apple"]);
	}
}
