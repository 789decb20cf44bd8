//! The public façade: directory scanning, parallel dictionary load, and the
//! `Dictionary` handle tying the index, payload store and entry decoder
//! together behind the six search strategies.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use regex::Regex;

use crate::dict::Dict;
use crate::entry::{self, Item};
use crate::error::{Error, Result};
use crate::idx::{IdxEntry, Index};
use crate::ifo::Info;
use crate::score::{self, FuzzyArgs};
use crate::search;

/// A scored match, carrying its terms and a lazy handle to materialize the
/// entry's items. The producer holds an `Arc` back to the dictionary, never
/// a borrow, so it can be returned and invoked independently of the search
/// call that produced it.
pub struct SearchResultLow {
	pub score: u8,
	pub terms: Vec<String>,
	pub entry_index: usize,
	inner: Arc<DictionaryInner>,
	offset: u64,
	size: u64,
}

impl SearchResultLow {
	/// Reads the entry payload and decodes it into items. Allocates a
	/// `size`-byte buffer and performs the (possibly random-access
	/// decompressing) read on every call; callers that need the items more
	/// than once should cache the result themselves.
	pub fn items(&self) -> Result<Vec<Item>> {
		let payload = self.inner.dict.read_entry(self.offset, self.size)?;
		Ok(entry::decode(&payload, self.inner.info.sametypesequence()))
	}
}

pub(crate) struct DictionaryInner {
	pub path: PathBuf,
	pub info: Info,
	pub idx: Index,
	pub dict: Dict,
}

impl DictionaryInner {
	fn new_result(self: &Arc<Self>, entry: &IdxEntry, score: u8) -> SearchResultLow {
		SearchResultLow {
			score,
			terms: entry.terms.clone(),
			entry_index: entry.index,
			inner: Arc::clone(self),
			offset: entry.offset,
			size: entry.size,
		}
	}
}

/// A loaded StarDict dictionary: `.ifo` metadata, the in-memory `.idx`
/// index, and a handle to the `.dict`/`.dict.dz` payload store.
#[derive(Clone)]
pub struct Dictionary {
	inner: Arc<DictionaryInner>,
}

impl Dictionary {
	fn load(path: PathBuf, stem: &str) -> Result<Dictionary> {
		let ifo_path = path.join(format!("{stem}.ifo"));
		let idx_path = path.join(format!("{stem}.idx"));
		let syn_path = path.join(format!("{stem}.syn"));
		let dict_path = path.join(format!("{stem}.dict"));
		let dict_dz_path = path.join(format!("{stem}.dict.dz"));

		if !idx_path.is_file() {
			return Err(Error::NoFileFound("idx"));
		}

		let info = Info::load(&ifo_path)?;

		let syn_path = syn_path.is_file().then_some(syn_path);
		let idx = Index::load(&idx_path, syn_path.as_deref(), &info)?;

		let (dict_path, compressed) = if dict_path.is_file() {
			(dict_path, false)
		} else if dict_dz_path.is_file() {
			(dict_dz_path, true)
		} else {
			return Err(Error::NoFileFound("dict"));
		};
		let dict = Dict::open(&dict_path, compressed)?;

		Ok(Dictionary { inner: Arc::new(DictionaryInner { path, info, idx, dict }) })
	}

	pub fn bookname(&self) -> &str {
		self.inner.info.bookname()
	}

	pub fn info(&self) -> &Info {
		&self.inner.info
	}

	pub fn path(&self) -> &Path {
		&self.inner.path
	}

	pub fn len(&self) -> usize {
		self.inner.idx.len()
	}

	pub fn is_empty(&self) -> bool {
		self.inner.idx.is_empty()
	}

	pub fn entry_by_index(&self, index: usize) -> Option<SearchResultLow> {
		let entry = self.inner.idx.entries.get(index)?;
		Some(self.inner.new_result(entry, 0))
	}

	/// Drops this handle to the dictionary. A no-op beyond ordinary `Drop`
	/// unless other clones (or in-flight `SearchResultLow` items producers)
	/// are still holding the underlying `Arc`.
	pub fn close(self) {}

	pub fn search_exact(&self, query: &str, worker_count: usize, timeout: Duration) -> Vec<SearchResultLow> {
		let query = search::normalize_query(query);
		let Some(prefix) = search::first_rune(&query) else {
			log::warn!("empty query passed to search_exact");
			return Vec::new();
		};
		let candidates = self.inner.idx.bucket(prefix);
		let idx = &self.inner.idx;
		let inner = &self.inner;

		search::run_workers(candidates.len(), worker_count, timeout, |i| {
			let entry = &idx.entries[candidates[i]];
			let matched = entry.terms.iter().any(|term| term.to_lowercase() == query);
			matched.then(|| inner.new_result(entry, 200))
		})
	}

	pub fn search_start_with(&self, query: &str, worker_count: usize, timeout: Duration) -> Vec<SearchResultLow> {
		const MIN_SCORE: u8 = 140;
		let query = search::normalize_query(query);
		let Some(prefix) = search::first_rune(&query) else {
			log::warn!("empty query passed to search_start_with");
			return Vec::new();
		};
		let candidates = self.inner.idx.bucket(prefix);
		let idx = &self.inner.idx;
		let inner = &self.inner;

		search::run_workers(candidates.len(), worker_count, timeout, |i| {
			let entry = &idx.entries[candidates[i]];
			let score = score::score_starts_with(&entry.terms, &query);
			(score >= MIN_SCORE).then(|| inner.new_result(entry, score))
		})
	}

	pub fn search_word_match(&self, query: &str, worker_count: usize, timeout: Duration) -> Vec<SearchResultLow> {
		const MIN_SCORE: u8 = 140;
		let query = search::normalize_query(query);
		let Some(prefix) = query.split(' ').find(|w| !w.is_empty()).and_then(|w| w.chars().next()) else {
			log::warn!("empty query passed to search_word_match");
			return Vec::new();
		};
		let candidates = self.inner.idx.bucket(prefix);
		let idx = &self.inner.idx;
		let inner = &self.inner;

		search::run_workers(candidates.len(), worker_count, timeout, |i| {
			let entry = &idx.entries[candidates[i]];
			let score = score::score_word_match(&entry.terms, &query);
			(score >= MIN_SCORE).then(|| inner.new_result(entry, score))
		})
	}

	pub fn search_fuzzy(&self, query: &str, worker_count: usize, timeout: Duration) -> Vec<SearchResultLow> {
		const MIN_SCORE: u8 = 64;
		let query = search::normalize_query(query);
		let Some(prefix) = search::first_rune(&query) else {
			log::warn!("empty query passed to search_fuzzy");
			return Vec::new();
		};
		let candidates = self.inner.idx.bucket(prefix);
		let idx = &self.inner.idx;
		let inner = &self.inner;
		let args = FuzzyArgs::new(&query);

		search::run_workers(candidates.len(), worker_count, timeout, move |i| {
			thread_local! {
				static SCRATCH: std::cell::RefCell<Vec<u16>> = std::cell::RefCell::new(vec![0u16; 256]);
			}
			let entry = &idx.entries[candidates[i]];
			let score = SCRATCH.with(|scratch| {
				let mut scratch = scratch.borrow_mut();
				score::score_fuzzy(&entry.terms, &args, &mut scratch)
			});
			(score >= MIN_SCORE).then(|| inner.new_result(entry, score))
		})
	}

	fn search_pattern<F>(&self, worker_count: usize, timeout: Duration, matches: F) -> Vec<SearchResultLow>
	where
		F: Fn(&str) -> bool + Sync,
	{
		const MIN_SCORE: u8 = 140;
		let idx = &self.inner.idx;
		let inner = &self.inner;

		search::run_workers(idx.len(), worker_count, timeout, |i| {
			let entry = &idx.entries[i];
			let mut best = 0u8;
			for term in &entry.terms {
				if matches(term) {
					best = best.max(score::score_pattern_match(term.chars().count()));
					break;
				}
			}
			(best >= MIN_SCORE).then(|| inner.new_result(entry, best))
		})
	}

	pub fn search_glob(&self, query: &str, worker_count: usize, timeout: Duration) -> Result<Vec<SearchResultLow>> {
		let pattern = glob::Pattern::new(query).map_err(|e| Error::InvalidPattern(e.to_string()))?;
		Ok(self.search_pattern(worker_count, timeout, |term| pattern.matches(term)))
	}

	pub fn search_regex(&self, query: &str, worker_count: usize, timeout: Duration) -> Result<Vec<SearchResultLow>> {
		let anchored = format!("^{query}$");
		let re = Regex::new(&anchored).map_err(|e| Error::InvalidPattern(e.to_string()))?;
		Ok(self.search_pattern(worker_count, timeout, |term| re.is_match(term)))
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn init_logger() {
		let _ = env_logger::builder().is_test(true).try_init();
	}

	/// Builds a three-entry fixture dictionary (apple/banana/cherry, with
	/// "fruit" as a synonym for apple) backed by a plain `.dict` file, using
	/// `sametypesequence=m` so every entry decodes to a single text item.
	fn build_fixture(dir: &Path) -> Dictionary {
		let entries = [("apple", "A fruit"), ("banana", "A yellow fruit"), ("cherry", "A small red fruit")];

		let mut idx_bytes = Vec::new();
		let mut dict_bytes = Vec::new();
		let mut offsets = Vec::new();
		for (_, meaning) in &entries {
			offsets.push((dict_bytes.len() as u32, meaning.len() as u32));
			dict_bytes.extend_from_slice(meaning.as_bytes());
		}
		for (i, (word, _)) in entries.iter().enumerate() {
			let (offset, size) = offsets[i];
			idx_bytes.extend_from_slice(word.as_bytes());
			idx_bytes.push(0);
			idx_bytes.extend_from_slice(&offset.to_be_bytes());
			idx_bytes.extend_from_slice(&size.to_be_bytes());
		}

		let mut syn_bytes = Vec::new();
		syn_bytes.extend_from_slice(b"fruit\0");
		syn_bytes.extend_from_slice(&0u32.to_be_bytes());

		let ifo = format!(
			"StarDict's dict ifo file\nversion=2.4.2\nbookname=Test Dict\nwordcount=3\nsynwordcount=1\nidxfilesize={}\nsametypesequence=m\n",
			idx_bytes.len()
		);

		fs::write(dir.join("test.ifo"), ifo).expect("write ifo fixture");
		fs::write(dir.join("test.idx"), &idx_bytes).expect("write idx fixture");
		fs::write(dir.join("test.syn"), &syn_bytes).expect("write syn fixture");
		fs::write(dir.join("test.dict"), &dict_bytes).expect("write dict fixture");

		Dictionary::load(dir.to_path_buf(), "test").expect("load fixture dictionary")
	}

	#[test]
	fn exact_search_matches_synonym() {
		init_logger();
		let dir = tempfile::tempdir().expect("create temp dir");
		let dict = build_fixture(dir.path());

		let results = dict.search_exact("fruit", 2, Duration::from_secs(1));
		assert_eq!(results.len(), 1);
		assert_eq!(results[0].score, 200);
		assert_eq!(results[0].terms, vec!["apple", "fruit"]);

		let items = results[0].items().expect("decode entry payload");
		assert_eq!(items.len(), 1);
		assert_eq!(items[0].kind, b'm');
		assert_eq!(items[0].data, b"A fruit");
	}

	#[test]
	fn fuzzy_search_finds_typo_and_honors_expired_deadline() {
		init_logger();
		let dir = tempfile::tempdir().expect("create temp dir");
		let dict = build_fixture(dir.path());

		let results = dict.search_fuzzy("aple", 2, Duration::from_secs(1));
		assert!(results.iter().any(|r| r.terms.contains(&"apple".to_string())));

		let expired = dict.search_fuzzy("aple", 2, Duration::from_nanos(0));
		assert!(expired.is_empty());
	}

	#[test]
	fn regex_search_is_anchored() {
		init_logger();
		let dir = tempfile::tempdir().expect("create temp dir");
		let dict = build_fixture(dir.path());

		let results = dict.search_regex("ba.*a", 2, Duration::from_secs(1)).expect("compile pattern");
		assert_eq!(results.len(), 1);
		assert_eq!(results[0].terms, vec!["banana"]);

		let partial = dict.search_regex("an", 2, Duration::from_secs(1)).expect("compile pattern");
		assert!(partial.is_empty());
	}

	#[test]
	fn glob_search_matches_whole_term() {
		init_logger();
		let dir = tempfile::tempdir().expect("create temp dir");
		let dict = build_fixture(dir.path());

		let results = dict.search_glob("c*y", 2, Duration::from_secs(1)).expect("compile pattern");
		assert_eq!(results.len(), 1);
		assert_eq!(results[0].terms, vec!["cherry"]);
	}
}

/// Scans each path one level deep for `.ifo` files (a dictionary directory
/// directly, or one level of subdirectories each holding one dictionary),
/// and loads every non-disabled dictionary in parallel. Dictionaries whose
/// `bookname` maps to a negative value in `order` are skipped entirely;
/// load failures are logged and the dictionary is omitted from the result.
pub fn open<P: AsRef<Path>>(paths: &[P], order: &HashMap<String, i32>) -> Vec<Dictionary> {
	let mut candidates = Vec::new();
	for root in paths {
		scan_ifo_files(root.as_ref(), &mut candidates);
	}

	let mut dictionaries = Vec::with_capacity(candidates.len());
	std::thread::scope(|scope| {
		let handles: Vec<_> = candidates
			.into_iter()
			.map(|(dir, stem)| scope.spawn(move || load_one(dir, &stem, order)))
			.collect();
		for handle in handles {
			if let Some(dict) = handle.join().expect("dictionary load thread panicked") {
				dictionaries.push(dict);
			}
		}
	});
	dictionaries
}

fn load_one(dir: PathBuf, stem: &str, order: &HashMap<String, i32>) -> Option<Dictionary> {
	let ifo_path = dir.join(format!("{stem}.ifo"));
	let info = match Info::load(&ifo_path) {
		Ok(info) => info,
		Err(e) => {
			log::warn!("failed to read {}: {e}", ifo_path.display());
			return None;
		}
	};
	if order.get(info.bookname()).copied().unwrap_or(0) < 0 {
		log::debug!("dictionary {:?} disabled by order map", info.bookname());
		return None;
	}

	match Dictionary::load(dir.clone(), stem) {
		Ok(dict) => Some(dict),
		Err(e) => {
			log::warn!("failed to load dictionary {}: {e}", dir.display());
			None
		}
	}
}

fn scan_ifo_files(root: &Path, out: &mut Vec<(PathBuf, String)>) {
	let Ok(read_dir) = fs::read_dir(root) else {
		log::warn!("cannot read dictionary directory {}", root.display());
		return;
	};
	for entry in read_dir.flatten() {
		let path = entry.path();
		if path.is_dir() {
			scan_ifo_files_shallow(&path, out);
		} else if let Some(stem) = ifo_stem(&path) {
			out.push((root.to_path_buf(), stem));
		}
	}
}

fn scan_ifo_files_shallow(dir: &Path, out: &mut Vec<(PathBuf, String)>) {
	let Ok(read_dir) = fs::read_dir(dir) else {
		return;
	};
	for entry in read_dir.flatten() {
		let path = entry.path();
		if let Some(stem) = ifo_stem(&path) {
			out.push((dir.to_path_buf(), stem));
		}
	}
}

fn ifo_stem(path: &Path) -> Option<String> {
	if path.extension()?.to_str()? != "ifo" {
		return None;
	}
	Some(path.file_stem()?.to_str()?.to_owned())
}
