use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use crate::error::{Error, Result};

pub const OPT_BOOKNAME: &str = "bookname";
pub const OPT_WORDCOUNT: &str = "wordcount";
pub const OPT_SAMETYPESEQUENCE: &str = "sametypesequence";
pub const OPT_IDXFILESIZE: &str = "idxfilesize";
pub const OPT_IDXOFFSETBITS: &str = "idxoffsetbits";

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Version {
	V242,
	V300,
}

impl Version {
	fn parse(value: &str) -> Result<Version> {
		match value {
			"2.4.2" => Ok(Version::V242),
			"3.0.0" => Ok(Version::V300),
			_ => Err(Error::InvalidVersion(value.to_owned())),
		}
	}
}

/// Parsed `.ifo` metadata: a key/value option map plus the two fields the
/// rest of the engine needs to make layout decisions (`version`, `is64`).
///
/// bookname=      // required
/// wordcount=     // required
/// synwordcount=  // required if ".syn" file exists.
/// idxfilesize=   // required
/// idxoffsetbits= // New in 3.0.0
/// sametypesequence= // very important.
#[derive(Clone, Debug)]
pub struct Info {
	pub options: HashMap<String, String>,
	pub version: Version,
	pub is64: bool,
}

impl Info {
	pub fn load(path: &Path) -> Result<Info> {
		let file = File::open(path).map_err(|e| Error::FailedOpenFile("ifo", e))?;
		let mut lines = BufReader::new(file).lines();

		// line 1: magic banner, ignored.
		lines
			.next()
			.ok_or(Error::InvalidIfoValue("missing banner line"))?
			.map_err(|e| Error::FailedOpenFile("ifo", e))?;

		let version_line = lines
			.next()
			.ok_or(Error::InvalidIfoValue("missing version line"))?
			.map_err(|e| Error::FailedOpenFile("ifo", e))?;
		let (key, value) = decode_option(&version_line)?;
		if key != "version" {
			return Err(Error::InvalidIfoValue("version must be the second line"));
		}
		let version = Version::parse(value)?;

		let mut options = HashMap::new();
		for line in lines {
			let line = line.map_err(|e| Error::FailedOpenFile("ifo", e))?;
			if line.trim().is_empty() {
				continue;
			}
			let (key, value) = decode_option(&line)?;
			options.insert(key.to_owned(), value.to_owned());
		}

		if !options.contains_key(OPT_BOOKNAME) {
			return Err(Error::InvalidIfoValue(OPT_BOOKNAME));
		}
		if !options.contains_key(OPT_WORDCOUNT) {
			return Err(Error::InvalidIfoValue(OPT_WORDCOUNT));
		}

		let is64 = options
			.get(OPT_IDXOFFSETBITS)
			.map(|v| v == "64")
			.unwrap_or(false);

		Ok(Info {
			options,
			version,
			is64,
		})
	}

	pub fn get(&self, key: &str) -> Option<&str> {
		self.options.get(key).map(String::as_str)
	}

	pub fn bookname(&self) -> &str {
		self.get(OPT_BOOKNAME).unwrap_or_default()
	}

	pub fn wordcount(&self) -> u64 {
		self.get(OPT_WORDCOUNT)
			.and_then(|v| v.parse().ok())
			.unwrap_or(0)
	}

	pub fn idxfilesize(&self) -> Option<u64> {
		self.get(OPT_IDXFILESIZE).and_then(|v| v.parse().ok())
	}

	pub fn sametypesequence(&self) -> Option<&str> {
		self.get(OPT_SAMETYPESEQUENCE)
	}
}

fn decode_option(line: &str) -> Result<(&str, &str)> {
	match line.find('=') {
		Some(id) => Ok((&line[..id], &line[id + 1..])),
		None => Err(Error::InvalidIfoValue("line missing '='")),
	}
}
