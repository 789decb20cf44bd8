//! Random-access reader for the dictzip container: a gzip file whose
//! `FEXTRA` field carries an `RA` subfield describing fixed-size
//! uncompressed blocks, each independently deflate-compressed, so that an
//! arbitrary byte range can be decompressed without reading the whole file.

use std::collections::HashMap;
use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::Path;
use std::sync::Mutex;

use byteorder::{ReadBytesExt, LE};
use inflate::inflate_bytes;

use crate::error::{Error, Result};

const GZIP_ID: u16 = 0x8b1f;
const COMPRESSION_METHOD_DEFLATE: u8 = 0x08;
const RA_ID: u16 = 0x4152; // "RA" little-endian as two bytes 'R','A'

const FLAG_FHCRC: u8 = 0b0000_0010;
const FLAG_FEXTRA: u8 = 0b0000_0100;
const FLAG_FNAME: u8 = 0b0000_1000;
const FLAG_FCOMMENT: u8 = 0b0001_0000;

/// Layouts probed in order when parsing the `RA` subfield, widest-compatible
/// first. Each candidate names the byte width of `CHLEN`/`CHCNT` and of the
/// per-block size entries that follow (tied to `chcnt_width` per the
/// specification's layout table); a candidate matches when consuming
/// exactly that many bytes accounts for the whole subfield.
struct RaLayout {
	chlen_width: usize,
	chcnt_width: usize,
	size_width: usize,
}

const RA_LAYOUTS: [RaLayout; 3] = [
	RaLayout { chlen_width: 2, chcnt_width: 2, size_width: 2 }, // canonical GNU dictzip
	RaLayout { chlen_width: 4, chcnt_width: 4, size_width: 4 },
	RaLayout { chlen_width: 2, chcnt_width: 4, size_width: 4 },
];

struct Inner {
	file: File,
	cache: HashMap<usize, Vec<u8>>,
}

/// A dictzip file opened for random-access reads over its uncompressed
/// stream. Immutable after construction; all reads are serialized through
/// an internal mutex since they share one seek pointer.
pub struct DictzipReader {
	inner: Mutex<Inner>,
	block_size: u64,
	block_count: usize,
	/// cumulative compressed-block boundaries, relative to `data_start`,
	/// length `block_count + 1`.
	block_bounds: Vec<u64>,
	data_start: u64,
}

impl DictzipReader {
	pub fn open(path: &Path) -> Result<DictzipReader> {
		let file = File::open(path).map_err(|e| Error::FailedOpenFile("dict.dz", e))?;
		Self::from_file(file)
	}

	fn from_file(mut file: File) -> Result<DictzipReader> {
		let id = file.read_u16::<LE>()?;
		if id != GZIP_ID {
			return Err(Error::MalformedHeader("bad gzip magic"));
		}
		let method = file.read_u8()?;
		if method != COMPRESSION_METHOD_DEFLATE {
			return Err(Error::MalformedHeader("unsupported compression method"));
		}
		let flags = file.read_u8()?;
		if flags & FLAG_FEXTRA == 0 {
			return Err(Error::MalformedHeader("missing FEXTRA (not a dictzip file)"));
		}
		// MTIME(4) + XFL(1) + OS(1)
		file.seek(SeekFrom::Current(6))?;

		let xlen = file.read_u16::<LE>()? as usize;
		let mut extra = vec![0u8; xlen];
		file.read_exact(&mut extra)?;
		let (block_size, sizes) = parse_ra_subfield(&extra)?;

		if flags & FLAG_FNAME != 0 {
			read_cstring(&mut file)?;
		}
		if flags & FLAG_FCOMMENT != 0 {
			read_cstring(&mut file)?;
		}
		if flags & FLAG_FHCRC != 0 {
			file.seek(SeekFrom::Current(2))?;
		}

		let data_start = file.stream_position()?;
		let block_count = sizes.len();
		let mut block_bounds = Vec::with_capacity(block_count + 1);
		let mut acc = 0u64;
		block_bounds.push(0);
		for size in &sizes {
			acc += u64::from(*size);
			block_bounds.push(acc);
		}

		Ok(DictzipReader {
			inner: Mutex::new(Inner { file, cache: HashMap::new() }),
			block_size: block_size as u64,
			block_count,
			block_bounds,
			data_start,
		})
	}

	/// Reads the uncompressed stream starting at `offset` into `buf`,
	/// returning the number of bytes copied. Returns `Ok(0)` at end of
	/// stream, matching the `std::io::Read` end-of-file convention.
	pub fn read_at(&self, buf: &mut [u8], offset: u64) -> Result<usize> {
		if buf.is_empty() {
			return Ok(0);
		}
		if self.block_size == 0 {
			return Err(Error::MalformedHeader("zero block size"));
		}
		let mut block = (offset / self.block_size) as usize;
		if block >= self.block_count {
			return Ok(0);
		}
		let mut block_offset = (offset % self.block_size) as usize;

		let mut copied = 0;
		while copied < buf.len() && block < self.block_count {
			let chunk = self.read_block(block)?;
			if block_offset >= chunk.len() {
				block += 1;
				block_offset = 0;
				continue;
			}
			let available = chunk.len() - block_offset;
			let want = buf.len() - copied;
			let take = available.min(want);
			buf[copied..copied + take].copy_from_slice(&chunk[block_offset..block_offset + take]);
			copied += take;
			block += 1;
			block_offset = 0;
		}
		Ok(copied)
	}

	fn read_block(&self, index: usize) -> Result<Vec<u8>> {
		let mut inner = self.inner.lock().expect("dictzip mutex poisoned");
		if let Some(cached) = inner.cache.get(&index) {
			return Ok(cached.clone());
		}

		let start = self.data_start + self.block_bounds[index];
		let end = self.data_start + self.block_bounds[index + 1];
		if end <= start {
			return Err(Error::Truncated("dictzip compressed block"));
		}
		inner.file.seek(SeekFrom::Start(start))?;
		let mut compressed = vec![0u8; (end - start) as usize];
		inner
			.file
			.read_exact(&mut compressed)
			.map_err(|_| Error::Truncated("dictzip compressed block"))?;

		let decompressed =
			inflate_bytes(&compressed).map_err(|_| Error::MalformedHeader("deflate error"))?;
		inner.cache.insert(index, decompressed.clone());
		Ok(decompressed)
	}
}

fn parse_ra_subfield(extra: &[u8]) -> Result<(usize, Vec<u32>)> {
	let mut pos = 0;
	while pos + 4 <= extra.len() {
		let si1 = extra[pos];
		let si2 = extra[pos + 1];
		let sub_len = u16::from_le_bytes([extra[pos + 2], extra[pos + 3]]) as usize;
		pos += 4;
		if pos + sub_len > extra.len() {
			return Err(Error::MalformedHeader("subfield length overruns FEXTRA"));
		}
		let sub = &extra[pos..pos + sub_len];
		if u16::from_le_bytes([si1, si2]) == RA_ID {
			return parse_ra_body(sub);
		}
		pos += sub_len;
	}
	Err(Error::MalformedHeader("no RA subfield present"))
}

fn parse_ra_body(sub: &[u8]) -> Result<(usize, Vec<u32>)> {
	if sub.len() < 2 {
		return Err(Error::MalformedHeader("RA subfield too short"));
	}
	let version = u16::from_le_bytes([sub[0], sub[1]]);
	if version != 1 {
		return Err(Error::UnsupportedRaVersion(version));
	}

	for layout in RA_LAYOUTS.iter() {
		let header_len = 2 + layout.chlen_width + layout.chcnt_width;
		if sub.len() < header_len {
			continue;
		}
		let chlen = read_uint(&sub[2..2 + layout.chlen_width]);
		let chcnt = read_uint(&sub[2 + layout.chlen_width..header_len]) as usize;
		let sizes_len = chcnt * layout.size_width;
		if sub.len() != header_len + sizes_len {
			continue;
		}
		let mut sizes = Vec::with_capacity(chcnt);
		let mut off = header_len;
		for _ in 0..chcnt {
			sizes.push(read_uint(&sub[off..off + layout.size_width]) as u32);
			off += layout.size_width;
		}
		return Ok((chlen as usize, sizes));
	}
	Err(Error::MalformedHeader("no RA layout matches subfield length"))
}

fn read_uint(bytes: &[u8]) -> u64 {
	match bytes.len() {
		2 => u16::from_le_bytes([bytes[0], bytes[1]]) as u64,
		4 => u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]) as u64,
		_ => unreachable!("only 2- and 4-byte RA fields are probed"),
	}
}

fn read_cstring(file: &mut File) -> Result<()> {
	let mut byte = [0u8; 1];
	loop {
		file.read_exact(&mut byte)?;
		if byte[0] == 0 {
			return Ok(());
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::io::Write;

	/// Encodes `data` as a single raw-deflate stored (uncompressed) block:
	/// BFINAL=1, BTYPE=00, byte-aligned LEN/NLEN, then the literal bytes.
	/// Every conforming inflate implementation must support stored blocks,
	/// so this sidesteps needing an actual deflate encoder for fixtures.
	fn stored_block(data: &[u8]) -> Vec<u8> {
		let len = data.len() as u16;
		let mut out = vec![0x01u8];
		out.extend_from_slice(&len.to_le_bytes());
		out.extend_from_slice(&(!len).to_le_bytes());
		out.extend_from_slice(data);
		out
	}

	/// Builds a minimal dictzip file: two 8-byte blocks, layout 1 (2-byte
	/// `CHLEN`/`CHCNT`/size entries, the canonical GNU dictzip layout).
	fn build_dictzip(block_a: &[u8], block_b: &[u8]) -> Vec<u8> {
		let compressed_a = stored_block(block_a);
		let compressed_b = stored_block(block_b);

		let mut ra_body = Vec::new();
		ra_body.extend_from_slice(&1u16.to_le_bytes()); // version
		ra_body.extend_from_slice(&(block_a.len() as u16).to_le_bytes()); // CHLEN
		ra_body.extend_from_slice(&2u16.to_le_bytes()); // CHCNT
		ra_body.extend_from_slice(&(compressed_a.len() as u16).to_le_bytes());
		ra_body.extend_from_slice(&(compressed_b.len() as u16).to_le_bytes());

		let mut extra = Vec::new();
		extra.push(b'R');
		extra.push(b'A');
		extra.extend_from_slice(&(ra_body.len() as u16).to_le_bytes());
		extra.extend_from_slice(&ra_body);

		let mut file = Vec::new();
		file.extend_from_slice(&[0x1f, 0x8b]); // gzip magic
		file.push(COMPRESSION_METHOD_DEFLATE);
		file.push(FLAG_FEXTRA);
		file.extend_from_slice(&[0, 0, 0, 0]); // MTIME
		file.push(0); // XFL
		file.push(0xff); // OS
		file.extend_from_slice(&(extra.len() as u16).to_le_bytes());
		file.extend_from_slice(&extra);
		file.extend_from_slice(&compressed_a);
		file.extend_from_slice(&compressed_b);
		file
	}

	#[test]
	fn round_trips_across_block_boundary() {
		let bytes = build_dictzip(b"abcdefgh", b"ijklmnop");
		let mut tmp = tempfile::NamedTempFile::new().expect("create temp file");
		tmp.write_all(&bytes).expect("write fixture");
		tmp.flush().expect("flush fixture");

		let reader = DictzipReader::open(tmp.path()).expect("open dictzip fixture");
		assert_eq!(reader.block_size, 8);
		assert_eq!(reader.block_count, 2);

		let mut buf = [0u8; 6];
		let n = reader.read_at(&mut buf, 6).expect("read across block boundary");
		assert_eq!(n, 6);
		assert_eq!(&buf, b"ghijkl");

		let mut whole = [0u8; 16];
		let n = reader.read_at(&mut whole, 0).expect("read whole stream");
		assert_eq!(n, 16);
		assert_eq!(&whole, b"abcdefghijklmnop");
	}

	#[test]
	fn read_at_past_end_returns_zero() {
		let bytes = build_dictzip(b"abcdefgh", b"ijklmnop");
		let mut tmp = tempfile::NamedTempFile::new().expect("create temp file");
		tmp.write_all(&bytes).expect("write fixture");
		tmp.flush().expect("flush fixture");

		let reader = DictzipReader::open(tmp.path()).expect("open dictzip fixture");
		let mut buf = [0u8; 4];
		let n = reader.read_at(&mut buf, 16).expect("read past end");
		assert_eq!(n, 0);
	}

	#[test]
	fn rejects_non_gzip_file() {
		let mut tmp = tempfile::NamedTempFile::new().expect("create temp file");
		tmp.write_all(b"not a gzip file at all").expect("write fixture");
		tmp.flush().expect("flush fixture");

		let err = DictzipReader::open(tmp.path()).unwrap_err();
		assert!(matches!(err, Error::MalformedHeader(_)));
	}
}
