use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
	#[error("dict path is not a directory")]
	InvalidDictPath,

	#[error("no {0} file found")]
	NoFileFound(&'static str),

	#[error("failed open {0} file")]
	FailedOpenFile(&'static str, std::io::Error),

	#[error("invalid version {0:?}, expected \"2.4.2\" or \"3.0.0\"")]
	InvalidVersion(String),

	#[error("invalid value {0} in ifo")]
	InvalidIfoValue(&'static str),

	#[error("invalid idx element: {0}")]
	InvalidIdxElement(&'static str),

	#[error("invalid idx block: {0}")]
	InvalidIdxBlock(String),

	#[error("invalid syn index for {0}")]
	InvalidSynIndex(String),

	#[error("invalid dict content")]
	InvalidDictContent,

	#[error("invalid dict file")]
	InvalidDict,

	#[error("invalid dict field: {0}")]
	FailedParseDictHeader(&'static str),

	#[error("malformed dictzip header: {0}")]
	MalformedHeader(&'static str),

	#[error("unsupported random-access version {0}")]
	UnsupportedRaVersion(u16),

	#[error("truncated {0}")]
	Truncated(&'static str),

	#[error("invalid search pattern: {0}")]
	InvalidPattern(String),

	#[error("error when reading: {0}")]
	FailedReadHeader(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
