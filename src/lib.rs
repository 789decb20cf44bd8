//! A Rust StarDict dictionary engine: `.ifo`/`.idx`/`.syn`/`.dict`(`.dz`)
//! loading, an in-memory prefix-bucketed index, and six search strategies
//! (exact, starts-with, word-match, fuzzy, glob, regex) dispatched across a
//! worker pool under a wall-clock deadline.

pub mod dict;
pub mod dictionary;
pub mod dictzip;
pub mod entry;
pub mod error;
pub mod idx;
pub mod ifo;
pub mod score;
pub mod search;

pub use dictionary::{open, Dictionary, SearchResultLow};
pub use entry::Item;
pub use error::{Error, Result};
pub use ifo::Info;
