//! Cask-KV: a log-structured, append-only key-value storage engine in the
//! style of Bitcask.
//!
//! Values are never rewritten in place. Every put or delete is appended to
//! the active segment, and an in-memory keydir maps each key to the location
//! of its newest value. Merging folds older segments into one compact
//! segment plus a hint file that makes the next startup cheaper.
//!
//! # On-disk layout
//!
//! * `<id>.data`: a segment: concatenated entries
//!   `[crc32][timestamp][key_size][value_size][key][value]`, big-endian.
//! * `<id>.hint`: index-only companion of a merged segment:
//!   `[timestamp][key_size][value_size][offset][key]`.
//! * `<id>.merging`: present only while the merge writing `<id>` is
//!   unfinished; its output is discarded on the next open.
//! * `cask-kv.lock`: held by the engine that owns the directory.
//!
//! # Basic Usage
//!
//! ```
//! use bytes::Bytes;
//! use cask_kv::{db::Engine, option::Options};
//!
//! let mut opts = Options::default();
//! opts.dir_path = std::env::temp_dir().join("cask-kv-doc");
//! let engine = Engine::open(opts).expect("failed to open cask-kv engine");
//!
//! let key = Bytes::from("hello");
//! engine.put(key.clone(), Bytes::from("world")).expect("failed to put");
//! assert_eq!(engine.get(key.clone()).unwrap(), Some(Bytes::from("world")));
//!
//! engine.delete(key.clone()).expect("failed to delete");
//! assert_eq!(engine.get(key).unwrap(), None);
//! ```

mod data;
mod fio;
mod index;

pub mod db;
pub mod errors;
pub mod keydir;
pub mod merge;
pub mod option;
pub mod segment_table;
pub mod util;

pub use data::{
  entry::{decode_entry, decode_entry_header, Entry, EntryHeader, Position},
  hint::{HintFile, HintItem},
  segment::{ScanItem, Segment, SegmentRole},
};
pub use index::IndexUpdate;
