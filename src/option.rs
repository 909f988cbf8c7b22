use lazy_static::lazy_static;
use std::path::PathBuf;

lazy_static! {
  pub static ref DEFAULT_DIR_PATH: PathBuf = std::env::temp_dir().join("cask-kv");
}

#[derive(Debug, Clone)]
pub struct Options {
  /// Directory that owns every segment, hint and lock file of one engine.
  pub dir_path: PathBuf,

  /// Once the active segment reaches this size, the next write rotates it.
  pub data_file_size: u64,

  pub sync_writes: bool,

  /// Sync the active segment after this many appended bytes, 0 disables it.
  pub bytes_per_sync: usize,

  pub index_type: IndexType,

  /// Scan older segments through memory maps while rebuilding the keydir.
  pub mmap_at_startup: bool,

  /// Reclaimable/total ratio below which `merge` refuses to run.
  pub file_merge_threshold: f32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IndexType {
  BTree,

  SkipList,
}

impl Default for Options {
  fn default() -> Self {
    Self {
      dir_path: DEFAULT_DIR_PATH.clone(),
      data_file_size: 256 * 1024 * 1024, // 256MB
      sync_writes: false,
      bytes_per_sync: 0,
      index_type: IndexType::BTree,
      mmap_at_startup: true,
      file_merge_threshold: 0.0,
    }
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IOManagerType {
  StandardFileIO,

  MemoryMap,
}
