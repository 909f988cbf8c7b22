use std::{io, path::PathBuf, result};

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Errors {
  #[error("failed to open data file")]
  FailedToOpenDataFile(#[source] io::Error),

  #[error("failed to read from data file")]
  FailedToReadFromDataFile(#[source] io::Error),

  #[error("failed to write to data file")]
  FailedToWriteToDataFile(#[source] io::Error),

  #[error("failed to sync data file")]
  FailedToSyncDataFile(#[source] io::Error),

  #[error("failed to remove data file")]
  FailedToRemoveDataFile(#[source] io::Error),

  #[error("file {0:?} already exists")]
  FileAlreadyExists(PathBuf),

  #[error("read data file eof")]
  ReadDataFileEOF,

  #[error("invalid crc value, entry maybe corrupted (expected {expected:#010x}, actual {actual:#010x})")]
  InvalidEntryCrc { expected: u32, actual: u32 },

  #[error("entry header length doesn't match: {0}")]
  InvalidEntryHeaderLength(usize),

  #[error("hint item header length doesn't match: {0}")]
  InvalidHintItemHeaderLength(usize),

  #[error("malformed entry: header declares {declared} bytes but only {available} are present")]
  MalformedEntry { declared: u64, available: u64 },

  #[error("the key is empty")]
  KeyIsEmpty,

  #[error("key is too large: {0} bytes")]
  KeyTooLarge(usize),

  #[error("value is too large: {0} bytes")]
  ValueTooLarge(usize),

  #[error("segment {0} is read only")]
  SegmentIsReadOnly(u64),

  #[error("segment {0} not found")]
  SegmentNotFound(u64),

  #[error("database dir path can not be empty")]
  DirPathIsEmpty,

  #[error("database path {0:?} is not a directory")]
  DirPathIsNotDirectory(PathBuf),

  #[error("database data file size must be greater than 0")]
  DataFileSizeTooSmall,

  #[error("invalid merge threshold, must between 0 and 1")]
  InvalidMergeRatio,

  #[error("failed to create the database directory")]
  FailedToCreateDatabaseDir(#[source] io::Error),

  #[error("failed to read the database directory")]
  FailedToReadDatabaseDir(#[source] io::Error),

  #[error("the database directory is used by another process")]
  DatabaseIsUsing,

  #[error("failed to release the database directory lock")]
  FailedToUnlockDatabaseDir(#[source] io::Error),

  #[error("the engine is closed")]
  EngineIsClosed,

  #[error("merge is in progress, try again later")]
  MergeInProgress,

  #[error("the merge threshold is unreached")]
  MergeThresholdUnreached,

  #[error("disk space is not enough for merge")]
  MergeNoEnoughSpace,

  #[error("merge was aborted")]
  MergeAborted,
}

impl Errors {
  /// Whether the error means bytes on disk are not what was written.
  pub fn is_corruption(&self) -> bool {
    matches!(
      self,
      Errors::InvalidEntryCrc { .. }
        | Errors::InvalidEntryHeaderLength(_)
        | Errors::InvalidHintItemHeaderLength(_)
        | Errors::MalformedEntry { .. }
    )
  }
}

pub type Result<T> = result::Result<T, Errors>;
