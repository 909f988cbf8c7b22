use std::{
  fs::{self, File},
  path::{Path, PathBuf},
};

use log::{error, warn};

use crate::{
  data::segment::DATA_FILE_NAME_SUFFIX,
  errors::{Errors, Result},
};

/// Size in bytes of everything under `dir_path`.
pub fn dir_disk_size<P>(dir_path: P) -> u64
where
  P: AsRef<Path>,
{
  match fs_extra::dir::get_size(dir_path) {
    Ok(size) => size,
    Err(e) => {
      warn!("failed to get dir size: {e}");
      0
    }
  }
}

/// Free space on the filesystem holding `dir_path`.
pub fn available_disk_space<P>(dir_path: P) -> u64
where
  P: AsRef<Path>,
{
  match fs2::available_space(dir_path) {
    Ok(size) => size,
    Err(e) => {
      warn!("failed to get available disk space: {e}");
      0
    }
  }
}

/// Lists the ids of every data segment in `dir_path`, ascending.
pub fn list_segment_ids<P>(dir_path: P) -> Result<Vec<u64>>
where
  P: AsRef<Path>,
{
  let mut ids = Vec::new();
  for file in list_dir(&dir_path)? {
    if !file.is_file() {
      continue;
    }
    let Some(file_name) = file.file_name().and_then(|n| n.to_str()) else {
      continue;
    };
    if let Some(id) = parse_file_id(file_name, DATA_FILE_NAME_SUFFIX) {
      ids.push(id);
    }
  }
  ids.sort_unstable();
  Ok(ids)
}

/// `"0000000000042.data"` with suffix `".data"` gives `Some(42)`.
pub fn parse_file_id(file_name: &str, suffix: &str) -> Option<u64> {
  let id = file_name.strip_suffix(suffix)?;
  if id.is_empty() || !id.bytes().all(|b| b.is_ascii_digit()) {
    return None;
  }
  id.parse().ok()
}

pub(crate) fn list_dir<P>(dir_path: P) -> Result<Vec<PathBuf>>
where
  P: AsRef<Path>,
{
  let dir = match fs::read_dir(dir_path) {
    Ok(dir) => dir,
    Err(e) => {
      error!("failed to read database dir: {e}");
      return Err(Errors::FailedToReadDatabaseDir(e));
    }
  };
  let mut paths = Vec::new();
  for entry in dir {
    let entry = entry.map_err(Errors::FailedToReadDatabaseDir)?;
    paths.push(entry.path());
  }
  Ok(paths)
}

/// Makes creations, renames and removals inside `dir_path` durable.
pub fn sync_dir<P>(dir_path: P) -> Result<()>
where
  P: AsRef<Path>,
{
  File::open(dir_path)
    .and_then(|dir| dir.sync_all())
    .map_err(Errors::FailedToSyncDataFile)
}

pub(crate) fn remove_file_if_exists<P>(path: P) -> Result<()>
where
  P: AsRef<Path>,
{
  match fs::remove_file(path) {
    Ok(()) => Ok(()),
    Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
    Err(e) => {
      error!("failed to remove file: {e}");
      Err(Errors::FailedToRemoveDataFile(e))
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_parse_file_id() {
    assert_eq!(parse_file_id("0000000000042.data", ".data"), Some(42));
    assert_eq!(parse_file_id("17.data", ".data"), Some(17));
    assert_eq!(parse_file_id("0000000000042.hint", ".data"), None);
    assert_eq!(parse_file_id(".data", ".data"), None);
    assert_eq!(parse_file_id("-1.data", ".data"), None);
    assert_eq!(parse_file_id("x1.data", ".data"), None);
  }

  #[test]
  fn test_list_segment_ids() {
    let dir = tempfile::tempdir().unwrap();
    for name in ["0000000000003.data", "0000000000001.data", "0000000000003.hint", "cask-kv.lock", "notes.txt"] {
      fs::write(dir.path().join(name), b"").unwrap();
    }
    fs::create_dir(dir.path().join("0000000000009.data")).unwrap();

    assert_eq!(list_segment_ids(dir.path()).unwrap(), vec![1, 3]);
    assert!(matches!(
      list_segment_ids(dir.path().join("missing")),
      Err(Errors::FailedToReadDatabaseDir(_))
    ));
  }

  #[test]
  fn test_dir_disk_size() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("a"), vec![0u8; 100]).unwrap();
    fs::write(dir.path().join("b"), vec![0u8; 28]).unwrap();
    assert_eq!(dir_disk_size(dir.path()), 128);
    assert!(available_disk_space(dir.path()) > 0);
  }

  #[test]
  fn test_remove_file_if_exists() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("gone");
    fs::write(&path, b"x").unwrap();
    remove_file_if_exists(&path).unwrap();
    assert!(!path.exists());
    remove_file_if_exists(&path).unwrap();
    sync_dir(dir.path()).unwrap();
  }
}
