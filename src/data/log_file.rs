use std::path::{Path, PathBuf};

use parking_lot::Mutex;

use crate::{
  errors::{Errors, Result},
  fio::{new_io_manager, IOManager, OpenMode},
  option::IOManagerType,
};

/// An append-only file with a write cursor. Segment and hint files are both
/// built on top of it.
pub(crate) struct LogFile {
  path: PathBuf,

  /// Guards the cursor and the append it positions.
  write_off: Mutex<u64>,

  io_manager: Box<dyn IOManager>,
}

impl LogFile {
  pub(crate) fn create<P>(path: P) -> Result<Self>
  where
    P: AsRef<Path>,
  {
    let io_manager = new_io_manager(path.as_ref(), IOManagerType::StandardFileIO, OpenMode::CreateNew)?;
    Ok(LogFile {
      path: path.as_ref().to_path_buf(),
      write_off: Mutex::new(0),
      io_manager,
    })
  }

  pub(crate) fn open_readonly<P>(path: P, io_type: IOManagerType) -> Result<Self>
  where
    P: AsRef<Path>,
  {
    let io_manager = new_io_manager(path.as_ref(), io_type, OpenMode::ReadOnly)?;
    let size = io_manager.size()?;
    Ok(LogFile {
      path: path.as_ref().to_path_buf(),
      write_off: Mutex::new(size),
      io_manager,
    })
  }

  pub(crate) fn path(&self) -> &Path {
    &self.path
  }

  pub(crate) fn write_off(&self) -> u64 {
    *self.write_off.lock()
  }

  /// Writes `buf` at the cursor and returns the offset it starts at.
  pub(crate) fn append(&self, buf: &[u8]) -> Result<u64> {
    let mut write_off = self.write_off.lock();
    let offset = *write_off;
    self.io_manager.write(buf, offset)?;
    *write_off += buf.len() as u64;
    Ok(offset)
  }

  /// Reads exactly `size` bytes at `offset`; a short read is EOF.
  pub(crate) fn read_at(&self, size: usize, offset: u64) -> Result<Vec<u8>> {
    let mut buf = vec![0u8; size];
    let n = self.io_manager.read(&mut buf, offset)?;
    if n < size {
      return Err(Errors::ReadDataFileEOF);
    }
    Ok(buf)
  }

  pub(crate) fn sync(&self) -> Result<()> {
    self.io_manager.sync()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_log_file_append_read() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("log");

    let file = LogFile::create(&path).unwrap();
    assert_eq!(file.append(b"aaaa").unwrap(), 0);
    assert_eq!(file.append(b"bb").unwrap(), 4);
    assert_eq!(file.write_off(), 6);
    assert_eq!(file.read_at(2, 4).unwrap(), b"bb".to_vec());
    assert!(matches!(file.read_at(4, 4), Err(Errors::ReadDataFileEOF)));
    file.sync().unwrap();

    let ro = LogFile::open_readonly(&path, IOManagerType::MemoryMap).unwrap();
    assert_eq!(ro.write_off(), 6);
    assert_eq!(ro.read_at(6, 0).unwrap(), b"aaaabb".to_vec());
  }
}
