use std::{
  fs::{File, OpenOptions},
  io::ErrorKind,
  os::unix::fs::FileExt,
  path::Path,
};

use log::error;

use crate::errors::{Errors, Result};

use super::IOManager;

/// Standard file I/O built on positioned reads and writes, so concurrent
/// readers never share a seek cursor.
pub struct FileIO {
  fd: File,
}

impl FileIO {
  pub fn create_new<P>(file_name: P) -> Result<Self>
  where
    P: AsRef<Path>,
  {
    match OpenOptions::new()
      .read(true)
      .write(true)
      .create_new(true)
      .open(file_name.as_ref())
    {
      Ok(fd) => Ok(FileIO { fd }),
      Err(e) if e.kind() == ErrorKind::AlreadyExists => Err(Errors::FileAlreadyExists(
        file_name.as_ref().to_path_buf(),
      )),
      Err(e) => {
        error!("failed to create data file error: {}", e);
        Err(Errors::FailedToOpenDataFile(e))
      }
    }
  }

  pub fn open_readonly<P>(file_name: P) -> Result<Self>
  where
    P: AsRef<Path>,
  {
    match OpenOptions::new().read(true).open(file_name) {
      Ok(fd) => Ok(FileIO { fd }),
      Err(e) => {
        error!("failed to open data file error: {}", e);
        Err(Errors::FailedToOpenDataFile(e))
      }
    }
  }
}

impl IOManager for FileIO {
  fn read(&self, buf: &mut [u8], offset: u64) -> Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
      match self.fd.read_at(&mut buf[filled..], offset + filled as u64) {
        Ok(0) => break,
        Ok(n) => filled += n,
        Err(e) if e.kind() == ErrorKind::Interrupted => continue,
        Err(e) => {
          error!("read from data file error: {}", e);
          return Err(Errors::FailedToReadFromDataFile(e));
        }
      }
    }
    Ok(filled)
  }

  fn write(&self, buf: &[u8], offset: u64) -> Result<usize> {
    if let Err(e) = self.fd.write_all_at(buf, offset) {
      error!("write to data file error: {}", e);
      return Err(Errors::FailedToWriteToDataFile(e));
    }
    Ok(buf.len())
  }

  fn sync(&self) -> Result<()> {
    if let Err(e) = self.fd.sync_all() {
      error!("failed to sync data file: {}", e);
      return Err(Errors::FailedToSyncDataFile(e));
    }
    Ok(())
  }

  fn size(&self) -> Result<u64> {
    self
      .fd
      .metadata()
      .map(|meta| meta.len())
      .map_err(Errors::FailedToReadFromDataFile)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_file_io_write_read() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("a.data");

    let fio = FileIO::create_new(&path).unwrap();
    assert_eq!(fio.write(b"key-a", 0).unwrap(), 5);
    assert_eq!(fio.write(b"key-b", 5).unwrap(), 5);
    assert_eq!(fio.size().unwrap(), 10);

    let mut buf = [0u8; 5];
    assert_eq!(fio.read(&mut buf, 5).unwrap(), 5);
    assert_eq!(&buf, b"key-b");

    // short read at the tail
    let mut buf = [0u8; 8];
    assert_eq!(fio.read(&mut buf, 6).unwrap(), 4);
    assert_eq!(fio.read(&mut buf, 10).unwrap(), 0);
  }

  #[test]
  fn test_file_io_create_existing() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("b.data");

    assert!(FileIO::create_new(&path).is_ok());
    let res = FileIO::create_new(&path);
    assert!(matches!(res, Err(Errors::FileAlreadyExists(p)) if p == path));
  }

  #[test]
  fn test_file_io_readonly() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("c.data");

    assert!(matches!(
      FileIO::open_readonly(&path),
      Err(Errors::FailedToOpenDataFile(_))
    ));

    let fio = FileIO::create_new(&path).unwrap();
    fio.write(b"hello world", 0).unwrap();
    fio.sync().unwrap();

    let ro = FileIO::open_readonly(&path).unwrap();
    assert!(ro.write(b"x", 11).is_err());
    let mut buf = [0u8; 11];
    assert_eq!(ro.read(&mut buf, 0).unwrap(), 11);
    assert_eq!(&buf, b"hello world");
  }
}
