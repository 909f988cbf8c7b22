use std::{fs::OpenOptions, path::Path};

use log::error;
use memmap2::Mmap;

use crate::errors::{Errors, Result};

use super::IOManager;

/// Read-only memory map over an immutable segment.
pub struct MMapIO {
  map: Mmap,
}

impl MMapIO {
  pub fn new<P>(file_name: P) -> Result<Self>
  where
    P: AsRef<Path>,
  {
    let file = match OpenOptions::new().read(true).open(file_name) {
      Ok(file) => file,
      Err(e) => {
        error!("failed to open data file error: {}", e);
        return Err(Errors::FailedToOpenDataFile(e));
      }
    };
    // SAFETY: segments handed to a map are never written again.
    match unsafe { Mmap::map(&file) } {
      Ok(map) => Ok(MMapIO { map }),
      Err(e) => {
        error!("failed to map data file error: {}", e);
        Err(Errors::FailedToOpenDataFile(e))
      }
    }
  }
}

impl IOManager for MMapIO {
  fn read(&self, buf: &mut [u8], offset: u64) -> Result<usize> {
    let len = self.map.len() as u64;
    if offset >= len {
      return Ok(0);
    }
    let end = (offset + buf.len() as u64).min(len);
    let val = &self.map[offset as usize..end as usize];
    buf[..val.len()].copy_from_slice(val);
    Ok(val.len())
  }

  fn write(&self, _buf: &[u8], _offset: u64) -> Result<usize> {
    Err(Errors::FailedToWriteToDataFile(std::io::Error::new(
      std::io::ErrorKind::PermissionDenied,
      "memory mapped file is read only",
    )))
  }

  fn sync(&self) -> Result<()> {
    Ok(())
  }

  fn size(&self) -> Result<u64> {
    Ok(self.map.len() as u64)
  }
}

#[cfg(test)]
mod tests {
  use crate::fio::file_io::FileIO;

  use super::*;

  #[test]
  fn test_mmap_read() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("mmap-test.data");

    // file is empty
    let fio = FileIO::create_new(&path).unwrap();
    let mmap_io1 = MMapIO::new(&path).unwrap();
    assert_eq!(mmap_io1.size().unwrap(), 0);
    let mut buf1 = [0u8; 10];
    assert_eq!(mmap_io1.read(&mut buf1, 0).unwrap(), 0);

    fio.write(b"hello world", 0).unwrap();
    fio.write(b"good morning", 11).unwrap();
    fio.write(b"seeyou again", 23).unwrap();
    fio.sync().unwrap();

    // file is not empty
    let mmap_io2 = MMapIO::new(&path).unwrap();
    assert_eq!(mmap_io2.size().unwrap(), 35);

    let mut buf2 = [0u8; 12];
    assert_eq!(mmap_io2.read(&mut buf2, 11).unwrap(), 12);
    assert_eq!(&buf2, b"good morning");

    let mut buf3 = [0u8; 20];
    assert_eq!(mmap_io2.read(&mut buf3, 23).unwrap(), 12);
    assert_eq!(&buf3[..12], b"seeyou again");
  }

  #[test]
  fn test_mmap_write_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("mmap-ro.data");
    FileIO::create_new(&path).unwrap();

    let mmap_io = MMapIO::new(&path).unwrap();
    assert!(mmap_io.write(b"nope", 0).is_err());
    assert!(mmap_io.sync().is_ok());
  }
}
