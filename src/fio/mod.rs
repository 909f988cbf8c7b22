pub mod file_io;
pub mod mmap;

use std::path::Path;

use crate::{errors::Result, option::IOManagerType};

use self::{file_io::FileIO, mmap::MMapIO};

/// Abstract positioned I/O over one file.
pub trait IOManager: Sync + Send {
  /// Reads up to `buf.len()` bytes at `offset`, returning how many were read.
  /// A short count means end-of-file was reached.
  fn read(&self, buf: &mut [u8], offset: u64) -> Result<usize>;

  fn write(&self, buf: &[u8], offset: u64) -> Result<usize>;

  fn sync(&self) -> Result<()>;

  fn size(&self) -> Result<u64>;
}

/// How a file is opened by [`new_io_manager`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenMode {
  /// Exclusively create a new read-write file; fails if it already exists.
  CreateNew,

  ReadOnly,
}

pub fn new_io_manager(
  filename: &Path,
  io_type: IOManagerType,
  mode: OpenMode,
) -> Result<Box<dyn IOManager>> {
  match (io_type, mode) {
    (IOManagerType::StandardFileIO, OpenMode::CreateNew) => Ok(Box::new(FileIO::create_new(filename)?)),
    (IOManagerType::StandardFileIO, OpenMode::ReadOnly) => Ok(Box::new(FileIO::open_readonly(filename)?)),
    // a map never grows, so a writable file always gets standard I/O
    (IOManagerType::MemoryMap, OpenMode::CreateNew) => Ok(Box::new(FileIO::create_new(filename)?)),
    (IOManagerType::MemoryMap, OpenMode::ReadOnly) => Ok(Box::new(MMapIO::new(filename)?)),
  }
}
