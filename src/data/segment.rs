use std::path::{Path, PathBuf};

use derive_more::Display;
use log::debug;
use parking_lot::RwLock;

use crate::{
  errors::{Errors, Result},
  option::IOManagerType,
};

use super::{
  entry::{decode_entry, decode_entry_header, Entry, Position, ENTRY_HEADER_SIZE},
  log_file::LogFile,
};

pub const DATA_FILE_NAME_SUFFIX: &str = ".data";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum SegmentRole {
  #[display("active")]
  Active,

  #[display("older")]
  Older,

  #[display("merged")]
  Merged,
}

/// One data segment: a concatenation of entries in write order.
pub struct Segment {
  id: u64,
  dir: PathBuf,
  role: RwLock<SegmentRole>,
  file: LogFile,
}

/// What a sequential scan found at an offset.
pub enum ScanItem {
  Entry { entry: Entry, size: u64 },

  /// Clean end of the segment, or a partial record left by a crash.
  End,
}

impl Segment {
  pub fn create_active<P>(dir: P, id: u64) -> Result<Self>
  where
    P: AsRef<Path>,
  {
    Self::create(dir, id, SegmentRole::Active)
  }

  pub fn create_merged<P>(dir: P, id: u64) -> Result<Self>
  where
    P: AsRef<Path>,
  {
    Self::create(dir, id, SegmentRole::Merged)
  }

  fn create<P>(dir: P, id: u64, role: SegmentRole) -> Result<Self>
  where
    P: AsRef<Path>,
  {
    let file = LogFile::create(get_data_file_name(&dir, id))?;
    debug!("created {} segment {}", role, id);
    Ok(Segment {
      id,
      dir: dir.as_ref().to_path_buf(),
      role: RwLock::new(role),
      file,
    })
  }

  pub fn open_readonly<P>(dir: P, id: u64, io_type: IOManagerType) -> Result<Self>
  where
    P: AsRef<Path>,
  {
    let file = LogFile::open_readonly(get_data_file_name(&dir, id), io_type)?;
    Ok(Segment {
      id,
      dir: dir.as_ref().to_path_buf(),
      role: RwLock::new(SegmentRole::Older),
      file,
    })
  }

  pub fn id(&self) -> u64 {
    self.id
  }

  pub fn dir(&self) -> &Path {
    &self.dir
  }

  pub fn path(&self) -> &Path {
    self.file.path()
  }

  pub fn role(&self) -> SegmentRole {
    *self.role.read()
  }

  pub fn set_role(&self, role: SegmentRole) {
    *self.role.write() = role;
  }

  pub fn write_off(&self) -> u64 {
    self.file.write_off()
  }

  /// Appends `entry` and returns the offset it starts at. Only active and
  /// merged segments accept appends.
  pub fn append(&self, entry: &Entry) -> Result<u64> {
    if self.role() == SegmentRole::Older {
      return Err(Errors::SegmentIsReadOnly(self.id));
    }
    self.file.append(&entry.encode())
  }

  pub fn read_at(&self, size: usize, offset: u64) -> Result<Vec<u8>> {
    self.file.read_at(size, offset)
  }

  /// Reads the entry `pos` points at, given the length of its key.
  pub fn read_entry(&self, key_len: usize, pos: &Position) -> Result<Entry> {
    let buf = self.read_at(pos.entry_size(key_len) as usize, pos.offset)?;
    decode_entry(&buf)
  }

  /// Reads and verifies the entry starting at `offset` during a sequential
  /// scan.
  pub fn scan_entry_at(&self, offset: u64) -> Result<ScanItem> {
    let header_buf = match self.read_at(ENTRY_HEADER_SIZE, offset) {
      Ok(buf) => buf,
      Err(Errors::ReadDataFileEOF) => return Ok(ScanItem::End),
      Err(e) => return Err(e),
    };
    let header = decode_entry_header(&header_buf)?;
    let size = header.entry_size();
    // a torn or garbled header may declare more than the file holds
    if offset + size > self.write_off() {
      return Ok(ScanItem::End);
    }
    let buf = match self.read_at(size as usize, offset) {
      Ok(buf) => buf,
      Err(Errors::ReadDataFileEOF) => return Ok(ScanItem::End),
      Err(e) => return Err(e),
    };
    let entry = decode_entry(&buf)?;
    Ok(ScanItem::Entry { entry, size })
  }

  pub fn sync(&self) -> Result<()> {
    self.file.sync()
  }
}

pub fn get_data_file_name<P>(dir_path: P, file_id: u64) -> PathBuf
where
  P: AsRef<Path>,
{
  let name = format!("{:013}", file_id) + DATA_FILE_NAME_SUFFIX;
  dir_path.as_ref().join(name)
}
