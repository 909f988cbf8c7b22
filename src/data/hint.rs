use std::path::{Path, PathBuf};

use bytes::{Buf, BufMut, BytesMut};

use crate::{
  errors::{Errors, Result},
  option::IOManagerType,
};

use super::{entry::Entry, log_file::LogFile};

pub const HINT_FILE_NAME_SUFFIX: &str = ".hint";

/// timestamp + key_size + value_size + offset
pub const HINT_ITEM_HEADER_SIZE: usize = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HintItemHeader {
  pub timestamp: u32,
  pub key_size: u32,
  pub value_size: u32,
  pub offset: u64,
}

impl HintItemHeader {
  pub fn item_size(&self) -> u64 {
    HINT_ITEM_HEADER_SIZE as u64 + self.key_size as u64
  }
}

/// Index-only copy of an entry that was written to a merged segment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HintItem {
  pub timestamp: u32,
  pub value_size: u32,
  pub offset: u64,
  pub key: Vec<u8>,
}

impl HintItem {
  /// Hint for `entry`, stored at `offset` of the paired segment.
  pub fn from_entry(entry: &Entry, offset: u64) -> Self {
    HintItem {
      timestamp: entry.timestamp,
      value_size: entry.value.len() as u32,
      offset,
      key: entry.key.clone(),
    }
  }

  /// `[timestamp:4][key_size:4][value_size:4][offset:8][key]`, big-endian.
  pub fn encode(&self) -> Vec<u8> {
    let mut buf = BytesMut::with_capacity(HINT_ITEM_HEADER_SIZE + self.key.len());
    buf.put_u32(self.timestamp);
    buf.put_u32(self.key.len() as u32);
    buf.put_u32(self.value_size);
    buf.put_u64(self.offset);
    buf.extend_from_slice(&self.key);
    buf.to_vec()
  }
}

pub fn decode_hint_item_header(buf: &[u8]) -> Result<HintItemHeader> {
  if buf.len() != HINT_ITEM_HEADER_SIZE {
    return Err(Errors::InvalidHintItemHeaderLength(buf.len()));
  }
  let mut buf = buf;
  Ok(HintItemHeader {
    timestamp: buf.get_u32(),
    key_size: buf.get_u32(),
    value_size: buf.get_u32(),
    offset: buf.get_u64(),
  })
}

/// Companion of a merged segment, sharing its id.
pub struct HintFile {
  id: u64,
  file: LogFile,
}

impl HintFile {
  pub fn create<P>(dir: P, id: u64) -> Result<Self>
  where
    P: AsRef<Path>,
  {
    let file = LogFile::create(get_hint_file_name(dir, id))?;
    Ok(HintFile { id, file })
  }

  pub fn open_readonly<P>(dir: P, id: u64) -> Result<Self>
  where
    P: AsRef<Path>,
  {
    let file = LogFile::open_readonly(get_hint_file_name(dir, id), IOManagerType::StandardFileIO)?;
    Ok(HintFile { id, file })
  }

  pub fn id(&self) -> u64 {
    self.id
  }

  pub fn append_item(&self, item: &HintItem) -> Result<()> {
    self.file.append(&item.encode())?;
    Ok(())
  }

  /// Reads the item at `offset` together with its encoded size. `None`
  /// marks the end of the file, including a partially written last item.
  pub fn read_item_at(&self, offset: u64) -> Result<Option<(HintItem, u64)>> {
    let header_buf = match self.file.read_at(HINT_ITEM_HEADER_SIZE, offset) {
      Ok(buf) => buf,
      Err(Errors::ReadDataFileEOF) => return Ok(None),
      Err(e) => return Err(e),
    };
    let header = decode_hint_item_header(&header_buf)?;
    let key = match self
      .file
      .read_at(header.key_size as usize, offset + HINT_ITEM_HEADER_SIZE as u64)
    {
      Ok(key) => key,
      Err(Errors::ReadDataFileEOF) => return Ok(None),
      Err(e) => return Err(e),
    };
    let item = HintItem {
      timestamp: header.timestamp,
      value_size: header.value_size,
      offset: header.offset,
      key,
    };
    Ok(Some((item, header.item_size())))
  }

  pub fn sync(&self) -> Result<()> {
    self.file.sync()
  }
}

pub fn get_hint_file_name<P>(dir_path: P, file_id: u64) -> PathBuf
where
  P: AsRef<Path>,
{
  let name = format!("{:013}", file_id) + HINT_FILE_NAME_SUFFIX;
  dir_path.as_ref().join(name)
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_hint_item_encode() {
    let item = HintItem {
      timestamp: 5,
      value_size: 9,
      offset: 1 << 40,
      key: b"hint".to_vec(),
    };
    let enc = item.encode();
    assert_eq!(enc.len(), 24);
    assert_eq!(&enc[20..], b"hint");

    let header = decode_hint_item_header(&enc[..HINT_ITEM_HEADER_SIZE]).unwrap();
    assert_eq!(header.timestamp, 5);
    assert_eq!(header.key_size, 4);
    assert_eq!(header.value_size, 9);
    assert_eq!(header.offset, 1 << 40);
    assert_eq!(header.item_size(), 24);

    assert!(matches!(
      decode_hint_item_header(&enc[..19]),
      Err(Errors::InvalidHintItemHeaderLength(19))
    ));
  }

  #[test]
  fn test_hint_file_append_read() {
    let dir = tempfile::tempdir().unwrap();
    let hint = HintFile::create(dir.path(), 12).unwrap();
    assert_eq!(hint.id(), 12);

    let e1 = Entry::with_timestamp(b"a".to_vec(), b"1".to_vec(), 100);
    let e2 = Entry::with_timestamp(b"bc".to_vec(), b"22".to_vec(), 200);
    hint.append_item(&HintItem::from_entry(&e1, 0)).unwrap();
    hint.append_item(&HintItem::from_entry(&e2, e1.size())).unwrap();
    hint.sync().unwrap();
    assert!(matches!(
      HintFile::create(dir.path(), 12),
      Err(Errors::FileAlreadyExists(_))
    ));

    let ro = HintFile::open_readonly(dir.path(), 12).unwrap();
    let (item, size) = ro.read_item_at(0).unwrap().unwrap();
    assert_eq!(item, HintItem::from_entry(&e1, 0));
    assert_eq!(size, 21);
    let (item, size2) = ro.read_item_at(size).unwrap().unwrap();
    assert_eq!(item.key, b"bc".to_vec());
    assert_eq!(item.offset, e1.size());
    assert!(ro.read_item_at(size + size2).unwrap().is_none());
  }
}
