use bytes::{Buf, BufMut, BytesMut};

use crate::{
  errors::{Errors, Result},
  util,
};

/// crc + timestamp + key_size + value_size
pub const ENTRY_HEADER_SIZE: usize = 16;

/// Fixed-size prefix of every entry, enough to size the rest of the record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntryHeader {
  pub crc: u32,
  pub timestamp: u32,
  pub key_size: u32,
  pub value_size: u32,
}

impl EntryHeader {
  /// Header + key + value.
  pub fn entry_size(&self) -> u64 {
    ENTRY_HEADER_SIZE as u64 + self.key_size as u64 + self.value_size as u64
  }

  pub fn is_tombstone(&self) -> bool {
    self.value_size == 0
  }
}

/// One logical write. A zero-length value is a tombstone.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
  pub timestamp: u32,
  pub key: Vec<u8>,
  pub value: Vec<u8>,
}

impl Entry {
  pub fn new(key: Vec<u8>, value: Vec<u8>) -> Self {
    Self::with_timestamp(key, value, util::time::now_secs())
  }

  pub fn with_timestamp(key: Vec<u8>, value: Vec<u8>, timestamp: u32) -> Self {
    Entry {
      timestamp,
      key,
      value,
    }
  }

  pub fn tombstone(key: Vec<u8>, timestamp: u32) -> Self {
    Self::with_timestamp(key, Vec::new(), timestamp)
  }

  pub fn is_tombstone(&self) -> bool {
    self.value.is_empty()
  }

  pub fn size(&self) -> u64 {
    (ENTRY_HEADER_SIZE + self.key.len() + self.value.len()) as u64
  }

  /// Header as it will be written, minus the checksum which only exists
  /// once the record is encoded.
  pub fn header(&self) -> EntryHeader {
    EntryHeader {
      crc: 0,
      timestamp: self.timestamp,
      key_size: self.key.len() as u32,
      value_size: self.value.len() as u32,
    }
  }

  /// Layout (big-endian):
  ///
  /// ```text
  /// +--------+-----------+----------+------------+-----+-------+
  /// | crc u32| tstamp u32| ksz u32  | vsz u32    | key | value |
  /// +--------+-----------+----------+------------+-----+-------+
  /// ```
  ///
  /// The crc covers every byte after itself.
  pub fn encode(&self) -> Vec<u8> {
    let mut buf = BytesMut::with_capacity(self.size() as usize);
    buf.put_u32(0);
    buf.put_u32(self.timestamp);
    buf.put_u32(self.key.len() as u32);
    buf.put_u32(self.value.len() as u32);
    buf.extend_from_slice(&self.key);
    buf.extend_from_slice(&self.value);

    let crc = crc32fast::hash(&buf[4..]);
    buf[0..4].copy_from_slice(&crc.to_be_bytes());
    buf.to_vec()
  }
}

pub fn decode_entry_header(buf: &[u8]) -> Result<EntryHeader> {
  if buf.len() != ENTRY_HEADER_SIZE {
    return Err(Errors::InvalidEntryHeaderLength(buf.len()));
  }
  let mut buf = buf;
  Ok(EntryHeader {
    crc: buf.get_u32(),
    timestamp: buf.get_u32(),
    key_size: buf.get_u32(),
    value_size: buf.get_u32(),
  })
}

/// Decodes a full record and verifies its checksum.
pub fn decode_entry(buf: &[u8]) -> Result<Entry> {
  if buf.len() < ENTRY_HEADER_SIZE {
    return Err(Errors::InvalidEntryHeaderLength(buf.len()));
  }
  let header = decode_entry_header(&buf[..ENTRY_HEADER_SIZE])?;
  let entry_size = header.entry_size();
  if entry_size > buf.len() as u64 {
    return Err(Errors::MalformedEntry {
      declared: entry_size,
      available: buf.len() as u64,
    });
  }
  let record = &buf[..entry_size as usize];

  let actual = crc32fast::hash(&record[4..]);
  if actual != header.crc {
    return Err(Errors::InvalidEntryCrc {
      expected: header.crc,
      actual,
    });
  }

  let key_end = ENTRY_HEADER_SIZE + header.key_size as usize;
  Ok(Entry {
    timestamp: header.timestamp,
    key: record[ENTRY_HEADER_SIZE..key_end].to_vec(),
    value: record[key_end..].to_vec(),
  })
}

/// Where the current value of a key lives on disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Position {
  pub segment_id: u64,
  pub value_size: u32,
  pub offset: u64,
  pub timestamp: u32,
}

impl Position {
  /// Size of the whole entry this position points at.
  pub fn entry_size(&self, key_len: usize) -> u64 {
    (ENTRY_HEADER_SIZE + key_len) as u64 + self.value_size as u64
  }
}
