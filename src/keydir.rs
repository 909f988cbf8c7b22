//! In-memory index from key to the location of its newest value, and its
//! reconstruction from segments at startup.

use log::{debug, warn};

use crate::{
  data::{
    entry::{decode_entry_header, EntryHeader, Position, ENTRY_HEADER_SIZE},
    hint::{get_hint_file_name, HintFile},
    segment::Segment,
  },
  errors::{Errors, Result},
  index::{new_indexer, IndexUpdate, Indexer},
  option::IndexType,
};

/// What rebuilding one segment contributed.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct LoadStats {
  pub entries: u64,

  /// Bytes that no live key points at anymore.
  pub reclaimable: u64,

  pub max_timestamp: u32,
}

pub struct Keydir {
  index: Box<dyn Indexer>,
}

impl Keydir {
  pub fn new(index_type: &IndexType) -> Self {
    Keydir {
      index: new_indexer(index_type),
    }
  }

  /// Stores `pos` unless the key already points at a newer write.
  pub fn set(&self, key: Vec<u8>, pos: Position) -> IndexUpdate {
    self.index.put(key, pos)
  }

  pub fn get(&self, key: &[u8]) -> Option<Position> {
    self.index.get(key)
  }

  pub fn delete(&self, key: &[u8]) -> Option<Position> {
    self.index.delete(key)
  }

  /// Points `key` at `pos` only while it still lives in a segment accepted
  /// by `from`.
  pub fn repoint(&self, key: &[u8], pos: Position, from: &dyn Fn(u64) -> bool) -> bool {
    self.index.update_if(key, pos, &|old| from(old.segment_id))
  }

  pub fn len(&self) -> usize {
    self.index.len()
  }

  pub fn is_empty(&self) -> bool {
    self.index.is_empty()
  }

  /// Applies one on-disk record to the index. A tombstone removes the key
  /// unless the index already holds something newer.
  ///
  /// Returns how many bytes became reclaimable.
  pub fn put_item(&self, key: &[u8], header: &EntryHeader, segment_id: u64, offset: u64) -> u64 {
    if header.is_tombstone() {
      let removed = self
        .index
        .delete_if(key, &|old| old.timestamp <= header.timestamp);
      return header.entry_size() + removed.map_or(0, |old| old.entry_size(key.len()));
    }

    let pos = Position {
      segment_id,
      value_size: header.value_size,
      offset,
      timestamp: header.timestamp,
    };
    match self.set(key.to_vec(), pos) {
      IndexUpdate::Inserted => 0,
      IndexUpdate::Replaced(old) => old.entry_size(key.len()),
      IndexUpdate::Rejected => header.entry_size(),
    }
  }

  /// Loads every record of `segment`, through its hint file when one
  /// exists.
  pub fn rebuild_from_segment(&self, segment: &Segment) -> Result<LoadStats> {
    let hint_path = get_hint_file_name(segment.dir(), segment.id());
    if hint_path.is_file() {
      debug!("loading segment {} from hint file", segment.id());
      let hint_file = HintFile::open_readonly(segment.dir(), segment.id())?;
      return self.rebuild_from_hint_file(&hint_file);
    }
    self.rebuild_from_data(segment)
  }

  fn rebuild_from_data(&self, segment: &Segment) -> Result<LoadStats> {
    let mut stats = LoadStats::default();
    let mut offset = 0;
    loop {
      let header_buf = match segment.read_at(ENTRY_HEADER_SIZE, offset) {
        Ok(buf) => buf,
        Err(Errors::ReadDataFileEOF) => break,
        Err(e) => return Err(e),
      };
      let header = decode_entry_header(&header_buf)?;
      if offset + header.entry_size() > segment.write_off() {
        warn!("segment {} ends with a truncated entry at {}", segment.id(), offset);
        break;
      }

      // value bytes are never needed to place a key
      let key = match segment.read_at(header.key_size as usize, offset + ENTRY_HEADER_SIZE as u64) {
        Ok(key) => key,
        Err(Errors::ReadDataFileEOF) => {
          warn!("segment {} ends with a truncated entry at {}", segment.id(), offset);
          break;
        }
        Err(e) => return Err(e),
      };

      stats.reclaimable += self.put_item(&key, &header, segment.id(), offset);
      stats.entries += 1;
      stats.max_timestamp = stats.max_timestamp.max(header.timestamp);
      offset += header.entry_size();
    }
    Ok(stats)
  }

  fn rebuild_from_hint_file(&self, hint_file: &HintFile) -> Result<LoadStats> {
    let mut stats = LoadStats::default();
    let mut offset = 0;
    while let Some((item, size)) = hint_file.read_item_at(offset)? {
      let header = EntryHeader {
        crc: 0,
        timestamp: item.timestamp,
        key_size: item.key.len() as u32,
        value_size: item.value_size,
      };
      stats.reclaimable += self.put_item(&item.key, &header, hint_file.id(), item.offset);
      stats.entries += 1;
      stats.max_timestamp = stats.max_timestamp.max(item.timestamp);
      offset += size;
    }
    Ok(stats)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::{
    data::{entry::Entry, hint::HintItem},
    option::IOManagerType,
  };

  fn header(key: &[u8], value_size: u32, timestamp: u32) -> EntryHeader {
    EntryHeader {
      crc: 0,
      timestamp,
      key_size: key.len() as u32,
      value_size,
    }
  }

  #[test]
  fn test_put_item_last_writer_wins() {
    for order in [[0, 1], [1, 0]] {
      let keydir = Keydir::new(&IndexType::BTree);
      let writes = [(1u64, 0u64, 100u32), (2, 64, 200)];
      for i in order {
        let (sid, off, ts) = writes[i];
        keydir.put_item(b"a", &header(b"a", 3, ts), sid, off);
      }
      let pos = keydir.get(b"a").unwrap();
      assert_eq!(pos.timestamp, 200);
      assert_eq!(pos.segment_id, 2);
    }
  }

  #[test]
  fn test_put_item_tombstone() {
    let keydir = Keydir::new(&IndexType::SkipList);
    assert_eq!(keydir.put_item(b"k", &header(b"k", 5, 10), 1, 0), 0);
    assert_eq!(keydir.len(), 1);

    // an older tombstone can't remove a newer value
    assert_eq!(keydir.put_item(b"k", &header(b"k", 0, 9), 1, 22), 17);
    assert!(keydir.get(b"k").is_some());

    // tombstone and the value it hides are both dead
    assert_eq!(keydir.put_item(b"k", &header(b"k", 0, 10), 1, 39), 17 + 22);
    assert!(keydir.get(b"k").is_none());
    assert!(keydir.is_empty());
  }

  #[test]
  fn test_repoint() {
    let keydir = Keydir::new(&IndexType::BTree);
    keydir.put_item(b"k", &header(b"k", 5, 10), 1, 0);
    let merged = Position {
      segment_id: 9,
      value_size: 5,
      offset: 0,
      timestamp: 10,
    };
    assert!(!keydir.repoint(b"k", merged, &|id| id == 2));
    assert!(keydir.repoint(b"k", merged, &|id| id == 1));
    assert_eq!(keydir.get(b"k"), Some(merged));
    assert_eq!(keydir.delete(b"k"), Some(merged));
  }

  fn write_segment(dir: &std::path::Path, id: u64, entries: &[Entry]) -> Vec<u64> {
    let seg = Segment::create_active(dir, id).unwrap();
    let offsets = entries.iter().map(|e| seg.append(e).unwrap()).collect();
    seg.sync().unwrap();
    offsets
  }

  #[test]
  fn test_rebuild_from_segment() {
    let dir = tempfile::tempdir().unwrap();
    let entries = vec![
      Entry::with_timestamp(b"a".to_vec(), b"1".to_vec(), 100),
      Entry::with_timestamp(b"a".to_vec(), b"2".to_vec(), 200),
      Entry::with_timestamp(b"c".to_vec(), b"9".to_vec(), 150),
      Entry::with_timestamp(b"d".to_vec(), b"x".to_vec(), 150),
      Entry::tombstone(b"d".to_vec(), 160),
    ];
    let offsets = write_segment(dir.path(), 1, &entries);

    let seg = Segment::open_readonly(dir.path(), 1, IOManagerType::MemoryMap).unwrap();
    let keydir = Keydir::new(&IndexType::BTree);
    let stats = keydir.rebuild_from_segment(&seg).unwrap();

    assert_eq!(stats.entries, 5);
    assert_eq!(stats.max_timestamp, 200);
    assert_eq!(
      stats.reclaimable,
      entries[0].size() + entries[3].size() + entries[4].size()
    );
    assert_eq!(keydir.len(), 2);
    assert_eq!(keydir.get(b"a").unwrap().offset, offsets[1]);
    assert_eq!(keydir.get(b"c").unwrap().offset, offsets[2]);
    assert!(keydir.get(b"d").is_none());
  }

  #[test]
  fn test_rebuild_stops_at_truncated_tail() {
    let dir = tempfile::tempdir().unwrap();
    let good = Entry::with_timestamp(b"good".to_vec(), b"value".to_vec(), 1);
    write_segment(dir.path(), 1, &[good.clone()]);

    let partial = Entry::with_timestamp(b"partial".to_vec(), b"value".to_vec(), 2).encode();
    let path = crate::data::segment::get_data_file_name(dir.path(), 1);
    let mut bytes = std::fs::read(&path).unwrap();
    bytes.extend_from_slice(&partial[..partial.len() - 3]);
    std::fs::write(&path, bytes).unwrap();

    let seg = Segment::open_readonly(dir.path(), 1, IOManagerType::StandardFileIO).unwrap();
    let keydir = Keydir::new(&IndexType::BTree);
    let stats = keydir.rebuild_from_segment(&seg).unwrap();
    assert_eq!(stats.entries, 1);
    assert!(keydir.get(b"good").is_some());
    assert!(keydir.get(b"partial").is_none());
  }

  #[test]
  fn test_rebuild_stops_at_oversized_header() {
    let dir = tempfile::tempdir().unwrap();
    let good = Entry::with_timestamp(b"good".to_vec(), b"value".to_vec(), 1);
    write_segment(dir.path(), 1, &[good]);

    let path = crate::data::segment::get_data_file_name(dir.path(), 1);
    let mut bytes = std::fs::read(&path).unwrap();
    bytes.extend_from_slice(&[0u8; 4]);
    bytes.extend_from_slice(&2u32.to_be_bytes());
    bytes.extend_from_slice(&u32::MAX.to_be_bytes());
    bytes.extend_from_slice(&u32::MAX.to_be_bytes());
    bytes.extend_from_slice(b"junk");
    std::fs::write(&path, bytes).unwrap();

    let seg = Segment::open_readonly(dir.path(), 1, IOManagerType::MemoryMap).unwrap();
    let keydir = Keydir::new(&IndexType::BTree);
    let stats = keydir.rebuild_from_segment(&seg).unwrap();
    assert_eq!(stats.entries, 1);
    assert_eq!(keydir.len(), 1);
    assert!(keydir.get(b"good").is_some());
  }

  #[test]
  fn test_rebuild_from_hint_matches_data() {
    let dir = tempfile::tempdir().unwrap();
    let entries = vec![
      Entry::with_timestamp(b"x".to_vec(), b"one".to_vec(), 10),
      Entry::with_timestamp(b"y".to_vec(), b"two".to_vec(), 11),
      Entry::with_timestamp(b"zz".to_vec(), b"three".to_vec(), 12),
    ];
    let offsets = write_segment(dir.path(), 5, &entries);
    let seg = Segment::open_readonly(dir.path(), 5, IOManagerType::StandardFileIO).unwrap();

    let from_data = Keydir::new(&IndexType::BTree);
    from_data.rebuild_from_segment(&seg).unwrap();

    let hint = HintFile::create(dir.path(), 5).unwrap();
    for (entry, offset) in entries.iter().zip(&offsets) {
      hint.append_item(&HintItem::from_entry(entry, *offset)).unwrap();
    }
    hint.sync().unwrap();

    let from_hint = Keydir::new(&IndexType::SkipList);
    let stats = from_hint.rebuild_from_segment(&seg).unwrap();
    assert_eq!(stats.entries, 3);

    for entry in &entries {
      assert_eq!(from_data.get(&entry.key), from_hint.get(&entry.key));
    }
    assert_eq!(from_data.len(), from_hint.len());
  }
}
