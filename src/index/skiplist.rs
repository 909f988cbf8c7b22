use crossbeam_skiplist::SkipMap;
use parking_lot::Mutex;

use crate::data::entry::Position;

use super::{IndexUpdate, Indexer};

/// Lock-free reads over a skip list. Writers take `write_lock` so the
/// timestamp check and the mutation happen as one step.
pub struct SkipList {
  skl: SkipMap<Vec<u8>, Position>,
  write_lock: Mutex<()>,
}

impl SkipList {
  pub fn new() -> Self {
    Self {
      skl: SkipMap::new(),
      write_lock: Mutex::new(()),
    }
  }
}

impl Default for SkipList {
  fn default() -> Self {
    Self::new()
  }
}

impl Indexer for SkipList {
  fn put(&self, key: Vec<u8>, pos: Position) -> IndexUpdate {
    let _guard = self.write_lock.lock();
    let old = self.skl.get(&key).map(|entry| *entry.value());
    match old {
      Some(old) if old.timestamp > pos.timestamp => IndexUpdate::Rejected,
      Some(old) => {
        self.skl.insert(key, pos);
        IndexUpdate::Replaced(old)
      }
      None => {
        self.skl.insert(key, pos);
        IndexUpdate::Inserted
      }
    }
  }

  fn get(&self, key: &[u8]) -> Option<Position> {
    self.skl.get(key).map(|entry| *entry.value())
  }

  fn delete(&self, key: &[u8]) -> Option<Position> {
    let _guard = self.write_lock.lock();
    self.skl.remove(key).map(|entry| *entry.value())
  }

  fn delete_if(&self, key: &[u8], cond: &dyn Fn(&Position) -> bool) -> Option<Position> {
    let _guard = self.write_lock.lock();
    match self.skl.get(key) {
      Some(entry) if cond(entry.value()) => self.skl.remove(key).map(|entry| *entry.value()),
      _ => None,
    }
  }

  fn update_if(&self, key: &[u8], pos: Position, cond: &dyn Fn(&Position) -> bool) -> bool {
    let _guard = self.write_lock.lock();
    match self.skl.get(key) {
      Some(entry) if cond(entry.value()) => {
        self.skl.insert(key.to_vec(), pos);
        true
      }
      _ => false,
    }
  }

  fn len(&self) -> usize {
    self.skl.len()
  }
}
