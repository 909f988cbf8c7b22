use std::collections::BTreeMap;

use parking_lot::RwLock;

use crate::data::entry::Position;

use super::{IndexUpdate, Indexer};

pub struct BTree {
  tree: RwLock<BTreeMap<Vec<u8>, Position>>,
}

impl BTree {
  pub fn new() -> Self {
    Self {
      tree: RwLock::new(BTreeMap::new()),
    }
  }
}

impl Default for BTree {
  fn default() -> Self {
    Self::new()
  }
}

impl Indexer for BTree {
  fn put(&self, key: Vec<u8>, pos: Position) -> IndexUpdate {
    let mut write_guard = self.tree.write();
    match write_guard.get_mut(&key) {
      Some(old) if old.timestamp > pos.timestamp => IndexUpdate::Rejected,
      Some(old) => IndexUpdate::Replaced(std::mem::replace(old, pos)),
      None => {
        write_guard.insert(key, pos);
        IndexUpdate::Inserted
      }
    }
  }

  fn get(&self, key: &[u8]) -> Option<Position> {
    let read_guard = self.tree.read();
    read_guard.get(key).copied()
  }

  fn delete(&self, key: &[u8]) -> Option<Position> {
    let mut write_guard = self.tree.write();
    write_guard.remove(key)
  }

  fn delete_if(&self, key: &[u8], cond: &dyn Fn(&Position) -> bool) -> Option<Position> {
    let mut write_guard = self.tree.write();
    if write_guard.get(key).is_some_and(cond) {
      return write_guard.remove(key);
    }
    None
  }

  fn update_if(&self, key: &[u8], pos: Position, cond: &dyn Fn(&Position) -> bool) -> bool {
    let mut write_guard = self.tree.write();
    match write_guard.get_mut(key) {
      Some(old) if cond(old) => {
        *old = pos;
        true
      }
      _ => false,
    }
  }

  fn len(&self) -> usize {
    self.tree.read().len()
  }
}
