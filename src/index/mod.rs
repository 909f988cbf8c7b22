pub mod btree;
pub mod skiplist;

use crate::{data::entry::Position, option::IndexType};

/// Outcome of [`Indexer::put`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexUpdate {
  /// The key was absent.
  Inserted,

  /// The key pointed at an entry no newer than the incoming one.
  Replaced(Position),

  /// The key already points at a newer entry; nothing changed.
  Rejected,
}

/// Concurrent key → position map. Every conditional update compares and
/// mutates under the same lock.
pub trait Indexer: Sync + Send {
  /// Stores `pos` unless the key already points at a strictly newer entry.
  fn put(&self, key: Vec<u8>, pos: Position) -> IndexUpdate;

  fn get(&self, key: &[u8]) -> Option<Position>;

  /// Removes the key unconditionally.
  fn delete(&self, key: &[u8]) -> Option<Position>;

  /// Removes the key only if `cond` holds for its current position.
  fn delete_if(&self, key: &[u8], cond: &dyn Fn(&Position) -> bool) -> Option<Position>;

  /// Repoints an existing key to `pos` only if `cond` holds for its current
  /// position. Returns whether the key was repointed.
  fn update_if(&self, key: &[u8], pos: Position, cond: &dyn Fn(&Position) -> bool) -> bool;

  fn len(&self) -> usize;

  fn is_empty(&self) -> bool {
    self.len() == 0
  }
}

pub fn new_indexer(index_type: &IndexType) -> Box<dyn Indexer> {
  match *index_type {
    IndexType::BTree => Box::new(btree::BTree::new()),
    IndexType::SkipList => Box::new(skiplist::SkipList::new()),
  }
}
