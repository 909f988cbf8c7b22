use std::{collections::HashMap, sync::Arc};

use parking_lot::RwLock;

use crate::data::segment::{Segment, SegmentRole};

/// Every open segment, addressed by id.
#[derive(Default)]
pub struct SegmentTable {
  segments: RwLock<HashMap<u64, Arc<Segment>>>,
}

impl SegmentTable {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn get(&self, id: u64) -> Option<Arc<Segment>> {
    self.segments.read().get(&id).cloned()
  }

  /// Registers `segment` under its own id, returning the one it displaced.
  pub fn set(&self, segment: Arc<Segment>) -> Option<Arc<Segment>> {
    self.segments.write().insert(segment.id(), segment)
  }

  pub fn delete(&self, id: u64) -> Option<Arc<Segment>> {
    self.segments.write().remove(&id)
  }

  /// Segments currently holding `role`, ascending by id.
  pub fn with_role(&self, role: SegmentRole) -> Vec<Arc<Segment>> {
    let mut segments: Vec<_> = self
      .segments
      .read()
      .values()
      .filter(|segment| segment.role() == role)
      .cloned()
      .collect();
    segments.sort_by_key(|segment| segment.id());
    segments
  }

  pub fn len(&self) -> usize {
    self.segments.read().len()
  }

  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }
}
