use std::{
  collections::{HashMap, HashSet},
  fs::File,
  path::{Path, PathBuf},
  sync::{atomic::Ordering, Arc},
};

use log::{error, info, warn};

use crate::{
  data::{
    entry::{Entry, Position},
    hint::{get_hint_file_name, HintFile, HintItem},
    segment::{get_data_file_name, ScanItem, Segment, SegmentRole},
  },
  db::Engine,
  errors::{Errors, Result},
  util::{
    self,
    file::{list_dir, parse_file_id, remove_file_if_exists},
  },
};

/// Present while a merge into the segment of the same id is unfinished.
const MERGE_MARKER_SUFFIX: &str = ".merging";

impl Engine {
  /// Folds every older segment into one merged segment plus a hint file,
  /// keeping only the newest live entry per key. Writes may continue while
  /// it runs.
  pub fn merge(&self) -> Result<()> {
    let lock = self.merging_lock.try_lock();
    if lock.is_none() {
      return Err(Errors::MergeInProgress);
    }
    if self.is_closed() {
      return Err(Errors::EngineIsClosed);
    }

    // an abort only targets the merge that is running when it is requested
    self.merge_abort.store(false, Ordering::SeqCst);
    self.merge_segments()
  }

  /// Asks the running merge to stop at the next entry boundary with
  /// [`Errors::MergeAborted`]. Has no effect when no merge is running.
  pub fn abort_merge(&self) {
    self.merge_abort.store(true, Ordering::SeqCst);
  }

  fn merge_segments(&self) -> Result<()> {
    if self.is_engine_empty() {
      return Ok(());
    }

    let dir_path = &self.options.dir_path;
    let reclaim_size = self.reclaim_size.load(Ordering::SeqCst);
    let total_size = util::file::dir_disk_size(dir_path);
    let ratio = match total_size {
      0 => 0.0,
      _ => reclaim_size as f32 / total_size as f32,
    };
    if ratio < self.options.file_merge_threshold {
      return Err(Errors::MergeThresholdUnreached);
    }

    let available_space = util::file::available_disk_space(dir_path);
    if total_size.saturating_sub(reclaim_size) >= available_space {
      return Err(Errors::MergeNoEnoughSpace);
    }

    let (merge_id, merge_segments) = self.rotate_merge_segments()?;
    if merge_segments.is_empty() {
      return Ok(());
    }
    info!(
      "merging {} segments into segment {}",
      merge_segments.len(),
      merge_id
    );

    let marker = get_merge_marker_name(dir_path, merge_id);
    if let Err(e) = File::create(&marker).and_then(|f| f.sync_all()) {
      error!("failed to create merge marker: {e}");
      return Err(Errors::FailedToOpenDataFile(e));
    }
    util::file::sync_dir(dir_path)?;

    let merged = Arc::new(Segment::create_merged(dir_path, merge_id)?);
    let hint_file = HintFile::create(dir_path, merge_id)?;
    self.segments.set(merged.clone());

    let written = self
      .write_merged(&merge_segments, &merged, &hint_file)
      .and_then(|_| remove_file_if_exists(&marker))
      .and_then(|_| util::file::sync_dir(dir_path));
    if let Err(e) = written {
      // keys already repointed still read valid data from it, and the
      // marker makes the next open discard it
      merged.set_role(SegmentRole::Older);
      warn!("merge into segment {} stopped: {}", merge_id, e);
      return Err(e);
    }

    for segment in merge_segments.iter() {
      self.segments.delete(segment.id());
      remove_file_if_exists(segment.path())?;
      remove_file_if_exists(get_hint_file_name(dir_path, segment.id()))?;
    }
    util::file::sync_dir(dir_path)?;
    merged.set_role(SegmentRole::Older);

    let _ = self
      .reclaim_size
      .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |size| {
        Some(size.saturating_sub(reclaim_size))
      });
    info!("merge into segment {} finished", merge_id);
    Ok(())
  }

  /// Seals the active segment so it is folded too, and reserves the merged
  /// segment's id before any new active segment can take a larger one.
  fn rotate_merge_segments(&self) -> Result<(u64, Vec<Arc<Segment>>)> {
    let mut active = self.active.lock();
    if let Some(segment) = active.as_ref() {
      segment.sync()?;
      segment.set_role(SegmentRole::Older);
    }
    *active = None;

    let merge_segments = self.segments.with_role(SegmentRole::Older);
    let merge_id = self.next_segment_id();
    Ok((merge_id, merge_segments))
  }

  fn write_merged(
    &self,
    merge_segments: &[Arc<Segment>],
    merged: &Segment,
    hint_file: &HintFile,
  ) -> Result<()> {
    let mut latest: HashMap<Vec<u8>, Entry> = HashMap::new();
    for segment in merge_segments.iter() {
      let mut offset = 0;
      loop {
        self.check_merge_abort()?;
        let (entry, size) = match segment.scan_entry_at(offset)? {
          ScanItem::Entry { entry, size } => (entry, size),
          ScanItem::End => break,
        };
        let newer_seen = latest
          .get(&entry.key)
          .is_some_and(|old| old.timestamp > entry.timestamp);
        if !newer_seen {
          latest.insert(entry.key.clone(), entry);
        }
        offset += size;
      }
    }

    let folded: HashSet<u64> = merge_segments.iter().map(|s| s.id()).collect();
    for entry in latest.into_values() {
      self.check_merge_abort()?;
      // every older copy of the key is about to be deleted
      if entry.is_tombstone() {
        continue;
      }

      let offset = merged.append(&entry)?;
      hint_file.append_item(&HintItem::from_entry(&entry, offset))?;

      let pos = Position {
        segment_id: merged.id(),
        value_size: entry.value.len() as u32,
        offset,
        timestamp: entry.timestamp,
      };
      self
        .keydir
        .repoint(&entry.key, pos, &|segment_id| folded.contains(&segment_id));
    }

    merged.sync()?;
    hint_file.sync()
  }

  fn check_merge_abort(&self) -> Result<()> {
    if self.merge_abort.load(Ordering::SeqCst) {
      return Err(Errors::MergeAborted);
    }
    Ok(())
  }
}

fn get_merge_marker_name<P>(dir_path: P, file_id: u64) -> PathBuf
where
  P: AsRef<Path>,
{
  let name = format!("{:013}", file_id) + MERGE_MARKER_SUFFIX;
  dir_path.as_ref().join(name)
}

/// Deletes whatever an unfinished merge left behind. Its inputs are still on
/// disk, so nothing is lost.
pub(crate) fn remove_aborted_merges<P>(dir_path: P) -> Result<()>
where
  P: AsRef<Path>,
{
  let mut removed = false;
  for file in list_dir(&dir_path)? {
    let Some(file_name) = file.file_name().and_then(|n| n.to_str()) else {
      continue;
    };
    let Some(merge_id) = parse_file_id(file_name, MERGE_MARKER_SUFFIX) else {
      continue;
    };

    warn!("discarding output of unfinished merge {}", merge_id);
    remove_file_if_exists(get_data_file_name(&dir_path, merge_id))?;
    remove_file_if_exists(get_hint_file_name(&dir_path, merge_id))?;
    // the marker goes last
    remove_file_if_exists(&file)?;
    removed = true;
  }

  if removed {
    util::file::sync_dir(&dir_path)?;
  }
  Ok(())
}
