use std::{
  fs::{self, File, OpenOptions},
  sync::{
    atomic::{AtomicBool, AtomicU32, AtomicU64, AtomicUsize, Ordering},
    Arc,
  },
};

use bytes::Bytes;
use fs2::FileExt;
use log::{error, info, warn};
use parking_lot::Mutex;

use crate::{
  data::{
    entry::Entry,
    segment::{Segment, SegmentRole},
  },
  errors::{Errors, Result},
  keydir::Keydir,
  merge::remove_aborted_merges,
  option::{IOManagerType, Options},
  segment_table::SegmentTable,
  util,
};

pub(crate) const FILE_LOCK_NAME: &str = "cask-kv.lock";

/// Storage engine over one directory of segments.
pub struct Engine {
  pub(crate) options: Arc<Options>,
  pub(crate) keydir: Keydir,
  pub(crate) segments: SegmentTable,
  /// The only segment accepting appends, created lazily by the first write.
  /// Holding this lock serializes writers so the keydir sees them in file
  /// order.
  pub(crate) active: Mutex<Option<Arc<Segment>>>,
  /// Guarantees a single merge at a time.
  pub(crate) merging_lock: Mutex<()>,
  pub(crate) merge_abort: AtomicBool,
  pub(crate) reclaim_size: AtomicU64,
  closed: AtomicBool,
  last_segment_id: AtomicU64,
  last_timestamp: AtomicU32,
  bytes_write: AtomicUsize,
  lock_file: File,
}

/// Point-in-time statistics of an engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Stat {
  pub key_num: usize,
  pub segment_num: usize,
  pub reclaimable_size: u64,
  pub disk_size: u64,
}

impl Engine {
  /// Opens the engine at `opts.dir_path`, creating the directory if needed
  /// and rebuilding the keydir from every segment found there.
  pub fn open(opts: Options) -> Result<Self> {
    check_options(&opts)?;

    let options = opts;
    let dir_path = options.dir_path.clone();
    if dir_path.exists() && !dir_path.is_dir() {
      return Err(Errors::DirPathIsNotDirectory(dir_path));
    }
    if !dir_path.is_dir() {
      if let Err(e) = fs::create_dir_all(&dir_path) {
        error!("create database directory err: {e}");
        return Err(Errors::FailedToCreateDatabaseDir(e));
      }
    }

    let lock_file = match OpenOptions::new()
      .read(true)
      .write(true)
      .create(true)
      .truncate(false)
      .open(dir_path.join(FILE_LOCK_NAME))
    {
      Ok(file) => file,
      Err(e) => {
        error!("failed to open lock file: {e}");
        return Err(Errors::FailedToOpenDataFile(e));
      }
    };
    if lock_file.try_lock_exclusive().is_err() {
      return Err(Errors::DatabaseIsUsing);
    }

    remove_aborted_merges(&dir_path)?;

    let keydir = Keydir::new(&options.index_type);
    let segments = SegmentTable::new();
    let mut reclaim_size = 0;
    let mut max_timestamp = 0;

    // ascending ids replay writes in the order they happened
    let segment_ids = util::file::list_segment_ids(&dir_path)?;
    for id in segment_ids.iter() {
      let io_type = if options.mmap_at_startup {
        IOManagerType::MemoryMap
      } else {
        IOManagerType::StandardFileIO
      };
      let segment = Segment::open_readonly(&dir_path, *id, io_type)?;
      let stats = keydir.rebuild_from_segment(&segment)?;
      reclaim_size += stats.reclaimable;
      max_timestamp = max_timestamp.max(stats.max_timestamp);

      let segment = match io_type {
        IOManagerType::MemoryMap => Segment::open_readonly(&dir_path, *id, IOManagerType::StandardFileIO)?,
        IOManagerType::StandardFileIO => segment,
      };
      segments.set(Arc::new(segment));
    }
    info!(
      "opened {:?} with {} segments and {} keys",
      dir_path,
      segment_ids.len(),
      keydir.len()
    );

    Ok(Engine {
      options: Arc::new(options),
      keydir,
      segments,
      active: Mutex::new(None),
      merging_lock: Mutex::new(()),
      merge_abort: AtomicBool::new(false),
      reclaim_size: AtomicU64::new(reclaim_size),
      closed: AtomicBool::new(false),
      last_segment_id: AtomicU64::new(segment_ids.last().copied().unwrap_or(0)),
      last_timestamp: AtomicU32::new(max_timestamp),
      bytes_write: AtomicUsize::new(0),
      lock_file,
    })
  }

  /// Stores `value` under `key`. An empty value deletes the key.
  pub fn put(&self, key: Bytes, value: Bytes) -> Result<()> {
    check_key(&key)?;
    if value.len() > u32::MAX as usize {
      return Err(Errors::ValueTooLarge(value.len()));
    }
    self.append_entry(key.to_vec(), value.to_vec())
  }

  /// Deletes `key` by appending a tombstone. Deleting an absent key is a
  /// no-op.
  pub fn delete(&self, key: Bytes) -> Result<()> {
    check_key(&key)?;
    if self.keydir.get(&key).is_none() {
      return Ok(());
    }
    self.append_entry(key.to_vec(), Vec::new())
  }

  /// Returns the current value of `key`, `None` if it has none.
  pub fn get(&self, key: Bytes) -> Result<Option<Bytes>> {
    check_key(&key)?;

    loop {
      let Some(pos) = self.keydir.get(&key) else {
        return Ok(None);
      };
      let Some(segment) = self.segments.get(pos.segment_id) else {
        // a merge may have folded the segment between the two lookups
        if self.keydir.get(&key) == Some(pos) {
          return Err(Errors::SegmentNotFound(pos.segment_id));
        }
        continue;
      };
      let entry = segment.read_entry(key.len(), &pos)?;
      if entry.is_tombstone() {
        return Ok(None);
      }
      return Ok(Some(Bytes::from(entry.value)));
    }
  }

  fn append_entry(&self, key: Vec<u8>, value: Vec<u8>) -> Result<()> {
    let mut active = self.active.lock();
    if self.is_closed() {
      return Err(Errors::EngineIsClosed);
    }

    if let Some(segment) = active.as_ref() {
      if segment.write_off() >= self.options.data_file_size {
        segment.sync()?;
        segment.set_role(SegmentRole::Older);
        info!("segment {} reached its size limit, demoted to older", segment.id());
        *active = None;
      }
    }

    let segment = match active.as_ref() {
      Some(segment) => segment.clone(),
      None => {
        let segment = Arc::new(Segment::create_active(&self.options.dir_path, self.next_segment_id())?);
        self.segments.set(segment.clone());
        info!("created active segment {}", segment.id());
        *active = Some(segment.clone());
        segment
      }
    };

    let entry = Entry::with_timestamp(key, value, self.next_timestamp());
    let offset = segment.append(&entry)?;

    let previous = self.bytes_write.fetch_add(entry.size() as usize, Ordering::SeqCst);
    let mut need_sync = self.options.sync_writes;
    if !need_sync
      && self.options.bytes_per_sync > 0
      && previous + entry.size() as usize >= self.options.bytes_per_sync
    {
      need_sync = true;
    }
    if need_sync {
      segment.sync()?;
      self.bytes_write.store(0, Ordering::SeqCst);
    }

    let reclaimable = self
      .keydir
      .put_item(&entry.key, &entry.header(), segment.id(), offset);
    self.reclaim_size.fetch_add(reclaimable, Ordering::SeqCst);
    Ok(())
  }

  /// Next segment id: the current unix millis, bumped past the last id.
  pub(crate) fn next_segment_id(&self) -> u64 {
    let now = util::time::now_millis();
    let prev = self
      .last_segment_id
      .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |last| {
        Some(now.max(last + 1))
      })
      .unwrap_or_else(|last| last);
    now.max(prev + 1)
  }

  /// Write timestamps never go backwards, even when the clock does.
  fn next_timestamp(&self) -> u32 {
    let now = util::time::now_secs();
    let prev = self.last_timestamp.fetch_max(now, Ordering::SeqCst);
    now.max(prev)
  }

  pub fn stat(&self) -> Result<Stat> {
    Ok(Stat {
      key_num: self.keydir.len(),
      segment_num: self.segments.len(),
      reclaimable_size: self.reclaim_size.load(Ordering::SeqCst),
      disk_size: util::file::dir_disk_size(&self.options.dir_path),
    })
  }

  /// Flushes the active segment to disk.
  pub fn sync(&self) -> Result<()> {
    let active = self.active.lock();
    if let Some(segment) = active.as_ref() {
      segment.sync()?;
    }
    Ok(())
  }

  /// Seals the active segment and releases the directory lock. Writes and
  /// merges fail with [`Errors::EngineIsClosed`] afterwards, reads keep
  /// working. Closing twice is a no-op.
  pub fn close(&self) -> Result<()> {
    let _merging = self.merging_lock.lock();
    let mut active = self.active.lock();
    if self.is_closed() {
      return Ok(());
    }
    if let Some(segment) = active.take() {
      segment.sync()?;
      segment.set_role(SegmentRole::Older);
    }
    self.closed.store(true, Ordering::SeqCst);
    FileExt::unlock(&self.lock_file).map_err(Errors::FailedToUnlockDatabaseDir)
  }

  pub(crate) fn is_closed(&self) -> bool {
    self.closed.load(Ordering::SeqCst)
  }

  pub(crate) fn is_engine_empty(&self) -> bool {
    let active = self.active.lock();
    match active.as_ref() {
      Some(segment) => segment.write_off() == 0 && self.segments.len() == 1,
      None => self.segments.is_empty(),
    }
  }
}

impl Drop for Engine {
  fn drop(&mut self) {
    if let Err(e) = self.close() {
      warn!("error whilst closing engine: {}", e);
    }
  }
}

fn check_key(key: &[u8]) -> Result<()> {
  if key.is_empty() {
    return Err(Errors::KeyIsEmpty);
  }
  if key.len() > u32::MAX as usize {
    return Err(Errors::KeyTooLarge(key.len()));
  }
  Ok(())
}

fn check_options(opts: &Options) -> Result<()> {
  let dir_path = opts.dir_path.to_str();
  if dir_path.is_none() || dir_path.unwrap_or_default().is_empty() {
    return Err(Errors::DirPathIsEmpty);
  }

  if opts.data_file_size == 0 {
    return Err(Errors::DataFileSizeTooSmall);
  }

  if !(0.0..=1.0).contains(&opts.file_merge_threshold) {
    return Err(Errors::InvalidMergeRatio);
  }

  Ok(())
}
