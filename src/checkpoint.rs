//! Checkpoint file facade.
//!
//! Composes the address mapper, the split file set, and the liveness bitmaps
//! into the store the checkpoint/recovery subsystem drives: open/truncate
//! lifecycle, free-block allocation with a rotating bounded-probe cursor,
//! block I/O with range preconditions, and the sparse-file reclamation sweep.
//!
//! A `CheckpointFile` is not internally synchronized; the caller serializes
//! mutating operations.

use crate::bitvec::BitVec;
use crate::error::{CheckpointError, Result};
use crate::file::{self, SplitFileSet};
use crate::layout::{FileLayout, SPLIT_COUNT_LIMIT, STRIPE_SIZE_LIMIT};
use crate::{PartitionGroupId, IO_MONITOR_TARGET};
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{info, trace};

/// Probe budget for one free-block scan. Bounds allocation latency under
/// fragmentation; when exhausted the allocator appends instead, and the
/// reclamation sweep returns the physical space later.
const ALLOCATE_BLOCK_SEARCH_LIMIT: u32 = 4096;

/// Default latency threshold for `[LONG I/O]` warnings, in milliseconds.
pub const IO_WARNING_THRESHOLD_MILLIS_DEFAULT: u64 = 1000;

/// Advice value for dropping cached pages (`posix_fadvise` DONTNEED).
#[cfg(target_os = "linux")]
pub const FADVISE_DONTNEED: i32 = libc::POSIX_FADV_DONTNEED;

/// Construction-time shape of a store. All fields are immutable once the
/// `CheckpointFile` is built.
#[derive(Debug, Clone)]
pub struct CheckpointConfig {
    /// Block size exponent; block size is `1 << block_exp` bytes.
    pub block_exp: u8,
    /// Partition group this store belongs to (embedded in file names).
    pub pg_id: PartitionGroupId,
    /// Directory for single-file mode; may be empty for a bare relative name.
    pub dir: PathBuf,
    /// Number of physical splits; 0 selects the historical single-file mode.
    pub split_count: u32,
    /// Stripe size in blocks (split mode only).
    pub stripe_size: u32,
    /// Configured directory list, cycled modulo its length across splits.
    pub config_dirs: Vec<PathBuf>,
    pub io_warning_threshold_millis: u64,
}

impl CheckpointConfig {
    /// Single-file store in `dir`.
    pub fn single(block_exp: u8, dir: impl Into<PathBuf>, pg_id: PartitionGroupId) -> Self {
        CheckpointConfig {
            block_exp,
            pg_id,
            dir: dir.into(),
            split_count: 0,
            stripe_size: 0,
            config_dirs: Vec::new(),
            io_warning_threshold_millis: IO_WARNING_THRESHOLD_MILLIS_DEFAULT,
        }
    }

    /// Store striped across `split_count` files placed round-robin over
    /// `config_dirs`.
    pub fn split(
        block_exp: u8,
        pg_id: PartitionGroupId,
        split_count: u32,
        stripe_size: u32,
        config_dirs: Vec<PathBuf>,
    ) -> Self {
        CheckpointConfig {
            block_exp,
            pg_id,
            dir: PathBuf::new(),
            split_count,
            stripe_size,
            config_dirs,
            io_warning_threshold_millis: IO_WARNING_THRESHOLD_MILLIS_DEFAULT,
        }
    }
}

/// Block-addressed checkpoint store over one or more split files.
///
/// Two parallel bitmaps track per-block state: `used` drives allocation,
/// `valid` records membership in the last completed checkpoint and is
/// maintained by the checkpoint layer above. Freed blocks are reclaimed by
/// punching holes, so the logical file length never shrinks outside
/// [`CheckpointFile::truncate`].
#[derive(Debug)]
pub struct CheckpointFile {
    layout: FileLayout,
    pg_id: PartitionGroupId,
    dir: PathBuf,
    files: SplitFileSet,
    used_bits: BitVec,
    valid_bits: BitVec,
    free_bit_count: u64,
    search_cursor: u64,
}

impl CheckpointFile {
    /// Validate the configuration and build a closed store. No file is
    /// touched until [`CheckpointFile::open`].
    pub fn new(config: CheckpointConfig) -> Result<Self> {
        let layout = FileLayout::new(config.block_exp, config.split_count, config.stripe_size);
        let split_count = layout.split_count() as usize;
        let mut dirs = Vec::with_capacity(split_count);

        if layout.split_mode() {
            if config.config_dirs.is_empty() {
                return Err(CheckpointError::InvalidDirectory(
                    "checkpoint directory list is empty".into(),
                ));
            }
            if config.config_dirs.len() > split_count {
                return Err(CheckpointError::InvalidDirectory(
                    "more checkpoint directories than file splits".into(),
                ));
            }
            if config.split_count > SPLIT_COUNT_LIMIT {
                return Err(CheckpointError::InvalidDirectory(format!(
                    "file split count {} exceeds limit {}",
                    config.split_count, SPLIT_COUNT_LIMIT
                )));
            }
            if config.stripe_size == 0 {
                return Err(CheckpointError::InvalidDirectory(
                    "stripe size must be nonzero in split mode".into(),
                ));
            }
            if config.stripe_size > STRIPE_SIZE_LIMIT {
                return Err(CheckpointError::InvalidDirectory(format!(
                    "stripe size {} exceeds limit {}",
                    config.stripe_size, STRIPE_SIZE_LIMIT
                )));
            }
            for i in 0..split_count {
                let dir = &config.config_dirs[i % config.config_dirs.len()];
                if dir.exists() && !dir.is_dir() {
                    return Err(CheckpointError::InvalidDirectory(format!(
                        "path exists but is not a directory: {}",
                        dir.display()
                    )));
                }
                dirs.push(dir.clone());
            }
        } else {
            if !config.config_dirs.is_empty() {
                return Err(CheckpointError::InvalidDirectory(
                    "directory list given but split count is 0".into(),
                ));
            }
            dirs.push(config.dir.clone());
        }

        let files = SplitFileSet::new(
            layout,
            config.pg_id,
            dirs,
            config.io_warning_threshold_millis,
        );
        Ok(CheckpointFile {
            layout,
            pg_id: config.pg_id,
            dir: config.dir,
            files,
            used_bits: BitVec::with_capacity(10240),
            valid_bits: BitVec::with_capacity(10240),
            free_bit_count: 0,
            search_cursor: 0,
        })
    }

    /// Open every split and size the bitmaps. `check_only` opens read-only
    /// without locking and requires the files to exist; `create_mode` allows
    /// creating missing files. Returns `true` when the store is fresh.
    pub fn open(&mut self, check_only: bool, create_mode: bool) -> Result<bool> {
        let fresh = self.files.open_all(check_only, create_mode)?;
        let total = self.files.block_count();
        // Grow hint: pads both bitmaps with zero bits past the current end,
        // so early allocations on a small store reuse them instead of
        // appending one at a time.
        self.used_bits.reserve(total + 1);
        self.used_bits.set(total + 1, false);
        self.valid_bits.reserve(total + 1);
        self.valid_bits.set(total + 1, false);
        self.free_bit_count = self.used_bits.len();
        self.search_cursor = 0;
        debug_assert!(self.free_bit_count <= self.used_bits.len());
        Ok(fresh)
    }

    /// Reset the store to empty: every split truncated, both bitmaps
    /// dropped, all allocation state cleared.
    pub fn truncate(&mut self) -> Result<()> {
        self.files.truncate_all()?;
        self.free_bit_count = 0;
        self.search_cursor = 0;
        self.used_bits.reset();
        self.valid_bits.reset();
        Ok(())
    }

    /// Best-effort page-cache advice for every open split (for example
    /// [`FADVISE_DONTNEED`] after a checkpoint completes). Failures are
    /// logged, never returned.
    pub fn advise(&self, advice: i32) {
        self.files.advise(advice);
    }

    /// Allocate a block: scan up to the probe budget for a reusable free
    /// block starting at the cursor (wrapping once), otherwise append a new
    /// block at the end of the bitmap.
    pub fn allocate_block(&mut self) -> u64 {
        let mut allocate_pos = None;
        let size = self.used_bits.len();
        let mut count = 0u32;
        let mut pos = self.search_cursor;

        if self.free_bit_count > 0 {
            let start_pos = self.search_cursor;
            while pos < size {
                if !self.used_bits.get(pos) {
                    allocate_pos = Some(pos);
                    break;
                }
                if count > ALLOCATE_BLOCK_SEARCH_LIMIT {
                    break;
                }
                pos += 1;
                count += 1;
            }
            if allocate_pos.is_none() && count <= ALLOCATE_BLOCK_SEARCH_LIMIT {
                pos = 0;
                while pos < start_pos {
                    if !self.used_bits.get(pos) {
                        allocate_pos = Some(pos);
                        break;
                    }
                    if count > ALLOCATE_BLOCK_SEARCH_LIMIT {
                        break;
                    }
                    pos += 1;
                    count += 1;
                }
            }
            // The cursor advances past wherever the scan stopped, budget
            // exhaustion included, to bias the next search away from the
            // region just probed.
            self.search_cursor = pos + 1;
            if self.search_cursor >= size {
                self.search_cursor = 0;
            }
        }

        let block_no = match allocate_pos {
            Some(pos) => {
                trace!("allocate block (reuse): {pos}");
                pos
            }
            None => {
                let index = self.used_bits.append(true);
                self.valid_bits.set(index, false);
                trace!("allocate block (new): {index}");
                index
            }
        };
        self.set_used_block_info(block_no, true);
        block_no
    }

    /// Release an allocated block. The valid bit is left untouched.
    pub fn free_block(&mut self, block_no: u64) {
        trace!("free block: {block_no}");
        debug_assert!(self.used_bits.len() >= block_no);
        debug_assert!(self.used_bits.get(block_no));
        self.set_used_block_info(block_no, false);
    }

    /// Single chokepoint for used-bit mutation; keeps the free counter
    /// consistent with the bit's transition.
    pub fn set_used_block_info(&mut self, block_no: u64, flag: bool) {
        let old = self.used_bits.get(block_no);
        self.used_bits.set(block_no, flag);
        if flag && !old {
            debug_assert!(self.free_bit_count != 0);
            self.free_bit_count -= 1;
        } else if !flag && old {
            self.free_bit_count += 1;
        }
        debug_assert!(self.free_bit_count <= self.used_bits.len());
    }

    pub fn get_used_block_info(&self, block_no: u64) -> bool {
        self.used_bits.get(block_no)
    }

    /// Resize the used bitmap to the store's block count, all free.
    pub fn initialize_used_block_info(&mut self) {
        let block_count = self.files.block_count();
        self.used_bits.clear();
        self.used_bits.reserve(block_count);
        self.free_bit_count = block_count;
        for _ in 0..block_count {
            self.used_bits.append(false);
        }
        debug_assert!(self.free_bit_count <= self.used_bits.len());
    }

    pub fn set_valid_block_info(&mut self, block_no: u64, flag: bool) {
        self.valid_bits.set(block_no, flag);
    }

    pub fn get_valid_block_info(&self, block_no: u64) -> bool {
        self.valid_bits.get(block_no)
    }

    /// Resize the valid bitmap to the store's block count, all clear.
    pub fn initialize_valid_block_info(&mut self) {
        let block_count = self.files.block_count();
        self.valid_bits.clear();
        self.valid_bits.reserve(block_count);
        for _ in 0..block_count {
            self.valid_bits.append(false);
        }
    }

    /// Read access to the used bitmap, e.g. for external serialization.
    pub fn used_bitmap(&self) -> &BitVec {
        &self.used_bits
    }

    /// Read access to the valid bitmap.
    pub fn valid_bitmap(&self) -> &BitVec {
        &self.valid_bits
    }

    /// Replace the used bitmap from externally persisted state; the free
    /// counter is recomputed from the restored bits.
    pub fn restore_used_bitmap(&mut self, bits: BitVec) {
        self.free_bit_count = bits.count_zeros();
        self.used_bits = bits;
    }

    /// Replace the valid bitmap from externally persisted state.
    pub fn restore_valid_bitmap(&mut self, bits: BitVec) {
        self.valid_bits = bits;
    }

    /// Deallocate `size` bytes at logical byte `offset` via a filesystem hole
    /// punch, preserving logical file length.
    pub fn punch_hole_block(&mut self, size: u32, offset: u64) -> Result<()> {
        self.files.punch_hole(size, offset)
    }

    /// Reclamation sweep: punch a hole for every unused block (block 0 is
    /// reserved and skipped). Aborts on the first punch failure.
    pub fn zerofill_unused_block(&mut self) -> Result<()> {
        #[cfg(target_os = "linux")]
        {
            let block_num = self.used_bits.len();
            let block_size = self.layout.block_size();
            let start = Instant::now();
            let mut punch_count = 0u64;
            let mut total_count = 0u64;
            for i in 1..block_num {
                if !self.used_bits.get(i) {
                    self.files.punch_hole(block_size as u32, i * block_size)?;
                    punch_count += 1;
                    total_count += 1;
                }
            }
            let lap = start.elapsed().as_millis() as u64;
            info!(
                target: IO_MONITOR_TARGET,
                "hole punch pass: elapsed_ms={}, file={}, pg_id={}, punched={}, hole_blocks={}, total_blocks={}",
                lap,
                self.files.path(0).display(),
                self.pg_id,
                punch_count,
                total_count,
                block_num
            );
        }
        Ok(())
    }

    /// Write whole blocks at `block_no`; `buf` must be a nonzero multiple of
    /// the block size. Extends the store when writing past the end. Returns
    /// the number of blocks written.
    pub fn write_block(&mut self, buf: &[u8], block_no: u64) -> Result<u32> {
        debug_assert!(!buf.is_empty());
        debug_assert_eq!(buf.len() as u64 % self.layout.block_size(), 0);
        self.files.write_block(buf, block_no)
    }

    /// Byte-addressed partial write for headers/footers within a block.
    /// Returns the number of bytes written.
    pub fn write_partial_block(&mut self, buf: &[u8], offset: u64) -> Result<usize> {
        self.files.write_partial(buf, offset)
    }

    /// Read whole blocks starting at `block_no` into `buf`. Returns the
    /// number of blocks read; 0 when the backing split has never been
    /// materialized on disk.
    pub fn read_block(&mut self, buf: &mut [u8], block_no: u64) -> Result<u64> {
        let size = (buf.len() as u64) >> self.layout.block_exp();
        debug_assert_eq!(buf.len() as u64 % self.layout.block_size(), 0);
        let block_count = self.files.block_count();
        if size == 0 || block_count < size + block_no - 1 {
            return Err(CheckpointError::ReadChunkFailed(format!(
                "invalid range: size={}, block_no={}, block_count={}",
                size, block_no, block_count
            )));
        }
        self.files.read_block(buf, block_no)
    }

    /// fsync every open split. Writes are durable only after this returns.
    pub fn flush(&mut self) -> Result<()> {
        self.files.flush()
    }

    /// Close every split, releasing the advisory locks. Idempotent; later
    /// I/O lazily reopens the splits it touches.
    pub fn close(&mut self) {
        self.files.close();
    }

    /// Logical store size in blocks.
    pub fn block_count(&self) -> u64 {
        self.files.block_count()
    }

    /// Zero bits in the used bitmap.
    pub fn free_bit_count(&self) -> u64 {
        self.free_bit_count
    }

    /// Sum of physical file sizes across open splits.
    pub fn file_size(&self) -> Result<u64> {
        self.files.file_size()
    }

    /// Physical size of one split; 0 when its handle is closed.
    pub fn split_file_size(&self, split_id: u32) -> Result<u64> {
        debug_assert!(split_id < self.layout.split_count());
        self.files.split_file_size(split_id)
    }

    /// Block count of one split as observed at open/truncate time.
    pub fn split_block_count(&self, split_id: u32) -> u64 {
        debug_assert!(split_id < self.layout.split_count());
        self.files.split_block_count(split_id as usize)
    }

    /// Physically allocated bytes across splits; shrinks as holes are
    /// punched. 0 while the store holds no blocks.
    pub fn file_allocate_size(&self) -> Result<u64> {
        self.files.allocate_size()
    }

    /// Allocation unit of the filesystem holding `dir`.
    pub fn file_system_block_size(dir: impl AsRef<Path>) -> Result<u64> {
        file::fs_block_size(dir.as_ref())
    }

    /// Allocation unit of the filesystem holding this store's directory.
    pub fn store_file_system_block_size(&self) -> Result<u64> {
        file::fs_block_size(&self.dir)
    }

    pub fn read_block_count(&self) -> u64 {
        self.files.read_block_count()
    }

    pub fn write_block_count(&self) -> u64 {
        self.files.write_block_count()
    }

    pub fn read_retry_count(&self) -> u64 {
        self.files.read_retry_count()
    }

    pub fn write_retry_count(&self) -> u64 {
        self.files.write_retry_count()
    }

    pub fn reset_read_block_count(&mut self) {
        self.files.reset_read_block_count();
    }

    pub fn reset_write_block_count(&mut self) {
        self.files.reset_write_block_count();
    }

    pub fn reset_read_retry_count(&mut self) {
        self.files.reset_read_retry_count();
    }

    pub fn reset_write_retry_count(&mut self) {
        self.files.reset_write_retry_count();
    }

    /// First split's file name, for diagnostics.
    pub fn dump(&self) -> String {
        self.files.path(0).display().to_string()
    }

    pub fn dump_used_block_info(&self) -> String {
        self.used_bits.dump_unit()
    }

    pub fn dump_valid_block_info(&self) -> String {
        self.valid_bits.dump_unit()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn open_single(dir: &TempDir, block_exp: u8, pg_id: PartitionGroupId) -> CheckpointFile {
        let mut cp =
            CheckpointFile::new(CheckpointConfig::single(block_exp, dir.path(), pg_id)).unwrap();
        assert!(cp.open(false, true).unwrap());
        cp
    }

    #[test]
    fn fresh_store_allocation_sequence() {
        let dir = TempDir::new().unwrap();
        let mut cp = open_single(&dir, 12, 0);

        assert_eq!(cp.allocate_block(), 0);
        assert_eq!(cp.allocate_block(), 1);
        cp.free_block(0);
        // Cursor scan finds the freed block again.
        assert_eq!(cp.allocate_block(), 0);
        assert_eq!(cp.free_bit_count(), 0);
    }

    #[test]
    fn allocation_appends_when_no_bit_is_free() {
        let dir = TempDir::new().unwrap();
        let mut cp = open_single(&dir, 12, 0);

        // Exhaust the two grow-hint bits, then appends take over.
        assert_eq!(cp.allocate_block(), 0);
        assert_eq!(cp.allocate_block(), 1);
        assert_eq!(cp.allocate_block(), 2);
        assert_eq!(cp.allocate_block(), 3);
        assert_eq!(cp.used_bitmap().len(), 4);
        assert_eq!(cp.free_bit_count(), 0);
    }

    #[test]
    fn cursor_spreads_reuse() {
        let dir = TempDir::new().unwrap();
        let mut cp = open_single(&dir, 12, 0);

        for _ in 0..4 {
            cp.allocate_block();
        }
        cp.free_block(1);
        cp.free_block(3);
        // Cursor sits past the last scan; the nearer free block wins first.
        assert_eq!(cp.allocate_block(), 1);
        assert_eq!(cp.allocate_block(), 3);
    }

    #[test]
    fn allocate_returns_unique_blocks_until_free() {
        let dir = TempDir::new().unwrap();
        let mut cp = open_single(&dir, 12, 0);

        let mut seen = std::collections::HashSet::new();
        for _ in 0..64 {
            assert!(seen.insert(cp.allocate_block()));
        }
    }

    #[test]
    fn set_used_twice_keeps_free_count() {
        let dir = TempDir::new().unwrap();
        let mut cp = open_single(&dir, 12, 0);

        let block = cp.allocate_block();
        let free = cp.free_bit_count();
        cp.set_used_block_info(block, true);
        cp.set_used_block_info(block, true);
        assert_eq!(cp.free_bit_count(), free);
    }

    #[test]
    fn free_count_tracks_transitions() {
        let dir = TempDir::new().unwrap();
        let mut cp = open_single(&dir, 12, 0);

        let initial = cp.free_bit_count();
        assert_eq!(initial, cp.used_bitmap().len());

        let block = cp.allocate_block();
        assert_eq!(cp.free_bit_count(), initial - 1);
        cp.free_block(block);
        assert_eq!(cp.free_bit_count(), initial);
    }

    #[test]
    fn initialize_resets_bitmaps_to_block_count() {
        let dir = TempDir::new().unwrap();
        let mut cp = open_single(&dir, 12, 0);

        cp.write_block(&[0u8; 4096 * 5], 0).unwrap();
        assert_eq!(cp.block_count(), 5);

        cp.initialize_used_block_info();
        cp.initialize_valid_block_info();
        assert_eq!(cp.used_bitmap().len(), 5);
        assert_eq!(cp.valid_bitmap().len(), 5);
        assert_eq!(cp.free_bit_count(), 5);
        assert!(!cp.get_used_block_info(3));
        assert!(!cp.get_valid_block_info(3));
    }

    #[test]
    fn valid_bits_are_independent_of_used() {
        let dir = TempDir::new().unwrap();
        let mut cp = open_single(&dir, 12, 0);

        let block = cp.allocate_block();
        cp.set_valid_block_info(block, true);
        assert!(cp.get_valid_block_info(block));
        cp.free_block(block);
        // Freeing only clears the used bit.
        assert!(cp.get_valid_block_info(block));
        assert!(!cp.get_used_block_info(block));
    }

    #[test]
    fn restore_recomputes_free_count() {
        let dir = TempDir::new().unwrap();
        let mut cp = open_single(&dir, 12, 0);

        let mut bits = BitVec::new();
        for i in 0..10 {
            bits.append(i % 2 == 0);
        }
        cp.restore_used_bitmap(bits);
        assert_eq!(cp.free_bit_count(), 5);
        assert!(cp.get_used_block_info(0));
        assert!(!cp.get_used_block_info(1));
    }

    #[test]
    fn read_range_precondition() {
        let dir = TempDir::new().unwrap();
        let mut cp = open_single(&dir, 12, 0);
        cp.write_block(&[1u8; 4096 * 2], 0).unwrap();

        let mut buf = vec![0u8; 4096 * 2];
        let err = cp.read_block(&mut buf, 2).unwrap_err();
        assert!(matches!(err, CheckpointError::ReadChunkFailed(_)));
        assert_eq!(err.code(), 4);
    }

    #[test]
    fn read_one_past_end_is_io_error() {
        // The range check accepts a single-block read at exactly block_count;
        // the failure then surfaces from the read loop instead.
        let dir = TempDir::new().unwrap();
        let mut cp = open_single(&dir, 12, 0);
        cp.write_block(&[1u8; 4096 * 2], 0).unwrap();

        let mut buf = vec![0u8; 4096];
        let err = cp.read_block(&mut buf, 2).unwrap_err();
        assert!(matches!(err, CheckpointError::Io { .. }));
    }

    #[test]
    fn overwrite_does_not_extend() {
        let dir = TempDir::new().unwrap();
        let mut cp = open_single(&dir, 12, 0);

        cp.write_block(&[1u8; 4096], 1).unwrap();
        assert_eq!(cp.block_count(), 2);
        cp.write_block(&[2u8; 4096], 1).unwrap();
        assert_eq!(cp.block_count(), 2);
        assert_eq!(cp.write_block_count(), 2);
    }

    #[test]
    fn counters_reset() {
        let dir = TempDir::new().unwrap();
        let mut cp = open_single(&dir, 12, 0);

        cp.write_block(&[1u8; 4096], 0).unwrap();
        let mut buf = vec![0u8; 4096];
        cp.read_block(&mut buf, 0).unwrap();
        assert_eq!(cp.write_block_count(), 1);
        assert_eq!(cp.read_block_count(), 1);

        cp.reset_write_block_count();
        cp.reset_read_block_count();
        cp.reset_write_retry_count();
        cp.reset_read_retry_count();
        assert_eq!(cp.write_block_count(), 0);
        assert_eq!(cp.read_block_count(), 0);
        assert_eq!(cp.write_retry_count(), 0);
        assert_eq!(cp.read_retry_count(), 0);
    }

    #[test]
    fn split_config_validation() {
        let dir = TempDir::new().unwrap();
        let d = dir.path().to_path_buf();

        let err = CheckpointFile::new(CheckpointConfig::split(12, 0, 2, 1, vec![])).unwrap_err();
        assert!(matches!(err, CheckpointError::InvalidDirectory(_)));

        let err = CheckpointFile::new(CheckpointConfig::split(
            12,
            0,
            1,
            1,
            vec![d.clone(), d.clone()],
        ))
        .unwrap_err();
        assert!(matches!(err, CheckpointError::InvalidDirectory(_)));

        let err = CheckpointFile::new(CheckpointConfig::split(
            12,
            0,
            SPLIT_COUNT_LIMIT + 1,
            1,
            vec![d.clone()],
        ))
        .unwrap_err();
        assert!(matches!(err, CheckpointError::InvalidDirectory(_)));

        let err =
            CheckpointFile::new(CheckpointConfig::split(12, 0, 2, 0, vec![d.clone()])).unwrap_err();
        assert!(matches!(err, CheckpointError::InvalidDirectory(_)));

        let err = CheckpointFile::new(CheckpointConfig::split(
            12,
            0,
            2,
            STRIPE_SIZE_LIMIT + 1,
            vec![d.clone()],
        ))
        .unwrap_err();
        assert!(matches!(err, CheckpointError::InvalidDirectory(_)));

        // A plain file where a directory is expected.
        let file_path = dir.path().join("not_a_dir");
        std::fs::write(&file_path, b"x").unwrap();
        let err =
            CheckpointFile::new(CheckpointConfig::split(12, 0, 2, 1, vec![file_path])).unwrap_err();
        assert!(matches!(err, CheckpointError::InvalidDirectory(_)));

        // Single mode rejects a directory list.
        let mut config = CheckpointConfig::single(12, dir.path(), 0);
        config.config_dirs = vec![d];
        let err = CheckpointFile::new(config).unwrap_err();
        assert!(matches!(err, CheckpointError::InvalidDirectory(_)));
    }

    #[test]
    fn dump_names_first_split() {
        let dir = TempDir::new().unwrap();
        let cp = CheckpointFile::new(CheckpointConfig::single(12, dir.path(), 9)).unwrap();
        assert!(cp.dump().ends_with("gs_cp_9_1.dat"));
    }

    #[test]
    fn store_fs_block_size() {
        let dir = TempDir::new().unwrap();
        let cp = CheckpointFile::new(CheckpointConfig::single(12, dir.path(), 0)).unwrap();
        assert!(cp.store_file_system_block_size().unwrap() >= 512);
        assert!(CheckpointFile::file_system_block_size(dir.path()).unwrap() >= 512);
    }
}
