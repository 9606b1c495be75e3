//! Physical file management for a split checkpoint store.
//!
//! One logical store is backed by one file per split. This module owns the
//! handles: creation, opening, advisory locking, full-transfer read/write
//! loops with retry accounting, fsync, sparse hole punching, and page-cache
//! advice. Operations that exceed the configured latency threshold emit a
//! `[LONG I/O]` warning on the `io_monitor` trace channel.

use crate::error::{CheckpointError, Result};
use crate::layout::FileLayout;
use crate::{PartitionGroupId, IO_MONITOR_TARGET};
use std::fs::{File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{info, warn};

/// Named file handles for every split, plus the I/O counters the facade
/// exposes. Block addressing goes through the layout on every operation so
/// reads, writes, and hole punches agree on placement.
#[derive(Debug)]
pub(crate) struct SplitFileSet {
    layout: FileLayout,
    pg_id: PartitionGroupId,
    dirs: Vec<PathBuf>,
    paths: Vec<PathBuf>,
    files: Vec<Option<File>>,
    split_block_counts: Vec<u64>,
    /// Logical store size in blocks; grows when writes extend the store.
    block_count: u64,
    read_block_count: u64,
    write_block_count: u64,
    read_retry_count: u64,
    write_retry_count: u64,
    warn_threshold_millis: u64,
}

impl SplitFileSet {
    /// `dirs` must hold one resolved directory per split (possibly empty for
    /// the single-file mode's bare relative name).
    pub(crate) fn new(
        layout: FileLayout,
        pg_id: PartitionGroupId,
        dirs: Vec<PathBuf>,
        warn_threshold_millis: u64,
    ) -> Self {
        let count = layout.split_count() as usize;
        debug_assert_eq!(dirs.len(), count);
        let paths: Vec<PathBuf> = (0..count)
            .map(|i| dirs[i].join(layout.file_name(pg_id, i as u32)))
            .collect();
        SplitFileSet {
            layout,
            pg_id,
            dirs,
            paths,
            files: (0..count).map(|_| None).collect(),
            split_block_counts: vec![0; count],
            block_count: 0,
            read_block_count: 0,
            write_block_count: 0,
            read_retry_count: 0,
            write_retry_count: 0,
            warn_threshold_millis,
        }
    }

    /// Open (or create) every split. Returns `true` when the store is fresh,
    /// i.e. the total block count across splits is zero.
    pub(crate) fn open_all(&mut self, check_only: bool, create_mode: bool) -> Result<bool> {
        let mut total = 0u64;
        for i in 0..self.paths.len() {
            self.check_directory(i)?;
            let path = self.paths[i].clone();
            if path.exists() {
                self.files[i] = None;
                let file = if check_only {
                    OpenOptions::new().read(true).open(&path)
                } else {
                    OpenOptions::new().read(true).write(true).open(&path)
                }
                .map_err(|e| {
                    CheckpointError::io(
                        format!("open failed: file={}, pg_id={}", path.display(), self.pg_id),
                        e,
                    )
                })?;
                if !check_only {
                    lock_exclusive(&file, &path)?;
                }
                let size = file
                    .metadata()
                    .map_err(|e| {
                        CheckpointError::io(format!("stat failed: file={}", path.display()), e)
                    })?
                    .len();
                let blocks = (size + self.layout.block_size() - 1) / self.layout.block_size();
                self.split_block_counts[i] = blocks;
                total += blocks;
                self.files[i] = Some(file);
            } else {
                if check_only {
                    return Err(CheckpointError::FileNotFound(format!(
                        "missing despite check only: {}",
                        path.display()
                    )));
                }
                if !create_mode {
                    return Err(CheckpointError::FileNotFound(path.display().to_string()));
                }
                let file = OpenOptions::new()
                    .read(true)
                    .write(true)
                    .create(true)
                    .open(&path)
                    .map_err(|e| {
                        CheckpointError::io(
                            format!("create failed: file={}, pg_id={}", path.display(), self.pg_id),
                            e,
                        )
                    })?;
                lock_exclusive(&file, &path)?;
                self.split_block_counts[i] = 0;
                self.files[i] = Some(file);
            }
        }
        self.block_count = total;
        Ok(total == 0)
    }

    /// Reopen every split truncated to zero length, discarding contents.
    pub(crate) fn truncate_all(&mut self) -> Result<()> {
        for i in 0..self.paths.len() {
            self.files[i] = None;
            let path = self.paths[i].clone();
            let file = OpenOptions::new()
                .read(true)
                .write(true)
                .create(true)
                .truncate(true)
                .open(&path)
                .map_err(|e| {
                    CheckpointError::io(
                        format!("truncate failed: file={}, pg_id={}", path.display(), self.pg_id),
                        e,
                    )
                })?;
            warn!("checkpoint file truncated: {}", path.display());
            lock_exclusive(&file, &path)?;
            self.files[i] = Some(file);
            self.split_block_counts[i] = 0;
        }
        self.block_count = 0;
        Ok(())
    }

    fn check_directory(&self, i: usize) -> Result<()> {
        let dir = &self.dirs[i];
        if !self.layout.split_mode() && dir.as_os_str().is_empty() {
            return Ok(());
        }
        if !dir.exists() {
            return Err(CheckpointError::InvalidDirectory(format!(
                "directory not found: {}",
                dir.display()
            )));
        }
        if !dir.is_dir() {
            return Err(CheckpointError::InvalidDirectory(format!(
                "not a directory: {}",
                dir.display()
            )));
        }
        Ok(())
    }

    /// Open split `nth` read-write, creating it if necessary.
    fn ensure_open_rw(&mut self, nth: usize) -> Result<()> {
        if self.files[nth].is_some() {
            return Ok(());
        }
        let path = &self.paths[nth];
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .open(path)
            .map_err(|e| {
                CheckpointError::io(
                    format!("open failed: file={}, pg_id={}", path.display(), self.pg_id),
                    e,
                )
            })?;
        lock_exclusive(&file, path)?;
        self.files[nth] = Some(file);
        Ok(())
    }

    /// Read whole blocks starting at `block_no` into `buf`. Returns the
    /// number of blocks read, or 0 when the backing split has never been
    /// materialized on disk.
    pub(crate) fn read_block(&mut self, buf: &mut [u8], block_no: u64) -> Result<u64> {
        let offset = block_no * self.layout.block_size();
        let nth = self.layout.split_index_of(offset);
        let file_offset = self.layout.file_offset_of(offset);

        if self.files[nth].is_none() {
            if self.paths[nth].exists() {
                self.ensure_open_rw(nth)?;
            } else {
                return Ok(0);
            }
        }

        let size_blocks = (buf.len() as u64) >> self.layout.block_exp();
        let start = Instant::now();
        let mut retries = 0u64;
        let result = match self.files[nth].as_ref() {
            Some(file) => read_full(file, buf, file_offset, &mut retries),
            None => return Ok(0),
        };
        result.map_err(|e| {
            CheckpointError::io(
                format!(
                    "read failed: file={}, pg_id={}, block_no={}",
                    self.paths[nth].display(),
                    self.pg_id,
                    block_no
                ),
                e,
            )
        })?;
        self.read_retry_count += retries;
        self.read_block_count += size_blocks;
        self.warn_if_slow("read", start, nth, file_offset, buf.len());
        Ok(size_blocks)
    }

    /// Write whole blocks at `block_no`, extending the logical block count
    /// when the write lands past the current end. Returns the block count
    /// written.
    pub(crate) fn write_block(&mut self, buf: &[u8], block_no: u64) -> Result<u32> {
        let offset = block_no * self.layout.block_size();
        let nth = self.layout.split_index_of(offset);
        let file_offset = self.layout.file_offset_of(offset);
        self.ensure_open_rw(nth)?;

        let size_blocks = (buf.len() as u64) >> self.layout.block_exp();
        let start = Instant::now();
        let mut retries = 0u64;
        let result = match self.files[nth].as_ref() {
            Some(file) => write_full(file, buf, file_offset, &mut retries),
            None => Err(io::Error::new(
                io::ErrorKind::NotFound,
                "split handle unavailable",
            )),
        };
        result.map_err(|e| {
            CheckpointError::write(
                format!(
                    "file={}, pg_id={}, block_no={}",
                    self.paths[nth].display(),
                    self.pg_id,
                    block_no
                ),
                e,
            )
        })?;
        self.write_retry_count += retries;
        self.write_block_count += size_blocks;
        if self.block_count < block_no + size_blocks {
            self.block_count = block_no + size_blocks;
            info!(
                "checkpoint file extended: file={}, block_count={}",
                self.paths[0].display(),
                self.block_count
            );
        }
        self.warn_if_slow("write", start, nth, file_offset, buf.len());
        Ok(size_blocks as u32)
    }

    /// Byte-addressed partial write (block headers/footers). Extends the
    /// logical block count to cover the written range. Returns bytes written.
    pub(crate) fn write_partial(&mut self, buf: &[u8], offset: u64) -> Result<usize> {
        let nth = self.layout.split_index_of(offset);
        let file_offset = self.layout.file_offset_of(offset);
        self.ensure_open_rw(nth)?;

        let start = Instant::now();
        let mut retries = 0u64;
        let result = match self.files[nth].as_ref() {
            Some(file) => write_full(file, buf, file_offset, &mut retries),
            None => Err(io::Error::new(
                io::ErrorKind::NotFound,
                "split handle unavailable",
            )),
        };
        result.map_err(|e| {
            CheckpointError::write(
                format!(
                    "file={}, pg_id={}, offset={}, size={}",
                    self.paths[nth].display(),
                    self.pg_id,
                    file_offset,
                    buf.len()
                ),
                e,
            )
        })?;
        self.write_retry_count += retries;
        let end = offset + buf.len() as u64;
        if self.block_count * self.layout.block_size() < end {
            self.block_count = (end + self.layout.block_size() - 1) >> self.layout.block_exp();
            info!(
                "checkpoint file extended: file={}, block_count={}",
                self.paths[0].display(),
                self.block_count
            );
        }
        self.warn_if_slow("write", start, nth, file_offset, buf.len());
        Ok(buf.len())
    }

    /// Deallocate `size` bytes at logical byte `offset`, preserving file
    /// length. No-op when the split handle is closed or the platform lacks
    /// hole punching.
    #[cfg(target_os = "linux")]
    pub(crate) fn punch_hole(&mut self, size: u32, offset: u64) -> Result<()> {
        use std::os::unix::io::AsRawFd;

        let start = Instant::now();
        let nth = self.layout.split_index_of(offset);
        let file_offset = self.layout.file_offset_of(offset);
        if size > 0 {
            if let Some(file) = self.files[nth].as_ref() {
                let rc = unsafe {
                    libc::fallocate(
                        file.as_raw_fd(),
                        libc::FALLOC_FL_PUNCH_HOLE | libc::FALLOC_FL_KEEP_SIZE,
                        file_offset as libc::off_t,
                        libc::off_t::from(size),
                    )
                };
                if rc != 0 {
                    return Err(CheckpointError::io(
                        format!(
                            "hole punch failed: file={}, pg_id={}, offset={}, size={}",
                            self.paths[nth].display(),
                            self.pg_id,
                            file_offset,
                            size
                        ),
                        io::Error::last_os_error(),
                    ));
                }
            }
        }
        let lap = start.elapsed().as_millis() as u64;
        if lap > self.warn_threshold_millis {
            warn!(
                target: IO_MONITOR_TARGET,
                "[LONG I/O] hole punch took {}ms: file={}, pg_id={}, offset={}, size={}, write_blocks={}",
                lap,
                self.paths[nth].display(),
                self.pg_id,
                file_offset,
                size,
                self.write_block_count
            );
        }
        Ok(())
    }

    #[cfg(not(target_os = "linux"))]
    pub(crate) fn punch_hole(&mut self, _size: u32, _offset: u64) -> Result<()> {
        Ok(())
    }

    /// fsync every open split.
    pub(crate) fn flush(&mut self) -> Result<()> {
        for i in 0..self.files.len() {
            if let Some(file) = self.files[i].as_ref() {
                let start = Instant::now();
                file.sync_all().map_err(|e| {
                    CheckpointError::io(
                        format!("sync failed: file={}", self.paths[i].display()),
                        e,
                    )
                })?;
                let lap = start.elapsed().as_millis() as u64;
                if lap > self.warn_threshold_millis {
                    warn!(
                        target: IO_MONITOR_TARGET,
                        "[LONG I/O] sync took {}ms: file={}",
                        lap,
                        self.paths[i].display()
                    );
                }
            }
        }
        Ok(())
    }

    /// Close every split; advisory locks are released with the handles.
    /// Idempotent.
    pub(crate) fn close(&mut self) {
        for slot in &mut self.files {
            *slot = None;
        }
    }

    /// Best-effort page-cache advice for every open split. Failures are
    /// logged, never propagated.
    #[cfg(target_os = "linux")]
    pub(crate) fn advise(&self, advice: i32) {
        use std::os::unix::io::AsRawFd;

        for (i, slot) in self.files.iter().enumerate() {
            if let Some(file) = slot {
                let rc = unsafe { libc::posix_fadvise(file.as_raw_fd(), 0, 0, advice) };
                if rc > 0 {
                    warn!(
                        "fadvise failed: file={}, pg_id={}, advice={}, rc={}",
                        self.paths[i].display(),
                        self.pg_id,
                        advice,
                        rc
                    );
                } else {
                    tracing::debug!(
                        "fadvise applied: file={}, pg_id={}, advice={}",
                        self.paths[i].display(),
                        self.pg_id,
                        advice
                    );
                }
            }
        }
    }

    #[cfg(not(target_os = "linux"))]
    pub(crate) fn advise(&self, _advice: i32) {}

    /// Sum of physical file sizes across open splits.
    pub(crate) fn file_size(&self) -> Result<u64> {
        let mut total = 0u64;
        for (i, slot) in self.files.iter().enumerate() {
            if let Some(file) = slot {
                total += file
                    .metadata()
                    .map_err(|e| {
                        CheckpointError::io(
                            format!("stat failed: file={}", self.paths[i].display()),
                            e,
                        )
                    })?
                    .len();
            }
        }
        Ok(total)
    }

    /// Physical size of one split; 0 when its handle is closed.
    pub(crate) fn split_file_size(&self, split_id: u32) -> Result<u64> {
        let i = split_id as usize;
        match self.files.get(i).and_then(Option::as_ref) {
            Some(file) => Ok(file
                .metadata()
                .map_err(|e| {
                    CheckpointError::io(format!("stat failed: file={}", self.paths[i].display()), e)
                })?
                .len()),
            None => Ok(0),
        }
    }

    /// Physically allocated bytes across splits (filesystem block units), so
    /// holes punched out of a sparse file are not counted. Falls back to the
    /// logical size where the platform has no allocation accounting.
    pub(crate) fn allocate_size(&self) -> Result<u64> {
        if self.block_count == 0 {
            return Ok(0);
        }
        #[cfg(unix)]
        {
            use std::os::unix::fs::MetadataExt;
            let mut total = 0u64;
            for (i, slot) in self.files.iter().enumerate() {
                if let Some(file) = slot {
                    let meta = file.metadata().map_err(|e| {
                        CheckpointError::io(
                            format!("stat failed: file={}", self.paths[i].display()),
                            e,
                        )
                    })?;
                    total += meta.blocks() * 512;
                }
            }
            Ok(total)
        }
        #[cfg(not(unix))]
        {
            self.file_size()
        }
    }

    pub(crate) fn block_count(&self) -> u64 {
        self.block_count
    }

    /// Block count of one split as observed at open/truncate time; write
    /// extension is tracked only in the logical total. 0 for an
    /// out-of-range split id.
    pub(crate) fn split_block_count(&self, i: usize) -> u64 {
        self.split_block_counts.get(i).copied().unwrap_or(0)
    }

    pub(crate) fn path(&self, i: usize) -> &Path {
        &self.paths[i]
    }

    pub(crate) fn read_block_count(&self) -> u64 {
        self.read_block_count
    }

    pub(crate) fn write_block_count(&self) -> u64 {
        self.write_block_count
    }

    pub(crate) fn read_retry_count(&self) -> u64 {
        self.read_retry_count
    }

    pub(crate) fn write_retry_count(&self) -> u64 {
        self.write_retry_count
    }

    pub(crate) fn reset_read_block_count(&mut self) {
        self.read_block_count = 0;
    }

    pub(crate) fn reset_write_block_count(&mut self) {
        self.write_block_count = 0;
    }

    pub(crate) fn reset_read_retry_count(&mut self) {
        self.read_retry_count = 0;
    }

    pub(crate) fn reset_write_retry_count(&mut self) {
        self.write_retry_count = 0;
    }

    fn warn_if_slow(&self, op: &str, start: Instant, nth: usize, offset: u64, size: usize) {
        let lap = start.elapsed().as_millis() as u64;
        if lap > self.warn_threshold_millis {
            warn!(
                target: IO_MONITOR_TARGET,
                "[LONG I/O] {} took {}ms: file={}, pg_id={}, offset={}, size={}",
                op,
                lap,
                self.paths[nth].display(),
                self.pg_id,
                offset,
                size
            );
        }
    }
}

/// Acquire a non-blocking exclusive advisory lock; held until the handle is
/// dropped. Failure to lock is fatal for the open.
#[cfg(unix)]
fn lock_exclusive(file: &File, path: &Path) -> Result<()> {
    use std::os::unix::io::AsRawFd;

    let rc = unsafe { libc::flock(file.as_raw_fd(), libc::LOCK_EX | libc::LOCK_NB) };
    if rc != 0 {
        return Err(CheckpointError::io(
            format!("lock failed: file={}", path.display()),
            io::Error::last_os_error(),
        ));
    }
    Ok(())
}

#[cfg(not(unix))]
fn lock_exclusive(_file: &File, _path: &Path) -> Result<()> {
    Ok(())
}

#[cfg(unix)]
fn read_at(file: &File, buf: &mut [u8], offset: u64) -> io::Result<usize> {
    use std::os::unix::fs::FileExt;
    file.read_at(buf, offset)
}

#[cfg(windows)]
fn read_at(file: &File, buf: &mut [u8], offset: u64) -> io::Result<usize> {
    use std::os::windows::fs::FileExt;
    file.seek_read(buf, offset)
}

#[cfg(unix)]
fn write_at(file: &File, buf: &[u8], offset: u64) -> io::Result<usize> {
    use std::os::unix::fs::FileExt;
    file.write_at(buf, offset)
}

#[cfg(windows)]
fn write_at(file: &File, buf: &[u8], offset: u64) -> io::Result<usize> {
    use std::os::windows::fs::FileExt;
    file.seek_write(buf, offset)
}

/// Positional read of the whole buffer, tolerating short and interrupted
/// transfers. Each continuation bumps `retries`. A zero-length transfer means
/// the range extends past end of file and is surfaced as an error rather than
/// retried forever.
fn read_full(file: &File, buf: &mut [u8], offset: u64, retries: &mut u64) -> io::Result<()> {
    let mut done = 0usize;
    while done < buf.len() {
        match read_at(file, &mut buf[done..], offset + done as u64) {
            Ok(0) => {
                return Err(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    "read past end of checkpoint file",
                ))
            }
            Ok(n) => {
                done += n;
                if done < buf.len() {
                    *retries += 1;
                }
            }
            Err(e) if e.kind() == io::ErrorKind::Interrupted => *retries += 1,
            Err(e) => return Err(e),
        }
    }
    Ok(())
}

/// Positional write of the whole buffer; same retry contract as `read_full`.
fn write_full(file: &File, buf: &[u8], offset: u64, retries: &mut u64) -> io::Result<()> {
    let mut done = 0usize;
    while done < buf.len() {
        match write_at(file, &buf[done..], offset + done as u64) {
            Ok(0) => {
                return Err(io::Error::new(
                    io::ErrorKind::WriteZero,
                    "write returned zero bytes",
                ))
            }
            Ok(n) => {
                done += n;
                if done < buf.len() {
                    *retries += 1;
                }
            }
            Err(e) if e.kind() == io::ErrorKind::Interrupted => *retries += 1,
            Err(e) => return Err(e),
        }
    }
    Ok(())
}

/// Allocation unit of the filesystem holding `dir`.
#[cfg(unix)]
pub(crate) fn fs_block_size(dir: &Path) -> Result<u64> {
    use std::os::unix::ffi::OsStrExt;

    let c_dir = std::ffi::CString::new(dir.as_os_str().as_bytes()).map_err(|_| {
        CheckpointError::InvalidDirectory(format!("invalid directory name: {}", dir.display()))
    })?;
    let mut status: libc::statvfs = unsafe { std::mem::zeroed() };
    let rc = unsafe { libc::statvfs(c_dir.as_ptr(), &mut status) };
    if rc != 0 {
        return Err(CheckpointError::io(
            format!("directory access failed: {}", dir.display()),
            io::Error::last_os_error(),
        ));
    }
    Ok(status.f_bsize as u64)
}

#[cfg(not(unix))]
pub(crate) fn fs_block_size(_dir: &Path) -> Result<u64> {
    Ok(4096)
}
