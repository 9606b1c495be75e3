//! # chunkstore — block-addressed checkpoint file store
//!
//! `chunkstore` persists snapshotted chunks of a database partition group in
//! a fixed-block-size store. A single logical store can be striped across
//! several physical files, freed blocks are reclaimed by punching holes into
//! the sparse files rather than truncating, and all block I/O rides full
//! read/write loops that tolerate short transfers and report long operations
//! on a dedicated trace channel.
//!
//! The store is the persistence layer under a checkpoint/recovery subsystem:
//! the layers above decide *when* to allocate, free, flush, and reclaim;
//! this crate provides the addressing, bookkeeping, and resilient I/O.
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use chunkstore::{CheckpointConfig, CheckpointFile};
//!
//! # fn main() -> chunkstore::Result<()> {
//! // 64 KiB blocks, single file, partition group 3.
//! let mut store = CheckpointFile::new(CheckpointConfig::single(16, "/var/lib/db/cp", 3))?;
//! let fresh = store.open(false, true)?;
//! assert!(fresh);
//!
//! let block = store.allocate_block();
//! store.write_block(&vec![0u8; 1 << 16], block)?;
//! store.flush()?;
//!
//! store.free_block(block);
//! store.zerofill_unused_block()?; // return the space to the filesystem
//! # Ok(())
//! # }
//! ```
//!
//! Concurrency: a store instance is single-threaded by contract; the caller
//! serializes mutating operations.

pub mod bitvec;
pub mod checkpoint;
pub mod error;
pub mod layout;

mod file;

pub use bitvec::BitVec;
pub use checkpoint::{CheckpointConfig, CheckpointFile, IO_WARNING_THRESHOLD_MILLIS_DEFAULT};
pub use error::{CheckpointError, Result};
pub use layout::{
    check_file_name, FileLayout, FILE_BASE_NAME, FILE_EXTENSION, SPLIT_COUNT_LIMIT,
    STRIPE_SIZE_LIMIT,
};

/// Identifier of the partition group a checkpoint file belongs to. Opaque to
/// this crate beyond its appearance in file names.
pub type PartitionGroupId = u32;

/// Trace target of the I/O monitor channel (`[LONG I/O]` warnings and
/// hole-punch summaries). Subscribe to this target to watch storage latency.
pub const IO_MONITOR_TARGET: &str = "io_monitor";
