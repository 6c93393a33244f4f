//! Regular files: content store + metadata + the file's reader/writer lock.

pub mod meta;
pub mod regular;
pub mod rwlock;

pub use meta::FileMetadata;
pub use regular::{RegularFile, StoreWriteGuard};
pub use rwlock::{BlockingCtx, InterruptibleRwLock, RwReadGuard, RwWriteGuard, Unblocked};
