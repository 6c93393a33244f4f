// Library crate for libmemfs: the I/O core of an in-process, in-memory
// filesystem. Paged byte storage, interruptible file locks and seekable
// channels; the path layer and attribute views are external collaborators.

pub mod channel;
pub mod error;
pub mod file;
pub mod interrupt;
pub mod registry;
pub mod store;

pub use channel::{AdvisoryLock, AsyncFileChannel, FileChannel, OpenMode};
pub use error::{FsError, Result};
pub use file::{FileMetadata, RegularFile};
pub use registry::FilesystemState;
pub use store::{DEFAULT_PAGE_SIZE, PageLayout, PagePool, PagedStore};
