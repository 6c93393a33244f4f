//! Open handles on regular files.
//!
//! [`FileChannel`] is the synchronous, seekable handle; [`AsyncFileChannel`]
//! dispatches it onto the runtime's blocking pool; [`AdvisoryLock`] records
//! unenforced byte-range lock grants.

pub mod advisory;
pub mod asynchronous;
pub mod file_channel;

pub use advisory::AdvisoryLock;
pub use asynchronous::AsyncFileChannel;
pub use file_channel::{FileChannel, OpenMode};
