//! Byte storage for file content.
//!
//! A file's bytes live in a [`PagedStore`]: a growable run of fixed-size
//! pages addressed by [`PageLayout`] arithmetic. Stores draw pages from a
//! shared, bounded [`PagePool`] so truncate/regrow churn does not translate
//! into allocator churn. The store itself is lock-free and unsynchronized;
//! the owning regular file wraps it in a reader/writer lock.

pub mod layout;
pub mod paged;
pub mod pool;

pub use layout::{DEFAULT_PAGE_SIZE, PageLayout, PageSpan};
pub use paged::PagedStore;
pub use pool::{DEFAULT_POOL_PAGES, PagePool};
