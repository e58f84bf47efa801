//! Keyed record collections
//!
//! Records are stored in collections named by [`collection_key`], derived
//! from the object's apiName (`Account` → `accounts`). Every backend
//! implements [`RecordStore`]:
//!
//! - [`MemoryRecordStore`]: id-indexed maps, for tests and ephemeral sessions
//! - [`FileRecordStore`]: one JSON file per collection with an exclusive lock
//! - [`FallbackRecordStore`]: a primary store with an offline fallback

pub mod error;
pub mod fallback;
pub mod file;
pub mod key;
pub mod memory;
pub mod store;

pub use error::{Result, StoreError};
pub use fallback::FallbackRecordStore;
pub use file::FileRecordStore;
pub use key::collection_key;
pub use memory::MemoryRecordStore;
pub use store::RecordStore;
