//! Built-in store backends.

pub mod blob_online;
pub mod memory_offline;
pub mod memory_online;
pub mod vector_memory;

pub use blob_online::BlobOnlineStore;
pub use memory_offline::MemoryOfflineStore;
pub use memory_online::MemoryOnlineStore;
pub use vector_memory::VectorMemoryStore;
