//! Blob Adapters
//!
//! Implementations of the `BlobStore` trait for signature images.

mod file;
mod memory;

pub use file::{FileBlobStore, HANDLE_PREFIX};
pub use memory::InMemoryBlobStore;
