//! Concurrent record resolution against the backing store.
//!
//! The pipeline's one hard guarantee: for any set of concurrently
//! requested GUIDs, each GUID triggers at most one backing-store fetch,
//! no matter how many callers ask for it. Overlap is absorbed by a
//! process-wide buffer of shared in-flight futures; the buffer is not a
//! cache and is emptied as batches complete.

mod buffer;
mod pipeline;

pub use buffer::FetchBuffer;
pub use pipeline::{ResolveError, Resolver};
