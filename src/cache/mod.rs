//! Cache layer.
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │              UploadCache                │
//! │   (auth token, cached image payloads)   │
//! └────────────────────┬────────────────────┘
//!                      │
//!                      ▼
//! ┌─────────────────────────────────────────┐
//! │             CacheRegistry               │
//! │  (key prefixing, JSON values, fail-soft)│
//! └────────────────────┬────────────────────┘
//!                      │
//!          ┌───────────┴───────────┐
//!          ▼                       ▼
//! ┌─────────────────┐    ┌─────────────────────┐
//! │   RedisStore    │    │    MemoryStore      │
//! │ (GET/SETEX/DEL) │    │  (in-process, LRU)  │
//! └─────────────────┘    └─────────────────────┘
//! ```

mod memory;
mod registry;
mod store;
mod upload;

pub use memory::{MemoryStore, DEFAULT_MEMORY_STORE_ENTRIES};
pub use registry::CacheRegistry;
pub use store::{CacheStore, RedisStore, DEFAULT_REDIS_PORT};
pub use upload::{UploadCache, DEFAULT_IMAGE_TTL_SECS};
