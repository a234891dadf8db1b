//! Tensor memory for graph edges
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────┐
//! │  Edge (graph topology)              │
//! │  - parent node, child node          │
//! └─────────────────────────────────────┘
//!          │ owns
//!          ▼
//! ┌─────────────────────────────────────┐
//! │  Memory (shared storage)            │
//! │  - Arc<Mutex<Vec<u8>>>              │
//! │  - lock() / lock_mut() expose only  │
//! │    the valid region                 │
//! └─────────────────────────────────────┘
//!          │ described by
//!          ▼
//! ┌─────────────────────────────────────┐
//! │  MemoryDesc                         │
//! │  - dims, precision, offset padding  │
//! └─────────────────────────────────────┘
//! ```

pub mod convert;
pub mod memory;

pub use convert::{convert, decode_f32, encode_f32};

pub use memory::{
    bytes_to_f32, f32_to_bytes, Memory, MemoryDesc, MemoryReadGuard, MemoryWriteGuard, Precision,
};
