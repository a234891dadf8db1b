//! Node types hosted by the graph
//!
//! `Input` and `Output` are the ordinary graph boundaries. `MemoryOutput`
//! and `MemoryInput` are the two ends of a virtual edge that carries
//! state from one iteration to the next.

pub mod input;
#[cfg(feature = "memory-input")]
pub mod memory_input;
pub mod memory_output;
pub mod output;

pub use input::InputNode;
#[cfg(feature = "memory-input")]
pub use memory_input::MemoryInputNode;
pub use memory_output::MemoryOutputNode;
pub use output::OutputNode;
