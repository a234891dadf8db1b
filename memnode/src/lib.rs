pub mod carrier;
pub mod config;
pub mod error;
pub mod factory;
pub mod graph;
pub mod idgen;
pub mod io;
pub mod node;
pub mod nodes;
pub mod registry;
pub mod scheduler;

// Re-export graph types for convenience
pub use graph::{Edge, Graph};

// Re-export node capability types
pub use node::{BuildContext, ExecContext, LayerConfig, LayerDesc, Node, NodeKind, PortConfig};

// Re-export the virtual edge machinery
pub use carrier::{Carrier, StateCell};
pub use registry::{Pairing, PairingSlot, VirtualEdgeRegistry};

// Re-export node implementations
#[cfg(feature = "memory-input")]
pub use nodes::MemoryInputNode;
pub use nodes::{InputNode, MemoryOutputNode, OutputNode};

pub use config::EngineConfig;
pub use error::{MemNodeError, Result};
pub use factory::{NodeCtor, NodeFactory};
pub use idgen::{Handle, IdGen};
pub use io::{Memory, MemoryDesc, Precision};
