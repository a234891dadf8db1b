//! Error taxonomy for memory nodes and the graph that hosts them
//!
//! Every variant is fatal for the current graph build or iteration.
//! Errors that concern a virtual edge carry the offending memory id.

use crate::idgen::Handle;
use crate::node::NodeKind;

/// Result alias used across the crate
pub type Result<T> = std::result::Result<T, MemNodeError>;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MemNodeError {
    // ------------------------------------------------------------------
    // Configuration errors (graph build time)
    //
    /// A memory node was declared without a logical name
    #[error("memory node '{node}' has an empty memory id")]
    EmptyMemoryId { node: String },

    /// The reader role is not available in this deployment
    #[error("memory id '{memory_id}': MemoryInput is not supported in this deployment")]
    MemoryInputUnsupported { memory_id: String },

    /// Two writers or two readers claimed the same name
    #[error("memory id '{memory_id}': a {role:?} is already registered")]
    DuplicateRole { memory_id: String, role: NodeKind },

    /// A third node claimed a name whose pair is already resolved
    #[error("memory id '{memory_id}' is already paired")]
    MemoryIdOverclaimed { memory_id: String },

    #[error("unknown node type '{type_tag}'")]
    UnknownNodeType { type_tag: String },

    #[error("invalid configuration: {message}")]
    InvalidConfig { message: String },

    /// A node that needs a declared output descriptor was built without one
    #[error("node '{node}' has no output descriptor")]
    MissingDescriptor { node: String },

    // ------------------------------------------------------------------
    // Topology errors (validation, or execute as the last line of defence)
    //
    /// A writer is scheduled but its reader never registered
    #[error("memory id '{memory_id}': MemoryOutput has no paired MemoryInput")]
    Unpaired { memory_id: String },

    /// The paired reader was destroyed after pairing resolved
    #[error("memory id '{memory_id}': paired MemoryInput no longer exists")]
    CarrierGone { memory_id: String },

    #[error("node '{node}' has no edge at port {port}")]
    MissingEdge { node: String, port: usize },

    #[error("node {0} not found")]
    NodeNotFound(Handle),

    #[error("no {kind} node named '{name}'")]
    UnknownNode { kind: NodeKind, name: String },

    #[error("graph contains a cycle through node '{node}'")]
    Cycle { node: String },

    // ------------------------------------------------------------------
    // Execution errors
    //
    /// Carried bytes disagree with the consumer's declared tensor size
    #[error("memory id '{memory_id}': stored {stored} bytes, consumer expects {expected}")]
    SizeMismatch {
        memory_id: String,
        stored: usize,
        expected: usize,
    },

    #[error("node '{node}': given {given} bytes, edge expects {expected}")]
    InputSizeMismatch {
        node: String,
        given: usize,
        expected: usize,
    },
}

impl MemNodeError {
    /// The logical memory id involved, if the error concerns a virtual edge
    #[must_use]
    pub fn memory_id(&self) -> Option<&str> {
        match self {
            Self::MemoryInputUnsupported { memory_id }
            | Self::DuplicateRole { memory_id, .. }
            | Self::MemoryIdOverclaimed { memory_id }
            | Self::Unpaired { memory_id }
            | Self::CarrierGone { memory_id }
            | Self::SizeMismatch { memory_id, .. } => Some(memory_id),
            _ => None,
        }
    }

    /// True for errors that stem from static configuration
    #[must_use]
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            Self::EmptyMemoryId { .. }
                | Self::MemoryInputUnsupported { .. }
                | Self::DuplicateRole { .. }
                | Self::MemoryIdOverclaimed { .. }
                | Self::UnknownNodeType { .. }
                | Self::InvalidConfig { .. }
                | Self::MissingDescriptor { .. }
        )
    }
}
