//! Node capability shared by every node type the graph can host

use std::fmt;
use std::sync::Arc;

use crate::config::EngineConfig;
use crate::error::{MemNodeError, Result};
use crate::idgen::{Handle, IdGen};
use crate::io::{Memory, MemoryDesc};
use crate::registry::VirtualEdgeRegistry;

/// Type tags under which nodes are exposed to the factory
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeKind {
    Input,
    Output,
    MemoryOutput,
    MemoryInput,
}

impl NodeKind {
    #[must_use]
    pub fn type_tag(self) -> &'static str {
        match self {
            Self::Input => "Input",
            Self::Output => "Output",
            Self::MemoryOutput => "MemoryOutput",
            Self::MemoryInput => "MemoryInput",
        }
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.type_tag())
    }
}

/// What a graph builder knows about a layer before a node exists for it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LayerDesc {
    pub type_tag: String,
    pub name: String,
    /// Logical state name; only memory layers have one
    pub memory_id: Option<String>,
    /// Declared output tensor, for layers that produce one on their own
    pub output: Option<MemoryDesc>,
}

impl LayerDesc {
    #[must_use]
    pub fn new(type_tag: &str, name: &str) -> Self {
        Self {
            type_tag: type_tag.to_string(),
            name: name.to_string(),
            memory_id: None,
            output: None,
        }
    }

    #[must_use]
    pub fn input(name: &str, output: MemoryDesc) -> Self {
        Self::new(NodeKind::Input.type_tag(), name).with_output(output)
    }

    #[must_use]
    pub fn output(name: &str) -> Self {
        Self::new(NodeKind::Output.type_tag(), name)
    }

    #[must_use]
    pub fn memory_output(name: &str, memory_id: &str) -> Self {
        Self::new(NodeKind::MemoryOutput.type_tag(), name).with_memory_id(memory_id)
    }

    #[must_use]
    pub fn memory_input(name: &str, memory_id: &str, output: MemoryDesc) -> Self {
        Self::new(NodeKind::MemoryInput.type_tag(), name)
            .with_memory_id(memory_id)
            .with_output(output)
    }

    #[must_use]
    pub fn with_memory_id(mut self, memory_id: &str) -> Self {
        self.memory_id = Some(memory_id.to_string());
        self
    }

    #[must_use]
    pub fn with_output(mut self, output: MemoryDesc) -> Self {
        self.output = Some(output);
        self
    }

    /// The memory id, rejecting a missing or empty one
    ///
    /// # Errors
    ///
    /// `EmptyMemoryId` naming this layer.
    pub fn require_memory_id(&self) -> Result<&str> {
        match self.memory_id.as_deref() {
            Some(id) if !id.is_empty() => Ok(id),
            _ => Err(MemNodeError::EmptyMemoryId {
                node: self.name.clone(),
            }),
        }
    }

    /// The declared output descriptor
    ///
    /// # Errors
    ///
    /// `MissingDescriptor` naming this layer.
    pub fn require_output(&self) -> Result<&MemoryDesc> {
        self.output
            .as_ref()
            .ok_or_else(|| MemNodeError::MissingDescriptor {
                node: self.name.clone(),
            })
    }
}

/// One port of a supported primitive descriptor
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortConfig {
    /// Port this one may alias, if any
    pub in_place: Option<usize>,
    /// Whether the data stays the same across iterations
    pub constant: bool,
    pub desc: MemoryDesc,
}

/// A layout/precision combination a node can execute with
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LayerConfig {
    /// Batch size may change between iterations
    pub dyn_batch_support: bool,
    pub in_confs: Vec<PortConfig>,
    pub out_confs: Vec<PortConfig>,
}

/// Shared services a node constructor needs
///
/// One context per compilation; every graph built from it shares the
/// same virtual edge registry.
#[derive(Debug, Clone)]
pub struct BuildContext {
    pub registry: Arc<VirtualEdgeRegistry>,
    pub idgen: Arc<IdGen>,
    pub config: Arc<EngineConfig>,
}

impl BuildContext {
    #[must_use]
    pub fn new(config: EngineConfig) -> Self {
        Self {
            registry: Arc::new(VirtualEdgeRegistry::new(&config)),
            idgen: Arc::new(IdGen::new()),
            config: Arc::new(config),
        }
    }
}

impl Default for BuildContext {
    fn default() -> Self {
        Self::new(EngineConfig::default())
    }
}

/// Edge memories visible to a node during one `execute`
pub struct ExecContext {
    node: String,
    iteration: u64,
    parents: Vec<Memory>,
    children: Vec<Memory>,
}

impl ExecContext {
    #[must_use]
    pub fn new(node: &str, iteration: u64, parents: Vec<Memory>, children: Vec<Memory>) -> Self {
        Self {
            node: node.to_string(),
            iteration,
            parents,
            children,
        }
    }

    /// Memory of the parent edge feeding input `port`
    ///
    /// # Errors
    ///
    /// `MissingEdge` if the port is not connected.
    pub fn parent(&self, port: usize) -> Result<&Memory> {
        self.parents
            .get(port)
            .ok_or_else(|| MemNodeError::MissingEdge {
                node: self.node.clone(),
                port,
            })
    }

    #[must_use]
    pub fn children(&self) -> &[Memory] {
        &self.children
    }

    /// One-based number of the running iteration
    #[must_use]
    pub fn iteration(&self) -> u64 {
        self.iteration
    }
}

/// A node of the execution graph
pub trait Node: Send {
    fn handle(&self) -> Handle;

    fn name(&self) -> &str;

    fn kind(&self) -> NodeKind;

    /// Logical state name, for memory nodes
    fn memory_id(&self) -> Option<&str> {
        None
    }

    /// Collect layout constraints of the node itself
    ///
    /// # Errors
    ///
    /// Node specific.
    fn get_supported_descriptors(&mut self) -> Result<()> {
        Ok(())
    }

    /// Derive the supported configurations from the parent edges.
    ///
    /// Must be a no-op once configurations exist.
    ///
    /// # Errors
    ///
    /// Node specific; typically a missing parent edge.
    fn init_supported_primitive_descriptors(&mut self, parent_descs: &[MemoryDesc]) -> Result<()>;

    fn supported_primitive_descriptors(&self) -> &[LayerConfig];

    /// Descriptor of the tensor this node produces on its own, if any
    fn output_desc(&self) -> Option<&MemoryDesc> {
        None
    }

    /// Node whose child edges stand in for this node's child edges
    fn downstream_redirect(&self) -> Option<Handle> {
        None
    }

    /// Pre-execution checks
    ///
    /// # Errors
    ///
    /// A topology error that would make `execute` fail.
    fn validate(&self) -> Result<()> {
        Ok(())
    }

    /// Run one iteration
    ///
    /// # Errors
    ///
    /// Any error aborts the whole iteration.
    fn execute(&mut self, ctx: &ExecContext) -> Result<()>;
}
