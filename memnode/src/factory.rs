//! Node factory - dispatch table from type tag to node constructor

use std::collections::HashMap;

use crate::config::EngineConfig;
use crate::error::{MemNodeError, Result};
use crate::node::{BuildContext, LayerDesc, Node, NodeKind};
use crate::nodes::{InputNode, MemoryOutputNode, OutputNode};

/// Type for node constructors
pub type NodeCtor = fn(&LayerDesc, &BuildContext) -> Result<Box<dyn Node>>;

/// Registry mapping type tags to their constructors
pub struct NodeFactory {
    ctors: HashMap<String, NodeCtor>,
}

impl NodeFactory {
    pub fn new() -> Self {
        Self {
            ctors: HashMap::new(),
        }
    }

    /// Factory with every node type this crate provides
    ///
    /// `MemoryInput` is always present as a tag. When the reader role is
    /// unavailable its constructor fails with `MemoryInputUnsupported`.
    pub fn with_builtin(config: &EngineConfig) -> Self {
        let mut factory = Self::new();
        factory.register(NodeKind::Input.type_tag(), |layer, ctx| {
            Ok(Box::new(InputNode::new(layer, ctx)?))
        });
        factory.register(NodeKind::Output.type_tag(), |layer, ctx| {
            Ok(Box::new(OutputNode::new(layer, ctx)?))
        });
        factory.register(NodeKind::MemoryOutput.type_tag(), |layer, ctx| {
            Ok(Box::new(MemoryOutputNode::new(layer, ctx)?))
        });
        if config.memory_input_supported {
            factory.register(NodeKind::MemoryInput.type_tag(), memory_input_ctor());
        } else {
            factory.register(NodeKind::MemoryInput.type_tag(), unsupported_memory_input);
        }
        factory
    }

    /// Register a constructor, replacing any previous one for the tag
    pub fn register(&mut self, type_tag: impl Into<String>, ctor: NodeCtor) {
        let type_tag = type_tag.into();
        if self.ctors.insert(type_tag.clone(), ctor).is_some() {
            log::warn!("factory: constructor for '{type_tag}' replaced");
        }
    }

    #[must_use]
    pub fn contains(&self, type_tag: &str) -> bool {
        self.ctors.contains_key(type_tag)
    }

    /// Build a node for `layer`
    ///
    /// # Errors
    ///
    /// `UnknownNodeType` for an unregistered tag, otherwise whatever the
    /// constructor reports.
    pub fn create(&self, layer: &LayerDesc, ctx: &BuildContext) -> Result<Box<dyn Node>> {
        let ctor = self
            .ctors
            .get(&layer.type_tag)
            .ok_or_else(|| MemNodeError::UnknownNodeType {
                type_tag: layer.type_tag.clone(),
            })?;
        ctor(layer, ctx)
    }
}

impl Default for NodeFactory {
    fn default() -> Self {
        Self::with_builtin(&EngineConfig::default())
    }
}

#[cfg(feature = "memory-input")]
fn memory_input_ctor() -> NodeCtor {
    |layer, ctx| Ok(Box::new(crate::nodes::MemoryInputNode::new(layer, ctx)?))
}

#[cfg(not(feature = "memory-input"))]
fn memory_input_ctor() -> NodeCtor {
    unsupported_memory_input
}

fn unsupported_memory_input(layer: &LayerDesc, _ctx: &BuildContext) -> Result<Box<dyn Node>> {
    Err(MemNodeError::MemoryInputUnsupported {
        memory_id: layer.memory_id.clone().unwrap_or_default(),
    })
}
