//! MemoryInput - the reading end of a virtual edge
//!
//! Behaves as a graph source. At the start of each iteration it copies
//! the state stored by its writer during the previous iteration into its
//! child edges. Before the first store the state is all zeros.

use std::fmt;
use std::sync::{Arc, Weak};

use crate::carrier::{Carrier, StateCell};
use crate::error::Result;
use crate::idgen::Handle;
use crate::io::MemoryDesc;
use crate::node::{BuildContext, ExecContext, LayerConfig, LayerDesc, Node, NodeKind, PortConfig};
use crate::registry::VirtualEdgeRegistry;

pub struct MemoryInputNode {
    handle: Handle,
    name: String,
    memory_id: String,
    desc: MemoryDesc,
    /// Sole strong reference; writers only hold weak ones
    state: Arc<StateCell>,
    registry: Arc<VirtualEdgeRegistry>,
    supported: Vec<LayerConfig>,
}

impl MemoryInputNode {
    /// Build the node and register it under its memory id.
    ///
    /// # Errors
    ///
    /// `EmptyMemoryId`, `MissingDescriptor`, or any configuration error
    /// from the registry.
    pub fn new(layer: &LayerDesc, ctx: &BuildContext) -> Result<Self> {
        let memory_id = layer.require_memory_id()?.to_string();
        let desc = layer.require_output()?.clone();
        let state = Arc::new(StateCell::new(&memory_id, desc.byte_size()));
        let node = Self {
            handle: ctx.idgen.next_handle(),
            name: layer.name.clone(),
            memory_id,
            desc,
            state,
            registry: Arc::clone(&ctx.registry),
            supported: Vec::new(),
        };

        let carrier: Weak<StateCell> = Arc::downgrade(&node.state);
        let writer = node
            .registry
            .register_reader(&node.memory_id, node.handle, carrier)?;
        tracing::debug!(
            node = %node.name,
            memory_id = %node.memory_id,
            paired = writer.is_some(),
            "memory input registered"
        );
        Ok(node)
    }

    /// Copy of the currently carried state
    #[must_use]
    pub fn stored_bytes(&self) -> Vec<u8> {
        self.state.snapshot()
    }
}

impl Carrier for MemoryInputNode {
    fn memory_id(&self) -> &str {
        &self.memory_id
    }

    fn store_bytes(&self, bytes: &[u8]) {
        self.state.store_bytes(bytes);
    }

    fn load_into(&self, dst: &mut [u8]) -> Result<()> {
        self.state.load_into(dst)
    }

    fn stored_len(&self) -> usize {
        self.state.stored_len()
    }
}

impl Node for MemoryInputNode {
    fn handle(&self) -> Handle {
        self.handle
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> NodeKind {
        NodeKind::MemoryInput
    }

    fn memory_id(&self) -> Option<&str> {
        Some(&self.memory_id)
    }

    fn init_supported_primitive_descriptors(&mut self, _parent_descs: &[MemoryDesc]) -> Result<()> {
        if !self.supported.is_empty() {
            return Ok(());
        }
        self.supported.push(LayerConfig {
            dyn_batch_support: true,
            in_confs: Vec::new(),
            out_confs: vec![PortConfig {
                in_place: None,
                constant: false,
                desc: self.desc.clone(),
            }],
        });
        Ok(())
    }

    fn supported_primitive_descriptors(&self) -> &[LayerConfig] {
        &self.supported
    }

    fn output_desc(&self) -> Option<&MemoryDesc> {
        Some(&self.desc)
    }

    fn execute(&mut self, ctx: &ExecContext) -> Result<()> {
        for child in ctx.children() {
            let mut dst = child.lock_mut();
            self.state.load_into(&mut dst)?;
        }
        tracing::trace!(
            node = %self.name,
            memory_id = %self.memory_id,
            iteration = ctx.iteration(),
            consumers = ctx.children().len(),
            "state exposed"
        );
        Ok(())
    }
}

impl fmt::Debug for MemoryInputNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "MemoryInput(handle={}, name={}, memory_id={}, state={:?})",
            self.handle, self.name, self.memory_id, self.state
        )
    }
}

impl Drop for MemoryInputNode {
    fn drop(&mut self) {
        self.registry.unregister(self.handle);
    }
}
