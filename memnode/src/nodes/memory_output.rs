//! MemoryOutput - the writing end of a virtual edge
//!
//! Consumes one tensor per iteration and, instead of producing a
//! downstream tensor, hands the bytes to the paired MemoryInput. Bytes
//! are converted to the reference precision on the way. Once paired, the
//! node is transparent: its child edges are the reader's.

use std::fmt;
use std::sync::Arc;

use crate::config::EngineConfig;
use crate::error::{MemNodeError, Result};
use crate::idgen::Handle;
use crate::io::{convert, MemoryDesc};
use crate::node::{BuildContext, ExecContext, LayerConfig, LayerDesc, Node, NodeKind, PortConfig};
use crate::registry::{Pairing, PairingSlot, VirtualEdgeRegistry};

pub struct MemoryOutputNode {
    handle: Handle,
    name: String,
    memory_id: String,
    slot: Arc<PairingSlot>,
    registry: Arc<VirtualEdgeRegistry>,
    config: Arc<EngineConfig>,
    supported: Vec<LayerConfig>,
}

impl MemoryOutputNode {
    /// Build the node and register it under its memory id.
    ///
    /// # Errors
    ///
    /// `EmptyMemoryId`, or any configuration error from the registry.
    pub fn new(layer: &LayerDesc, ctx: &BuildContext) -> Result<Self> {
        let memory_id = layer.require_memory_id()?.to_string();
        let node = Self {
            handle: ctx.idgen.next_handle(),
            name: layer.name.clone(),
            memory_id,
            slot: Arc::new(PairingSlot::new()),
            registry: Arc::clone(&ctx.registry),
            config: Arc::clone(&ctx.config),
            supported: Vec::new(),
        };

        // Register only once the node is fully built
        let paired = node
            .registry
            .register_writer(&node.memory_id, node.handle, &node.slot)?;
        tracing::debug!(
            node = %node.name,
            memory_id = %node.memory_id,
            paired = paired.is_some(),
            "memory output registered"
        );
        Ok(node)
    }

    /// The resolved pairing, if the reader has registered
    #[must_use]
    pub fn pairing(&self) -> Option<&Pairing> {
        self.slot.get()
    }

    #[must_use]
    pub fn is_paired(&self) -> bool {
        self.slot.get().is_some()
    }
}

impl Node for MemoryOutputNode {
    fn handle(&self) -> Handle {
        self.handle
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> NodeKind {
        NodeKind::MemoryOutput
    }

    fn memory_id(&self) -> Option<&str> {
        Some(&self.memory_id)
    }

    fn init_supported_primitive_descriptors(&mut self, parent_descs: &[MemoryDesc]) -> Result<()> {
        if !self.supported.is_empty() {
            return Ok(());
        }
        let parent = parent_descs.first().ok_or_else(|| MemNodeError::MissingEdge {
            node: self.name.clone(),
            port: 0,
        })?;

        // Carried state always uses the reference precision
        let mut precision = parent.precision();
        if precision != self.config.reference_precision {
            tracing::debug!(
                node = %self.name,
                from = ?precision,
                to = ?self.config.reference_precision,
                "coercing memory output precision"
            );
            precision = self.config.reference_precision;
        }

        self.supported.push(LayerConfig {
            dyn_batch_support: true,
            in_confs: vec![PortConfig {
                in_place: None,
                constant: false,
                desc: MemoryDesc::new(parent.dims().to_vec(), precision),
            }],
            out_confs: Vec::new(),
        });
        Ok(())
    }

    fn supported_primitive_descriptors(&self) -> &[LayerConfig] {
        &self.supported
    }

    fn downstream_redirect(&self) -> Option<Handle> {
        self.slot.get().map(Pairing::reader)
    }

    fn validate(&self) -> Result<()> {
        if self.is_paired() {
            return Ok(());
        }
        if self.config.allow_orphan_writers {
            tracing::warn!(node = %self.name, memory_id = %self.memory_id, "orphan memory output");
            return Ok(());
        }
        Err(MemNodeError::Unpaired {
            memory_id: self.memory_id.clone(),
        })
    }

    fn execute(&mut self, ctx: &ExecContext) -> Result<()> {
        let Some(pairing) = self.slot.get() else {
            if self.config.allow_orphan_writers {
                return Ok(());
            }
            return Err(MemNodeError::Unpaired {
                memory_id: self.memory_id.clone(),
            });
        };
        let carrier = pairing.carrier().ok_or_else(|| MemNodeError::CarrierGone {
            memory_id: self.memory_id.clone(),
        })?;

        // The edge keeps the producer's precision; carried state is in the reference one
        let parent = ctx.parent(0)?;
        let from = parent.desc().precision();
        let to = self.config.reference_precision;
        let src = parent.lock();
        let len = if from == to {
            carrier.store_bytes(&src);
            src.len()
        } else {
            let converted = convert(&src, from, to);
            carrier.store_bytes(&converted);
            converted.len()
        };
        tracing::trace!(
            node = %self.name,
            memory_id = %self.memory_id,
            iteration = ctx.iteration(),
            bytes = len,
            "state pushed"
        );
        Ok(())
    }
}

impl fmt::Debug for MemoryOutputNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "MemoryOutput(handle={}, name={}, memory_id={}, pairing={:?})",
            self.handle,
            self.name,
            self.memory_id,
            self.slot.get()
        )
    }
}

impl Drop for MemoryOutputNode {
    fn drop(&mut self) {
        self.registry.unregister(self.handle);
    }
}
