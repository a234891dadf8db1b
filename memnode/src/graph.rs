//! Graph - nodes, physical edges and per-iteration execution
//!
//! The graph owns its nodes and the memory of every edge. Virtual edges
//! between MemoryOutput and MemoryInput nodes are not stored here; they
//! live in the nodes themselves once the registry has paired them.
//!
//! Lifecycle:
//!
//! 1. `add_layer` / `insert_node` and `connect` build the topology
//! 2. `prepare` initialises descriptors, validates and fixes the
//!    execution order
//! 3. `push_input`, `infer`, `output` run iterations; `allocate` may be
//!    called between them to hand every edge fresh memory

use std::collections::HashSet;
use std::fmt::Write as _;

use tracing::{debug, error, trace};

use crate::config::EngineConfig;
use crate::error::{MemNodeError, Result};
use crate::factory::NodeFactory;
use crate::idgen::Handle;
use crate::io::{Memory, MemoryDesc};
use crate::node::{BuildContext, ExecContext, LayerDesc, Node, NodeKind};
use crate::registry::VirtualEdgeRegistry;
use crate::scheduler::Scheduler;

/// Physical edge between two nodes
#[derive(Debug)]
pub struct Edge {
    parent: Handle,
    child: Handle,
    /// Input port on the child
    port: usize,
    memory: Memory,
}

impl Edge {
    #[must_use]
    pub fn parent(&self) -> Handle {
        self.parent
    }

    #[must_use]
    pub fn child(&self) -> Handle {
        self.child
    }

    #[must_use]
    pub fn port(&self) -> usize {
        self.port
    }

    #[must_use]
    pub fn memory(&self) -> &Memory {
        &self.memory
    }
}

pub struct Graph {
    ctx: BuildContext,
    factory: NodeFactory,
    nodes: Vec<Box<dyn Node>>,
    edges: Vec<Edge>,
    order: Option<Vec<Handle>>,
    iteration: u64,
}

impl Graph {
    /// Graph with its own compilation context
    #[must_use]
    pub fn new(config: EngineConfig) -> Self {
        Self::with_context(BuildContext::new(config))
    }

    /// Graph sharing a compilation context (and its registry) with others
    #[must_use]
    pub fn with_context(ctx: BuildContext) -> Self {
        let factory = NodeFactory::with_builtin(&ctx.config);
        Self {
            ctx,
            factory,
            nodes: Vec::new(),
            edges: Vec::new(),
            order: None,
            iteration: 0,
        }
    }

    #[must_use]
    pub fn context(&self) -> &BuildContext {
        &self.ctx
    }

    #[must_use]
    pub fn registry(&self) -> &VirtualEdgeRegistry {
        &self.ctx.registry
    }

    /// Number of iterations run so far
    #[must_use]
    pub fn iteration(&self) -> u64 {
        self.iteration
    }

    /// Build a node through the factory and add it
    ///
    /// # Errors
    ///
    /// Whatever the node constructor reports.
    pub fn add_layer(&mut self, layer: &LayerDesc) -> Result<Handle> {
        let node = self.factory.create(layer, &self.ctx)?;
        Ok(self.insert_node(node))
    }

    /// Add a node built elsewhere, e.g. on another builder thread
    pub fn insert_node(&mut self, node: Box<dyn Node>) -> Handle {
        let handle = node.handle();
        debug!(node = %node.name(), kind = %node.kind(), handle = %handle, "node added");
        self.nodes.push(node);
        self.order = None;
        handle
    }

    /// Connect `parent`'s output to the next free input port of `child`
    ///
    /// # Errors
    ///
    /// `NodeNotFound` for unknown handles, `MissingDescriptor` if the
    /// parent produces no tensor of its own.
    pub fn connect(&mut self, parent: Handle, child: Handle) -> Result<()> {
        self.node(child).ok_or(MemNodeError::NodeNotFound(child))?;
        let parent_node = self.node(parent).ok_or(MemNodeError::NodeNotFound(parent))?;
        let desc = parent_node
            .output_desc()
            .cloned()
            .ok_or_else(|| MemNodeError::MissingDescriptor {
                node: parent_node.name().to_string(),
            })?;

        let port = self.edges.iter().filter(|e| e.child == child).count();
        self.edges.push(Edge {
            parent,
            child,
            port,
            memory: Memory::new(desc),
        });
        self.order = None;
        Ok(())
    }

    /// Destroy a node together with its edges
    ///
    /// # Errors
    ///
    /// `NodeNotFound` for an unknown handle.
    pub fn remove_node(&mut self, handle: Handle) -> Result<()> {
        let index = self
            .nodes
            .iter()
            .position(|n| n.handle() == handle)
            .ok_or(MemNodeError::NodeNotFound(handle))?;
        self.edges.retain(|e| e.parent != handle && e.child != handle);
        let node = self.nodes.remove(index);
        debug!(node = %node.name(), handle = %handle, "node removed");
        self.order = None;
        Ok(())
    }

    #[must_use]
    pub fn node(&self, handle: Handle) -> Option<&dyn Node> {
        self.nodes
            .iter()
            .find(|n| n.handle() == handle)
            .map(|n| &**n)
    }

    /// Handle of the node called `name`
    #[must_use]
    pub fn find(&self, name: &str) -> Option<Handle> {
        self.nodes
            .iter()
            .find(|n| n.name() == name)
            .map(|n| n.handle())
    }

    /// `idx`-th parent edge of `handle`
    ///
    /// # Errors
    ///
    /// `NodeNotFound`, or `MissingEdge` if the port is unconnected.
    pub fn parent_edge_at(&self, handle: Handle, idx: usize) -> Result<&Edge> {
        let node = self.node(handle).ok_or(MemNodeError::NodeNotFound(handle))?;
        self.edges
            .iter()
            .find(|e| e.child == handle && e.port == idx)
            .ok_or_else(|| MemNodeError::MissingEdge {
                node: node.name().to_string(),
                port: idx,
            })
    }

    /// `idx`-th child edge of `handle`.
    ///
    /// A paired MemoryOutput has no child edges of its own; its reader's
    /// child edges are returned instead.
    ///
    /// # Errors
    ///
    /// `NodeNotFound`, or `MissingEdge` if there is no such edge.
    pub fn child_edge_at(&self, handle: Handle, idx: usize) -> Result<&Edge> {
        let node = self.node(handle).ok_or(MemNodeError::NodeNotFound(handle))?;
        let source = node.downstream_redirect().unwrap_or(handle);
        self.edges
            .iter()
            .filter(|e| e.parent == source)
            .nth(idx)
            .ok_or_else(|| MemNodeError::MissingEdge {
                node: node.name().to_string(),
                port: idx,
            })
    }

    fn parent_descs(&self, handle: Handle) -> Vec<MemoryDesc> {
        let mut parents: Vec<&Edge> = self.edges.iter().filter(|e| e.child == handle).collect();
        parents.sort_by_key(|e| e.port);
        parents.iter().map(|e| e.memory.desc().clone()).collect()
    }

    fn schedule(&self) -> Result<Vec<Handle>> {
        let mut scheduler = Scheduler::new(self.nodes.iter().map(|n| n.handle()).collect());
        for edge in &self.edges {
            scheduler.add_constraint(edge.parent, edge.child);
        }
        // Within one iteration the reader exposes old state before the writer stores new state
        for node in &self.nodes {
            if node.kind() == NodeKind::MemoryOutput {
                if let Some(reader) = node.downstream_redirect() {
                    if self.node(reader).is_some() {
                        scheduler.add_constraint(reader, node.handle());
                    }
                }
            }
        }
        scheduler.order().map_err(|stuck| MemNodeError::Cycle {
            node: self
                .node(stuck)
                .map_or_else(|| stuck.to_string(), |n| n.name().to_string()),
        })
    }

    /// Initialise descriptors, validate, fix the order.
    ///
    /// Edge memory is kept as allocated by `connect`, so input pushed
    /// before the first `infer` survives the implicit prepare. Edges keep
    /// their producer's descriptor; a consumer that wants another
    /// precision converts when it reads.
    ///
    /// # Errors
    ///
    /// The first descriptor, validation or scheduling error.
    pub fn prepare(&mut self) -> Result<()> {
        let order = self.schedule()?;

        for handle in &order {
            let parent_descs = self.parent_descs(*handle);
            let Some(node) = self.nodes.iter_mut().find(|n| n.handle() == *handle) else {
                continue;
            };
            node.get_supported_descriptors()?;
            node.init_supported_primitive_descriptors(&parent_descs)?;
        }

        self.validate()?;
        debug!(nodes = order.len(), edges = self.edges.len(), "graph prepared");
        self.order = Some(order);
        Ok(())
    }

    /// Give every edge a fresh zeroed allocation.
    ///
    /// Carried state is unaffected: it is held as bytes by the readers,
    /// never as a reference into edge memory.
    pub fn allocate(&mut self) {
        for edge in &mut self.edges {
            edge.memory = Memory::new(edge.memory.desc().clone());
        }
        trace!(edges = self.edges.len(), "edges allocated");
    }

    /// Pre-execution checks of every node
    ///
    /// # Errors
    ///
    /// The first node error, e.g. `Unpaired` for a writer without reader.
    pub fn validate(&self) -> Result<()> {
        for node in &self.nodes {
            if let Err(e) = node.validate() {
                error!(node = %node.name(), error = %e, "validation failed");
                return Err(e);
            }
        }
        Ok(())
    }

    /// Copy user data into the child edges of the input called `name`
    ///
    /// # Errors
    ///
    /// `UnknownNode` if there is no such input, `InputSizeMismatch` if
    /// the data does not match the edge size.
    pub fn push_input(&self, name: &str, data: &[u8]) -> Result<()> {
        let handle = self
            .nodes
            .iter()
            .find(|n| n.kind() == NodeKind::Input && n.name() == name)
            .map(|n| n.handle())
            .ok_or_else(|| MemNodeError::UnknownNode {
                kind: NodeKind::Input,
                name: name.to_string(),
            })?;

        for edge in self.edges.iter().filter(|e| e.parent == handle) {
            let mut dst = edge.memory.lock_mut();
            if dst.len() != data.len() {
                return Err(MemNodeError::InputSizeMismatch {
                    node: name.to_string(),
                    given: data.len(),
                    expected: dst.len(),
                });
            }
            dst.copy_from_slice(data);
        }
        Ok(())
    }

    /// Bytes that reached the output called `name` in the last iteration
    ///
    /// # Errors
    ///
    /// `UnknownNode` if there is no such output, `MissingEdge` if it is
    /// unconnected.
    pub fn output(&self, name: &str) -> Result<Vec<u8>> {
        let handle = self
            .nodes
            .iter()
            .find(|n| n.kind() == NodeKind::Output && n.name() == name)
            .map(|n| n.handle())
            .ok_or_else(|| MemNodeError::UnknownNode {
                kind: NodeKind::Output,
                name: name.to_string(),
            })?;
        let edge = self.parent_edge_at(handle, 0)?;
        let bytes = edge.memory.lock().to_vec();
        Ok(bytes)
    }

    fn exec_context(&self, node: &dyn Node) -> ExecContext {
        let handle = node.handle();
        let mut parents: Vec<&Edge> = self.edges.iter().filter(|e| e.child == handle).collect();
        parents.sort_by_key(|e| e.port);
        let children = self
            .edges
            .iter()
            .filter(|e| e.parent == handle)
            .map(|e| e.memory.clone())
            .collect();
        ExecContext::new(
            node.name(),
            self.iteration,
            parents.iter().map(|e| e.memory.clone()).collect(),
            children,
        )
    }

    /// Run one iteration over all nodes
    ///
    /// # Errors
    ///
    /// The first node error; the rest of the iteration is abandoned.
    pub fn infer(&mut self) -> Result<()> {
        if self.order.is_none() {
            self.prepare()?;
        }
        let order = self.order.clone().unwrap_or_default();
        self.iteration += 1;
        let _span = tracing::debug_span!("infer", iteration = self.iteration).entered();

        for handle in order {
            let Some(index) = self.nodes.iter().position(|n| n.handle() == handle) else {
                continue;
            };
            let ctx = self.exec_context(self.nodes[index].as_ref());
            let node = &mut self.nodes[index];
            trace!(node = %node.name(), "execute");
            if let Err(e) = node.execute(&ctx) {
                error!(
                    node = %node.name(),
                    memory_id = node.memory_id().unwrap_or(""),
                    error = %e,
                    "iteration aborted"
                );
                return Err(e);
            }
        }
        Ok(())
    }

    /// Print the graph in execution order, virtual edges included
    #[must_use]
    pub fn dump(&self) -> String {
        let mut output = String::new();
        let order = self
            .schedule()
            .unwrap_or_else(|_| self.nodes.iter().map(|n| n.handle()).collect());
        let mut seen = HashSet::new();

        for handle in order {
            let Some(node) = self.node(handle) else {
                continue;
            };
            seen.insert(handle);
            let _ = writeln!(output, "{} [{}]", node.name(), node.kind());

            let children: Vec<&Edge> = self.edges.iter().filter(|e| e.parent == handle).collect();
            let virtual_target = match node.kind() {
                NodeKind::MemoryOutput => Some(node.downstream_redirect()),
                _ => None,
            };
            let total = children.len() + usize::from(virtual_target.is_some());

            for (idx, edge) in children.iter().enumerate() {
                let connector = if idx + 1 == total { "└── " } else { "├── " };
                let child = self
                    .node(edge.child)
                    .map_or("?", |n| n.name());
                let _ = writeln!(output, "{connector}{child}");
            }
            if let Some(target) = virtual_target {
                let memory_id = node.memory_id().unwrap_or("");
                let reader = target
                    .and_then(|h| self.node(h))
                    .map_or("(unpaired)", |n| n.name());
                let _ = writeln!(output, "└~~ {reader} (memory id '{memory_id}')");
            }
        }
        output
    }
}

impl std::fmt::Debug for Graph {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Graph(nodes={}, edges={}, iteration={}, prepared={})",
            self.nodes.len(),
            self.edges.len(),
            self.iteration,
            self.order.is_some()
        )
    }
}
