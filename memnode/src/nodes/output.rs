use crate::error::{MemNodeError, Result};
use crate::idgen::Handle;
use crate::io::MemoryDesc;
use crate::node::{BuildContext, ExecContext, LayerConfig, LayerDesc, Node, NodeKind, PortConfig};

/// Graph output; results are read from its parent edge after an iteration
#[derive(Debug)]
pub struct OutputNode {
    handle: Handle,
    name: String,
    supported: Vec<LayerConfig>,
}

impl OutputNode {
    /// # Errors
    ///
    /// Infallible today; kept fallible to match the factory signature.
    pub fn new(layer: &LayerDesc, ctx: &BuildContext) -> Result<Self> {
        Ok(Self {
            handle: ctx.idgen.next_handle(),
            name: layer.name.clone(),
            supported: Vec::new(),
        })
    }
}

impl Node for OutputNode {
    fn handle(&self) -> Handle {
        self.handle
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> NodeKind {
        NodeKind::Output
    }

    fn init_supported_primitive_descriptors(&mut self, parent_descs: &[MemoryDesc]) -> Result<()> {
        if !self.supported.is_empty() {
            return Ok(());
        }
        let parent = parent_descs.first().ok_or_else(|| MemNodeError::MissingEdge {
            node: self.name.clone(),
            port: 0,
        })?;
        self.supported.push(LayerConfig {
            dyn_batch_support: true,
            in_confs: vec![PortConfig {
                in_place: None,
                constant: false,
                desc: parent.clone(),
            }],
            out_confs: Vec::new(),
        });
        Ok(())
    }

    fn supported_primitive_descriptors(&self) -> &[LayerConfig] {
        &self.supported
    }

    fn execute(&mut self, _ctx: &ExecContext) -> Result<()> {
        Ok(())
    }
}
