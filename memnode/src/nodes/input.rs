use crate::error::Result;
use crate::idgen::Handle;
use crate::io::MemoryDesc;
use crate::node::{BuildContext, ExecContext, LayerConfig, LayerDesc, Node, NodeKind, PortConfig};

/// Graph input; the graph writes user data straight into its child edges
#[derive(Debug)]
pub struct InputNode {
    handle: Handle,
    name: String,
    desc: MemoryDesc,
    supported: Vec<LayerConfig>,
}

impl InputNode {
    /// # Errors
    ///
    /// `MissingDescriptor` if the layer declares no output tensor.
    pub fn new(layer: &LayerDesc, ctx: &BuildContext) -> Result<Self> {
        Ok(Self {
            handle: ctx.idgen.next_handle(),
            name: layer.name.clone(),
            desc: layer.require_output()?.clone(),
            supported: Vec::new(),
        })
    }
}

impl Node for InputNode {
    fn handle(&self) -> Handle {
        self.handle
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> NodeKind {
        NodeKind::Input
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

    fn execute(&mut self, _ctx: &ExecContext) -> Result<()> {
        Ok(())
    }
}
