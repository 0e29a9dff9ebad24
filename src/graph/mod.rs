//! Frame graph: passes with declared resource bindings and explicit
//! dependencies, compiled once into an execution order with barriers.
//!
//! A pass is a plain struct implementing [`FramePass`]. The graph never
//! infers edges from bindings; it only checks that every pair of passes
//! sharing a written resource is ordered by the declared dependencies.

mod commands;
mod resources;

use std::collections::{HashMap, VecDeque};

pub use commands::{Access, Barrier, Command, CommandBuffer, ImageLayout, ResourceRef};
pub use resources::{Arena, BufferId, Handle, ImageId, Labeled, Resources, StorageBuffer};

use crate::error::{GraphError, Result};
use crate::params::OceanFftConfig;

/// Per-execution inputs visible to every pass
#[derive(Debug, Clone, Copy)]
pub struct FrameInfo<'a> {
    /// Simulation time (seconds)
    pub time: f64,
    /// Initial spectra must be regenerated this frame
    pub resynthesize: bool,
    /// Run the per-frame evolve/transform/bake chain
    pub simulate: bool,
    pub config: &'a OceanFftConfig,
}

/// What a pass sees while recording
pub struct RecordContext<'a> {
    pub resources: &'a mut Resources,
    pub commands: &'a mut CommandBuffer,
    pub frame: &'a FrameInfo<'a>,
}

/// A node of the frame graph
pub trait FramePass {
    fn name(&self) -> &str;

    /// Compute passes synchronise on shader stages, others on transfer
    fn is_compute_pass(&self) -> bool {
        true
    }

    /// Index distinguishing instances of the same kind of pass
    fn pass_index(&self) -> u32 {
        0
    }

    fn is_enabled(&self, _frame: &FrameInfo<'_>) -> bool {
        true
    }

    fn record_into(&mut self, context: &mut RecordContext<'_>) -> Result<()>;
}

/// Identifies a pass within its graph
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PassHandle(u32);

impl PassHandle {
    pub fn index(&self) -> u32 {
        self.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BoundResource {
    Buffer(BufferId),
    Image(ImageId),
}

/// A resource declared on a pass
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Binding {
    pub resource: BoundResource,
    pub binding: u32,
    pub access: Access,
    /// Byte range for buffers; zero for images
    pub offset: u64,
    pub size: u64,
}

struct PassNode {
    pass: Box<dyn FramePass>,
    dependencies: Vec<PassHandle>,
    bindings: Vec<Binding>,
}

struct PendingBarrier {
    resource: BoundResource,
    src: Access,
    dst: Access,
}

struct CompiledGraph {
    order: Vec<usize>,
    barriers: Vec<Vec<PendingBarrier>>,
}

/// Dependency-ordered set of passes
#[derive(Default)]
pub struct FrameGraph {
    nodes: Vec<PassNode>,
    compiled: Option<CompiledGraph>,
}

impl FrameGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_pass(&mut self, pass: Box<dyn FramePass>) -> PassHandle {
        log::trace!("Adding pass '{}'", pass.name());
        self.compiled = None;
        self.nodes.push(PassNode {
            pass,
            dependencies: Vec::new(),
            bindings: Vec::new(),
        });
        PassHandle(self.nodes.len() as u32 - 1)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn pass_name(&self, pass: PassHandle) -> Result<&str, GraphError> {
        Ok(self.node(pass)?.pass.name())
    }

    pub fn dependencies(&self, pass: PassHandle) -> Result<&[PassHandle], GraphError> {
        Ok(&self.node(pass)?.dependencies)
    }

    pub fn bindings(&self, pass: PassHandle) -> Result<&[Binding], GraphError> {
        Ok(&self.node(pass)?.bindings)
    }

    /// `pass` runs after `on`
    pub fn add_dependency(&mut self, pass: PassHandle, on: PassHandle) -> Result<(), GraphError> {
        self.node(on)?;
        let node = self.node_mut(pass)?;
        if pass == on {
            return Err(GraphError::SelfDependency(node.pass.name().to_string()));
        }
        if !node.dependencies.contains(&on) {
            node.dependencies.push(on);
        }
        self.compiled = None;
        Ok(())
    }

    pub fn add_input_storage_buffer(
        &mut self,
        pass: PassHandle,
        buffer: BufferId,
        binding: u32,
        offset: u64,
        size: u64,
    ) -> Result<(), GraphError> {
        self.bind_buffer(pass, buffer, binding, offset, size, false)
    }

    pub fn add_output_storage_buffer(
        &mut self,
        pass: PassHandle,
        buffer: BufferId,
        binding: u32,
        offset: u64,
        size: u64,
    ) -> Result<(), GraphError> {
        self.bind_buffer(pass, buffer, binding, offset, size, true)
    }

    pub fn add_input_storage_view(
        &mut self,
        pass: PassHandle,
        image: ImageId,
        binding: u32,
    ) -> Result<(), GraphError> {
        self.bind_image(pass, image, binding, false)
    }

    pub fn add_output_storage_view(
        &mut self,
        pass: PassHandle,
        image: ImageId,
        binding: u32,
    ) -> Result<(), GraphError> {
        self.bind_image(pass, image, binding, true)
    }

    /// Buffer read by a copy; equivalent to an input binding on a transfer pass
    pub fn add_transfer_input_buffer(
        &mut self,
        pass: PassHandle,
        buffer: BufferId,
    ) -> Result<(), GraphError> {
        self.bind_buffer(pass, buffer, 0, 0, 0, false)
    }

    pub fn add_transfer_output_buffer(
        &mut self,
        pass: PassHandle,
        buffer: BufferId,
    ) -> Result<(), GraphError> {
        self.bind_buffer(pass, buffer, 0, 0, 0, true)
    }

    pub fn add_transfer_output_view(
        &mut self,
        pass: PassHandle,
        image: ImageId,
    ) -> Result<(), GraphError> {
        self.bind_image(pass, image, 0, true)
    }

    fn bind_buffer(
        &mut self,
        pass: PassHandle,
        buffer: BufferId,
        binding: u32,
        offset: u64,
        size: u64,
        write: bool,
    ) -> Result<(), GraphError> {
        self.bind(
            pass,
            BoundResource::Buffer(buffer),
            binding,
            offset,
            size,
            write,
        )
    }

    fn bind_image(
        &mut self,
        pass: PassHandle,
        image: ImageId,
        binding: u32,
        write: bool,
    ) -> Result<(), GraphError> {
        self.bind(pass, BoundResource::Image(image), binding, 0, 0, write)
    }

    fn bind(
        &mut self,
        pass: PassHandle,
        resource: BoundResource,
        binding: u32,
        offset: u64,
        size: u64,
        write: bool,
    ) -> Result<(), GraphError> {
        let node = self.node_mut(pass)?;
        let compute = node.pass.is_compute_pass();
        let access = if write {
            Access::write(compute)
        } else {
            Access::read(compute)
        };
        node.bindings.push(Binding {
            resource,
            binding,
            access,
            offset,
            size,
        });
        self.compiled = None;
        Ok(())
    }

    fn node(&self, pass: PassHandle) -> Result<&PassNode, GraphError> {
        self.nodes
            .get(pass.0 as usize)
            .ok_or(GraphError::UnknownPass(pass.0))
    }

    fn node_mut(&mut self, pass: PassHandle) -> Result<&mut PassNode, GraphError> {
        self.nodes
            .get_mut(pass.0 as usize)
            .ok_or(GraphError::UnknownPass(pass.0))
    }

    pub fn is_compiled(&self) -> bool {
        self.compiled.is_some()
    }

    /// Execution order, available once compiled
    pub fn order(&self) -> Option<Vec<PassHandle>> {
        self.compiled.as_ref().map(|compiled| {
            compiled
                .order
                .iter()
                .map(|&index| PassHandle(index as u32))
                .collect()
        })
    }

    /// Sort passes, validate resource hazards and precompute barriers.
    ///
    /// Passes with no ordering constraint between them keep insertion order.
    pub fn compile(&mut self, resources: &Resources) -> Result<(), GraphError> {
        let order = self.topological_order()?;
        let reachable = self.reachability(&order);
        self.check_hazards(resources, &reachable)?;

        let mut last_access: HashMap<BoundResource, Access> = HashMap::new();
        let mut barriers = Vec::with_capacity(self.nodes.len());
        for &index in &order {
            let mut pass_barriers = Vec::new();
            for binding in &self.nodes[index].bindings {
                let previous = last_access.get(&binding.resource).copied();
                match previous {
                    Some(src) if src.is_write() || binding.access.is_write() => {
                        pass_barriers.push(PendingBarrier {
                            resource: binding.resource,
                            src,
                            dst: binding.access,
                        });
                        last_access.insert(binding.resource, binding.access);
                    }
                    Some(_) => {}
                    None => {
                        last_access.insert(binding.resource, binding.access);
                    }
                }
            }
            barriers.push(pass_barriers);
        }

        log::debug!(
            "Compiled frame graph: {}",
            order
                .iter()
                .map(|&index| self.nodes[index].pass.name())
                .collect::<Vec<_>>()
                .join(" -> ")
        );
        self.compiled = Some(CompiledGraph { order, barriers });
        Ok(())
    }

    fn topological_order(&self) -> Result<Vec<usize>, GraphError> {
        let count = self.nodes.len();
        let mut in_degree = vec![0usize; count];
        let mut dependents: Vec<Vec<usize>> = vec![Vec::new(); count];
        for (index, node) in self.nodes.iter().enumerate() {
            for dependency in &node.dependencies {
                in_degree[index] += 1;
                dependents[dependency.0 as usize].push(index);
            }
        }

        let mut ready: VecDeque<usize> = (0..count).filter(|&i| in_degree[i] == 0).collect();
        let mut order = Vec::with_capacity(count);
        while let Some(index) = pick_lowest(&mut ready) {
            order.push(index);
            for &dependent in &dependents[index] {
                in_degree[dependent] -= 1;
                if in_degree[dependent] == 0 {
                    ready.push_back(dependent);
                }
            }
        }

        if order.len() != count {
            let stuck = (0..count)
                .filter(|&i| in_degree[i] > 0)
                .map(|i| self.nodes[i].pass.name().to_string())
                .collect();
            return Err(GraphError::Cycle(stuck));
        }
        Ok(order)
    }

    /// `reachable[a][b]`: a transitively depends on b
    fn reachability(&self, order: &[usize]) -> Vec<Vec<bool>> {
        let count = self.nodes.len();
        let mut reachable = vec![vec![false; count]; count];
        for &index in order {
            for dependency in &self.nodes[index].dependencies {
                let dependency = dependency.0 as usize;
                reachable[index][dependency] = true;
                for other in 0..count {
                    if reachable[dependency][other] {
                        reachable[index][other] = true;
                    }
                }
            }
        }
        reachable
    }

    fn check_hazards(&self, resources: &Resources, reachable: &[Vec<bool>]) -> Result<(), GraphError> {
        for (writer, writer_node) in self.nodes.iter().enumerate() {
            for write in writer_node.bindings.iter().filter(|b| b.access.is_write()) {
                for (other, other_node) in self.nodes.iter().enumerate() {
                    if other == writer || reachable[writer][other] || reachable[other][writer] {
                        continue;
                    }
                    if let Some(conflict) = other_node
                        .bindings
                        .iter()
                        .find(|b| b.resource == write.resource)
                    {
                        return Err(GraphError::MissingDependency {
                            reader: other_node.pass.name().to_string(),
                            writer: writer_node.pass.name().to_string(),
                            resource: describe(resources, write.resource).to_string(),
                            access: conflict.access,
                        });
                    }
                }
            }
        }
        Ok(())
    }

    /// Record every enabled pass in compiled order
    pub fn execute(
        &mut self,
        resources: &mut Resources,
        frame: &FrameInfo<'_>,
    ) -> Result<CommandBuffer> {
        let compiled = self.compiled.as_ref().ok_or(GraphError::NotCompiled)?;
        let mut commands = CommandBuffer::new();

        for (position, &index) in compiled.order.iter().enumerate() {
            let node = &mut self.nodes[index];
            if !node.pass.is_enabled(frame) {
                log::trace!("Skipping disabled pass '{}'", node.pass.name());
                continue;
            }

            for pending in &compiled.barriers[position] {
                commands.push(Command::Barrier(Barrier {
                    resource: describe(resources, pending.resource),
                    src: pending.src,
                    dst: pending.dst,
                }));
            }

            commands.push(Command::BeginPass {
                name: format!("{}#{}", node.pass.name(), node.pass.pass_index()),
                compute: node.pass.is_compute_pass(),
            });
            let mut context = RecordContext {
                resources: &mut *resources,
                commands: &mut commands,
                frame,
            };
            node.pass.record_into(&mut context)?;
        }

        Ok(commands)
    }
}

fn pick_lowest(ready: &mut VecDeque<usize>) -> Option<usize> {
    let position = ready
        .iter()
        .enumerate()
        .min_by_key(|(_, index)| **index)
        .map(|(position, _)| position)?;
    ready.remove(position)
}

fn describe(resources: &Resources, resource: BoundResource) -> ResourceRef {
    match resource {
        BoundResource::Buffer(id) => ResourceRef::Buffer(resources.buffers.label(id)),
        BoundResource::Image(id) => ResourceRef::Image(resources.images.label(id)),
    }
}
