//! Descriptor and pipeline layout derivation for one kernel entry point.
//!
//! A module with literal samplers contributes a shared sampler-set layout
//! at set 0; each entry point then gets a private argument-set layout, its
//! own pipeline layout, and freshly allocated descriptor sets. Descriptor
//! sets are never shared between entry points, even within one module, so
//! per-kernel specialization stays independent.

use crate::abi::{AbiMap, ArgKind, KernelSpec};
use crate::backend::{
    BindingResource, DescriptorSetId, DescriptorType, DescriptorWrite, PipelineLayoutId,
    SamplerId, SetLayoutId,
};
use crate::device::Device;
use crate::error::Error;

/// Backend resource type for an argument kind. `LocalArray` consumes no
/// descriptor binding.
pub fn descriptor_type(kind: ArgKind) -> Option<DescriptorType> {
    match kind {
        ArgKind::PodUniform => Some(DescriptorType::UniformBuffer),
        ArgKind::PodValue | ArgKind::Buffer => Some(DescriptorType::StorageBuffer),
        ArgKind::ReadOnlyImage => Some(DescriptorType::SampledImage),
        ArgKind::WriteOnlyImage => Some(DescriptorType::StorageImage),
        ArgKind::Sampler => Some(DescriptorType::Sampler),
        ArgKind::LocalArray | ArgKind::Unknown => None,
    }
}

/// Everything layout-shaped a kernel owns: set layouts, pipeline layout,
/// allocated descriptor sets, and the prepared literal-sampler writes each
/// invocation inherits.
#[derive(Clone, Debug)]
pub struct KernelLayout {
    pub set_layouts: Vec<SetLayoutId>,
    pub pipeline_layout: PipelineLayoutId,
    pub descriptor_sets: Vec<DescriptorSetId>,
    /// The set receiving the kernel's own argument writes.
    pub argument_set: DescriptorSetId,
    pub literal_sampler_writes: Vec<DescriptorWrite>,
}

/// Build the layouts and descriptor sets for `entry_point`.
pub fn build(
    device: &Device,
    abi: &AbiMap,
    literal_samplers: &[SamplerId],
    entry_point: &str,
) -> Result<KernelLayout, Error> {
    let kernel = abi
        .find_kernel(entry_point)
        .ok_or_else(|| Error::EntryPointNotFound(entry_point.to_string()))?;

    let backend = device.backend();
    let mut set_layouts = Vec::with_capacity(2);

    if !abi.samplers.is_empty() {
        let bindings = vec![DescriptorType::Sampler; abi.samplers.len()];
        set_layouts.push(backend.create_set_layout(&bindings)?);
    }

    set_layouts.push(backend.create_set_layout(&argument_bindings(kernel))?);

    let pipeline_layout = backend.create_pipeline_layout(&set_layouts)?;

    let mut descriptor_sets = Vec::with_capacity(set_layouts.len());
    for layout in &set_layouts {
        descriptor_sets.push(backend.allocate_descriptor_set(*layout)?);
    }

    // The argument set is the last one; set 0 belongs to the samplers when
    // the module declares any.
    debug_assert!(
        kernel.descriptor_set < 0
            || kernel.descriptor_set as usize == descriptor_sets.len() - 1
    );
    let argument_set = descriptor_sets[descriptor_sets.len() - 1];

    let literal_sampler_writes = if abi.samplers_desc_set >= 0 {
        let sampler_set = descriptor_sets[abi.samplers_desc_set as usize];
        literal_samplers
            .iter()
            .enumerate()
            .map(|(binding, id)| DescriptorWrite {
                set: sampler_set,
                binding: binding as u32,
                resource: BindingResource::Sampler(*id),
            })
            .collect()
    } else {
        Vec::new()
    };

    Ok(KernelLayout {
        set_layouts,
        pipeline_layout,
        descriptor_sets,
        argument_set,
        literal_sampler_writes,
    })
}

/// One binding per logical argument: only offset-0 args occupy a binding,
/// assigned sequentially in ordinal order.
fn argument_bindings(kernel: &KernelSpec) -> Vec<DescriptorType> {
    kernel
        .args
        .iter()
        .filter(|arg| arg.offset == 0)
        .filter_map(|arg| descriptor_type(arg.kind))
        .collect()
}
