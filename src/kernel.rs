//! A compute kernel: one entry point, specialized and ready to invoke.

use crate::abi::{ArgKind, KernelSpec};
use crate::backend::{PipelineDesc, PipelineId, ShaderId};
use crate::device::Device;
use crate::error::Error;
use crate::invocation::Invocation;
use crate::layout::KernelLayout;

/// Workgroup size always occupies specialization constants 0-2.
const WORKGROUP_SPEC_IDS: [u32; 3] = [0, 1, 2];

/// One entry point of a loaded module, with its own pipeline layout,
/// descriptor sets, and workgroup-size-specialized compute pipeline.
///
/// Kernels are move-only and exclusively own their GPU objects. The
/// pipeline may be rebuilt in place (same layout, shader, and entry point)
/// when an invocation binds local-array arguments.
pub struct Kernel {
    device: Device,
    shader: ShaderId,
    abi: KernelSpec,
    workgroup_size: [u32; 3],
    layout: KernelLayout,
    pipeline: PipelineId,
}

impl Kernel {
    pub(crate) fn new(
        device: Device,
        layout: KernelLayout,
        shader: ShaderId,
        abi: KernelSpec,
        workgroup_size: [u32; 3],
    ) -> Result<Kernel, Error> {
        let pipeline = build_pipeline(&device, &layout, shader, &abi, workgroup_size, &[])?;

        tracing::debug!(entry_point = %abi.name, ?workgroup_size, "kernel created");

        Ok(Kernel {
            device,
            shader,
            abi,
            workgroup_size,
            layout,
            pipeline,
        })
    }

    pub fn entry_point(&self) -> &str {
        &self.abi.name
    }

    pub fn workgroup_size(&self) -> [u32; 3] {
        self.workgroup_size
    }

    /// Start binding arguments for one dispatch. The invocation borrows
    /// the kernel exclusively: its descriptor sets are mutated in place by
    /// `run`, and a local-array bind rebuilds the pipeline.
    pub fn create_invocation(&mut self) -> Invocation<'_> {
        Invocation::new(self)
    }

    pub(crate) fn device(&self) -> &Device {
        &self.device
    }

    pub(crate) fn layout(&self) -> &KernelLayout {
        &self.layout
    }

    pub(crate) fn abi(&self) -> &KernelSpec {
        &self.abi
    }

    pub(crate) fn pipeline(&self) -> PipelineId {
        self.pipeline
    }

    /// Rebuild the pipeline with local-array element counts appended to
    /// the specialization list. Same layout, shader, and entry point; a
    /// full shader-specialization step each time — no pipeline cache.
    pub(crate) fn update_pipeline(&mut self, local_elements: &[u32]) -> Result<(), Error> {
        self.pipeline = build_pipeline(
            &self.device,
            &self.layout,
            self.shader,
            &self.abi,
            self.workgroup_size,
            local_elements,
        )?;
        tracing::debug!(
            entry_point = %self.abi.name,
            locals = local_elements.len(),
            "pipeline respecialized"
        );
        Ok(())
    }
}

fn build_pipeline(
    device: &Device,
    layout: &KernelLayout,
    shader: ShaderId,
    abi: &KernelSpec,
    workgroup_size: [u32; 3],
    local_elements: &[u32],
) -> Result<PipelineId, Error> {
    let constants = spec_constants(abi, workgroup_size, local_elements);

    let pipeline = device.backend().create_pipeline(&PipelineDesc {
        layout: layout.pipeline_layout,
        shader,
        entry_point: &abi.name,
        spec_constants: &constants,
    })?;
    Ok(pipeline)
}

/// Specialization constants: workgroup size at ids 0-2, then each bound
/// local-array element count at the id the ABI assigned to that argument,
/// in ordinal order.
fn spec_constants(
    abi: &KernelSpec,
    workgroup_size: [u32; 3],
    local_elements: &[u32],
) -> Vec<(u32, u32)> {
    let mut constants: Vec<(u32, u32)> = WORKGROUP_SPEC_IDS
        .into_iter()
        .zip(workgroup_size)
        .collect();

    let local_ids = abi
        .args
        .iter()
        .filter(|arg| arg.kind == ArgKind::LocalArray)
        .map(|arg| arg.spec_constant as u32);
    constants.extend(local_ids.zip(local_elements.iter().copied()));

    constants
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::abi::AbiMap;

    fn kernel_spec(text: &str, name: &str) -> KernelSpec {
        AbiMap::parse(text).unwrap().find_kernel(name).unwrap().clone()
    }

    #[test]
    fn workgroup_size_is_constants_zero_through_two() {
        let spec = kernel_spec(
            "kernel,k,argOrdinal,0,argKind,buffer,descriptorSet,0,binding,0,offset,0",
            "k",
        );
        assert_eq!(
            spec_constants(&spec, [8, 4, 2], &[]),
            vec![(0, 8), (1, 4), (2, 2)]
        );
    }

    #[test]
    fn local_counts_use_abi_assigned_ids() {
        let spec = kernel_spec(
            "kernel,k,argOrdinal,0,argKind,buffer,descriptorSet,0,binding,0,offset,0\n\
             kernel,k,argOrdinal,1,argKind,local,arrayNumElemSpecId,5\n\
             kernel,k,argOrdinal,2,argKind,local,arrayNumElemSpecId,3",
            "k",
        );
        assert_eq!(
            spec_constants(&spec, [1, 1, 1], &[128, 64]),
            vec![(0, 1), (1, 1), (2, 1), (5, 128), (3, 64)]
        );
    }
}
