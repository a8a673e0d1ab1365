//! The abstract contract this runtime requires from its compute layer.
//!
//! The core never talks to a GPU API directly. It creates resources through
//! [`ComputeDevice`], refers to them by opaque ids, and hands the device a
//! flat [`Command`] list to execute synchronously. Two implementations ship
//! with the crate:
//!
//!   - [`trace::TraceDevice`] — records every call; used by the test suite
//!     to assert command ordering, barrier placement, and rebuild counts.
//!   - [`wgpu::WgpuDevice`] — executes on a real adapter through wgpu.

pub mod trace;
pub mod wgpu;

use thiserror::Error;

pub use trace::TraceDevice;
pub use wgpu::WgpuDevice;

#[derive(Debug, Error)]
pub enum DeviceError {
    #[error("no suitable adapter")]
    Unavailable,
    #[error("unknown resource id")]
    UnknownResource,
    #[error("{0}")]
    Backend(String),
}

macro_rules! resource_id {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(pub u64);
    };
}

resource_id!(ShaderId);
resource_id!(SetLayoutId);
resource_id!(PipelineLayoutId);
resource_id!(DescriptorSetId);
resource_id!(PipelineId);
resource_id!(SamplerId);
resource_id!(BufferId);
resource_id!(ImageId);

/// Resource class of one descriptor-set binding.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DescriptorType {
    StorageBuffer,
    UniformBuffer,
    Sampler,
    SampledImage,
    StorageImage,
}

/// What a buffer is for; backends translate to their own usage flags.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BufferUsage {
    Storage,
    Uniform,
}

/// Native sampler parameters produced by the OpenCL flag translation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SamplerParams {
    pub filter: FilterMode,
    /// Mipmap mode is always nearest for clspv-produced kernels.
    pub address_mode: AddressMode,
    pub unnormalized_coordinates: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FilterMode {
    Nearest,
    Linear,
}

/// One address mode, applied uniformly to all three axes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AddressMode {
    ClampToEdge,
    ClampToBorder,
    Repeat,
    MirroredRepeat,
}

/// One pending write into a descriptor set. Writes are queued by the
/// invocation and applied to the device in a single batch.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DescriptorWrite {
    pub set: DescriptorSetId,
    pub binding: u32,
    pub resource: BindingResource,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BindingResource {
    StorageBuffer(BufferId),
    UniformBuffer(BufferId),
    Sampler(SamplerId),
    SampledImage(ImageId),
    StorageImage(ImageId),
}

impl BindingResource {
    pub fn descriptor_type(&self) -> DescriptorType {
        match self {
            BindingResource::StorageBuffer(_) => DescriptorType::StorageBuffer,
            BindingResource::UniformBuffer(_) => DescriptorType::UniformBuffer,
            BindingResource::Sampler(_) => DescriptorType::Sampler,
            BindingResource::SampledImage(_) => DescriptorType::SampledImage,
            BindingResource::StorageImage(_) => DescriptorType::StorageImage,
        }
    }
}

/// Everything a compute pipeline build needs. Specialization constants are
/// (id, value) pairs; ids 0-2 always carry the workgroup size.
#[derive(Clone, Debug)]
pub struct PipelineDesc<'a> {
    pub layout: PipelineLayoutId,
    pub shader: ShaderId,
    pub entry_point: &'a str,
    pub spec_constants: &'a [(u32, u32)],
}

/// Image layout a barrier transitions an image into before the dispatch.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ImageLayout {
    /// Sampled read in the compute stage.
    ShaderReadOnly,
    /// General read/write for storage images.
    General,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ImageTransition {
    pub image: ImageId,
    pub new_layout: ImageLayout,
}

/// Direction of a memory barrier within the recorded sequence.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BarrierScope {
    /// Prior host/transfer writes become visible to compute-shader reads.
    HostToShader,
    /// Compute-shader writes become visible to host/transfer reads.
    ShaderToHost,
}

/// The four timestamps recorded around every dispatch, in query order.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TimestampQuery {
    Start = 0,
    PostBarrier = 1,
    PostExecution = 2,
    PostCompletion = 3,
}

pub const TIMESTAMP_COUNT: u32 = 4;

/// One recorded command. An invocation records a flat sequence and submits
/// it in one batch; the device executes it in order.
#[derive(Clone, Debug, PartialEq)]
pub enum Command {
    BindPipeline(PipelineId),
    /// Bind all descriptor sets of the pipeline layout, first set index 0.
    BindDescriptorSets(PipelineLayoutId, Vec<DescriptorSetId>),
    ResetQueries,
    WriteTimestamp(TimestampQuery),
    Barrier {
        scope: BarrierScope,
        transitions: Vec<ImageTransition>,
    },
    Dispatch([u32; 3]),
}

/// Raw 64-bit timestamps read back after a synchronous submit, indexed by
/// [`TimestampQuery`] order.
#[derive(Clone, Copy, Debug, Default)]
pub struct SubmitTiming {
    pub timestamps: [u64; TIMESTAMP_COUNT as usize],
}

/// The backend contract (spec of the graphics/compute layer this core
/// consumes). All methods take `&self`; implementations use interior
/// mutability. Descriptor-set allocation and updates are not required to be
/// thread-safe against each other — callers running kernels concurrently
/// give each thread its own sets.
pub trait ComputeDevice: Send + Sync {
    /// Create a shader module from a word-aligned SPIR-V binary.
    fn create_shader(&self, words: &[u32], label: &str) -> Result<ShaderId, DeviceError>;

    /// Create a descriptor-set layout: one binding per entry, binding
    /// numbers assigned sequentially from 0 in slice order.
    fn create_set_layout(&self, bindings: &[DescriptorType]) -> Result<SetLayoutId, DeviceError>;

    fn create_pipeline_layout(&self, sets: &[SetLayoutId])
        -> Result<PipelineLayoutId, DeviceError>;

    /// Allocate one descriptor set from the device's shared pool.
    fn allocate_descriptor_set(&self, layout: SetLayoutId)
        -> Result<DescriptorSetId, DeviceError>;

    /// Build a compute pipeline. No pipeline cache: every call performs a
    /// full shader-specialization step.
    fn create_pipeline(&self, desc: &PipelineDesc) -> Result<PipelineId, DeviceError>;

    fn create_sampler(&self, params: SamplerParams) -> Result<SamplerId, DeviceError>;

    fn create_buffer(&self, size: u64, usage: BufferUsage) -> Result<BufferId, DeviceError>;

    fn create_image(&self, extent: [u32; 3]) -> Result<ImageId, DeviceError>;

    fn write_buffer(&self, buffer: BufferId, data: &[u8]) -> Result<(), DeviceError>;

    fn read_buffer(&self, buffer: BufferId) -> Result<Vec<u8>, DeviceError>;

    /// Apply all queued descriptor writes in one batch. Referenced
    /// resources must stay alive until the call returns.
    fn update_descriptor_sets(&self, writes: &[DescriptorWrite]) -> Result<(), DeviceError>;

    /// Execute one recorded command sequence on the compute queue and
    /// block until the queue is idle. No timeout, no cancellation: a
    /// stalled device stalls the caller.
    fn submit(&self, commands: &[Command]) -> Result<SubmitTiming, DeviceError>;

    /// Nanoseconds per timestamp tick.
    fn timestamp_period_ns(&self) -> f64;
}
