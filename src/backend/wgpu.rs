//! wgpu realization of the [`ComputeDevice`](super::ComputeDevice)
//! contract.
//!
//! Resource handles map onto retained wgpu objects held behind a mutex;
//! descriptor sets are tracked as binding tables and materialized into
//! bind groups when a submission binds them. wgpu tracks hazards and image
//! layouts itself, so barrier and query-reset commands are ordering
//! markers with no explicit encoding here. Timestamps resolve through a
//! query set into a staging buffer and read back synchronously.

use std::borrow::Cow;
use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;

use super::{
    AddressMode, BindingResource, BufferId, BufferUsage, Command, ComputeDevice, DescriptorSetId,
    DescriptorType, DescriptorWrite, DeviceError, FilterMode, ImageId, PipelineDesc, PipelineId,
    PipelineLayoutId, SamplerId, SamplerParams, SetLayoutId, ShaderId, SubmitTiming,
    TIMESTAMP_COUNT,
};

pub struct WgpuDevice {
    device: wgpu::Device,
    queue: wgpu::Queue,
    state: Mutex<Resources>,
}

#[derive(Default)]
struct Resources {
    next_id: u64,
    shaders: HashMap<u64, wgpu::ShaderModule>,
    set_layouts: HashMap<u64, wgpu::BindGroupLayout>,
    pipeline_layouts: HashMap<u64, wgpu::PipelineLayout>,
    pipelines: HashMap<u64, wgpu::ComputePipeline>,
    samplers: HashMap<u64, wgpu::Sampler>,
    buffers: HashMap<u64, wgpu::Buffer>,
    images: HashMap<u64, wgpu::TextureView>,
    sets: HashMap<u64, DescriptorSet>,
}

/// Tracked contents of one descriptor set, materialized into a bind group
/// at submission time.
struct DescriptorSet {
    layout: u64,
    entries: BTreeMap<u32, BindingResource>,
}

impl Resources {
    fn issue(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }
}

impl WgpuDevice {
    /// Create a device on the best available adapter. Returns
    /// [`DeviceError::Unavailable`] when no adapter exists or the needed
    /// timestamp/border-clamp features are missing.
    pub fn try_new() -> Result<WgpuDevice, DeviceError> {
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });
        let adapter = pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: wgpu::PowerPreference::HighPerformance,
            compatible_surface: None,
            force_fallback_adapter: false,
        }))
        .ok_or(DeviceError::Unavailable)?;

        let (device, queue) = pollster::block_on(adapter.request_device(
            &wgpu::DeviceDescriptor {
                label: Some("clspv-runner"),
                required_features: wgpu::Features::TIMESTAMP_QUERY
                    | wgpu::Features::TIMESTAMP_QUERY_INSIDE_ENCODERS
                    | wgpu::Features::ADDRESS_MODE_CLAMP_TO_BORDER,
                required_limits: wgpu::Limits::default(),
                memory_hints: wgpu::MemoryHints::Performance,
            },
            None,
        ))
        .map_err(|e| DeviceError::Backend(e.to_string()))?;

        Ok(WgpuDevice {
            device,
            queue,
            state: Mutex::new(Resources::default()),
        })
    }

    fn state(&self) -> std::sync::MutexGuard<'_, Resources> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Copy a buffer into a fresh staging buffer and map it for reading.
    fn read_back(&self, source: &wgpu::Buffer, size: u64) -> Result<Vec<u8>, DeviceError> {
        let padded = size.next_multiple_of(wgpu::COPY_BUFFER_ALIGNMENT);
        let staging = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("readback"),
            size: padded,
            usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor { label: None });
        encoder.copy_buffer_to_buffer(source, 0, &staging, 0, padded);
        self.queue.submit(std::iter::once(encoder.finish()));

        let slice = staging.slice(..);
        let (tx, rx) = std::sync::mpsc::channel();
        slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = tx.send(result);
        });
        let _ = self.device.poll(wgpu::Maintain::Wait);
        rx.recv()
            .map_err(|_| DeviceError::Backend("readback channel closed".to_string()))?
            .map_err(|e| DeviceError::Backend(e.to_string()))?;

        let data = slice.get_mapped_range();
        let mut out = data.to_vec();
        drop(data);
        staging.unmap();
        out.truncate(size as usize);
        Ok(out)
    }
}

impl ComputeDevice for WgpuDevice {
    fn create_shader(&self, words: &[u32], label: &str) -> Result<ShaderId, DeviceError> {
        let module = self.device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some(label),
            source: wgpu::ShaderSource::SpirV(Cow::Owned(words.to_vec())),
        });
        let mut state = self.state();
        let id = state.issue();
        state.shaders.insert(id, module);
        Ok(ShaderId(id))
    }

    fn create_set_layout(&self, bindings: &[DescriptorType]) -> Result<SetLayoutId, DeviceError> {
        let entries: Vec<wgpu::BindGroupLayoutEntry> = bindings
            .iter()
            .enumerate()
            .map(|(binding, ty)| wgpu::BindGroupLayoutEntry {
                binding: binding as u32,
                visibility: wgpu::ShaderStages::COMPUTE,
                ty: binding_type(*ty),
                count: None,
            })
            .collect();

        let layout = self
            .device
            .create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: Some("kernel-set"),
                entries: &entries,
            });

        let mut state = self.state();
        let id = state.issue();
        state.set_layouts.insert(id, layout);
        Ok(SetLayoutId(id))
    }

    fn create_pipeline_layout(
        &self,
        sets: &[SetLayoutId],
    ) -> Result<PipelineLayoutId, DeviceError> {
        let state = self.state();
        let mut layouts = Vec::with_capacity(sets.len());
        for set in sets {
            layouts.push(
                state
                    .set_layouts
                    .get(&set.0)
                    .ok_or(DeviceError::UnknownResource)?,
            );
        }

        let layout = self
            .device
            .create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                label: Some("kernel-pipeline-layout"),
                bind_group_layouts: &layouts,
                push_constant_ranges: &[],
            });

        drop(state);
        let mut state = self.state();
        let id = state.issue();
        state.pipeline_layouts.insert(id, layout);
        Ok(PipelineLayoutId(id))
    }

    fn allocate_descriptor_set(
        &self,
        layout: SetLayoutId,
    ) -> Result<DescriptorSetId, DeviceError> {
        let mut state = self.state();
        if !state.set_layouts.contains_key(&layout.0) {
            return Err(DeviceError::UnknownResource);
        }
        let id = state.issue();
        state.sets.insert(
            id,
            DescriptorSet {
                layout: layout.0,
                entries: BTreeMap::new(),
            },
        );
        Ok(DescriptorSetId(id))
    }

    fn create_pipeline(&self, desc: &PipelineDesc) -> Result<PipelineId, DeviceError> {
        // Specialization constants travel as override values keyed by
        // their numeric ids.
        let constants: HashMap<String, f64> = desc
            .spec_constants
            .iter()
            .map(|(id, value)| (id.to_string(), f64::from(*value)))
            .collect();

        let state = self.state();
        let layout = state
            .pipeline_layouts
            .get(&desc.layout.0)
            .ok_or(DeviceError::UnknownResource)?;
        let shader = state
            .shaders
            .get(&desc.shader.0)
            .ok_or(DeviceError::UnknownResource)?;

        let pipeline = self
            .device
            .create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
                label: Some(desc.entry_point),
                layout: Some(layout),
                module: shader,
                entry_point: Some(desc.entry_point),
                compilation_options: wgpu::PipelineCompilationOptions {
                    constants: &constants,
                    zero_initialize_workgroup_memory: false,
                },
                cache: None,
            });

        drop(state);
        let mut state = self.state();
        let id = state.issue();
        state.pipelines.insert(id, pipeline);
        Ok(PipelineId(id))
    }

    fn create_sampler(&self, params: SamplerParams) -> Result<SamplerId, DeviceError> {
        let address_mode = match params.address_mode {
            AddressMode::ClampToEdge => wgpu::AddressMode::ClampToEdge,
            AddressMode::ClampToBorder => wgpu::AddressMode::ClampToBorder,
            AddressMode::Repeat => wgpu::AddressMode::Repeat,
            AddressMode::MirroredRepeat => wgpu::AddressMode::MirrorRepeat,
        };
        let filter = match params.filter {
            FilterMode::Nearest => wgpu::FilterMode::Nearest,
            FilterMode::Linear => wgpu::FilterMode::Linear,
        };

        // wgpu has no unnormalized-coordinate sampling mode; shaders
        // compiled for unnormalized access must scale coordinates
        // themselves. The flag is accepted and dropped here.
        let sampler = self.device.create_sampler(&wgpu::SamplerDescriptor {
            label: None,
            address_mode_u: address_mode,
            address_mode_v: address_mode,
            address_mode_w: address_mode,
            mag_filter: filter,
            min_filter: filter,
            mipmap_filter: wgpu::FilterMode::Nearest,
            border_color: (params.address_mode == AddressMode::ClampToBorder)
                .then_some(wgpu::SamplerBorderColor::TransparentBlack),
            ..Default::default()
        });

        let mut state = self.state();
        let id = state.issue();
        state.samplers.insert(id, sampler);
        Ok(SamplerId(id))
    }

    fn create_buffer(&self, size: u64, usage: BufferUsage) -> Result<BufferId, DeviceError> {
        let usage = match usage {
            BufferUsage::Storage => {
                wgpu::BufferUsages::STORAGE
                    | wgpu::BufferUsages::COPY_DST
                    | wgpu::BufferUsages::COPY_SRC
            }
            BufferUsage::Uniform => wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        };
        let buffer = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: None,
            size: size.next_multiple_of(wgpu::COPY_BUFFER_ALIGNMENT),
            usage,
            mapped_at_creation: false,
        });

        let mut state = self.state();
        let id = state.issue();
        state.buffers.insert(id, buffer);
        Ok(BufferId(id))
    }

    fn create_image(&self, extent: [u32; 3]) -> Result<ImageId, DeviceError> {
        let texture = self.device.create_texture(&wgpu::TextureDescriptor {
            label: None,
            size: wgpu::Extent3d {
                width: extent[0],
                height: extent[1],
                depth_or_array_layers: extent[2].max(1),
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D3,
            format: wgpu::TextureFormat::Rgba8Unorm,
            usage: wgpu::TextureUsages::TEXTURE_BINDING
                | wgpu::TextureUsages::STORAGE_BINDING
                | wgpu::TextureUsages::COPY_DST
                | wgpu::TextureUsages::COPY_SRC,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());

        let mut state = self.state();
        let id = state.issue();
        state.images.insert(id, view);
        Ok(ImageId(id))
    }

    fn write_buffer(&self, buffer: BufferId, data: &[u8]) -> Result<(), DeviceError> {
        let state = self.state();
        let buffer = state
            .buffers
            .get(&buffer.0)
            .ok_or(DeviceError::UnknownResource)?;
        self.queue.write_buffer(buffer, 0, data);
        Ok(())
    }

    fn read_buffer(&self, buffer: BufferId) -> Result<Vec<u8>, DeviceError> {
        let state = self.state();
        let buffer = state
            .buffers
            .get(&buffer.0)
            .ok_or(DeviceError::UnknownResource)?;
        let size = buffer.size();
        self.read_back(buffer, size)
    }

    fn update_descriptor_sets(&self, writes: &[DescriptorWrite]) -> Result<(), DeviceError> {
        let mut state = self.state();
        for write in writes {
            let set = state
                .sets
                .get_mut(&write.set.0)
                .ok_or(DeviceError::UnknownResource)?;
            set.entries.insert(write.binding, write.resource);
        }
        Ok(())
    }

    fn submit(&self, commands: &[Command]) -> Result<SubmitTiming, DeviceError> {
        let query_set = self.device.create_query_set(&wgpu::QuerySetDescriptor {
            label: Some("dispatch-timestamps"),
            ty: wgpu::QueryType::Timestamp,
            count: TIMESTAMP_COUNT,
        });
        let resolve_size = u64::from(TIMESTAMP_COUNT) * 8;
        let resolve_buffer = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("timestamp-resolve"),
            size: resolve_size,
            usage: wgpu::BufferUsages::QUERY_RESOLVE | wgpu::BufferUsages::COPY_SRC,
            mapped_at_creation: false,
        });

        let state = self.state();
        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("kernel-dispatch"),
            });

        let mut pipeline: Option<&wgpu::ComputePipeline> = None;
        let mut bind_groups: Vec<wgpu::BindGroup> = Vec::new();

        for command in commands {
            match command {
                Command::BindPipeline(id) => {
                    pipeline = Some(
                        state
                            .pipelines
                            .get(&id.0)
                            .ok_or(DeviceError::UnknownResource)?,
                    );
                }
                Command::BindDescriptorSets(_, sets) => {
                    bind_groups.clear();
                    for set_id in sets {
                        bind_groups.push(materialize_bind_group(
                            &self.device,
                            &state,
                            *set_id,
                        )?);
                    }
                }
                // wgpu manages query lifetimes and hazards itself; resets
                // and barriers need no encoding.
                Command::ResetQueries | Command::Barrier { .. } => {}
                Command::WriteTimestamp(query) => {
                    encoder.write_timestamp(&query_set, *query as u32);
                }
                Command::Dispatch(count) => {
                    let pipeline = pipeline.ok_or_else(|| {
                        DeviceError::Backend("dispatch without a bound pipeline".to_string())
                    })?;
                    let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                        label: Some("kernel-pass"),
                        timestamp_writes: None,
                    });
                    pass.set_pipeline(pipeline);
                    for (index, group) in bind_groups.iter().enumerate() {
                        pass.set_bind_group(index as u32, group, &[]);
                    }
                    pass.dispatch_workgroups(count[0], count[1], count[2]);
                }
            }
        }

        encoder.resolve_query_set(&query_set, 0..TIMESTAMP_COUNT, &resolve_buffer, 0);
        self.queue.submit(std::iter::once(encoder.finish()));
        let _ = self.device.poll(wgpu::Maintain::Wait);
        drop(state);

        let raw = self.read_back(&resolve_buffer, resolve_size)?;
        let ticks: &[u64] = bytemuck::cast_slice(&raw);
        Ok(SubmitTiming {
            timestamps: [ticks[0], ticks[1], ticks[2], ticks[3]],
        })
    }

    fn timestamp_period_ns(&self) -> f64 {
        f64::from(self.queue.get_timestamp_period())
    }
}

fn binding_type(ty: DescriptorType) -> wgpu::BindingType {
    match ty {
        DescriptorType::StorageBuffer => wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Storage { read_only: false },
            has_dynamic_offset: false,
            min_binding_size: None,
        },
        DescriptorType::UniformBuffer => wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Uniform,
            has_dynamic_offset: false,
            min_binding_size: None,
        },
        DescriptorType::Sampler => {
            wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering)
        }
        DescriptorType::SampledImage => wgpu::BindingType::Texture {
            sample_type: wgpu::TextureSampleType::Float { filterable: true },
            view_dimension: wgpu::TextureViewDimension::D3,
            multisampled: false,
        },
        DescriptorType::StorageImage => wgpu::BindingType::StorageTexture {
            access: wgpu::StorageTextureAccess::WriteOnly,
            format: wgpu::TextureFormat::Rgba8Unorm,
            view_dimension: wgpu::TextureViewDimension::D3,
        },
    }
}

/// Build a bind group from a descriptor set's tracked binding table.
fn materialize_bind_group(
    device: &wgpu::Device,
    state: &Resources,
    set_id: DescriptorSetId,
) -> Result<wgpu::BindGroup, DeviceError> {
    let set = state
        .sets
        .get(&set_id.0)
        .ok_or(DeviceError::UnknownResource)?;
    let layout = state
        .set_layouts
        .get(&set.layout)
        .ok_or(DeviceError::UnknownResource)?;

    let mut entries = Vec::with_capacity(set.entries.len());
    for (&binding, resource) in &set.entries {
        let resource = match resource {
            BindingResource::StorageBuffer(id) | BindingResource::UniformBuffer(id) => state
                .buffers
                .get(&id.0)
                .ok_or(DeviceError::UnknownResource)?
                .as_entire_binding(),
            BindingResource::Sampler(id) => wgpu::BindingResource::Sampler(
                state
                    .samplers
                    .get(&id.0)
                    .ok_or(DeviceError::UnknownResource)?,
            ),
            BindingResource::SampledImage(id) | BindingResource::StorageImage(id) => {
                wgpu::BindingResource::TextureView(
                    state
                        .images
                        .get(&id.0)
                        .ok_or(DeviceError::UnknownResource)?,
                )
            }
        };
        entries.push(wgpu::BindGroupEntry { binding, resource });
    }

    Ok(device.create_bind_group(&wgpu::BindGroupDescriptor {
        label: Some("kernel-bind-group"),
        layout,
        entries: &entries,
    }))
}
