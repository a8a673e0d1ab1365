//! Single-use argument binder and executor for one kernel dispatch.

use std::time::{Duration, Instant};

use crate::abi::ArgKind;
use crate::backend::{
    BarrierScope, BindingResource, BufferId, Command, DescriptorWrite, ImageId, ImageLayout,
    ImageTransition, SamplerId, TimestampQuery,
};
use crate::error::Error;
use crate::kernel::Kernel;

/// A single-use binder/executor for one dispatch of one kernel.
///
/// Arguments are bound in ABI ordinal order; each bind is checked against
/// the kind the ABI declares at that ordinal, so an out-of-order caller
/// fails fast instead of corrupting the descriptor set. POD arguments
/// packed at non-zero offsets ride along with their offset-0 cluster head
/// and take no bind call of their own.
///
/// `run` consumes the invocation: completion and failure are both
/// terminal, and a retry requires a fresh invocation.
pub struct Invocation<'k> {
    kernel: &'k mut Kernel,
    /// Ordinal the next bind call must satisfy.
    next_ordinal: usize,
    writes: Vec<DescriptorWrite>,
    transitions: Vec<ImageTransition>,
    local_elements: Vec<u32>,
}

impl<'k> Invocation<'k> {
    pub(crate) fn new(kernel: &'k mut Kernel) -> Invocation<'k> {
        Invocation {
            kernel,
            next_ordinal: 0,
            writes: Vec::new(),
            transitions: Vec::new(),
            local_elements: Vec::new(),
        }
    }

    /// Bind a storage buffer for a `buffer` or storage-POD argument.
    pub fn bind_storage_buffer(&mut self, buffer: BufferId) -> Result<(), Error> {
        self.expect(&[ArgKind::Buffer, ArgKind::PodValue], "storage buffer")?;
        self.push_write(BindingResource::StorageBuffer(buffer));
        Ok(())
    }

    /// Bind a uniform buffer for a `pod_ubo` argument.
    pub fn bind_uniform_buffer(&mut self, buffer: BufferId) -> Result<(), Error> {
        self.expect(&[ArgKind::PodUniform], "uniform buffer")?;
        self.push_write(BindingResource::UniformBuffer(buffer));
        Ok(())
    }

    /// Bind a sampler argument.
    pub fn bind_sampler(&mut self, sampler: SamplerId) -> Result<(), Error> {
        self.expect(&[ArgKind::Sampler], "sampler")?;
        self.push_write(BindingResource::Sampler(sampler));
        Ok(())
    }

    /// Bind a read-only image argument. Registers a transition to the
    /// shader-read-only layout, ordered before the dispatch.
    pub fn bind_read_only_image(&mut self, image: ImageId) -> Result<(), Error> {
        self.expect(&[ArgKind::ReadOnlyImage], "read-only image")?;
        self.transitions.push(ImageTransition {
            image,
            new_layout: ImageLayout::ShaderReadOnly,
        });
        self.push_write(BindingResource::SampledImage(image));
        Ok(())
    }

    /// Bind a write-only image argument. Registers a transition to the
    /// general read/write layout, ordered before the dispatch.
    pub fn bind_write_only_image(&mut self, image: ImageId) -> Result<(), Error> {
        self.expect(&[ArgKind::WriteOnlyImage], "write-only image")?;
        self.transitions.push(ImageTransition {
            image,
            new_layout: ImageLayout::General,
        });
        self.push_write(BindingResource::StorageImage(image));
        Ok(())
    }

    /// Size a local-memory array argument. Consumes no descriptor binding;
    /// the element count becomes a pending specialization constant and
    /// forces a pipeline rebuild at `run`.
    pub fn bind_local_array(&mut self, num_elements: u32) -> Result<(), Error> {
        self.expect(&[ArgKind::LocalArray], "local array size")?;
        self.local_elements.push(num_elements);
        Ok(())
    }

    /// Execute the kernel over `workgroup_count` workgroups on each axis,
    /// blocking until the device is idle.
    pub fn run(self, workgroup_count: [u32; 3]) -> Result<ExecutionTime, Error> {
        let Invocation {
            kernel,
            writes,
            transitions,
            local_elements,
            ..
        } = self;

        // Local-array sizes are baked in as specialization constants, so
        // their presence forces a fresh pipeline.
        if !local_elements.is_empty() {
            kernel.update_pipeline(&local_elements)?;
        }

        let layout = kernel.layout();
        let mut all_writes =
            Vec::with_capacity(layout.literal_sampler_writes.len() + writes.len());
        all_writes.extend_from_slice(&layout.literal_sampler_writes);
        all_writes.extend_from_slice(&writes);

        let backend = kernel.device().backend();
        backend.update_descriptor_sets(&all_writes)?;

        let commands = vec![
            Command::BindPipeline(kernel.pipeline()),
            Command::BindDescriptorSets(layout.pipeline_layout, layout.descriptor_sets.clone()),
            Command::ResetQueries,
            Command::WriteTimestamp(TimestampQuery::Start),
            Command::Barrier {
                scope: BarrierScope::HostToShader,
                transitions,
            },
            Command::WriteTimestamp(TimestampQuery::PostBarrier),
            Command::Dispatch(workgroup_count),
            Command::WriteTimestamp(TimestampQuery::PostExecution),
            Command::Barrier {
                scope: BarrierScope::ShaderToHost,
                transitions: Vec::new(),
            },
            Command::WriteTimestamp(TimestampQuery::PostCompletion),
        ];

        let started = Instant::now();
        let timing = backend.submit(&commands)?;
        let cpu_duration = started.elapsed();

        tracing::debug!(
            entry_point = kernel.entry_point(),
            ?workgroup_count,
            ?cpu_duration,
            "dispatch complete"
        );

        let [start, host_barrier, execution, gpu_barrier] = timing.timestamps;
        Ok(ExecutionTime {
            cpu_duration,
            timestamps: Timestamps {
                start,
                host_barrier,
                execution,
                gpu_barrier,
                period_ns: backend.timestamp_period_ns(),
            },
        })
    }

    /// Check the bind call against the ABI at the next ordinal, then
    /// advance past it and any packed POD tail members.
    fn expect(&mut self, accepted: &[ArgKind], actual: &'static str) -> Result<(), Error> {
        let args = &self.kernel.abi().args;

        let Some(arg) = args.get(self.next_ordinal) else {
            return Err(Error::ArgumentMismatch {
                ordinal: self.next_ordinal,
                expected: "no further arguments",
                actual,
            });
        };

        if !accepted.contains(&arg.kind) {
            return Err(Error::ArgumentMismatch {
                ordinal: self.next_ordinal,
                expected: arg.kind.text(),
                actual,
            });
        }

        // Packed POD members at non-zero offsets share the cluster head's
        // binding and are satisfied by the same buffer.
        self.next_ordinal += 1;
        while args
            .get(self.next_ordinal)
            .is_some_and(|a| a.kind != ArgKind::LocalArray && a.offset > 0)
        {
            self.next_ordinal += 1;
        }
        Ok(())
    }

    /// Queue one descriptor write at the binding index equal to the number
    /// of argument writes queued so far.
    fn push_write(&mut self, resource: BindingResource) {
        self.writes.push(DescriptorWrite {
            set: self.kernel.layout().argument_set,
            binding: self.writes.len() as u32,
            resource,
        });
    }
}

/// Execution timing for one dispatch: wall-clock duration spanning
/// submission and wait, plus the four raw device timestamps.
#[derive(Clone, Copy, Debug)]
pub struct ExecutionTime {
    pub cpu_duration: Duration,
    pub timestamps: Timestamps,
}

/// The four device timestamps recorded around a dispatch, in ticks, with
/// the tick period needed to convert them to elapsed time.
#[derive(Clone, Copy, Debug)]
pub struct Timestamps {
    /// Before the host-to-shader barrier.
    pub start: u64,
    /// After the host-to-shader barrier.
    pub host_barrier: u64,
    /// After the dispatch.
    pub execution: u64,
    /// After the shader-to-host barrier.
    pub gpu_barrier: u64,
    /// Nanoseconds per timestamp tick.
    pub period_ns: f64,
}

impl Timestamps {
    fn span(&self, from: u64, to: u64) -> Duration {
        Duration::from_secs_f64(to.saturating_sub(from) as f64 * self.period_ns * 1e-9)
    }

    /// Cost of the pre-dispatch barrier.
    pub fn barrier_in(&self) -> Duration {
        self.span(self.start, self.host_barrier)
    }

    /// Cost of the kernel execution itself.
    pub fn execution(&self) -> Duration {
        self.span(self.host_barrier, self.execution)
    }

    /// Cost of the post-dispatch barrier.
    pub fn barrier_out(&self) -> Duration {
        self.span(self.execution, self.gpu_barrier)
    }

    /// Device-side time from first to last timestamp.
    pub fn total(&self) -> Duration {
        self.span(self.start, self.gpu_barrier)
    }
}
