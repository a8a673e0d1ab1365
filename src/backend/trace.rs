//! A command-recording backend.
//!
//! `TraceDevice` issues opaque ids, remembers every resource request,
//! descriptor-write batch, and submitted command sequence, and synthesizes
//! monotonic timestamps. Tests use it to assert what the runtime asked the
//! device to do — barrier placement, write batching, pipeline rebuild
//! counts — without touching real hardware.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use super::{
    BufferId, BufferUsage, Command, ComputeDevice, DescriptorSetId, DescriptorType,
    DescriptorWrite, DeviceError, ImageId, PipelineDesc, PipelineId, PipelineLayoutId, SamplerId,
    SamplerParams, SetLayoutId, ShaderId, SubmitTiming,
};

/// Synthetic tick deltas for the four timestamps of one submission.
const TICKS: [u64; 4] = [0, 250, 1_250, 1_500];

/// An owned copy of one pipeline build request.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PipelineRecord {
    pub layout: PipelineLayoutId,
    pub shader: ShaderId,
    pub entry_point: String,
    pub spec_constants: Vec<(u32, u32)>,
}

#[derive(Default)]
struct State {
    next_id: u64,
    samplers: Vec<SamplerParams>,
    set_layouts: Vec<Vec<DescriptorType>>,
    pipelines: Vec<PipelineRecord>,
    write_batches: Vec<Vec<DescriptorWrite>>,
    submissions: Vec<Vec<Command>>,
    buffers: HashMap<BufferId, Vec<u8>>,
    clock: u64,
}

/// Clones share the same recording, so a test can keep one handle for
/// assertions after moving another into a [`Device`](crate::device::Device).
#[derive(Clone, Default)]
pub struct TraceDevice {
    state: Arc<Mutex<State>>,
}

impl TraceDevice {
    pub fn new() -> TraceDevice {
        TraceDevice::default()
    }

    fn state(&self) -> std::sync::MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Every pipeline build requested so far, oldest first.
    pub fn pipelines(&self) -> Vec<PipelineRecord> {
        self.state().pipelines.clone()
    }

    pub fn pipeline_count(&self) -> usize {
        self.state().pipelines.len()
    }

    /// Descriptor-write batches, one entry per `update_descriptor_sets`.
    pub fn write_batches(&self) -> Vec<Vec<DescriptorWrite>> {
        self.state().write_batches.clone()
    }

    /// Command sequences, one entry per `submit`.
    pub fn submissions(&self) -> Vec<Vec<Command>> {
        self.state().submissions.clone()
    }

    pub fn sampler_count(&self) -> usize {
        self.state().samplers.len()
    }
}

impl State {
    fn issue(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }
}

impl ComputeDevice for TraceDevice {
    fn create_shader(&self, words: &[u32], _label: &str) -> Result<ShaderId, DeviceError> {
        if words.is_empty() {
            return Err(DeviceError::Backend("empty shader binary".to_string()));
        }
        Ok(ShaderId(self.state().issue()))
    }

    fn create_set_layout(&self, bindings: &[DescriptorType]) -> Result<SetLayoutId, DeviceError> {
        let mut state = self.state();
        state.set_layouts.push(bindings.to_vec());
        Ok(SetLayoutId(state.issue()))
    }

    fn create_pipeline_layout(
        &self,
        _sets: &[SetLayoutId],
    ) -> Result<PipelineLayoutId, DeviceError> {
        Ok(PipelineLayoutId(self.state().issue()))
    }

    fn allocate_descriptor_set(
        &self,
        _layout: SetLayoutId,
    ) -> Result<DescriptorSetId, DeviceError> {
        Ok(DescriptorSetId(self.state().issue()))
    }

    fn create_pipeline(&self, desc: &PipelineDesc) -> Result<PipelineId, DeviceError> {
        let mut state = self.state();
        state.pipelines.push(PipelineRecord {
            layout: desc.layout,
            shader: desc.shader,
            entry_point: desc.entry_point.to_string(),
            spec_constants: desc.spec_constants.to_vec(),
        });
        Ok(PipelineId(state.issue()))
    }

    fn create_sampler(&self, params: SamplerParams) -> Result<SamplerId, DeviceError> {
        let mut state = self.state();
        state.samplers.push(params);
        Ok(SamplerId(state.issue()))
    }

    fn create_buffer(&self, size: u64, _usage: BufferUsage) -> Result<BufferId, DeviceError> {
        let mut state = self.state();
        let id = BufferId(state.issue());
        state.buffers.insert(id, vec![0u8; size as usize]);
        Ok(id)
    }

    fn create_image(&self, _extent: [u32; 3]) -> Result<ImageId, DeviceError> {
        Ok(ImageId(self.state().issue()))
    }

    fn write_buffer(&self, buffer: BufferId, data: &[u8]) -> Result<(), DeviceError> {
        let mut state = self.state();
        let stored = state
            .buffers
            .get_mut(&buffer)
            .ok_or(DeviceError::UnknownResource)?;
        if data.len() > stored.len() {
            return Err(DeviceError::Backend("write exceeds buffer size".to_string()));
        }
        stored[..data.len()].copy_from_slice(data);
        Ok(())
    }

    fn read_buffer(&self, buffer: BufferId) -> Result<Vec<u8>, DeviceError> {
        self.state()
            .buffers
            .get(&buffer)
            .cloned()
            .ok_or(DeviceError::UnknownResource)
    }

    fn update_descriptor_sets(&self, writes: &[DescriptorWrite]) -> Result<(), DeviceError> {
        self.state().write_batches.push(writes.to_vec());
        Ok(())
    }

    fn submit(&self, commands: &[Command]) -> Result<SubmitTiming, DeviceError> {
        let mut state = self.state();
        state.submissions.push(commands.to_vec());

        let base = state.clock;
        state.clock += TICKS[TICKS.len() - 1] + 500;
        Ok(SubmitTiming {
            timestamps: [
                base + TICKS[0],
                base + TICKS[1],
                base + TICKS[2],
                base + TICKS[3],
            ],
        })
    }

    fn timestamp_period_ns(&self) -> f64 {
        1.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_unique_across_resource_classes() {
        let device = TraceDevice::new();
        let shader = device.create_shader(&[0x0723_0203], "s").unwrap();
        let layout = device.create_set_layout(&[]).unwrap();
        let buffer = device.create_buffer(16, BufferUsage::Storage).unwrap();
        assert_ne!(shader.0, layout.0);
        assert_ne!(layout.0, buffer.0);
    }

    #[test]
    fn timestamps_advance_across_submissions() {
        let device = TraceDevice::new();
        let first = device.submit(&[]).unwrap();
        let second = device.submit(&[]).unwrap();
        assert!(second.timestamps[0] > first.timestamps[3]);
    }

    #[test]
    fn buffer_round_trip() {
        let device = TraceDevice::new();
        let buffer = device.create_buffer(4, BufferUsage::Storage).unwrap();
        device.write_buffer(buffer, &[1, 2, 3, 4]).unwrap();
        assert_eq!(device.read_buffer(buffer).unwrap(), vec![1, 2, 3, 4]);
    }
}
