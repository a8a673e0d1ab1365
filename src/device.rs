//! Shared device handle: a backend plus the per-device literal-sampler
//! cache.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use crate::backend::{ComputeDevice, SamplerId};
use crate::error::Error;
use crate::sampler;

/// A cheaply clonable handle to one compute device.
///
/// Modules, kernels, and invocations each hold a `Device` clone; the
/// underlying backend and sampler cache are shared. Sampler-cache access is
/// serialized internally, so kernel construction on several threads sharing
/// one device is safe; descriptor-set allocation and updates are not, per
/// the backend contract.
#[derive(Clone)]
pub struct Device {
    inner: Arc<Inner>,
}

struct Inner {
    backend: Box<dyn ComputeDevice>,
    /// Literal samplers keyed by raw OpenCL flag bitfield. Populated
    /// lazily on first request, never evicted before device teardown.
    samplers: Mutex<HashMap<u32, SamplerId>>,
}

impl Device {
    pub fn new(backend: impl ComputeDevice + 'static) -> Device {
        Device {
            inner: Arc::new(Inner {
                backend: Box::new(backend),
                samplers: Mutex::new(HashMap::new()),
            }),
        }
    }

    pub fn backend(&self) -> &dyn ComputeDevice {
        self.inner.backend.as_ref()
    }

    /// Fetch the sampler for an OpenCL flag bitfield, creating and caching
    /// it on first request. Repeated requests for the same flags return the
    /// same sampler object.
    pub fn cached_sampler(&self, opencl_flags: u32) -> Result<SamplerId, Error> {
        let mut cache = self
            .inner
            .samplers
            .lock()
            .map_err(|_| Error::Dispatch("sampler cache poisoned".to_string()))?;

        if let Some(&id) = cache.get(&opencl_flags) {
            return Ok(id);
        }

        let params = sampler::translate(opencl_flags)?;
        let id = self.inner.backend.create_sampler(params)?;
        cache.insert(opencl_flags, id);
        tracing::debug!(flags = format_args!("{opencl_flags:#06x}"), "created sampler");
        Ok(id)
    }
}
