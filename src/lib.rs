//! Host runtime for dispatching clspv-compiled OpenCL C kernels.
//!
//! A [`Module`] pairs a SPIR-V binary with its `.spvmap` ABI descriptor,
//! the text file clspv emits describing every kernel's arguments and every
//! literal sampler. Loading a module realizes the GPU-side objects; a
//! [`Kernel`] is one entry point specialized to a workgroup size; an
//! [`Invocation`] binds one dispatch's arguments in ordinal order and runs
//! it synchronously, returning per-phase timing.
//!
//! ```no_run
//! use clspv_runner::{Device, Module, WgpuDevice};
//!
//! # fn run(buffer: clspv_runner::backend::BufferId) -> Result<(), clspv_runner::Error> {
//! let device = Device::new(WgpuDevice::try_new().map_err(clspv_runner::Error::from)?);
//! let mut module = Module::from_files("kernels/fill")?;
//! module.load(&device)?;
//!
//! let mut kernel = module.create_kernel("fill", [32, 1, 1])?;
//! let mut invocation = kernel.create_invocation();
//! invocation.bind_storage_buffer(buffer)?;
//! let timing = invocation.run([64, 1, 1])?;
//! println!("execution: {:?}", timing.timestamps.execution());
//! # Ok(())
//! # }
//! ```

pub mod abi;
pub mod backend;
pub mod device;
pub mod error;
pub mod invocation;
pub mod kernel;
pub mod layout;
pub mod module;
pub mod sampler;

pub use backend::{ComputeDevice, DeviceError, TraceDevice, WgpuDevice};
pub use device::Device;
pub use error::Error;
pub use invocation::{ExecutionTime, Invocation, Timestamps};
pub use kernel::Kernel;
pub use module::Module;
