//! A loadable shader module: validated ABI descriptor, SPIR-V binary, and
//! the literal samplers the ABI declares.

use std::path::Path;

use crate::abi::AbiMap;
use crate::backend::{SamplerId, ShaderId};
use crate::device::Device;
use crate::error::Error;
use crate::kernel::Kernel;

/// One compiled OpenCL translation unit: the ABI descriptor plus the
/// SPIR-V it describes.
///
/// Construction parses and validates the ABI; `load` realizes the GPU-side
/// objects (shader module, literal samplers) and may run at most once.
pub struct Module {
    name: String,
    abi: AbiMap,
    spirv: Vec<u32>,
    loaded: Option<Loaded>,
}

struct Loaded {
    device: Device,
    shader: ShaderId,
    /// One realized sampler per ABI sampler, in declaration order.
    literal_samplers: Vec<SamplerId>,
}

impl std::fmt::Debug for Module {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Module")
            .field("name", &self.name)
            .field("abi", &self.abi)
            .field("spirv_words", &self.spirv.len())
            .field("loaded", &self.loaded.is_some())
            .finish()
    }
}

impl Module {
    /// Build a module from an ABI descriptor text and a SPIR-V binary.
    ///
    /// The binary's byte length must be a multiple of the 4-byte SPIR-V
    /// word size; anything else is [`Error::Format`].
    pub fn from_parts(
        name: impl Into<String>,
        abi_text: &str,
        spirv_bytes: &[u8],
    ) -> Result<Module, Error> {
        let name = name.into();
        let abi = AbiMap::parse(abi_text)?;
        let spirv = words_from_bytes(&name, spirv_bytes)?;

        Ok(Module {
            name,
            abi,
            spirv,
            loaded: None,
        })
    }

    /// Build a module from `<base>.spvmap` and `<base>.spv` on disk. The
    /// module takes its name from the file stem.
    pub fn from_files(base: impl AsRef<Path>) -> Result<Module, Error> {
        let base = base.as_ref();
        let name = base
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();

        let abi_text = std::fs::read_to_string(base.with_extension("spvmap"))
            .map_err(|e| Error::Format(format!("cannot read '{}.spvmap': {e}", base.display())))?;
        let spirv_bytes = std::fs::read(base.with_extension("spv"))
            .map_err(|e| Error::Format(format!("cannot read '{}.spv': {e}", base.display())))?;

        Module::from_parts(name, &abi_text, &spirv_bytes)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn abi(&self) -> &AbiMap {
        &self.abi
    }

    pub fn is_loaded(&self) -> bool {
        self.loaded.is_some()
    }

    /// Realize the module on a device: create the shader module and
    /// resolve every literal sampler through the device cache.
    ///
    /// Fails with [`Error::AlreadyLoaded`] on a second call.
    pub fn load(&mut self, device: &Device) -> Result<(), Error> {
        if self.loaded.is_some() {
            return Err(Error::AlreadyLoaded(self.name.clone()));
        }

        let shader = device.backend().create_shader(&self.spirv, &self.name)?;

        let mut literal_samplers = Vec::with_capacity(self.abi.samplers.len());
        for sampler in &self.abi.samplers {
            literal_samplers.push(device.cached_sampler(sampler.opencl_flags)?);
        }

        tracing::info!(
            module = %self.name,
            entry_points = self.abi.kernels.len(),
            samplers = literal_samplers.len(),
            "module loaded"
        );

        self.loaded = Some(Loaded {
            device: device.clone(),
            shader,
            literal_samplers,
        });
        Ok(())
    }

    /// Names of the kernels this module exposes, in ABI order.
    pub fn entry_points(&self) -> Vec<String> {
        self.abi.kernels.iter().map(|k| k.name.clone()).collect()
    }

    /// Build a kernel for one entry point, specialized to the given
    /// workgroup size (three positive integers).
    pub fn create_kernel(
        &self,
        entry_point: &str,
        workgroup_size: [u32; 3],
    ) -> Result<Kernel, Error> {
        let loaded = self
            .loaded
            .as_ref()
            .ok_or_else(|| Error::NotLoaded(self.name.clone()))?;

        // Rejected before any backend work; no dispatch is involved yet.
        if workgroup_size.contains(&0) {
            return Err(Error::Format(format!(
                "workgroup size must be positive, got {workgroup_size:?}"
            )));
        }

        let layout = crate::layout::build(
            &loaded.device,
            &self.abi,
            &loaded.literal_samplers,
            entry_point,
        )?;

        // find_kernel succeeded inside layout::build.
        let spec = match self.abi.find_kernel(entry_point) {
            Some(spec) => spec.clone(),
            None => return Err(Error::EntryPointNotFound(entry_point.to_string())),
        };

        Kernel::new(
            loaded.device.clone(),
            layout,
            loaded.shader,
            spec,
            workgroup_size,
        )
    }
}

/// Reinterpret a little-endian byte blob as SPIR-V words.
fn words_from_bytes(name: &str, bytes: &[u8]) -> Result<Vec<u32>, Error> {
    if bytes.len() % 4 != 0 {
        return Err(Error::Format(format!(
            "shader binary for '{name}' is {} bytes, not a multiple of the word size",
            bytes.len()
        )));
    }

    Ok(bytes
        .chunks_exact(4)
        .map(|w| u32::from_le_bytes([w[0], w[1], w[2], w[3]]))
        .collect())
}
