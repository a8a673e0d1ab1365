//! The clspv ABI descriptor: how a kernel's named, ordinal OpenCL arguments
//! map onto numbered descriptor sets, bindings, and specialization
//! constants.
//!
//! The descriptor arrives as line-oriented text (one tag plus key=value
//! fields per line, values optionally quoted). `AbiMap::parse` tokenizes,
//! merges, and validates it in one pass; the result is immutable and owned
//! by the module that loaded it.
//!
//! Missing numeric fields are held as `-1` sentinels until validation, which
//! collects every violation in the document before failing.

mod parse;
mod reader;
mod validate;

#[cfg(test)]
mod tests;

use crate::error::Error;

/// Upper bound on argument ordinals. Far above anything clspv emits; its
/// real job is to keep a hostile one-line descriptor from demanding an
/// ordinal-sized allocation.
pub(crate) const MAX_ARG_ORDINAL: i32 = 4096;

// ─── Data Types ────────────────────────────────────────────────────

/// Closed set of kernel-argument kinds clspv emits.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum ArgKind {
    /// Plain-old-data value passed through a storage buffer.
    PodValue,
    /// Plain-old-data value passed through a uniform buffer.
    PodUniform,
    Buffer,
    ReadOnlyImage,
    WriteOnlyImage,
    Sampler,
    /// Local-memory array sized by a specialization constant.
    LocalArray,
    /// Placeholder for unparsed or unrecognized kinds; rejected by
    /// validation.
    #[default]
    Unknown,
}

impl ArgKind {
    /// Map an `argKind` field value. Unrecognized text becomes `Unknown`
    /// so validation can report it alongside every other violation.
    pub fn from_text(text: &str) -> ArgKind {
        match text {
            "pod" => ArgKind::PodValue,
            "pod_ubo" => ArgKind::PodUniform,
            "buffer" => ArgKind::Buffer,
            "ro_image" => ArgKind::ReadOnlyImage,
            "wo_image" => ArgKind::WriteOnlyImage,
            "sampler" => ArgKind::Sampler,
            "local" => ArgKind::LocalArray,
            _ => ArgKind::Unknown,
        }
    }

    pub fn text(&self) -> &'static str {
        match self {
            ArgKind::PodValue => "pod",
            ArgKind::PodUniform => "pod_ubo",
            ArgKind::Buffer => "buffer",
            ArgKind::ReadOnlyImage => "ro_image",
            ArgKind::WriteOnlyImage => "wo_image",
            ArgKind::Sampler => "sampler",
            ArgKind::LocalArray => "local",
            ArgKind::Unknown => "unknown",
        }
    }
}

/// One kernel argument. Fields default to `-1` meaning "not seen in the
/// descriptor text"; validation guarantees the fields each kind requires
/// are non-negative.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ArgSpec {
    /// Dense index of the argument within its kernel.
    pub ordinal: i32,
    pub kind: ArgKind,
    pub descriptor_set: i32,
    pub binding: i32,
    /// Byte offset for POD packing. Only offset-0 arguments occupy a
    /// descriptor binding of their own.
    pub offset: i32,
    /// Specialization-constant id; meaningful only for `LocalArray`.
    pub spec_constant: i32,
}

impl Default for ArgSpec {
    fn default() -> Self {
        ArgSpec {
            ordinal: -1,
            kind: ArgKind::Unknown,
            descriptor_set: -1,
            binding: -1,
            offset: -1,
            spec_constant: -1,
        }
    }
}

/// One kernel entry point: name plus its ordinal-ordered argument list.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct KernelSpec {
    pub name: String,
    /// Descriptor set shared by every non-local argument of this kernel;
    /// -1 until the first argument carrying one is merged.
    pub descriptor_set: i32,
    pub args: Vec<ArgSpec>,
}

impl Default for KernelSpec {
    fn default() -> Self {
        KernelSpec {
            name: String::new(),
            descriptor_set: -1,
            args: Vec::new(),
        }
    }
}

/// One literal sampler declared by the module.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SamplerSpec {
    /// Raw OpenCL sampler flag bitfield.
    pub opencl_flags: u32,
    pub descriptor_set: i32,
    pub binding: i32,
}

impl Default for SamplerSpec {
    fn default() -> Self {
        SamplerSpec {
            opencl_flags: 0,
            descriptor_set: -1,
            binding: -1,
        }
    }
}

/// A parsed, validated ABI descriptor. Immutable once constructed.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AbiMap {
    pub kernels: Vec<KernelSpec>,
    pub samplers: Vec<SamplerSpec>,
    /// Descriptor set shared by all literal samplers; -1 if the module has
    /// none. Always 0 when present.
    pub samplers_desc_set: i32,
}

impl AbiMap {
    /// Parse and validate an ABI descriptor text buffer.
    ///
    /// Any line-ending convention is tolerated. Structural violations are
    /// collected across the whole document and returned as a single
    /// [`Error::Validation`] batch; malformed numeric fields fail earlier
    /// with [`Error::Format`].
    pub fn parse(text: &str) -> Result<AbiMap, Error> {
        let map = parse::parse_text(text)?;

        let violations = validate::validate(&map);
        if !violations.is_empty() {
            return Err(Error::Validation(violations));
        }

        tracing::debug!(
            kernels = map.kernels.len(),
            samplers = map.samplers.len(),
            "parsed ABI descriptor"
        );
        Ok(map)
    }

    pub fn find_kernel(&self, name: &str) -> Option<&KernelSpec> {
        self.kernels.iter().find(|k| k.name == name)
    }

    /// Serialize back to descriptor text. `parse(to_text(m))` reproduces
    /// `m` field for field.
    pub fn to_text(&self) -> String {
        let mut out = String::new();

        for s in &self.samplers {
            out.push_str(&format!(
                "sampler,{},descriptorSet,{},binding,{}\n",
                s.opencl_flags, s.descriptor_set, s.binding
            ));
        }

        for k in &self.kernels {
            for a in &k.args {
                out.push_str(&format!(
                    "kernel,{},argOrdinal,{},argKind,{}",
                    quote_field(&k.name),
                    a.ordinal,
                    a.kind.text()
                ));
                if a.kind == ArgKind::LocalArray {
                    out.push_str(&format!(",arrayNumElemSpecId,{}", a.spec_constant));
                } else {
                    out.push_str(&format!(
                        ",descriptorSet,{},binding,{},offset,{}",
                        a.descriptor_set, a.binding, a.offset
                    ));
                }
                out.push('\n');
            }
        }

        out
    }
}

/// Quote a field value when it would collide with the separator.
fn quote_field(value: &str) -> String {
    if value.contains(',') {
        format!("\"{value}\"")
    } else {
        value.to_string()
    }
}
