//! Structural validation of a parsed ABI descriptor.
//!
//! Every check runs; violations accumulate into one batch so a bad
//! descriptor reports all of its problems at once rather than the first.

use super::{AbiMap, ArgKind, ArgSpec, KernelSpec, SamplerSpec};

pub(super) fn validate(map: &AbiMap) -> Vec<String> {
    let mut result = Vec::new();

    for kernel in &map.kernels {
        validate_kernel(kernel, &mut result);
    }

    let sampler_ds = map
        .samplers
        .first()
        .map_or(-1, |s| s.descriptor_set);
    // Literal samplers always occupy set 0; the layout builder relies on
    // it. A missing set is reported separately by validate_sampler.
    if sampler_ds > 0 {
        result.push("sampler descriptor_sets must be 0".to_string());
    }
    for sampler in &map.samplers {
        validate_sampler(sampler, &mut result);
        if sampler.descriptor_set != sampler_ds {
            result.push("sampler descriptor_sets don't match".to_string());
        }
    }

    result
}

fn validate_kernel(kernel: &KernelSpec, out: &mut Vec<String>) {
    if kernel.name.is_empty() {
        out.push("kernel has no name".to_string());
    }

    // Every non-local argument must live in the kernel's one descriptor
    // set, recorded when the kernel was first merged.
    let arg_ds = kernel.descriptor_set;
    for arg in &kernel.args {
        validate_arg(arg, out);

        if arg.kind != ArgKind::LocalArray && arg.descriptor_set != arg_ds {
            out.push("kernel arg descriptor_sets don't match".to_string());
        }
    }
}

fn validate_arg(arg: &ArgSpec, out: &mut Vec<String>) {
    if arg.kind == ArgKind::Unknown {
        out.push("kernel argument kind unknown".to_string());
    }
    if arg.ordinal < 0 {
        out.push("kernel argument missing ordinal".to_string());
    } else if arg.ordinal > super::MAX_ARG_ORDINAL {
        out.push("kernel argument ordinal out of range".to_string());
    }

    if arg.kind == ArgKind::LocalArray {
        if arg.spec_constant < 0 {
            out.push("kernel argument missing spec constant".to_string());
        }
    } else {
        if arg.descriptor_set < 0 {
            out.push("kernel argument missing descriptorSet".to_string());
        }
        if arg.binding < 0 {
            out.push("kernel argument missing binding".to_string());
        }
        if arg.offset < 0 {
            out.push("kernel argument missing offset".to_string());
        }
    }
}

fn validate_sampler(sampler: &SamplerSpec, out: &mut Vec<String>) {
    if sampler.opencl_flags == 0 {
        out.push("sampler missing OpenCL flags".to_string());
    }
    if sampler.descriptor_set < 0 {
        out.push("sampler missing descriptorSet".to_string());
    }
    if sampler.binding < 0 {
        out.push("sampler missing binding".to_string());
    }
}
