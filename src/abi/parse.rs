//! Line-level parsing of ABI descriptor text into an unvalidated `AbiMap`.
//!
//! Each `kernel` line fully describes one argument; arguments merge into the
//! named kernel's ordinal-indexed list, growing it and filling skipped
//! ordinals with `Unknown` placeholders for the validator to flag.
//! Unrecognized keys are ignored for forward compatibility.

use super::reader::{split_lines, FieldReader};
use super::{AbiMap, ArgKind, ArgSpec, KernelSpec, SamplerSpec};
use crate::error::Error;

pub(super) fn parse_text(text: &str) -> Result<AbiMap, Error> {
    let mut map = AbiMap {
        kernels: Vec::new(),
        samplers: Vec::new(),
        samplers_desc_set: -1,
    };

    for line in split_lines(text) {
        let mut rd = FieldReader::new(line);
        let Some((tag, tag_value)) = rd.next_pair() else {
            continue;
        };

        match tag {
            "sampler" => {
                let sampler = parse_sampler_line(tag_value, &mut rd)?;

                // All of a module's literal samplers share one descriptor
                // set, recorded from the first of them.
                if map.samplers_desc_set == -1 {
                    map.samplers_desc_set = sampler.descriptor_set;
                }
                map.samplers.push(sampler);
            }
            "kernel" => {
                let arg = parse_kernel_arg_line(&mut rd)?;
                merge_kernel_arg(&mut map, tag_value, arg);
            }
            // Unknown tags (and blank lines) are skipped.
            _ => {}
        }
    }

    Ok(map)
}

/// `sampler,<flags>,...` — the flag bitfield rides on the tag itself.
fn parse_sampler_line(flags: &str, rd: &mut FieldReader) -> Result<SamplerSpec, Error> {
    let mut result = SamplerSpec {
        opencl_flags: parse_int(flags, "sampler flags")? as u32,
        ..SamplerSpec::default()
    };

    while let Some((key, value)) = rd.next_pair() {
        match key {
            "descriptorSet" => result.descriptor_set = parse_int(value, key)?,
            "binding" => result.binding = parse_int(value, key)?,
            _ => {}
        }
    }

    Ok(result)
}

/// `kernel,<name>,...` — one argument description.
fn parse_kernel_arg_line(rd: &mut FieldReader) -> Result<ArgSpec, Error> {
    let mut result = ArgSpec::default();

    while let Some((key, value)) = rd.next_pair() {
        match key {
            "argOrdinal" => result.ordinal = parse_int(value, key)?,
            "descriptorSet" => result.descriptor_set = parse_int(value, key)?,
            "binding" => result.binding = parse_int(value, key)?,
            "offset" => result.offset = parse_int(value, key)?,
            "argKind" => result.kind = ArgKind::from_text(value),
            "arrayNumElemSpecId" => result.spec_constant = parse_int(value, key)?,
            // arrayElemSize and any future keys are ignored.
            _ => {}
        }
    }

    Ok(result)
}

/// Place an argument into its kernel's dense, ordinal-indexed list,
/// creating the kernel on first sight and padding gaps with placeholders.
fn merge_kernel_arg(map: &mut AbiMap, kernel_name: &str, arg: ArgSpec) {
    let index = match map.kernels.iter().position(|k| k.name == kernel_name) {
        Some(i) => i,
        None => {
            map.kernels.push(KernelSpec {
                name: kernel_name.to_string(),
                ..KernelSpec::default()
            });
            map.kernels.len() - 1
        }
    };
    let kernel = &mut map.kernels[index];

    if kernel.descriptor_set == -1 && arg.descriptor_set != -1 {
        kernel.descriptor_set = arg.descriptor_set;
    }

    if arg.ordinal < 0 || arg.ordinal > super::MAX_ARG_ORDINAL {
        // No usable slot; append so the validator reports the bad ordinal
        // instead of losing the argument. The upper bound also keeps the
        // list from being resized to an attacker-chosen length.
        kernel.args.push(arg);
        return;
    }

    let ordinal = arg.ordinal as usize;
    if kernel.args.len() <= ordinal {
        kernel.args.resize_with(ordinal + 1, ArgSpec::default);
    }
    kernel.args[ordinal] = arg;
}

fn parse_int(value: &str, key: &str) -> Result<i32, Error> {
    value
        .trim()
        .parse::<i32>()
        .map_err(|_| Error::Format(format!("field '{key}' is not an integer: '{value}'")))
}
