use super::*;

const FILL_WITH_SAMPLER: &str = "sampler,19,descriptorSet,0,binding,0\n\
    kernel,fill,argOrdinal,0,argKind,pod_ubo,descriptorSet,1,binding,0,offset,0";

#[test]
fn parses_sampler_and_kernel() {
    let map = AbiMap::parse(FILL_WITH_SAMPLER).unwrap();

    assert_eq!(map.samplers.len(), 1);
    assert_eq!(map.samplers[0].opencl_flags, 19);
    assert_eq!(map.samplers[0].descriptor_set, 0);
    assert_eq!(map.samplers[0].binding, 0);
    assert_eq!(map.samplers_desc_set, 0);

    assert_eq!(map.kernels.len(), 1);
    let kernel = &map.kernels[0];
    assert_eq!(kernel.name, "fill");
    assert_eq!(kernel.descriptor_set, 1);
    assert_eq!(kernel.args.len(), 1);
    let arg = &kernel.args[0];
    assert_eq!(arg.ordinal, 0);
    assert_eq!(arg.kind, ArgKind::PodUniform);
    assert_eq!(arg.descriptor_set, 1);
    assert_eq!(arg.binding, 0);
    assert_eq!(arg.offset, 0);
}

#[test]
fn crlf_and_cr_line_endings_are_tolerated() {
    let lf = AbiMap::parse(FILL_WITH_SAMPLER).unwrap();
    let crlf = AbiMap::parse(&FILL_WITH_SAMPLER.replace('\n', "\r\n")).unwrap();
    let cr = AbiMap::parse(&FILL_WITH_SAMPLER.replace('\n', "\r")).unwrap();
    assert_eq!(lf, crlf);
    assert_eq!(lf, cr);
}

#[test]
fn argument_lines_merge_in_any_order() {
    let forward = "kernel,copy,argOrdinal,0,argKind,buffer,descriptorSet,0,binding,0,offset,0\n\
        kernel,copy,argOrdinal,1,argKind,buffer,descriptorSet,0,binding,1,offset,0\n\
        kernel,copy,argOrdinal,2,argKind,pod,descriptorSet,0,binding,2,offset,0\n";
    let shuffled = "kernel,copy,argOrdinal,2,argKind,pod,descriptorSet,0,binding,2,offset,0\n\
        kernel,copy,argOrdinal,0,argKind,buffer,descriptorSet,0,binding,0,offset,0\n\
        kernel,copy,argOrdinal,1,argKind,buffer,descriptorSet,0,binding,1,offset,0\n";

    assert_eq!(
        AbiMap::parse(forward).unwrap(),
        AbiMap::parse(shuffled).unwrap()
    );
}

#[test]
fn ordinals_are_dense_and_positional() {
    let text = "kernel,k,argOrdinal,1,argKind,pod,descriptorSet,0,binding,1,offset,0\n\
        kernel,k,argOrdinal,0,argKind,buffer,descriptorSet,0,binding,0,offset,0\n";
    let map = AbiMap::parse(text).unwrap();
    let kernel = map.find_kernel("k").unwrap();

    assert_eq!(kernel.args.len(), 2);
    for (position, arg) in kernel.args.iter().enumerate() {
        assert_eq!(arg.ordinal as usize, position);
        assert_ne!(arg.kind, ArgKind::Unknown);
    }
}

#[test]
fn round_trip_reproduces_descriptor() {
    let text = "sampler,19,descriptorSet,0,binding,0\n\
        sampler,21,descriptorSet,0,binding,1\n\
        kernel,resample,argOrdinal,0,argKind,ro_image,descriptorSet,1,binding,0,offset,0\n\
        kernel,resample,argOrdinal,1,argKind,wo_image,descriptorSet,1,binding,1,offset,0\n\
        kernel,resample,argOrdinal,2,argKind,local,arrayNumElemSpecId,3\n";
    let first = AbiMap::parse(text).unwrap();
    let second = AbiMap::parse(&first.to_text()).unwrap();
    assert_eq!(first, second);
}

#[test]
fn quoted_kernel_name_round_trips() {
    let text = "kernel,\"odd,name\",argOrdinal,0,argKind,buffer,descriptorSet,0,binding,0,offset,0";
    let map = AbiMap::parse(text).unwrap();
    assert!(map.find_kernel("odd,name").is_some());

    let reparsed = AbiMap::parse(&map.to_text()).unwrap();
    assert_eq!(map, reparsed);
}

#[test]
fn two_kernels_parse_independently() {
    let text = "kernel,a,argOrdinal,0,argKind,buffer,descriptorSet,0,binding,0,offset,0\n\
        kernel,b,argOrdinal,0,argKind,pod_ubo,descriptorSet,0,binding,0,offset,0\n";
    let map = AbiMap::parse(text).unwrap();
    assert_eq!(map.kernels.len(), 2);
    assert_eq!(map.find_kernel("a").unwrap().args[0].kind, ArgKind::Buffer);
    assert_eq!(
        map.find_kernel("b").unwrap().args[0].kind,
        ArgKind::PodUniform
    );
}

#[test]
fn unknown_keys_are_ignored() {
    let text = "kernel,k,argOrdinal,0,argKind,buffer,descriptorSet,0,binding,0,offset,0,arrayElemSize,4,futureKey,whatever";
    let map = AbiMap::parse(text).unwrap();
    assert_eq!(map.find_kernel("k").unwrap().args.len(), 1);
}

#[test]
fn unknown_arg_kind_is_collected_not_fatal() {
    let text = "kernel,k,argOrdinal,0,argKind,bogus,descriptorSet,0,binding,0,offset,0\n\
        kernel,k,argOrdinal,1,argKind,buffer,descriptorSet,9,binding,1,offset,0\n";
    let err = AbiMap::parse(text).unwrap_err();
    match err {
        Error::Validation(violations) => {
            assert!(violations.contains(&"kernel argument kind unknown".to_string()));
            // The descriptor-set mismatch in the same document is reported
            // alongside, not truncated away.
            assert!(violations.contains(&"kernel arg descriptor_sets don't match".to_string()));
        }
        other => panic!("expected Validation, got {other:?}"),
    }
}

#[test]
fn ordinal_gap_reports_placeholder_violations() {
    let text = "kernel,k,argOrdinal,2,argKind,buffer,descriptorSet,0,binding,2,offset,0";
    let err = AbiMap::parse(text).unwrap_err();
    match err {
        Error::Validation(violations) => {
            // Ordinals 0 and 1 are Unknown placeholders; each reports its
            // full set of missing fields.
            let unknown = violations
                .iter()
                .filter(|v| *v == "kernel argument kind unknown")
                .count();
            assert_eq!(unknown, 2);
            assert!(violations.contains(&"kernel argument missing ordinal".to_string()));
        }
        other => panic!("expected Validation, got {other:?}"),
    }
}

#[test]
fn local_arg_requires_spec_constant() {
    let text = "kernel,k,argOrdinal,0,argKind,local";
    let err = AbiMap::parse(text).unwrap_err();
    match err {
        Error::Validation(violations) => {
            assert_eq!(
                violations,
                vec!["kernel argument missing spec constant".to_string()]
            );
        }
        other => panic!("expected Validation, got {other:?}"),
    }
}

#[test]
fn sampler_descriptor_set_other_than_zero_is_rejected() {
    // The layout builder places the sampler set first; a descriptor
    // claiming another set number must fail at parse, not at kernel
    // creation.
    let text = "sampler,19,descriptorSet,2,binding,0\n\
        kernel,k,argOrdinal,0,argKind,buffer,descriptorSet,1,binding,0,offset,0\n";
    let err = AbiMap::parse(text).unwrap_err();
    match err {
        Error::Validation(violations) => {
            assert!(violations.contains(&"sampler descriptor_sets must be 0".to_string()));
        }
        other => panic!("expected Validation, got {other:?}"),
    }
}

#[test]
fn huge_ordinal_is_rejected_without_allocating() {
    let text = format!(
        "kernel,k,argOrdinal,{},argKind,buffer,descriptorSet,0,binding,0,offset,0",
        i32::MAX
    );
    let err = AbiMap::parse(&text).unwrap_err();
    match err {
        Error::Validation(violations) => {
            assert!(violations.contains(&"kernel argument ordinal out of range".to_string()));
        }
        other => panic!("expected Validation, got {other:?}"),
    }
}

#[test]
fn sampler_descriptor_sets_must_match() {
    let text = "sampler,19,descriptorSet,0,binding,0\n\
        sampler,21,descriptorSet,1,binding,1\n";
    let err = AbiMap::parse(text).unwrap_err();
    match err {
        Error::Validation(violations) => {
            assert!(violations.contains(&"sampler descriptor_sets don't match".to_string()));
        }
        other => panic!("expected Validation, got {other:?}"),
    }
}

#[test]
fn malformed_integer_is_format_error() {
    let text = "kernel,k,argOrdinal,xyz,argKind,buffer";
    assert!(matches!(
        AbiMap::parse(text),
        Err(Error::Format(_))
    ));
}

#[test]
fn blank_lines_and_unknown_tags_are_skipped() {
    let text = "\n\nnote,this line is not recognized\n\
        kernel,k,argOrdinal,0,argKind,buffer,descriptorSet,0,binding,0,offset,0\n\n";
    let map = AbiMap::parse(text).unwrap();
    assert_eq!(map.kernels.len(), 1);
    assert_eq!(map.samplers_desc_set, -1);
}
