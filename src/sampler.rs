//! OpenCL sampler flag translation.
//!
//! clspv encodes each literal sampler as the raw OpenCL bitfield:
//! normalized-coordinates bit, a 3-bit addressing sub-field, and a filter
//! sub-field. The target API expresses the same thing as filter mode,
//! address mode, and an unnormalized-coordinates flag — but cannot express
//! every combination, so translation can fail.

use crate::backend::{AddressMode, FilterMode, SamplerParams};
use crate::error::Error;

// OpenCL sampler flag bitfield layout.
pub const CLK_NORMALIZED_COORDS_FALSE: u32 = 0x0000;
pub const CLK_NORMALIZED_COORDS_TRUE: u32 = 0x0001;
pub const CLK_NORMALIZED_COORDS_MASK: u32 = 0x0001;

pub const CLK_ADDRESS_NONE: u32 = 0x0000;
pub const CLK_ADDRESS_CLAMP_TO_EDGE: u32 = 0x0002;
pub const CLK_ADDRESS_CLAMP: u32 = 0x0004;
pub const CLK_ADDRESS_REPEAT: u32 = 0x0006;
pub const CLK_ADDRESS_MIRRORED_REPEAT: u32 = 0x0008;
pub const CLK_ADDRESS_MASK: u32 = 0x000E;

pub const CLK_FILTER_NEAREST: u32 = 0x0010;
pub const CLK_FILTER_LINEAR: u32 = 0x0020;
pub const CLK_FILTER_MASK: u32 = 0x0030;

/// Address mode for the flag's addressing sub-field, applied uniformly to
/// all three axes. Unrecognized values fall back to clamp-to-edge.
fn address_mode(flags: u32) -> AddressMode {
    match flags & CLK_ADDRESS_MASK {
        CLK_ADDRESS_NONE | CLK_ADDRESS_CLAMP_TO_EDGE => AddressMode::ClampToEdge,
        CLK_ADDRESS_CLAMP => AddressMode::ClampToBorder,
        CLK_ADDRESS_REPEAT => AddressMode::Repeat,
        CLK_ADDRESS_MIRRORED_REPEAT => AddressMode::MirroredRepeat,
        _ => AddressMode::ClampToEdge,
    }
}

/// Translate an OpenCL sampler flag bitfield into native sampler
/// parameters.
///
/// Unnormalized coordinates are only representable with clamp-to-edge or
/// clamp-to-border addressing; any other combination is
/// [`Error::UnsupportedSampler`]. Mipmap mode is always nearest.
pub fn translate(flags: u32) -> Result<SamplerParams, Error> {
    let filter = if flags & CLK_FILTER_MASK == CLK_FILTER_LINEAR {
        FilterMode::Linear
    } else {
        FilterMode::Nearest
    };

    let unnormalized = flags & CLK_NORMALIZED_COORDS_MASK == CLK_NORMALIZED_COORDS_FALSE;
    let address_mode = address_mode(flags);

    if unnormalized
        && address_mode != AddressMode::ClampToEdge
        && address_mode != AddressMode::ClampToBorder
    {
        return Err(Error::UnsupportedSampler(flags));
    }

    Ok(SamplerParams {
        filter,
        address_mode,
        unnormalized_coordinates: unnormalized,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn translation_is_deterministic() {
        let flags = CLK_NORMALIZED_COORDS_TRUE | CLK_ADDRESS_CLAMP_TO_EDGE | CLK_FILTER_NEAREST;
        assert_eq!(translate(flags).unwrap(), translate(flags).unwrap());
    }

    #[test]
    fn flags_19_is_nearest_clamp_to_edge_normalized() {
        // The common clspv default: 19 = normalized | clamp_to_edge | nearest.
        let params = translate(19).unwrap();
        assert_eq!(params.filter, FilterMode::Nearest);
        assert_eq!(params.address_mode, AddressMode::ClampToEdge);
        assert!(!params.unnormalized_coordinates);
    }

    #[test]
    fn linear_filter_bit() {
        let params =
            translate(CLK_NORMALIZED_COORDS_TRUE | CLK_ADDRESS_REPEAT | CLK_FILTER_LINEAR).unwrap();
        assert_eq!(params.filter, FilterMode::Linear);
        assert_eq!(params.address_mode, AddressMode::Repeat);
    }

    #[test]
    fn address_sub_field_mapping() {
        let normalized = CLK_NORMALIZED_COORDS_TRUE | CLK_FILTER_NEAREST;
        let cases = [
            (CLK_ADDRESS_NONE, AddressMode::ClampToEdge),
            (CLK_ADDRESS_CLAMP_TO_EDGE, AddressMode::ClampToEdge),
            (CLK_ADDRESS_CLAMP, AddressMode::ClampToBorder),
            (CLK_ADDRESS_REPEAT, AddressMode::Repeat),
            (CLK_ADDRESS_MIRRORED_REPEAT, AddressMode::MirroredRepeat),
            // Unrecognized addressing value defaults to clamp-to-edge.
            (0x000A, AddressMode::ClampToEdge),
        ];
        for (bits, expected) in cases {
            assert_eq!(translate(normalized | bits).unwrap().address_mode, expected);
        }
    }

    #[test]
    fn unnormalized_with_wrapping_modes_is_unsupported() {
        for filter in [CLK_FILTER_NEAREST, CLK_FILTER_LINEAR] {
            for address in [CLK_ADDRESS_REPEAT, CLK_ADDRESS_MIRRORED_REPEAT] {
                let flags = CLK_NORMALIZED_COORDS_FALSE | address | filter;
                assert!(
                    matches!(translate(flags), Err(Error::UnsupportedSampler(f)) if f == flags),
                    "flags {flags:#06x} should be unsupported"
                );
            }
        }
    }

    #[test]
    fn unnormalized_with_clamping_modes_is_supported() {
        for address in [CLK_ADDRESS_NONE, CLK_ADDRESS_CLAMP_TO_EDGE, CLK_ADDRESS_CLAMP] {
            let flags = CLK_NORMALIZED_COORDS_FALSE | address | CLK_FILTER_NEAREST;
            let params = translate(flags).unwrap();
            assert!(params.unnormalized_coordinates);
        }
    }
}
