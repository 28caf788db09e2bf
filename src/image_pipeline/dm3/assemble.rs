use tracing::debug;

use crate::image_pipeline::common::error::{DmError, Result};
use crate::image_pipeline::dm3::fields::{to_u32, write_u32_be};
use crate::image_pipeline::dm3::patch::PatchedBuffer;
use crate::image_pipeline::dm3::template::{LENGTH_FIELD_BIAS, LENGTH_FIELD_OFFSET};

/// Joins the patched pieces into a finished file and fixes the header length
/// field, the only field that depends on the total size.
pub fn assemble(buffer: PatchedBuffer) -> Result<Vec<u8>> {
    let PatchedBuffer {
        prefix,
        payload,
        suffix,
    } = buffer;

    let mut result = prefix;
    result.reserve_exact(payload.len() + suffix.len());
    result.extend_from_slice(&payload);
    result.extend_from_slice(&suffix);

    let length = result.len().checked_sub(LENGTH_FIELD_BIAS).ok_or_else(|| {
        DmError::MalformedContainer(format!("{} bytes is shorter than a DM3 header", result.len()))
    })?;
    write_u32_be(&mut result, LENGTH_FIELD_OFFSET, to_u32(length)?);

    debug!(total_len = result.len(), length_field = length, "Assembled container");
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::image_pipeline::dm3::fields::read_u32_be;

    #[test]
    fn concatenates_and_sets_length() {
        let buffer = PatchedBuffer {
            prefix: vec![0xaa; 24],
            payload: vec![1, 2, 3],
            suffix: vec![0xbb; 5],
        };
        let bytes = assemble(buffer).unwrap();
        assert_eq!(bytes.len(), 32);
        assert_eq!(read_u32_be(&bytes, LENGTH_FIELD_OFFSET), Some(12));
        assert_eq!(&bytes[..4], &[0xaa; 4]);
        assert_eq!(&bytes[8..24], &[0xaa; 16]);
        assert_eq!(&bytes[24..27], &[1, 2, 3]);
        assert_eq!(&bytes[27..], &[0xbb; 5]);
    }

    #[test]
    fn too_short_for_header() {
        let buffer = PatchedBuffer {
            prefix: vec![0; 8],
            payload: vec![],
            suffix: vec![0; 4],
        };
        assert!(matches!(
            assemble(buffer),
            Err(DmError::MalformedContainer(_))
        ));
    }
}
