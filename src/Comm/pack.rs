use super::reduce::Datatype;
use crate::error::{Error, Result};

/// Bytes spanned by `count` elements of `datatype`.
pub(crate) fn byte_len(count: usize, datatype: Datatype) -> Result<usize> {
    count.checked_mul(datatype.size()).ok_or_else(|| {
        Error::InvalidArgument(format!(
            "{} elements of {:?} overflow the address space",
            count, datatype
        ))
    })
}

fn check_position(position: usize, len: usize) -> Result<()> {
    if position > len {
        return Err(Error::InvalidArgument(format!(
            "position {} is past the end of a {} byte buffer",
            position, len
        )));
    }
    Ok(())
}

/// Append `count` elements of `datatype` from `input` to `out` at `*position`.
///
/// On success `*position` is advanced past the packed bytes.
pub fn pack(input: &[u8], count: usize, datatype: Datatype, out: &mut [u8], position: &mut usize) -> Result<()> {
    let bytes = byte_len(count, datatype)?;
    check_position(*position, out.len())?;
    if input.len() < bytes {
        return Err(Error::InvalidArgument(format!(
            "input holds {} bytes, {} elements of {:?} need {}",
            input.len(),
            count,
            datatype,
            bytes
        )));
    }
    let available = out.len() - *position;
    if available < bytes {
        return Err(Error::BufferTooSmall {
            needed: bytes,
            available,
        });
    }

    out[*position..*position + bytes].copy_from_slice(&input[..bytes]);
    *position += bytes;
    Ok(())
}

/// Read `count` elements of `datatype` from `input` at `*position` into `out`.
pub fn unpack(input: &[u8], position: &mut usize, out: &mut [u8], count: usize, datatype: Datatype) -> Result<()> {
    let bytes = byte_len(count, datatype)?;
    check_position(*position, input.len())?;
    let remaining = input.len() - *position;
    if remaining < bytes {
        return Err(Error::BufferTooSmall {
            needed: bytes,
            available: remaining,
        });
    }
    if out.len() < bytes {
        return Err(Error::BufferTooSmall {
            needed: bytes,
            available: out.len(),
        });
    }

    out[..bytes].copy_from_slice(&input[*position..*position + bytes]);
    *position += bytes;
    Ok(())
}
