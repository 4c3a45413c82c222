use std::borrow::Cow;

use super::{BufferDesc, PixelBuffer};

/// Aligns a value to 4-byte boundary.
pub(crate) fn align_stride(n: usize) -> usize {
    (n + 3) & !3
}

/// Adds stride padding to tightly packed sample rows.
pub(crate) fn add_stride_padding(
    src: Vec<u8>,
    row_bytes: usize,
    height: usize,
    stride: usize,
) -> Vec<u8> {
    if row_bytes == stride {
        return src;
    }

    let mut padded = vec![0; stride * height];
    for y in 0..height {
        padded[y * stride..y * stride + row_bytes]
            .copy_from_slice(&src[y * row_bytes..y * row_bytes + row_bytes]);
    }
    padded
}

/// Copies each row out of a padded buffer into tightly packed storage.
pub(crate) fn strip_stride_padding(
    src: &[u8],
    row_bytes: usize,
    height: usize,
    stride: usize,
) -> Vec<u8> {
    let mut packed = Vec::with_capacity(row_bytes * height);
    for y in 0..height {
        packed.extend_from_slice(&src[y * stride..y * stride + row_bytes]);
    }
    packed
}

/// Tightly packed view of a host buffer, ready to be copied to a device.
///
/// Borrows the source storage when it is already contiguous.
#[derive(Debug)]
pub struct TightBuffer<'a> {
    desc: BufferDesc,
    bytes: Cow<'a, [u8]>,
}

impl TightBuffer<'_> {
    /// Descriptor of the packed data; `stride == row_bytes()`.
    pub fn desc(&self) -> &BufferDesc {
        &self.desc
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Returns true when no copy was made.
    pub fn is_borrowed(&self) -> bool {
        matches!(self.bytes, Cow::Borrowed(_))
    }
}

/// Reconciles an arbitrary-stride host buffer into a tightly packed one.
///
/// Contiguous storage is returned as a view; padded storage is copied row by
/// row using the source stride as the row pitch. Empty buffers must be
/// rejected by the caller before getting here.
pub fn to_tight_buffer(image: &PixelBuffer) -> TightBuffer<'_> {
    let desc = *image.desc();
    debug_assert!(!desc.is_empty(), "empty buffers are rejected at decode");

    let row_bytes = desc.row_bytes();
    let height = desc.height as usize;

    // A single row is contiguous whatever its stride.
    let bytes = if desc.is_tight() || height == 1 {
        Cow::Borrowed(&image.bytes()[..row_bytes * height])
    } else {
        Cow::Owned(strip_stride_padding(
            image.bytes(),
            row_bytes,
            height,
            desc.stride,
        ))
    };

    tracing::debug!(
        "Reconciled {} to stride {} ({})",
        desc,
        row_bytes,
        if matches!(bytes, Cow::Borrowed(_)) {
            "view"
        } else {
            "copy"
        }
    );

    TightBuffer {
        desc: desc.tight(),
        bytes,
    }
}
