//! Reference implementation of the filter masks, used by the host backend.

use super::FilterOp;
use crate::image::SampleKind;

/// Clamps a neighbour coordinate into `0..len` (edge replication).
#[inline]
fn replicate(i: isize, len: usize) -> usize {
    i.clamp(0, len as isize - 1) as usize
}

/// Correlates `mask` with the 3x3 neighbourhood of (x, y).
#[inline]
pub(crate) fn response(
    mask: &[[i32; 3]; 3],
    src: &[u8],
    pitch: usize,
    width: usize,
    height: usize,
    x: usize,
    y: usize,
) -> i32 {
    let mut acc = 0i32;
    for (ky, mask_row) in mask.iter().enumerate() {
        let sy = replicate(y as isize + ky as isize - 1, height);
        let row = &src[sy * pitch..];
        for (kx, &weight) in mask_row.iter().enumerate() {
            if weight == 0 {
                continue;
            }
            let sx = replicate(x as isize + kx as isize - 1, width);
            acc += weight * row[sx] as i32;
        }
    }
    acc
}

/// Runs `op` over a `width x height` region of pitched 8-bit input, writing
/// pitched output of `op.output_kind()`.
pub(crate) fn apply(
    op: FilterOp,
    src: &[u8],
    src_pitch: usize,
    dst: &mut [u8],
    dst_pitch: usize,
    width: usize,
    height: usize,
) {
    let mask = op.mask();
    let kind = op.output_kind();

    for y in 0..height {
        let out_row = &mut dst[y * dst_pitch..y * dst_pitch + width * kind.byte_count()];
        for x in 0..width {
            let value = response(&mask, src, src_pitch, width, height, x, y);
            match kind {
                SampleKind::Unsigned8 => out_row[x] = value.clamp(0, 255) as u8,
                SampleKind::Signed16 => {
                    let v = value.clamp(i16::MIN as i32, i16::MAX as i32) as i16;
                    out_row[x * 2..x * 2 + 2].copy_from_slice(&v.to_ne_bytes());
                }
            }
        }
    }
}
