mod context;
#[cfg(feature = "wgpu")]
mod gpu;
mod host;

use std::fmt;

pub use context::{AcceleratorContext, BackendPreference};
#[cfg(feature = "wgpu")]
pub use gpu::GpuBackend;
pub use host::HostBackend;

use crate::common::Result;
use crate::filter::FilterOp;
use crate::image::SampleKind;

/// Opaque handle of a device allocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BufferId(pub u64);

impl fmt::Display for BufferId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Geometry of a device-resident sample grid. The pitch is chosen by the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceAllocation {
    pub id: BufferId,
    pub width: u32,
    pub height: u32,
    pub kind: SampleKind,
    /// Bytes between the starts of consecutive device rows.
    pub pitch: usize,
}

impl DeviceAllocation {
    pub fn row_bytes(&self) -> usize {
        self.width as usize * self.kind.byte_count()
    }

    pub fn size_in_bytes(&self) -> usize {
        self.pitch * self.height as usize
    }
}

/// Rectangle a filter is applied to, anchored at the origin.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Roi {
    pub width: u32,
    pub height: u32,
}

impl Roi {
    pub fn full(alloc: &DeviceAllocation) -> Self {
        Self {
            width: alloc.width,
            height: alloc.height,
        }
    }

    fn fits(&self, alloc: &DeviceAllocation) -> bool {
        self.width <= alloc.width && self.height <= alloc.height
    }
}

/// Primitive operations of an accelerator: pitched allocation, blocking
/// host/device copies and the eight filter kernels.
///
/// Every call is synchronous; when it returns the work is complete.
pub trait FilterBackend: fmt::Debug {
    /// Human readable device name.
    fn name(&self) -> String;

    fn allocate(&self, width: u32, height: u32, kind: SampleKind) -> Result<DeviceAllocation>;

    /// Copies `dst.height` rows from host memory laid out with `src_stride`.
    fn upload(&self, dst: &DeviceAllocation, src: &[u8], src_stride: usize) -> Result<()>;

    /// Copies all device rows into host memory laid out with `dst_stride`.
    fn download(&self, src: &DeviceAllocation, dst: &mut [u8], dst_stride: usize) -> Result<()>;

    /// Runs `op` over `roi` with edge replication at the borders.
    fn filter(
        &self,
        op: FilterOp,
        src: &DeviceAllocation,
        dst: &DeviceAllocation,
        roi: Roi,
    ) -> Result<()>;

    fn release(&self, id: BufferId);
}

/// Device allocation released when dropped.
#[derive(Debug)]
pub struct DeviceBuffer<'a> {
    backend: &'a dyn FilterBackend,
    alloc: DeviceAllocation,
}

impl<'a> DeviceBuffer<'a> {
    pub fn allocate(
        backend: &'a dyn FilterBackend,
        width: u32,
        height: u32,
        kind: SampleKind,
    ) -> Result<Self> {
        let alloc = backend.allocate(width, height, kind)?;
        tracing::debug!(
            "Allocated device buffer {} {}x{} {} pitch {}",
            alloc.id,
            width,
            height,
            kind,
            alloc.pitch
        );

        Ok(Self { backend, alloc })
    }

    pub fn allocation(&self) -> &DeviceAllocation {
        &self.alloc
    }
}

impl Drop for DeviceBuffer<'_> {
    fn drop(&mut self) {
        tracing::debug!("Releasing device buffer {}", self.alloc.id);
        self.backend.release(self.alloc.id);
    }
}

/// Checks that a host slice holds `alloc.height` rows of `alloc.row_bytes()` at `stride`.
pub(crate) fn check_host_rows(
    alloc: &DeviceAllocation,
    len: usize,
    stride: usize,
) -> std::result::Result<(), String> {
    let row_bytes = alloc.row_bytes();
    if stride < row_bytes {
        return Err(format!(
            "host stride {} is smaller than row size {}",
            stride, row_bytes
        ));
    }

    let required = match alloc.height {
        0 => 0,
        h => stride * (h as usize - 1) + row_bytes,
    };
    if len < required {
        return Err(format!(
            "host buffer holds {} bytes, {} required",
            len, required
        ));
    }

    Ok(())
}

/// Checks the operand kinds and region of a filter call.
pub(crate) fn check_filter_operands(
    op: FilterOp,
    src: &DeviceAllocation,
    dst: &DeviceAllocation,
    roi: Roi,
) -> std::result::Result<(), String> {
    if src.id == dst.id {
        return Err(format!("{} cannot run in place", op));
    }
    if src.kind != SampleKind::Unsigned8 {
        return Err(format!("{} expects u8 input, got {}", op, src.kind));
    }
    if dst.kind != op.output_kind() {
        return Err(format!(
            "{} writes {} samples, output buffer holds {}",
            op,
            op.output_kind(),
            dst.kind
        ));
    }
    if !roi.fits(src) || !roi.fits(dst) {
        return Err(format!(
            "region {}x{} exceeds buffer extent",
            roi.width, roi.height
        ));
    }

    Ok(())
}

/// Rounds `row_bytes` up to a multiple of `alignment` (a power of two).
pub(crate) fn pitch_for(row_bytes: usize, alignment: usize) -> usize {
    debug_assert!(alignment.is_power_of_two());
    (row_bytes.max(1) + alignment - 1) & !(alignment - 1)
}
