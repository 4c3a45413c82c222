use std::sync::atomic::{AtomicU64, Ordering};

use hashbrown::HashMap;
use parking_lot::Mutex;

use super::{
    check_filter_operands, check_host_rows, pitch_for, BufferId, DeviceAllocation, FilterBackend,
    Roi,
};
use crate::common::{Error, Result};
use crate::filter::{kernels, FilterOp};
use crate::image::SampleKind;

/// Default row alignment of host-device allocations.
pub const HOST_PITCH_ALIGNMENT: usize = 64;

#[derive(Debug)]
struct HostAllocation {
    desc: DeviceAllocation,
    bytes: Vec<u8>,
}

/// Software accelerator: a separate pitched memory space with the filter
/// kernels run on the calling thread.
#[derive(Debug)]
pub struct HostBackend {
    pitch_alignment: usize,
    next_id: AtomicU64,
    buffers: Mutex<HashMap<BufferId, HostAllocation>>,
}

impl HostBackend {
    pub fn new() -> Self {
        Self::with_pitch_alignment(HOST_PITCH_ALIGNMENT)
    }

    /// `alignment` must be a power of two.
    pub fn with_pitch_alignment(alignment: usize) -> Self {
        assert!(alignment.is_power_of_two(), "pitch alignment must be a power of two");

        Self {
            pitch_alignment: alignment,
            next_id: AtomicU64::new(1),
            buffers: Mutex::new(HashMap::new()),
        }
    }

    /// Number of allocations not yet released.
    pub fn live_allocations(&self) -> usize {
        self.buffers.lock().len()
    }
}

impl Default for HostBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl FilterBackend for HostBackend {
    fn name(&self) -> String {
        "host (software)".to_string()
    }

    fn allocate(&self, width: u32, height: u32, kind: SampleKind) -> Result<DeviceAllocation> {
        if width == 0 || height == 0 {
            return Err(Error::Device(format!(
                "cannot allocate an empty {}x{} buffer",
                width, height
            )));
        }

        let pitch = pitch_for(width as usize * kind.byte_count(), self.pitch_alignment);
        let desc = DeviceAllocation {
            id: BufferId(self.next_id.fetch_add(1, Ordering::Relaxed)),
            width,
            height,
            kind,
            pitch,
        };

        let bytes = vec![0; desc.size_in_bytes()];
        self.buffers
            .lock()
            .insert(desc.id, HostAllocation { desc, bytes });

        Ok(desc)
    }

    fn upload(&self, dst: &DeviceAllocation, src: &[u8], src_stride: usize) -> Result<()> {
        check_host_rows(dst, src.len(), src_stride).map_err(Error::upload)?;

        let mut buffers = self.buffers.lock();
        let target = buffers
            .get_mut(&dst.id)
            .ok_or_else(|| Error::upload(format!("unknown device buffer {}", dst.id)))?;

        let row_bytes = dst.row_bytes();
        let pitch = target.desc.pitch;
        for y in 0..dst.height as usize {
            target.bytes[y * pitch..y * pitch + row_bytes]
                .copy_from_slice(&src[y * src_stride..y * src_stride + row_bytes]);
        }

        Ok(())
    }

    fn download(&self, src: &DeviceAllocation, dst: &mut [u8], dst_stride: usize) -> Result<()> {
        check_host_rows(src, dst.len(), dst_stride).map_err(Error::download)?;

        let buffers = self.buffers.lock();
        let source = buffers
            .get(&src.id)
            .ok_or_else(|| Error::download(format!("unknown device buffer {}", src.id)))?;

        let row_bytes = src.row_bytes();
        let pitch = source.desc.pitch;
        for y in 0..src.height as usize {
            dst[y * dst_stride..y * dst_stride + row_bytes]
                .copy_from_slice(&source.bytes[y * pitch..y * pitch + row_bytes]);
        }

        Ok(())
    }

    fn filter(
        &self,
        op: FilterOp,
        src: &DeviceAllocation,
        dst: &DeviceAllocation,
        roi: Roi,
    ) -> Result<()> {
        check_filter_operands(op, src, dst, roi).map_err(Error::Kernel)?;

        let mut buffers = self.buffers.lock();
        // Take the output out of the map so both operands can be borrowed.
        let mut output = buffers
            .remove(&dst.id)
            .ok_or_else(|| Error::Kernel(format!("unknown device buffer {}", dst.id)))?;

        let result = match buffers.get(&src.id) {
            Some(input) => {
                kernels::apply(
                    op,
                    &input.bytes,
                    input.desc.pitch,
                    &mut output.bytes,
                    output.desc.pitch,
                    roi.width as usize,
                    roi.height as usize,
                );
                Ok(())
            }
            None => Err(Error::Kernel(format!("unknown device buffer {}", src.id))),
        };

        buffers.insert(dst.id, output);
        result
    }

    fn release(&self, id: BufferId) {
        if self.buffers.lock().remove(&id).is_none() {
            tracing::warn!("Release of unknown device buffer {}", id);
        }
    }
}

impl Drop for HostBackend {
    fn drop(&mut self) {
        let live = self.buffers.get_mut().len();
        if live > 0 {
            tracing::warn!("{} device buffers were never released", live);
        }
    }
}
