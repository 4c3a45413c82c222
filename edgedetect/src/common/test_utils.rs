use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::common::{Error, Result};
use crate::device::{BufferId, DeviceAllocation, FilterBackend, HostBackend, Roi};
use crate::filter::FilterOp;
use crate::image::{BufferDesc, PixelBuffer, SampleKind};

/// 8-bit diagonal ramp built through the decoder's layout (stride aligned to 4).
pub(crate) fn gradient_gray8(width: u32, height: u32) -> PixelBuffer {
    let packed = (0..height)
        .flat_map(|y| (0..width).map(move |x| ((x * 13 + y * 29) % 256) as u8))
        .collect();
    PixelBuffer::from_gray8(width, height, packed).unwrap()
}

/// 8-bit ramp with an explicit row stride; padding bytes are filled with 0xEE.
pub(crate) fn padded_gray8(width: u32, height: u32, stride: usize) -> PixelBuffer {
    let desc = BufferDesc {
        width,
        height,
        stride,
        sample: SampleKind::Unsigned8,
    };
    let mut bytes = vec![0xEE; desc.size_in_bytes()];
    for y in 0..height as usize {
        for x in 0..width as usize {
            bytes[y * stride + x] = ((x * 31 + y * 7) % 256) as u8;
        }
    }
    PixelBuffer::new_with_data(desc, bytes).unwrap()
}

/// Writes `image` to `path`, encoding by extension.
pub(crate) fn write_png(path: &Path, image: &PixelBuffer) {
    image.save_file(path).unwrap();
}

#[cfg(feature = "wgpu")]
pub(crate) fn test_gpu() -> Option<crate::device::GpuBackend> {
    match crate::device::GpuBackend::new() {
        Ok(gpu) => Some(gpu),
        Err(e) => {
            eprintln!("Skipping GPU test: {}", e);
            None
        }
    }
}

/// Step of the device protocol a [`CountingBackend`] can be told to fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum FailAt {
    Upload,
    AllocateOutput,
    Kernel,
    Download,
}

#[derive(Debug, Default)]
pub(crate) struct Counters {
    pub allocations: AtomicUsize,
    pub releases: AtomicUsize,
    pub allocation_order: Mutex<Vec<BufferId>>,
    pub release_order: Mutex<Vec<BufferId>>,
}

impl Counters {
    pub fn allocations(&self) -> usize {
        self.allocations.load(Ordering::SeqCst)
    }

    pub fn releases(&self) -> usize {
        self.releases.load(Ordering::SeqCst)
    }
}

/// Host backend that records allocations and releases and can inject failures.
#[derive(Debug)]
pub(crate) struct CountingBackend {
    inner: HostBackend,
    fail_at: Option<FailAt>,
    /// When set, only this (zero-based) arrival at `fail_at` fails.
    fail_call: Option<usize>,
    step_calls: AtomicUsize,
    counters: Arc<Counters>,
}

impl CountingBackend {
    pub fn new(fail_at: Option<FailAt>) -> (Self, Arc<Counters>) {
        Self::build(fail_at, None)
    }

    /// Fails `step` only on its `call`-th arrival, counting from zero.
    pub fn failing_once(step: FailAt, call: usize) -> (Self, Arc<Counters>) {
        Self::build(Some(step), Some(call))
    }

    fn build(fail_at: Option<FailAt>, fail_call: Option<usize>) -> (Self, Arc<Counters>) {
        let counters = Arc::new(Counters::default());
        let backend = Self {
            inner: HostBackend::new(),
            fail_at,
            fail_call,
            step_calls: AtomicUsize::new(0),
            counters: Arc::clone(&counters),
        };
        (backend, counters)
    }

    fn fails(&self, step: FailAt) -> bool {
        if self.fail_at != Some(step) {
            return false;
        }
        let call = self.step_calls.fetch_add(1, Ordering::SeqCst);
        self.fail_call.map_or(true, |n| n == call)
    }
}

impl FilterBackend for CountingBackend {
    fn name(&self) -> String {
        "counting host".to_string()
    }

    fn allocate(&self, width: u32, height: u32, kind: SampleKind) -> Result<DeviceAllocation> {
        // The input is always allocated first, so any second allocation is the output.
        if self.counters.allocations() > 0 && self.fails(FailAt::AllocateOutput) {
            return Err(Error::Device("injected allocation failure".to_string()));
        }

        let alloc = self.inner.allocate(width, height, kind)?;
        self.counters.allocations.fetch_add(1, Ordering::SeqCst);
        self.counters.allocation_order.lock().push(alloc.id);
        Ok(alloc)
    }

    fn upload(&self, dst: &DeviceAllocation, src: &[u8], src_stride: usize) -> Result<()> {
        if self.fails(FailAt::Upload) {
            return Err(Error::upload("injected upload failure"));
        }
        self.inner.upload(dst, src, src_stride)
    }

    fn download(&self, src: &DeviceAllocation, dst: &mut [u8], dst_stride: usize) -> Result<()> {
        if self.fails(FailAt::Download) {
            return Err(Error::download("injected download failure"));
        }
        self.inner.download(src, dst, dst_stride)
    }

    fn filter(
        &self,
        op: FilterOp,
        src: &DeviceAllocation,
        dst: &DeviceAllocation,
        roi: Roi,
    ) -> Result<()> {
        if self.fails(FailAt::Kernel) {
            return Err(Error::Kernel("injected kernel failure".to_string()));
        }
        self.inner.filter(op, src, dst, roi)
    }

    fn release(&self, id: BufferId) {
        self.counters.releases.fetch_add(1, Ordering::SeqCst);
        self.counters.release_order.lock().push(id);
        self.inner.release(id);
    }
}
