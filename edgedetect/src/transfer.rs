//! Device side of one image: allocation, copies in both directions and the
//! filter call, with every device buffer released when the session ends.

use crate::common::{Error, Result};
use crate::device::{AcceleratorContext, DeviceAllocation, DeviceBuffer, FilterBackend, Roi};
use crate::filter::FilterOp;
use crate::image::{BufferDesc, PixelBuffer, SampleKind, TightBuffer};
use crate::timing::ProcessingTimestamps;

/// Device buffers held for the processing of one image.
///
/// Field order is drop order: the input buffer is released before the output.
pub struct TransferSession<'a> {
    input: Option<DeviceBuffer<'a>>,
    output: Option<DeviceBuffer<'a>>,
    backend: &'a dyn FilterBackend,
}

impl<'a> TransferSession<'a> {
    pub fn new(backend: &'a dyn FilterBackend) -> Self {
        Self {
            input: None,
            output: None,
            backend,
        }
    }

    /// Allocates the single-channel 8-bit input grid.
    pub fn allocate_input(&mut self, width: u32, height: u32) -> Result<()> {
        let buffer = DeviceBuffer::allocate(self.backend, width, height, SampleKind::Unsigned8)?;
        self.input = Some(buffer);
        Ok(())
    }

    pub fn upload_to_device(&self, host: &TightBuffer<'_>) -> Result<()> {
        let input = self
            .input
            .as_ref()
            .ok_or_else(|| Error::upload("input buffer is not allocated"))?;

        let alloc = input.allocation();
        let desc = host.desc();
        if desc.sample != alloc.kind || desc.width != alloc.width || desc.height != alloc.height {
            return Err(Error::upload(format!(
                "host image {} does not match device buffer {}x{} {}",
                desc, alloc.width, alloc.height, alloc.kind
            )));
        }

        tracing::debug!(
            "Uploading {} to device buffer {} (pitch {})",
            desc,
            alloc.id,
            alloc.pitch
        );
        self.backend.upload(alloc, host.bytes(), desc.stride)
    }

    /// Allocates the output grid with the input's extent and the given sample kind.
    pub fn allocate_output(&mut self, kind: SampleKind) -> Result<()> {
        let (width, height) = {
            let alloc = self.input_allocation()?;
            (alloc.width, alloc.height)
        };

        let buffer = DeviceBuffer::allocate(self.backend, width, height, kind)?;
        self.output = Some(buffer);
        Ok(())
    }

    /// Runs `op` over the full image extent.
    pub fn invoke(&self, op: FilterOp) -> Result<()> {
        let input = self.input_allocation()?;
        let output = self
            .output
            .as_ref()
            .ok_or_else(|| Error::Kernel("output buffer is not allocated".to_string()))?
            .allocation();

        tracing::debug!("Invoking {} on {}x{}", op, input.width, input.height);
        self.backend.filter(op, input, output, Roi::full(input))
    }

    /// Copies the output grid into a new tight host buffer.
    pub fn download_from_device(&self) -> Result<PixelBuffer> {
        let output = self
            .output
            .as_ref()
            .ok_or_else(|| Error::download("output buffer is not allocated"))?
            .allocation();

        let desc = BufferDesc::new_tight(output.width, output.height, output.kind);
        let mut image = PixelBuffer::new_zeroed(desc)?;
        self.backend.download(output, image.bytes_mut(), desc.stride)?;

        Ok(image)
    }

    fn input_allocation(&self) -> Result<&DeviceAllocation> {
        self.input
            .as_ref()
            .map(DeviceBuffer::allocation)
            .ok_or_else(|| Error::Device("input buffer is not allocated".to_string()))
    }
}

/// Runs `op` on `image` and returns the tight result.
///
/// Every device buffer allocated here has been released when this returns,
/// whichever step failed.
pub fn execute(
    context: &AcceleratorContext,
    op: FilterOp,
    output_kind: SampleKind,
    image: &TightBuffer<'_>,
    timestamps: &mut ProcessingTimestamps,
) -> Result<PixelBuffer> {
    let desc = image.desc();
    let mut session = TransferSession::new(context.backend());

    session.allocate_input(desc.width, desc.height)?;
    session.upload_to_device(image)?;
    timestamps.mark_uploaded();

    session.allocate_output(output_kind)?;
    session.invoke(op)?;
    timestamps.mark_filtered();

    let output = session.download_from_device()?;
    timestamps.mark_downloaded();

    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::common::test_utils::{padded_gray8, CountingBackend, Counters, FailAt};
    use crate::filter::kernels;
    use crate::image::to_tight_buffer;

    fn run(fail_at: Option<FailAt>, op: FilterOp) -> (Result<PixelBuffer>, Arc<Counters>) {
        let (backend, counters) = CountingBackend::new(fail_at);
        let context = AcceleratorContext::with_backend(backend);
        let image = padded_gray8(7, 5, 12);
        let tight = to_tight_buffer(&image);
        let mut timestamps = ProcessingTimestamps::start();

        let result = execute(&context, op, op.output_kind(), &tight, &mut timestamps);
        (result, counters)
    }

    #[test]
    fn output_matches_reference_kernel() {
        for op in FilterOp::ALL {
            let (result, _) = run(None, op);
            let output = result.unwrap();

            let image = padded_gray8(7, 5, 12);
            let kind = op.output_kind();
            let stride = 7 * kind.byte_count();
            let mut expected = vec![0u8; stride * 5];
            kernels::apply(op, image.bytes(), 12, &mut expected, stride, 7, 5);

            assert_eq!(output.desc().width, 7);
            assert_eq!(output.desc().height, 5);
            assert_eq!(output.desc().sample, kind);
            assert!(output.desc().is_tight());
            assert_eq!(output.bytes(), &expected[..], "{}", op);
        }
    }

    #[test]
    fn success_releases_input_then_output() {
        let (result, counters) = run(None, FilterOp::SobelHoriz);
        assert!(result.is_ok());
        assert_eq!(counters.allocations(), 2);
        assert_eq!(counters.releases(), 2);
        assert_eq!(
            *counters.release_order.lock(),
            *counters.allocation_order.lock()
        );
    }

    #[test]
    fn every_failure_releases_what_was_allocated() {
        let cases = [
            (FailAt::Upload, 1),
            (FailAt::AllocateOutput, 1),
            (FailAt::Kernel, 2),
            (FailAt::Download, 2),
        ];

        for (fail_at, allocated) in cases {
            let (result, counters) = run(Some(fail_at), FilterOp::ScharrVert);
            assert!(result.is_err(), "{:?}", fail_at);
            assert_eq!(counters.allocations(), allocated, "{:?}", fail_at);
            assert_eq!(counters.releases(), allocated, "{:?}", fail_at);
            assert_eq!(
                *counters.release_order.lock(),
                *counters.allocation_order.lock(),
                "{:?}",
                fail_at
            );
        }
    }

    #[test]
    fn failures_keep_their_kind() {
        let (result, _) = run(Some(FailAt::Upload), FilterOp::SobelVert);
        assert!(matches!(result, Err(Error::Transfer { .. })));

        let (result, _) = run(Some(FailAt::Kernel), FilterOp::SobelVert);
        assert!(matches!(result, Err(Error::Kernel(_))));

        let (result, _) = run(Some(FailAt::Download), FilterOp::SobelVert);
        assert!(matches!(result, Err(Error::Transfer { .. })));
    }

    #[test]
    fn session_steps_out_of_order_fail() {
        let (backend, counters) = CountingBackend::new(None);
        {
            let mut session = TransferSession::new(&backend);
            assert!(session.invoke(FilterOp::SobelHoriz).is_err());
            assert!(session.download_from_device().is_err());
            assert!(session.allocate_output(SampleKind::Unsigned8).is_err());
        }
        assert_eq!(counters.allocations(), 0);
        assert_eq!(counters.releases(), 0);
    }

    #[test]
    fn one_pixel_image() {
        let (backend, counters) = CountingBackend::new(None);
        let context = AcceleratorContext::with_backend(backend);
        let image = PixelBuffer::from_gray8(1, 1, vec![200]).unwrap();
        let tight = to_tight_buffer(&image);

        for op in FilterOp::ALL {
            let mut timestamps = ProcessingTimestamps::start();
            let output = execute(&context, op, op.output_kind(), &tight, &mut timestamps).unwrap();
            assert_eq!(output.desc().width, 1);
            assert_eq!(output.desc().height, 1);
            assert_eq!(output.sample(0, 0), 0, "{}", op);
        }
        assert_eq!(counters.allocations(), counters.releases());
    }
}
